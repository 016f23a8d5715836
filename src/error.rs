use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type PollResult<T> = Result<T, PollError>;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("{0}")]
    Parse(String),

    #[error("Choice not found.")]
    NotFound,

    #[error("You voted on this already!")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PollError {
    pub fn status(&self) -> &'static str {
        match self {
            PollError::Forbidden => "FORBIDDEN",
            _ => "ERROR",
        }
    }
}

// Rejections are part of the protocol and answer 200; only internal failures use the status code.
impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        match self {
            PollError::Internal(e) => {
                error!(error = %e, "Request failed");

                let body = Json(json!({
                    "status": "ERROR",
                    "message": "Internal error",
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            e => {
                let body = Json(json!({
                    "status": e.status(),
                    "message": e.to_string(),
                }));
                (StatusCode::OK, body).into_response()
            }
        }
    }
}
