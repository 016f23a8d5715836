use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde_json::json;
use tracing::info;

use crate::db::TestStore;
use crate::error::PollError;
use crate::ledger::{LedgerCodec, COOKIE_NAME};
use crate::media::ImageStorage;
use crate::service::poll::{self, ListQuery, TestView, Upload};
use crate::service::vote::{self, VoteForm};
use crate::support::cookies::{get_cookie, set_cookie};

#[derive(Clone)]
pub struct AppData {
    pub store: Arc<dyn TestStore>,
    pub images: Arc<dyn ImageStorage>,
    pub ledger: Arc<LedgerCodec>,
}

impl AppData {
    pub fn new(store: Arc<dyn TestStore>, images: Arc<dyn ImageStorage>, ledger: LedgerCodec) -> Self {
        Self {
            store,
            images,
            ledger: Arc::new(ledger),
        }
    }

    fn read_ledger(&self, headers: &HeaderMap) -> Vec<i32> {
        get_cookie(headers, COOKIE_NAME)
            .map(|token| self.ledger.decode(token))
            .unwrap_or_default()
    }
}

pub fn router(data: AppData) -> Router {
    Router::new()
        .route("/test", get(get_test).post(post_test))
        .route("/vote", get(get_vote).post(post_vote))
        .with_state(data)
}

async fn get_test(
    State(data): State<AppData>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<TestView>>, PollError> {
    let Query(query) = query.map_err(|e| {
        info!(error = %e, "Rejected test listing");
        PollError::Parse(e.body_text())
    })?;
    let tests = poll::list_tests(data.store.as_ref(), &query).await?;

    Ok(Json(tests.iter().map(TestView::from).collect()))
}

async fn read_test_form(mut multipart: Multipart) -> Result<(String, Vec<Upload>), Response> {
    let mut question = String::new();
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(IntoResponse::into_response)? {
        let name = field.name().unwrap_or_default().to_owned();

        match field.file_name().map(str::to_owned) {
            // A file input left blank.
            Some(file_name) if file_name.is_empty() => {}
            Some(file_name) => {
                let data = field.bytes().await.map_err(IntoResponse::into_response)?;
                uploads.push(Upload {
                    field: name,
                    file_name,
                    data: data.to_vec(),
                });
            }
            None if name == "question" => {
                question = field.text().await.map_err(IntoResponse::into_response)?;
            }
            None => {}
        }
    }

    Ok((question, uploads))
}

async fn post_test(State(data): State<AppData>, multipart: Result<Multipart, MultipartRejection>) -> Response {
    // A body that is not multipart simply carries no uploads.
    let (question, uploads) = match multipart {
        Ok(multipart) => match read_test_form(multipart).await {
            Ok(v) => v,
            Err(response) => return response,
        },
        Err(e) => {
            info!(error = %e, "Test submission is not a multipart form");
            (String::new(), Vec::new())
        }
    };

    match poll::create_test(data.store.as_ref(), data.images.as_ref(), &question, uploads).await {
        Ok(test) => Json(json!({
            "status": "OK",
            "test": TestView::from(&test),
        })).into_response(),
        Err(PollError::Validation(message)) => Json(json!({
            "status": message,
        })).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_vote(State(data): State<AppData>, headers: HeaderMap) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "votes": data.read_ledger(&headers),
    }))
}

async fn post_vote(
    State(data): State<AppData>,
    headers: HeaderMap,
    form: Result<Form<VoteForm>, FormRejection>,
) -> Result<Response, PollError> {
    let choice = form.ok().and_then(|Form(form)| form.choice);
    let ledger = data.read_ledger(&headers);

    let receipt = vote::cast_vote(data.store.as_ref(), choice.as_deref(), ledger).await?;

    let cookie = set_cookie(COOKIE_NAME, &data.ledger.encode(&receipt.ledger));
    let body = Json(json!({
        "status": "OK",
        "id": receipt.id,
        "votes": receipt.votes,
    }));

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), body).into_response())
}
