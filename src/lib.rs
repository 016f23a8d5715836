//! Image poll backend.
//!
//! Clients post a "test" (a question and at least two images), list tests
//! page by page or since a point in time, and vote once per test. Which
//! choices a client already voted for is kept on the client in the signed
//! `chosen` cookie, see [`ledger`].
//!
//! # Routes
//! - `GET /test?since=|since_id=&offset=&limit=`
//! - `POST /test` (multipart: `question` plus one file per choice)
//! - `GET /vote`
//! - `POST /vote` (form: `choice`)
//!
//! Every protocol-level failure answers `200` with a `status` field; callers
//! must read the body.
//!
//! # Configuration
//! `PICPOLL_BIND`, `PICPOLL_DATABASE_URL`, `PICPOLL_SECRET_KEY`,
//! `PICPOLL_MEDIA_ROOT`, `PICPOLL_MEDIA_URL`, `PICPOLL_MAX_UPLOAD_MB`; a
//! `.env` file is read first. Logging follows `RUST_LOG`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header::CONTENT_TYPE, Method};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod ledger;
pub mod media;
pub mod runtime;
pub mod service;
pub mod support;

use config::Config;
use db::dbclient::DBClient;
use db::memory::MemoryStore;
use db::TestStore;
use handler::AppData;
use ledger::LedgerCodec;
use media::FsImageStorage;

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn TestStore>> {
    match &config.database_url {
        Some(url) => {
            let db = DBClient::new(url).await?;
            db.prepare().await?;
            info!("Connected to database");

            Ok(Arc::new(db))
        }
        None => {
            warn!("PICPOLL_DATABASE_URL not set; tests and votes are kept in memory only");

            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let images = Arc::new(FsImageStorage::new(&config.media_root, &config.media_url));
    let data = AppData::new(store, images, LedgerCodec::new(&config.secret_key));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let mut app = handler::router(data);

    // Uploaded images are only served here when the media URL is a local path.
    let media_path = config.media_url.trim_end_matches('/');
    if media_path.starts_with('/') && media_path.len() > 1 {
        app = app.nest_service(media_path, ServeDir::new(&config.media_root));
    }

    let app = app
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = TcpListener::bind(config.bind).await?;
    info!("Server running on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(runtime::shutdown_signal())
        .await?;

    info!("Server stopped");

    Ok(())
}
