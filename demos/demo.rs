//! Demo server for the logging middleware.
//!
//! Run with `cargo run --example demo`, then poke it:
//!
//! ```text
//! curl http://localhost:1337/
//! curl -X POST http://localhost:1337/meow
//! curl -X PUT http://localhost:1337/purr
//! curl http://localhost:1337/schnurr
//! ```
//!
//! Each request produces a request line and a response line, colorized when
//! the server's stdout is a terminal.

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use inlet::LoggerLayer;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, Level};

async fn root_handler() -> impl IntoResponse {
    "oh hey"
}

async fn meow_handler() -> impl IntoResponse {
    (StatusCode::TEMPORARY_REDIRECT, "it's over there")
}

async fn purr_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nope, not here")
}

async fn fallback_handler() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "ouch")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/meow", post(meow_handler))
        .route("/purr", put(purr_handler))
        .fallback(fallback_handler)
        .layer(LoggerLayer::new());

    let listener = TcpListener::bind("0.0.0.0:1337").await?;
    info!("demo server listening on http://localhost:1337");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
