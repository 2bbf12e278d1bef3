//! # Inlet
//!
//! A colorized request/response logging middleware for axum. It works with
//! any tower-compatible stack and logs exactly two lines per request: one
//! when the request arrives and one when its response has been sent, with the
//! method, URI, remote address, status, byte count, and elapsed time.
//!
//! When stdout is an interactive terminal the lines use a fixed color
//! palette. When it is not (for example under a log collector) the escape
//! sequences are omitted and only the textual content remains. The terminal
//! check happens once, when the layer is constructed.
//!
//! Note that for accurate response times the layer should be the outermost
//! layer, so it brackets everything else the request passes through.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use inlet::LoggerLayer;
//! use std::net::SocketAddr;
//!
//! async fn handler() -> &'static str {
//!     "Oh, hi, I didn't see you there."
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/", get(handler))
//!         .layer(LoggerLayer::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     // ConnectInfo supplies the remote address the request line logs.
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! The output looks like:
//!
//! ```text
//! <- GET / 127.0.0.1
//! -> 200 OK 31B 112.9µs
//! ```

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::response::Response;
use tower::{Layer, Service};
use tracing::info;

pub mod capture;
pub use capture::{take_over, Capture, CaptureError};

use capture::count_body;

pub mod palette;
pub use palette::Palette;

mod format;

/// Tower layer that attaches request/response logging to an inner service.
///
/// This is the only entry point: wrap a service (or an axum `Router`) with it
/// and every request produces a request line and a response line. There is
/// nothing to configure; [`LoggerLayer::new`] detects the terminal once and
/// picks the palette accordingly.
#[derive(Debug, Clone, Copy)]
pub struct LoggerLayer {
    palette: Palette,
}

impl LoggerLayer {
    /// Creates the layer, choosing colored or plain output from whether
    /// stdout is an interactive terminal. The check happens here, once, not
    /// per request.
    pub fn new() -> Self {
        Self {
            palette: Palette::detect(),
        }
    }

    /// Creates the layer with an explicit palette, bypassing terminal
    /// detection. Useful for forcing color on or off.
    pub fn with_palette(palette: Palette) -> Self {
        Self { palette }
    }
}

impl Default for LoggerLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for LoggerLayer {
    type Service = LoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggerService {
            inner,
            palette: self.palette,
        }
    }
}

/// Tower service created by [`LoggerLayer`].
///
/// The request line is logged before the inner service is called, and the
/// response line after the response body has finished streaming, so the byte
/// count reflects what was actually sent. Concurrent requests interleave, but
/// each request's pair of lines is internally ordered.
#[derive(Debug, Clone)]
pub struct LoggerService<S> {
    inner: S,
    palette: Palette,
}

impl<S> Service<Request> for LoggerService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let palette = self.palette;

        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(peer)| peer.to_string());
        let addr = remote.as_deref().map(format::strip_port).unwrap_or("-");

        info!(
            "{}",
            palette.request_line(request.method(), request.uri(), addr)
        );

        let start = SystemTime::now();
        let future = self.inner.call(request);

        Box::pin(async move {
            match future.await {
                Ok(mut response) => {
                    let mut capture = Capture::new();
                    capture.set_status(response.status());

                    let body = std::mem::replace(response.body_mut(), Body::empty());
                    let (body, finished) = count_body(body, capture);
                    *response.body_mut() = body;

                    // Log once the body has fully streamed out, so the byte
                    // count is the amount that reached the client.
                    tokio::spawn(async move {
                        let capture = finished.await;
                        let elapsed = start.elapsed().unwrap_or_default();
                        info!("{}", palette.response_line(&capture, elapsed));
                    });

                    Ok(response)
                }
                Err(err) => {
                    // A misbehaving inner service gets reported as a 500; the
                    // error itself is propagated unchanged.
                    let mut capture = Capture::new();
                    capture.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                    let elapsed = start.elapsed().unwrap_or_default();
                    info!("{}", palette.response_line(&capture, elapsed));
                    Err(err)
                }
            }
        })
    }
}
