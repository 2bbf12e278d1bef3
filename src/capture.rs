//! Per-request capture state and the counting pass-through body.
//!
//! The middleware never buffers a response. Instead the body is wrapped so
//! that the size of each chunk is relayed to a counting future as the chunk
//! flows out to the client, and the response line is logged once the stream
//! has finished.

use std::pin::Pin;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use bytes::Bytes;
use futures::{Future, StreamExt};
use http_body_util::BodyExt;
use hyper::upgrade::OnUpgrade;
use tokio::sync::mpsc;

/// Error type for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The underlying connection does not expose a takeover capability.
    #[error("connection takeover is not supported by the underlying connection")]
    UnsupportedOperation,
}

/// What the middleware observes about one response: the status code and the
/// number of body bytes that made it out.
///
/// Each request owns exactly one `Capture`. It is created when the response
/// head becomes available and finished when the body stream completes; it is
/// never shared across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    status: StatusCode,
    bytes: u64,
}

impl Capture {
    /// A fresh capture. The status defaults to 200 so a handler that never
    /// sets one reports the conventional success code.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            bytes: 0,
        }
    }

    /// Records an explicitly set status. The last one set wins.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Adds the size of one successfully written chunk to the running total.
    pub fn record_write(&mut self, written: u64) {
        self.bytes += written;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self::new()
    }
}

type FinishedCapture = Pin<Box<dyn Future<Output = Capture> + Send>>;

/// Wraps a response body so chunk sizes are counted as they stream through,
/// without blocking the stream.
///
/// Returns the wrapped body, which passes every chunk (and every error)
/// through untouched, and a future that resolves to the finished [`Capture`]
/// once the stream completes. Only chunks that actually passed through are
/// counted; a stream error surfaces to the consumer unchanged and simply ends
/// the count.
pub(crate) fn count_body<B>(body: B, mut capture: Capture) -> (Body, FinishedCapture)
where
    B: axum::body::HttpBody<Data = Bytes, Error = axum::Error> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();

    let counted_stream = body.into_data_stream().map(move |result| {
        if let Ok(chunk) = &result {
            let _ = tx.send(chunk.len() as u64);
        }
        result
    });

    let body = Body::from_stream(counted_stream);

    // Resolves when the stream is finished (or dropped after an error) and
    // the sender side goes away.
    let finished = Box::pin(async move {
        while let Some(written) = rx.recv().await {
            capture.record_write(written);
        }
        capture
    });

    (body, finished)
}

/// Detaches the raw connection from the HTTP exchange, for protocol upgrades
/// such as WebSockets.
///
/// This is a runtime capability query: it succeeds only when the underlying
/// connection advertised takeover support by placing an [`OnUpgrade`] in the
/// request extensions, and returns [`CaptureError::UnsupportedOperation`]
/// otherwise. The logging layer itself never takes the connection over; the
/// wrapped body is transparent to upgraded responses.
pub fn take_over(request: &mut Request) -> Result<OnUpgrade, CaptureError> {
    request
        .extensions_mut()
        .remove::<OnUpgrade>()
        .ok_or(CaptureError::UnsupportedOperation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn capture_defaults_to_200_and_zero_bytes() {
        let capture = Capture::new();
        assert_eq!(capture.status(), StatusCode::OK);
        assert_eq!(capture.bytes(), 0);
    }

    #[test]
    fn last_status_set_wins() {
        let mut capture = Capture::new();
        capture.set_status(StatusCode::CREATED);
        capture.set_status(StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(capture.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[test]
    fn partial_writes_accumulate() {
        let mut capture = Capture::new();
        capture.record_write(3);
        capture.record_write(0);
        capture.record_write(9);
        assert_eq!(capture.bytes(), 12);
    }

    #[tokio::test]
    async fn counting_body_passes_content_through() {
        let body = Body::from("Hello, World!");
        let (body, finished) = count_body(body, Capture::new());

        let collect_task = tokio::spawn(async move {
            let collected = body.collect().await.unwrap();
            collected.to_bytes()
        });
        let capture_task = tokio::spawn(async move { finished.await });

        let (content, capture) = tokio::join!(collect_task, capture_task);
        assert_eq!(content.unwrap(), "Hello, World!");
        assert_eq!(capture.unwrap().bytes(), 13);
    }

    #[tokio::test]
    async fn stream_error_surfaces_and_count_keeps_prior_chunks() {
        let chunks = stream::iter(vec![
            Ok::<_, axum::Error>(Bytes::from("abc")),
            Ok(Bytes::from("def")),
            Err(axum::Error::new(std::io::Error::other("connection reset"))),
        ]);
        let (body, finished) = count_body(Body::from_stream(chunks), Capture::new());

        let collected = body.collect().await;
        assert!(collected.is_err());

        let capture = finished.await;
        assert_eq!(capture.bytes(), 6);
    }

    #[tokio::test]
    async fn counting_body_handles_empty_body() {
        let (body, finished) = count_body(Body::empty(), Capture::new());
        let collected = body.collect().await.unwrap();
        assert!(collected.to_bytes().is_empty());
        assert_eq!(finished.await.bytes(), 0);
    }

    #[test]
    fn take_over_without_upgrade_support_is_rejected() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert!(matches!(
            take_over(&mut request),
            Err(CaptureError::UnsupportedOperation)
        ));
    }
}
