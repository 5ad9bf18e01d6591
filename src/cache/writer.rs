//! Fire-and-forget cache population.
//!
//! Cacheable responses are streamed to the client untouched while a copy
//! of each chunk is collected. When the body finishes, the snapshot is
//! offered to a bounded channel; a background worker drains it into the
//! store. A full channel, an oversized body, a client disconnect or an
//! upstream read error all mean "no cache entry", never a client-visible
//! failure.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    http::header,
    response::Response,
};
use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::cache::store::{CachedResponse, ResponseCache};
use crate::observability::metrics;

type CacheWrite = (String, CachedResponse);

/// Handle used by request handlers to submit cache writes.
#[derive(Debug, Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<CacheWrite>,
}

/// Background half of the cache writer.
#[derive(Debug)]
pub struct CacheWorker {
    rx: mpsc::Receiver<CacheWrite>,
}

impl CacheWriter {
    pub fn channel(capacity: usize) -> (CacheWriter, CacheWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (CacheWriter { tx }, CacheWorker { rx })
    }

    /// Queue a write without waiting. Dropped if the queue is full.
    pub fn submit(&self, key: String, response: CachedResponse) {
        match self.tx.try_send((key, response)) {
            Ok(()) => metrics::record_cache("queued"),
            Err(mpsc::error::TrySendError::Full((key, _))) => {
                tracing::debug!(key = %key, "Cache queue full, dropping entry");
                metrics::record_cache("dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Cache worker stopped, dropping entry");
            }
        }
    }

    /// Wrap `response` so its body is stored under `key` once fully sent.
    ///
    /// Responses announcing a length above `max_bytes` pass through as-is.
    pub fn tee(&self, key: String, response: Response, max_bytes: usize) -> Response {
        let declared = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > max_bytes) {
            return response;
        }

        let (parts, body) = response.into_parts();
        let status = parts.status;
        let headers = parts.headers.clone();
        let writer = self.clone();

        let tee = TeeStream {
            inner: body.into_data_stream().boxed(),
            buffer: Vec::new(),
            max_bytes,
            on_complete: Some(Box::new(move |bytes| {
                writer.submit(key, CachedResponse::new(status, headers, bytes));
            })),
        };

        Response::from_parts(parts, Body::from_stream(tee))
    }
}

impl CacheWorker {
    /// Drain queued writes into `store` until shutdown or all writers drop.
    pub async fn run(mut self, store: ResponseCache, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!("Cache worker started");
        loop {
            tokio::select! {
                Some((key, response)) = self.rx.recv() => {
                    tracing::trace!(key = %key, bytes = response.body.len(), "Storing cached response");
                    store.insert(key, response);
                    metrics::record_cache("stored");
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache worker received shutdown signal");
                    break;
                }
                else => break,
            }
        }
    }
}

type Completion = Box<dyn FnOnce(Bytes) + Send>;

/// Passes chunks through while keeping a bounded copy.
struct TeeStream {
    inner: BoxStream<'static, Result<Bytes, axum::Error>>,
    buffer: Vec<u8>,
    max_bytes: usize,
    /// `None` once the copy has been delivered or abandoned.
    on_complete: Option<Completion>,
}

impl TeeStream {
    fn abandon(&mut self) {
        self.on_complete = None;
        self.buffer = Vec::new();
    }
}

impl Stream for TeeStream {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = this.inner.poll_next_unpin(cx);

        match &polled {
            Poll::Ready(Some(Ok(chunk))) if this.on_complete.is_some() => {
                if this.buffer.len() + chunk.len() > this.max_bytes {
                    this.abandon();
                } else {
                    this.buffer.extend_from_slice(chunk);
                }
            }
            Poll::Ready(Some(Err(_))) => this.abandon(),
            Poll::Ready(None) => {
                if let Some(on_complete) = this.on_complete.take() {
                    on_complete(Bytes::from(std::mem::take(&mut this.buffer)));
                }
            }
            _ => {}
        }

        polled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::http::StatusCode;

    fn response(body: &'static str) -> Response {
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = StatusCode::OK;
        response
    }

    #[tokio::test]
    async fn test_tee_stores_after_body_completes() {
        let (writer, mut worker) = CacheWriter::channel(4);

        let teed = writer.tee("/a".into(), response("hello"), 1024);
        assert!(worker.rx.try_recv().is_err());

        let body = axum::body::to_bytes(teed.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");

        let (key, cached) = worker.rx.try_recv().unwrap();
        assert_eq!(key, "/a");
        assert_eq!(&cached.body[..], b"hello");
    }

    #[tokio::test]
    async fn test_tee_skips_oversized_body() {
        let (writer, mut worker) = CacheWriter::channel(4);

        let teed = writer.tee("/big".into(), response("0123456789"), 4);
        let body = axum::body::to_bytes(teed.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 10);
        assert!(worker.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (writer, mut worker) = CacheWriter::channel(1);
        let entry = || CachedResponse::new(StatusCode::OK, Default::default(), Bytes::new());

        writer.submit("/a".into(), entry());
        writer.submit("/b".into(), entry());

        assert_eq!(worker.rx.try_recv().unwrap().0, "/a");
        assert!(worker.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_worker_populates_store() {
        let (writer, worker) = CacheWriter::channel(4);
        let store = ResponseCache::new(Duration::from_secs(60), 8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(store.clone(), shutdown_rx));

        let teed = writer.tee("/x".into(), response("cached"), 1024);
        axum::body::to_bytes(teed.into_body(), usize::MAX).await.unwrap();

        for _ in 0..50 {
            if store.get("/x").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(&store.get("/x").unwrap().body[..], b"cached");

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
