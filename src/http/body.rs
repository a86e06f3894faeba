//! Response body that counts the bytes actually sent.
//!
//! `Content-Length` is not reliable for sizing: chunked and streamed
//! responses carry none, and a HEAD response declares a length it never
//! sends. Counting data frames as they are polled gives the real figure.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Body as _, Frame, SizeHint};

type OnFinish = Box<dyn FnOnce(u64) + Send + Sync>;

/// Wraps a body and reports the number of data bytes yielded, exactly once,
/// when the body ends or is dropped.
pub struct CountingBody {
    inner: Body,
    sent: u64,
    on_finish: Option<OnFinish>,
}

impl CountingBody {
    pub fn new(inner: Body, on_finish: impl FnOnce(u64) + Send + Sync + 'static) -> Self {
        Self {
            inner,
            sent: 0,
            on_finish: Some(Box::new(on_finish)),
        }
    }

    fn finish(&mut self) {
        if let Some(report) = self.on_finish.take() {
            report(self.sent);
        }
    }
}

impl http_body::Body for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        match &frame {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.sent += data.len() as u64;
                }
            }
            Some(Err(_)) | None => this.finish(),
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::to_bytes;
    use parking_lot::Mutex;

    fn counted(inner: Body) -> (Body, Arc<Mutex<Vec<u64>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let body = Body::new(CountingBody::new(inner, move |n| {
            sink.lock().push(n)
        }));
        (body, reports)
    }

    #[tokio::test]
    async fn test_counts_bytes_read() {
        let (body, reports) = counted(Body::from("hello world"));
        let bytes = to_bytes(body, usize::MAX).await.unwrap();

        assert_eq!(&bytes[..], b"hello world");
        assert_eq!(*reports.lock(), vec![11]);
    }

    #[tokio::test]
    async fn test_unread_body_reports_zero() {
        let (body, reports) = counted(Body::from("never sent"));
        drop(body);
        assert_eq!(*reports.lock(), vec![0]);
    }

    #[tokio::test]
    async fn test_empty_body_reports_once() {
        let (body, reports) = counted(Body::empty());
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
        assert_eq!(*reports.lock(), vec![0]);
    }

    #[test]
    fn test_size_hint_passes_through() {
        let body = CountingBody::new(Body::from("abc"), |_| {});
        assert_eq!(http_body::Body::size_hint(&body).exact(), Some(3));
    }
}
