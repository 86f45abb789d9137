//! Body wrapper that mirrors bytes into an in-memory cache as they are
//! read, so they can be inspected afterwards. Used for response capture
//! and for retaining partial request bytes when a read fails.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use bytes::BytesMut;
use http_body::{Frame, SizeHint};

/// Tees every data frame into an internal cache while forwarding it
/// unchanged. Caching is best-effort bookkeeping: it never fails or delays
/// the forwarded frame.
#[derive(Debug)]
pub struct CaptureBody {
    inner: Body,
    cache: BytesMut,
}

impl CaptureBody {
    pub fn new(inner: Body) -> Self {
        Self {
            inner,
            cache: BytesMut::new(),
        }
    }

    /// Bytes forwarded so far.
    pub fn cache(&self) -> &[u8] {
        &self.cache
    }

    pub fn into_cache(self) -> Bytes {
        self.cache.freeze()
    }
}

impl http_body::Body for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let frame = match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => frame,
            other => return other,
        };
        if let Some(data) = frame.data_ref() {
            this.cache.extend_from_slice(data);
        }
        Poll::Ready(Some(Ok(frame)))
    }

    fn is_end_stream(&self) -> bool {
        http_body::Body::is_end_stream(&self.inner)
    }

    fn size_hint(&self) -> SizeHint {
        http_body::Body::size_hint(&self.inner)
    }
}
