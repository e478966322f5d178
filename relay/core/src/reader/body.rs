//! Response bodies
//!
//! The reader needs two things from a byte source: the next chunk, and a way
//! to release the source early. [`ByteStream`] provides both on top of any
//! `futures` stream of byte chunks (such as `reqwest::Response::bytes_stream`).

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use super::TransportError;

/// A byte-oriented response body that can be cancelled
#[async_trait]
pub trait ResponseBody: Send {
    /// Chunk type yielded by the body
    type Chunk: AsRef<[u8]> + Send;

    /// Wait for the next chunk; `None` once the body is exhausted
    async fn next_chunk(&mut self) -> Option<Result<Self::Chunk, TransportError>>;

    /// Release the underlying source
    ///
    /// After this call `next_chunk` returns `None`.
    async fn cancel(&mut self);
}

/// [`ResponseBody`] over a stream of byte chunks
///
/// Cancelling drops the inner stream, which closes the connection for
/// network-backed streams.
pub struct ByteStream<S> {
    inner: Option<S>,
}

impl<S> ByteStream<S> {
    /// Wrap a stream
    pub fn new(stream: S) -> Self {
        Self {
            inner: Some(stream),
        }
    }

    /// Whether `cancel` has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_none()
    }
}

impl<S> std::fmt::Debug for ByteStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[async_trait]
impl<S, B, E> ResponseBody for ByteStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin + Send,
    B: AsRef<[u8]> + Send,
    E: Into<TransportError> + Send,
{
    type Chunk = B;

    async fn next_chunk(&mut self) -> Option<Result<B, TransportError>> {
        let stream = self.inner.as_mut()?;
        stream.next().await.map(|chunk| chunk.map_err(Into::into))
    }

    async fn cancel(&mut self) {
        if self.inner.take().is_some() {
            tracing::trace!("Response body released");
        }
    }
}

/// Lend a body to the reader and keep it for an explicit cancel
#[async_trait]
impl<'a, T> ResponseBody for &'a mut T
where
    T: ResponseBody + ?Sized,
{
    type Chunk = T::Chunk;

    async fn next_chunk(&mut self) -> Option<Result<Self::Chunk, TransportError>> {
        (**self).next_chunk().await
    }

    async fn cancel(&mut self) {
        (**self).cancel().await;
    }
}
