#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use genai_relay_model::{Body, Error};

use crate::cancel::CancelToken;

/// An adapter for streaming byte chunks that stops on cancellation.
pub(crate) struct Chunks {
    body: Body,
    cancel: CancelToken,
}

impl Chunks {
    #[inline]
    pub(crate) fn new(body: Body, cancel: CancelToken) -> Self {
        Self { body, cancel }
    }

    #[cfg(test)]
    pub(crate) fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        let stream = futures_util::stream::iter(vec.into_iter().map(Ok));
        Self::new(Body::from_stream(stream), CancelToken::never())
    }

    /// Reads the next chunk, or fails with a cancellation error once the
    /// token fires. The body is left untouched on cancellation; dropping
    /// `Chunks` releases the connection.
    #[inline]
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let Self { body, cancel } = self;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(Error::cancelled("call cancelled while reading the stream"))
            }
            chunk = body.next_chunk() => chunk,
        }
    }
}
