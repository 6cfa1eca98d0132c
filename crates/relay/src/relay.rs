use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use genai_relay_model::{Adapter, Completion, Error, Fragment};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::accumulator::Accumulator;
use crate::cancel::{CancelHandle, CancelToken};
use crate::decoder::PacketDecoder;
use crate::io::Sse;

type CompletionResult = Result<Completion, Error>;

/// Spawns the task reading the stream, and relaying its fragments to
/// `sink` in order.
///
/// The sender is dropped before the result is published, so a receiver
/// that drains the channel then awaits the result never deadlocks.
pub(crate) fn spawn<A: Adapter>(
    sse: Sse,
    decoder: PacketDecoder<A>,
    sink: mpsc::Sender<Fragment>,
    cancel: CancelToken,
) -> oneshot::Receiver<CompletionResult> {
    let (result_tx, result_rx) = oneshot::channel();
    let span = trace_span!("relay", provider = decoder.name());
    tokio::spawn(
        async move {
            let result = produce(sse, decoder, sink, cancel).await;
            match &result {
                Ok(completion) => {
                    debug!("stream completed, usage: {}", completion.usage)
                }
                Err(err) if err.is_cancelled() => debug!("{err}"),
                Err(err) => error!("stream aborted: {err}"),
            }
            result_tx.send(result).ok();
        }
        .instrument(span),
    );
    result_rx
}

async fn produce<A: Adapter>(
    mut sse: Sse,
    decoder: PacketDecoder<A>,
    sink: mpsc::Sender<Fragment>,
    mut cancel: CancelToken,
) -> CompletionResult {
    let mut acc = Accumulator::default();
    loop {
        // A closed sink stops the reads too, even while the body stalls.
        let payload = tokio::select! {
            biased;
            _ = sink.closed() => {
                return Err(Error::cancelled("fragment receiver dropped"));
            }
            payload = sse.next_payload() => payload?,
        };
        let Some(payload) = payload else {
            break;
        };
        trace!("got sse payload: {payload}");
        let packet = decoder.decode(&payload)?;
        let Some(fragment) = acc.fold(packet)? else {
            continue;
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::cancelled(
                    "call cancelled while relaying fragments",
                ));
            }
            sent = sink.send(fragment) => {
                if sent.is_err() {
                    return Err(Error::cancelled("fragment receiver dropped"));
                }
            }
        }
    }
    Ok(acc.finish())
}

/// Awaits the result published by the relay task.
pub(crate) async fn wait_result(
    result: &mut oneshot::Receiver<CompletionResult>,
) -> CompletionResult {
    match result.await {
        Ok(result) => result,
        Err(_) => Err(Error::cancelled("relay task ended without a result")),
    }
}

/// The fragments of a streaming call, followed by its final result.
///
/// Dropping the stream cancels the call, unless a handle obtained from
/// [`CompletionStream::cancel_handle`] is still alive.
#[derive(Debug)]
pub struct CompletionStream {
    fragments: mpsc::Receiver<Fragment>,
    result: oneshot::Receiver<CompletionResult>,
    cancel: CancelHandle,
}

impl CompletionStream {
    pub(crate) fn new(
        fragments: mpsc::Receiver<Fragment>,
        result: oneshot::Receiver<CompletionResult>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            fragments,
            result,
            cancel,
        }
    }

    /// Receives the next fragment. Returns `None` once the call ended,
    /// successfully or not.
    #[inline]
    pub async fn next(&mut self) -> Option<Fragment> {
        self.fragments.recv().await
    }

    /// Cancels the call.
    #[inline]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a handle that can cancel the call from elsewhere.
    #[inline]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Discards the unread fragments and returns the final result.
    pub async fn finish(mut self) -> Result<Completion, Error> {
        while self.fragments.recv().await.is_some() {}
        wait_result(&mut self.result).await
    }
}

impl Stream for CompletionStream {
    type Item = Fragment;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.get_mut().fragments.poll_recv(cx)
    }
}
