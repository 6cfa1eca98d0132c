use std::sync::Arc;

use tokio::sync::watch;

/// Creates a connected cancellation handle and token.
pub(crate) fn pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle {
            inner: Arc::new(HandleInner { tx }),
        },
        CancelToken { rx },
    )
}

/// Cancels a running call.
///
/// The call is also cancelled once every clone of the handle is dropped.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    inner: Arc<HandleInner>,
}

impl CancelHandle {
    /// Requests the cancellation of the call.
    #[inline]
    pub fn cancel(&self) {
        self.inner.tx.send_replace(true);
    }

    /// Returns `true` if the cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.tx.borrow()
    }
}

#[derive(Debug)]
struct HandleInner {
    tx: watch::Sender<bool>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

/// The receiving side of a [`CancelHandle`], held by the worker.
#[derive(Clone, Debug)]
pub(crate) struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that never fires.
    #[cfg(test)]
    pub(crate) fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    /// Waits until the cancellation is requested.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe.
    pub(crate) async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // The channel closed without ever being cancelled, which only
            // happens for tokens that are not tied to a handle.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_cancel() {
        let (handle, mut token) = pair();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_on_drop() {
        let (handle, mut token) = pair();
        let cloned = handle.clone();
        drop(handle);
        assert!(!cloned.is_cancelled());
        drop(cloned);
        timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_never() {
        let mut token = CancelToken::never();
        let fired =
            timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(fired.is_err());
    }
}
