use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use genai_relay_model::Error;
use pin_project_lite::pin_project;
use tokio::time::{Sleep, sleep};

use crate::BodyStep;

pin_project! {
    /// A response body replaying [`BodyStep`]s.
    pub struct ScriptedBody {
        steps: VecDeque<BodyStep>,
        #[pin]
        sleep: Option<Sleep>,
    }
}

impl ScriptedBody {
    #[inline]
    pub fn new(steps: impl Into<VecDeque<BodyStep>>) -> Self {
        Self {
            steps: steps.into(),
            sleep: None,
        }
    }
}

impl Stream for ScriptedBody {
    type Item = Result<Bytes, Error>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(sleep) = this.sleep.as_mut().as_pin_mut() {
                ready!(sleep.poll(cx));
                this.sleep.set(None);
            }

            let Some(step) = this.steps.pop_front() else {
                return Poll::Ready(None);
            };
            match step {
                BodyStep::Bytes(data) => {
                    return Poll::Ready(Some(Ok(Bytes::from(data))));
                }
                BodyStep::Text(text) => {
                    return Poll::Ready(Some(Ok(Bytes::from(text))));
                }
                BodyStep::Delay { millis } => {
                    this.sleep.set(Some(sleep(Duration::from_millis(millis))));
                }
                BodyStep::Stall => {
                    // Nothing will ever wake this task up again.
                    this.steps.push_front(BodyStep::Stall);
                    return Poll::Pending;
                }
                BodyStep::Fail(message) => {
                    this.steps.clear();
                    return Poll::Ready(Some(Err(Error::transport(message))));
                }
            }
        }
    }
}
