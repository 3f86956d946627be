//! Idle timeout for the feed socket.
//!
//! A half-open WebSocket can stay silent forever without producing an error. [`IdleTimeout`]
//! ends the wrapped stream once nothing has arrived for the configured period, which hands
//! control back to the reconnect loop.

use futures::Stream;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};

#[derive(Debug)]
pub struct IdleTimeout<S> {
    inner: S,
    period: Duration,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl<S> IdleTimeout<S> {
    pub fn new(inner: S, period: Duration) -> Self {
        Self {
            inner,
            period,
            deadline: Box::pin(tokio::time::sleep(period)),
            expired: false,
        }
    }

    /// Check if the stream ended because the idle period elapsed.
    pub fn expired(&self) -> bool {
        self.expired
    }
}

impl<S> Stream for IdleTimeout<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.expired {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                let period = self.period;
                self.deadline.as_mut().reset(Instant::now() + period);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    tracing::warn!(
                        timeout_secs = self.period.as_secs(),
                        "feed idle timeout, no data received"
                    );
                    self.expired = true;
                    Poll::Ready(None)
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
