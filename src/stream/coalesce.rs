//! Latest-wins rate limiting for event streams.

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, interval};

/// Extension trait adding coalescing to any stream.
///
/// A dashboard that only renders current state does not need every
/// `LapIngested` event of a busy feed tick; coalescing emits at most one
/// item per interval and keeps only the latest when several arrive in
/// between.
pub trait CoalesceExt: Stream {
    /// Emit at most one item per `interval`, latest-wins.
    fn coalesce(self, interval: Duration) -> Coalesce<Self>
    where
        Self: Sized,
    {
        Coalesce::new(self, interval)
    }
}

impl<T: Stream> CoalesceExt for T {}

pin_project! {
    /// Stream combinator created by [`CoalesceExt::coalesce`].
    pub struct Coalesce<S: Stream> {
        #[pin]
        stream: S,
        ticker: Interval,
        pending: Option<S::Item>,
        ended: bool,
    }
}

impl<S: Stream> Coalesce<S> {
    fn new(stream: S, duration: Duration) -> Self {
        let mut ticker = interval(duration);
        // Delay missed ticks instead of bursting to catch up.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Self { stream, ticker, pending: None, ended: false }
    }
}

impl<S: Stream> Stream for Coalesce<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.ended && this.pending.is_none() {
            return Poll::Ready(None);
        }

        loop {
            ready!(this.ticker.poll_tick(cx));

            // Drain whatever queued up since the last tick, keeping the latest.
            while !*this.ended {
                match this.stream.as_mut().poll_next(cx) {
                    Poll::Ready(Some(item)) => *this.pending = Some(item),
                    Poll::Ready(None) => *this.ended = true,
                    Poll::Pending => break,
                }
            }

            if let Some(item) = this.pending.take() {
                return Poll::Ready(Some(item));
            }
            if *this.ended {
                // Source ended with nothing buffered: the stream is done.
                return Poll::Ready(None);
            }
            // Nothing new this tick; wait for the next one.
        }
    }
}
