//! This module contains the core [`Subscription`] type that consumers of
//! the chain façade use to observe new events.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::mpsc;

/// A generic subscription to an event stream. It wraps an unbounded channel
/// receiver and implements [`futures::Stream`] for consuming events
/// asynchronously. Dropping the subscription releases it; the producer side
/// prunes senders whose receiver is gone.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Creates a new subscription from an unbounded receiver.
    pub const fn from_receiver(receiver: mpsc::UnboundedReceiver<T>) -> Subscription<T> {
        Subscription { receiver }
    }

    /// Creates a connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<T>, Subscription<T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Subscription::from_receiver(receiver))
    }

    /// Returns the number of events waiting in the backlog.
    pub fn backlog(&self) -> usize {
        self.receiver.len()
    }
}

impl<T> futures::Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn delivers_events_in_order() {
        let (sender, mut subscription) = Subscription::channel();
        sender.send(1u32).unwrap();
        sender.send(2u32).unwrap();

        assert_eq!(subscription.backlog(), 2);
        assert_eq!(subscription.next().await, Some(1));
        assert_eq!(subscription.next().await, Some(2));
    }

    #[tokio::test]
    async fn ends_when_sender_dropped() {
        let (sender, mut subscription) = Subscription::<u32>::channel();
        drop(sender);
        assert_eq!(subscription.next().await, None);
    }
}
