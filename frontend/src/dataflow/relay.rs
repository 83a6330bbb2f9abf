//! Event channel from UI callbacks into domain actors.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

/// Sending half of an event stream. Cloned into every UI callback that
/// reports the event; the paired receiver is owned by one actor loop.
#[derive(Clone, Debug)]
pub struct Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    sender: UnboundedSender<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    ChannelClosed,
}

impl<T> Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (Relay { sender }, receiver)
    }

    /// Fire-and-forget; events sent after the actor is gone are dropped.
    pub fn send(&self, value: T) {
        let _ = self.sender.unbounded_send(value);
    }

    pub fn try_send(&self, value: T) -> Result<(), RelayError> {
        self.sender
            .unbounded_send(value)
            .map_err(|_| RelayError::ChannelClosed)
    }
}

impl<T> Default for Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        let (relay, _receiver) = Self::new();
        relay
    }
}

pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>)
where
    T: Clone + Send + Sync + 'static,
{
    Relay::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use shared::SelectionEdit;

    #[tokio::test]
    async fn edits_arrive_in_send_order() {
        let (relay, mut receiver) = relay::<SelectionEdit>();
        relay.send(SelectionEdit::Zoom(150));
        relay.send(SelectionEdit::Brightness(120));

        assert_eq!(receiver.next().await, Some(SelectionEdit::Zoom(150)));
        assert_eq!(receiver.next().await, Some(SelectionEdit::Brightness(120)));
    }

    #[tokio::test]
    async fn cloned_relays_share_one_stream() {
        let (relay, mut receiver) = Relay::new();
        let toolbar = relay.clone();
        relay.send("grid".to_string());
        toolbar.send("toolbar".to_string());

        assert_eq!(receiver.next().await, Some("grid".to_string()));
        assert_eq!(receiver.next().await, Some("toolbar".to_string()));
    }

    #[tokio::test]
    async fn try_send_reports_closed_channel() {
        let (relay, mut receiver) = Relay::new();
        assert!(relay.try_send(1).is_ok());
        assert_eq!(receiver.next().await, Some(1));

        drop(receiver);
        assert_eq!(relay.try_send(2), Err(RelayError::ChannelClosed));
    }

    #[test]
    fn default_relay_drops_events_silently() {
        let relay = Relay::<u32>::default();
        relay.send(7);
        assert!(relay.try_send(8).is_err());
    }
}
