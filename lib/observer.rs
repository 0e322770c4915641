// Observer: owner-side callbacks for connection events

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, Sender};

/// Receives inbound data and the disconnect notification of a connection.
///
/// Both methods run on the connection's receive thread, never on the thread
/// that called `connect`. They may call back into the `Connection`.
pub trait ConnectionObserver: Send + Sync {
    /// One inbound chunk, exactly as a single read returned it.
    fn on_read(&self, data: Bytes);

    /// Called once per worker, after the stream has been released.
    fn on_disconnected(&self, by_remote: bool);
}

/// Event form of the [`ConnectionObserver`] callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Data(Bytes),
    Disconnected { by_remote: bool },
}

/// Observer that queues events on a channel for the owner to consume.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<ConnectionEvent>,
}

/// Create a [`ChannelObserver`] and the receiver its events arrive on.
pub fn event_channel() -> (ChannelObserver, Receiver<ConnectionEvent>) {
    let (tx, rx) = unbounded();
    (ChannelObserver { tx }, rx)
}

impl ConnectionObserver for ChannelObserver {
    fn on_read(&self, data: Bytes) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(ConnectionEvent::Data(data));
    }

    fn on_disconnected(&self, by_remote: bool) {
        let _ = self.tx.send(ConnectionEvent::Disconnected { by_remote });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (observer, rx) = event_channel();
        observer.on_read(Bytes::from_static(b"ab"));
        observer.on_read(Bytes::from_static(b"c"));
        observer.on_disconnected(true);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ConnectionEvent::Data(Bytes::from_static(b"ab")),
                ConnectionEvent::Data(Bytes::from_static(b"c")),
                ConnectionEvent::Disconnected { by_remote: true },
            ]
        );
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = event_channel();
        drop(rx);
        observer.on_read(Bytes::from_static(b"x"));
        observer.on_disconnected(false);
    }
}
