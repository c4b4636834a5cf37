//! Shared registry of recipient channels and the broadcast fan-out.
//!
//! The registry is the only shared mutable state in the server. A channel is
//! present exactly while its owning session is registered: added when the
//! handshake completes, removed when the session terminates. All membership
//! changes and every fan-out take the same mutex, and the lock is held for
//! the whole fan-out - so membership cannot change mid-broadcast and two
//! concurrent broadcasts are serialized, never interleaved per recipient.
//!
//! Delivery into a recipient's queue is `try_send`: a full or closed queue is
//! logged and skipped so one slow or dead client cannot stall the room. The
//! failed channel stays registered - removal is its owning session's job when
//! that session notices its own socket is gone.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use parlor_proto::message;
use tokio::sync::mpsc;

/// Identifies one connection for the lifetime of the process.
pub type SessionId = u64;

/// One queued delivery for a single recipient.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A rendered chat line, sent as one `TEXT` frame.
    Line(String),
    /// An image: the `IMAGE <sender>` header frame immediately followed by
    /// the bytes frame. Queued as a single item so no other broadcast can
    /// land between the pair on this channel.
    Image {
        /// Registered name of the sending session
        sender: String,
        /// Raw image payload
        bytes: Bytes,
    },
}

/// The mutation-guarded set of outbound channels, one per registered session.
#[derive(Debug, Default)]
pub struct Registry {
    channels: Mutex<HashMap<SessionId, mpsc::Sender<Outbound>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session's channel. Called once, when its handshake completes.
    pub fn register(&self, id: SessionId, channel: mpsc::Sender<Outbound>) {
        self.lock().insert(id, channel);
    }

    /// Remove a session's channel. No-op if it was already removed.
    pub fn unregister(&self, id: SessionId) {
        self.lock().remove(&id);
    }

    /// Number of currently registered sessions.
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Broadcast a chat message, rendered as `<sender>: <body>`.
    pub fn broadcast_text(&self, sender: &str, body: &str) {
        self.fan_out(&Outbound::Line(message::chat_line(sender, body)));
    }

    /// Broadcast the join notice for a freshly registered session.
    pub fn broadcast_joined(&self, name: &str) {
        self.fan_out(&Outbound::Line(message::joined_notice(name)));
    }

    /// Broadcast the departure notice for a terminated session.
    pub fn broadcast_left(&self, name: &str) {
        self.fan_out(&Outbound::Line(message::left_notice(name)));
    }

    /// Broadcast an image to every registered session.
    pub fn broadcast_image(&self, sender: &str, bytes: Bytes) {
        self.fan_out(&Outbound::Image { sender: sender.to_string(), bytes });
    }

    fn fan_out(&self, item: &Outbound) {
        let channels = self.lock();
        for (id, channel) in channels.iter() {
            if let Err(error) = channel.try_send(item.clone()) {
                tracing::warn!(session = id, %error, "skipping delivery to slow or closed channel");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, mpsc::Sender<Outbound>>> {
        // The map is always internally consistent, so a poisoned lock from a
        // panicked holder is safe to recover.
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribe(registry: &Registry, id: SessionId, capacity: usize) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(capacity);
        registry.register(id, tx);
        rx
    }

    fn expect_line(rx: &mut mpsc::Receiver<Outbound>, expected: &str) {
        match rx.try_recv() {
            Ok(Outbound::Line(line)) => assert_eq!(line, expected),
            other => panic!("expected line {expected:?}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_channel() {
        let registry = Registry::new();
        let mut rx_a = subscribe(&registry, 1, 8);
        let mut rx_b = subscribe(&registry, 2, 8);

        registry.broadcast_text("alice", "hi");

        expect_line(&mut rx_a, "alice: hi");
        expect_line(&mut rx_b, "alice: hi");
    }

    #[tokio::test]
    async fn recipients_observe_broadcasts_in_issue_order() {
        let registry = Registry::new();
        let mut rx = subscribe(&registry, 1, 8);

        registry.broadcast_joined("alice");
        registry.broadcast_text("alice", "one");
        registry.broadcast_text("alice", "two");
        registry.broadcast_left("alice");

        expect_line(&mut rx, "alice joined the chat");
        expect_line(&mut rx, "alice: one");
        expect_line(&mut rx, "alice: two");
        expect_line(&mut rx, "alice left the chat");
    }

    #[tokio::test]
    async fn unregistered_channel_stops_receiving() {
        let registry = Registry::new();
        let mut rx_a = subscribe(&registry, 1, 8);
        let mut rx_b = subscribe(&registry, 2, 8);

        registry.unregister(2);
        registry.broadcast_text("alice", "hi");

        expect_line(&mut rx_a, "alice: hi");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_is_a_noop_when_already_removed() {
        let registry = Registry::new();
        let _rx = subscribe(&registry, 1, 8);

        registry.unregister(1);
        registry.unregister(1);

        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_is_skipped_without_stalling_others() {
        let registry = Registry::new();
        let mut rx_slow = subscribe(&registry, 1, 1);
        let mut rx_fast = subscribe(&registry, 2, 8);

        registry.broadcast_text("alice", "fills the slow queue");
        registry.broadcast_text("alice", "dropped for the slow one");

        expect_line(&mut rx_slow, "alice: fills the slow queue");
        assert!(rx_slow.try_recv().is_err());

        expect_line(&mut rx_fast, "alice: fills the slow queue");
        expect_line(&mut rx_fast, "alice: dropped for the slow one");

        // The failed channel is not evicted here; that is its session's job.
        assert_eq!(registry.session_count(), 2);
    }

    #[tokio::test]
    async fn image_broadcast_carries_sender_and_bytes_as_one_item() {
        let registry = Registry::new();
        let mut rx = subscribe(&registry, 1, 8);

        registry.broadcast_image("alice", Bytes::from_static(&[1, 2, 3]));

        match rx.try_recv() {
            Ok(Outbound::Image { sender, bytes }) => {
                assert_eq!(sender, "alice");
                assert_eq!(&bytes[..], &[1, 2, 3]);
            },
            other => panic!("expected image, got {other:?}"),
        }
    }
}
