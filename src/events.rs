//! Change notifications.
//!
//! Every committed transaction publishes one `ChangeEvent` per written key on a
//! broadcast channel. Views subscribe and rebuild only when something changed
//! instead of re-reading the whole store on a timer.

use crate::backend::WriteOp;
use crate::data::EntityKind;
use crate::key::parse_key;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Set,
    Merge,
    Delete,
}

/// One committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    /// The kind implied by the key's namespace, if it has one.
    pub kind: Option<EntityKind>,
    pub change: ChangeKind,
}

impl ChangeEvent {
    /// The event for a write, or `None` for ops that change nothing.
    pub fn from_op(op: &WriteOp) -> Option<Self> {
        let change = match op {
            WriteOp::Set { .. } => ChangeKind::Set,
            WriteOp::Merge { .. } => ChangeKind::Merge,
            WriteOp::Delete { .. } => ChangeKind::Delete,
            WriteOp::Expect { .. } => return None,
        };
        Some(Self {
            key: op.key().to_string(),
            kind: parse_key(op.key()).map(|(kind, _)| kind),
            change,
        })
    }
}

/// Publishing side of the change channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes the writes of a committed batch. Having no subscribers is not an error.
    pub fn publish(&self, batch: &[WriteOp]) {
        if self.sender.receiver_count() == 0 {
            return;
        }
        for event in batch.iter().filter_map(ChangeEvent::from_op) {
            let _ = self.sender.send(event);
        }
    }
}
