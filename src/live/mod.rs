//! Live tally channel
//!
//! One broadcast topic per poll. Delivery is best-effort: there is no
//! backlog, a lagging subscriber skips what it missed and a disconnected one
//! simply stops receiving until it joins again.

use bson::oid::ObjectId;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Event pushed to every subscriber of a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    #[serde(rename_all = "camelCase")]
    VoteUpdated {
        poll_id: String,
        option_id: String,
        option_votes: i64,
        total_votes: i64,
    },
}

/// Hub of per-poll broadcast topics
pub struct LiveHub {
    topics: DashMap<ObjectId, broadcast::Sender<LiveEvent>>,
    capacity: usize,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Join a poll's topic, creating it on first use
    pub fn subscribe(&self, poll_id: &ObjectId) -> broadcast::Receiver<LiveEvent> {
        self.topics
            .entry(*poll_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Push an event to the poll's subscribers.
    ///
    /// Returns the number of receivers reached. A topic nobody listens to
    /// any more is dropped.
    pub fn publish(&self, poll_id: &ObjectId, event: LiveEvent) -> usize {
        let Some(sender) = self.topics.get(poll_id).map(|s| s.clone()) else {
            return 0;
        };

        match sender.send(event) {
            Ok(reached) => reached,
            Err(_) => {
                self.topics
                    .remove_if(poll_id, |_, s| s.receiver_count() == 0);
                debug!(poll_id = %poll_id, "Dropped idle live topic");
                0
            }
        }
    }

    /// Number of topics currently held
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new(64)
    }
}
