//! Vote ledger
//!
//! One vote per (user, poll). The ledger entry insert is the only
//! serialisation point: whoever inserts first wins and every other attempt
//! gets `DuplicateVote`, whether it lost a race or came later. Tallies and
//! voter stats only move after a successful insert.

use bson::oid::ObjectId;
use bson::DateTime as BsonDateTime;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::schemas::{
    ConsciousnessEntry, ConsciousnessLayer, PollMode, UserDoc, VoteDoc, ANONYMOUS_ARCHETYPE,
};
use crate::notify::{Event, Fanout, PollRef};
use crate::store::{PollStore, TallyUpdate, UserStore, VoteStore};
use crate::types::{PollxError, Result};

/// Experience awarded per successful vote
pub const VOTE_XP: i64 = 10;

/// Result of a successful standard vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub poll_id: ObjectId,
    pub option_id: ObjectId,
    pub option_votes: i64,
    pub total_votes: i64,
}

/// A consciousness-mode submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsciousnessInput {
    pub text: String,
    pub intensity: i32,
    #[serde(default)]
    pub layer: ConsciousnessLayer,
    #[serde(default)]
    pub emoji: Option<String>,
}

/// Label counted in an option's archetype breakdown for this voter
pub fn archetype_label(voter: &UserDoc) -> &str {
    let title = voter.identity_title.trim();
    if title.is_empty() {
        ANONYMOUS_ARCHETYPE
    } else {
        title
    }
}

/// Vote ledger over the poll, vote and user stores
pub struct VoteLedger {
    polls: Arc<dyn PollStore>,
    votes: Arc<dyn VoteStore>,
    users: Arc<dyn UserStore>,
    fanout: Arc<Fanout>,
}

impl VoteLedger {
    pub fn new(
        polls: Arc<dyn PollStore>,
        votes: Arc<dyn VoteStore>,
        users: Arc<dyn UserStore>,
        fanout: Arc<Fanout>,
    ) -> Self {
        Self {
            polls,
            votes,
            users,
            fanout,
        }
    }

    /// Cast `voter`'s single vote on a standard poll
    pub async fn cast_vote(
        &self,
        voter: &UserDoc,
        poll_id: &ObjectId,
        option_id: &ObjectId,
    ) -> Result<VoteReceipt> {
        let poll = self
            .polls
            .find_by_id(poll_id)
            .await?
            .ok_or_else(|| PollxError::NotFound("Poll not found".into()))?;

        if poll.mode != PollMode::Standard {
            return Err(PollxError::InvalidMode(
                "Cannot vote standard on this poll mode".into(),
            ));
        }

        if poll.option(option_id).is_none() {
            return Err(PollxError::NotFound("Option not found".into()));
        }

        // Sole serialisation point
        self.votes
            .insert(VoteDoc::new(voter.id, *poll_id, *option_id))
            .await?;

        let tally = match self
            .polls
            .increment_tally(poll_id, option_id, archetype_label(voter))
            .await
        {
            Ok(Some(tally)) => tally,
            Ok(None) => {
                // Poll or option vanished between the read and the increment
                self.release(voter, poll_id).await;
                return Err(PollxError::NotFound("Poll not found".into()));
            }
            Err(e) => {
                self.release(voter, poll_id).await;
                return Err(e);
            }
        };

        // Runs at most once per ledger entry, so retries cannot double-award.
        // A failure here leaves the committed vote standing.
        if let Err(e) = self.users.record_vote(&voter.id, VOTE_XP).await {
            error!(
                user_id = %voter.id,
                poll_id = %poll_id,
                error = %e,
                "Vote counted but voter stats not updated"
            );
        }

        info!(
            poll_id = %poll_id,
            option_id = %option_id,
            total_votes = tally.total_votes,
            "Vote recorded"
        );

        self.fanout
            .dispatch(Event::VoteCast {
                poll: PollRef {
                    id: poll.id,
                    author_id: poll.author_id,
                    question: poll.question.clone(),
                },
                voter_id: voter.id,
                ghost_mode: voter.settings.ghost_mode,
                option_id: *option_id,
                tally,
            })
            .await;

        Ok(receipt(*poll_id, *option_id, tally))
    }

    /// Append a free-text entry to a consciousness poll. No per-user limit.
    pub async fn add_consciousness_entry(
        &self,
        author: &UserDoc,
        poll_id: &ObjectId,
        input: ConsciousnessInput,
    ) -> Result<i64> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(PollxError::BadRequest("Entry text is required".into()));
        }
        if !(0..=100).contains(&input.intensity) {
            return Err(PollxError::BadRequest(
                "Intensity must be between 0 and 100".into(),
            ));
        }

        let poll = self
            .polls
            .find_by_id(poll_id)
            .await?
            .ok_or_else(|| PollxError::NotFound("Poll not found".into()))?;

        if poll.mode != PollMode::Consciousness {
            return Err(PollxError::InvalidMode("Invalid poll or mode".into()));
        }

        let entry = ConsciousnessEntry {
            id: ObjectId::new(),
            text: text.to_string(),
            intensity: input.intensity,
            layer: input.layer,
            emoji: input.emoji.filter(|e| !e.trim().is_empty()),
            user_id: Some(author.id),
            created_at: BsonDateTime::now(),
        };

        let total = self
            .polls
            .push_consciousness_entry(poll_id, entry)
            .await?
            .ok_or_else(|| PollxError::NotFound("Poll not found".into()))?;

        info!(poll_id = %poll_id, total_votes = total, "Consciousness entry added");
        Ok(total)
    }

    /// Undo a ledger entry whose tally update did not land
    async fn release(&self, voter: &UserDoc, poll_id: &ObjectId) {
        if let Err(e) = self.votes.delete(&voter.id, poll_id).await {
            warn!(poll_id = %poll_id, error = %e, "Failed to release vote ledger entry");
        }
    }
}

fn receipt(poll_id: ObjectId, option_id: ObjectId, tally: TallyUpdate) -> VoteReceipt {
    VoteReceipt {
        poll_id,
        option_id,
        option_votes: tally.option_votes,
        total_votes: tally.total_votes,
    }
}
