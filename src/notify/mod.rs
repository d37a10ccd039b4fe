//! Notification fan-out
//!
//! Turns mutating events into persistent notifications and live pushes.
//! Dispatch never fails. Each notification is written on its own: a storage
//! error is logged, the remaining recipients are still notified and the
//! triggering mutation still stands.

mod mentions;

pub use mentions::{distinct_handles, extract_mentions};

use bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::schemas::{CommentDoc, NotificationDoc, NotificationKind, PollStatus};
use crate::live::{LiveEvent, LiveHub};
use crate::store::{CommentStore, NotificationStore, TallyUpdate, UserStore};

const VOTE_PREVIEW: usize = 20;
const COMMENT_PREVIEW: usize = 30;
const REPLY_PREVIEW: usize = 30;
const MENTION_PREVIEW: usize = 20;
const SYSTEM_PREVIEW: usize = 30;

/// First `max` characters of `text`
pub fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// The parts of a poll a notification needs
#[derive(Debug, Clone)]
pub struct PollRef {
    pub id: ObjectId,
    pub author_id: ObjectId,
    pub question: String,
}

/// Mutating events that may notify someone
#[derive(Debug, Clone)]
pub enum Event {
    VoteCast {
        poll: PollRef,
        voter_id: ObjectId,
        ghost_mode: bool,
        option_id: ObjectId,
        tally: TallyUpdate,
    },
    CommentPosted {
        poll: PollRef,
        comment: CommentDoc,
    },
    PollModerated {
        poll: PollRef,
        status: PollStatus,
    },
}

/// Fan-out of events to notifications and live subscribers
pub struct Fanout {
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
    comments: Arc<dyn CommentStore>,
    live: Arc<LiveHub>,
}

impl Fanout {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
        comments: Arc<dyn CommentStore>,
        live: Arc<LiveHub>,
    ) -> Self {
        Self {
            notifications,
            users,
            comments,
            live,
        }
    }

    /// Handle one event. Returns how many notifications were written.
    pub async fn dispatch(&self, event: Event) -> usize {
        match event {
            Event::VoteCast {
                poll,
                voter_id,
                ghost_mode,
                option_id,
                tally,
            } => {
                self.on_vote(&poll, voter_id, ghost_mode, option_id, tally)
                    .await
            }
            Event::CommentPosted { poll, comment } => self.on_comment(&poll, &comment).await,
            Event::PollModerated { poll, status } => self.on_moderated(&poll, status).await,
        }
    }

    async fn on_vote(
        &self,
        poll: &PollRef,
        voter_id: ObjectId,
        ghost_mode: bool,
        option_id: ObjectId,
        tally: TallyUpdate,
    ) -> usize {
        // Live push goes out regardless of ghost mode
        let reached = self.live.publish(
            &poll.id,
            LiveEvent::VoteUpdated {
                poll_id: poll.id.to_hex(),
                option_id: option_id.to_hex(),
                option_votes: tally.option_votes,
                total_votes: tally.total_votes,
            },
        );
        debug!(poll_id = %poll.id, reached, "vote_updated published");

        if voter_id == poll.author_id || ghost_mode {
            return 0;
        }

        self.notify(
            poll.author_id,
            Some(voter_id),
            NotificationKind::Vote,
            poll.id,
            format!(
                "voted on your poll: \"{}...\"",
                preview(&poll.question, VOTE_PREVIEW)
            ),
        )
        .await
    }

    async fn on_comment(&self, poll: &PollRef, comment: &CommentDoc) -> usize {
        let author = comment.author_id;

        let written = match comment.parent_id {
            Some(parent_id) => match self.comments.find_by_id(&parent_id).await {
                // A missing parent yields no reply notification
                Ok(parent) => match parent.filter(|p| p.author_id != author) {
                    Some(parent) => {
                        self.notify(
                            parent.author_id,
                            Some(author),
                            NotificationKind::Reply,
                            poll.id,
                            format!(
                                "replied to your comment: \"{}...\"",
                                preview(&comment.text, REPLY_PREVIEW)
                            ),
                        )
                        .await
                    }
                    None => 0,
                },
                Err(e) => {
                    warn!(comment_id = %parent_id, error = %e, "Parent comment lookup failed");
                    0
                }
            },
            None if poll.author_id != author => {
                self.notify(
                    poll.author_id,
                    Some(author),
                    NotificationKind::Comment,
                    poll.id,
                    format!(
                        "commented on your poll: \"{}...\"",
                        preview(&comment.text, COMMENT_PREVIEW)
                    ),
                )
                .await
            }
            None => 0,
        };

        written + self.on_mentions(poll, comment).await
    }

    /// One mention notification per match occurrence that resolves to
    /// someone other than the comment's author
    async fn on_mentions(&self, poll: &PollRef, comment: &CommentDoc) -> usize {
        let mentions = extract_mentions(&comment.text);
        if mentions.is_empty() {
            return 0;
        }

        let resolved: HashMap<String, ObjectId> = match self
            .users
            .find_by_usernames(&distinct_handles(&mentions))
            .await
        {
            Ok(users) => users.into_iter().map(|u| (u.username, u.id)).collect(),
            Err(e) => {
                warn!(comment_id = %comment.id, error = %e, "Mention lookup failed");
                return 0;
            }
        };

        let message = format!(
            "mentioned you in a comment: \"{}...\"",
            preview(&comment.text, MENTION_PREVIEW)
        );

        let mut written = 0;
        for handle in &mentions {
            let Some(recipient) = resolved.get(handle) else {
                continue;
            };
            if *recipient == comment.author_id {
                continue;
            }
            written += self
                .notify(
                    *recipient,
                    Some(comment.author_id),
                    NotificationKind::Mention,
                    poll.id,
                    message.clone(),
                )
                .await;
        }
        written
    }

    async fn on_moderated(&self, poll: &PollRef, status: PollStatus) -> usize {
        if status == PollStatus::Pending {
            return 0;
        }

        self.notify(
            poll.author_id,
            None,
            NotificationKind::System,
            poll.id,
            format!(
                "Your poll \"{}...\" was {}.",
                preview(&poll.question, SYSTEM_PREVIEW),
                status
            ),
        )
        .await
    }

    /// Write one notification. Returns 1 when stored; a failure is logged
    /// and counts as 0.
    async fn notify(
        &self,
        recipient: ObjectId,
        sender: Option<ObjectId>,
        kind: NotificationKind,
        poll_id: ObjectId,
        message: String,
    ) -> usize {
        let written = self
            .notifications
            .insert(NotificationDoc::new(
                recipient,
                sender,
                kind,
                Some(poll_id),
                message,
            ))
            .await;

        match written {
            Ok(_) => {
                debug!(recipient = %recipient, kind = %kind, "Notification created");
                1
            }
            Err(e) => {
                warn!(recipient = %recipient, kind = %kind, error = %e, "Notification write failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("héllo wörld", 4), "héll");
        assert_eq!(preview("ab", 20), "ab");
    }
}
