//! Database schemas for POLLX
//!
//! Defines MongoDB document structures for accounts, polls, the vote ledger,
//! comments, notifications, candidacies, elections and system state.

mod candidate;
mod comment;
mod election;
mod metadata;
mod notification;
mod poll;
mod system_state;
mod user;
mod vote;

pub use candidate::{
    CandidateDoc, CandidateStatus, LeadershipProfile, LeadershipStyle, CANDIDATE_COLLECTION,
};
pub(crate) use candidate::default_party;
pub use comment::{CommentDoc, Reaction, COMMENT_COLLECTION};
pub use election::{ElectionDoc, ElectionStatus, ELECTION_COLLECTION};
pub use metadata::Metadata;
pub use notification::{NotificationDoc, NotificationKind, NOTIFICATION_COLLECTION};
pub use poll::{
    archetype_key, Category, ConsciousnessEntry, ConsciousnessLayer, PollChanges, PollDoc,
    PollMode, PollOption, PollStatus, ANONYMOUS_ARCHETYPE, POLL_COLLECTION,
};
pub use system_state::{SystemStateDoc, MOOD_KEY, SYSTEM_STATE_COLLECTION};
pub use user::{ProfileChanges, UserDoc, UserSettings, UserStats, USER_COLLECTION};
pub use vote::{VoteDoc, VOTE_COLLECTION};
