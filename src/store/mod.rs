//! Storage collaborators
//!
//! Every service talks to storage through these traits. `MongoStore` backs
//! production; `MemoryStore` backs dev mode and tests with the same
//! uniqueness and atomic-increment guarantees.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::schemas::{
    CandidateDoc, CandidateStatus, CommentDoc, ConsciousnessEntry, ElectionDoc, ElectionStatus,
    NotificationDoc, PollChanges, PollDoc, PollStatus, ProfileChanges, Reaction, SystemStateDoc,
    UserDoc, VoteDoc,
};
use crate::db::MongoClient;
use crate::types::Result;

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Tallies after a successful increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyUpdate {
    pub option_votes: i64,
    pub total_votes: i64,
}

/// One row of the trending topics list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    #[serde(rename = "_id")]
    pub tag: String,
    pub count: i64,
}

/// Campaign data attached when a candidate joins an election
#[derive(Debug, Clone, Default)]
pub struct CampaignUpdate {
    pub election_id: ObjectId,
    pub symbol: Option<String>,
    pub promises: Vec<String>,
    pub key_issues: Vec<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account. Duplicate email or username is a `Conflict`.
    async fn insert(&self, user: UserDoc) -> Result<UserDoc>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<UserDoc>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>>;
    /// Exact username matches, one query for the whole list
    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<UserDoc>>;
    /// Case-insensitive literal substring match
    async fn search_usernames(&self, fragment: &str, limit: usize) -> Result<Vec<UserDoc>>;
    /// Write only the given profile fields and return the updated account.
    /// A username taken by someone else is a `Conflict`.
    async fn update_profile(
        &self,
        user_id: &ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<UserDoc>>;
    /// Set the login streak and last-active instant, returning the updated account
    async fn record_login(
        &self,
        user_id: &ObjectId,
        streak: i64,
        at: BsonDateTime,
    ) -> Result<Option<UserDoc>>;
    /// Atomically add one vote and `xp` experience
    async fn record_vote(&self, user_id: &ObjectId, xp: i64) -> Result<()>;
    async fn set_badges(&self, user_id: &ObjectId, badges: &[String]) -> Result<()>;
}

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert(&self, poll: PollDoc) -> Result<PollDoc>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<PollDoc>>;
    async fn list_by_status(&self, status: PollStatus, newest_first: bool) -> Result<Vec<PollDoc>>;
    /// Newest first
    async fn list_by_author(&self, author_id: &ObjectId) -> Result<Vec<PollDoc>>;
    /// Apply an owner edit against the stored poll, leaving live tallies
    /// intact. `None` when the poll is gone.
    async fn apply_edit(&self, id: &ObjectId, changes: &PollChanges) -> Result<Option<PollDoc>>;
    async fn set_status(&self, id: &ObjectId, status: PollStatus) -> Result<Option<PollDoc>>;
    async fn delete(&self, id: &ObjectId) -> Result<bool>;
    /// Atomically add one vote to the option, the poll total and the
    /// option's archetype counter. `None` when the poll or option is gone.
    async fn increment_tally(
        &self,
        poll_id: &ObjectId,
        option_id: &ObjectId,
        archetype: &str,
    ) -> Result<Option<TallyUpdate>>;
    /// Atomically append an entry and add one to the total. Returns the new
    /// total, or `None` when the poll is gone.
    async fn push_consciousness_entry(
        &self,
        poll_id: &ObjectId,
        entry: ConsciousnessEntry,
    ) -> Result<Option<i64>>;
    /// Approved polls created at or after `since`
    async fn recent_approved(&self, since: DateTime<Utc>) -> Result<Vec<PollDoc>>;
    /// Tags of approved polls by count descending, ties by tag name
    async fn trending_tags(&self, limit: usize) -> Result<Vec<TagCount>>;
}

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Create the ledger entry. An existing (user, poll) entry is `DuplicateVote`.
    async fn insert(&self, vote: VoteDoc) -> Result<()>;
    async fn find(&self, user_id: &ObjectId, poll_id: &ObjectId) -> Result<Option<VoteDoc>>;
    async fn delete(&self, user_id: &ObjectId, poll_id: &ObjectId) -> Result<bool>;
    async fn delete_for_poll(&self, poll_id: &ObjectId) -> Result<u64>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: CommentDoc) -> Result<CommentDoc>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<CommentDoc>>;
    /// Newest first
    async fn list_by_poll(&self, poll_id: &ObjectId) -> Result<Vec<CommentDoc>>;
    async fn react(
        &self,
        id: &ObjectId,
        user_id: &ObjectId,
        reaction: Reaction,
    ) -> Result<Option<CommentDoc>>;
    async fn delete_for_poll(&self, poll_id: &ObjectId) -> Result<u64>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: NotificationDoc) -> Result<NotificationDoc>;
    /// Newest first
    async fn list_for_recipient(
        &self,
        recipient: &ObjectId,
        limit: usize,
    ) -> Result<Vec<NotificationDoc>>;
    /// Only flips the flag when `recipient` owns the notification
    async fn mark_read(&self, id: &ObjectId, recipient: &ObjectId) -> Result<bool>;
    async fn mark_all_read(&self, recipient: &ObjectId) -> Result<u64>;
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// One candidacy per user. A second one is a `Conflict`.
    async fn insert(&self, candidate: CandidateDoc) -> Result<CandidateDoc>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<CandidateDoc>>;
    async fn find_by_user(&self, user_id: &ObjectId) -> Result<Option<CandidateDoc>>;
    /// Newest first, optionally filtered by status
    async fn list(&self, status: Option<CandidateStatus>) -> Result<Vec<CandidateDoc>>;
    async fn set_status(
        &self,
        id: &ObjectId,
        status: CandidateStatus,
    ) -> Result<Option<CandidateDoc>>;
    async fn set_campaign(
        &self,
        id: &ObjectId,
        campaign: CampaignUpdate,
    ) -> Result<Option<CandidateDoc>>;
}

#[async_trait]
pub trait ElectionStore: Send + Sync {
    async fn insert(&self, election: ElectionDoc) -> Result<ElectionDoc>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<ElectionDoc>>;
    /// Newest first
    async fn list(&self) -> Result<Vec<ElectionDoc>>;
    async fn set_status(
        &self,
        id: &ObjectId,
        status: ElectionStatus,
    ) -> Result<Option<ElectionDoc>>;
    /// Link a candidate, once
    async fn add_candidate(&self, id: &ObjectId, candidate_id: &ObjectId) -> Result<bool>;
}

#[async_trait]
pub trait SystemStateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SystemStateDoc>>;
    /// Upsert the freshness timestamp without touching the value
    async fn touch(&self, key: &str, at: DateTime<Utc>) -> Result<()>;
    /// Upsert the value and the freshness timestamp
    async fn put(&self, key: &str, value: Document, at: DateTime<Utc>) -> Result<()>;
}

/// All storage collaborators behind one cloneable handle
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub polls: Arc<dyn PollStore>,
    pub votes: Arc<dyn VoteStore>,
    pub comments: Arc<dyn CommentStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub candidates: Arc<dyn CandidateStore>,
    pub elections: Arc<dyn ElectionStore>,
    pub system: Arc<dyn SystemStateStore>,
}

impl Stores {
    /// In-memory stores sharing one `MemoryStore`
    pub fn memory() -> Self {
        Self::from_shared(Arc::new(MemoryStore::new()))
    }

    /// MongoDB-backed stores. Applies indexes on every collection.
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self::from_shared(Arc::new(MongoStore::new(client).await?)))
    }

    fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore
            + PollStore
            + VoteStore
            + CommentStore
            + NotificationStore
            + CandidateStore
            + ElectionStore
            + SystemStateStore
            + 'static,
    {
        Self {
            users: store.clone(),
            polls: store.clone(),
            votes: store.clone(),
            comments: store.clone(),
            notifications: store.clone(),
            candidates: store.clone(),
            elections: store.clone(),
            system: store,
        }
    }
}
