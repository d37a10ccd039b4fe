//! In-memory storage
//!
//! DashMap-backed implementation of every store trait. Vote uniqueness uses
//! the entry API keyed by (user, poll) and tally increments happen under the
//! shard write lock, so the ledger guarantees match the MongoDB indexes.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    CampaignUpdate, CandidateStore, CommentStore, ElectionStore, NotificationStore, PollStore,
    SystemStateStore, TagCount, TallyUpdate, UserStore, VoteStore,
};
use crate::db::schemas::{
    archetype_key, CandidateDoc, CandidateStatus, CommentDoc, ConsciousnessEntry, ElectionDoc,
    ElectionStatus, Metadata, NotificationDoc, PollChanges, PollDoc, PollStatus, ProfileChanges,
    Reaction, SystemStateDoc, UserDoc, VoteDoc,
};
use crate::types::{PollxError, Result};

/// In-memory store for dev mode and tests
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<ObjectId, UserDoc>,
    /// Serialises email/username uniqueness checks
    user_guard: Mutex<()>,
    polls: DashMap<ObjectId, PollDoc>,
    /// Keyed by (user_id, poll_id)
    votes: DashMap<(ObjectId, ObjectId), VoteDoc>,
    comments: DashMap<ObjectId, CommentDoc>,
    notifications: DashMap<ObjectId, NotificationDoc>,
    /// Keyed by user_id, one candidacy per user
    candidates: DashMap<ObjectId, CandidateDoc>,
    elections: DashMap<ObjectId, ElectionDoc>,
    system: DashMap<String, SystemStateDoc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert under the user guard
    fn insert_user(&self, user: UserDoc) -> Result<UserDoc> {
        let _guard = self
            .user_guard
            .lock()
            .map_err(|_| PollxError::Internal("user store lock poisoned".into()))?;

        let taken = self
            .users
            .iter()
            .any(|u| u.email == user.email || u.username == user.username);
        if taken {
            return Err(PollxError::Conflict("User already exists".into()));
        }

        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Uniqueness check and field update under the user guard
    fn update_user_profile(
        &self,
        user_id: &ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<UserDoc>> {
        let _guard = self
            .user_guard
            .lock()
            .map_err(|_| PollxError::Internal("user store lock poisoned".into()))?;

        if let Some(username) = &changes.username {
            let taken = self
                .users
                .iter()
                .any(|u| &u.id != user_id && &u.username == username);
            if taken {
                return Err(PollxError::Conflict("Username already taken".into()));
            }
        }

        Ok(self.users.get_mut(user_id).map(|mut user| {
            user.apply_profile(changes);
            user.metadata.touch();
            user.clone()
        }))
    }
}

/// Stamp creation time as the MongoDB collection does
fn stamped() -> Metadata {
    Metadata::new()
}

/// Sort key giving a stable creation order
fn created_key(metadata: &Metadata, id: &ObjectId) -> (i64, ObjectId) {
    (metadata.created_at.timestamp_millis(), *id)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, mut user: UserDoc) -> Result<UserDoc> {
        user.metadata = stamped();
        self.insert_user(user)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<UserDoc>> {
        Ok(self
            .users
            .iter()
            .filter(|u| usernames.iter().any(|n| n == &u.username))
            .map(|u| u.clone())
            .collect())
    }

    async fn search_usernames(&self, fragment: &str, limit: usize) -> Result<Vec<UserDoc>> {
        let needle = fragment.to_lowercase();
        let mut found: Vec<UserDoc> = self
            .users
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .map(|u| u.clone())
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit);
        Ok(found)
    }

    async fn update_profile(
        &self,
        user_id: &ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<UserDoc>> {
        self.update_user_profile(user_id, changes)
    }

    async fn record_login(
        &self,
        user_id: &ObjectId,
        streak: i64,
        at: BsonDateTime,
    ) -> Result<Option<UserDoc>> {
        Ok(self.users.get_mut(user_id).map(|mut user| {
            user.stats.streak = streak;
            user.stats.last_active = Some(at);
            user.metadata.touch();
            user.clone()
        }))
    }

    async fn record_vote(&self, user_id: &ObjectId, xp: i64) -> Result<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| PollxError::NotFound("User not found".into()))?;
        user.stats.votes_cast += 1;
        user.stats.xp += xp;
        user.metadata.touch();
        Ok(())
    }

    async fn set_badges(&self, user_id: &ObjectId, badges: &[String]) -> Result<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| PollxError::NotFound("User not found".into()))?;
        user.badges = badges.to_vec();
        user.metadata.touch();
        Ok(())
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert(&self, mut poll: PollDoc) -> Result<PollDoc> {
        poll.metadata = stamped();
        self.polls.insert(poll.id, poll.clone());
        Ok(poll)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<PollDoc>> {
        Ok(self.polls.get(id).map(|p| p.clone()))
    }

    async fn list_by_status(&self, status: PollStatus, newest_first: bool) -> Result<Vec<PollDoc>> {
        let mut polls: Vec<PollDoc> = self
            .polls
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.clone())
            .collect();
        polls.sort_by_key(|p| created_key(&p.metadata, &p.id));
        if newest_first {
            polls.reverse();
        }
        Ok(polls)
    }

    async fn list_by_author(&self, author_id: &ObjectId) -> Result<Vec<PollDoc>> {
        let mut polls: Vec<PollDoc> = self
            .polls
            .iter()
            .filter(|p| &p.author_id == author_id)
            .map(|p| p.clone())
            .collect();
        polls.sort_by_key(|p| std::cmp::Reverse(created_key(&p.metadata, &p.id)));
        Ok(polls)
    }

    async fn apply_edit(&self, id: &ObjectId, changes: &PollChanges) -> Result<Option<PollDoc>> {
        // Same shard lock as `increment_tally`, so no vote lands mid-edit
        Ok(self.polls.get_mut(id).map(|mut poll| {
            poll.apply_changes(changes);
            poll.metadata.touch();
            poll.clone()
        }))
    }

    async fn set_status(&self, id: &ObjectId, status: PollStatus) -> Result<Option<PollDoc>> {
        Ok(self.polls.get_mut(id).map(|mut p| {
            p.status = status;
            p.metadata.touch();
            p.clone()
        }))
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.polls.remove(id).is_some())
    }

    async fn increment_tally(
        &self,
        poll_id: &ObjectId,
        option_id: &ObjectId,
        archetype: &str,
    ) -> Result<Option<TallyUpdate>> {
        let Some(mut poll) = self.polls.get_mut(poll_id) else {
            return Ok(None);
        };
        let Some(option) = poll.options.iter_mut().find(|o| &o.id == option_id) else {
            return Ok(None);
        };

        option.votes += 1;
        *option.archetypes.entry(archetype_key(archetype)).or_insert(0) += 1;
        let option_votes = option.votes;

        poll.total_votes += 1;
        poll.metadata.touch();

        Ok(Some(TallyUpdate {
            option_votes,
            total_votes: poll.total_votes,
        }))
    }

    async fn push_consciousness_entry(
        &self,
        poll_id: &ObjectId,
        entry: ConsciousnessEntry,
    ) -> Result<Option<i64>> {
        Ok(self.polls.get_mut(poll_id).map(|mut poll| {
            poll.consciousness_entries.push(entry);
            poll.total_votes += 1;
            poll.metadata.touch();
            poll.total_votes
        }))
    }

    async fn recent_approved(&self, since: DateTime<Utc>) -> Result<Vec<PollDoc>> {
        let since = BsonDateTime::from_chrono(since);
        let mut polls: Vec<PollDoc> = self
            .polls
            .iter()
            .filter(|p| p.status == PollStatus::Approved && p.metadata.created_at >= since)
            .map(|p| p.clone())
            .collect();
        polls.sort_by_key(|p| created_key(&p.metadata, &p.id));
        Ok(polls)
    }

    async fn trending_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for poll in self.polls.iter().filter(|p| p.status == PollStatus::Approved) {
            for tag in &poll.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        tags.truncate(limit);
        Ok(tags)
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn insert(&self, mut vote: VoteDoc) -> Result<()> {
        match self.votes.entry((vote.user_id, vote.poll_id)) {
            Entry::Occupied(_) => Err(PollxError::DuplicateVote),
            Entry::Vacant(slot) => {
                vote.metadata = stamped();
                slot.insert(vote);
                Ok(())
            }
        }
    }

    async fn find(&self, user_id: &ObjectId, poll_id: &ObjectId) -> Result<Option<VoteDoc>> {
        Ok(self.votes.get(&(*user_id, *poll_id)).map(|v| v.clone()))
    }

    async fn delete(&self, user_id: &ObjectId, poll_id: &ObjectId) -> Result<bool> {
        Ok(self.votes.remove(&(*user_id, *poll_id)).is_some())
    }

    async fn delete_for_poll(&self, poll_id: &ObjectId) -> Result<u64> {
        let before = self.votes.len();
        self.votes.retain(|(_, p), _| p != poll_id);
        Ok(before.saturating_sub(self.votes.len()) as u64)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert(&self, mut comment: CommentDoc) -> Result<CommentDoc> {
        comment.metadata = stamped();
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<CommentDoc>> {
        Ok(self.comments.get(id).map(|c| c.clone()))
    }

    async fn list_by_poll(&self, poll_id: &ObjectId) -> Result<Vec<CommentDoc>> {
        let mut comments: Vec<CommentDoc> = self
            .comments
            .iter()
            .filter(|c| &c.poll_id == poll_id)
            .map(|c| c.clone())
            .collect();
        comments.sort_by_key(|c| std::cmp::Reverse(created_key(&c.metadata, &c.id)));
        Ok(comments)
    }

    async fn react(
        &self,
        id: &ObjectId,
        user_id: &ObjectId,
        reaction: Reaction,
    ) -> Result<Option<CommentDoc>> {
        Ok(self.comments.get_mut(id).map(|mut c| {
            c.apply_reaction(*user_id, reaction);
            c.metadata.touch();
            c.clone()
        }))
    }

    async fn delete_for_poll(&self, poll_id: &ObjectId) -> Result<u64> {
        let before = self.comments.len();
        self.comments.retain(|_, c| &c.poll_id != poll_id);
        Ok(before.saturating_sub(self.comments.len()) as u64)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, mut notification: NotificationDoc) -> Result<NotificationDoc> {
        notification.metadata = stamped();
        self.notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_for_recipient(
        &self,
        recipient: &ObjectId,
        limit: usize,
    ) -> Result<Vec<NotificationDoc>> {
        let mut found: Vec<NotificationDoc> = self
            .notifications
            .iter()
            .filter(|n| &n.recipient == recipient)
            .map(|n| n.clone())
            .collect();
        found.sort_by_key(|n| std::cmp::Reverse(created_key(&n.metadata, &n.id)));
        found.truncate(limit);
        Ok(found)
    }

    async fn mark_read(&self, id: &ObjectId, recipient: &ObjectId) -> Result<bool> {
        match self.notifications.get_mut(id) {
            Some(mut n) if &n.recipient == recipient => {
                n.read = true;
                n.metadata.touch();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient: &ObjectId) -> Result<u64> {
        let mut changed = 0;
        for mut n in self.notifications.iter_mut() {
            if &n.recipient == recipient && !n.read {
                n.read = true;
                n.metadata.touch();
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn insert(&self, mut candidate: CandidateDoc) -> Result<CandidateDoc> {
        match self.candidates.entry(candidate.user_id) {
            Entry::Occupied(_) => Err(PollxError::Conflict("You have already applied.".into())),
            Entry::Vacant(slot) => {
                candidate.metadata = stamped();
                slot.insert(candidate.clone());
                Ok(candidate)
            }
        }
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<CandidateDoc>> {
        Ok(self
            .candidates
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.clone()))
    }

    async fn find_by_user(&self, user_id: &ObjectId) -> Result<Option<CandidateDoc>> {
        Ok(self.candidates.get(user_id).map(|c| c.clone()))
    }

    async fn list(&self, status: Option<CandidateStatus>) -> Result<Vec<CandidateDoc>> {
        let mut found: Vec<CandidateDoc> = self
            .candidates
            .iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .map(|c| c.clone())
            .collect();
        found.sort_by_key(|c| std::cmp::Reverse(created_key(&c.metadata, &c.id)));
        Ok(found)
    }

    async fn set_status(
        &self,
        id: &ObjectId,
        status: CandidateStatus,
    ) -> Result<Option<CandidateDoc>> {
        Ok(self
            .candidates
            .iter_mut()
            .find(|c| &c.id == id)
            .map(|mut c| {
                c.status = status;
                c.metadata.touch();
                c.clone()
            }))
    }

    async fn set_campaign(
        &self,
        id: &ObjectId,
        campaign: CampaignUpdate,
    ) -> Result<Option<CandidateDoc>> {
        Ok(self
            .candidates
            .iter_mut()
            .find(|c| &c.id == id)
            .map(|mut c| {
                c.election_id = Some(campaign.election_id);
                c.symbol = campaign.symbol;
                c.promises = campaign.promises;
                c.key_issues = campaign.key_issues;
                c.metadata.touch();
                c.clone()
            }))
    }
}

#[async_trait]
impl ElectionStore for MemoryStore {
    async fn insert(&self, mut election: ElectionDoc) -> Result<ElectionDoc> {
        election.metadata = stamped();
        self.elections.insert(election.id, election.clone());
        Ok(election)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<ElectionDoc>> {
        Ok(self.elections.get(id).map(|e| e.clone()))
    }

    async fn list(&self) -> Result<Vec<ElectionDoc>> {
        let mut found: Vec<ElectionDoc> = self.elections.iter().map(|e| e.clone()).collect();
        found.sort_by_key(|e| std::cmp::Reverse(created_key(&e.metadata, &e.id)));
        Ok(found)
    }

    async fn set_status(
        &self,
        id: &ObjectId,
        status: ElectionStatus,
    ) -> Result<Option<ElectionDoc>> {
        Ok(self.elections.get_mut(id).map(|mut e| {
            e.status = status;
            e.metadata.touch();
            e.clone()
        }))
    }

    async fn add_candidate(&self, id: &ObjectId, candidate_id: &ObjectId) -> Result<bool> {
        match self.elections.get_mut(id) {
            Some(mut e) => {
                if !e.candidates.contains(candidate_id) {
                    e.candidates.push(*candidate_id);
                    e.metadata.touch();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SystemStateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<SystemStateDoc>> {
        Ok(self.system.get(key).map(|s| s.clone()))
    }

    async fn touch(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        let at = BsonDateTime::from_chrono(at);
        self.system
            .entry(key.to_string())
            .and_modify(|s| s.last_updated = at)
            .or_insert_with(|| SystemStateDoc {
                id: ObjectId::new(),
                metadata: stamped(),
                key: key.to_string(),
                value: None,
                last_updated: at,
            });
        Ok(())
    }

    async fn put(&self, key: &str, value: Document, at: DateTime<Utc>) -> Result<()> {
        let at = BsonDateTime::from_chrono(at);
        match self.system.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                state.value = Some(value);
                state.last_updated = at;
                state.metadata.touch();
            }
            Entry::Vacant(slot) => {
                slot.insert(SystemStateDoc {
                    id: ObjectId::new(),
                    metadata: stamped(),
                    key: key.to_string(),
                    value: Some(value),
                    last_updated: at,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::schemas::{Category, PollMode, PollOption};
    use std::sync::Arc;

    fn poll(status: PollStatus, tags: &[&str]) -> PollDoc {
        PollDoc {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            author_id: ObjectId::new(),
            question: "Is this a test?".into(),
            description: None,
            category: Category::Tech,
            mode: PollMode::Standard,
            status,
            options: vec![PollOption::new("Yes"), PollOption::new("No")],
            consciousness_entries: Vec::new(),
            total_votes: 0,
            is_hot: false,
            is_edited: false,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_anonymous: false,
        }
    }

    #[tokio::test]
    async fn test_vote_insert_is_unique_per_user_and_poll() {
        let store = MemoryStore::new();
        let (user, poll_id) = (ObjectId::new(), ObjectId::new());

        VoteStore::insert(&store, VoteDoc::new(user, poll_id, ObjectId::new()))
            .await
            .unwrap();
        let second = VoteStore::insert(&store, VoteDoc::new(user, poll_id, ObjectId::new())).await;
        assert!(matches!(second, Err(PollxError::DuplicateVote)));

        // Another poll is fine
        VoteStore::insert(&store, VoteDoc::new(user, ObjectId::new(), ObjectId::new()))
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let p = PollStore::insert(store.as_ref(), poll(PollStatus::Approved, &[]))
            .await
            .unwrap();
        let (poll_id, option_id) = (p.id, p.options[0].id);

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment_tally(&poll_id, &option_id, "Realist").await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap().unwrap();
        }

        let stored = PollStore::find_by_id(store.as_ref(), &poll_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_votes, 64);
        assert_eq!(stored.options[0].votes, 64);
        assert_eq!(stored.options[0].archetypes.get("Realist"), Some(&64));
    }

    #[tokio::test]
    async fn test_increment_unknown_option_is_none() {
        let store = MemoryStore::new();
        let p = PollStore::insert(&store, poll(PollStatus::Approved, &[]))
            .await
            .unwrap();
        let result = store
            .increment_tally(&p.id, &ObjectId::new(), "x")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_trending_tags_counts_approved_only() {
        let store = MemoryStore::new();
        let sets: [&[&str]; 4] = [&["ai", "ethics"], &["ai"], &["ethics", "zen"], &["ai"]];
        for tags in sets {
            PollStore::insert(&store, poll(PollStatus::Approved, tags))
                .await
                .unwrap();
        }
        PollStore::insert(&store, poll(PollStatus::Pending, &["zen", "zen2"]))
            .await
            .unwrap();

        let tags = store.trending_tags(2).await.unwrap();
        assert_eq!(
            tags,
            vec![
                TagCount { tag: "ai".into(), count: 3 },
                TagCount { tag: "ethics".into(), count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = MemoryStore::new();
        UserStore::insert(
            &store,
            UserDoc::new("ann".into(), "ann@x.io".into(), "h".into(), Role::User),
        )
        .await
        .unwrap();

        let dup_email = UserStore::insert(
            &store,
            UserDoc::new("other".into(), "ann@x.io".into(), "h".into(), Role::User),
        )
        .await;
        assert!(matches!(dup_email, Err(PollxError::Conflict(_))));

        let dup_name = UserStore::insert(
            &store,
            UserDoc::new("ann".into(), "ann2@x.io".into(), "h".into(), Role::User),
        )
        .await;
        assert!(matches!(dup_name, Err(PollxError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_profile_update_leaves_stats_alone() {
        let store = MemoryStore::new();
        let ann = UserStore::insert(
            &store,
            UserDoc::new("ann".into(), "ann@x.io".into(), "h".into(), Role::User),
        )
        .await
        .unwrap();
        UserStore::insert(
            &store,
            UserDoc::new("bea".into(), "bea@x.io".into(), "h".into(), Role::User),
        )
        .await
        .unwrap();
        store.record_vote(&ann.id, 10).await.unwrap();

        let taken = store
            .update_profile(
                &ann.id,
                &ProfileChanges {
                    username: Some("bea".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(taken, Err(PollxError::Conflict(m)) if m == "Username already taken"));

        let updated = store
            .update_profile(
                &ann.id,
                &ProfileChanges {
                    username: Some("annie".into()),
                    ghost_mode: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.username, "annie");
        assert!(updated.settings.ghost_mode);
        assert_eq!(updated.stats.votes_cast, 1);
        assert_eq!(updated.stats.xp, 10);

        let missing = store
            .update_profile(&ObjectId::new(), &ProfileChanges::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_apply_edit_keeps_live_tallies() {
        let store = MemoryStore::new();
        let p = PollStore::insert(&store, poll(PollStatus::Approved, &[]))
            .await
            .unwrap();
        store
            .increment_tally(&p.id, &p.options[0].id, "Realist")
            .await
            .unwrap();

        let edited = store
            .apply_edit(
                &p.id,
                &PollChanges {
                    question: Some("Still a test?".into()),
                    options: Some(vec!["Yes".into(), "No".into(), "Maybe".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(edited.question, "Still a test?");
        assert_eq!(edited.options[0].id, p.options[0].id);
        assert_eq!(edited.options[0].votes, 1);
        assert_eq!(edited.options.len(), 3);
        assert_eq!(edited.total_votes, 1);
        assert!(edited.is_edited);

        let gone = store
            .apply_edit(&ObjectId::new(), &PollChanges::default())
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_search_is_literal_and_case_insensitive() {
        let store = MemoryStore::new();
        for name in ["Bob", "bobby", "rob", "b.b"] {
            UserStore::insert(
                &store,
                UserDoc::new(name.into(), format!("{}@x.io", name), "h".into(), Role::User),
            )
            .await
            .unwrap();
        }
        let found = store.search_usernames("BOB", 5).await.unwrap();
        assert_eq!(found.len(), 2);

        let dotted = store.search_usernames("b.b", 5).await.unwrap();
        assert_eq!(dotted.len(), 1);
        assert_eq!(dotted[0].username, "b.b");
    }

    #[tokio::test]
    async fn test_touch_keeps_value() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        store
            .put("k", bson::doc! { "percentage": 61 }, t0)
            .await
            .unwrap();
        let t1 = t0 + chrono::Duration::minutes(15);
        store.touch("k", t1).await.unwrap();

        let state = SystemStateStore::get(&store, "k").await.unwrap().unwrap();
        assert_eq!(state.value, Some(bson::doc! { "percentage": 61 }));
        assert_eq!(state.last_updated, BsonDateTime::from_chrono(t1));
    }
}
