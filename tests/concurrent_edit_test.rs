//! Edits racing with votes
//!
//! An owner edit or a login reads the current document before it writes.
//! A vote landing in between must survive the write.

mod common;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime as BsonDateTime};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use common::*;
use pollx::db::schemas::{
    ConsciousnessEntry, PollChanges, PollDoc, PollStatus, ProfileChanges, UserDoc,
};
use pollx::ledger::VOTE_XP;
use pollx::services::{PollEdit, ProfileUpdate};
use pollx::store::{MemoryStore, PollStore, TagCount, TallyUpdate, UserStore, VoteStore};
use pollx::Result;

/// Poll store whose next `find_by_id` is held after reading
struct GatedPolls {
    inner: Arc<MemoryStore>,
    gate: Gate,
}

#[async_trait]
impl PollStore for GatedPolls {
    async fn insert(&self, poll: PollDoc) -> Result<PollDoc> {
        PollStore::insert(self.inner.as_ref(), poll).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<PollDoc>> {
        let poll = PollStore::find_by_id(self.inner.as_ref(), id).await;
        self.gate.pass().await;
        poll
    }

    async fn list_by_status(&self, status: PollStatus, newest_first: bool) -> Result<Vec<PollDoc>> {
        self.inner.list_by_status(status, newest_first).await
    }

    async fn list_by_author(&self, author_id: &ObjectId) -> Result<Vec<PollDoc>> {
        self.inner.list_by_author(author_id).await
    }

    async fn apply_edit(&self, id: &ObjectId, changes: &PollChanges) -> Result<Option<PollDoc>> {
        self.inner.apply_edit(id, changes).await
    }

    async fn set_status(&self, id: &ObjectId, status: PollStatus) -> Result<Option<PollDoc>> {
        PollStore::set_status(self.inner.as_ref(), id, status).await
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool> {
        PollStore::delete(self.inner.as_ref(), id).await
    }

    async fn increment_tally(
        &self,
        poll_id: &ObjectId,
        option_id: &ObjectId,
        archetype: &str,
    ) -> Result<Option<TallyUpdate>> {
        self.inner.increment_tally(poll_id, option_id, archetype).await
    }

    async fn push_consciousness_entry(
        &self,
        poll_id: &ObjectId,
        entry: ConsciousnessEntry,
    ) -> Result<Option<i64>> {
        self.inner.push_consciousness_entry(poll_id, entry).await
    }

    async fn recent_approved(&self, since: DateTime<Utc>) -> Result<Vec<PollDoc>> {
        self.inner.recent_approved(since).await
    }

    async fn trending_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
        self.inner.trending_tags(limit).await
    }
}

/// User store whose next `find_by_email` is held after reading
struct GatedUsers {
    inner: Arc<MemoryStore>,
    gate: Gate,
}

#[async_trait]
impl UserStore for GatedUsers {
    async fn insert(&self, user: UserDoc) -> Result<UserDoc> {
        UserStore::insert(self.inner.as_ref(), user).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        UserStore::find_by_id(self.inner.as_ref(), id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        let user = self.inner.find_by_email(email).await;
        self.gate.pass().await;
        user
    }

    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<UserDoc>> {
        self.inner.find_by_usernames(usernames).await
    }

    async fn search_usernames(&self, fragment: &str, limit: usize) -> Result<Vec<UserDoc>> {
        self.inner.search_usernames(fragment, limit).await
    }

    async fn update_profile(
        &self,
        user_id: &ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<UserDoc>> {
        self.inner.update_profile(user_id, changes).await
    }

    async fn record_login(
        &self,
        user_id: &ObjectId,
        streak: i64,
        at: BsonDateTime,
    ) -> Result<Option<UserDoc>> {
        self.inner.record_login(user_id, streak, at).await
    }

    async fn record_vote(&self, user_id: &ObjectId, xp: i64) -> Result<()> {
        self.inner.record_vote(user_id, xp).await
    }

    async fn set_badges(&self, user_id: &ObjectId, badges: &[String]) -> Result<()> {
        self.inner.set_badges(user_id, badges).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_vote_during_poll_edit_is_kept() {
    let shared = Arc::new(MemoryStore::new());
    let polls = Arc::new(GatedPolls {
        inner: shared.clone(),
        gate: Gate::default(),
    });
    let mut stores = shared_stores(&shared);
    stores.polls = polls.clone();
    let state = state_over(stores);

    let alice = add_user(&state, "alice").await;
    let bob = add_user(&state, "bob").await;
    let poll = add_standard_poll(&state, &alice, &["Yes", "No"]).await;
    let yes = poll.options[0].id;

    polls.gate.arm();
    let edit = {
        let state = state.clone();
        let alice = alice.clone();
        let poll_id = poll.id;
        tokio::spawn(async move {
            let edit = PollEdit {
                question: Some("Is this still the right call?".into()),
                options: Some(vec!["Yes".into(), "No".into(), "Maybe".into()]),
                ..Default::default()
            };
            state.polls.update_poll(&alice, &poll_id, edit).await
        })
    };
    polls.gate.wait_held().await;

    let receipt = state.ledger.cast_vote(&bob, &poll.id, &yes).await.unwrap();
    assert_eq!(receipt.total_votes, 1);

    polls.gate.release();
    let edited = edit.await.unwrap().unwrap();

    assert_eq!(edited.question, "Is this still the right call?");
    assert!(edited.is_edited);
    assert_eq!(edited.options.len(), 3);
    assert_eq!(edited.options[0].id, yes);
    assert_eq!(edited.options[0].votes, 1);
    assert_eq!(edited.total_votes, 1);

    let stored = reload_poll(&state, &poll).await;
    assert_eq!(stored.total_votes, 1);
    assert_eq!(stored.options[0].votes, 1);
    assert!(state
        .stores
        .votes
        .find(&bob.id, &poll.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_profile_edit_from_stale_copy_keeps_vote_stats() {
    let state = memory_state();
    let alice = add_user(&state, "alice").await;
    let bob = add_user(&state, "bob").await;
    let poll = add_standard_poll(&state, &alice, &["Yes", "No"]).await;

    // `bob` is the copy an extractor loaded before the vote landed
    state
        .ledger
        .cast_vote(&bob, &poll.id, &poll.options[0].id)
        .await
        .unwrap();

    let update = ProfileUpdate {
        identity_title: Some("The Realist".into()),
        ..Default::default()
    };
    let session = state.accounts.update_profile(&bob, update).await.unwrap();

    assert_eq!(session.user.identity_title, "The Realist");
    assert_eq!(session.user.stats.votes_cast, 1);
    assert_eq!(session.user.stats.xp, VOTE_XP);

    let stored = reload_user(&state, &bob).await;
    assert_eq!(stored.stats.votes_cast, 1);
    assert_eq!(stored.stats.xp, VOTE_XP);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_vote_during_login_is_kept() {
    let shared = Arc::new(MemoryStore::new());
    let users = Arc::new(GatedUsers {
        inner: shared.clone(),
        gate: Gate::default(),
    });
    let mut stores = shared_stores(&shared);
    stores.users = users.clone();
    let state = state_over(stores);

    let alice = add_user(&state, "alice").await;
    let bob = state
        .accounts
        .signup("bob", "bob@example.com", "secret1")
        .await
        .unwrap()
        .user;
    let poll = add_standard_poll(&state, &alice, &["Yes", "No"]).await;

    users.gate.arm();
    let login = {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .accounts
                .login("bob@example.com", "secret1", Utc::now())
                .await
        })
    };
    users.gate.wait_held().await;

    state
        .ledger
        .cast_vote(&bob, &poll.id, &poll.options[0].id)
        .await
        .unwrap();

    users.gate.release();
    let session = login.await.unwrap().unwrap();

    assert_eq!(session.user.stats.streak, 1);
    assert_eq!(session.user.stats.votes_cast, 1);
    assert_eq!(session.user.stats.xp, VOTE_XP);

    let stored = reload_user(&state, &bob).await;
    assert_eq!(stored.stats.votes_cast, 1);
    assert!(stored.stats.last_active.is_some());
}
