//! Secondary writes failing after the primary mutation committed

mod common;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime as BsonDateTime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;
use pollx::db::schemas::{NotificationDoc, NotificationKind, ProfileChanges, UserDoc};
use pollx::live::LiveEvent;
use pollx::store::{CommentStore, MemoryStore, NotificationStore, UserStore, VoteStore};
use pollx::types::PollxError;
use pollx::Result;

/// Notification store rejecting inserts of the listed kinds
struct RejectingNotifications {
    inner: Arc<MemoryStore>,
    rejected_kinds: Vec<NotificationKind>,
    rejected: AtomicUsize,
}

impl RejectingNotifications {
    fn new(inner: Arc<MemoryStore>, rejected_kinds: &[NotificationKind]) -> Self {
        Self {
            inner,
            rejected_kinds: rejected_kinds.to_vec(),
            rejected: AtomicUsize::new(0),
        }
    }

    fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationStore for RejectingNotifications {
    async fn insert(&self, notification: NotificationDoc) -> Result<NotificationDoc> {
        if self.rejected_kinds.contains(&notification.kind) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(PollxError::Database("notifications unavailable".into()));
        }
        NotificationStore::insert(self.inner.as_ref(), notification).await
    }

    async fn list_for_recipient(
        &self,
        recipient: &ObjectId,
        limit: usize,
    ) -> Result<Vec<NotificationDoc>> {
        self.inner.list_for_recipient(recipient, limit).await
    }

    async fn mark_read(&self, id: &ObjectId, recipient: &ObjectId) -> Result<bool> {
        self.inner.mark_read(id, recipient).await
    }

    async fn mark_all_read(&self, recipient: &ObjectId) -> Result<u64> {
        self.inner.mark_all_read(recipient).await
    }
}

/// User store whose vote counter update always fails
struct BrokenVoteStats {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl UserStore for BrokenVoteStats {
    async fn insert(&self, user: UserDoc) -> Result<UserDoc> {
        UserStore::insert(self.inner.as_ref(), user).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        UserStore::find_by_id(self.inner.as_ref(), id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        self.inner.find_by_email(email).await
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

    async fn record_vote(&self, _user_id: &ObjectId, _xp: i64) -> Result<()> {
        Err(PollxError::Database("stats unavailable".into()))
    }

    async fn set_badges(&self, user_id: &ObjectId, badges: &[String]) -> Result<()> {
        self.inner.set_badges(user_id, badges).await
    }
}

#[tokio::test]
async fn test_vote_and_comment_succeed_when_notifications_fail() {
    let shared = Arc::new(MemoryStore::new());
    let notifications = Arc::new(RejectingNotifications::new(
        shared.clone(),
        &[
            NotificationKind::Vote,
            NotificationKind::Comment,
            NotificationKind::Reply,
            NotificationKind::Mention,
            NotificationKind::System,
        ],
    ));
    let mut stores = shared_stores(&shared);
    stores.notifications = notifications.clone();
    let state = state_over(stores);

    let alice = add_user(&state, "alice").await;
    let bob = add_user(&state, "bob").await;
    let poll = add_standard_poll(&state, &alice, &["Yes", "No"]).await;
    let yes = poll.options[0].id;
    let mut live = state.live.subscribe(&poll.id);

    let receipt = state.ledger.cast_vote(&bob, &poll.id, &yes).await.unwrap();
    assert_eq!(receipt.option_votes, 1);
    assert_eq!(receipt.total_votes, 1);

    match live.try_recv() {
        Ok(LiveEvent::VoteUpdated { total_votes, .. }) => assert_eq!(total_votes, 1),
        other => panic!("expected vote_updated, got {:?}", other),
    }

    let comment = state
        .comments
        .add_comment(&bob, &poll.id, "Tough one @alice", None)
        .await
        .unwrap();

    // Vote, comment and mention notifications were all attempted
    assert_eq!(notifications.rejected(), 3);

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

    let thread = state.stores.comments.list_by_poll(&poll.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].id, comment.id);

    let inbox = state
        .stores
        .notifications
        .list_for_recipient(&alice.id, 50)
        .await
        .unwrap();
    assert!(inbox.is_empty());
}

#[tokio::test]
async fn test_mentions_delivered_when_comment_notification_fails() {
    let shared = Arc::new(MemoryStore::new());
    let notifications = Arc::new(RejectingNotifications::new(
        shared.clone(),
        &[NotificationKind::Comment],
    ));
    let mut stores = shared_stores(&shared);
    stores.notifications = notifications.clone();
    let state = state_over(stores);

    let dana = add_user(&state, "dana").await;
    let carol = add_user(&state, "carol").await;
    let bob = add_user(&state, "bob").await;
    let poll = add_standard_poll(&state, &dana, &["Yes", "No"]).await;

    state
        .comments
        .add_comment(&carol, &poll.id, "what do you think @bob", None)
        .await
        .unwrap();

    assert_eq!(notifications.rejected(), 1);
    assert!(state.notifications.list(&dana).await.unwrap().is_empty());

    let bob_inbox = state.notifications.list(&bob).await.unwrap();
    assert_eq!(bob_inbox.len(), 1);
    assert_eq!(bob_inbox[0].kind, NotificationKind::Mention);
    assert_eq!(bob_inbox[0].sender, Some(carol.id));
}

#[tokio::test]
async fn test_vote_stands_when_voter_stats_fail() {
    let shared = Arc::new(MemoryStore::new());
    let mut stores = shared_stores(&shared);
    stores.users = Arc::new(BrokenVoteStats {
        inner: shared.clone(),
    });
    let state = state_over(stores);

    let alice = add_user(&state, "alice").await;
    let bob = add_user(&state, "bob").await;
    let poll = add_standard_poll(&state, &alice, &["Yes", "No"]).await;
    let mut live = state.live.subscribe(&poll.id);

    let receipt = state
        .ledger
        .cast_vote(&bob, &poll.id, &poll.options[1].id)
        .await
        .unwrap();
    assert_eq!(receipt.total_votes, 1);
    assert!(matches!(live.try_recv(), Ok(LiveEvent::VoteUpdated { .. })));

    let alice_inbox = state.notifications.list(&alice).await.unwrap();
    assert_eq!(alice_inbox.len(), 1);
    assert_eq!(alice_inbox[0].kind, NotificationKind::Vote);

    // Still exactly one vote per user
    assert!(matches!(
        state
            .ledger
            .cast_vote(&bob, &poll.id, &poll.options[0].id)
            .await,
        Err(PollxError::DuplicateVote)
    ));

    let bob = reload_user(&state, &bob).await;
    assert_eq!(bob.stats.votes_cast, 0);
    assert_eq!(reload_poll(&state, &poll).await.options[1].votes, 1);
}
