//! Badge and collective mood aggregation tests

mod common;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime as BsonDateTime};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pollx::aggregate::{current_mood, refresh_badges, MoodAggregator, MoodOutcome, UnchangedReason};
use pollx::auth::{JwtValidator, Role};
use pollx::db::schemas::{Category, PollDoc, PollStatus, ProfileChanges, UserDoc, MOOD_KEY};
use pollx::evaluator::{MockEvaluator, MoodReading, TextEvaluator};
use pollx::services::AccountService;
use pollx::store::{MemoryStore, PollStore, SystemStateStore, UserStore};
use pollx::Result;

/// User store that counts badge writes
struct CountingUsers {
    inner: MemoryStore,
    badge_writes: AtomicUsize,
}

impl CountingUsers {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            badge_writes: AtomicUsize::new(0),
        }
    }

    fn writes(&self) -> usize {
        self.badge_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for CountingUsers {
    async fn insert(&self, user: UserDoc) -> Result<UserDoc> {
        UserStore::insert(&self.inner, user).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        UserStore::find_by_id(&self.inner, id).await
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

    async fn record_vote(&self, user_id: &ObjectId, xp: i64) -> Result<()> {
        self.inner.record_vote(user_id, xp).await
    }

    async fn set_badges(&self, user_id: &ObjectId, badges: &[String]) -> Result<()> {
        self.badge_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_badges(user_id, badges).await
    }
}

async fn seasoned_voter(users: &CountingUsers) -> UserDoc {
    let mut user = UserDoc::new(
        "vera".into(),
        "vera@example.com".into(),
        "hash".into(),
        Role::User,
    );
    user.stats.votes_cast = 12;
    user.stats.streak = 4;
    UserStore::insert(users, user).await.unwrap()
}

#[tokio::test]
async fn test_badge_refresh_writes_only_on_change() {
    let users = CountingUsers::new();
    let mut user = seasoned_voter(&users).await;
    let now = Utc::now();

    assert!(refresh_badges(&users, &mut user, now).await.unwrap());
    assert_eq!(users.writes(), 1);
    assert_eq!(
        user.badges,
        vec!["streak-spark".to_string(), "voter-bronze".to_string()]
    );

    // Unchanged inputs, no write
    for _ in 0..3 {
        assert!(!refresh_badges(&users, &mut user, now).await.unwrap());
    }
    assert_eq!(users.writes(), 1);

    let stored = UserStore::find_by_id(&users, &user.id).await.unwrap().unwrap();
    assert_eq!(stored.badges, user.badges);
}

#[tokio::test]
async fn test_profile_reads_are_idempotent() {
    let users = Arc::new(CountingUsers::new());
    let user = seasoned_voter(&users).await;
    let jwt = Arc::new(
        JwtValidator::new("aggregate-test-secret-0123456789abcdef".into(), 3600).unwrap(),
    );
    let accounts = AccountService::new(users.clone(), jwt);
    let now = Utc::now();

    let first = accounts.profile(&user.id, now).await.unwrap();
    let second = accounts.profile(&user.id, now).await.unwrap();

    assert_eq!(first.badges, second.badges);
    assert_eq!(users.writes(), 1);
}

fn hopeful() -> serde_json::Value {
    json!({
        "percentage": 72,
        "sentiment": "Hopeful",
        "summary": "People are asking what comes next."
    })
}

async fn approved_poll(store: &MemoryStore, question: &str) -> PollDoc {
    let mut poll = PollDoc::new(ObjectId::new(), question, Category::Social);
    poll.status = PollStatus::Approved;
    PollStore::insert(store, poll).await.unwrap()
}

fn aggregator(store: &Arc<MemoryStore>, evaluator: Option<Arc<dyn TextEvaluator>>) -> MoodAggregator {
    MoodAggregator::new(
        store.clone(),
        store.clone(),
        evaluator,
        Duration::hours(4),
        3,
        std::time::Duration::from_secs(2),
    )
}

#[tokio::test]
async fn test_mood_is_neutral_before_first_update() {
    let store = MemoryStore::new();
    assert_eq!(current_mood(&store).await.unwrap(), MoodReading::default());
}

#[tokio::test]
async fn test_insufficient_polls_keep_value_and_bump_timestamp() {
    let store = Arc::new(MemoryStore::new());
    let mock = Arc::new(MockEvaluator::returning(hopeful()));
    let evaluator: Arc<dyn TextEvaluator> = mock.clone();
    let mood = aggregator(&store, Some(evaluator));

    let mut polls = Vec::new();
    for q in ["Should we build more parks?", "Is remote work here to stay?", "Tea or coffee?"] {
        polls.push(approved_poll(&store, q).await);
    }

    let first_run = Utc::now();
    assert!(matches!(
        mood.run_once(first_run).await.unwrap(),
        MoodOutcome::Updated(_)
    ));
    let before = SystemStateStore::get(&*store, MOOD_KEY).await.unwrap().unwrap();

    // Two qualifying polls left
    PollStore::delete(&*store, &polls[0].id).await.unwrap();

    let second_run = first_run + Duration::minutes(15);
    assert!(matches!(
        mood.run_once(second_run).await.unwrap(),
        MoodOutcome::Unchanged(UnchangedReason::InsufficientData)
    ));
    let after = SystemStateStore::get(&*store, MOOD_KEY).await.unwrap().unwrap();

    assert_eq!(after.value, before.value);
    assert_ne!(after.last_updated, before.last_updated);
    assert_eq!(after.last_updated.timestamp_millis(), second_run.timestamp_millis());
    assert_eq!(mock.call_count(), 1);

    let reading = current_mood(&*store).await.unwrap();
    assert_eq!(reading.percentage, 72);
    assert_eq!(reading.sentiment, "Hopeful");
}

#[tokio::test]
async fn test_polls_outside_window_do_not_count() {
    let store = Arc::new(MemoryStore::new());
    let mock = Arc::new(MockEvaluator::returning(hopeful()));
    let evaluator: Arc<dyn TextEvaluator> = mock.clone();
    let mood = aggregator(&store, Some(evaluator));

    for q in ["One?", "Two?", "Three?"] {
        approved_poll(&store, q).await;
    }

    let later = Utc::now() + Duration::hours(5);
    assert!(matches!(
        mood.run_once(later).await.unwrap(),
        MoodOutcome::Unchanged(UnchangedReason::InsufficientData)
    ));
    assert_eq!(mock.call_count(), 0);
    assert_eq!(current_mood(&*store).await.unwrap(), MoodReading::default());
}

#[tokio::test]
async fn test_pending_polls_do_not_count() {
    let store = Arc::new(MemoryStore::new());
    let evaluator: Arc<dyn TextEvaluator> = Arc::new(MockEvaluator::returning(hopeful()));
    let mood = aggregator(&store, Some(evaluator));

    for q in ["One?", "Two?", "Three?"] {
        PollStore::insert(&*store, PollDoc::new(ObjectId::new(), q, Category::Tech))
            .await
            .unwrap();
    }

    assert!(matches!(
        mood.run_once(Utc::now()).await.unwrap(),
        MoodOutcome::Unchanged(UnchangedReason::InsufficientData)
    ));
}

#[tokio::test]
async fn test_slow_evaluator_times_out_and_keeps_reading() {
    let store = Arc::new(MemoryStore::new());
    for q in ["One?", "Two?", "Three?"] {
        approved_poll(&store, q).await;
    }

    let quick: Arc<dyn TextEvaluator> = Arc::new(MockEvaluator::returning(hopeful()));
    aggregator(&store, Some(quick)).run_once(Utc::now()).await.unwrap();

    let sluggish: Arc<dyn TextEvaluator> = Arc::new(
        MockEvaluator::returning(json!({
            "percentage": 10,
            "sentiment": "Gloomy",
            "summary": "Too late to matter."
        }))
        .with_delay(std::time::Duration::from_secs(5)),
    );
    let slow = MoodAggregator::new(
        store.clone(),
        store.clone(),
        Some(sluggish),
        Duration::hours(4),
        3,
        std::time::Duration::from_millis(50),
    );

    assert!(matches!(
        slow.run_once(Utc::now()).await.unwrap(),
        MoodOutcome::Unchanged(UnchangedReason::TimedOut)
    ));
    assert_eq!(current_mood(&*store).await.unwrap().sentiment, "Hopeful");
}
