//! Shared fixtures for integration tests

#![allow(dead_code)]

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use pollx::auth::Role;
use pollx::config::Args;
use pollx::db::schemas::{Category, PollDoc, PollMode, PollOption, PollStatus, UserDoc};
use pollx::evaluator::TextEvaluator;
use pollx::server::AppState;
use pollx::store::{MemoryStore, PollStore, Stores, UserStore};

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-chars";

pub fn test_args() -> Args {
    Args::parse_from(["pollx", "--dev-mode", "--jwt-secret", TEST_SECRET])
}

/// App state over a fresh in-memory store
pub fn memory_state() -> Arc<AppState> {
    memory_state_with(None)
}

pub fn memory_state_with(evaluator: Option<Arc<dyn TextEvaluator>>) -> Arc<AppState> {
    Arc::new(AppState::new(test_args(), Stores::memory(), evaluator).unwrap())
}

/// Every store backed by one shared `MemoryStore`, so single fields can be
/// swapped for a wrapper around the same data
pub fn shared_stores(store: &Arc<MemoryStore>) -> Stores {
    Stores {
        users: store.clone(),
        polls: store.clone(),
        votes: store.clone(),
        comments: store.clone(),
        notifications: store.clone(),
        candidates: store.clone(),
        elections: store.clone(),
        system: store.clone(),
    }
}

pub fn state_over(stores: Stores) -> Arc<AppState> {
    Arc::new(AppState::new(test_args(), stores, None).unwrap())
}

/// Holds one armed call open until the test releases it, so another
/// operation can run in between a read and the write that follows it
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    held: Notify,
    release: Notify,
}

impl Gate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Called by the wrapped store. Only the first call after `arm` waits.
    pub async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.release.notified().await;
        }
    }

    pub async fn wait_held(&self) {
        self.held.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

pub async fn add_user(state: &AppState, name: &str) -> UserDoc {
    let user = UserDoc::new(
        name.to_string(),
        format!("{}@example.com", name),
        "unused-hash".to_string(),
        Role::for_new_username(name),
    );
    state.stores.users.insert(user).await.unwrap()
}

/// Approved standard poll with the given option texts
pub async fn add_standard_poll(state: &AppState, author: &UserDoc, options: &[&str]) -> PollDoc {
    let mut poll = PollDoc::new(author.id, "Is this the right call?", Category::Moral);
    poll.status = PollStatus::Approved;
    poll.options = options.iter().map(|o| PollOption::new(*o)).collect();
    state.stores.polls.insert(poll).await.unwrap()
}

pub async fn add_consciousness_poll(state: &AppState, author: &UserDoc) -> PollDoc {
    let mut poll = PollDoc::new(author.id, "How do you feel today?", Category::Consciousness);
    poll.status = PollStatus::Approved;
    poll.mode = PollMode::Consciousness;
    state.stores.polls.insert(poll).await.unwrap()
}

pub async fn reload_user(state: &AppState, user: &UserDoc) -> UserDoc {
    state.stores.users.find_by_id(&user.id).await.unwrap().unwrap()
}

pub async fn reload_poll(state: &AppState, poll: &PollDoc) -> PollDoc {
    state.stores.polls.find_by_id(&poll.id).await.unwrap().unwrap()
}
