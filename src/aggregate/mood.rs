//! Collective mood aggregation
//!
//! Reads approved polls from a trailing window, asks the evaluator for a
//! sentiment and overwrites the single mood row. Whenever there is nothing
//! new to store, only the row's freshness timestamp moves.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::schemas::MOOD_KEY;
use crate::evaluator::{evaluate_mood, EvaluationError, MoodReading, TextEvaluator};
use crate::store::{PollStore, SystemStateStore};
use crate::types::{PollxError, Result};

/// Why a run left the stored reading alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnchangedReason {
    InsufficientData,
    NoEvaluator,
    EvaluatorFailed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoodOutcome {
    Updated(MoodReading),
    Unchanged(UnchangedReason),
}

pub struct MoodAggregator {
    polls: Arc<dyn PollStore>,
    system: Arc<dyn SystemStateStore>,
    evaluator: Option<Arc<dyn TextEvaluator>>,
    window: Duration,
    min_polls: usize,
    timeout: std::time::Duration,
}

impl MoodAggregator {
    pub fn new(
        polls: Arc<dyn PollStore>,
        system: Arc<dyn SystemStateStore>,
        evaluator: Option<Arc<dyn TextEvaluator>>,
        window: Duration,
        min_polls: usize,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            polls,
            system,
            evaluator,
            window,
            min_polls,
            timeout,
        }
    }

    /// One aggregation pass as of `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<MoodOutcome> {
        let recent = self.polls.recent_approved(now - self.window).await?;

        if recent.len() < self.min_polls {
            debug!(
                polls = recent.len(),
                required = self.min_polls,
                "Not enough recent polls for mood analysis"
            );
            return self.unchanged(UnchangedReason::InsufficientData, now).await;
        }

        let Some(evaluator) = self.evaluator.as_deref() else {
            return self.unchanged(UnchangedReason::NoEvaluator, now).await;
        };

        let questions: Vec<String> = recent.into_iter().map(|p| p.question).collect();

        match evaluate_mood(evaluator, &questions, self.timeout).await {
            Ok(reading) => {
                let value = bson::to_document(&reading)?;
                self.system.put(MOOD_KEY, value, now).await?;
                info!(
                    percentage = reading.percentage,
                    sentiment = %reading.sentiment,
                    polls = questions.len(),
                    "Collective mood updated"
                );
                Ok(MoodOutcome::Updated(reading))
            }
            Err(EvaluationError::TimedOut) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Mood analysis timed out");
                self.unchanged(UnchangedReason::TimedOut, now).await
            }
            Err(e) => {
                warn!(error = %e, evaluator = evaluator.id(), "Mood analysis failed");
                self.unchanged(UnchangedReason::EvaluatorFailed, now).await
            }
        }
    }

    async fn unchanged(&self, reason: UnchangedReason, now: DateTime<Utc>) -> Result<MoodOutcome> {
        self.system.touch(MOOD_KEY, now).await?;
        Ok(MoodOutcome::Unchanged(reason))
    }
}

/// The stored reading, or the neutral default before the first update
pub async fn current_mood(system: &dyn SystemStateStore) -> Result<MoodReading> {
    let Some(value) = system.get(MOOD_KEY).await?.and_then(|state| state.value) else {
        return Ok(MoodReading::default());
    };

    bson::from_document(value)
        .map_err(|e| PollxError::Database(format!("Corrupt mood record: {}", e)))
}

/// Run the aggregator every `interval`
pub fn spawn_mood_task(
    aggregator: Arc<MoodAggregator>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            match aggregator.run_once(Utc::now()).await {
                Ok(MoodOutcome::Updated(_)) => {}
                Ok(MoodOutcome::Unchanged(reason)) => {
                    debug!(reason = ?reason, "Collective mood left unchanged");
                }
                Err(e) => warn!(error = %e, "Mood aggregation failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{Category, Metadata, PollDoc, PollStatus};
    use crate::evaluator::MockEvaluator;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn aggregator(
        store: &Arc<MemoryStore>,
        evaluator: Option<Arc<dyn TextEvaluator>>,
    ) -> MoodAggregator {
        MoodAggregator::new(
            store.clone(),
            store.clone(),
            evaluator,
            Duration::hours(4),
            3,
            std::time::Duration::from_secs(1),
        )
    }

    async fn seed_approved(store: &MemoryStore, count: usize) {
        for i in 0..count {
            let mut poll = PollDoc::new(
                bson::oid::ObjectId::new(),
                format!("Question {}?", i),
                Category::Social,
            );
            poll.status = PollStatus::Approved;
            poll.metadata = Metadata::new();
            PollStore::insert(store, poll).await.unwrap();
        }
    }

    fn hopeful() -> serde_json::Value {
        json!({ "percentage": 72, "sentiment": "Hopeful", "summary": "Bright days." })
    }

    #[tokio::test]
    async fn test_default_reading_before_first_run() {
        let store = MemoryStore::new();
        let mood = current_mood(&store).await.unwrap();
        assert_eq!(mood, MoodReading::default());
    }

    #[tokio::test]
    async fn test_updates_with_enough_polls() {
        let store = Arc::new(MemoryStore::new());
        seed_approved(&store, 3).await;
        let mock = Arc::new(MockEvaluator::returning(hopeful()));

        let outcome = aggregator(&store, Some(mock.clone()))
            .run_once(Utc::now())
            .await
            .unwrap();

        assert!(matches!(outcome, MoodOutcome::Updated(ref r) if r.percentage == 72));
        assert_eq!(current_mood(store.as_ref()).await.unwrap().sentiment, "Hopeful");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_evaluator_only_touches() {
        let store = Arc::new(MemoryStore::new());
        seed_approved(&store, 3).await;

        let outcome = aggregator(&store, None).run_once(Utc::now()).await.unwrap();
        assert_eq!(outcome, MoodOutcome::Unchanged(UnchangedReason::NoEvaluator));

        let state = SystemStateStore::get(store.as_ref(), MOOD_KEY)
            .await
            .unwrap()
            .unwrap();
        assert!(state.value.is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_reading() {
        let store = Arc::new(MemoryStore::new());
        seed_approved(&store, 3).await;
        aggregator(&store, Some(Arc::new(MockEvaluator::returning(hopeful()))))
            .run_once(Utc::now())
            .await
            .unwrap();

        let outcome = aggregator(&store, Some(Arc::new(MockEvaluator::failing("500"))))
            .run_once(Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome, MoodOutcome::Unchanged(UnchangedReason::EvaluatorFailed));
        assert_eq!(current_mood(store.as_ref()).await.unwrap().percentage, 72);
    }
}
