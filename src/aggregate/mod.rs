//! Periodic and on-touch aggregates
//!
//! Badges are recomputed whenever a profile is touched. The collective mood
//! is recomputed on a timer and stored under a single system state key.

pub mod badges;
pub mod mood;

pub use badges::{compute_badges, refresh_badges};
pub use mood::{current_mood, spawn_mood_task, MoodAggregator, MoodOutcome, UnchangedReason};
