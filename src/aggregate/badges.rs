//! Badge computation
//!
//! Badges are a pure function of a user's stats and account age. Tiers are
//! cumulative: reaching gold also keeps bronze and silver.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::db::schemas::UserDoc;
use crate::store::UserStore;
use crate::types::Result;

const VOTER_TIERS: [(i64, &str); 3] = [
    (10, "voter-bronze"),
    (50, "voter-silver"),
    (100, "voter-gold"),
];

const STREAK_TIERS: [(i64, &str); 3] = [
    (3, "streak-spark"),
    (7, "streak-flame"),
    (30, "streak-inferno"),
];

pub const VETERAN_BADGE: &str = "veteran";

/// Accounts strictly older than this are veterans
const VETERAN_AGE_DAYS: i64 = 3;

/// Every badge `user` has earned as of `now`, sorted and deduplicated
pub fn compute_badges(user: &UserDoc, now: DateTime<Utc>) -> Vec<String> {
    let mut badges: Vec<String> = VOTER_TIERS
        .iter()
        .filter(|(threshold, _)| user.stats.votes_cast >= *threshold)
        .chain(
            STREAK_TIERS
                .iter()
                .filter(|(threshold, _)| user.stats.streak >= *threshold),
        )
        .map(|(_, badge)| badge.to_string())
        .collect();

    if now - user.metadata.created() > Duration::days(VETERAN_AGE_DAYS) {
        badges.push(VETERAN_BADGE.to_string());
    }

    badges.sort();
    badges.dedup();
    badges
}

/// Recompute `user`'s badges and persist them only when they changed.
///
/// Updates `user.badges` in place. Returns whether a write happened.
pub async fn refresh_badges(
    users: &dyn UserStore,
    user: &mut UserDoc,
    now: DateTime<Utc>,
) -> Result<bool> {
    let computed = compute_badges(user, now);

    let mut stored = user.badges.clone();
    stored.sort();
    stored.dedup();
    if stored == computed {
        return Ok(false);
    }

    users.set_badges(&user.id, &computed).await?;
    debug!(user_id = %user.id, badges = ?computed, "Badges updated");
    user.badges = computed;
    Ok(true)
}
