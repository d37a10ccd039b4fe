//! Account operations
//!
//! Signup, login and profile maintenance. Every successful authentication
//! hands back a fresh token alongside the stored profile.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::aggregate::refresh_badges;
use crate::auth::{hash_password, verify_password, JwtValidator, Role};
use crate::db::schemas::{ProfileChanges, UserDoc};
use crate::store::UserStore;
use crate::types::{PollxError, Result};

const MIN_PASSWORD_LEN: usize = 6;
const SEARCH_LIMIT: usize = 5;

/// A profile and the token issued for it
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserDoc,
    pub token: String,
}

/// Partial settings update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub ghost_mode: Option<bool>,
    pub anonymous_default: Option<bool>,
    pub neon_intensity: Option<i32>,
    pub reduce_motion: Option<bool>,
    pub notifications: Option<bool>,
}

/// Profile edit; empty strings are ignored like absent fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub identity_title: Option<String>,
    pub identity_description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub settings: Option<SettingsPatch>,
    pub password: Option<String>,
}

/// Streak after a login at `now`.
///
/// Same UTC day keeps the streak, the following day extends it, any other
/// gap starts over at 1.
pub fn next_streak(current: i64, last_active: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(last) = last_active else {
        return 1;
    };

    match (now.date_naive() - last.date_naive()).num_days() {
        0 => current.max(1),
        1 => current + 1,
        _ => 1,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtValidator>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, jwt: Arc<JwtValidator>) -> Self {
        Self { users, jwt }
    }

    fn session(&self, user: UserDoc) -> Result<Session> {
        let token = self.jwt.generate_token(&user.id, &user.username, user.role)?;
        Ok(Session { user, token })
    }

    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<Session> {
        let username = username.trim();
        let email = email.trim().to_lowercase();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(PollxError::BadRequest(
                "Username, email and password are required".into(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PollxError::BadRequest(
                "Password must be at least 6 characters".into(),
            ));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(PollxError::Conflict("User already exists".into()));
        }

        let role = Role::for_new_username(username);
        let user = UserDoc::new(
            username.to_string(),
            email,
            hash_password(password)?,
            role,
        );
        let user = self.users.insert(user).await?;

        info!(user_id = %user.id, username = %user.username, role = %role, "User registered");
        self.session(user)
    }

    pub async fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<Session> {
        let invalid = || PollxError::Unauthorized("Invalid email or password".into());

        let email = email.trim().to_lowercase();
        let user = self.users.find_by_email(&email).await?.ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        let last_active = user.stats.last_active.map(|at| at.to_chrono());
        let streak = next_streak(user.stats.streak, last_active, now);
        let mut user = self
            .users
            .record_login(&user.id, streak, bson::DateTime::from_chrono(now))
            .await?
            .ok_or_else(invalid)?;

        refresh_badges(self.users.as_ref(), &mut user, now).await?;

        info!(user_id = %user.id, streak = user.stats.streak, "User logged in");
        self.session(user)
    }

    /// Current profile with badges brought up to date
    pub async fn profile(&self, user_id: &bson::oid::ObjectId, now: DateTime<Utc>) -> Result<UserDoc> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PollxError::NotFound("User not found".into()))?;

        refresh_badges(self.users.as_ref(), &mut user, now).await?;
        Ok(user)
    }

    /// Write the edited profile fields. Stats and badges are read back from
    /// storage, never from `user`.
    pub async fn update_profile(&self, user: &UserDoc, update: ProfileUpdate) -> Result<Session> {
        let mut changes = ProfileChanges {
            username: non_empty(update.username),
            avatar_url: non_empty(update.avatar_url),
            identity_title: non_empty(update.identity_title),
            identity_description: non_empty(update.identity_description),
            tags: update.tags.map(|tags| {
                tags.into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }),
            ..Default::default()
        };
        if let Some(patch) = update.settings {
            changes.ghost_mode = patch.ghost_mode;
            changes.anonymous_default = patch.anonymous_default;
            changes.neon_intensity = patch.neon_intensity.map(|v| v.clamp(0, 100));
            changes.reduce_motion = patch.reduce_motion;
            changes.notifications = patch.notifications;
        }
        if let Some(password) = update.password.filter(|p| !p.is_empty()) {
            if password.chars().count() < MIN_PASSWORD_LEN {
                return Err(PollxError::BadRequest(
                    "Password must be at least 6 characters".into(),
                ));
            }
            changes.password_hash = Some(hash_password(&password)?);
        }

        let user = self
            .users
            .update_profile(&user.id, &changes)
            .await?
            .ok_or_else(|| PollxError::NotFound("User not found".into()))?;

        info!(user_id = %user.id, "Profile updated");
        self.session(user)
    }

    /// Mention autocomplete. The fragment is matched literally.
    pub async fn search_users(&self, fragment: &str) -> Result<Vec<UserDoc>> {
        self.users
            .search_usernames(fragment.trim(), SEARCH_LIMIT)
            .await
    }
}
