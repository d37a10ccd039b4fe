//! User document schema
//!
//! Stores credentials, profile, settings and gamification counters.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

pub const DEFAULT_AVATAR_URL: &str = "https://picsum.photos/200/200";
pub const DEFAULT_IDENTITY_TITLE: &str = "The Unanalyzed";
pub const DEFAULT_IDENTITY_DESCRIPTION: &str = "Data insufficient for analysis.";

/// Per-account preferences
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserSettings {
    /// Vote without notifying poll authors
    #[serde(default)]
    pub ghost_mode: bool,

    /// New polls are anonymous unless stated otherwise
    #[serde(default)]
    pub anonymous_default: bool,

    #[serde(default = "default_neon_intensity")]
    pub neon_intensity: i32,

    #[serde(default)]
    pub reduce_motion: bool,

    #[serde(default = "default_true")]
    pub notifications: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            ghost_mode: false,
            anonymous_default: false,
            neon_intensity: default_neon_intensity(),
            reduce_motion: false,
            notifications: true,
        }
    }
}

fn default_neon_intensity() -> i32 {
    80
}

fn default_true() -> bool {
    true
}

/// Gamification counters
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserStats {
    #[serde(default)]
    pub xp: i64,
    #[serde(default = "default_level")]
    pub level: i64,
    /// Consecutive UTC days with a login
    #[serde(default)]
    pub streak: i64,
    #[serde(default)]
    pub votes_cast: i64,
    /// Last login instant, drives the streak
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime>,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            xp: 0,
            level: default_level(),
            streak: 0,
            votes_cast: 0,
            last_active: None,
        }
    }
}

fn default_level() -> i64 {
    1
}

/// Profile fields to overwrite. `None` leaves the stored value alone.
///
/// Counters, badges and role are never part of a profile edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub identity_title: Option<String>,
    pub identity_description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ghost_mode: Option<bool>,
    pub anonymous_default: Option<bool>,
    pub neon_intensity: Option<i32>,
    pub reduce_motion: Option<bool>,
    pub notifications: Option<bool>,
    pub password_hash: Option<String>,
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub username: String,

    pub email: String,

    /// Argon2 PHC hash
    pub password_hash: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default = "default_avatar")]
    pub avatar_url: String,

    /// Self-declared archetype, used for vote breakdowns
    #[serde(default)]
    pub identity_title: String,

    #[serde(default)]
    pub identity_description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub settings: UserSettings,

    #[serde(default)]
    pub stats: UserStats,

    /// Sorted badge ids
    #[serde(default)]
    pub badges: Vec<String>,
}

fn default_avatar() -> String {
    DEFAULT_AVATAR_URL.to_string()
}

impl UserDoc {
    /// Create a new user document
    pub fn new(username: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            username,
            email,
            password_hash,
            role,
            avatar_url: default_avatar(),
            identity_title: DEFAULT_IDENTITY_TITLE.to_string(),
            identity_description: DEFAULT_IDENTITY_DESCRIPTION.to_string(),
            tags: Vec::new(),
            settings: UserSettings::default(),
            stats: UserStats::default(),
            badges: Vec::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn apply_profile(&mut self, changes: &ProfileChanges) {
        fn set<T: Clone>(field: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *field = v.clone();
            }
        }

        set(&mut self.username, &changes.username);
        set(&mut self.avatar_url, &changes.avatar_url);
        set(&mut self.identity_title, &changes.identity_title);
        set(&mut self.identity_description, &changes.identity_description);
        set(&mut self.tags, &changes.tags);
        set(&mut self.settings.ghost_mode, &changes.ghost_mode);
        set(&mut self.settings.anonymous_default, &changes.anonymous_default);
        set(&mut self.settings.neon_intensity, &changes.neon_intensity);
        set(&mut self.settings.reduce_motion, &changes.reduce_motion);
        set(&mut self.settings.notifications, &changes.notifications);
        set(&mut self.password_hash, &changes.password_hash);
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = UserDoc::new("ann".into(), "ann@x.io".into(), "$argon2id$..".into(), Role::User);
        assert_eq!(user.identity_title, DEFAULT_IDENTITY_TITLE);
        assert_eq!(user.stats.level, 1);
        assert!(user.settings.notifications);
        assert!(!user.settings.ghost_mode);
        assert!(user.badges.is_empty());
    }

    #[test]
    fn test_missing_settings_deserialize_to_defaults() {
        let id = ObjectId::new();
        let raw = doc! {
            "_id": id,
            "username": "old",
            "email": "old@x.io",
            "password_hash": "h",
        };
        let user: UserDoc = bson::from_document(raw).unwrap();
        assert_eq!(user.settings, UserSettings::default());
        assert_eq!(user.stats.level, 1);
        assert_eq!(user.role, Role::User);
    }
}
