//! Common metadata for all documents
//!
//! Tracks creation and update timestamps. Deletes are hard deletes so unique
//! indexes stay authoritative.

use bson::DateTime;
use chrono::{DateTime as ChronoDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// When the document was created
    pub created_at: DateTime,

    /// When the document was last updated
    pub updated_at: DateTime,
}

impl Metadata {
    /// Create new metadata with current timestamp
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Metadata pinned to a specific creation instant
    pub fn at(when: ChronoDateTime<Utc>) -> Self {
        let at = DateTime::from_chrono(when);
        Self {
            created_at: at,
            updated_at: at,
        }
    }

    pub fn created(&self) -> ChronoDateTime<Utc> {
        self.created_at.to_chrono()
    }

    pub fn touch(&mut self) {
        self.updated_at = DateTime::now();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
