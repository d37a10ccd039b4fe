//! Keyed system state
//!
//! A single-row-per-key table for process-wide aggregates such as the
//! collective mood.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for system state
pub const SYSTEM_STATE_COLLECTION: &str = "system_state";

/// Key of the collective mood row
pub const MOOD_KEY: &str = "collective_mood";

/// System state row stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SystemStateDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub key: String,

    /// Absent until the first successful computation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Document>,

    pub last_updated: DateTime,
}

impl IntoIndexes for SystemStateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "key": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("key_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for SystemStateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
