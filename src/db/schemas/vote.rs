//! Vote ledger entry schema
//!
//! One document per (user, poll). The unique compound index is what makes
//! concurrent duplicate votes collapse to a single ledger entry.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for vote ledger entries
pub const VOTE_COLLECTION: &str = "votes";

/// Ledger entry stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoteDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: ObjectId,

    pub poll_id: ObjectId,

    pub option_id: ObjectId,
}

impl VoteDoc {
    pub fn new(user_id: ObjectId, poll_id: ObjectId, option_id: ObjectId) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            user_id,
            poll_id,
            option_id,
        }
    }
}

impl IntoIndexes for VoteDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1, "poll_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_poll_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for VoteDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
