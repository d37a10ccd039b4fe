//! Election document schema

use bson::{oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for elections
pub const ELECTION_COLLECTION: &str = "elections";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    #[default]
    Upcoming,
    Active,
    Ended,
    Paused,
}

impl ElectionStatus {
    /// Whether candidates may still join
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Upcoming | Self::Active)
    }
}

impl FromStr for ElectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            "paused" => Ok(Self::Paused),
            other => Err(format!("Invalid election status: {}", other)),
        }
    }
}

/// Election document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ElectionDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    pub description: String,

    pub start_date: DateTime,

    pub end_date: DateTime,

    #[serde(default)]
    pub status: ElectionStatus,

    #[serde(default)]
    pub regions: Vec<String>,

    /// Candidate document ids
    #[serde(default)]
    pub candidates: Vec<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectId>,
}

impl IntoIndexes for ElectionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        Vec::new()
    }
}

impl MutMetadata for ElectionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
