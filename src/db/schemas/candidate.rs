//! Candidate document schema
//!
//! One candidacy per account, carrying the generated leadership profile and
//! campaign data once the candidate joins an election.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for candidates
pub const CANDIDATE_COLLECTION: &str = "candidates";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    PendingReview,
    Approved,
    Rejected,
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_review" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("Invalid candidate status: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LeadershipStyle {
    Visionary,
    Strategic,
    Aggressive,
    #[default]
    Diplomatic,
    Servant,
}

/// Evaluated leadership profile. Stored in the same camelCase shape the
/// evaluator returns.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeadershipProfile {
    pub personality_summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub leadership_style: LeadershipStyle,
    /// 0-100
    pub agenda_score: i32,
}

/// Candidate document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CandidateDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: ObjectId,

    #[serde(default = "default_party")]
    pub party_affiliation: String,

    pub manifesto: String,
    pub background: String,
    pub contact_info: String,
    pub reason_for_contesting: String,
    pub experience: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_id: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    #[serde(default)]
    pub promises: Vec<String>,

    #[serde(default)]
    pub key_issues: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_profile: Option<LeadershipProfile>,

    #[serde(default)]
    pub status: CandidateStatus,
}

pub(crate) fn default_party() -> String {
    "Independent".to_string()
}

impl IntoIndexes for CandidateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CandidateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
