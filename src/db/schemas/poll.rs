//! Poll document schema
//!
//! A poll carries its own tallies. Standard polls hold options with vote
//! counts and an archetype breakdown; consciousness polls hold free-text
//! entries instead.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for polls
pub const POLL_COLLECTION: &str = "polls";

/// Archetype label used when a voter has not declared one
pub const ANONYMOUS_ARCHETYPE: &str = "Anonymous";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Moral,
    Social,
    Politics,
    Tech,
    Hypothetical,
    Relationships,
    Consciousness,
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Moral" => Ok(Self::Moral),
            "Social" => Ok(Self::Social),
            "Politics" => Ok(Self::Politics),
            "Tech" => Ok(Self::Tech),
            "Hypothetical" => Ok(Self::Hypothetical),
            "Relationships" => Ok(Self::Relationships),
            "Consciousness" => Ok(Self::Consciousness),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    #[default]
    Standard,
    Consciousness,
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Consciousness => write!(f, "consciousness"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One votable option
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PollOption {
    /// Stable vote target, kept across edits that preserve the text
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub text: String,

    #[serde(default)]
    pub votes: i64,

    /// Archetype label to vote count. Keys are sanitised by `archetype_key`.
    #[serde(default)]
    pub archetypes: BTreeMap<String, i64>,
}

impl PollOption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            text: text.into(),
            votes: 0,
            archetypes: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsciousnessLayer {
    #[default]
    Real,
    Hidden,
    Desired,
}

/// Free-text submission to a consciousness poll
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConsciousnessEntry {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub text: String,

    /// 0-100
    pub intensity: i32,

    #[serde(default)]
    pub layer: ConsciousnessLayer,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,

    pub created_at: DateTime,
}

/// Owner edit applied to the stored poll. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollChanges {
    pub question: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
    /// Distinct option texts in display order
    pub options: Option<Vec<String>>,
}

/// Poll document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PollDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub author_id: ObjectId,

    pub question: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub category: Category,

    #[serde(default)]
    pub mode: PollMode,

    #[serde(default)]
    pub status: PollStatus,

    #[serde(default)]
    pub options: Vec<PollOption>,

    #[serde(default)]
    pub consciousness_entries: Vec<ConsciousnessEntry>,

    /// Sum of option votes (standard) or entry count (consciousness)
    #[serde(default)]
    pub total_votes: i64,

    #[serde(default)]
    pub is_hot: bool,

    #[serde(default)]
    pub is_edited: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_anonymous: bool,
}

impl PollDoc {
    /// A pending standard poll with no options
    pub fn new(author_id: ObjectId, question: impl Into<String>, category: Category) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            author_id,
            question: question.into(),
            description: None,
            category,
            mode: PollMode::Standard,
            status: PollStatus::Pending,
            options: Vec::new(),
            consciousness_entries: Vec::new(),
            total_votes: 0,
            is_hot: false,
            is_edited: false,
            tags: Vec::new(),
            is_anonymous: false,
        }
    }

    pub fn option(&self, option_id: &ObjectId) -> Option<&PollOption> {
        self.options.iter().find(|o| &o.id == option_id)
    }

    /// Sum of per-option votes
    pub fn option_vote_sum(&self) -> i64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    /// Apply an owner edit in place and mark the poll edited.
    ///
    /// An option whose text survives keeps its id and tallies; anything else
    /// starts from zero. The total is recounted only when options change.
    pub fn apply_changes(&mut self, changes: &PollChanges) {
        if let Some(question) = &changes.question {
            self.question = question.clone();
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(tags) = &changes.tags {
            self.tags = tags.clone();
        }
        if let Some(texts) = &changes.options {
            let mut pool: Vec<Option<PollOption>> =
                std::mem::take(&mut self.options).into_iter().map(Some).collect();

            self.options = texts
                .iter()
                .map(|text| {
                    pool.iter_mut()
                        .find(|slot| slot.as_ref().is_some_and(|o| &o.text == text))
                        .and_then(Option::take)
                        .unwrap_or_else(|| PollOption::new(text.clone()))
                })
                .collect();
            self.total_votes = self.option_vote_sum();
        }
        self.is_edited = true;
    }
}

/// Sanitise an archetype label for use as a document key.
///
/// `.` would address a nested path and a leading `$` an operator, so both
/// become `_`. An empty label maps to the anonymous archetype.
pub fn archetype_key(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return ANONYMOUS_ARCHETYPE.to_string();
    }
    let mut key = trimmed.replace('.', "_");
    if key.starts_with('$') {
        key.replace_range(0..1, "_");
    }
    key
}

impl IntoIndexes for PollDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "status": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("status_created_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "author_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("author_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "tags": 1 },
                Some(IndexOptions::builder().name("tags_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for PollDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archetype_key_sanitises_paths() {
        assert_eq!(archetype_key("The Realist"), "The Realist");
        assert_eq!(archetype_key("Dr. Who"), "Dr_ Who");
        assert_eq!(archetype_key("$where"), "_where");
        assert_eq!(archetype_key("a$b"), "a$b");
        assert_eq!(archetype_key("   "), ANONYMOUS_ARCHETYPE);
    }

    #[test]
    fn test_mode_and_status_wire_names() {
        assert_eq!(
            bson::to_bson(&PollMode::Consciousness).unwrap(),
            bson::Bson::String("consciousness".into())
        );
        assert_eq!(PollStatus::Approved.to_string(), "approved");
        assert_eq!("Tech".parse::<Category>().unwrap(), Category::Tech);
        assert!("tech".parse::<Category>().is_err());
    }

    #[test]
    fn test_apply_changes_keeps_surviving_options() {
        let mut poll = PollDoc::new(ObjectId::new(), "Cats or dogs?", Category::Social);
        let mut yes = PollOption::new("Yes");
        yes.votes = 4;
        let yes_id = yes.id;
        poll.options = vec![yes, PollOption::new("No")];
        poll.total_votes = 4;

        poll.apply_changes(&PollChanges {
            options: Some(vec!["Maybe".into(), "Yes".into()]),
            ..Default::default()
        });

        assert_eq!(poll.options.len(), 2);
        assert_eq!(poll.options[0].text, "Maybe");
        assert_eq!(poll.options[0].votes, 0);
        assert_eq!(poll.options[1].id, yes_id);
        assert_eq!(poll.options[1].votes, 4);
        assert_eq!(poll.total_votes, 4);
        assert!(poll.is_edited);
    }

    #[test]
    fn test_apply_changes_leaves_counters_without_option_edit() {
        let mut poll = PollDoc::new(ObjectId::new(), "Cats or dogs?", Category::Social);
        poll.description = Some("old".into());
        poll.options = vec![PollOption::new("Cats"), PollOption::new("Dogs")];
        poll.options[1].votes = 2;
        poll.total_votes = 2;

        poll.apply_changes(&PollChanges {
            question: Some("Dogs or cats?".into()),
            description: Some(None),
            ..Default::default()
        });

        assert_eq!(poll.question, "Dogs or cats?");
        assert_eq!(poll.description, None);
        assert_eq!(poll.options[1].votes, 2);
        assert_eq!(poll.total_votes, 2);
    }
}
