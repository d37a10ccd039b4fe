//! Comment document schema
//!
//! Threading is a single back-reference to the parent comment.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for comments
pub const COMMENT_COLLECTION: &str = "comments";

/// Reaction a user can toggle on a comment
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

/// Comment document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CommentDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub poll_id: ObjectId,

    pub author_id: ObjectId,

    /// Cached for display
    pub author_name: String,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ObjectId>,

    /// Size of `liked_by`
    #[serde(default)]
    pub likes: i64,

    #[serde(default)]
    pub liked_by: Vec<ObjectId>,

    #[serde(default)]
    pub disliked_by: Vec<ObjectId>,
}

impl CommentDoc {
    pub fn new(
        poll_id: ObjectId,
        author_id: ObjectId,
        author_name: String,
        text: String,
        parent_id: Option<ObjectId>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            poll_id,
            author_id,
            author_name,
            text,
            parent_id,
            likes: 0,
            liked_by: Vec::new(),
            disliked_by: Vec::new(),
        }
    }

    /// Toggle `user` in the reaction's set and clear the opposite set
    pub fn apply_reaction(&mut self, user: ObjectId, reaction: Reaction) {
        let (target, other) = match reaction {
            Reaction::Like => (&mut self.liked_by, &mut self.disliked_by),
            Reaction::Dislike => (&mut self.disliked_by, &mut self.liked_by),
        };
        other.retain(|id| id != &user);
        if let Some(pos) = target.iter().position(|id| id == &user) {
            target.remove(pos);
        } else {
            target.push(user);
        }
        self.likes = self.liked_by.len() as i64;
    }
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "poll_id": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("poll_created_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CommentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment() -> CommentDoc {
        CommentDoc::new(ObjectId::new(), ObjectId::new(), "c".into(), "hi".into(), None)
    }

    #[test]
    fn test_like_toggles() {
        let mut c = comment();
        let u = ObjectId::new();
        c.apply_reaction(u, Reaction::Like);
        assert_eq!(c.likes, 1);
        c.apply_reaction(u, Reaction::Like);
        assert_eq!(c.likes, 0);
        assert!(c.liked_by.is_empty());
    }

    #[test]
    fn test_dislike_clears_like() {
        let mut c = comment();
        let u = ObjectId::new();
        c.apply_reaction(u, Reaction::Like);
        c.apply_reaction(u, Reaction::Dislike);
        assert_eq!(c.likes, 0);
        assert_eq!(c.disliked_by, vec![u]);
    }
}
