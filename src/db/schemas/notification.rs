//! Notification document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for notifications
pub const NOTIFICATION_COLLECTION: &str = "notifications";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Comment,
    Reply,
    Vote,
    System,
    Mention,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Comment => "comment",
            Self::Reply => "reply",
            Self::Vote => "vote",
            Self::System => "system",
            Self::Mention => "mention",
        };
        f.write_str(s)
    }
}

/// Notification document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub recipient: ObjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<ObjectId>,

    #[serde(rename = "type")]
    pub kind: NotificationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_id: Option<ObjectId>,

    pub message: String,

    #[serde(default)]
    pub read: bool,
}

impl NotificationDoc {
    pub fn new(
        recipient: ObjectId,
        sender: Option<ObjectId>,
        kind: NotificationKind,
        poll_id: Option<ObjectId>,
        message: String,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            recipient,
            sender,
            kind,
            poll_id,
            message,
            read: false,
        }
    }
}

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "recipient": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("recipient_created_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for NotificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
