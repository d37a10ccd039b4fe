//! Poll lifecycle
//!
//! Polls start pending and only reach the feed once a moderator approves
//! them. Tallies are never written here; see the vote ledger.

use bson::oid::ObjectId;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{
    Category, PollChanges, PollDoc, PollMode, PollOption, PollStatus, UserDoc,
};
use crate::notify::{Event, Fanout, PollRef};
use crate::store::{CommentStore, PollStore, TagCount, VoteStore};
use crate::types::{PollxError, Result};

/// Default size of the trending topics list
pub const TRENDING_LIMIT: usize = 5;

const MIN_STANDARD_OPTIONS: usize = 2;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub mode: Option<PollMode>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_anonymous: Option<bool>,
}

/// Owner edit. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollEdit {
    pub question: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub options: Option<Vec<String>>,
}

/// Trimmed, lower-cased, first occurrence wins
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn clean_options(options: Vec<String>) -> Vec<String> {
    options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

fn parse_category(raw: &str) -> Result<Category> {
    Category::from_str(raw.trim()).map_err(PollxError::BadRequest)
}

fn require_standard_options(count: usize) -> Result<()> {
    if count < MIN_STANDARD_OPTIONS {
        return Err(PollxError::BadRequest(
            "Standard polls require at least 2 options".into(),
        ));
    }
    Ok(())
}

/// Cleaned option texts, first occurrence wins
fn distinct_options(options: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(options.len());
    for option in clean_options(options) {
        if !out.contains(&option) {
            out.push(option);
        }
    }
    out
}

fn poll_ref(poll: &PollDoc) -> PollRef {
    PollRef {
        id: poll.id,
        author_id: poll.author_id,
        question: poll.question.clone(),
    }
}

pub struct PollService {
    polls: Arc<dyn PollStore>,
    votes: Arc<dyn VoteStore>,
    comments: Arc<dyn CommentStore>,
    fanout: Arc<Fanout>,
}

impl PollService {
    pub fn new(
        polls: Arc<dyn PollStore>,
        votes: Arc<dyn VoteStore>,
        comments: Arc<dyn CommentStore>,
        fanout: Arc<Fanout>,
    ) -> Self {
        Self {
            polls,
            votes,
            comments,
            fanout,
        }
    }

    pub async fn create_poll(&self, author: &UserDoc, input: CreatePollInput) -> Result<PollDoc> {
        let question = input.question.trim();
        if question.is_empty() || input.category.trim().is_empty() {
            return Err(PollxError::BadRequest(
                "Question and category are required".into(),
            ));
        }
        let category = parse_category(&input.category)?;
        let mode = input.mode.unwrap_or_default();

        let mut poll = PollDoc::new(author.id, question, category);
        poll.mode = mode;
        poll.description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        poll.tags = normalize_tags(input.tags);
        poll.is_anonymous = input
            .is_anonymous
            .unwrap_or(author.settings.anonymous_default);

        if mode == PollMode::Standard {
            let options = clean_options(input.options);
            require_standard_options(options.len())?;
            poll.options = options.into_iter().map(PollOption::new).collect();
        }

        let poll = self.polls.insert(poll).await?;
        info!(poll_id = %poll.id, author_id = %author.id, mode = %poll.mode, "Poll created");
        Ok(poll)
    }

    /// Approved polls, newest first
    pub async fn feed(&self) -> Result<Vec<PollDoc>> {
        self.polls.list_by_status(PollStatus::Approved, true).await
    }

    /// Moderation queue, oldest first
    pub async fn pending(&self) -> Result<Vec<PollDoc>> {
        self.polls.list_by_status(PollStatus::Pending, false).await
    }

    pub async fn my_polls(&self, user: &UserDoc) -> Result<Vec<PollDoc>> {
        self.polls.list_by_author(&user.id).await
    }

    pub async fn get_poll(&self, id: &ObjectId) -> Result<PollDoc> {
        self.polls
            .find_by_id(id)
            .await?
            .ok_or_else(|| PollxError::NotFound("Poll not found".into()))
    }

    pub async fn moderate(&self, id: &ObjectId, status: &str) -> Result<PollDoc> {
        let status = match status.trim() {
            "approved" => PollStatus::Approved,
            "rejected" => PollStatus::Rejected,
            _ => {
                return Err(PollxError::BadRequest(
                    "Status must be approved or rejected".into(),
                ))
            }
        };

        let poll = self
            .polls
            .set_status(id, status)
            .await?
            .ok_or_else(|| PollxError::NotFound("Poll not found".into()))?;

        info!(poll_id = %poll.id, status = %status, "Poll moderated");
        self.fanout
            .dispatch(Event::PollModerated {
                poll: poll_ref(&poll),
                status,
            })
            .await;

        Ok(poll)
    }

    /// Owner edit. Only the edited fields are written; tallies keep moving
    /// underneath and surviving options keep their votes.
    pub async fn update_poll(&self, owner: &UserDoc, id: &ObjectId, edit: PollEdit) -> Result<PollDoc> {
        let poll = self.get_poll(id).await?;
        if poll.author_id != owner.id {
            return Err(PollxError::Unauthorized(
                "Not authorized to edit this poll".into(),
            ));
        }

        let mut changes = PollChanges::default();
        if let Some(question) = edit.question.map(|q| q.trim().to_string()) {
            if question.is_empty() {
                return Err(PollxError::BadRequest("Question is required".into()));
            }
            changes.question = Some(question);
        }
        if let Some(description) = edit.description {
            let description = description.trim().to_string();
            changes.description = Some((!description.is_empty()).then_some(description));
        }
        if let Some(category) = edit.category {
            changes.category = Some(parse_category(&category)?);
        }
        if let Some(tags) = edit.tags {
            changes.tags = Some(normalize_tags(tags));
        }
        if poll.mode == PollMode::Standard {
            if let Some(texts) = edit.options {
                let texts = distinct_options(texts);
                require_standard_options(texts.len())?;
                changes.options = Some(texts);
            }
        }

        let poll = self
            .polls
            .apply_edit(id, &changes)
            .await?
            .ok_or_else(|| PollxError::NotFound("Poll not found".into()))?;

        info!(poll_id = %poll.id, "Poll edited");
        Ok(poll)
    }

    /// Owner or admin. Removes the poll's ledger entries and comments too.
    pub async fn delete_poll(&self, user: &UserDoc, id: &ObjectId) -> Result<()> {
        let poll = self.get_poll(id).await?;
        if poll.author_id != user.id && !user.is_admin() {
            return Err(PollxError::Unauthorized(
                "Not authorized to delete this poll".into(),
            ));
        }

        if !self.polls.delete(id).await? {
            return Err(PollxError::NotFound("Poll not found".into()));
        }
        let votes = self.votes.delete_for_poll(id).await?;
        let comments = self.comments.delete_for_poll(id).await?;

        info!(poll_id = %id, votes, comments, "Poll deleted");
        Ok(())
    }

    pub async fn trending(&self, limit: usize) -> Result<Vec<TagCount>> {
        self.polls.trending_tags(limit).await
    }
}
