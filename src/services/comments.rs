//! Poll comments and reactions

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{CommentDoc, Reaction, UserDoc};
use crate::notify::{Event, Fanout, PollRef};
use crate::store::{CommentStore, PollStore};
use crate::types::{PollxError, Result};

pub struct CommentService {
    polls: Arc<dyn PollStore>,
    comments: Arc<dyn CommentStore>,
    fanout: Arc<Fanout>,
}

impl CommentService {
    pub fn new(
        polls: Arc<dyn PollStore>,
        comments: Arc<dyn CommentStore>,
        fanout: Arc<Fanout>,
    ) -> Self {
        Self {
            polls,
            comments,
            fanout,
        }
    }

    /// Post a comment. `parent_id` is not checked: an unknown parent is
    /// stored as given and simply produces no reply notification.
    pub async fn add_comment(
        &self,
        author: &UserDoc,
        poll_id: &ObjectId,
        text: &str,
        parent_id: Option<ObjectId>,
    ) -> Result<CommentDoc> {
        let poll = self
            .polls
            .find_by_id(poll_id)
            .await?
            .ok_or_else(|| PollxError::NotFound("Poll not found".into()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(PollxError::BadRequest("Comment text is required".into()));
        }

        let comment = self
            .comments
            .insert(CommentDoc::new(
                poll.id,
                author.id,
                author.username.clone(),
                text.to_string(),
                parent_id,
            ))
            .await?;

        info!(
            poll_id = %poll.id,
            comment_id = %comment.id,
            reply = parent_id.is_some(),
            "Comment posted"
        );

        self.fanout
            .dispatch(Event::CommentPosted {
                poll: PollRef {
                    id: poll.id,
                    author_id: poll.author_id,
                    question: poll.question,
                },
                comment: comment.clone(),
            })
            .await;

        Ok(comment)
    }

    /// Newest first
    pub async fn list_comments(&self, poll_id: &ObjectId) -> Result<Vec<CommentDoc>> {
        self.comments.list_by_poll(poll_id).await
    }

    /// Toggle `user`'s reaction on a comment of `poll_id`
    pub async fn react(
        &self,
        user: &UserDoc,
        poll_id: &ObjectId,
        comment_id: &ObjectId,
        reaction: Reaction,
    ) -> Result<CommentDoc> {
        let not_found = || PollxError::NotFound("Comment not found".into());

        let comment = self.comments.find_by_id(comment_id).await?.ok_or_else(not_found)?;
        if &comment.poll_id != poll_id {
            return Err(not_found());
        }

        self.comments
            .react(comment_id, &user.id, reaction)
            .await?
            .ok_or_else(not_found)
    }
}
