//! Notification inbox

use bson::oid::ObjectId;
use std::sync::Arc;

use crate::db::schemas::{NotificationDoc, UserDoc};
use crate::store::NotificationStore;
use crate::types::{PollxError, Result};

/// Most recent notifications returned per request
pub const INBOX_LIMIT: usize = 50;

pub struct NotificationService {
    notifications: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }

    pub async fn list(&self, user: &UserDoc) -> Result<Vec<NotificationDoc>> {
        self.notifications
            .list_for_recipient(&user.id, INBOX_LIMIT)
            .await
    }

    /// Someone else's notification is reported as missing
    pub async fn mark_read(&self, user: &UserDoc, id: &ObjectId) -> Result<()> {
        if !self.notifications.mark_read(id, &user.id).await? {
            return Err(PollxError::NotFound("Notification not found".into()));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user: &UserDoc) -> Result<u64> {
        self.notifications.mark_all_read(&user.id).await
    }
}
