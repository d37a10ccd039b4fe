//! MongoDB storage
//!
//! Tally and stat changes are single `$inc` updates so concurrent votes never
//! lose increments. The unique (user_id, poll_id) index on `votes` is the
//! authoritative duplicate-vote guard.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::options::{ReturnDocument, UpdateModifications};

use super::{
    CampaignUpdate, CandidateStore, CommentStore, ElectionStore, NotificationStore, PollStore,
    SystemStateStore, TagCount, TallyUpdate, UserStore, VoteStore,
};
use crate::db::schemas::{
    archetype_key, CandidateDoc, CandidateStatus, CommentDoc, ConsciousnessEntry, ElectionDoc,
    ElectionStatus, NotificationDoc, PollChanges, PollDoc, PollOption, PollStatus, ProfileChanges,
    Reaction, SystemStateDoc, UserDoc, VoteDoc, CANDIDATE_COLLECTION, COMMENT_COLLECTION, ELECTION_COLLECTION,
    NOTIFICATION_COLLECTION, POLL_COLLECTION, SYSTEM_STATE_COLLECTION, USER_COLLECTION,
    VOTE_COLLECTION,
};
use crate::db::{is_duplicate_key, MongoClient, MongoCollection};
use crate::types::{PollxError, Result};

/// Sort newest first with a stable tie-break
fn newest_first() -> Document {
    doc! { "metadata.created_at": -1, "_id": -1 }
}

fn oldest_first() -> Document {
    doc! { "metadata.created_at": 1, "_id": 1 }
}

/// MongoDB-backed store
#[derive(Clone)]
pub struct MongoStore {
    users: MongoCollection<UserDoc>,
    polls: MongoCollection<PollDoc>,
    votes: MongoCollection<VoteDoc>,
    comments: MongoCollection<CommentDoc>,
    notifications: MongoCollection<NotificationDoc>,
    candidates: MongoCollection<CandidateDoc>,
    elections: MongoCollection<ElectionDoc>,
    system: MongoCollection<SystemStateDoc>,
}

impl MongoStore {
    /// Open every collection and apply its indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
            polls: client.collection(POLL_COLLECTION).await?,
            votes: client.collection(VOTE_COLLECTION).await?,
            comments: client.collection(COMMENT_COLLECTION).await?,
            notifications: client.collection(NOTIFICATION_COLLECTION).await?,
            candidates: client.collection(CANDIDATE_COLLECTION).await?,
            elections: client.collection(ELECTION_COLLECTION).await?,
            system: client.collection(SYSTEM_STATE_COLLECTION).await?,
        })
    }
}

/// Re-label a collection-level conflict with a caller-facing message
fn relabel_conflict(err: PollxError, message: &str) -> PollxError {
    match err {
        PollxError::Conflict(_) => PollxError::Conflict(message.to_string()),
        other => other,
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert(&self, user: UserDoc) -> Result<UserDoc> {
        self.users
            .insert_one(user)
            .await
            .map_err(|e| relabel_conflict(e, "User already exists"))
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "_id": id }).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "email": email }).await
    }

    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<UserDoc>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        self.users
            .find_many(doc! { "username": { "$in": usernames } }, None, None)
            .await
    }

    async fn search_usernames(&self, fragment: &str, limit: usize) -> Result<Vec<UserDoc>> {
        let filter = doc! {
            "username": { "$regex": regex::escape(fragment), "$options": "i" }
        };
        self.users
            .find_many(filter, Some(doc! { "username": 1 }), Some(limit as i64))
            .await
    }

    async fn update_profile(
        &self,
        user_id: &ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<UserDoc>> {
        let result = self
            .users
            .inner()
            .find_one_and_update(doc! { "_id": user_id }, doc! { "$set": profile_set(changes) })
            .return_document(ReturnDocument::After)
            .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_duplicate_key(&e) => {
                Err(PollxError::Conflict("Username already taken".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record_login(
        &self,
        user_id: &ObjectId,
        streak: i64,
        at: BsonDateTime,
    ) -> Result<Option<UserDoc>> {
        self.users
            .inner()
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "stats.streak": streak,
                    "stats.last_active": at,
                    "metadata.updated_at": BsonDateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(PollxError::from)
    }

    async fn record_vote(&self, user_id: &ObjectId, xp: i64) -> Result<()> {
        let result = self
            .users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$inc": { "stats.votes_cast": 1_i64, "stats.xp": xp } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(PollxError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn set_badges(&self, user_id: &ObjectId, badges: &[String]) -> Result<()> {
        self.users
            .update_one(doc! { "_id": user_id }, doc! { "$set": { "badges": badges } })
            .await?;
        Ok(())
    }
}

/// `$set` body for a profile edit. Settings are addressed by path so
/// untouched settings and every counter keep their stored value.
fn profile_set(changes: &ProfileChanges) -> Document {
    let mut set = doc! { "metadata.updated_at": BsonDateTime::now() };

    let strings = [
        ("username", &changes.username),
        ("avatar_url", &changes.avatar_url),
        ("identity_title", &changes.identity_title),
        ("identity_description", &changes.identity_description),
        ("password_hash", &changes.password_hash),
    ];
    for (key, value) in strings {
        if let Some(value) = value {
            set.insert(key, value.as_str());
        }
    }

    let flags = [
        ("settings.ghost_mode", changes.ghost_mode),
        ("settings.anonymous_default", changes.anonymous_default),
        ("settings.reduce_motion", changes.reduce_motion),
        ("settings.notifications", changes.notifications),
    ];
    for (key, value) in flags {
        if let Some(value) = value {
            set.insert(key, value);
        }
    }

    if let Some(tags) = &changes.tags {
        set.insert("tags", tags.clone());
    }
    if let Some(intensity) = changes.neon_intensity {
        set.insert("settings.neon_intensity", intensity);
    }
    set
}

/// Aggregation-pipeline update for an owner edit.
///
/// Option documents are rebuilt from the stored array at write time, so a
/// surviving text keeps whatever tallies it has when the update runs. Caller
/// text is wrapped in `$literal` so a leading `$` is never read as a path.
fn edit_pipeline(changes: &PollChanges) -> Result<Vec<Document>> {
    let literal = |value: Bson| doc! { "$literal": value };

    let mut set = doc! { "is_edited": true, "metadata.updated_at": "$$NOW" };
    if let Some(question) = &changes.question {
        set.insert("question", literal(question.as_str().into()));
    }
    match &changes.description {
        Some(Some(description)) => {
            set.insert("description", literal(description.as_str().into()));
        }
        Some(None) => {
            set.insert("description", "$$REMOVE");
        }
        None => {}
    }
    if let Some(category) = changes.category {
        set.insert("category", bson::to_bson(&category)?);
    }
    if let Some(tags) = &changes.tags {
        set.insert("tags", literal(tags.clone().into()));
    }

    let Some(texts) = &changes.options else {
        return Ok(vec![doc! { "$set": set }]);
    };

    let fresh = texts
        .iter()
        .map(|text| bson::to_bson(&PollOption::new(text.as_str())))
        .collect::<std::result::Result<Vec<Bson>, _>>()?;

    set.insert(
        "options",
        doc! {
            "$map": {
                "input": { "$literal": fresh },
                "as": "fresh",
                "in": {
                    "$ifNull": [
                        { "$arrayElemAt": [
                            { "$filter": {
                                "input": { "$ifNull": ["$options", []] },
                                "cond": { "$eq": ["$$this.text", "$$fresh.text"] },
                            } },
                            0,
                        ] },
                        "$$fresh",
                    ]
                },
            }
        },
    );

    Ok(vec![
        doc! { "$set": set },
        doc! { "$set": { "total_votes": { "$sum": "$options.votes" } } },
    ])
}

#[async_trait]
impl PollStore for MongoStore {
    async fn insert(&self, poll: PollDoc) -> Result<PollDoc> {
        self.polls.insert_one(poll).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<PollDoc>> {
        self.polls.find_one(doc! { "_id": id }).await
    }

    async fn list_by_status(&self, status: PollStatus, newest_first_order: bool) -> Result<Vec<PollDoc>> {
        let sort = if newest_first_order {
            newest_first()
        } else {
            oldest_first()
        };
        self.polls
            .find_many(doc! { "status": status.as_str() }, Some(sort), None)
            .await
    }

    async fn list_by_author(&self, author_id: &ObjectId) -> Result<Vec<PollDoc>> {
        self.polls
            .find_many(doc! { "author_id": author_id }, Some(newest_first()), None)
            .await
    }

    async fn apply_edit(&self, id: &ObjectId, changes: &PollChanges) -> Result<Option<PollDoc>> {
        self.polls
            .inner()
            .find_one_and_update(
                doc! { "_id": id },
                UpdateModifications::Pipeline(edit_pipeline(changes)?),
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(PollxError::from)
    }

    async fn set_status(&self, id: &ObjectId, status: PollStatus) -> Result<Option<PollDoc>> {
        self.polls
            .inner()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    "status": status.as_str(),
                    "metadata.updated_at": BsonDateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(PollxError::from)
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool> {
        let result = self.polls.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn increment_tally(
        &self,
        poll_id: &ObjectId,
        option_id: &ObjectId,
        archetype: &str,
    ) -> Result<Option<TallyUpdate>> {
        let mut inc = Document::new();
        inc.insert("options.$.votes", 1_i64);
        inc.insert(
            format!("options.$.archetypes.{}", archetype_key(archetype)),
            1_i64,
        );
        inc.insert("total_votes", 1_i64);

        let updated = self
            .polls
            .inner()
            .find_one_and_update(
                doc! { "_id": poll_id, "options._id": option_id },
                doc! {
                    "$inc": inc,
                    "$set": { "metadata.updated_at": BsonDateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated.and_then(|poll| {
            poll.option(option_id).map(|option| TallyUpdate {
                option_votes: option.votes,
                total_votes: poll.total_votes,
            })
        }))
    }

    async fn push_consciousness_entry(
        &self,
        poll_id: &ObjectId,
        entry: ConsciousnessEntry,
    ) -> Result<Option<i64>> {
        let entry = bson::to_bson(&entry)?;
        let updated = self
            .polls
            .inner()
            .find_one_and_update(
                doc! { "_id": poll_id },
                doc! {
                    "$push": { "consciousness_entries": entry },
                    "$inc": { "total_votes": 1_i64 },
                    "$set": { "metadata.updated_at": BsonDateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated.map(|poll| poll.total_votes))
    }

    async fn recent_approved(&self, since: DateTime<Utc>) -> Result<Vec<PollDoc>> {
        self.polls
            .find_many(
                doc! {
                    "status": PollStatus::Approved.as_str(),
                    "metadata.created_at": { "$gte": BsonDateTime::from_chrono(since) },
                },
                Some(oldest_first()),
                None,
            )
            .await
    }

    async fn trending_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
        let pipeline = vec![
            doc! { "$match": { "status": PollStatus::Approved.as_str() } },
            doc! { "$unwind": "$tags" },
            doc! { "$group": { "_id": "$tags", "count": { "$sum": 1 } } },
            doc! { "$sort": { "count": -1, "_id": 1 } },
            doc! { "$limit": limit as i64 },
        ];

        let rows: Vec<Document> = self
            .polls
            .inner()
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let tag = row.get_str("_id").ok()?.to_string();
                let count = match row.get("count")? {
                    Bson::Int32(n) => i64::from(*n),
                    Bson::Int64(n) => *n,
                    _ => return None,
                };
                Some(TagCount { tag, count })
            })
            .collect())
    }
}

#[async_trait]
impl VoteStore for MongoStore {
    async fn insert(&self, vote: VoteDoc) -> Result<()> {
        match self.votes.inner().insert_one(&vote).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(PollxError::DuplicateVote),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, user_id: &ObjectId, poll_id: &ObjectId) -> Result<Option<VoteDoc>> {
        self.votes
            .find_one(doc! { "user_id": user_id, "poll_id": poll_id })
            .await
    }

    async fn delete(&self, user_id: &ObjectId, poll_id: &ObjectId) -> Result<bool> {
        let result = self
            .votes
            .delete_one(doc! { "user_id": user_id, "poll_id": poll_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_for_poll(&self, poll_id: &ObjectId) -> Result<u64> {
        let result = self.votes.delete_many(doc! { "poll_id": poll_id }).await?;
        Ok(result.deleted_count)
    }
}

/// Aggregation-pipeline update toggling `user` in one reaction set and
/// removing it from the other, then recounting likes
fn reaction_pipeline(user: &ObjectId, reaction: Reaction) -> Vec<Document> {
    let (target, other) = match reaction {
        Reaction::Like => ("liked_by", "disliked_by"),
        Reaction::Dislike => ("disliked_by", "liked_by"),
    };
    let target_ref = format!("${}", target);
    let other_ref = format!("${}", other);

    let without = |field: &str| {
        doc! {
            "$filter": {
                "input": { "$ifNull": [field, []] },
                "cond": { "$ne": ["$$this", user] },
            }
        }
    };

    let mut set = Document::new();
    set.insert(
        target,
        doc! {
            "$cond": [
                { "$in": [user, { "$ifNull": [&target_ref, []] }] },
                without(&target_ref),
                { "$concatArrays": [{ "$ifNull": [&target_ref, []] }, [user]] },
            ]
        },
    );
    set.insert(other, without(&other_ref));

    vec![
        doc! { "$set": set },
        doc! { "$set": {
            "likes": { "$size": "$liked_by" },
            "metadata.updated_at": "$$NOW",
        } },
    ]
}

#[async_trait]
impl CommentStore for MongoStore {
    async fn insert(&self, comment: CommentDoc) -> Result<CommentDoc> {
        self.comments.insert_one(comment).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<CommentDoc>> {
        self.comments.find_one(doc! { "_id": id }).await
    }

    async fn list_by_poll(&self, poll_id: &ObjectId) -> Result<Vec<CommentDoc>> {
        self.comments
            .find_many(doc! { "poll_id": poll_id }, Some(newest_first()), None)
            .await
    }

    async fn react(
        &self,
        id: &ObjectId,
        user_id: &ObjectId,
        reaction: Reaction,
    ) -> Result<Option<CommentDoc>> {
        self.comments
            .inner()
            .find_one_and_update(
                doc! { "_id": id },
                UpdateModifications::Pipeline(reaction_pipeline(user_id, reaction)),
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(PollxError::from)
    }

    async fn delete_for_poll(&self, poll_id: &ObjectId) -> Result<u64> {
        let result = self.comments.delete_many(doc! { "poll_id": poll_id }).await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl NotificationStore for MongoStore {
    async fn insert(&self, notification: NotificationDoc) -> Result<NotificationDoc> {
        self.notifications.insert_one(notification).await
    }

    async fn list_for_recipient(
        &self,
        recipient: &ObjectId,
        limit: usize,
    ) -> Result<Vec<NotificationDoc>> {
        self.notifications
            .find_many(
                doc! { "recipient": recipient },
                Some(newest_first()),
                Some(limit as i64),
            )
            .await
    }

    async fn mark_read(&self, id: &ObjectId, recipient: &ObjectId) -> Result<bool> {
        let result = self
            .notifications
            .update_one(
                doc! { "_id": id, "recipient": recipient },
                doc! { "$set": { "read": true } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn mark_all_read(&self, recipient: &ObjectId) -> Result<u64> {
        let result = self
            .notifications
            .update_many(
                doc! { "recipient": recipient, "read": false },
                doc! { "$set": { "read": true } },
            )
            .await?;
        Ok(result.modified_count)
    }
}

#[async_trait]
impl CandidateStore for MongoStore {
    async fn insert(&self, candidate: CandidateDoc) -> Result<CandidateDoc> {
        self.candidates
            .insert_one(candidate)
            .await
            .map_err(|e| relabel_conflict(e, "You have already applied."))
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<CandidateDoc>> {
        self.candidates.find_one(doc! { "_id": id }).await
    }

    async fn find_by_user(&self, user_id: &ObjectId) -> Result<Option<CandidateDoc>> {
        self.candidates.find_one(doc! { "user_id": user_id }).await
    }

    async fn list(&self, status: Option<CandidateStatus>) -> Result<Vec<CandidateDoc>> {
        let filter = match status {
            Some(status) => doc! { "status": bson::to_bson(&status)? },
            None => Document::new(),
        };
        self.candidates
            .find_many(filter, Some(newest_first()), None)
            .await
    }

    async fn set_status(
        &self,
        id: &ObjectId,
        status: CandidateStatus,
    ) -> Result<Option<CandidateDoc>> {
        self.candidates
            .inner()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    "status": bson::to_bson(&status)?,
                    "metadata.updated_at": BsonDateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(PollxError::from)
    }

    async fn set_campaign(
        &self,
        id: &ObjectId,
        campaign: CampaignUpdate,
    ) -> Result<Option<CandidateDoc>> {
        self.candidates
            .inner()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    "election_id": campaign.election_id,
                    "symbol": campaign.symbol,
                    "promises": campaign.promises,
                    "key_issues": campaign.key_issues,
                    "metadata.updated_at": BsonDateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(PollxError::from)
    }
}

#[async_trait]
impl ElectionStore for MongoStore {
    async fn insert(&self, election: ElectionDoc) -> Result<ElectionDoc> {
        self.elections.insert_one(election).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<ElectionDoc>> {
        self.elections.find_one(doc! { "_id": id }).await
    }

    async fn list(&self) -> Result<Vec<ElectionDoc>> {
        self.elections
            .find_many(Document::new(), Some(newest_first()), None)
            .await
    }

    async fn set_status(
        &self,
        id: &ObjectId,
        status: ElectionStatus,
    ) -> Result<Option<ElectionDoc>> {
        self.elections
            .inner()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    "status": bson::to_bson(&status)?,
                    "metadata.updated_at": BsonDateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(PollxError::from)
    }

    async fn add_candidate(&self, id: &ObjectId, candidate_id: &ObjectId) -> Result<bool> {
        let result = self
            .elections
            .update_one(
                doc! { "_id": id },
                doc! { "$addToSet": { "candidates": candidate_id } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl SystemStateStore for MongoStore {
    async fn get(&self, key: &str) -> Result<Option<SystemStateDoc>> {
        self.system.find_one(doc! { "key": key }).await
    }

    async fn touch(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        let at = BsonDateTime::from_chrono(at);
        self.system
            .inner()
            .update_one(
                doc! { "key": key },
                doc! {
                    "$set": { "last_updated": at, "metadata.updated_at": at },
                    "$setOnInsert": { "metadata.created_at": at },
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn put(&self, key: &str, value: Document, at: DateTime<Utc>) -> Result<()> {
        let at = BsonDateTime::from_chrono(at);
        self.system
            .inner()
            .update_one(
                doc! { "key": key },
                doc! {
                    "$set": { "value": value, "last_updated": at, "metadata.updated_at": at },
                    "$setOnInsert": { "metadata.created_at": at },
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_pipeline_targets_like_set() {
        let user = ObjectId::new();
        let pipeline = reaction_pipeline(&user, Reaction::Like);
        assert_eq!(pipeline.len(), 2);
        let set = pipeline[0].get_document("$set").unwrap();
        assert!(set.contains_key("liked_by"));
        assert!(set.contains_key("disliked_by"));
        assert!(pipeline[1]
            .get_document("$set")
            .unwrap()
            .contains_key("likes"));
    }

    #[test]
    fn test_edit_pipeline_recounts_only_with_options() {
        let plain = edit_pipeline(&PollChanges {
            question: Some("$where".into()),
            description: Some(None),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(plain.len(), 1);
        let set = plain[0].get_document("$set").unwrap();
        assert_eq!(
            set.get_document("question").unwrap().get_str("$literal").unwrap(),
            "$where"
        );
        assert_eq!(set.get_str("description").unwrap(), "$$REMOVE");
        assert!(!set.contains_key("options"));
        assert!(!set.contains_key("total_votes"));

        let with_options = edit_pipeline(&PollChanges {
            options: Some(vec!["Yes".into(), "No".into()]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(with_options.len(), 2);
        assert!(with_options[0]
            .get_document("$set")
            .unwrap()
            .contains_key("options"));
        assert!(with_options[1]
            .get_document("$set")
            .unwrap()
            .contains_key("total_votes"));
    }

    #[test]
    fn test_profile_set_never_touches_counters() {
        let set = profile_set(&ProfileChanges {
            username: Some("ann".into()),
            ghost_mode: Some(true),
            ..Default::default()
        });
        assert_eq!(set.get_str("username").unwrap(), "ann");
        assert!(set.get_bool("settings.ghost_mode").unwrap());
        assert!(!set.contains_key("settings"));
        assert!(set.keys().all(|k| !k.starts_with("stats")));
    }

    #[test]
    fn test_sort_documents() {
        assert_eq!(newest_first().get_i32("metadata.created_at").unwrap(), -1);
        assert_eq!(oldest_first().get_i32("_id").unwrap(), 1);
    }
}
