//! MongoDB client and collection wrapper

use bson::{doc, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions, UpdateModifications},
    results::{DeleteResult, UpdateResult},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::db::schemas::Metadata;
use crate::types::PollxError;

/// Server error code for a unique index violation
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Whether a driver error is a unique index violation
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, PollxError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}/?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri.trim_end_matches('/'))
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| PollxError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PollxError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, PollxError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, PollxError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;
        debug!(collection = collection_name, "Indexes applied");

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), PollxError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| PollxError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, stamping metadata timestamps.
    ///
    /// A unique index violation is reported as `Conflict`.
    pub async fn insert_one(&self, mut item: T) -> Result<T, PollxError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.created_at = now;
        metadata.updated_at = now;

        match self.inner.insert_one(&item).await {
            Ok(_) => Ok(item),
            Err(e) if is_duplicate_key(&e) => {
                Err(PollxError::Conflict("Document already exists".into()))
            }
            Err(e) => Err(PollxError::Database(format!("Insert failed: {}", e))),
        }
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, PollxError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| PollxError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter, optionally sorted and limited
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<T>, PollxError> {
        let options = FindOptions::builder().sort(sort).limit(limit).build();

        let cursor = self
            .inner
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| PollxError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| PollxError::Database(format!("Cursor failed: {}", e)))
    }

    /// Update one document, bumping `metadata.updated_at` for `$`-operator updates
    pub async fn update_one(
        &self,
        filter: Document,
        mut update: Document,
    ) -> Result<UpdateResult, PollxError> {
        touch_updated_at(&mut update);

        self.inner
            .update_one(filter, UpdateModifications::Document(update))
            .await
            .map_err(|e| PollxError::Database(format!("Update failed: {}", e)))
    }

    /// Update many documents
    pub async fn update_many(
        &self,
        filter: Document,
        mut update: Document,
    ) -> Result<UpdateResult, PollxError> {
        touch_updated_at(&mut update);

        self.inner
            .update_many(filter, UpdateModifications::Document(update))
            .await
            .map_err(|e| PollxError::Database(format!("Update failed: {}", e)))
    }

    /// Delete one document
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult, PollxError> {
        self.inner
            .delete_one(filter)
            .await
            .map_err(|e| PollxError::Database(format!("Delete failed: {}", e)))
    }

    /// Delete every matching document
    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult, PollxError> {
        self.inner
            .delete_many(filter)
            .await
            .map_err(|e| PollxError::Database(format!("Delete failed: {}", e)))
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

/// Add `metadata.updated_at` to the `$set` stage of an operator update
fn touch_updated_at(update: &mut Document) {
    if !update.keys().any(|k| k.starts_with('$')) {
        return;
    }
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("metadata.updated_at", DateTime::now());
        }
        Err(_) => {
            update.insert("$set", doc! { "metadata.updated_at": DateTime::now() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_updated_at_adds_set_stage() {
        let mut update = doc! { "$inc": { "total_votes": 1 } };
        touch_updated_at(&mut update);
        assert!(update
            .get_document("$set")
            .unwrap()
            .contains_key("metadata.updated_at"));
    }

    #[test]
    fn test_touch_updated_at_merges_existing_set() {
        let mut update = doc! { "$set": { "read": true } };
        touch_updated_at(&mut update);
        let set = update.get_document("$set").unwrap();
        assert!(set.contains_key("read"));
        assert!(set.contains_key("metadata.updated_at"));
    }
}
