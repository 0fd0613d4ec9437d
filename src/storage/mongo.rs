use async_trait::async_trait;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use super::{StoreError, UserRecord, UserStore};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    username: String,
    password_hash: String,
    email: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<UserDocument> for UserRecord {
    fn from(d: UserDocument) -> Self {
        Self {
            username: d.username,
            password_hash: d.password_hash,
            email: d.email,
            created_at: d.created_at,
        }
    }
}

/// `users` collection with unique indexes on `username` and `email`.
pub struct MongoStore {
    users: Collection<UserDocument>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(StoreError::unavailable)?;
        let users = client.database(database).collection::<UserDocument>("users");

        for field in ["username", "email"] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            // Also the first round-trip to the server.
            users
                .create_index(index, None)
                .await
                .map_err(StoreError::unavailable)?;
        }
        Ok(Self { users })
    }
}

fn map_insert_error(e: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = e.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY {
            // "E11000 duplicate key error ... index: email_1 dup key: ..."
            return if write_error.message.contains("email_1") {
                StoreError::DuplicateEmail
            } else {
                StoreError::DuplicateUsername
            };
        }
    }
    warn!(error = %e, "mongo insert failed");
    StoreError::unavailable(e)
}

#[async_trait]
impl UserStore for MongoStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let found = self
            .users
            .find_one(doc! { "username": username }, None)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(found.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let found = self
            .users
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(found.map(UserRecord::from))
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let document = UserDocument {
            id: None,
            username: record.username,
            password_hash: record.password_hash,
            email: record.email,
            created_at: record.created_at,
        };
        self.users
            .insert_one(document, None)
            .await
            .map_err(map_insert_error)?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let n = self
            .users
            .count_documents(None, None)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(n as usize)
    }
}
