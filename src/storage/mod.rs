use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

use crate::config::StoreConfig;

mod json_file;
mod memory;
#[cfg(feature = "mongo")]
mod mongo;
mod sheets;
mod sqlite;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;
pub use sheets::SheetsStore;
pub use sqlite::SqliteStore;

/// User record as persisted by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String, // Argon2 PHC string
    pub email: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("credential store unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

impl StoreError {
    pub(crate) fn unavailable<E>(e: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        StoreError::Unavailable(e.into())
    }
}

/// Uniqueness-enforcing storage of user records.
///
/// `insert` must reject a record whose username or email is already present,
/// either through a native unique index or by re-checking under the
/// backend's write lock.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn insert(&self, record: UserRecord) -> Result<(), StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Check a candidate record against an in-memory snapshot of the store.
pub(crate) fn ensure_unique<'a, I>(existing: I, candidate: &UserRecord) -> Result<(), StoreError>
where
    I: IntoIterator<Item = &'a UserRecord>,
{
    let mut email_taken = false;
    for user in existing {
        if user.username == candidate.username {
            return Err(StoreError::DuplicateUsername);
        }
        email_taken |= user.email == candidate.email;
    }
    if email_taken {
        return Err(StoreError::DuplicateEmail);
    }
    Ok(())
}

/// Open the backend selected by configuration.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn UserStore>, StoreError> {
    let store: Arc<dyn UserStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::default()),
        StoreConfig::JsonFile { path } => Arc::new(JsonFileStore::open(path).await?),
        StoreConfig::Sqlite { url } => Arc::new(SqliteStore::connect(url).await?),
        #[cfg(feature = "mongo")]
        StoreConfig::Mongo { uri, database } => Arc::new(MongoStore::connect(uri, database).await?),
        #[cfg(not(feature = "mongo"))]
        StoreConfig::Mongo { .. } => {
            return Err(StoreError::unavailable(anyhow::anyhow!(
                "mongo backend requested but feedcoach was built without the `mongo` feature"
            )))
        }
        StoreConfig::Sheets {
            base_url,
            spreadsheet_id,
            range,
            access_token,
        } => Arc::new(SheetsStore::connect(base_url, spreadsheet_id, range, access_token).await?),
    };
    info!(backend = config.kind(), "credential store ready");
    Ok(store)
}


#[cfg(test)]
mod tests {
    use super::contract::record;
    use super::*;

    #[test]
    fn ensure_unique_prefers_username_conflict() {
        let existing = vec![record("alice", "a@x.com"), record("bob", "b@y.com")];
        let err = ensure_unique(&existing, &record("alice", "b@y.com")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
        let err = ensure_unique(&existing, &record("dave", "b@y.com")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert!(ensure_unique(&existing, &record("dave", "d@z.com")).is_ok());
    }

    #[tokio::test]
    async fn connect_memory_backend() {
        let store = connect(&StoreConfig::Memory).await.expect("memory store");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[cfg(not(feature = "mongo"))]
    #[tokio::test]
    async fn connect_mongo_without_feature_is_unavailable() {
        let cfg = StoreConfig::Mongo {
            uri: "mongodb://localhost:27017".into(),
            database: "feedcoach".into(),
        };
        let err = connect(&cfg).await.err().expect("should fail");
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
