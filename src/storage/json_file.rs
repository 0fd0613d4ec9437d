use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ensure_unique, StoreError, UserRecord, UserStore};

/// On-disk entry; the map key is the username.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    #[serde(rename = "password")]
    password_hash: String,
    email: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

type UserMap = BTreeMap<String, StoredUser>;

/// Flat JSON file keyed by username.
///
/// Writes go through a temp file renamed over the store, so readers never see
/// a half-written file. The write lock only serializes writers inside this
/// process; two processes sharing one file can still race between the
/// uniqueness check and the rename.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };
        match tokio::fs::metadata(&store.path).await {
            Ok(_) => {
                // Fail at startup rather than on the first request.
                store.load().await?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %store.path.display(), "creating empty users file");
                store.persist(&UserMap::new()).await?;
            }
            Err(e) => return Err(StoreError::unavailable(e)),
        }
        Ok(store)
    }

    async fn load(&self) -> Result<UserMap, StoreError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("read {}", self.path.display()))
            .map_err(StoreError::Unavailable)?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(UserMap::new());
        }
        serde_json::from_slice(&raw)
            .with_context(|| format!("parse {}", self.path.display()))
            .map_err(StoreError::Unavailable)
    }

    async fn persist(&self, users: &UserMap) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(users).map_err(StoreError::unavailable)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))
            .map_err(StoreError::Unavailable)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))
            .map_err(StoreError::Unavailable)?;
        Ok(())
    }

    fn to_records(users: UserMap) -> Vec<UserRecord> {
        users.into_iter().map(|(username, u)| u.into_record(username)).collect()
    }
}

impl StoredUser {
    fn into_record(self, username: String) -> UserRecord {
        UserRecord {
            username,
            password_hash: self.password_hash,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.load().await?;
        Ok(users
            .remove_entry(username)
            .map(|(username, u)| u.into_record(username)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.load().await?;
        Ok(Self::to_records(users).into_iter().find(|u| u.email == email))
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?;
        ensure_unique(&Self::to_records(users.clone()), &record)?;
        users.insert(
            record.username,
            StoredUser {
                password_hash: record.password_hash,
                email: record.email,
                created_at: record.created_at,
            },
        );
        self.persist(&users).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.len())
    }
}
