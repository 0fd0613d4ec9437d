use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ensure_unique, StoreError, UserRecord, UserStore};

/// Process-local store; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<UserRecord>>,
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        ensure_unique(users.iter(), &record)?;
        users.push(record);
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.users.read().await.len())
    }
}
