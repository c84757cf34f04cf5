use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::backend::{CredentialBackend, StoreError};
use super::models::{Credential, Purpose};

/// 内存凭证后端，单进程部署和测试使用
///
/// 所有操作都在同一把互斥锁内完成，条件更新天然是原子的。
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    credentials: Mutex<HashMap<String, Credential>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Credential>> {
        self.credentials.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialBackend for InMemoryBackend {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError> {
        match self.lock().entry(credential.value.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(credential.clone());
                Ok(())
            }
        }
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.lock().get(value).cloned())
    }

    async fn conditional_mark_used(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut credentials = self.lock();
        match credentials.get_mut(value) {
            Some(credential) if credential.is_usable_at(now) => {
                credential.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_where_expired_before(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut credentials = self.lock();
        let before = credentials.len();
        credentials.retain(|_, credential| credential.expires_at >= now);
        Ok((before - credentials.len()) as u64)
    }

    async fn find_latest_active(
        &self,
        subject: &str,
        purpose: Purpose,
        now: DateTime<Utc>,
    ) -> Result<Option<Credential>, StoreError> {
        Ok(self
            .lock()
            .values()
            .filter(|c| c.subject == subject && c.purpose == purpose && c.is_usable_at(now))
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn reserve_attempt(
        &self,
        value: &str,
        max_attempts: u32,
    ) -> Result<Option<u32>, StoreError> {
        let mut credentials = self.lock();
        match credentials.get_mut(value) {
            Some(credential) if credential.attempts < max_attempts => {
                credential.attempts += 1;
                Ok(Some(credential.attempts))
            }
            _ => Ok(None),
        }
    }

    async fn revoke_unused(&self, subject: &str, purpose: Purpose) -> Result<u64, StoreError> {
        let mut credentials = self.lock();
        let before = credentials.len();
        credentials
            .retain(|_, c| !(c.subject == subject && c.purpose == purpose && !c.is_used()));
        Ok((before - credentials.len()) as u64)
    }

    async fn replace_unused(&self, credential: &Credential) -> Result<u64, StoreError> {
        let mut credentials = self.lock();
        if credentials.contains_key(&credential.value) {
            return Err(StoreError::Conflict);
        }
        let before = credentials.len();
        credentials.retain(|_, c| {
            !(c.subject == credential.subject && c.purpose == credential.purpose && !c.is_used())
        });
        let revoked = (before - credentials.len()) as u64;
        credentials.insert(credential.value.clone(), credential.clone());
        Ok(revoked)
    }
}
