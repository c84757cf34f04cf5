use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::pattern::KeyPattern;
use crate::clock::{SharedClock, SystemClock};

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub ttl: TimeDelta,
}

impl<V> CacheEntry<V> {
    /// `now < created_at + ttl` 时条目有效
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.created_at.checked_add_signed(self.ttl) {
            Some(deadline) => now < deadline,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// 进程内带过期时间的缓存
///
/// 过期只在读取时检查，不启动后台定时器。过期条目对读者不可见，
/// 会一直占用内存直到被覆盖、删除或 [`TtlCache::purge_expired`] 清理。
///
/// 克隆得到的是同一份数据的句柄。
#[derive(Clone)]
pub struct TtlCache<V = serde_json::Value> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    clock: SharedClock,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(SystemClock::shared())
    }

    /// 写入或覆盖，同时重新开始计时
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        };
        self.write().insert(key.into(), entry);
    }

    /// 读取有效条目，过期或不存在都返回 `None`
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        self.read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// 删除所有匹配 `pattern` 的键，返回删除数量
    ///
    /// 先在读锁下取键快照再逐个删除。清理期间并发写入的匹配键可能保留也可能被删。
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        self.invalidate_matching(&KeyPattern::new(pattern))
    }

    pub fn invalidate_matching(&self, pattern: &KeyPattern) -> usize {
        let matched: Vec<String> = self
            .read()
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();

        if matched.is_empty() {
            return 0;
        }

        let mut entries = self.write();
        let removed = matched
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count();
        tracing::debug!(pattern = pattern.as_str(), removed, "Invalidated cache keys");
        removed
    }

    /// 清理已过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// 条目数包含尚未清理的过期条目
    pub fn stats(&self) -> CacheStats {
        let entries = self.read();
        CacheStats {
            size: entries.len(),
            keys: entries.keys().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    // 锁内只有 HashMap 操作，中毒后数据仍然完整
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self
            .entries
            .read()
            .map(|entries| entries.len())
            .unwrap_or_default();
        f.debug_struct("TtlCache").field("size", &size).finish()
    }
}
