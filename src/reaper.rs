use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::credentials::CredentialStore;

/// 最短清理间隔
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// 定期清理过期凭证
///
/// 单次清理失败只记日志，下一轮再试，不影响签发和校验。
#[derive(Debug, Clone)]
pub struct Reaper {
    store: Arc<CredentialStore>,
    interval: Duration,
}

impl Reaper {
    /// 间隔不足 1 秒时按 1 秒算，`tokio::time::interval` 不接受零周期
    pub fn new(store: Arc<CredentialStore>, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!("Reaper interval {:?} too short, using {:?}", interval, MIN_INTERVAL);
        }
        Self {
            store,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 立即清理一次，失败时返回 `None`
    pub async fn run_once(&self) -> Option<u64> {
        match self.store.cleanup_expired().await {
            Ok(removed) => Some(removed),
            Err(e) => {
                tracing::error!("Credential sweep failed, retrying next tick: {}", e);
                None
            }
        }
    }

    /// 在后台循环运行，关闭时调用方 `abort` 返回的句柄
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("Credential reaper running every {:?}", self.interval);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}

/// 启动后台清理任务
pub fn spawn_reaper(store: Arc<CredentialStore>, interval: Duration) -> JoinHandle<()> {
    Reaper::new(store, interval).spawn()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::credentials::{
        Credential, CredentialBackend, InMemoryBackend, Purpose, StoreError,
    };

    #[tokio::test]
    async fn run_once_sweeps_expired_credentials() {
        let clock = Arc::new(ManualClock::starting_now());
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(CredentialStore::new(backend.clone(), clock.clone()));
        store
            .issue("user-1", Purpose::PasswordReset, TimeDelta::minutes(10))
            .await
            .unwrap();
        store
            .issue("user-2", Purpose::PasswordReset, TimeDelta::hours(2))
            .await
            .unwrap();

        let reaper = Reaper::new(store, Duration::from_secs(60));
        assert_eq!(reaper.run_once().await, Some(0));

        clock.advance(TimeDelta::minutes(11));
        assert_eq!(reaper.run_once().await, Some(1));
        assert_eq!(backend.len(), 1);
    }

    /// 清理总是失败的后端
    struct BrokenBackend;

    #[async_trait]
    impl CredentialBackend for BrokenBackend {
        async fn insert(&self, _: &Credential) -> Result<(), StoreError> {
            Ok(())
        }
        async fn find_by_value(&self, _: &str) -> Result<Option<Credential>, StoreError> {
            Ok(None)
        }
        async fn conditional_mark_used(
            &self,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn delete_where_expired_before(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn find_latest_active(
            &self,
            _: &str,
            _: Purpose,
            _: DateTime<Utc>,
        ) -> Result<Option<Credential>, StoreError> {
            Ok(None)
        }
        async fn reserve_attempt(&self, _: &str, _: u32) -> Result<Option<u32>, StoreError> {
            Ok(None)
        }
        async fn revoke_unused(&self, _: &str, _: Purpose) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn zero_interval_is_raised_to_the_minimum() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(CredentialStore::new(Arc::new(InMemoryBackend::new()), clock));
        let reaper = Reaper::new(store.clone(), Duration::ZERO);
        assert_eq!(reaper.interval(), MIN_INTERVAL);

        let handle = spawn_reaper(store, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn failed_sweep_does_not_stop_the_loop() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(CredentialStore::new(Arc::new(BrokenBackend), clock));
        let reaper = Reaper::new(store.clone(), Duration::from_millis(10));
        assert_eq!(reaper.run_once().await, None);

        let handle = reaper.spawn();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();

        // 清理失败不影响签发
        store
            .issue("user-1", Purpose::PasswordReset, TimeDelta::hours(1))
            .await
            .unwrap();
    }
}
