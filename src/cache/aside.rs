use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::pattern::KeyPattern;
use super::ttl_cache::{CacheStats, TtlCache};

/// 旁路缓存：先查缓存，未命中再调用加载函数并回填
///
/// 同一个键并发未命中时，每个调用方都会各自执行一次加载函数，不做合并。
/// 加载函数应当是幂等、无副作用的读取。
#[derive(Clone, Debug)]
pub struct CacheAside {
    cache: TtlCache,
    default_ttl: Duration,
}

impl CacheAside {
    pub fn new(cache: TtlCache, default_ttl: Duration) -> Self {
        Self { cache, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// 命中直接返回；未命中时执行 `loader`，成功才写入缓存
    ///
    /// 加载失败原样返回错误，缓存保持不变。加载期间不持有任何缓存锁。
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.cache.get(key) {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    tracing::debug!("Get from cache: {}", key);
                    return Ok(value);
                }
                Err(e) => {
                    // 同一个键存了别的类型，当作未命中
                    tracing::warn!(key, error = %e, "Cached value has unexpected shape");
                    self.cache.delete(key);
                }
            }
        }

        tracing::debug!("Cache miss: {}", key);
        let loaded = loader().await?;

        match serde_json::to_value(&loaded) {
            Ok(json) => {
                self.cache.set(key, json, ttl);
                tracing::debug!("Set to cache: {}", key);
            }
            Err(e) => tracing::warn!(key, error = %e, "Loaded value is not cacheable"),
        }

        Ok(loaded)
    }

    pub async fn get_or_load_default<T, E, F, Fut>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_load(key, self.default_ttl, loader).await
    }

    pub fn invalidate_key(&self, key: &str) -> bool {
        self.cache.delete(key)
    }

    /// 按模式失效，模式语法见 [`KeyPattern`]
    pub fn invalidate(&self, pattern: &str) -> usize {
        self.cache.invalidate_pattern(pattern)
    }

    /// 清除某类资源的全部缓存
    pub fn invalidate_family(&self, kind: &str) -> usize {
        let removed = self.cache.invalidate_matching(&KeyPattern::family(kind));
        tracing::info!(kind, removed, "Invalidated cache family");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
