// 缓存模块
// 进程内 TTL 缓存、旁路缓存封装和缓存键约定

pub mod aside;
pub mod keys;
pub mod pattern;
pub mod ttl_cache;

pub use aside::CacheAside;
pub use pattern::KeyPattern;
pub use ttl_cache::{CacheEntry, CacheStats, TtlCache};
