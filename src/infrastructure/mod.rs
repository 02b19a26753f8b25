//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源（缓存目录、限流时间表），只向上暴露能力：
//!
//! - `PersistentCache` - 磁盘持久化缓存（内存热层 + 每键一个 JSON 文件）
//! - `RateLimiter` - 域名级最小间隔限流器

pub mod persistent_cache;
pub mod rate_limiter;

pub use persistent_cache::PersistentCache;
pub use rate_limiter::RateLimiter;
