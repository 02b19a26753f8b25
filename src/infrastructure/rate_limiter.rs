//! 域名级限流器 - 基础设施层
//!
//! 为每个域名维护一条时间表：两次请求之间必须间隔
//! 至少 `min_interval`，不足则让调用方等待差值。
//! 全局一张表，域名之间互不影响，同域名先到先得。

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// 域名级最小间隔限流器
pub struct RateLimiter {
    min_interval: Duration,
    /// 域名 → 最近一次请求的生效时间（单调不减）
    schedule: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// 创建限流器
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            schedule: Mutex::new(HashMap::new()),
        }
    }

    /// 等待直到该域名允许发起下一次请求
    ///
    /// 预约-再-睡眠：锁内只计算并登记本次请求的生效时间，
    /// 睡眠在锁外进行。并发调用同一域名时按登记顺序排队，
    /// 其他域名不受影响。
    pub async fn wait(&self, domain: &str) {
        let slot = {
            let mut schedule = self.schedule.lock().await;
            let now = Instant::now();
            let slot = match schedule.get(domain) {
                Some(last) => (*last + self.min_interval).max(now),
                None => now,
            };
            schedule.insert(domain.to_string(), slot);
            slot
        };

        let now = Instant::now();
        if slot > now {
            debug!(
                "限流等待 {} ms (域名: {})",
                (slot - now).as_millis(),
                domain
            );
            sleep_until(slot).await;
        }
    }
}
