//! 论坛搜索服务 - 业务能力层
//!
//! 只负责"抓取论坛内容"能力，不关心流程
//!
//! 走 Reddit 风格的 JSON 搜索接口，不做任何 HTML 解析；
//! 对目标域名的请求全部经过 `RateLimiter`。

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ScrapeError};
use crate::infrastructure::RateLimiter;
use crate::models::RawItem;
use crate::services::analyzer::ContentSource;

/// 搜索接口返回的列表结构
#[derive(Debug, Deserialize)]
struct SearchListing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u32,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    created_utc: f64,
}

/// 论坛搜索服务
///
/// 职责：
/// - 按搜索词抓取论坛帖子
/// - 遵守域名级限流
/// - 单个搜索词失败只记日志，不影响其他搜索词
pub struct ForumSearch {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    base_url: String,
    domain: String,
    source_name: String,
}

impl ForumSearch {
    /// 创建新的论坛搜索服务
    pub fn new(config: &Config) -> Self {
        let http = match reqwest::Client::builder()
            .user_agent(&config.forum_user_agent)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("⚠️ HTTP 客户端构建失败，使用默认配置: {}", e);
                reqwest::Client::new()
            }
        };

        let domain = reqwest::Url::parse(&config.forum_api_base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "reddit.com".to_string());

        Self {
            http,
            rate_limiter: RateLimiter::new(Duration::from_millis(config.scrape_delay_ms)),
            base_url: config.forum_api_base_url.trim_end_matches('/').to_string(),
            domain,
            source_name: "r/audiophile".to_string(),
        }
    }

    /// 抓取单个搜索词的结果
    async fn fetch_term(&self, term: &str) -> AppResult<Vec<RawItem>> {
        self.rate_limiter.wait(&self.domain).await;

        let url = format!("{}/search.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", term), ("restrict_sr", "1"), ("limit", "25")])
            .send()
            .await
            .map_err(|e| AppError::scrape_request_failed(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Scrape(ScrapeError::BadStatus {
                url,
                status: status.as_u16(),
            }));
        }

        let listing: SearchListing = response.json().await.map_err(AppError::from)?;

        Ok(listing_to_items(listing, &self.source_name, term))
    }
}

/// 把搜索接口的列表结构转换为 RawItem
fn listing_to_items(listing: SearchListing, source_name: &str, term: &str) -> Vec<RawItem> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| {
            let post = child.data;
            RawItem {
                title: post.title,
                content: post.selftext,
                score: post.score,
                comment_count: post.num_comments,
                url: (!post.permalink.is_empty())
                    .then(|| format!("https://reddit.com{}", post.permalink)),
                source_name: source_name.to_string(),
                search_term: Some(term.to_string()),
                timestamp: Utc
                    .timestamp_opt(post.created_utc as i64, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            }
        })
        .collect()
}

#[async_trait]
impl ContentSource for ForumSearch {
    async fn fetch_content(&self, search_terms: &[String]) -> Vec<RawItem> {
        let mut results = Vec::new();

        for term in search_terms {
            match self.fetch_term(term).await {
                Ok(mut items) => {
                    debug!("✓ 搜索 \"{}\" 返回 {} 条帖子", term, items.len());
                    results.append(&mut items);
                }
                Err(e) => {
                    warn!("⚠️ 搜索 \"{}\" 失败: {}", term, e);
                }
            }
        }

        // 最新的帖子排在前面
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_to_items_maps_fields() {
        let raw = serde_json::json!({
            "data": {
                "children": [
                    {
                        "data": {
                            "title": "KEF LS50 pairing advice",
                            "selftext": "Looking for an amp around 100 watts into 8 ohm.",
                            "score": 42,
                            "num_comments": 17,
                            "permalink": "/r/audiophile/comments/abc/",
                            "created_utc": 1735689600.0
                        }
                    }
                ]
            }
        });

        let listing: SearchListing = serde_json::from_value(raw).unwrap();
        let items = listing_to_items(listing, "r/audiophile", "KEF LS50");

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "KEF LS50 pairing advice");
        assert_eq!(item.score, 42);
        assert_eq!(item.comment_count, 17);
        assert_eq!(item.source_name, "r/audiophile");
        assert_eq!(item.search_term.as_deref(), Some("KEF LS50"));
        assert_eq!(
            item.url.as_deref(),
            Some("https://reddit.com/r/audiophile/comments/abc/")
        );
        assert_eq!(item.timestamp.timestamp(), 1735689600);
    }

    #[test]
    fn test_listing_tolerates_missing_fields() {
        let listing: SearchListing =
            serde_json::from_value(serde_json::json!({"data": {"children": [{"data": {}}]}}))
                .unwrap();
        let items = listing_to_items(listing, "r/audiophile", "budget amp");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].score, 0);
        assert_eq!(items[0].url, None);
    }

    /// 测试真实论坛接口连通性
    ///
    /// 运行方式：
    /// ```bash
    /// cargo test test_forum_search_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_forum_search_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env();
        let search = ForumSearch::new(&config);

        let items = search
            .fetch_content(&["bookshelf speakers".to_string()])
            .await;

        println!("找到 {} 条帖子", items.len());
        for item in items.iter().take(3) {
            println!("  - {} (得分: {})", item.title, item.score);
        }
    }
}
