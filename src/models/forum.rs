use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 论坛抓取到的原始帖子
///
/// 抓取端产出、内容优化器筛选、AI 分析消费，全程只读。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    /// 帖子标题
    pub title: String,
    /// 帖子正文
    pub content: String,
    /// 帖子得分（点赞数）
    #[serde(default)]
    pub score: i64,
    /// 评论数量
    #[serde(default)]
    pub comment_count: u32,
    /// 帖子链接
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 来源名称（如 r/audiophile）
    pub source_name: String,
    /// 触发本条结果的搜索词
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    /// 帖子发布时间
    pub timestamp: DateTime<Utc>,
}
