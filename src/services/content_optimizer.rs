//! 内容优化 - 业务能力层
//!
//! 送入 AI 之前先给帖子打相关性分、筛掉低价值内容，
//! 并把总量控制在 token 预算之内。

use crate::models::RawItem;

/// 技术词，出现即加分
const TECH_TERMS: [&str; 9] = [
    "impedance",
    "watts",
    "ohm",
    "sensitivity",
    "frequency",
    "hz",
    "db",
    "amp",
    "power",
];

/// 对比词
const COMPARISON_WORDS: [&str; 7] = [
    "vs", "versus", "compare", "better", "worse", "pairing", "match",
];

/// 最多保留的帖子数
const MAX_ITEMS: usize = 10;

/// 按相关性筛选帖子并裁剪到 token 预算之内
pub fn extract_relevant_content(items: &[RawItem], max_tokens: usize) -> Vec<RawItem> {
    let mut scored: Vec<(f64, &RawItem)> = items
        .iter()
        .filter(|item| item.content.len() > 30)
        .map(|item| (relevance_score(item), item))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_ITEMS);

    // 按分数从高到低装入，直到预算耗尽
    let mut total_tokens = 0usize;
    let mut selected = Vec::new();
    for (_, item) in scored {
        let tokens = estimate_tokens(&item.content);
        if total_tokens + tokens > max_tokens {
            break;
        }
        total_tokens += tokens;
        selected.push(item.clone());
    }

    selected
}

/// 单条帖子的相关性分数
pub fn relevance_score(item: &RawItem) -> f64 {
    let mut score = 0.0;

    // 点赞和评论越多越可信（对数缩放）
    score += (item.score.max(1) as f64).ln() * 2.0;
    score += (item.comment_count.max(1) as f64).ln();

    let content = item.content.to_lowercase();
    for term in TECH_TERMS {
        if content.contains(term) {
            score += 5.0;
        }
    }
    for word in COMPARISON_WORDS {
        if content.contains(word) {
            score += 3.0;
        }
    }

    // 过短或过长的内容降权
    if item.content.len() < 100 {
        score -= 5.0;
    }
    if item.content.len() > 2000 {
        score -= 2.0;
    }

    score
}

/// 粗略估算 token 数（约 4 个字符一个 token）
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(content: &str, score: i64, comments: u32) -> RawItem {
        RawItem {
            title: "test".to_string(),
            content: content.to_string(),
            score,
            comment_count: comments,
            url: None,
            source_name: "test".to_string(),
            search_term: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_short_content_filtered_out() {
        let items = vec![
            item("too short", 100, 50),
            item(
                "A long discussion about impedance matching and power handling for bookshelf \
                 speakers, definitely worth reading.",
                10,
                5,
            ),
        ];

        let selected = extract_relevant_content(&items, 1500);
        assert_eq!(selected.len(), 1);
        assert!(selected[0].content.contains("impedance"));
    }

    #[test]
    fn test_technical_content_ranks_higher() {
        let technical = item(
            "The impedance is 8 ohm and sensitivity is 85 db, power handling around 100 watts \
             which matters a lot for amp pairing decisions in practice.",
            1,
            1,
        );
        let chatter = item(
            "I really like the looks of these, the veneer finish is beautiful and they match \
             my furniture almost perfectly in daylight.",
            1,
            1,
        );

        assert!(relevance_score(&technical) > relevance_score(&chatter));
    }

    #[test]
    fn test_token_budget_cuts_selection() {
        let long_body = "impedance ".repeat(60); // ~600 字符 ≈ 150 token
        let items: Vec<RawItem> = (0..8).map(|_| item(&long_body, 10, 10)).collect();

        let selected = extract_relevant_content(&items, 300);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
