use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::product::ProductSpec;

/// 配对分析报告
///
/// `analysis` 是 AI 产出的完整分析（compatibilityScore、
/// overallAssessment 等），核心只在最近记录列表中读取分数，
/// 其余字段原样透传。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingReport {
    /// 音箱规格
    pub speaker: ProductSpec,
    /// 功放规格
    pub amplifier: ProductSpec,
    /// AI 配对分析（原样透传）
    pub analysis: Value,
    /// 用户偏好
    #[serde(default)]
    pub user_preferences: Value,
    /// 报告生成时间
    pub generated_at: DateTime<Utc>,
}

impl PairingReport {
    /// 读取 AI 给出的兼容性分数
    pub fn compatibility_score(&self) -> Option<i64> {
        self.analysis.get("compatibilityScore")?.as_i64()
    }
}

/// 最近分析记录（供列表展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPairing {
    pub speaker: String,
    pub amplifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    pub analyzed_at: DateTime<Utc>,
}

/// 自由搜索条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_genres: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_requirement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impedance_preference: Option<String>,
}

impl SearchCriteria {
    /// 根据条件拼装论坛搜索词
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms = Vec::new();

        if let Some(signature) = &self.sound_signature {
            terms.push(format!("{} sound signature", signature));
        }
        if let Some(budget) = &self.budget {
            terms.push(format!("{} budget", budget));
        }
        if let Some(room_size) = &self.room_size {
            terms.push(format!("{} room", room_size));
        }
        if let Some(genres) = &self.primary_genres {
            if !genres.is_empty() {
                terms.push(genres.join(" "));
            }
        }

        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_terms_skips_missing_fields() {
        let criteria = SearchCriteria {
            sound_signature: Some("warm".to_string()),
            room_size: Some("small".to_string()),
            ..Default::default()
        };

        assert_eq!(
            criteria.search_terms(),
            vec!["warm sound signature".to_string(), "small room".to_string()]
        );
        assert!(SearchCriteria::default().search_terms().is_empty());
    }

    #[test]
    fn test_report_reads_score_from_analysis() {
        let report = PairingReport {
            speaker: ProductSpec::fallback("KEF LS50"),
            amplifier: ProductSpec::fallback("Yamaha A-S501"),
            analysis: json!({"compatibilityScore": 85, "overallAssessment": "良好"}),
            user_preferences: json!({}),
            generated_at: Utc::now(),
        };

        assert_eq!(report.compatibility_score(), Some(85));
    }
}
