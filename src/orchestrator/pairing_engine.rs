//! 配对分析引擎 - 编排层
//!
//! ## 职责
//!
//! 本模块是系统的公共入口，把缓存、批处理器和协作方组合成完整操作。
//!
//! ## 核心功能
//!
//! 1. **规格获取**：缓存 → 抓取 → 内容优化 → 批处理器 → 打点 → 写回缓存
//! 2. **配对生成**：并发取两侧规格 → 直接调用 AI 配对分析 → 组装报告 → 写回缓存
//! 3. **本地兼容性评分**：确定性启发式，作为 AI 分数之外的辅助指标
//! 4. **周边查询**：相似产品、自由搜索推荐、最近分析记录、缓存统计
//!
//! ## 设计特点
//!
//! - **显式装配**：所有协作方经构造函数注入，没有模块级单例
//! - **失败收口**：配对生成对外只暴露统一的失败信息，细节进日志

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join;
use regex::Regex;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::PersistentCache;
use crate::models::{
    PairingReport, ProductSpec, ProductType, RecentPairing, SearchCriteria,
};
use crate::orchestrator::batch_processor::BatchProcessor;
use crate::services::analyzer::{ContentSource, SpecAnalyzer};
use crate::services::content_optimizer;
use crate::services::{ForumSearch, LlmService};

/// 互补声音签名对照表
static COMPLEMENTARY_SIGNATURES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "bright" => "warm",
    "warm" => "bright",
    "analytical" => "musical",
    "musical" => "analytical",
};

/// 缓存统计
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cache_size: usize,
    pub products_cached: usize,
}

/// 配对分析引擎
pub struct PairingEngine {
    cache: PersistentCache,
    batcher: Arc<BatchProcessor>,
    analyzer: Arc<dyn SpecAnalyzer>,
    scraper: Arc<dyn ContentSource>,
    max_content_tokens: usize,
    /// 本进程内分析过的产品索引
    product_index: Mutex<HashMap<String, ProductSpec>>,
}

impl PairingEngine {
    /// 按配置组装生产环境的引擎（真实 LLM + 真实论坛）
    pub async fn new(config: &Config) -> Self {
        let analyzer: Arc<dyn SpecAnalyzer> = Arc::new(LlmService::new(config));
        let scraper: Arc<dyn ContentSource> = Arc::new(ForumSearch::new(config));
        Self::with_collaborators(config, analyzer, scraper).await
    }

    /// 注入协作方组装引擎（测试和离线演示用）
    pub async fn with_collaborators(
        config: &Config,
        analyzer: Arc<dyn SpecAnalyzer>,
        scraper: Arc<dyn ContentSource>,
    ) -> Self {
        Self {
            cache: PersistentCache::new(config.cache_dir.as_str()).await,
            batcher: BatchProcessor::new(analyzer.clone(), config),
            analyzer,
            scraper,
            max_content_tokens: config.max_content_tokens,
            product_index: Mutex::new(HashMap::new()),
        }
    }

    /// 获取产品规格
    ///
    /// 缓存未命中时抓取论坛内容、经内容优化后交给批处理器，
    /// 拿到结果后打点元数据并写回缓存。
    pub async fn get_product_specs(
        &self,
        product_name: &str,
        product_type: ProductType,
    ) -> Result<ProductSpec> {
        let cache_key = format!(
            "specs_{}_{}",
            product_type,
            sanitize_key_part(product_name)
        );

        if let Some(cached) = self.cache.get(&cache_key).await {
            debug!("✓ 规格缓存命中: {}", product_name);
            return serde_json::from_value(cached)
                .with_context(|| format!("缓存中的规格无法解析: {}", cache_key));
        }

        info!("🔍 正在抓取 {} 的论坛数据...", product_name);

        let search_terms = vec![
            product_name.to_string(),
            format!("{} review", product_name),
            format!("{} pairing", product_name),
        ];
        let scraped = self.scraper.fetch_content(&search_terms).await;
        let optimized =
            content_optimizer::extract_relevant_content(&scraped, self.max_content_tokens);

        info!(
            "✓ 抓到 {} 条帖子，优化后保留 {} 条",
            scraped.len(),
            optimized.len()
        );

        let mut spec = self
            .batcher
            .queue_specs(product_name, optimized)
            .await
            .map_err(AppError::from)?;

        // 打点元数据
        spec.product_name = product_name.to_string();
        spec.product_type = Some(product_type);
        spec.last_updated = Some(Utc::now());
        spec.source_count = scraped.len();

        self.cache
            .set(&cache_key, serde_json::to_value(&spec)?)
            .await;
        self.product_index
            .lock()
            .await
            .insert(product_name.to_string(), spec.clone());

        Ok(spec)
    }

    /// 生成配对分析报告
    ///
    /// 两侧规格并发获取；配对分析不走批处理器，直接调用 AI。
    /// 任何内部失败对外只暴露统一的失败信息。
    pub async fn generate_pairing(
        &self,
        speaker_name: &str,
        amp_name: &str,
        preferences: Value,
    ) -> Result<PairingReport> {
        let cache_key = pairing_cache_key(speaker_name, amp_name, &preferences);

        if let Some(cached) = self.cache.get(&cache_key).await {
            debug!("✓ 配对缓存命中: {} + {}", speaker_name, amp_name);
            match serde_json::from_value(cached) {
                Ok(report) => return Ok(report),
                Err(e) => {
                    warn!("⚠️ 缓存中的配对报告无法解析，重新生成: {}", e);
                }
            }
        }

        info!("🎧 开始分析配对: {} + {}...", speaker_name, amp_name);

        match self
            .build_pairing_report(speaker_name, amp_name, preferences)
            .await
        {
            Ok(report) => {
                self.cache
                    .set(&cache_key, serde_json::to_value(&report)?)
                    .await;
                info!("✅ 配对分析完成: {} + {}", speaker_name, amp_name);
                Ok(report)
            }
            Err(e) => {
                // 对外只暴露统一的失败信息，内部原因进日志
                error!(
                    "❌ 配对分析失败 ({} + {}): {}",
                    speaker_name, amp_name, e
                );
                anyhow::bail!("无法生成配对分析")
            }
        }
    }

    async fn build_pairing_report(
        &self,
        speaker_name: &str,
        amp_name: &str,
        preferences: Value,
    ) -> Result<PairingReport> {
        let (speaker, amplifier) = join(
            self.get_product_specs(speaker_name, ProductType::Speaker),
            self.get_product_specs(amp_name, ProductType::Amplifier),
        )
        .await;
        let speaker = speaker?;
        let amplifier = amplifier?;

        let analysis = self
            .analyzer
            .generate_pairing(&speaker, &amplifier, &preferences)
            .await?;

        Ok(PairingReport {
            speaker,
            amplifier,
            analysis,
            user_preferences: preferences,
            generated_at: Utc::now(),
        })
    }

    /// 本地兼容性评分（0-100）
    ///
    /// 确定性启发式：阻抗匹配、功率匹配、声音签名互补各占一档，
    /// 只作为 AI 分数之外的辅助指标。
    pub fn compatibility_score(&self, speaker: &ProductSpec, amplifier: &ProductSpec) -> u32 {
        let mut score = 0.0f64;
        let mut factors = 0u32;

        if let (Some(speaker_imp), Some(amp_imp)) = (
            speaker.specification("impedance"),
            amplifier.specification("impedance"),
        ) {
            let speaker_imp = parse_leading_number(speaker_imp, 8);
            let amp_imp = parse_leading_number(amp_imp, 8);

            if speaker_imp >= 4 && amp_imp as f64 >= speaker_imp as f64 * 0.5 {
                score += 25.0;
            } else if speaker_imp >= 4 {
                score += 15.0;
            }
            factors += 1;
        }

        if let (Some(handling), Some(output)) = (
            speaker.specification("powerHandling"),
            amplifier.specification("powerOutput"),
        ) {
            let speaker_power = parse_leading_number(handling, 50) as f64;
            let amp_power = parse_leading_number(output, 50) as f64;

            if amp_power >= speaker_power * 0.5 && amp_power <= speaker_power * 2.0 {
                score += 25.0;
            } else if amp_power >= speaker_power * 0.3 {
                score += 15.0;
            }
            factors += 1;
        }

        if let (Some(speaker_sig), Some(amp_sig)) =
            (speaker.sound_signature(), amplifier.sound_signature())
        {
            let speaker_sig = speaker_sig.to_lowercase();
            let amp_sig = amp_sig.to_lowercase();

            if is_complementary_signature(&speaker_sig, &amp_sig) {
                score += 25.0;
            } else if speaker_sig == amp_sig {
                score += 20.0;
            } else {
                score += 10.0;
            }
            factors += 1;
        }

        if factors == 0 {
            return 50; // 无任何可比字段时的中性分
        }

        (score / factors.max(3) as f64 * 3.0).round() as u32
    }

    /// 查找相似产品
    ///
    /// 失败降级为空列表。
    pub async fn find_similar_products(
        &self,
        product_name: &str,
        product_type: ProductType,
        limit: usize,
    ) -> Vec<Value> {
        let result = async {
            let spec = self.get_product_specs(product_name, product_type).await?;
            self.analyzer.suggest_similar(&spec, product_type).await
        }
        .await;

        match result {
            Ok(mut suggestions) => {
                suggestions.truncate(limit);
                suggestions
            }
            Err(e) => {
                error!("❌ 相似产品推荐失败 ({}): {}", product_name, e);
                Vec::new()
            }
        }
    }

    /// 按搜索条件生成推荐
    ///
    /// 失败降级为空推荐集。
    pub async fn search_recommendations(&self, criteria: &SearchCriteria) -> Value {
        let search_terms = criteria.search_terms();
        let scraped = self.scraper.fetch_content(&search_terms).await;

        match self
            .analyzer
            .search_recommendations(&scraped, criteria)
            .await
        {
            Ok(recommendations) => recommendations,
            Err(e) => {
                error!("❌ 搜索推荐失败: {}", e);
                json!({"speakers": [], "amplifiers": []})
            }
        }
    }

    /// 最近分析过的配对（新的在前）
    pub async fn recently_analyzed(&self, limit: usize) -> Vec<RecentPairing> {
        let mut recent = Vec::new();

        for key in self.cache.keys().await {
            if !key.starts_with("pairing_") {
                continue;
            }
            let Some(value) = self.cache.get(&key).await else {
                continue;
            };
            let Ok(report) = serde_json::from_value::<PairingReport>(value) else {
                continue;
            };

            recent.push(RecentPairing {
                speaker: report.speaker.product_name.clone(),
                amplifier: report.amplifier.product_name.clone(),
                score: report.compatibility_score(),
                analyzed_at: report.generated_at,
            });
        }

        recent.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));
        recent.truncate(limit);
        recent
    }

    /// 缓存统计
    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            cache_size: self.cache.len().await,
            products_cached: self.product_index.lock().await.len(),
        }
    }
}

/// 把任意文本折算成文件名安全的缓存键片段
fn sanitize_key_part(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// 配对缓存键：双方产品名 + 序列化后的偏好
fn pairing_cache_key(speaker: &str, amp: &str, preferences: &Value) -> String {
    let prefs = serde_json::to_string(preferences).unwrap_or_default();
    format!(
        "pairing_{}_{}_{}",
        sanitize_key_part(speaker),
        sanitize_key_part(amp),
        sanitize_key_part(&prefs)
    )
}

/// 从 "8 ohms" / "100 watts" 这类字符串中取第一个整数
fn parse_leading_number(text: &str, default: u32) -> u32 {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\d+").expect("数字正则是字面量"));

    re.find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(default)
}

fn is_complementary_signature(speaker: &str, amp: &str) -> bool {
    COMPLEMENTARY_SIGNATURES
        .entries()
        .any(|(a, b)| speaker.contains(a) && amp.contains(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ScriptedAnalyzer, ScriptedForum};

    fn test_config(cache_dir: &std::path::Path) -> Config {
        Config {
            cache_dir: cache_dir.to_string_lossy().into_owned(),
            batch_delay_ms: 10,
            ..Default::default()
        }
    }

    fn spec_with(detail: Value) -> ProductSpec {
        serde_json::from_value(detail).unwrap()
    }

    #[test]
    fn test_sanitize_key_part() {
        assert_eq!(sanitize_key_part("KEF LS50 Meta"), "KEF_LS50_Meta");
        assert_eq!(sanitize_key_part("A-S501 (黑)"), "A_S501____");
    }

    #[test]
    fn test_pairing_cache_key_is_deterministic() {
        let prefs = json!({"soundSignature": "warm"});
        let key1 = pairing_cache_key("KEF LS50", "Yamaha A-S501", &prefs);
        let key2 = pairing_cache_key("KEF LS50", "Yamaha A-S501", &prefs);

        assert_eq!(key1, key2);
        assert!(key1.starts_with("pairing_KEF_LS50_Yamaha_A_S501_"));
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("8 ohms", 4), 8);
        assert_eq!(parse_leading_number("4-8 ohm", 8), 4);
        assert_eq!(parse_leading_number("unknown", 50), 50);
    }

    #[tokio::test]
    async fn test_compatibility_score_full_match() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            Arc::new(ScriptedAnalyzer::new()),
            Arc::new(ScriptedForum::new()),
        )
        .await;

        let speaker = spec_with(json!({
            "productName": "Speaker",
            "specifications": {"impedance": "8 ohms", "powerHandling": "100 watts"},
            "soundCharacteristics": {"signature": "bright"}
        }));
        let amplifier = spec_with(json!({
            "productName": "Amp",
            "specifications": {"impedance": "8 ohms", "powerOutput": "120 watts"},
            "soundCharacteristics": {"signature": "warm"}
        }));

        // 25 (阻抗) + 25 (功率) + 25 (互补签名)
        assert_eq!(engine.compatibility_score(&speaker, &amplifier), 75);
    }

    #[tokio::test]
    async fn test_compatibility_score_neutral_when_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            Arc::new(ScriptedAnalyzer::new()),
            Arc::new(ScriptedForum::new()),
        )
        .await;

        let speaker = ProductSpec::fallback("Speaker");
        let amplifier = ProductSpec::fallback("Amp");

        assert_eq!(engine.compatibility_score(&speaker, &amplifier), 50);
    }

    #[tokio::test]
    async fn test_compatibility_score_identical_signature() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            Arc::new(ScriptedAnalyzer::new()),
            Arc::new(ScriptedForum::new()),
        )
        .await;

        let speaker = spec_with(json!({
            "productName": "Speaker",
            "soundCharacteristics": {"signature": "neutral"}
        }));
        let amplifier = spec_with(json!({
            "productName": "Amp",
            "soundCharacteristics": {"signature": "neutral"}
        }));

        assert_eq!(engine.compatibility_score(&speaker, &amplifier), 20);
    }

    #[tokio::test]
    async fn test_specs_are_cached_after_first_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = Arc::new(ScriptedForum::new());
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            Arc::new(ScriptedAnalyzer::new()),
            scraper.clone(),
        )
        .await;

        let first = engine
            .get_product_specs("KEF LS50", ProductType::Speaker)
            .await
            .unwrap();
        let second = engine
            .get_product_specs("KEF LS50", ProductType::Speaker)
            .await
            .unwrap();

        assert_eq!(first.product_name, "KEF LS50");
        assert_eq!(second.product_name, "KEF LS50");
        assert_eq!(first.product_type, Some(ProductType::Speaker));
        assert!(first.source_count > 0);

        // 第二次命中缓存，没有再抓论坛
        assert_eq!(scraper.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_pairing_produces_cached_report() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = Arc::new(ScriptedAnalyzer::new());
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            analyzer.clone(),
            Arc::new(ScriptedForum::new()),
        )
        .await;

        let report = engine
            .generate_pairing("KEF LS50", "Yamaha A-S501", json!({}))
            .await
            .unwrap();

        assert_eq!(report.speaker.product_name, "KEF LS50");
        assert_eq!(report.amplifier.product_name, "Yamaha A-S501");
        assert_eq!(report.compatibility_score(), Some(82));

        // 第二次直接命中缓存，AI 不再被调用
        let again = engine
            .generate_pairing("KEF LS50", "Yamaha A-S501", json!({}))
            .await
            .unwrap();
        assert_eq!(again.compatibility_score(), Some(82));
        assert_eq!(analyzer.pairing_calls(), 1);

        // 最近记录里能看到这次分析
        let recent = engine.recently_analyzed(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].speaker, "KEF LS50");
        assert_eq!(recent[0].score, Some(82));
    }

    #[tokio::test]
    async fn test_generate_pairing_hides_internal_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            Arc::new(ScriptedAnalyzer::failing_pairing()),
            Arc::new(ScriptedForum::new()),
        )
        .await;

        let err = engine
            .generate_pairing("KEF LS50", "Yamaha A-S501", json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "无法生成配对分析");
    }

    #[tokio::test]
    async fn test_find_similar_products_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            Arc::new(ScriptedAnalyzer::failing_specs()),
            Arc::new(ScriptedForum::new()),
        )
        .await;

        let suggestions = engine
            .find_similar_products("KEF LS50", ProductType::Speaker, 5)
            .await;

        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_cache_stats_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PairingEngine::with_collaborators(
            &test_config(dir.path()),
            Arc::new(ScriptedAnalyzer::new()),
            Arc::new(ScriptedForum::new()),
        )
        .await;

        engine
            .get_product_specs("KEF LS50", ProductType::Speaker)
            .await
            .unwrap();

        let stats = engine.cache_stats().await;
        assert_eq!(stats.cache_size, 1);
        assert_eq!(stats.products_cached, 1);
    }
}
