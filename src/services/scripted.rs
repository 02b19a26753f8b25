//! 脚本化协作方 - 测试替身
//!
//! 行为完全确定的 AI / 论坛协作方实现，带调用计数和失败开关，
//! 供单元测试、集成测试和离线演示使用。

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::models::{ProductSpec, ProductType, RawItem, SearchCriteria};
use crate::services::analyzer::{ContentSource, SpecAnalyzer};

/// 脚本化 AI 分析器
#[derive(Default)]
pub struct ScriptedAnalyzer {
    /// 让规格提取（单条和批量）失败
    fail_specs: bool,
    /// 让配对分析失败
    fail_pairing: bool,
    /// 批量响应按逆序返回（验证按名分发）
    reverse_batch: bool,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    pairing_calls: AtomicUsize,
    /// 每次批量调用收到的产品名
    batch_log: std::sync::Mutex<Vec<Vec<String>>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 规格提取必定失败的分析器
    pub fn failing_specs() -> Self {
        Self {
            fail_specs: true,
            ..Default::default()
        }
    }

    /// 配对分析必定失败的分析器
    pub fn failing_pairing() -> Self {
        Self {
            fail_pairing: true,
            ..Default::default()
        }
    }

    /// 批量响应逆序返回的分析器
    pub fn reversed_batch() -> Self {
        Self {
            reverse_batch: true,
            ..Default::default()
        }
    }

    /// 单条规格调用次数
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    /// 批量规格调用次数
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// 配对分析调用次数
    pub fn pairing_calls(&self) -> usize {
        self.pairing_calls.load(Ordering::SeqCst)
    }

    /// 每次批量调用收到的产品名列表
    pub fn batch_log(&self) -> Vec<Vec<String>> {
        self.batch_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn make_spec(product_name: &str) -> ProductSpec {
        let value = json!({
            "product": product_name,
            "scriptedSource": product_name,
            "specifications": {
                "impedance": "8 ohms",
                "sensitivity": "87 dB",
                "powerHandling": "100 watts",
                "powerOutput": "100 watts",
                "frequencyResponse": "45Hz - 28kHz",
                "driverType": "unknown",
                "dimensions": "unknown"
            },
            "soundCharacteristics": {
                "signature": "neutral",
                "bassResponse": "tight",
                "midrange": "clear",
                "treble": "smooth",
                "soundstage": "wide",
                "imaging": "precise"
            }
        });

        serde_json::from_value(value)
            .unwrap_or_else(|_| ProductSpec::fallback(product_name))
    }
}

#[async_trait]
impl SpecAnalyzer for ScriptedAnalyzer {
    async fn extract_specs(&self, product_name: &str, _items: &[RawItem]) -> Result<ProductSpec> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_specs {
            anyhow::bail!("脚本化规格提取失败");
        }

        Ok(Self::make_spec(product_name))
    }

    async fn extract_specs_batch(
        &self,
        products: &[String],
        _items: &[RawItem],
    ) -> Result<Vec<ProductSpec>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.batch_log.lock() {
            log.push(products.to_vec());
        }

        if self.fail_specs {
            anyhow::bail!("脚本化批量规格提取失败");
        }

        let mut specs: Vec<ProductSpec> =
            products.iter().map(|name| Self::make_spec(name)).collect();
        if self.reverse_batch {
            specs.reverse();
        }

        Ok(specs)
    }

    async fn generate_pairing(
        &self,
        speaker: &ProductSpec,
        amplifier: &ProductSpec,
        _preferences: &Value,
    ) -> Result<Value> {
        self.pairing_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_pairing {
            anyhow::bail!("脚本化配对分析失败");
        }

        Ok(json!({
            "compatibilityScore": 82,
            "overallAssessment": format!(
                "{} + {} is a well balanced pairing",
                speaker.product_name, amplifier.product_name
            ),
            "technicalMatch": {
                "impedanceMatch": "good",
                "powerMatch": "good",
                "sensitivityMatch": "fair"
            },
            "soundQuality": {
                "expectedSignature": "neutral",
                "strengths": ["clean mids"],
                "potentialWeaknesses": [],
                "genreRecommendations": ["jazz", "classical"]
            }
        }))
    }

    async fn suggest_similar(
        &self,
        spec: &ProductSpec,
        product_type: ProductType,
    ) -> Result<Vec<Value>> {
        Ok(vec![json!({
            "name": format!("Alternative to {}", spec.product_name),
            "similarity": format!("same class of {}", product_type),
            "differences": "scripted",
            "priceCategory": "mid-range"
        })])
    }

    async fn search_recommendations(
        &self,
        _items: &[RawItem],
        criteria: &SearchCriteria,
    ) -> Result<Value> {
        Ok(json!({
            "speakers": [{"name": "Scripted Speaker", "reason": "matches criteria"}],
            "amplifiers": [{"name": "Scripted Amplifier", "reason": "matches criteria"}],
            "criteria": serde_json::to_value(criteria)?
        }))
    }
}

/// 脚本化论坛内容源
#[derive(Default)]
pub struct ScriptedForum {
    fetch_calls: AtomicUsize,
}

impl ScriptedForum {
    pub fn new() -> Self {
        Self::default()
    }

    /// fetch_content 被调用的次数
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for ScriptedForum {
    async fn fetch_content(&self, search_terms: &[String]) -> Vec<RawItem> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        search_terms
            .iter()
            .flat_map(|term| {
                (1..=2).map(move |i| RawItem {
                    title: format!("{} discussion {}", term, i),
                    content: format!(
                        "Forum thread about {} covering impedance, power handling and amp \
                         pairing impressions from several owners.",
                        term
                    ),
                    score: 10 * i as i64,
                    comment_count: 3,
                    url: None,
                    source_name: "scripted".to_string(),
                    search_term: Some(term.clone()),
                    timestamp: Utc::now(),
                })
            })
            .collect()
    }
}
