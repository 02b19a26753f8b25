//! 协作方接口 - 业务能力层
//!
//! 编排层只依赖这两个接口，不关心背后是真实服务还是测试替身：
//!
//! - `SpecAnalyzer` - AI 分析能力（规格提取、配对分析、推荐）
//! - `ContentSource` - 论坛内容获取能力
//!
//! 所有实现以 `Arc<dyn ...>` 注入，不使用模块级单例。

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{ProductSpec, ProductType, RawItem, SearchCriteria};

/// AI 分析能力
#[async_trait]
pub trait SpecAnalyzer: Send + Sync {
    /// 从论坛内容中提取单个产品的规格
    async fn extract_specs(&self, product_name: &str, items: &[RawItem]) -> Result<ProductSpec>;

    /// 一次调用提取多个产品的规格（组合调用）
    ///
    /// 返回的每个条目应携带 `product` 字段以便按名分发。
    async fn extract_specs_batch(
        &self,
        products: &[String],
        items: &[RawItem],
    ) -> Result<Vec<ProductSpec>>;

    /// 生成音箱 + 功放的配对分析
    async fn generate_pairing(
        &self,
        speaker: &ProductSpec,
        amplifier: &ProductSpec,
        preferences: &Value,
    ) -> Result<Value>;

    /// 推荐相似产品
    async fn suggest_similar(
        &self,
        spec: &ProductSpec,
        product_type: ProductType,
    ) -> Result<Vec<Value>>;

    /// 根据搜索条件生成产品推荐
    async fn search_recommendations(
        &self,
        items: &[RawItem],
        criteria: &SearchCriteria,
    ) -> Result<Value>;
}

/// 论坛内容获取能力
///
/// 失败时返回空列表，错误不越过本接口边界。
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_content(&self, search_terms: &[String]) -> Vec<RawItem>;
}
