//! LLM 分析服务 - 业务能力层
//!
//! 只负责"AI 分析"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{ProductSpec, ProductType, RawItem, SearchCriteria};
use crate::services::analyzer::SpecAnalyzer;
use crate::utils::logging::truncate_text;

const SPEC_SYSTEM_PROMPT: &str = "You are an expert audiophile with deep knowledge of audio \
     equipment specifications. Extract accurate technical information from forum discussions.";

const BATCH_SYSTEM_PROMPT: &str = "Extract audio specs efficiently. Keep responses concise.";

const PAIRING_SYSTEM_PROMPT: &str = "You are a seasoned audiophile consultant with expertise in \
     matching speakers and amplifiers. Provide balanced, technical, and practical advice.";

/// LLM 分析服务
///
/// 职责：
/// - 调用 LLM API 完成规格提取和配对分析
/// - 提供通用的 LLM 调用接口
/// - 不出现队列和批次概念
/// - 不关心流程顺序
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// 这是最基础的 LLM 调用接口，其他所有分析功能都基于此函数。
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(2000u32)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::llm_empty_content(&self.model_name))?;

        Ok(content.trim().to_string())
    }

    /// 解析 LLM 返回的 JSON（容忍代码围栏）
    fn parse_json_response(&self, response: &str) -> Result<Value> {
        let cleaned = strip_code_fences(response);
        serde_json::from_str(cleaned).map_err(|e| {
            AppError::llm_json_parse_failed(truncate_text(response, 120), e).into()
        })
    }
}

/// 剥离 LLM 喜欢包在 JSON 外面的 Markdown 代码围栏
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// 数据不足时的兜底配对分析
fn fallback_pairing() -> Value {
    json!({
        "compatibilityScore": 50,
        "overallAssessment": "Unable to analyze - insufficient data",
        "technicalMatch": {
            "impedanceMatch": "unknown",
            "powerMatch": "unknown",
            "sensitivityMatch": "unknown"
        },
        "soundQuality": {
            "expectedSignature": "unknown",
            "strengths": ["Unable to determine"],
            "potentialWeaknesses": ["Insufficient data for analysis"],
            "genreRecommendations": ["Research needed"]
        },
        "practicalConsiderations": {
            "roomSize": "unknown",
            "placement": "standard placement recommendations apply",
            "additionalEquipment": []
        },
        "alternativeRecommendations": []
    })
}

#[async_trait]
impl SpecAnalyzer for LlmService {
    async fn extract_specs(&self, product_name: &str, items: &[RawItem]) -> Result<ProductSpec> {
        let relevant: Vec<String> = items
            .iter()
            .filter(|item| item.content.len() > 50)
            .take(10)
            .map(|item| format!("{}\n{}", item.title, item.content))
            .collect();

        let prompt = format!(
            "Analyze audiophile forum discussions about \"{}\" and extract key information.\n\n\
             {}\n\n\
             Return JSON with this shape: {{\"specifications\": {{\"impedance\", \"sensitivity\", \
             \"powerHandling\", \"frequencyResponse\", \"driverType\", \"dimensions\"}}, \
             \"soundCharacteristics\": {{\"signature\", \"bassResponse\", \"midrange\", \
             \"treble\", \"soundstage\", \"imaging\"}}, \"userExperiences\": [], \
             \"compatibilityNotes\": []}}. Use \"unknown\" for missing values.",
            product_name,
            relevant.join("\n\n")
        );

        let response = self.send_to_llm(&prompt, Some(SPEC_SYSTEM_PROMPT)).await?;

        let parsed = self
            .parse_json_response(&response)
            .and_then(|value| serde_json::from_value::<ProductSpec>(value).map_err(Into::into));

        match parsed {
            Ok(spec) => Ok(spec),
            Err(e) => {
                warn!("⚠️ 规格 JSON 解析失败，使用兜底规格 ({}): {}", product_name, e);
                Ok(ProductSpec::fallback(product_name))
            }
        }
    }

    async fn extract_specs_batch(
        &self,
        products: &[String],
        items: &[RawItem],
    ) -> Result<Vec<ProductSpec>> {
        let digest: Vec<String> = items
            .iter()
            .take(20)
            .map(|item| format!("{}: {}", item.title, truncate_text(&item.content, 200)))
            .collect();

        let prompt = format!(
            "Analyze these audio products from forum data:\n\
             Products: {}\n\n\
             Data: {}\n\n\
             Return a JSON array with one entry per product, in the form \
             [{{\"product\": \"name\", \"specifications\": {{...}}, \
             \"soundCharacteristics\": {{...}}}}]. Use \"unknown\" for missing values.",
            products.join(", "),
            digest.join("\n\n")
        );

        let response = self.send_to_llm(&prompt, Some(BATCH_SYSTEM_PROMPT)).await?;
        let value = self.parse_json_response(&response)?;

        Ok(serde_json::from_value(value)?)
    }

    async fn generate_pairing(
        &self,
        speaker: &ProductSpec,
        amplifier: &ProductSpec,
        preferences: &Value,
    ) -> Result<Value> {
        let prompt = format!(
            "Analyze this speaker and amplifier pairing.\n\n\
             SPEAKER: {}\n\n\
             AMPLIFIER: {}\n\n\
             USER PREFERENCES: {}\n\n\
             Return JSON with this shape: {{\"compatibilityScore\": 0-100, \
             \"overallAssessment\", \"technicalMatch\": {{\"impedanceMatch\", \"powerMatch\", \
             \"sensitivityMatch\"}}, \"soundQuality\": {{\"expectedSignature\", \"strengths\": [], \
             \"potentialWeaknesses\": [], \"genreRecommendations\": []}}, \
             \"practicalConsiderations\": {{\"roomSize\", \"placement\", \
             \"additionalEquipment\": []}}, \"alternativeRecommendations\": []}}",
            serde_json::to_string_pretty(speaker)?,
            serde_json::to_string_pretty(amplifier)?,
            serde_json::to_string_pretty(preferences)?
        );

        let response = self.send_to_llm(&prompt, Some(PAIRING_SYSTEM_PROMPT)).await?;

        match self.parse_json_response(&response) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("⚠️ 配对分析 JSON 解析失败，使用兜底分析: {}", e);
                Ok(fallback_pairing())
            }
        }
    }

    async fn suggest_similar(
        &self,
        spec: &ProductSpec,
        product_type: ProductType,
    ) -> Result<Vec<Value>> {
        let prompt = format!(
            "Based on these {} specifications:\n\n{}\n\n\
             Suggest 5 similar products that audiophiles commonly cross-shop. Return JSON: \
             {{\"suggestions\": [{{\"name\", \"similarity\", \"differences\", \
             \"priceCategory\"}}]}}",
            product_type,
            serde_json::to_string_pretty(spec)?
        );

        let response = self.send_to_llm(&prompt, Some(SPEC_SYSTEM_PROMPT)).await?;
        let value = self.parse_json_response(&response)?;

        let suggestions = value
            .get("suggestions")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(suggestions)
    }

    async fn search_recommendations(
        &self,
        items: &[RawItem],
        criteria: &SearchCriteria,
    ) -> Result<Value> {
        let digest: Vec<String> = items
            .iter()
            .take(20)
            .map(|item| format!("{}: {}", item.title, truncate_text(&item.content, 200)))
            .collect();

        let prompt = format!(
            "Recommend speaker and amplifier products for these criteria: {}\n\n\
             Forum data:\n{}\n\n\
             Return JSON: {{\"speakers\": [{{\"name\", \"reason\"}}], \
             \"amplifiers\": [{{\"name\", \"reason\"}}]}}",
            serde_json::to_string(criteria)?,
            digest.join("\n")
        );

        let response = self.send_to_llm(&prompt, Some(SPEC_SYSTEM_PROMPT)).await?;
        self.parse_json_response(&response)
    }
}
