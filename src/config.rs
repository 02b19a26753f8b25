use crate::error::ConfigError;
use std::str::FromStr;
use tracing::warn;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 缓存目录
    pub cache_dir: String,
    /// 每批处理的请求数量
    pub batch_size: usize,
    /// 批次之间的延迟（毫秒）
    pub batch_delay_ms: u64,
    /// 同一域名两次抓取之间的最小间隔（毫秒）
    pub scrape_delay_ms: u64,
    /// 送入 AI 的内容 token 预算
    pub max_content_tokens: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 论坛 API 配置 ---
    pub forum_api_base_url: String,
    pub forum_user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: "cache".to_string(),
            batch_size: 5,
            batch_delay_ms: 2000,
            scrape_delay_ms: 2000,
            max_content_tokens: 1500,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            forum_api_base_url: "https://www.reddit.com/r/audiophile".to_string(),
            forum_user_agent: "AudioPairingBot/1.0".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            cache_dir: std::env::var("CACHE_DIR").unwrap_or(default.cache_dir),
            batch_size: parse_env("BATCH_SIZE", default.batch_size),
            batch_delay_ms: parse_env("BATCH_DELAY_MS", default.batch_delay_ms),
            scrape_delay_ms: parse_env("SCRAPE_DELAY_MS", default.scrape_delay_ms),
            max_content_tokens: parse_env("MAX_CONTENT_TOKENS", default.max_content_tokens),
            verbose_logging: parse_env("VERBOSE_LOGGING", default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            forum_api_base_url: std::env::var("FORUM_API_BASE_URL")
                .unwrap_or(default.forum_api_base_url),
            forum_user_agent: std::env::var("FORUM_USER_AGENT").unwrap_or(default.forum_user_agent),
        }
    }
}

/// 解析环境变量，解析失败时记录警告并回退到默认值
fn parse_env<T: FromStr>(var_name: &str, default: T) -> T {
    match std::env::var(var_name) {
        Err(_) => default,
        Ok(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    "{}",
                    ConfigError::EnvVarParseFailed {
                        var_name: var_name.to_string(),
                        value,
                        expected_type: std::any::type_name::<T>().to_string(),
                    }
                );
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_batch_contract() {
        let config = Config::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_delay_ms, 2000);
    }

    #[test]
    fn test_parse_env_fallback() {
        std::env::set_var("AUDIO_PAIRING_TEST_BAD_USIZE", "abc");
        let parsed: usize = parse_env("AUDIO_PAIRING_TEST_BAD_USIZE", 7);
        assert_eq!(parsed, 7);
        std::env::remove_var("AUDIO_PAIRING_TEST_BAD_USIZE");
    }
}
