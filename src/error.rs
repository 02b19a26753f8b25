use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// LLM 服务错误
    Llm(LlmError),
    /// 论坛抓取错误
    Scrape(ScrapeError),
    /// 批处理错误
    Batch(BatchError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Llm(e) => write!(f, "LLM错误: {}", e),
            AppError::Scrape(e) => write!(f, "抓取错误: {}", e),
            AppError::Batch(e) => write!(f, "批处理错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Llm(e) => Some(e),
            AppError::Scrape(e) => Some(e),
            AppError::Batch(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// LLM 服务错误
#[derive(Debug)]
pub enum LlmError {
    /// API 调用失败
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    EmptyContent {
        model: String,
    },
    /// JSON 解析失败
    JsonParseFailed {
        preview: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ApiCallFailed { model, source } => {
                write!(f, "LLM API调用失败 (模型: {}): {}", model, source)
            }
            LlmError::EmptyContent { model } => {
                write!(f, "LLM返回内容为空 (模型: {})", model)
            }
            LlmError::JsonParseFailed { preview, source } => {
                write!(f, "无法解析LLM返回的JSON (响应: {}): {}", preview, source)
            }
        }
    }
}

impl std::error::Error for LlmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LlmError::ApiCallFailed { source, .. } | LlmError::JsonParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 论坛抓取错误
#[derive(Debug)]
pub enum ScrapeError {
    /// 网络请求失败
    RequestFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回了非成功状态码
    BadStatus {
        url: String,
        status: u16,
    },
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeError::RequestFailed { url, source } => {
                write!(f, "论坛请求失败 ({}): {}", url, source)
            }
            ScrapeError::BadStatus { url, status } => {
                write!(f, "论坛返回错误状态 ({}): HTTP {}", url, status)
            }
        }
    }
}

impl std::error::Error for ScrapeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScrapeError::RequestFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 批处理错误
///
/// 同一个类型组内的所有请求会收到同一个失败，
/// 因此该类型必须可以 Clone（上游错误降级为字符串携带）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// 上游调用失败（AI 或抓取）
    Upstream {
        message: String,
    },
    /// 批量响应中找不到对应产品的结果
    NoMatch {
        product: String,
    },
    /// 当前路径不支持的请求类型
    Unsupported {
        kind: &'static str,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Upstream { message } => {
                write!(f, "上游调用失败: {}", message)
            }
            BatchError::NoMatch { product } => {
                write!(f, "批量响应中未找到产品结果: {}", product)
            }
            BatchError::Unsupported { kind } => {
                write!(f, "不支持的请求类型: {}", kind)
            }
        }
    }
}

impl std::error::Error for BatchError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<BatchError> for AppError {
    fn from(err: BatchError) -> Self {
        AppError::Batch(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Llm(LlmError::JsonParseFailed {
            preview: String::new(), // serde 错误本身已携带位置信息
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        AppError::Scrape(ScrapeError::RequestFailed {
            url,
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM返回为空错误
    pub fn llm_empty_content(model: impl Into<String>) -> Self {
        AppError::Llm(LlmError::EmptyContent {
            model: model.into(),
        })
    }

    /// 创建LLM JSON解析错误
    pub fn llm_json_parse_failed(
        preview: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::JsonParseFailed {
            preview: preview.into(),
            source: Box::new(source),
        })
    }

    /// 创建论坛请求失败错误
    pub fn scrape_request_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Scrape(ScrapeError::RequestFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
