//! # Audio Pairing
//!
//! 一个基于论坛数据和 LLM 的音箱/功放配对分析核心
//!
//! ## 架构设计
//!
//! 本系统采用严格的三层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `PersistentCache` - 磁盘持久化缓存（内存热层 + 每键一个 JSON 文件）
//! - `RateLimiter` - 域名级最小间隔限流器
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `SpecAnalyzer` / `ContentSource` - 协作方接口
//! - `LlmService` - AI 分析能力（兼容 OpenAI API 的服务）
//! - `ForumSearch` - 论坛内容抓取能力（JSON 搜索接口）
//! - `content_optimizer` - 内容筛选和 token 预算控制
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 分析请求批处理器，管理队列与合并
//! - `orchestrator/pairing_engine` - 配对分析引擎，组合出公共操作
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, BatchError};
pub use infrastructure::{PersistentCache, RateLimiter};
pub use models::{PairingReport, ProductSpec, ProductType, RawItem, SearchCriteria};
pub use orchestrator::{BatchProcessor, PairingEngine};
pub use services::{ContentSource, ForumSearch, LlmService, SpecAnalyzer};
