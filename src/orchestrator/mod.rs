//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责队列调度和操作组合，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 分析请求批处理器
//! - 维护 FIFO 请求队列（VecDeque<QueuedRequest>）
//! - 保证单活跃排水循环
//! - 同类请求合并为一次 AI 调用
//! - 分发结果、隔离失败
//! - 控制批间延迟
//!
//! ### `pairing_engine` - 配对分析引擎
//! - 组合缓存、批处理器和协作方
//! - 提供规格获取和配对生成两个主操作
//! - 本地兼容性评分
//! - 相似产品、搜索推荐、最近记录、缓存统计
//!
//! ## 层次关系
//!
//! ```text
//! pairing_engine (公共操作)
//!     ↓
//! batch_processor (队列 + 合并 + 限速)
//!     ↓
//! services (能力层：llm / forum / optimizer)
//!     ↓
//! infrastructure (基础设施：cache / rate limiter)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管队列，pairing_engine 管操作
//! 2. **显式装配**：协作方全部经构造函数注入
//! 3. **向下依赖**：编排层 → services → infrastructure
//! 4. **失败隔离**：批内按类型组隔离，组间互不影响

pub mod batch_processor;
pub mod pairing_engine;

// 重新导出主要类型
pub use batch_processor::{AnalysisPayload, BatchProcessor, RequestKind};
pub use pairing_engine::{CacheStats, PairingEngine};
