//! 分析请求批处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块在公共操作和 AI 协作方之间架一条队列，负责合并与限速。
//!
//! ## 核心功能
//!
//! 1. **FIFO 队列**：入队的分析请求严格按先来先服务出队
//! 2. **单活跃排水循环**：同一时刻最多一个循环在取批处理
//! 3. **同类分组**：批次内按请求类型分组，规格提取类可合并为一次 AI 调用
//! 4. **结果分发**：批量响应优先按产品名回配，找不到时退回位置索引
//! 5. **失败隔离**：一个类型组的失败不影响同批次的其他组
//! 6. **批间限速**：队列未空时，两个批次之间等待固定延迟
//!
//! ## 状态机
//!
//! ```text
//! Idle --入队--> Draining --队列排空--> Idle
//! ```
//!
//! 排水循环由 `draining` 标志守护；排空与标志清除之间溜进来的
//! 请求会在清除后被重新检查，不会滞留。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::BatchError;
use crate::models::{ProductSpec, RawItem};
use crate::services::analyzer::SpecAnalyzer;

/// 请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// 规格提取
    Specs,
    /// 配对分析
    Pairing,
}

impl RequestKind {
    /// 获取类型名称
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::Specs => "specs",
            RequestKind::Pairing => "pairing",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 请求负载（类型由变体决定）
#[derive(Debug)]
pub enum AnalysisPayload {
    /// 规格提取：产品名 + 优化后的论坛内容
    Specs {
        product_name: String,
        items: Vec<RawItem>,
    },
    /// 配对分析：两侧规格 + 用户偏好
    Pairing {
        speaker: ProductSpec,
        amplifier: ProductSpec,
        preferences: Value,
    },
}

impl AnalysisPayload {
    /// 请求类型
    pub fn kind(&self) -> RequestKind {
        match self {
            AnalysisPayload::Specs { .. } => RequestKind::Specs,
            AnalysisPayload::Pairing { .. } => RequestKind::Pairing,
        }
    }

    fn as_specs(&self) -> Option<(&str, &[RawItem])> {
        match self {
            AnalysisPayload::Specs {
                product_name,
                items,
            } => Some((product_name, items)),
            _ => None,
        }
    }
}

/// 分析结果（与负载变体一一对应）
#[derive(Debug)]
enum AnalysisOutput {
    Specs(ProductSpec),
    Pairing(Value),
}

/// 排队中的请求
///
/// `completion` 由批处理器恰好使用一次（成功或失败），
/// 之后请求不再被改动。
struct QueuedRequest {
    payload: AnalysisPayload,
    created_at: i64,
    completion: oneshot::Sender<Result<AnalysisOutput, BatchError>>,
}

impl QueuedRequest {
    fn complete(self, result: Result<AnalysisOutput, BatchError>) {
        // 接收端可能已放弃等待
        let _ = self.completion.send(result);
    }
}

/// 分析请求批处理器
pub struct BatchProcessor {
    analyzer: Arc<dyn SpecAnalyzer>,
    queue: Mutex<VecDeque<QueuedRequest>>,
    draining: AtomicBool,
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchProcessor {
    /// 创建批处理器
    pub fn new(analyzer: Arc<dyn SpecAnalyzer>, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            analyzer,
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        })
    }

    /// 入队一个规格提取请求并等待结果
    pub async fn queue_specs(
        self: &Arc<Self>,
        product_name: impl Into<String>,
        items: Vec<RawItem>,
    ) -> Result<ProductSpec, BatchError> {
        let payload = AnalysisPayload::Specs {
            product_name: product_name.into(),
            items,
        };

        match self.queue_request(payload).await? {
            AnalysisOutput::Specs(spec) => Ok(spec),
            AnalysisOutput::Pairing(_) => Err(BatchError::Unsupported {
                kind: RequestKind::Pairing.name(),
            }),
        }
    }

    /// 入队一个配对分析请求并等待结果
    pub async fn queue_pairing(
        self: &Arc<Self>,
        speaker: ProductSpec,
        amplifier: ProductSpec,
        preferences: Value,
    ) -> Result<Value, BatchError> {
        let payload = AnalysisPayload::Pairing {
            speaker,
            amplifier,
            preferences,
        };

        match self.queue_request(payload).await? {
            AnalysisOutput::Pairing(analysis) => Ok(analysis),
            AnalysisOutput::Specs(_) => Err(BatchError::Unsupported {
                kind: RequestKind::Specs.name(),
            }),
        }
    }

    /// 入队并等待完成通道
    async fn queue_request(
        self: &Arc<Self>,
        payload: AnalysisPayload,
    ) -> Result<AnalysisOutput, BatchError> {
        let (tx, rx) = oneshot::channel();
        let kind = payload.kind();

        {
            let mut queue = self.queue.lock().await;
            queue.push_back(QueuedRequest {
                payload,
                created_at: Utc::now().timestamp_millis(),
                completion: tx,
            });
            debug!("请求入队 (类型: {}, 队列长度: {})", kind, queue.len());
        }

        self.trigger_drain();

        rx.await.unwrap_or_else(|_| {
            Err(BatchError::Upstream {
                message: "排水循环提前退出，请求未被处理".to_string(),
            })
        })
    }

    /// 若当前没有活跃的排水循环则启动一个
    fn trigger_drain(self: &Arc<Self>) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // 已有循环在工作，入队即可
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            loop {
                this.drain_queue().await;
                this.draining.store(false, Ordering::Release);

                // 排空到标志清除之间可能有新请求溜进来
                if this.queue.lock().await.is_empty() {
                    break;
                }
                if this
                    .draining
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    break;
                }
            }
        });
    }

    /// 排水循环：持续取批，直到队列排空
    async fn drain_queue(&self) {
        loop {
            let batch = self.take_batch().await;
            if batch.is_empty() {
                return;
            }

            debug!("📦 取出一个批次，共 {} 个请求", batch.len());

            for (kind, requests) in group_by_kind(batch) {
                self.process_kind_group(kind, requests).await;
            }

            // 批间限速：队列未空时等待固定延迟
            if !self.queue.lock().await.is_empty() {
                debug!("⏳ 批间等待 {} ms", self.batch_delay.as_millis());
                sleep(self.batch_delay).await;
            }
        }
    }

    /// 从队首取出最多 batch_size 个请求
    async fn take_batch(&self) -> Vec<QueuedRequest> {
        let mut queue = self.queue.lock().await;
        let count = queue.len().min(self.batch_size);
        queue.drain(..count).collect()
    }

    /// 处理一个类型组；组内失败不影响其他组
    async fn process_kind_group(&self, kind: RequestKind, requests: Vec<QueuedRequest>) {
        match kind {
            RequestKind::Specs if requests.len() > 1 => {
                self.process_batch_specs(requests).await;
            }
            _ => {
                for request in requests {
                    self.process_individual(request).await;
                }
            }
        }
    }

    /// 组合调用：一次 AI 调用覆盖整组规格请求
    async fn process_batch_specs(&self, requests: Vec<QueuedRequest>) {
        // 分组按类型进行，这里再做一次穷尽校验
        let mut group = Vec::with_capacity(requests.len());
        for request in requests {
            if request.payload.as_specs().is_some() {
                group.push(request);
            } else {
                let kind = request.payload.kind().name();
                request.complete(Err(BatchError::Unsupported { kind }));
            }
        }

        let mut products = Vec::with_capacity(group.len());
        let mut source_counts = Vec::with_capacity(group.len());
        let mut combined = Vec::new();
        for request in &group {
            if let Some((name, items)) = request.payload.as_specs() {
                products.push(name.to_string());
                source_counts.push(items.len());
                combined.extend_from_slice(items);
            }
        }

        info!("🤖 组合调用：一次提取 {} 个产品的规格", products.len());

        match self.analyzer.extract_specs_batch(&products, &combined).await {
            Ok(results) => {
                for (index, request) in group.into_iter().enumerate() {
                    let name = products[index].clone();

                    // 优先按产品名回配，找不到退回位置索引（尽力而为）
                    let matched = results
                        .iter()
                        .find(|r| r.product_name == name)
                        .or_else(|| results.get(index));

                    match matched {
                        Some(result) => {
                            let mut spec = result.clone();
                            spec.product_name = name;
                            spec.last_updated = Some(Utc::now());
                            spec.source_count = source_counts[index];
                            request.complete(Ok(AnalysisOutput::Specs(spec)));
                        }
                        None => {
                            warn!("⚠️ 批量响应中没有 {} 的结果", name);
                            request.complete(Err(BatchError::NoMatch { product: name }));
                        }
                    }
                }
            }
            Err(e) => {
                error!("❌ 组合调用失败，整组 {} 个请求一并失败: {}", group.len(), e);
                let failure = BatchError::Upstream {
                    message: e.to_string(),
                };
                for request in group {
                    request.complete(Err(failure.clone()));
                }
            }
        }
    }

    /// 单独处理一个请求
    async fn process_individual(&self, request: QueuedRequest) {
        let waited_ms = Utc::now().timestamp_millis() - request.created_at;
        debug!(
            "处理单个请求 (类型: {}, 排队 {} ms)",
            request.payload.kind(),
            waited_ms
        );

        let result = match &request.payload {
            AnalysisPayload::Specs {
                product_name,
                items,
            } => self
                .analyzer
                .extract_specs(product_name, items)
                .await
                .map(AnalysisOutput::Specs),
            AnalysisPayload::Pairing {
                speaker,
                amplifier,
                preferences,
            } => self
                .analyzer
                .generate_pairing(speaker, amplifier, preferences)
                .await
                .map(AnalysisOutput::Pairing),
        };

        match result {
            Ok(output) => request.complete(Ok(output)),
            Err(e) => {
                error!("❌ 单个请求处理失败: {}", e);
                request.complete(Err(BatchError::Upstream {
                    message: e.to_string(),
                }));
            }
        }
    }
}

/// 按请求类型分组，保持类型出现顺序和组内入队顺序
fn group_by_kind(batch: Vec<QueuedRequest>) -> Vec<(RequestKind, Vec<QueuedRequest>)> {
    let mut groups: Vec<(RequestKind, Vec<QueuedRequest>)> = Vec::new();

    for request in batch {
        let kind = request.payload.kind();
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, requests)) => requests.push(request),
            None => groups.push((kind, vec![request])),
        }
    }

    groups
}
