//! 批量账单处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量图片的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **批量准入**：空批次与超限批次在任何流水线启动前整体拒绝
//! 2. **并发控制**：使用 Semaphore 限制批内并发数量
//! 3. **失败隔离**：单张图片的失败绝不取消或拖垮其余图片
//! 4. **顺序保证**：结果序列与输入顺序一一对应，与完成顺序无关
//! 5. **全局统计**：所有任务结束后一次性推导计数与聚合状态
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单张图片的细节，向下委托 `workflow::BillFlow`
//! - **资源所有者**：唯一持有 OCR 提取器的模块（`Arc<dyn OcrExtractor>`
//!   每次调用无共享可变状态，可被并发任务安全复用）
//! - **无隐藏重试**：远程调用失败原样记录，重试与退避留给调用方

use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::models::loaders::load_all_images;
use crate::models::response::BatchResponse;
use crate::models::result::{BatchResult, BillResult};
use crate::services::ocr_service::{OcrExtractor, RemoteOcrService};
use crate::utils::logging;
use crate::workflow::BillFlow;

/// 批量请求中的一张图片：原始字节加调用方声明的媒体类型
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl BatchItem {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }
}

/// 批量账单处理器
pub struct BatchProcessor {
    config: Config,
    flow: Arc<BillFlow>,
}

impl BatchProcessor {
    /// 创建批量处理器，提取能力由调用方注入
    pub fn new(config: Config, extractor: Arc<dyn OcrExtractor>) -> Self {
        let flow = Arc::new(BillFlow::new(config.clone(), extractor));
        Self { config, flow }
    }

    /// 处理一批图片
    ///
    /// 批量准入是全有或全无的：空批次与超限批次在任何流水线启动前
    /// 整体拒绝。通过准入后，单张图片的成败完全隔离，每张图片都会
    /// 被尝试，结果落在其原始下标对应的位置上。
    pub async fn process_batch(&self, items: Vec<BatchItem>) -> PipelineResult<BatchResult> {
        // ========== 批量准入（整体先决条件） ==========
        if items.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        if items.len() > self.config.max_batch_size {
            return Err(PipelineError::BatchTooLarge {
                count: items.len(),
                limit: self.config.max_batch_size,
            });
        }

        let started = Instant::now();
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_images));

        // ========== 并发执行：每张图片一个任务 ==========
        let mut handles = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::internal(format!("并发信号量已关闭: {}", e)))?;
            let flow = self.flow.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.run(&item.bytes, &item.media_type, index + 1).await
            });
            handles.push(handle);
        }

        // ========== 等待全部任务：join_all 保持输入顺序 ==========
        // 结果槽按输入下标一一对应写入，计数只在全部就绪后推导，
        // 任务崩溃折算为该槽位上的内部错误，不影响其余图片
        let joined = join_all(handles).await;
        let mut bills = Vec::with_capacity(total);
        for (index, outcome) in joined.into_iter().enumerate() {
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!("[账单 {}] 任务执行失败: {}", index + 1, e);
                    BillResult::failure(
                        &PipelineError::internal(format!("任务执行失败: {}", e)),
                        None,
                        0.0,
                    )
                }
            };
            bills.push(result);
        }

        let batch = BatchResult::from_results(bills, started.elapsed().as_secs_f64());
        logging::log_batch_summary(&batch);
        Ok(batch)
    }
}

/// 应用主结构（命令行模式）
///
/// 扫描配置目录下的图片，按批量上限分批跑完整个流水线，
/// 把批量响应写入输出文件并打印统计。
pub struct App {
    config: Config,
    processor: BatchProcessor,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        if config.ocr_api_key.is_empty() {
            anyhow::bail!("未配置 OCR_API_KEY，无法调用远程 OCR 服务");
        }

        logging::log_startup(&config);

        let extractor: Arc<dyn OcrExtractor> = Arc::new(RemoteOcrService::new(&config));
        let processor = BatchProcessor::new(config.clone(), extractor);

        Ok(Self { config, processor })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let mut remaining = load_all_images(&self.config.images_folder).await?;

        if remaining.is_empty() {
            warn!("⚠️ 没有找到待处理的图片，程序结束");
            return Ok(());
        }

        let total = remaining.len();
        logging::log_images_loaded(total, self.config.max_batch_size);

        let mut responses = Vec::new();
        let mut stats = ProcessingStats::default();

        // 分批处理：每批不超过批量上限
        let mut batch_num = 0;
        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(self.config.max_batch_size));
            batch_num += 1;
            logging::log_batch_start(batch_num, remaining.len());

            let batch = self.processor.process_batch(remaining).await?;
            stats.success += batch.successful_images;
            stats.failed += batch.failed_images;

            responses.push(BatchResponse::from(batch));
            remaining = rest;
        }

        let json = serde_json::to_string_pretty(&responses)?;
        tokio::fs::write(&self.config.output_json_file, json)
            .await
            .with_context(|| format!("无法写入输出文件: {}", self.config.output_json_file))?;

        logging::print_final_stats(
            stats.success,
            stats.failed,
            total,
            &self.config.output_json_file,
        );

        Ok(())
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
}
