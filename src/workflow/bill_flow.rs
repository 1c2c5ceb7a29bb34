//! 单张账单处理流程 - 流程层
//!
//! 核心职责：定义"一张图片"的完整处理流程
//!
//! 流程顺序：
//! 1. 准入校验（类型、体积）
//! 2. 远程提取（带超时）
//! 3. 结构规整
//!
//! 任一阶段失败立即短路，产出携带错误种类的失败结果；
//! 无论成败，耗时都从准入开始计到流程结束。

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::result::BillResult;
use crate::services::ocr_service::OcrExtractor;
use crate::services::{admission, normalizer};

/// 单张账单处理流程
///
/// - 不持有任何批量状态，只处理单张图片
/// - 提取能力通过 [`OcrExtractor`] 注入，可被并发任务共享
pub struct BillFlow {
    config: Config,
    extractor: Arc<dyn OcrExtractor>,
}

impl BillFlow {
    /// 创建新的处理流程
    pub fn new(config: Config, extractor: Arc<dyn OcrExtractor>) -> Self {
        Self { config, extractor }
    }

    /// 处理单张图片
    ///
    /// # 参数
    /// - `image_bytes`: 原始图片字节
    /// - `media_type`: 调用方声明的媒体类型
    /// - `image_index`: 图片在批次中的序号（从 1 开始，用于日志）
    ///
    /// # 返回
    /// 永远返回一个 [`BillResult`]，失败也是一种结果而不是错误
    pub async fn run(&self, image_bytes: &[u8], media_type: &str, image_index: usize) -> BillResult {
        let started = Instant::now();

        // ========== 阶段 1: 准入校验 ==========
        if let Err(e) = admission::admit(image_bytes, media_type, &self.config) {
            warn!("[账单 {}] ⚠️ 准入校验未通过: {}", image_index, e);
            return BillResult::failure(&e, None, started.elapsed().as_secs_f64());
        }

        // ========== 阶段 2: 远程提取（带超时） ==========
        let timeout = Duration::from_secs(self.config.ocr_timeout_secs);
        let extraction =
            match tokio::time::timeout(timeout, self.extractor.extract(image_bytes, media_type))
                .await
            {
                Ok(Ok(extraction)) => extraction,
                Ok(Err(e)) => {
                    warn!("[账单 {}] ⚠️ 远程提取失败: {}", image_index, e);
                    return BillResult::failure(&e, None, started.elapsed().as_secs_f64());
                }
                Err(_) => {
                    let e = PipelineError::RemoteTimeout {
                        timeout_secs: self.config.ocr_timeout_secs,
                    };
                    warn!("[账单 {}] ⚠️ {}", image_index, e);
                    return BillResult::failure(&e, None, started.elapsed().as_secs_f64());
                }
            };

        // ========== 阶段 3: 结构规整 ==========
        match normalizer::normalize(&extraction.raw_text, extraction.structured.as_ref()) {
            Ok(bill) => {
                info!(
                    "[账单 {}] ✓ 提取成功: {} 个条目, 总额 {:?} {}",
                    image_index,
                    bill.items.len(),
                    bill.total,
                    bill.currency
                );
                BillResult::Success {
                    bill,
                    raw_text: extraction.raw_text,
                    processing_time: started.elapsed().as_secs_f64(),
                }
            }
            Err(e) => {
                warn!("[账单 {}] ⚠️ 结构规整失败: {}", image_index, e);
                // 规整失败时 OCR 已经成功，附上原始文本便于排查
                BillResult::failure(
                    &e,
                    Some(extraction.raw_text),
                    started.elapsed().as_secs_f64(),
                )
            }
        }
    }
}
