//! 单张与批量处理结果
//!
//! `BillResult` 由单张流水线产出一次后不再变更；
//! `BatchResult` 在全部槽位填满后一次性构造，计数永远由结果序列推导。

use serde::Serialize;

use crate::error::{ErrorKind, PipelineError};
use crate::models::bill::{BillInfo, ProcessingStatus};

/// 单张图片的处理结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BillResult {
    /// 成功提取出账单
    Success {
        bill: BillInfo,
        raw_text: String,
        /// 端到端处理耗时（秒）
        processing_time: f64,
    },
    /// 任一阶段失败
    Failure {
        error_kind: ErrorKind,
        message: String,
        /// OCR 成功但规整失败时附带原始文本，便于排查
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_text: Option<String>,
        processing_time: f64,
    },
}

impl BillResult {
    /// 从流水线错误构造失败结果
    pub fn failure(error: &PipelineError, raw_text: Option<String>, processing_time: f64) -> Self {
        BillResult::Failure {
            error_kind: error.kind(),
            message: error.to_string(),
            raw_text,
            processing_time,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BillResult::Success { .. })
    }

    pub fn processing_time(&self) -> f64 {
        match self {
            BillResult::Success {
                processing_time, ..
            }
            | BillResult::Failure {
                processing_time, ..
            } => *processing_time,
        }
    }
}

/// 批量结果中的单条错误描述
#[derive(Debug, Clone, Serialize)]
pub struct BatchErrorEntry {
    /// 图片在输入序列中的下标（从 0 开始）
    pub index: usize,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// 批量处理结果
///
/// 结果序列与输入顺序一一对应，计数字段只在构造时从序列推导，
/// 因此恒有 successful_images + failed_images == total_images。
#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub total_images: usize,
    pub successful_images: usize,
    pub failed_images: usize,
    pub bills: Vec<BillResult>,
    /// 整批墙钟耗时（秒），并非各单张耗时之和
    pub total_processing_time: f64,
    pub errors: Vec<BatchErrorEntry>,
}

impl BatchResult {
    /// 在所有单张结果就绪后一次性构造批量结果
    pub fn from_results(bills: Vec<BillResult>, total_processing_time: f64) -> Self {
        let total_images = bills.len();
        let successful_images = bills.iter().filter(|b| b.is_success()).count();
        let failed_images = total_images - successful_images;

        let errors = bills
            .iter()
            .enumerate()
            .filter_map(|(index, result)| match result {
                BillResult::Failure {
                    error_kind,
                    message,
                    ..
                } => Some(BatchErrorEntry {
                    index,
                    error_kind: *error_kind,
                    message: message.clone(),
                }),
                BillResult::Success { .. } => None,
            })
            .collect();

        Self {
            total_images,
            successful_images,
            failed_images,
            bills,
            total_processing_time,
            errors,
        }
    }

    /// 批量聚合状态：全部成功 → success，部分成功 → partial，全部失败 → error
    pub fn status(&self) -> ProcessingStatus {
        if self.failed_images == 0 {
            ProcessingStatus::Success
        } else if self.successful_images > 0 {
            ProcessingStatus::Partial
        } else {
            ProcessingStatus::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bill::LineItem;

    fn success_result() -> BillResult {
        BillResult::Success {
            bill: BillInfo {
                items: vec![LineItem::new("Pizza", 18.0, 1)],
                total: Some(18.0),
                ..Default::default()
            },
            raw_text: "{}".to_string(),
            processing_time: 0.5,
        }
    }

    fn failure_result() -> BillResult {
        BillResult::failure(&PipelineError::RemoteTimeout { timeout_secs: 30 }, None, 30.0)
    }

    #[test]
    fn test_counts_always_reconcile() {
        let batch = BatchResult::from_results(
            vec![success_result(), failure_result(), success_result()],
            1.2,
        );
        assert_eq!(batch.total_images, 3);
        assert_eq!(batch.successful_images, 2);
        assert_eq!(batch.failed_images, 1);
        assert_eq!(
            batch.successful_images + batch.failed_images,
            batch.total_images
        );
    }

    #[test]
    fn test_status_derivation() {
        let all_ok = BatchResult::from_results(vec![success_result()], 0.1);
        assert_eq!(all_ok.status(), ProcessingStatus::Success);

        let mixed = BatchResult::from_results(vec![success_result(), failure_result()], 0.1);
        assert_eq!(mixed.status(), ProcessingStatus::Partial);

        let all_bad = BatchResult::from_results(vec![failure_result()], 0.1);
        assert_eq!(all_bad.status(), ProcessingStatus::Error);
    }

    #[test]
    fn test_errors_keep_input_order_and_index() {
        let batch = BatchResult::from_results(
            vec![failure_result(), success_result(), failure_result()],
            0.1,
        );
        assert_eq!(batch.errors.len(), 2);
        assert_eq!(batch.errors[0].index, 0);
        assert_eq!(batch.errors[1].index, 2);
        assert_eq!(batch.errors[0].error_kind, ErrorKind::RemoteTimeout);
    }

    #[test]
    fn test_failure_serializes_kind_and_status() {
        let json = serde_json::to_value(failure_result()).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error_kind"], "RemoteTimeout");
        assert!(json.get("raw_text").is_none());
    }
}
