//! 对外响应模型
//!
//! 由外层传输组件直接序列化返回；核心只负责把处理结果装入统一信封。

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::ErrorKind;
use crate::models::bill::{BillInfo, ProcessingStatus};
use crate::models::result::{BatchErrorEntry, BatchResult, BillResult};

/// 生成请求标识
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 单张图片的响应
#[derive(Debug, Serialize)]
pub struct BillResponse {
    pub status: ProcessingStatus,
    pub message: String,
    pub bill_info: Option<BillInfo>,
    pub raw_text: Option<String>,
    /// 处理耗时（秒，保留三位小数）
    pub processing_time: f64,
    pub timestamp: DateTime<Local>,
    /// 顶层响应携带请求标识，批量内嵌条目不再重复
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl BillResponse {
    /// 顶层单张响应
    pub fn from_result(result: BillResult) -> Self {
        let mut response = Self::entry(result);
        response.request_id = Some(generate_request_id());
        response
    }

    /// 批量响应内的单条条目
    pub fn entry(result: BillResult) -> Self {
        match result {
            BillResult::Success {
                bill,
                raw_text,
                processing_time,
            } => Self {
                status: ProcessingStatus::Success,
                message: "账单处理成功".to_string(),
                bill_info: Some(bill),
                raw_text: Some(raw_text),
                processing_time: round3(processing_time),
                timestamp: Local::now(),
                request_id: None,
                error_kind: None,
            },
            BillResult::Failure {
                error_kind,
                message,
                raw_text,
                processing_time,
            } => Self {
                status: ProcessingStatus::Failure,
                message,
                bill_info: None,
                raw_text,
                processing_time: round3(processing_time),
                timestamp: Local::now(),
                request_id: None,
                error_kind: Some(error_kind),
            },
        }
    }
}

/// 批量处理的响应
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub status: ProcessingStatus,
    pub message: String,
    pub total_images: usize,
    pub successful_images: usize,
    pub failed_images: usize,
    pub bills: Vec<BillResponse>,
    /// 整批墙钟耗时（秒，保留三位小数）
    pub total_processing_time: f64,
    pub timestamp: DateTime<Local>,
    pub request_id: String,
    pub errors: Vec<BatchErrorEntry>,
}

impl From<BatchResult> for BatchResponse {
    fn from(batch: BatchResult) -> Self {
        let status = batch.status();
        let message = batch_message(&batch);
        let BatchResult {
            total_images,
            successful_images,
            failed_images,
            bills,
            total_processing_time,
            errors,
        } = batch;

        Self {
            status,
            message,
            total_images,
            successful_images,
            failed_images,
            bills: bills.into_iter().map(BillResponse::entry).collect(),
            total_processing_time: round3(total_processing_time),
            timestamp: Local::now(),
            request_id: generate_request_id(),
            errors,
        }
    }
}

fn batch_message(batch: &BatchResult) -> String {
    let mut message = format!(
        "成功处理 {}/{} 张账单",
        batch.successful_images, batch.total_images
    );
    if batch.failed_images > 0 {
        message.push_str(&format!("，{} 张失败", batch.failed_images));
    }
    message
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
