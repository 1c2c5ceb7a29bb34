//! 流水线错误类型
//!
//! 错误分为两类：
//! - 本地判定错误（准入校验、结构规整）：由输入内容确定性地分类
//! - 远程错误（Remote*）：由 OCR 服务调用产生，原样上抛，不在内部重试

use serde::Serialize;
use thiserror::Error;

/// 错误种类
///
/// 每个 [`PipelineError`] 都能映射到一个种类，批量结果的错误列表
/// 以该种类的字符串形式对外序列化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// 图片类型不在允许集合内
    UnsupportedMediaType,
    /// 图片体积超过上限
    PayloadTooLarge,
    /// 远程服务不可达（网络/传输失败）
    RemoteUnavailable,
    /// 远程服务拒绝请求（鉴权/配额/非法请求）
    RemoteRejected,
    /// 远程调用超时
    RemoteTimeout,
    /// 模型输出中提取不到可用的账单结构
    SchemaExtractionFailed,
    /// 批量图片数量超过上限
    BatchTooLarge,
    /// 批量请求为空
    EmptyBatch,
    /// 内部错误（任务失败等兜底分类）
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedMediaType => "UnsupportedMediaType",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::RemoteUnavailable => "RemoteUnavailable",
            ErrorKind::RemoteRejected => "RemoteRejected",
            ErrorKind::RemoteTimeout => "RemoteTimeout",
            ErrorKind::SchemaExtractionFailed => "SchemaExtractionFailed",
            ErrorKind::BatchTooLarge => "BatchTooLarge",
            ErrorKind::EmptyBatch => "EmptyBatch",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 流水线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 不支持的图片类型
    #[error("不支持的图片类型: {media_type}")]
    UnsupportedMediaType { media_type: String },

    /// 图片体积超限
    #[error("图片体积 {size} 字节超过上限 {limit} 字节")]
    PayloadTooLarge { size: usize, limit: usize },

    /// 远程服务不可达
    #[error("OCR 服务不可用: {message}")]
    RemoteUnavailable { message: String },

    /// 远程服务拒绝请求
    #[error("OCR 服务拒绝请求: {message}")]
    RemoteRejected { message: String },

    /// 远程调用超时
    #[error("OCR 调用超时（{timeout_secs} 秒）")]
    RemoteTimeout { timeout_secs: u64 },

    /// 账单结构提取失败
    #[error("无法从模型输出中提取账单结构: {message}")]
    SchemaExtractionFailed { message: String },

    /// 批量数量超限
    #[error("批量图片数量 {count} 超过上限 {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    /// 批量请求为空
    #[error("批量请求不能为空")]
    EmptyBatch,

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal { message: String },
}

impl PipelineError {
    /// 返回错误对应的种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedMediaType { .. } => ErrorKind::UnsupportedMediaType,
            PipelineError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            PipelineError::RemoteUnavailable { .. } => ErrorKind::RemoteUnavailable,
            PipelineError::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            PipelineError::RemoteTimeout { .. } => ErrorKind::RemoteTimeout,
            PipelineError::SchemaExtractionFailed { .. } => ErrorKind::SchemaExtractionFailed,
            PipelineError::BatchTooLarge { .. } => ErrorKind::BatchTooLarge,
            PipelineError::EmptyBatch => ErrorKind::EmptyBatch,
            PipelineError::Internal { .. } => ErrorKind::Internal,
        }
    }

    // ========== 便捷构造函数 ==========

    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        PipelineError::RemoteUnavailable {
            message: message.into(),
        }
    }

    pub fn remote_rejected(message: impl Into<String>) -> Self {
        PipelineError::RemoteRejected {
            message: message.into(),
        }
    }

    pub fn schema_extraction_failed(message: impl Into<String>) -> Self {
        PipelineError::SchemaExtractionFailed {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PipelineError::Internal {
            message: message.into(),
        }
    }
}

/// 流水线结果类型别名
pub type PipelineResult<T> = Result<T, PipelineError>;
