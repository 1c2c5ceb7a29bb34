//! # Split Bill OCR
//!
//! 账单图片识别与结构化提取核心：一张拍照账单经远程视觉模型提取后，
//! 被规整为严格校验的账单结构；批量请求在失败完全隔离的前提下并发
//! 处理，聚合结果永远与输入顺序对齐。
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单张图片
//! - `admission` - 准入校验能力（类型、体积）
//! - `ocr_service` - 远程视觉模型提取能力（单次请求，不重试）
//! - `normalizer` - 账单结构规整能力（全量容错，警告代替异常）
//!
//! ### ② 流程层（Workflow）
//! - `workflow/` - 定义"一张图片"的完整处理流程
//! - `BillFlow` - 流程编排（准入 → 提取 → 规整），端到端计时
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理并发与失败隔离
//!
//! ### ④ 数据模型（Models）
//! - `models/` - 账单结构、处理结果、对外响应信封
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use models::{
    BatchErrorEntry, BatchResponse, BatchResult, BillInfo, BillResponse, BillResult, LineItem,
    ProcessingStatus,
};
pub use orchestrator::{App, BatchItem, BatchProcessor};
pub use services::{OcrExtractor, RawExtraction, RemoteOcrService};
pub use workflow::BillFlow;
