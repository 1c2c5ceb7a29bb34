//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::BatchProcessor (处理 Vec<BatchItem>)
//!     ↓
//! workflow::BillFlow (处理单张图片)
//!     ↓
//! services (能力层：admission / ocr_service / normalizer)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：批量准入、并发控制、结果聚合，不做具体业务判断
//! 2. **失败隔离**：任务之间不共享可变状态，单张失败只影响自己的槽位
//! 3. **向下依赖**：编排层 → workflow → services

pub mod batch_processor;

pub use batch_processor::{App, BatchItem, BatchProcessor};
