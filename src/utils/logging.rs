/// 日志工具模块
///
/// 提供批量处理过程中的日志格式化辅助函数
use tracing::info;

use crate::config::Config;
use crate::models::result::BatchResult;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量账单识别模式");
    info!("📊 批量上限: {} 张 / 并发上限: {} 张", config.max_batch_size, config.max_concurrent_images);
    info!("🧠 模型: {} @ {}", config.ocr_model_name, config.ocr_api_base_url);
    info!("{}", "=".repeat(60));
}

/// 记录图片加载信息
pub fn log_images_loaded(total: usize, max_batch_size: usize) {
    info!("✓ 找到 {} 张待处理的图片", total);
    info!("📋 将以每批 {} 张的方式处理\n", max_batch_size);
}

/// 记录批次开始信息
pub fn log_batch_start(batch_num: usize, count: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {} 批，共 {} 张图片", batch_num, count);
    info!("{}", "=".repeat(60));
}

/// 记录单个批次的聚合结果
pub fn log_batch_summary(batch: &BatchResult) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 批次完成 [{}]: 成功 {}/{}, 失败 {}, 耗时 {:.2} 秒",
        batch.status().as_str(),
        batch.successful_images,
        batch.total_images,
        batch.failed_images,
        batch.total_processing_time
    );
    for error in &batch.errors {
        info!(
            "  ❌ 第 {} 张 [{}]: {}",
            error.index + 1,
            error.error_kind,
            truncate_text(&error.message, 80)
        );
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(success: usize, failed: usize, total: usize, output_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_file);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("0123456789abc", 10), "0123456789...");
    }
}
