//! 文件准入校验 - 业务能力层
//!
//! 在发起远程调用之前完成廉价校验：先类型、后体积。
//! 纯函数，无副作用，不消耗任何远程调用额度。

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

/// 校验单张图片的媒体类型与体积
///
/// 校验顺序：
/// 1. 声明的媒体类型必须在配置的允许集合内
/// 2. 字节数不得超过配置上限
pub fn admit(bytes: &[u8], media_type: &str, config: &Config) -> PipelineResult<()> {
    let normalized = media_type.trim().to_ascii_lowercase();

    if !config.allowed_media_types.iter().any(|t| *t == normalized) {
        warn!("拒绝不支持的图片类型: {}", media_type);
        return Err(PipelineError::UnsupportedMediaType {
            media_type: media_type.to_string(),
        });
    }

    if bytes.len() > config.max_file_size {
        warn!(
            "拒绝超限图片: {} 字节 > {} 字节",
            bytes.len(),
            config.max_file_size
        );
        return Err(PipelineError::PayloadTooLarge {
            size: bytes.len(),
            limit: config.max_file_size,
        });
    }

    debug!("图片准入通过: {} ({} 字节)", normalized, bytes.len());
    Ok(())
}
