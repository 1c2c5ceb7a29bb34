/// 程序配置
///
/// 来源优先级：默认值 < TOML 配置文件 < 环境变量
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 单张图片的体积上限（字节）
    pub max_file_size: usize,
    /// 允许的图片媒体类型
    pub allowed_media_types: Vec<String>,
    /// 单次批量请求的图片数量上限
    pub max_batch_size: usize,
    /// 批内并发处理的图片数量上限
    pub max_concurrent_images: usize,
    /// 单张图片远程提取的超时（秒）
    pub ocr_timeout_secs: u64,
    // --- 远程 OCR 服务配置 ---
    pub ocr_api_key: String,
    pub ocr_api_base_url: String,
    pub ocr_model_name: String,
    // --- 命令行模式配置 ---
    /// 待处理图片的存放目录
    pub images_folder: String,
    /// 批量结果的输出文件
    pub output_json_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_media_types: vec![
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            max_batch_size: 10,
            max_concurrent_images: 10,
            ocr_timeout_secs: 30,
            ocr_api_key: String::new(),
            ocr_api_base_url: "https://api.mistral.ai/v1".to_string(),
            ocr_model_name: "pixtral-large-latest".to_string(),
            images_folder: "images".to_string(),
            output_json_file: "batch_result.json".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置（缺失项取默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置（缺失项取默认值）
    pub async fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;

        Ok(config)
    }

    /// 加载配置：存在 config.toml 时以其为基底，环境变量始终覆盖
    pub async fn load() -> Self {
        let base = if Path::new("config.toml").exists() {
            match Self::from_toml_file("config.toml").await {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("⚠️ 配置文件加载失败，使用默认配置: {}", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        Self {
            max_file_size: env_parse("MAX_FILE_SIZE").unwrap_or(self.max_file_size),
            allowed_media_types: env_list("ALLOWED_MEDIA_TYPES").unwrap_or(self.allowed_media_types),
            max_batch_size: env_parse("MAX_BATCH_SIZE").unwrap_or(self.max_batch_size),
            max_concurrent_images: env_parse("MAX_CONCURRENT_IMAGES")
                .unwrap_or(self.max_concurrent_images),
            ocr_timeout_secs: env_parse("OCR_TIMEOUT_SECS").unwrap_or(self.ocr_timeout_secs),
            ocr_api_key: std::env::var("OCR_API_KEY").unwrap_or(self.ocr_api_key),
            ocr_api_base_url: std::env::var("OCR_API_BASE_URL").unwrap_or(self.ocr_api_base_url),
            ocr_model_name: std::env::var("OCR_MODEL_NAME").unwrap_or(self.ocr_model_name),
            images_folder: std::env::var("IMAGES_FOLDER").unwrap_or(self.images_folder),
            output_json_file: std::env::var("OUTPUT_JSON_FILE").unwrap_or(self.output_json_file),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// 逗号分隔的环境变量列表，例如 `image/jpeg,image/png`
fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = Config::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.ocr_timeout_secs, 30);
        assert!(config
            .allowed_media_types
            .contains(&"image/webp".to_string()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            max_batch_size = 5
            ocr_model_name = "pixtral-12b-2409"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_batch_size, 5);
        assert_eq!(config.ocr_model_name, "pixtral-12b-2409");
        // 未出现的键保持默认值
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.max_concurrent_images, 10);
    }
}
