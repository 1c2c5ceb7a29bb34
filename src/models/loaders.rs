//! 图片加载
//!
//! 命令行模式下从目录读入待处理图片，按扩展名推断媒体类型。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::orchestrator::BatchItem;

/// 按扩展名推断媒体类型，未知扩展名返回 None
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// 读取单个图片文件
pub async fn load_image(path: &Path) -> Result<BatchItem> {
    let media_type = media_type_for_path(path)
        .with_context(|| format!("无法识别的图片扩展名: {}", path.display()))?;

    let bytes = fs::read(path)
        .await
        .with_context(|| format!("无法读取图片文件: {}", path.display()))?;

    Ok(BatchItem::new(bytes, media_type))
}

/// 从目录中加载所有可识别的图片文件（按文件名排序，保证批次顺序稳定）
pub async fn load_all_images(folder_path: &str) -> Result<Vec<BatchItem>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("图片目录不存在: {}", folder_path);
    }

    let mut image_paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取图片目录: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if media_type_for_path(&path).is_some() {
            image_paths.push(path);
        } else if path.is_file() {
            tracing::warn!("⚠️ 跳过无法识别的文件: {}", path.display());
        }
    }

    image_paths.sort();

    let mut items = Vec::with_capacity(image_paths.len());
    for path in &image_paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_image(path).await {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!("加载图片失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(
            media_type_for_path(Path::new("receipt.JPG")),
            Some("image/jpeg")
        );
        assert_eq!(
            media_type_for_path(Path::new("a/b/receipt.png")),
            Some("image/png")
        );
        assert_eq!(
            media_type_for_path(Path::new("receipt.webp")),
            Some("image/webp")
        );
        assert_eq!(media_type_for_path(Path::new("receipt.pdf")), None);
        assert_eq!(media_type_for_path(Path::new("noext")), None);
    }
}
