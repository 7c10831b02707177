//! 素材存储模块
//!
//! # 设计思路
//!
//! 合成结果最终交给对象存储，存储方只需返回一个可访问的地址。
//! 会话只依赖 `AssetUploader` 这一接缝，具体实现由调用方注入：
//! 线上接对象存储，本地与命令行使用 `DirectoryUploader` 写入目录。
//!
//! # 实现思路
//!
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 文件名 `<提示名>_<时间戳>.<扩展名>`，时间戳精确到微秒避免覆盖。
//! - 文件写入放到 `spawn_blocking`，不阻塞异步运行时。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::compositor::{CompositorError, EncodedAsset};
use crate::error::AppError;

/// 上传接缝：接收编码好的资产，返回公开地址。
///
/// 失败统一以 `CompositorError::Upload` 报告，调用方不做内部重试。
pub trait AssetUploader: Send + Sync {
    fn upload(
        &self,
        asset: &EncodedAsset,
        name_hint: &str,
    ) -> impl Future<Output = Result<String, CompositorError>> + Send;
}

/// 写入本地目录的上传实现，返回 `file://` 地址。
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(name_hint: &str, extension: &str) -> String {
        let stem: String = name_hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let stem = if stem.is_empty() { "asset".to_string() } else { stem };
        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S%f");
        format!("{}_{}.{}", stem, timestamp, extension)
    }

    fn write_blocking(root: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let dir = ensure_dir(root)?;
        let path = dir.join(file_name);
        fs::write(&path, bytes)?;

        let absolute = fs::canonicalize(&path).unwrap_or(path);
        Ok(absolute)
    }
}

impl AssetUploader for DirectoryUploader {
    async fn upload(&self, asset: &EncodedAsset, name_hint: &str) -> Result<String, CompositorError> {
        let root = self.root.clone();
        let file_name = Self::file_name(name_hint, asset.extension);
        let bytes = asset.bytes.clone();

        let path = tokio::task::spawn_blocking(move || Self::write_blocking(&root, &file_name, &bytes))
            .await
            .map_err(|e| CompositorError::Upload(format!("写入线程执行失败：{}", e)))?
            .map_err(|e| CompositorError::Upload(e.to_string()))?;

        log::info!(
            "💾 素材已写入：{}（{}KB, {}）",
            path.display(),
            asset.bytes.len() / 1024,
            asset.content_type
        );
        Ok(format!("file://{}", path.to_string_lossy()))
    }
}

/// 存储目录信息
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub path: String,
    pub total_size: u64,
    pub file_count: u64,
}

/// 确保目录存在并返回其路径。
pub fn ensure_dir(dir: &Path) -> Result<PathBuf, AppError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Storage(format!("创建目录 '{}' 失败: {}", dir.display(), e))
        })?;
    }
    Ok(dir.to_path_buf())
}

/// 获取目录信息（路径 + 占用大小 + 文件数）
pub fn directory_info(dir: &Path) -> Result<StorageInfo, AppError> {
    let dir = ensure_dir(dir)?;
    let mut total_size: u64 = 0;
    let mut file_count: u64 = 0;

    for entry in fs::read_dir(&dir)?.flatten() {
        if let Ok(metadata) = entry.metadata() {
            if metadata.is_file() {
                total_size += metadata.len();
                file_count += 1;
            }
        }
    }

    Ok(StorageInfo {
        path: dir.to_string_lossy().to_string(),
        total_size,
        file_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::AssetOrigin;

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("compositor_storage_{}_{}", nanos, name))
    }

    fn asset(bytes: Vec<u8>) -> EncodedAsset {
        EncodedAsset {
            bytes,
            content_type: "image/jpeg",
            extension: "jpg",
            width: 800,
            height: 600,
            origin: AssetOrigin::Composed,
        }
    }

    #[tokio::test]
    async fn directory_uploader_writes_file_and_returns_url() {
        let dir = temp_dir("upload");
        let uploader = DirectoryUploader::new(&dir);

        let url = uploader.upload(&asset(vec![1, 2, 3, 4]), "deal").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".jpg"));

        let written = PathBuf::from(url.trim_start_matches("file://"));
        assert_eq!(fs::read(&written).unwrap(), vec![1, 2, 3, 4]);
        assert!(written.file_name().unwrap().to_string_lossy().starts_with("deal_"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn file_name_sanitizes_hint() {
        let name = DirectoryUploader::file_name("hero/../x y", "png");
        assert!(name.starts_with("hero____x_y_"));
        assert!(name.ends_with(".png"));
        assert!(DirectoryUploader::file_name("", "jpg").starts_with("asset_"));
    }

    #[test]
    fn directory_info_counts_files() {
        let dir = temp_dir("info");
        ensure_dir(&dir).unwrap();
        fs::write(dir.join("a.jpg"), [0u8; 10]).unwrap();
        fs::write(dir.join("b.png"), [0u8; 5]).unwrap();
        fs::create_dir_all(dir.join("nested")).unwrap();

        let info = directory_info(&dir).unwrap();
        assert_eq!(info.file_count, 2);
        assert_eq!(info.total_size, 15);

        let _ = fs::remove_dir_all(dir);
    }
}
