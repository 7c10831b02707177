//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（本地文件 / Base64 / 内存字节）的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - Base64：格式解析 + 解码前体积估算 + 解码后体积限制。
//! - 字节：体积限制。
//! - 三者最后都经过文件签名校验，非图片内容直接拒绝。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::source::RawImageData;
use super::{Compositor, CompositorConfig, CompositorError, ImageSource};

impl Compositor {
    /// 按来源加载原始字节。
    pub(super) fn load_raw(
        source: ImageSource,
        config: &CompositorConfig,
    ) -> Result<RawImageData, CompositorError> {
        match source {
            ImageSource::FilePath(path) => Self::load_from_file(&path, config),
            ImageSource::Base64(data) => Self::load_from_base64(&data, config),
            ImageSource::Bytes(bytes) => Self::load_from_bytes(bytes, config),
        }
    }

    /// 从 Base64 字符串加载图片原始字节。
    pub(super) fn load_from_base64(
        data: &str,
        config: &CompositorConfig,
    ) -> Result<RawImageData, CompositorError> {
        log::info!("📝 开始处理 base64 图片");

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;

        if bytes.len() as u64 > config.max_file_size {
            return Err(CompositorError::ResourceLimit(format!(
                "Base64 解码后体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        Self::into_raw(bytes, "base64")
    }

    /// 从本地路径加载图片原始字节。
    pub(super) fn load_from_file(
        path: &str,
        config: &CompositorConfig,
    ) -> Result<RawImageData, CompositorError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(CompositorError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| CompositorError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > config.max_file_size {
            return Err(CompositorError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| CompositorError::FileSystem(format!("无法读取图片文件：{}", e)))?;

        Self::into_raw(bytes, "file")
    }

    /// 直接使用内存中的字节。
    pub(super) fn load_from_bytes(
        bytes: Vec<u8>,
        config: &CompositorConfig,
    ) -> Result<RawImageData, CompositorError> {
        if bytes.len() as u64 > config.max_file_size {
            return Err(CompositorError::ResourceLimit(format!(
                "图片体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        Self::into_raw(bytes, "bytes")
    }

    fn into_raw(bytes: Vec<u8>, source_hint: &'static str) -> Result<RawImageData, CompositorError> {
        let (mime_type, extension) = Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint,
            mime_type,
            extension,
        })
    }

    #[cfg(test)]
    pub(crate) fn parse_base64(data: &str) -> Result<Vec<u8>, CompositorError> {
        Self::parse_base64_with_limit(data, u64::MAX)
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, CompositorError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| CompositorError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| CompositorError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, CompositorError> {
        let normalized = data.trim();

        let payload = if normalized.starts_with("data:") {
            if !normalized.starts_with("data:image/") {
                return Err(CompositorError::InvalidFormat("Data URL 不是图片类型".to_string()));
            }
            let base64_start = normalized
                .find(";base64,")
                .ok_or_else(|| CompositorError::InvalidFormat("缺少 base64 标记".to_string()))?;
            &normalized[base64_start + 8..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(CompositorError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| CompositorError::Decode(format!("Base64 解码失败：{}", e)))
    }

    /// 通过文件签名确认是图片，返回 `(mime, 扩展名)`。
    fn validate_image_signature(bytes: &[u8]) -> Result<(&'static str, &'static str), CompositorError> {
        if bytes.is_empty() {
            return Err(CompositorError::InvalidFormat("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| CompositorError::InvalidFormat("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(CompositorError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok((kind.mime_type(), kind.extension()))
    }
}
