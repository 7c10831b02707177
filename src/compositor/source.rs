//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `SourceImage` 表示已解码、已校正方向的 RGBA 像素，由单个会话独占

use std::sync::Arc;

use image::RgbaImage;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 本地文件路径来源。
    FilePath(String),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 内存中的原始字节（例如表单上传）。
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// 按内容判断来源：`data:` 前缀视为 Data URL，否则视为文件路径。
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("data:") {
            Self::Base64(trimmed.to_string())
        } else {
            Self::FilePath(trimmed.to_string())
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
#[derive(Debug, Clone)]
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
    /// 文件签名识别出的 MIME 类型。
    pub(crate) mime_type: &'static str,
    /// 与 MIME 对应的文件扩展名。
    pub(crate) extension: &'static str,
}

/// 解码阶段输出：方向校正后的 RGBA 像素。
///
/// 像素通过 `Arc` 共享给后台渲染任务，克隆本结构不会复制像素。
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub(crate) pixels: Arc<RgbaImage>,
    pub(crate) mime_type: &'static str,
    pub(crate) byte_len: usize,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// 原始文件的 MIME 类型。
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// 原始文件字节数。
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_data_url_from_path() {
        assert!(matches!(
            ImageSource::parse(" data:image/png;base64,AAAA"),
            ImageSource::Base64(_)
        ));
        assert!(matches!(
            ImageSource::parse("/tmp/hero.jpg"),
            ImageSource::FilePath(path) if path == "/tmp/hero.jpg"
        ));
    }
}
