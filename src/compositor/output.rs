//! # 输出模型
//!
//! 编码格式与最终交给上传方的字节包。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CompositorError, config::DEFAULT_JPEG_QUALITY};

/// 最终输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputFormat {
    /// 基线 JPEG，`quality` 取 1~100。
    Jpeg { quality: u8 },
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl OutputFormat {
    /// 按名称解析，JPEG 使用传入质量。
    pub fn parse(name: &str, jpeg_quality: u8) -> Result<Self, CompositorError> {
        match name.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg {
                quality: jpeg_quality,
            }),
            "png" => Ok(Self::Png),
            other => Err(CompositorError::InvalidSpec(format!(
                "未知输出格式：{}（可选：jpeg / png）",
                other
            ))),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg { quality } => write!(f, "jpeg(q={})", quality),
            Self::Png => f.write_str("png"),
        }
    }
}

/// 资产来源：原样直传或经过合成。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetOrigin {
    Passthrough,
    Composed,
}

/// 可以直接交给上传方的编码结果。
#[derive(Debug, Clone)]
pub struct EncodedAsset {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
    pub origin: AssetOrigin,
}

impl EncodedAsset {
    pub fn is_passthrough(&self) -> bool {
        self.origin == AssetOrigin::Passthrough
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_jpeg_92() {
        assert_eq!(OutputFormat::default(), OutputFormat::Jpeg { quality: 92 });
        assert_eq!(OutputFormat::default().content_type(), "image/jpeg");
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(OutputFormat::parse("JPG", 80).unwrap(), OutputFormat::Jpeg { quality: 80 });
        assert_eq!(OutputFormat::parse("png", 80).unwrap(), OutputFormat::Png);
        assert!(OutputFormat::parse("webp", 80).is_err());
    }
}
