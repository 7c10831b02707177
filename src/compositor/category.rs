//! # 素材类别与目标尺寸
//!
//! 每个素材类别对应一个固定输出尺寸，上传前所有图片都会被规范到该尺寸。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CompositorError;

/// 目标画布尺寸（像素），宽高均为正整数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Result<Self, CompositorError> {
        if width == 0 || height == 0 {
            return Err(CompositorError::InvalidSpec(format!(
                "目标尺寸必须为正整数：{}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// 判断源图尺寸是否与目标完全一致（命中直传短路）。
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 素材类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Hero,
    Deal,
    Destination,
    Flyer,
    General,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 5] = [
        Self::Hero,
        Self::Deal,
        Self::Destination,
        Self::Flyer,
        Self::General,
    ];

    pub fn target_size(self) -> TargetSize {
        let (width, height) = match self {
            Self::Hero => (1920, 1080),
            Self::Deal => (800, 600),
            Self::Destination => (1200, 800),
            Self::Flyer => (600, 800),
            Self::General => (1200, 800),
        };
        TargetSize { width, height }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Deal => "deal",
            Self::Destination => "destination",
            Self::Flyer => "flyer",
            Self::General => "general",
        }
    }
}

impl FromStr for AssetCategory {
    type Err = CompositorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hero" => Ok(Self::Hero),
            "deal" => Ok(Self::Deal),
            "destination" => Ok(Self::Destination),
            "flyer" => Ok(Self::Flyer),
            "general" | "generic" => Ok(Self::General),
            other => Err(CompositorError::InvalidSpec(format!(
                "未知素材类别：{}（可选：hero / deal / destination / flyer / general）",
                other
            ))),
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
