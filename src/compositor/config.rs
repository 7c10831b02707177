//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `CompositorConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中渲染档位（quality / balanced / speed）作为高层语义，映射到预览尺寸与滤镜组合。
//! 最终编码始终使用高质量滤镜，档位只影响交互预览。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - `RenderProfile` 负责档位字符串解析与反向输出。
//! - `apply_render_profile` 将档位转换为具体参数。
//! - `infer_render_profile` 用于从当前配置反推档位（给调用方展示状态）。
//! - 背景色支持按素材类别覆盖，未覆盖时使用全局背景（默认黑色）。

use std::collections::HashMap;

use image::imageops::FilterType;

use super::{AssetCategory, Background, CompositorError};

pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// 合成器配置。
///
/// 字段覆盖了读取、解码、预览、编码四个阶段。
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 预览画布最长边（像素），目标尺寸更大时等比缩小显示。
    pub preview_max_dimension: u32,
    /// 预览重采样滤镜。
    pub preview_filter: FilterType,
    /// 最终编码重采样滤镜。
    pub final_filter: FilterType,
    /// JPEG 编码质量（1~100）。
    pub jpeg_quality: u8,
    /// 全局背景色（contain / 缩小时的留白填充）。
    pub background: Background,
    /// 按类别覆盖的背景色。
    pub category_backgrounds: HashMap<AssetCategory, Background>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            preview_max_dimension: 960,
            preview_filter: FilterType::Triangle,
            final_filter: FilterType::Lanczos3,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            background: Background::BLACK,
            category_backgrounds: HashMap::new(),
        }
    }
}

/// 预览渲染档位。
///
/// - `Quality`：大尺寸、高质量滤镜
/// - `Balanced`：质量与响应速度平衡
/// - `Speed`：小尺寸、最近邻采样，拖动滑块时最流畅
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderProfile {
    Quality,
    Balanced,
    Speed,
}

impl RenderProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use asset_compositor::compositor::RenderProfile;
    ///
    /// let p = RenderProfile::from_str("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), asset_compositor::compositor::CompositorError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, CompositorError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(CompositorError::InvalidSpec(format!(
                "未知渲染档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供设置文件持久化与展示。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl CompositorConfig {
    /// 基于当前参数反推渲染档位。
    pub fn infer_render_profile(&self) -> RenderProfile {
        if self.preview_max_dimension >= 1920 && self.preview_filter == FilterType::Lanczos3 {
            return RenderProfile::Quality;
        }

        if self.preview_max_dimension <= 640 || self.preview_filter == FilterType::Nearest {
            return RenderProfile::Speed;
        }

        RenderProfile::Balanced
    }

    /// 应用指定渲染档位到实际参数。
    pub fn apply_render_profile(&mut self, profile: RenderProfile) {
        match profile {
            RenderProfile::Quality => {
                self.preview_max_dimension = 1920;
                self.preview_filter = FilterType::Lanczos3;
            }
            RenderProfile::Balanced => {
                self.preview_max_dimension = 960;
                self.preview_filter = FilterType::Triangle;
            }
            RenderProfile::Speed => {
                self.preview_max_dimension = 640;
                self.preview_filter = FilterType::Nearest;
            }
        }
    }

    /// 解析某类别实际使用的背景色。
    pub fn background_for(&self, category: Option<AssetCategory>) -> Background {
        category
            .and_then(|c| self.category_backgrounds.get(&c).copied())
            .unwrap_or(self.background)
    }

    /// 校验 JPEG 质量参数。
    pub fn validate_jpeg_quality(quality: u8) -> Result<u8, CompositorError> {
        if !(1..=100).contains(&quality) {
            return Err(CompositorError::InvalidSpec(format!(
                "JPEG 质量必须在 1~100 之间：{}",
                quality
            )));
        }
        Ok(quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_balanced() {
        let config = CompositorConfig::default();
        assert_eq!(config.infer_render_profile(), RenderProfile::Balanced);
        assert_eq!(config.jpeg_quality, 92);
        assert_eq!(config.background, Background::BLACK);
    }

    #[test]
    fn profile_apply_and_infer_roundtrip() {
        let mut config = CompositorConfig::default();
        for profile in [RenderProfile::Quality, RenderProfile::Speed, RenderProfile::Balanced] {
            config.apply_render_profile(profile);
            assert_eq!(config.infer_render_profile(), profile);
        }
    }

    #[test]
    fn unknown_profile_is_rejected() {
        assert!(matches!(
            RenderProfile::from_str("ultra"),
            Err(CompositorError::InvalidSpec(_))
        ));
        assert_eq!(RenderProfile::from_str(" SPEED ").unwrap(), RenderProfile::Speed);
    }

    #[test]
    fn category_background_overrides_global() {
        let mut config = CompositorConfig::default();
        config
            .category_backgrounds
            .insert(AssetCategory::Flyer, Background::rgb(255, 255, 255));

        assert_eq!(config.background_for(Some(AssetCategory::Flyer)), Background::rgb(255, 255, 255));
        assert_eq!(config.background_for(Some(AssetCategory::Hero)), Background::BLACK);
        assert_eq!(config.background_for(None), Background::BLACK);
    }

    #[test]
    fn jpeg_quality_bounds() {
        assert!(CompositorConfig::validate_jpeg_quality(0).is_err());
        assert!(CompositorConfig::validate_jpeg_quality(101).is_err());
        assert_eq!(CompositorConfig::validate_jpeg_quality(92).unwrap(), 92);
    }
}
