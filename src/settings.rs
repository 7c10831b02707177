//! 设置文件模块
//!
//! # 设计思路
//!
//! 设置以 JSON 文件持久化，字段缺失时取默认值，
//! 旧版本设置文件可以直接被新版本读取。
//!
//! # 实现思路
//!
//! - `#[serde(default)]` 让每个字段独立回退默认值。
//! - 文件不存在视为“尚未保存过”，返回默认设置而不是错误。
//! - 保存时自动创建父目录，并以 pretty JSON 写出便于手工编辑。
//! - `apply_to` 把设置落到 `CompositorConfig`，非法值在这里统一拒绝。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compositor::{AssetCategory, Background, CompositorConfig, DEFAULT_JPEG_QUALITY, RenderProfile};
use crate::error::AppError;

/// 持久化的应用设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// 预览渲染档位：`quality` / `balanced` / `speed`。
    pub profile: String,
    pub jpeg_quality: u8,
    /// 全局背景色，`#rrggbb`。
    pub background: String,
    /// 按类别覆盖的背景色。
    pub category_backgrounds: HashMap<AssetCategory, String>,
    /// 本地上传目录；为空时由调用方决定。
    pub output_dir: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            profile: RenderProfile::Balanced.as_str().to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            background: Background::BLACK.to_string(),
            category_backgrounds: HashMap::new(),
            output_dir: None,
        }
    }
}

impl AppSettings {
    /// 读取设置文件；文件不存在时返回默认设置。
    pub fn load_from_path(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::info!("📄 设置文件不存在，使用默认设置：{}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str::<Self>(&content)
            .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AppError::Storage(format!("创建设置目录失败: {}", e)))?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 将设置应用到合成配置。
    pub fn apply_to(&self, config: &mut CompositorConfig) -> Result<(), AppError> {
        let profile = RenderProfile::from_str(&self.profile)?;
        let jpeg_quality = CompositorConfig::validate_jpeg_quality(self.jpeg_quality)?;
        let background = self.background.parse::<Background>()?;

        let mut category_backgrounds = HashMap::with_capacity(self.category_backgrounds.len());
        for (category, color) in &self.category_backgrounds {
            category_backgrounds.insert(*category, color.parse::<Background>()?);
        }

        config.apply_render_profile(profile);
        config.jpeg_quality = jpeg_quality;
        config.background = background;
        config.category_backgrounds = category_backgrounds;
        Ok(())
    }
}
