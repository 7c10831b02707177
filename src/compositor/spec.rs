//! # 合成参数模型
//!
//! ## 设计思路
//!
//! 缩放、平移、适配模式不再作为分散的可变字段存在，而是收拢为一个不可变的
//! `CompositionSpec` 值。每次参数变化都生成新值并整体替换，
//! 这样布局计算天然是纯函数，测试无需真实画布。
//!
//! ## 实现思路
//!
//! - 目标尺寸在构造时确定，之后不提供修改入口。
//! - `with_*` 方法返回新值，并把输入收敛到合法区间（对齐滑块取值范围）。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{CompositorError, TargetSize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 3.0;
pub const DEFAULT_ZOOM: f64 = 1.0;

/// 源图映射到目标画布的策略。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// 等比放大至铺满画布，溢出部分裁掉。
    #[default]
    Cover,
    /// 等比缩放至完整可见，空白处填充背景色。
    Contain,
    /// 直接拉伸到画布尺寸，忽略宽高比。
    Stretch,
}

impl FitMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Contain => "contain",
            Self::Stretch => "stretch",
        }
    }
}

impl FromStr for FitMode {
    type Err = CompositorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cover" => Ok(Self::Cover),
            "contain" => Ok(Self::Contain),
            "stretch" => Ok(Self::Stretch),
            other => Err(CompositorError::InvalidSpec(format!(
                "未知适配模式：{}（可选：cover / contain / stretch）",
                other
            ))),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 画布背景色（不透明 sRGB）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Background {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Background {
    pub const BLACK: Background = Background { r: 0, g: 0, b: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_pixel(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }
}

impl FromStr for Background {
    type Err = CompositorError;

    /// 支持 `#rrggbb` 与 `rrggbb`。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || CompositorError::InvalidSpec(format!("无效背景色：{}", s));

        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };

        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// 一次合成会话的全部参数。
///
/// 字段只读；需要变化时通过 `with_*` 得到新值。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositionSpec {
    target: TargetSize,
    fit_mode: FitMode,
    zoom: f64,
    offset_x: i32,
    offset_y: i32,
    background: Background,
}

impl CompositionSpec {
    /// 以默认参数（cover / 1.0 / 无偏移 / 黑色背景）创建。
    pub fn new(target: TargetSize) -> Self {
        Self {
            target,
            fit_mode: FitMode::default(),
            zoom: DEFAULT_ZOOM,
            offset_x: 0,
            offset_y: 0,
            background: Background::BLACK,
        }
    }

    pub fn target(&self) -> TargetSize {
        self.target
    }

    pub fn fit_mode(&self) -> FitMode {
        self.fit_mode
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn offset_x(&self) -> i32 {
        self.offset_x
    }

    pub fn offset_y(&self) -> i32 {
        self.offset_y
    }

    pub fn background(&self) -> Background {
        self.background
    }

    pub fn with_fit_mode(self, fit_mode: FitMode) -> Self {
        Self { fit_mode, ..self }
    }

    /// 缩放收敛到 `[0.1, 3.0]`；非有限值回到默认 1.0。
    pub fn with_zoom(self, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            DEFAULT_ZOOM
        };
        Self { zoom, ..self }
    }

    /// 偏移分别收敛到 `[-width, width]` 与 `[-height, height]`。
    pub fn with_offset(self, offset_x: i32, offset_y: i32) -> Self {
        let max_x = i32::try_from(self.target.width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(self.target.height).unwrap_or(i32::MAX);
        Self {
            offset_x: offset_x.clamp(-max_x, max_x),
            offset_y: offset_y.clamp(-max_y, max_y),
            ..self
        }
    }

    pub fn with_background(self, background: Background) -> Self {
        Self { background, ..self }
    }

    /// 恢复缩放与偏移为默认值，保留模式与背景。
    pub fn reset_transform(self) -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            offset_x: 0,
            offset_y: 0,
            ..self
        }
    }
}
