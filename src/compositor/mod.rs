//! # 图片合成模块（compositor）
//!
//! ## 设计思路
//!
//! 该模块将“来源加载 → 解码校正 → 布局计算 → 预览 / 最终光栅化 → 编码 → 会话流转”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `commands`：仅做入参/出参适配（薄封装）
//! - `session`：单次上传的状态机
//! - `handler`：编排整条处理流水线
//! - `loader`：负责 Base64/文件/字节加载与安全校验
//! - `pipeline`：负责解码、像素限制、光栅化与编码
//! - `placement`：纯几何布局计算，预览与最终输出共用
//! - `preview`：预览画布与代数票据
//! - `category/spec/config/error/source/output`：类别、参数、配置、错误、中间数据模型
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型与命令函数，内部细节保持 `mod` 私有。
//! 几何计算与像素处理分离：`compute_placement` 不触碰像素，可单独做性质测试。
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 命令行 / 调用方
//!    ↓
//! commands.rs（参数适配）
//!    ↓
//! session.rs（状态机：选择 → 调整 → 编码 → 上传）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + 体积/签名校验）
//!    ├─ pipeline.rs（解码 + 方向校正 + 光栅化 + 编码）
//!    │     └─ placement.rs（布局计算）
//!    └─ preview.rs（后发优先的预览画布）
//!    ↓
//! storage::AssetUploader（交给存储方，返回地址）
//! ```
//!
//! ## 分层职责建议
//!
//! - 调用入口变更（命令名/参数）优先改 `commands.rs`
//! - 类别与目标尺寸变更改 `category.rs`
//! - 配置与档位策略变更优先改 `config.rs`
//! - 布局公式只改 `placement.rs`，预览与最终输出会同时生效
//! - 单阶段行为优化分别改 `loader/pipeline/preview`

pub mod commands;
mod category;
mod config;
mod error;
mod handler;
mod loader;
mod output;
mod pipeline;
mod placement;
mod preview;
mod session;
mod source;
mod spec;

pub use category::{AssetCategory, TargetSize};
pub use config::{CompositorConfig, DEFAULT_JPEG_QUALITY, RenderProfile};
pub use error::CompositorError;
pub use handler::{Compositor, PreparedSource};
pub use output::{AssetOrigin, EncodedAsset, OutputFormat};
pub use placement::{Placement, VisibleRect, compute_placement};
pub use preview::{PreviewCanvas, PreviewFrame, PreviewOutcome, RenderTicket, preview_size};
pub use session::{CompositionSession, SessionState};
pub use source::{ImageSource, SourceImage};
pub use spec::{Background, CompositionSpec, DEFAULT_ZOOM, FitMode, MAX_ZOOM, MIN_ZOOM};
