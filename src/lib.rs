//! # 素材合成工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 调用方（命令行 / 后台服务）               │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<T, CommandError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            库 (Rust)                             │
//! │                                                          │
//! │  ┌─ compositor ─── 加载·解码·布局·预览·编码·会话          │
//! │  │   └─ commands    {code, stage, message} 适配          │
//! │  │                                                       │
//! │  ├─ settings ───── JSON 设置文件 → CompositorConfig      │
//! │  ├─ storage ────── AssetUploader 接缝 / 目录实现         │
//! │  └─ error ──────── AppError (统一错误类型)                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`compositor`] | 按类别目标尺寸合成素材：cover / contain / stretch、缩放平移、预览、JPEG 输出 |
//! | [`settings`] | 设置文件的读取、保存与应用 |
//! | [`storage`] | 上传接缝 `AssetUploader`、本地目录实现与目录统计 |
//! | [`error`] | 统一错误类型 `AppError` |

pub mod error;
pub mod compositor;
pub mod storage;
pub mod settings;
