//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)`、`expect()` 等不一致模式。
//!
//! 合成链路内部使用更细的 `CompositorError`，在设置、存储等外围模块汇合为 `AppError`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `CompositorError` 与 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于命令行直接输出。

use serde::Serialize;

use crate::compositor::CompositorError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片合成流水线错误（加载 / 解码 / 编码 / 上传）
    #[error("{0}")]
    Compositor(#[from] CompositorError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件读写或解析失败
    #[error("设置错误: {0}")]
    Settings(String),

    /// 存储目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Compositor(inner) => inner.code(),
            Self::Io(_) => "E_IO",
            Self::Settings(_) => "E_SETTINGS",
            Self::Storage(_) => "E_STORAGE",
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Compositor(inner) => inner.stage(),
            Self::Io(_) | Self::Storage(_) => "storage",
            Self::Settings(_) => "config",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
