//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载合成链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 错误分两类语义：
//! - 终止性错误（解码 / 格式 / 资源限制）：当前文件作废，用户需重新选择
//! - 可重试错误（编码 / 上传）：会话保持原状态，用户可再次触发

/// 合成链路统一错误类型。
///
/// 该类型会在应用层被上转为 `AppError`，或在命令层转换为 `CommandError`。
#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("参数错误：{0}")]
    InvalidSpec(String),

    #[error("状态错误：{0}")]
    InvalidState(String),

    #[error("上传错误：{0}")]
    Upload(String),
}

impl CompositorError {
    /// 稳定错误码，供命令层与日志使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "E_DECODE",
            Self::Encode(_) => "E_ENCODE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::InvalidSpec(_) => "E_INVALID_SPEC",
            Self::InvalidState(_) => "E_INVALID_STATE",
            Self::Upload(_) => "E_UPLOAD",
        }
    }

    /// 出错阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::FileSystem(_) => "load",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "decode",
            Self::Encode(_) => "encode",
            Self::InvalidSpec(_) => "config",
            Self::InvalidState(_) => "session",
            Self::Upload(_) => "upload",
        }
    }

    /// 是否允许在当前会话内重试（不需要重新选择文件）。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::Upload(_))
    }
}

impl From<CompositorError> for String {
    fn from(error: CompositorError) -> Self {
        error.to_string()
    }
}
