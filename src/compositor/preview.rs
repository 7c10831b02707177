//! # 预览画布
//!
//! ## 设计思路
//!
//! 每次参数变化都会触发一次预览渲染，渲染在后台线程异步完成。
//! 快速连续操作时，旧请求可能晚于新请求完成；若直接上屏，画面会被旧帧覆盖。
//!
//! ## 实现思路
//!
//! - 画布持有单调递增的代数计数器（`AtomicU64`），每次渲染前领取一张票据。
//! - 后台任务开始前检查票据是否仍是最新，已过期则直接跳过（取消）。
//! - 结果上屏时在帧锁内再次比对代数，只有最新票据的结果会被接受（忽略过期完成）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbImage;

use super::{CompositionSpec, CompositorError, Placement, TargetSize};

/// 一次渲染请求的代数票据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RenderTicket(u64);

impl RenderTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// 已上屏的预览帧。
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub generation: u64,
    pub image: Arc<RgbImage>,
    /// 该帧使用的参数。
    pub spec: CompositionSpec,
    /// 映射到预览画布尺寸后的布局。
    pub placement: Placement,
}

/// 预览渲染结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// 结果已上屏。
    Presented { generation: u64 },
    /// 已有更新的请求，本次结果被丢弃或未执行。
    Superseded { generation: u64 },
}

#[derive(Debug, Default)]
struct CanvasInner {
    generation: AtomicU64,
    frame: Mutex<Option<PreviewFrame>>,
}

/// 预览画布，可廉价克隆并在后台任务间共享。
#[derive(Debug, Clone, Default)]
pub struct PreviewCanvas {
    inner: Arc<CanvasInner>,
}

impl PreviewCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// 领取新票据，此前所有票据随即过期。
    pub fn issue_ticket(&self) -> RenderTicket {
        RenderTicket(self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: RenderTicket) -> bool {
        self.current_generation() == ticket.0
    }

    /// 提交渲染结果；票据已过期时丢弃并返回 `false`。
    pub(crate) fn present(&self, ticket: RenderTicket, frame: PreviewFrame) -> Result<bool, CompositorError> {
        let mut guard = self
            .inner
            .frame
            .lock()
            .map_err(|_| CompositorError::ResourceLimit("预览帧锁已中毒".to_string()))?;

        if !self.is_current(ticket) {
            return Ok(false);
        }
        if guard.as_ref().is_some_and(|existing| existing.generation >= ticket.0) {
            return Ok(false);
        }

        *guard = Some(frame);
        Ok(true)
    }

    /// 最近一次上屏的帧。
    pub fn latest(&self) -> Option<PreviewFrame> {
        self.inner.frame.lock().ok().and_then(|guard| guard.clone())
    }

    /// 作废所有在途渲染并清空画面（会话取消时调用）。
    pub fn clear(&self) {
        self.issue_ticket();
        if let Ok(mut guard) = self.inner.frame.lock() {
            *guard = None;
        }
    }
}

/// 计算预览画布尺寸：最长边不超过 `max_dimension`，保持目标宽高比，不放大。
pub fn preview_size(target: TargetSize, max_dimension: u32) -> (u32, u32) {
    let longest = target.width.max(target.height);
    if max_dimension == 0 || longest <= max_dimension {
        return (target.width, target.height);
    }

    let ratio = max_dimension as f64 / longest as f64;
    let width = ((target.width as f64 * ratio).round() as u32).max(1);
    let height = ((target.height as f64 * ratio).round() as u32).max(1);
    (width, height)
}
