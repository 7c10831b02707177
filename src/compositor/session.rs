//! # 合成会话状态机
//!
//! ## 设计思路
//!
//! 一次上传对应一个会话，状态流转：
//!
//! ```text
//! Idle -> FileSelected -> (尺寸一致? ReadyToUpload : Compositing)
//!      Compositing -> Encoding -> ReadyToUpload -> Uploaded
//! ```
//!
//! - 源图像素只在 `Compositing / Encoding` 期间存在，由会话独占。
//! - 参数变化以整值替换 `CompositionSpec`，随后调度一次预览。
//! - 编码失败回到 `Compositing`（可重试）；解码失败回到 `Idle`（该文件作废）。
//! - 上传失败不内部重试，资产保持可上传状态。
//!
//! ## 实现思路
//!
//! 状态用无数据的枚举对外报告，会话数据以 `Option` 字段保存，
//! 每次转换集中在 `transition` 中记录日志。

use serde::Serialize;
use tokio::task::JoinHandle;

use super::{
    AssetCategory, CompositionSpec, Compositor, CompositorError, EncodedAsset, ImageSource,
    OutputFormat, PreparedSource, PreviewCanvas, PreviewOutcome, SourceImage, TargetSize,
};
use crate::storage::AssetUploader;

/// 会话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    FileSelected,
    Compositing,
    Encoding,
    ReadyToUpload,
    Uploaded,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FileSelected => "file_selected",
            Self::Compositing => "compositing",
            Self::Encoding => "encoding",
            Self::ReadyToUpload => "ready_to_upload",
            Self::Uploaded => "uploaded",
        }
    }
}

enum PreparedSelection {
    Ready(EncodedAsset),
    Compose(SourceImage, CompositionSpec),
}

/// 单次上传的合成会话。
#[derive(Debug)]
pub struct CompositionSession {
    compositor: Compositor,
    canvas: PreviewCanvas,
    state: SessionState,
    category: Option<AssetCategory>,
    target: Option<TargetSize>,
    source: Option<SourceImage>,
    spec: Option<CompositionSpec>,
    asset: Option<EncodedAsset>,
    url: Option<String>,
}

impl CompositionSession {
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            canvas: PreviewCanvas::new(),
            state: SessionState::Idle,
            category: None,
            target: None,
            source: None,
            spec: None,
            asset: None,
            url: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 当前合成参数（仅 `Compositing / Encoding` 时存在）。
    pub fn spec(&self) -> Option<CompositionSpec> {
        self.spec
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    /// 可上传的资产（仅 `ReadyToUpload` 时存在）。
    pub fn asset(&self) -> Option<&EncodedAsset> {
        self.asset.as_ref()
    }

    /// 上传后返回的地址。
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn target(&self) -> Option<TargetSize> {
        self.target
    }

    pub fn canvas(&self) -> &PreviewCanvas {
        &self.canvas
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::debug!("🔄 会话状态：{} -> {}", self.state.as_str(), next.as_str());
        }
        self.state = next;
    }

    fn invalid_state(&self, operation: &str) -> CompositorError {
        CompositorError::InvalidState(format!(
            "当前状态 {} 不允许执行 {}",
            self.state.as_str(),
            operation
        ))
    }

    fn release(&mut self) {
        self.canvas.clear();
        self.source = None;
        self.spec = None;
        self.asset = None;
    }

    /// 按类别选择文件：目标尺寸与背景色取自类别。
    pub async fn select_category(
        &mut self,
        source: ImageSource,
        category: AssetCategory,
    ) -> Result<SessionState, CompositorError> {
        self.select_inner(source, category.target_size(), Some(category)).await
    }

    /// 选择文件并指定目标尺寸。
    ///
    /// 尺寸已一致时直接进入 `ReadyToUpload`，原始字节不做任何处理。
    pub async fn select(
        &mut self,
        source: ImageSource,
        target: TargetSize,
    ) -> Result<SessionState, CompositorError> {
        self.select_inner(source, target, None).await
    }

    async fn select_inner(
        &mut self,
        source: ImageSource,
        target: TargetSize,
        category: Option<AssetCategory>,
    ) -> Result<SessionState, CompositorError> {
        match self.state {
            SessionState::Idle
            | SessionState::FileSelected
            | SessionState::ReadyToUpload
            | SessionState::Uploaded => {}
            _ => return Err(self.invalid_state("select")),
        }

        self.release();
        self.url = None;
        self.category = category;
        self.target = Some(target);
        self.transition(SessionState::FileSelected);

        let prepared = match self.compositor.prepare_source(source, target).await {
            Ok(PreparedSource::NeedsComposition(image)) => self
                .compositor
                .initial_spec(target, category)
                .map(|spec| PreparedSelection::Compose(image, spec)),
            Ok(PreparedSource::Passthrough(asset)) => Ok(PreparedSelection::Ready(asset)),
            Err(err) => Err(err),
        };

        match prepared {
            Ok(PreparedSelection::Ready(asset)) => {
                self.asset = Some(asset);
                self.transition(SessionState::ReadyToUpload);
            }
            Ok(PreparedSelection::Compose(image, spec)) => {
                self.source = Some(image);
                self.spec = Some(spec);
                self.transition(SessionState::Compositing);
            }
            Err(err) => {
                log::warn!("❌ 文件不可用，会话回到初始状态：{}", err);
                self.target = None;
                self.category = None;
                self.transition(SessionState::Idle);
                return Err(err);
            }
        }

        Ok(self.state)
    }

    /// 整值替换合成参数并调度预览，之前的在途预览作废。
    ///
    /// 目标尺寸在会话内固定，更换目标需要重新选择。
    pub fn update<F>(&mut self, change: F) -> Result<JoinHandle<Result<PreviewOutcome, CompositorError>>, CompositorError>
    where
        F: FnOnce(CompositionSpec) -> CompositionSpec,
    {
        if self.state != SessionState::Compositing {
            return Err(self.invalid_state("update"));
        }
        let (Some(source), Some(current)) = (self.source.as_ref(), self.spec) else {
            return Err(self.invalid_state("update"));
        };

        let next = change(current);
        if next.target() != current.target() {
            return Err(CompositorError::InvalidSpec(format!(
                "会话目标尺寸固定为 {}，不能改为 {}",
                current.target(),
                next.target()
            )));
        }

        let handle = self.compositor.schedule_preview(&self.canvas, source, &next)?;
        self.spec = Some(next);
        Ok(handle)
    }

    /// 按当前参数渲染预览并等待结果。
    pub async fn render_preview(&self) -> Result<PreviewOutcome, CompositorError> {
        if self.state != SessionState::Compositing {
            return Err(self.invalid_state("render_preview"));
        }
        let (Some(source), Some(spec)) = (self.source.as_ref(), self.spec.as_ref()) else {
            return Err(self.invalid_state("render_preview"));
        };

        self.compositor.render_preview(&self.canvas, source, spec).await
    }

    /// 全分辨率编码；失败时回到 `Compositing`，参数与源图保留。
    pub async fn encode(&mut self, format: OutputFormat) -> Result<&EncodedAsset, CompositorError> {
        if self.state != SessionState::Compositing {
            return Err(self.invalid_state("encode"));
        }
        let (Some(source), Some(spec)) = (self.source.clone(), self.spec) else {
            return Err(self.invalid_state("encode"));
        };

        self.transition(SessionState::Encoding);
        match self.compositor.encode_final(&source, &spec, format).await {
            Ok(asset) => {
                self.release();
                self.transition(SessionState::ReadyToUpload);
                Ok(&*self.asset.insert(asset))
            }
            Err(err) => {
                log::warn!("⚠️ 编码失败，可调整后重试：{}", err);
                self.transition(SessionState::Compositing);
                Err(err)
            }
        }
    }

    /// 交给上传方；失败不重试，资产保持可上传。
    pub async fn upload<U>(&mut self, uploader: &U) -> Result<&str, CompositorError>
    where
        U: AssetUploader,
    {
        if self.state != SessionState::ReadyToUpload {
            return Err(self.invalid_state("upload"));
        }
        let Some(asset) = self.asset.as_ref() else {
            return Err(self.invalid_state("upload"));
        };

        let name_hint = self.category.map_or("custom", AssetCategory::as_str);
        let url = uploader.upload(asset, name_hint).await.map_err(|err| match err {
            CompositorError::Upload(_) => err,
            other => CompositorError::Upload(other.to_string()),
        })?;

        log::info!("☁️ 上传完成：{}", url);
        self.asset = None;
        self.transition(SessionState::Uploaded);
        Ok(self.url.insert(url).as_str())
    }

    /// 放弃当前会话，释放源图与预览。
    pub fn cancel(&mut self) -> Result<(), CompositorError> {
        if self.state == SessionState::Uploaded {
            return Err(self.invalid_state("cancel"));
        }

        self.release();
        self.category = None;
        self.target = None;
        self.transition(SessionState::Idle);
        Ok(())
    }
}
