//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层仅做参数接收与结果返回，不承载业务逻辑。
//! 所有实际处理交由 `Compositor` / `CompositionSession`，保持命令函数薄、稳定、易测试。
//! 错误统一转换为 `{code, stage, message}`，方便命令行按 JSON 输出。

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{
    AssetCategory, Background, CompositionSession, Compositor, CompositorError, FitMode,
    ImageSource, OutputFormat, Placement, RenderProfile, SessionState, TargetSize, compute_placement,
};
use crate::error::AppError;
use crate::storage::AssetUploader;

#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<CompositorError> for CommandError {
    fn from(error: CompositorError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Compositor(inner) => inner.into(),
            other => Self {
                code: other.code(),
                stage: other.stage(),
                message: other.to_string(),
            },
        }
    }
}

/// 用户可调的变换参数。
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformArgs {
    pub fit_mode: Option<FitMode>,
    pub zoom: Option<f64>,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// 一次完整合成请求。
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub input: String,
    pub target: TargetSize,
    pub category: Option<AssetCategory>,
    pub transform: TransformArgs,
    pub background: Option<Background>,
    pub format: Option<OutputFormat>,
    /// 额外保存一张预览 PNG（仅需要合成时生效）。
    pub preview_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposeResponse {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub passthrough: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacementResponse {
    pub source_width: u32,
    pub source_height: u32,
    pub target: TargetSize,
    pub fit_mode: FitMode,
    pub zoom: f64,
    pub offset_x: i32,
    pub offset_y: i32,
    pub placement: Placement,
    pub covers_canvas: bool,
    pub fits_within_canvas: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

/// 选择 → 调整 → 编码 → 上传，一次走完会话。
pub async fn compose<U>(
    compositor: &Compositor,
    uploader: &U,
    request: ComposeRequest,
) -> Result<ComposeResponse, CommandError>
where
    U: AssetUploader,
{
    let mut session = CompositionSession::new(compositor.clone());
    let source = ImageSource::parse(&request.input);

    let state = match request.category {
        Some(category) if category.target_size() == request.target => {
            session.select_category(source, category).await?
        }
        _ => session.select(source, request.target).await?,
    };

    let mut passthrough = true;
    if state == SessionState::Compositing {
        passthrough = false;
        let TransformArgs {
            fit_mode,
            zoom,
            offset_x,
            offset_y,
        } = request.transform;
        let background = request.background;

        let preview = session.update(|spec| {
            let spec = spec
                .with_fit_mode(fit_mode.unwrap_or_default())
                .with_zoom(zoom.unwrap_or(1.0))
                .with_offset(offset_x, offset_y);
            match background {
                Some(background) => spec.with_background(background),
                None => spec,
            }
        })?;
        preview
            .await
            .map_err(|e| CompositorError::Encode(format!("预览任务执行失败：{}", e)))??;

        if let Some(path) = request.preview_path.as_ref() {
            save_preview(&session, path)?;
        }

        let format = match request.format {
            Some(format) => format,
            None => compositor.default_output_format()?,
        };
        session.encode(format).await?;
    } else if request.preview_path.is_some() {
        log::info!("⏭️ 尺寸已一致，无需预览");
    }

    let Some(asset) = session.asset() else {
        return Err(CompositorError::InvalidState("会话没有可上传的资产".to_string()).into());
    };
    let (width, height, content_type) = (asset.width, asset.height, asset.content_type);

    let url = session.upload(uploader).await?.to_string();

    Ok(ComposeResponse {
        url,
        width,
        height,
        content_type,
        passthrough,
    })
}

fn save_preview(session: &CompositionSession, path: &Path) -> Result<(), CompositorError> {
    let Some(frame) = session.canvas().latest() else {
        return Err(CompositorError::InvalidState("没有可保存的预览帧".to_string()));
    };

    frame
        .image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| CompositorError::FileSystem(format!("保存预览失败 {}：{}", path.display(), e)))?;
    log::info!("🖼️ 预览已保存：{}", path.display());
    Ok(())
}

/// 纯布局计算，不涉及任何像素。
pub fn placement(
    source_width: u32,
    source_height: u32,
    target: TargetSize,
    transform: TransformArgs,
) -> PlacementResponse {
    let spec = super::CompositionSpec::new(target)
        .with_fit_mode(transform.fit_mode.unwrap_or_default())
        .with_zoom(transform.zoom.unwrap_or(1.0))
        .with_offset(transform.offset_x, transform.offset_y);
    let placement = compute_placement(source_width, source_height, &spec);

    PlacementResponse {
        source_width,
        source_height,
        target,
        fit_mode: spec.fit_mode(),
        zoom: spec.zoom(),
        offset_x: spec.offset_x(),
        offset_y: spec.offset_y(),
        covers_canvas: placement.covers(target.width as f64, target.height as f64),
        fits_within_canvas: placement.fits_within(target.width as f64, target.height as f64),
        placement,
    }
}

pub fn list_categories() -> Vec<CategoryInfo> {
    AssetCategory::ALL
        .iter()
        .map(|category| {
            let size = category.target_size();
            CategoryInfo {
                name: category.as_str(),
                width: size.width,
                height: size.height,
            }
        })
        .collect()
}

/// 切换预览渲染档位。
pub fn set_render_profile(compositor: &Compositor, profile: &str) -> Result<(), CommandError> {
    let profile = RenderProfile::from_str(profile)?;
    compositor.set_render_profile(profile)?;
    Ok(())
}

/// 查询当前生效档位。
pub fn get_render_profile(compositor: &Compositor) -> Result<&'static str, CommandError> {
    Ok(compositor.get_render_profile()?.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::EncodedAsset;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    struct EchoUploader;

    impl AssetUploader for EchoUploader {
        async fn upload(&self, asset: &EncodedAsset, name_hint: &str) -> Result<String, CompositorError> {
            Ok(format!("mem://{}/{}", name_hint, asset.bytes.len()))
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba([10u8, 20, 30, 255]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("compositor_cmd_{}_{}", nanos, name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn compose_runs_whole_session_and_writes_preview() {
        let input = temp_file("input.png", &png_bytes(500, 500));
        let preview = std::env::temp_dir().join(format!(
            "compositor_cmd_preview_{}.png",
            std::process::id()
        ));

        let response = compose(
            &Compositor::default(),
            &EchoUploader,
            ComposeRequest {
                input: input.to_string_lossy().to_string(),
                target: AssetCategory::Hero.target_size(),
                category: Some(AssetCategory::Hero),
                transform: TransformArgs::default(),
                background: None,
                format: None,
                preview_path: Some(preview.clone()),
            },
        )
        .await
        .unwrap();

        assert!(!response.passthrough);
        assert_eq!((response.width, response.height), (1920, 1080));
        assert_eq!(response.content_type, "image/jpeg");
        assert!(response.url.starts_with("mem://hero/"));

        let preview_image = image::open(&preview).unwrap();
        assert_eq!((preview_image.width(), preview_image.height()), (960, 540));

        let _ = std::fs::remove_file(input);
        let _ = std::fs::remove_file(preview);
    }

    #[tokio::test]
    async fn compose_reports_structured_error() {
        let err = compose(
            &Compositor::default(),
            &EchoUploader,
            ComposeRequest {
                input: "/definitely/not/here.png".to_string(),
                target: AssetCategory::Deal.target_size(),
                category: None,
                transform: TransformArgs::default(),
                background: None,
                format: None,
                preview_path: None,
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, "E_FILE_SYSTEM");
        assert_eq!(err.stage, "load");
    }

    #[test]
    fn placement_reports_cover_geometry() {
        let response = placement(4000, 3000, AssetCategory::Hero.target_size(), TransformArgs::default());
        assert!((response.placement.dw - 1920.0).abs() < 1e-6);
        assert!((response.placement.dh - 1440.0).abs() < 1e-6);
        assert!((response.placement.dy + 180.0).abs() < 1e-6);
        assert!(response.covers_canvas);
        assert!(!response.fits_within_canvas);
    }

    #[test]
    fn categories_list_every_target() {
        let categories = list_categories();
        assert_eq!(categories.len(), AssetCategory::ALL.len());
        assert!(categories.iter().any(|c| c.name == "deal" && c.width == 800 && c.height == 600));
    }

    #[test]
    fn unknown_profile_maps_to_config_error() {
        let err = set_render_profile(&Compositor::default(), "turbo").unwrap_err();
        assert_eq!(err.code, "E_INVALID_SPEC");
    }
}
