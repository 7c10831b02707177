//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `Compositor` 只负责流程编排与配置管理，不关心上传与持久化。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 按来源加载原始字节
//! 3. 读取尺寸：与目标一致则原样直传，否则解码
//! 4. 交互预览（可重复、后发优先）
//! 5. 全分辨率光栅化并编码
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<CompositorConfig>>` 支持运行时动态切档。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 解码、光栅化、编码均放到 `spawn_blocking`，调用方 `await` 时不阻塞事件循环。
//! - 记录 `load/decode/render/encode` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::task::JoinHandle;

use super::placement::compute_placement;
use super::preview::{PreviewFrame, PreviewOutcome, preview_size};
use super::{
    AssetCategory, AssetOrigin, Background, CompositionSpec, CompositorConfig, CompositorError,
    EncodedAsset, ImageSource, OutputFormat, PreviewCanvas, RenderProfile, SourceImage, TargetSize,
};

/// 选择文件后的准备结果。
#[derive(Debug, Clone)]
pub enum PreparedSource {
    /// 尺寸已与目标一致，原始字节直接可上传。
    Passthrough(EncodedAsset),
    /// 需要进入交互合成。
    NeedsComposition(SourceImage),
}

/// 图片合成器。
///
/// 可廉价克隆，克隆体共享同一份配置。
#[derive(Debug, Clone)]
pub struct Compositor {
    pub(super) config: Arc<RwLock<CompositorConfig>>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

impl Compositor {
    /// 根据初始配置创建合成器。
    ///
    /// # 示例
    /// ```rust
    /// use asset_compositor::compositor::{Compositor, CompositorConfig};
    ///
    /// let compositor = Compositor::new(CompositorConfig::default());
    /// assert_eq!(compositor.get_render_profile()?.as_str(), "balanced");
    /// # Ok::<(), asset_compositor::compositor::CompositorError>(())
    /// ```
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<CompositorConfig, CompositorError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| CompositorError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    fn update_config<F>(&self, apply: F) -> Result<(), CompositorError>
    where
        F: FnOnce(&mut CompositorConfig),
    {
        let mut config = self
            .config
            .write()
            .map_err(|_| CompositorError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        apply(&mut config);
        Ok(())
    }

    /// 设置渲染档位。
    pub fn set_render_profile(&self, profile: RenderProfile) -> Result<(), CompositorError> {
        self.update_config(|config| {
            config.apply_render_profile(profile);
            log::info!(
                "⚙️ 已切换预览渲染档位：{:?}（max_dim={}, filter={:?}）",
                profile,
                config.preview_max_dimension,
                config.preview_filter
            );
        })
    }

    /// 获取当前生效档位。
    pub fn get_render_profile(&self) -> Result<RenderProfile, CompositorError> {
        Ok(self.config_snapshot()?.infer_render_profile())
    }

    /// 设置读取与解码的资源上限。
    pub fn set_limits(
        &self,
        max_file_size: u64,
        max_decoded_pixels: u64,
        max_decoded_bytes: u64,
    ) -> Result<(), CompositorError> {
        if max_file_size < 64 * 1024 {
            return Err(CompositorError::InvalidSpec("max_file_size 不能小于 64KB".to_string()));
        }
        if max_decoded_pixels < 1_000_000 {
            return Err(CompositorError::InvalidSpec("max_decoded_pixels 不能小于 1MP".to_string()));
        }
        if max_decoded_bytes < 8 * 1024 * 1024 {
            return Err(CompositorError::InvalidSpec("max_decoded_bytes 不能小于 8MB".to_string()));
        }

        self.update_config(|config| {
            config.max_file_size = max_file_size;
            config.max_decoded_pixels = max_decoded_pixels;
            config.max_decoded_bytes = max_decoded_bytes;
        })
    }

    /// 设置默认 JPEG 质量。
    pub fn set_jpeg_quality(&self, quality: u8) -> Result<(), CompositorError> {
        let quality = CompositorConfig::validate_jpeg_quality(quality)?;
        self.update_config(|config| config.jpeg_quality = quality)
    }

    /// 设置背景色；`category` 为 `None` 时修改全局背景。
    pub fn set_background(
        &self,
        category: Option<AssetCategory>,
        background: Background,
    ) -> Result<(), CompositorError> {
        self.update_config(|config| match category {
            Some(category) => {
                config.category_backgrounds.insert(category, background);
            }
            None => config.background = background,
        })
    }

    /// 按配置默认值构造某次会话的初始参数。
    pub fn initial_spec(
        &self,
        target: TargetSize,
        category: Option<AssetCategory>,
    ) -> Result<CompositionSpec, CompositorError> {
        let background = self.config_snapshot()?.background_for(category);
        Ok(CompositionSpec::new(target).with_background(background))
    }

    /// 默认输出格式（JPEG + 配置质量）。
    pub fn default_output_format(&self) -> Result<OutputFormat, CompositorError> {
        Ok(OutputFormat::Jpeg {
            quality: self.config_snapshot()?.jpeg_quality,
        })
    }

    /// 加载来源并判断是否需要合成。
    ///
    /// 尺寸与目标完全一致时不做任何解码与合成，原始字节原样返回。
    pub async fn prepare_source(
        &self,
        source: ImageSource,
        target: TargetSize,
    ) -> Result<PreparedSource, CompositorError> {
        let config = self.config_snapshot()?;
        Self::validate_canvas_limits(&config, target.width, target.height)?;

        tokio::task::spawn_blocking(move || Self::prepare_blocking(source, target, &config))
            .await
            .map_err(|e| CompositorError::Decode(format!("解码线程执行失败：{}", e)))?
    }

    fn prepare_blocking(
        source: ImageSource,
        target: TargetSize,
        config: &CompositorConfig,
    ) -> Result<PreparedSource, CompositorError> {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw = Self::load_raw(source, config)?;
        let load_elapsed = load_start.elapsed();

        let (width, height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        if target.matches(width, height) {
            log::info!(
                "⏭️ 尺寸与目标一致（{}），跳过合成直接上传 - load={}ms",
                target,
                load_elapsed.as_millis()
            );
            return Ok(PreparedSource::Passthrough(EncodedAsset {
                content_type: raw.mime_type,
                extension: raw.extension,
                bytes: raw.bytes,
                width,
                height,
                origin: AssetOrigin::Passthrough,
            }));
        }

        let decode_start = Instant::now();
        let source = Self::decode_source(raw, config)?;
        let decode_elapsed = decode_start.elapsed();

        log::info!(
            "✅ 源图准备完成 - {}x{} -> {} load={}ms decode={}ms total={}ms",
            width,
            height,
            target,
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(PreparedSource::NeedsComposition(source))
    }

    /// 渲染一次预览并等待结果。
    ///
    /// 若期间有更新的请求，返回 `Superseded`，画布保持较新的帧。
    pub async fn render_preview(
        &self,
        canvas: &PreviewCanvas,
        source: &SourceImage,
        spec: &CompositionSpec,
    ) -> Result<PreviewOutcome, CompositorError> {
        self.schedule_preview(canvas, source, spec)?
            .await
            .map_err(|e| CompositorError::Encode(format!("预览任务执行失败：{}", e)))?
    }

    /// 参数变化后调度一次预览渲染，之前所有在途渲染随即作废。
    ///
    /// 返回任务句柄；调用方可等待，也可直接丢弃（任务仍会完成并按代数决定是否上屏）。
    pub fn schedule_preview(
        &self,
        canvas: &PreviewCanvas,
        source: &SourceImage,
        spec: &CompositionSpec,
    ) -> Result<JoinHandle<Result<PreviewOutcome, CompositorError>>, CompositorError> {
        let config = self.config_snapshot()?;
        let target = spec.target();
        let (width, height) = preview_size(target, config.preview_max_dimension);
        Self::validate_canvas_limits(&config, width, height)?;

        let ticket = canvas.issue_ticket();
        let canvas = canvas.clone();
        let pixels = Arc::clone(&source.pixels);
        let spec = *spec;

        Ok(tokio::task::spawn_blocking(move || {
            let generation = ticket.generation();
            if !canvas.is_current(ticket) {
                log::debug!("⏭️ 预览请求已过期，跳过渲染 - generation={}", generation);
                return Ok(PreviewOutcome::Superseded { generation });
            }

            let render_start = Instant::now();
            let image = Self::rasterize(&pixels, &spec, width, height, config.preview_filter)?;

            let placement = compute_placement(pixels.width(), pixels.height(), &spec).scaled(
                width as f64 / target.width as f64,
                height as f64 / target.height as f64,
            );
            let frame = PreviewFrame {
                generation,
                image: Arc::new(image),
                spec,
                placement,
            };

            if canvas.present(ticket, frame)? {
                log::debug!(
                    "🖼️ 预览已更新 - generation={} {}x{} render={}ms",
                    generation,
                    width,
                    height,
                    render_start.elapsed().as_millis()
                );
                Ok(PreviewOutcome::Presented { generation })
            } else {
                log::debug!("⏭️ 预览结果已过期，丢弃 - generation={}", generation);
                Ok(PreviewOutcome::Superseded { generation })
            }
        }))
    }

    /// 全分辨率光栅化并编码。
    ///
    /// 与预览使用同一布局计算；不会修改 `spec`。
    pub async fn encode_final(
        &self,
        source: &SourceImage,
        spec: &CompositionSpec,
        format: OutputFormat,
    ) -> Result<EncodedAsset, CompositorError> {
        if let OutputFormat::Jpeg { quality } = format {
            CompositorConfig::validate_jpeg_quality(quality)?;
        }

        let config = self.config_snapshot()?;
        let target = spec.target();
        Self::validate_canvas_limits(&config, target.width, target.height)?;

        let pixels = Arc::clone(&source.pixels);
        let spec = *spec;

        tokio::task::spawn_blocking(move || {
            let render_start = Instant::now();
            let canvas = Self::rasterize(&pixels, &spec, target.width, target.height, config.final_filter)?;
            let render_elapsed = render_start.elapsed();

            let encode_start = Instant::now();
            let bytes = Self::encode_canvas(&canvas, format)?;
            let encode_elapsed = encode_start.elapsed();

            log::info!(
                "✅ 最终输出完成 - {} {} {}KB render={}ms encode={}ms",
                target,
                format,
                bytes.len() / 1024,
                render_elapsed.as_millis(),
                encode_elapsed.as_millis()
            );

            Ok(EncodedAsset {
                bytes,
                content_type: format.content_type(),
                extension: format.extension(),
                width: target.width,
                height: target.height,
                origin: AssetOrigin::Composed,
            })
        })
        .await
        .map_err(|e| CompositorError::Encode(format!("编码线程执行失败：{}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::FitMode;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    async fn prepared(compositor: &Compositor, width: u32, height: u32, target: TargetSize) -> SourceImage {
        match compositor
            .prepare_source(ImageSource::Bytes(create_png_bytes(width, height)), target)
            .await
            .expect("prepare should succeed")
        {
            PreparedSource::NeedsComposition(source) => source,
            PreparedSource::Passthrough(_) => panic!("expected composition"),
        }
    }

    #[tokio::test]
    async fn matching_dimensions_pass_original_bytes_through() {
        let compositor = Compositor::default();
        let png = create_png_bytes(800, 600);

        let result = compositor
            .prepare_source(ImageSource::Bytes(png.clone()), AssetCategory::Deal.target_size())
            .await
            .expect("prepare should succeed");

        match result {
            PreparedSource::Passthrough(asset) => {
                assert_eq!(asset.bytes, png);
                assert_eq!(asset.content_type, "image/png");
                assert!(asset.is_passthrough());
            }
            PreparedSource::NeedsComposition(_) => panic!("expected passthrough"),
        }
    }

    #[tokio::test]
    async fn encode_final_produces_target_sized_jpeg() {
        let compositor = Compositor::default();
        let target = TargetSize::new(320, 180).unwrap();
        let source = prepared(&compositor, 400, 200, target).await;
        let spec = compositor.initial_spec(target, None).unwrap();

        let asset = compositor
            .encode_final(&source, &spec, OutputFormat::default())
            .await
            .expect("encode should succeed");

        let decoded = image::load_from_memory(&asset.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 180));
        assert_eq!(asset.content_type, "image/jpeg");
        assert_eq!(asset.origin, AssetOrigin::Composed);
    }

    #[tokio::test]
    async fn encode_rejects_invalid_quality_without_rendering() {
        let compositor = Compositor::default();
        let target = TargetSize::new(32, 32).unwrap();
        let source = prepared(&compositor, 64, 16, target).await;
        let spec = CompositionSpec::new(target);

        let result = compositor
            .encode_final(&source, &spec, OutputFormat::Jpeg { quality: 0 })
            .await;
        assert!(matches!(result, Err(CompositorError::InvalidSpec(_))));
    }

    #[tokio::test]
    async fn preview_matches_final_geometry() {
        let compositor = Compositor::default();
        let target = AssetCategory::Hero.target_size();
        let source = prepared(&compositor, 400, 200, target).await;
        let spec = CompositionSpec::new(target).with_zoom(1.5).with_offset(-200, 40);
        let canvas = PreviewCanvas::new();

        let outcome = compositor.render_preview(&canvas, &source, &spec).await.unwrap();
        assert!(matches!(outcome, PreviewOutcome::Presented { .. }));

        let frame = canvas.latest().expect("frame should be presented");
        let (pw, ph) = frame.image.dimensions();
        assert_eq!((pw, ph), (960, 540));

        let full = compute_placement(400, 200, &spec);
        assert!((frame.placement.dx / pw as f64 - full.dx / 1920.0).abs() < 1e-9);
        assert!((frame.placement.dw / pw as f64 - full.dw / 1920.0).abs() < 1e-9);
        assert!((frame.placement.dy / ph as f64 - full.dy / 1080.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn newer_preview_wins_over_older() {
        let compositor = Compositor::default();
        let target = TargetSize::new(200, 100).unwrap();
        let source = prepared(&compositor, 300, 300, target).await;
        let canvas = PreviewCanvas::new();

        let base = CompositionSpec::new(target);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let spec = base.with_zoom(1.0 + i as f64 * 0.1).with_fit_mode(FitMode::Contain);
                compositor.schedule_preview(&canvas, &source, &spec).unwrap()
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let frame = canvas.latest().expect("latest frame");
        assert_eq!(frame.generation, canvas.current_generation());
        assert!((frame.spec.zoom() - 1.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn oversized_target_is_rejected_before_decoding() {
        let compositor = Compositor::default();
        let target = TargetSize::new(100_000, 100_000).unwrap();

        let result = compositor
            .prepare_source(ImageSource::Bytes(create_png_bytes(64, 64)), target)
            .await;
        match result {
            Err(CompositorError::ResourceLimit(message)) => assert!(message.contains("100000x100000")),
            other => panic!("expected resource limit, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn encode_final_rejects_oversized_canvas() {
        let compositor = Compositor::default();
        let small = TargetSize::new(32, 32).unwrap();
        let source = prepared(&compositor, 64, 64, small).await;
        let huge = CompositionSpec::new(TargetSize::new(100_000, 100_000).unwrap());

        let err = compositor
            .encode_final(&source, &huge, OutputFormat::Png)
            .await
            .expect_err("canvas over the pixel limit must fail");
        assert_eq!(err.code(), "E_RESOURCE_LIMIT");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn schedule_preview_rejects_canvas_over_limit() {
        let target = AssetCategory::Hero.target_size();
        let source = prepared(&Compositor::default(), 400, 200, target).await;

        let tight = Compositor::new(CompositorConfig {
            max_decoded_pixels: 100_000,
            ..CompositorConfig::default()
        });
        let canvas = PreviewCanvas::new();
        let result = tight.schedule_preview(&canvas, &source, &CompositionSpec::new(target));

        assert!(matches!(result, Err(CompositorError::ResourceLimit(_))));
        assert_eq!(canvas.current_generation(), 0);
        assert!(canvas.latest().is_none());
    }

    #[test]
    fn set_limits_validates_ranges() {
        let compositor = Compositor::default();
        assert!(compositor.set_limits(1024, 40_000_000, 160 * 1024 * 1024).is_err());
        assert!(compositor.set_limits(50 * 1024 * 1024, 10, 160 * 1024 * 1024).is_err());
        compositor
            .set_limits(10 * 1024 * 1024, 20_000_000, 80 * 1024 * 1024)
            .expect("valid limits");
        assert_eq!(compositor.config_snapshot().unwrap().max_decoded_pixels, 20_000_000);
    }

    #[test]
    fn background_override_feeds_initial_spec() {
        let compositor = Compositor::default();
        compositor
            .set_background(Some(AssetCategory::Flyer), Background::rgb(255, 255, 255))
            .unwrap();

        let target = AssetCategory::Flyer.target_size();
        let flyer = compositor.initial_spec(target, Some(AssetCategory::Flyer)).unwrap();
        let hero = compositor.initial_spec(target, Some(AssetCategory::Hero)).unwrap();
        assert_eq!(flyer.background(), Background::rgb(255, 255, 255));
        assert_eq!(hero.background(), Background::BLACK);
    }
}
