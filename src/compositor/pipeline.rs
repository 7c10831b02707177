//! # 解码与光栅化流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 像素 → 画布 → 编码字节”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸与 EXIF 方向
//! 2. 按像素 / 内存上限快速拒绝
//! 3. 完整解码并校正方向，转换 RGBA
//! 4. 光栅化：背景色铺底 → 计算可见区域 → 只重采样源图中可见的那一块 → 按 alpha 混合
//! 5. 编码为 JPEG / PNG

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader, RgbImage, RgbaImage,
};
use std::io::Cursor;
use std::sync::Arc;

use super::placement::{VisibleRect, compute_placement};
use super::source::RawImageData;
use super::{CompositionSpec, Compositor, CompositorConfig, CompositorError, OutputFormat, SourceImage};

/// 源图上需要重采样的区域（源图像素坐标，允许小数）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SourceCrop {
    pub(crate) left: f64,
    pub(crate) top: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

impl Compositor {
    /// 将原始字节解码为方向校正后的 RGBA 源图。
    pub(crate) fn decode_source(
        raw: RawImageData,
        config: &CompositorConfig,
    ) -> Result<SourceImage, CompositorError> {
        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let mut decoder = ImageReader::new(Cursor::new(raw.bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| CompositorError::InvalidFormat(format!("无法识别图片格式：{}", e)))?
            .into_decoder()
            .map_err(|e| CompositorError::Decode(format!("图片解码失败：{}", e)))?;

        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut decoded = DynamicImage::from_decoder(decoder)
            .map_err(|e| CompositorError::Decode(format!("图片解码失败：{}", e)))?;
        decoded.apply_orientation(orientation);

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositorError::Decode("图片尺寸为 0".to_string()));
        }
        Self::validate_pixel_limits(config, width, height)?;

        log::info!(
            "✅ 图片解码成功 - 来源: {} 格式: {} 尺寸: {}x{} 方向: {:?}",
            raw.source_hint,
            raw.mime_type,
            width,
            height,
            orientation
        );

        Ok(SourceImage {
            pixels: Arc::new(rgba),
            mime_type: raw.mime_type,
            byte_len: raw.bytes.len(),
        })
    }

    /// 仅通过图片头信息读取（方向校正后的）宽高。
    ///
    /// 用于完整解码前的像素限制检查，以及尺寸一致时的直传判断。
    pub(crate) fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), CompositorError> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CompositorError::InvalidFormat(format!("无法识别图片格式：{}", e)))?
            .into_decoder()
            .map_err(|e| CompositorError::Decode(format!("无法读取图片尺寸：{}", e)))?;

        let (width, height) = decoder.dimensions();
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

        Ok(Self::oriented_dimensions(width, height, orientation))
    }

    fn oriented_dimensions(width: u32, height: u32, orientation: Orientation) -> (u32, u32) {
        match orientation {
            Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH => (height, width),
            _ => (width, height),
        }
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(
        config: &CompositorConfig,
        width: u32,
        height: u32,
    ) -> Result<(), CompositorError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| CompositorError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(CompositorError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    /// 画布尺寸与源图共用同一组上限，超限时在分配像素前拒绝。
    pub(crate) fn validate_canvas_limits(
        config: &CompositorConfig,
        width: u32,
        height: u32,
    ) -> Result<(), CompositorError> {
        Self::validate_pixel_limits(config, width, height)
            .and_then(|()| Self::validate_decoded_memory_limits(config, width, height))
            .map_err(|err| match err {
                CompositorError::ResourceLimit(reason) => {
                    CompositorError::ResourceLimit(format!("目标画布 {}x{} 超出上限，{}", width, height, reason))
                }
                other => other,
            })
    }

    fn validate_decoded_memory_limits(
        config: &CompositorConfig,
        width: u32,
        height: u32,
    ) -> Result<(), CompositorError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| CompositorError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(CompositorError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    /// 将源图按 `spec` 绘制到 `out_width × out_height` 的画布。
    ///
    /// 输出尺寸可以小于目标尺寸（预览），布局按比例映射，几何与最终输出一致。
    pub(crate) fn rasterize(
        pixels: &RgbaImage,
        spec: &CompositionSpec,
        out_width: u32,
        out_height: u32,
        filter: FilterType,
    ) -> Result<RgbImage, CompositorError> {
        let target = spec.target();
        let (source_width, source_height) = pixels.dimensions();
        let mut canvas = RgbImage::from_pixel(out_width, out_height, spec.background().to_pixel());

        if source_width == 0 || source_height == 0 {
            return Ok(canvas);
        }

        let placement = compute_placement(source_width, source_height, spec).scaled(
            out_width as f64 / target.width as f64,
            out_height as f64 / target.height as f64,
        );

        let Some(visible) = placement.visible_rect(out_width, out_height) else {
            return Ok(canvas);
        };

        let scale_x = source_width as f64 / placement.dw;
        let scale_y = source_height as f64 / placement.dh;

        let left = ((visible.x as f64 - placement.dx) * scale_x).clamp(0.0, source_width as f64);
        let top = ((visible.y as f64 - placement.dy) * scale_y).clamp(0.0, source_height as f64);
        let crop = SourceCrop {
            left,
            top,
            width: (visible.width as f64 * scale_x).min(source_width as f64 - left),
            height: (visible.height as f64 * scale_y).min(source_height as f64 - top),
        };

        if crop.width <= 0.0 || crop.height <= 0.0 {
            return Ok(canvas);
        }

        let region = match Self::resize_with_fast_image_resize(pixels, crop, visible, filter) {
            Ok(region) => region,
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 重采样失败，回退 image::imageops：{}", err);
                Self::resize_with_imageops(pixels, crop, visible, filter)
            }
        };

        Self::blend_onto(&mut canvas, &region, visible.x, visible.y);
        Ok(canvas)
    }

    fn resize_with_fast_image_resize(
        pixels: &RgbaImage,
        crop: SourceCrop,
        visible: VisibleRect,
        filter: FilterType,
    ) -> Result<RgbaImage, CompositorError> {
        let (src_width, src_height) = pixels.dimensions();

        let src_image = fr::images::ImageRef::new(src_width, src_height, pixels.as_raw(), fr::PixelType::U8x4)
            .map_err(|e| CompositorError::Encode(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(visible.width, visible.height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(Self::to_resize_alg(filter))
            .crop(crop.left, crop.top, crop.width, crop.height);

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| CompositorError::Encode(format!("fast_image_resize 执行失败：{}", e)))?;

        RgbaImage::from_raw(visible.width, visible.height, dst_image.into_vec())
            .ok_or_else(|| CompositorError::Encode("fast_image_resize 输出缓冲长度异常".to_string()))
    }

    /// 整数裁切 + `image` 自带重采样，作为兜底路径。
    fn resize_with_imageops(
        pixels: &RgbaImage,
        crop: SourceCrop,
        visible: VisibleRect,
        filter: FilterType,
    ) -> RgbaImage {
        let (src_width, src_height) = pixels.dimensions();
        let x = (crop.left.floor() as u32).min(src_width.saturating_sub(1));
        let y = (crop.top.floor() as u32).min(src_height.saturating_sub(1));
        let width = (crop.width.ceil() as u32).clamp(1, src_width - x);
        let height = (crop.height.ceil() as u32).clamp(1, src_height - y);

        let cropped = image::imageops::crop_imm(pixels, x, y, width, height).to_image();
        image::imageops::resize(&cropped, visible.width, visible.height, filter)
    }

    /// 将 RGBA 区域按 alpha 混合到不透明画布上。
    fn blend_onto(canvas: &mut RgbImage, region: &RgbaImage, x0: u32, y0: u32) {
        for (x, y, pixel) in region.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let Some(dst) = canvas.get_pixel_mut_checked(x0 + x, y0 + y) else {
                continue;
            };

            if a == u8::MAX {
                dst.0 = [r, g, b];
                continue;
            }

            let alpha = a as u16;
            let inverse = 255 - alpha;
            let mix = |src: u8, bg: u8| ((src as u16 * alpha + bg as u16 * inverse + 127) / 255) as u8;
            let [br, bg, bb] = dst.0;
            dst.0 = [mix(r, br), mix(g, bg), mix(b, bb)];
        }
    }

    /// 将画布编码为目标格式字节。
    pub(crate) fn encode_canvas(canvas: &RgbImage, format: OutputFormat) -> Result<Vec<u8>, CompositorError> {
        let mut buffer = Vec::new();

        match format {
            OutputFormat::Jpeg { quality } => {
                let quality = CompositorConfig::validate_jpeg_quality(quality)?;
                JpegEncoder::new_with_quality(&mut buffer, quality)
                    .encode_image(canvas)
                    .map_err(|e| CompositorError::Encode(format!("JPEG 编码失败：{}", e)))?;
            }
            OutputFormat::Png => {
                PngEncoder::new(&mut buffer)
                    .write_image(
                        canvas.as_raw(),
                        canvas.width(),
                        canvas.height(),
                        ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| CompositorError::Encode(format!("PNG 编码失败：{}", e)))?;
            }
        }

        Ok(buffer)
    }

    fn to_resize_alg(filter: FilterType) -> fr::ResizeAlg {
        match filter {
            FilterType::Nearest => fr::ResizeAlg::Nearest,
            FilterType::Triangle => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            FilterType::CatmullRom => fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom),
            FilterType::Gaussian => fr::ResizeAlg::Convolution(fr::FilterType::Mitchell),
            FilterType::Lanczos3 => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
        }
    }
}
