//! # 布局计算模块
//!
//! ## 设计思路
//!
//! 计算源图在目标画布上的绘制矩形 `(dx, dy, dw, dh)`。
//! 纯函数：输入为源图尺寸与 `CompositionSpec`，输出唯一结果，
//! 预览与最终编码共用同一份计算，保证二者几何一致。
//!
//! ## 实现思路
//!
//! 1. `stretch` 直接铺满画布
//! 2. `cover` 取两轴缩放比的较大值，`contain` 取较小值，再乘以用户缩放
//! 3. 居中后叠加用户偏移
//! 4. 预览画布尺寸不同时，通过 `scaled` 做等比映射

use serde::Serialize;

use super::{CompositionSpec, FitMode};

/// 浮点比较容差（画布像素）。
const EDGE_EPSILON: f64 = 1e-6;

/// 源图绘制到画布上的目标矩形（画布像素坐标，可为负或越界）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub dx: f64,
    pub dy: f64,
    pub dw: f64,
    pub dh: f64,
}

/// 画布上实际被绘制的整数像素区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// 将布局等比映射到另一尺寸的画布（用于缩小显示的预览）。
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            dx: self.dx * sx,
            dy: self.dy * sy,
            dw: self.dw * sx,
            dh: self.dh * sy,
        }
    }

    /// 绘制矩形是否覆盖整个画布（无背景色外露）。
    pub fn covers(&self, canvas_width: f64, canvas_height: f64) -> bool {
        self.dx <= EDGE_EPSILON
            && self.dy <= EDGE_EPSILON
            && self.dx + self.dw >= canvas_width - EDGE_EPSILON
            && self.dy + self.dh >= canvas_height - EDGE_EPSILON
    }

    /// 绘制矩形是否完整位于画布内（源图无裁切）。
    pub fn fits_within(&self, canvas_width: f64, canvas_height: f64) -> bool {
        self.dx >= -EDGE_EPSILON
            && self.dy >= -EDGE_EPSILON
            && self.dx + self.dw <= canvas_width + EDGE_EPSILON
            && self.dy + self.dh <= canvas_height + EDGE_EPSILON
    }

    /// 计算与画布相交的整数像素区域。
    ///
    /// 边缘按四舍五入对齐像素，之后裁到画布范围；无交集时返回 `None`。
    /// 不足 1 像素但与画布相交的一边至少保留 1 像素。
    pub fn visible_rect(&self, canvas_width: u32, canvas_height: u32) -> Option<VisibleRect> {
        let (x, width) = snap_span(self.dx, self.dw, canvas_width)?;
        let (y, height) = snap_span(self.dy, self.dh, canvas_height)?;
        Some(VisibleRect { x, y, width, height })
    }
}

/// 将一维区间 `[start, start + len)` 对齐到 `[0, limit)` 的整数像素。
fn snap_span(start: f64, len: f64, limit: u32) -> Option<(u32, u32)> {
    let end = start + len;
    if limit == 0 || len <= 0.0 || !start.is_finite() || !end.is_finite() || end <= 0.0 || start >= limit as f64 {
        return None;
    }

    let snap = |value: f64| value.round().clamp(0.0, limit as f64) as u32;
    let first = snap(start);
    let last = snap(end);
    if last > first {
        return Some((first, last - first));
    }

    let first = (start.floor().max(0.0) as u32).min(limit - 1);
    Some((first, 1))
}

/// 计算源图在目标画布上的绘制位置。
///
/// 源图任一边为 0 时返回画布中心的空矩形。
pub fn compute_placement(source_width: u32, source_height: u32, spec: &CompositionSpec) -> Placement {
    let target = spec.target();
    let tw = target.width as f64;
    let th = target.height as f64;

    let sw = source_width as f64;
    let sh = source_height as f64;

    let base = match spec.fit_mode() {
        FitMode::Stretch => {
            return Placement {
                dx: 0.0,
                dy: 0.0,
                dw: tw,
                dh: th,
            };
        }
        _ if source_width == 0 || source_height == 0 => {
            return Placement {
                dx: tw / 2.0,
                dy: th / 2.0,
                dw: 0.0,
                dh: 0.0,
            };
        }
        FitMode::Cover => (tw / sw).max(th / sh),
        FitMode::Contain => (tw / sw).min(th / sh),
    };
    let scale = base * spec.zoom();

    let dw = sw * scale;
    let dh = sh * scale;

    Placement {
        dx: (tw - dw) / 2.0 + spec.offset_x() as f64,
        dy: (th - dh) / 2.0 + spec.offset_y() as f64,
        dw,
        dh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{AssetCategory, TargetSize};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn hero_cover_crops_left_and_right_symmetrically() {
        let spec = CompositionSpec::new(AssetCategory::Hero.target_size());
        let p = compute_placement(4000, 2000, &spec);

        assert!(approx(p.dw, 2160.0));
        assert!(approx(p.dh, 1080.0));
        assert!(approx(p.dx, -120.0));
        assert!(approx(p.dy, 0.0));
        assert!(p.covers(1920.0, 1080.0));
    }

    #[test]
    fn deal_contain_letterboxes_250px_each_side() {
        let spec = CompositionSpec::new(AssetCategory::Deal.target_size()).with_fit_mode(FitMode::Contain);
        let p = compute_placement(600, 1200, &spec);

        assert!(approx(p.dw, 300.0));
        assert!(approx(p.dh, 600.0));
        assert!(approx(p.dx, 250.0));
        assert!(approx(p.dy, 0.0));
        assert!(p.fits_within(800.0, 600.0));

        let rect = p.visible_rect(800, 600).expect("source should be visible");
        assert_eq!(rect, VisibleRect { x: 250, y: 0, width: 300, height: 600 });
    }

    #[test]
    fn stretch_ignores_zoom_and_offset() {
        let base = CompositionSpec::new(TargetSize::new(600, 800).unwrap()).with_fit_mode(FitMode::Stretch);
        let moved = base.with_zoom(2.5).with_offset(-300, 120);

        let a = compute_placement(1234, 77, &base);
        let b = compute_placement(1234, 77, &moved);
        assert_eq!(a, b);
        assert_eq!(a, Placement { dx: 0.0, dy: 0.0, dw: 600.0, dh: 800.0 });
    }

    #[test]
    fn zoom_and_offset_pan_around_center() {
        let spec = CompositionSpec::new(TargetSize::new(800, 600).unwrap())
            .with_zoom(2.0)
            .with_offset(40, -30);
        let p = compute_placement(800, 600, &spec);

        assert!(approx(p.dw, 1600.0));
        assert!(approx(p.dh, 1200.0));
        assert!(approx(p.dx, -400.0 + 40.0));
        assert!(approx(p.dy, -300.0 - 30.0));
    }

    #[test]
    fn placement_is_deterministic() {
        let spec = CompositionSpec::new(AssetCategory::Flyer.target_size())
            .with_zoom(1.37)
            .with_offset(-12, 55);
        let first = compute_placement(3024, 4032, &spec);
        for _ in 0..16 {
            assert_eq!(compute_placement(3024, 4032, &spec), first);
        }
    }

    #[test]
    fn zero_sized_source_yields_empty_placement() {
        let spec = CompositionSpec::new(TargetSize::new(800, 600).unwrap());
        let p = compute_placement(0, 600, &spec);
        assert_eq!(p.dw, 0.0);
        assert!(p.visible_rect(800, 600).is_none());
    }

    #[test]
    fn scaled_placement_keeps_ratios() {
        let spec = CompositionSpec::new(AssetCategory::Hero.target_size()).with_offset(100, 0);
        let full = compute_placement(4000, 2000, &spec);
        let half = full.scaled(0.5, 0.5);

        assert!(approx(half.dx / 960.0, full.dx / 1920.0));
        assert!(approx(half.dw / 960.0, full.dw / 1920.0));
    }

    #[test]
    fn sub_pixel_strip_keeps_one_pixel_row() {
        let spec = CompositionSpec::new(AssetCategory::Deal.target_size()).with_fit_mode(FitMode::Contain);
        let p = compute_placement(4000, 3, &spec);
        assert!(p.dh > 0.0 && p.dh < 1.0);

        let rect = p.visible_rect(800, 600).expect("thin strip should stay visible");
        assert_eq!((rect.x, rect.width), (0, 800));
        assert_eq!((rect.y, rect.height), (299, 1));
    }

    #[test]
    fn sliver_at_canvas_edge_snaps_inside() {
        let p = Placement { dx: -99.8, dy: 0.0, dw: 100.0, dh: 50.0 };
        let rect = p.visible_rect(800, 600).expect("sliver overlaps canvas");
        assert_eq!((rect.x, rect.width), (0, 1));

        let p = Placement { dx: 799.9, dy: 0.0, dw: 0.05, dh: 50.0 };
        let rect = p.visible_rect(800, 600).expect("sliver overlaps canvas");
        assert_eq!((rect.x, rect.width), (799, 1));
    }

    #[test]
    fn offscreen_placement_has_no_visible_rect() {
        let p = Placement { dx: 900.0, dy: 0.0, dw: 100.0, dh: 100.0 };
        assert!(p.visible_rect(800, 600).is_none());
    }
}
