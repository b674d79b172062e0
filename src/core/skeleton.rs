// Skeleton overlay renderer - draws the pose topology onto an RGBA surface

use crate::core::geometry::POSE_CONNECTIONS;
use crate::models::pose::Landmark;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

/// Overlay colour (#00ff88)
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([0x00, 0xff, 0x88, 0xff]);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub color: Rgba<u8>,
    /// Segment thickness in pixels
    pub line_width: u32,
    /// Landmark marker radius in pixels
    pub marker_radius: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: OVERLAY_COLOR,
            line_width: 2,
            marker_radius: 2,
        }
    }
}

/// Draw the skeleton for `landmarks` scaled to `width` x `height` pixels.
///
/// Connections with a missing or occluded endpoint are skipped, as are markers
/// for occluded landmarks. The surface is never resized. Only opaque pixels
/// are written, so repeated calls with the same inputs leave the same result.
pub fn draw_skeleton(
    surface: &mut RgbaImage,
    landmarks: &[Landmark],
    width: u32,
    height: u32,
    style: &OverlayStyle,
) {
    let to_px = |p: &Landmark| (p.x * width as f32, p.y * height as f32);

    for &(i, j) in POSE_CONNECTIONS.iter() {
        let (a, b) = match (landmarks.get(i), landmarks.get(j)) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        if !a.is_visible() || !b.is_visible() {
            continue;
        }
        draw_thick_segment(surface, to_px(a), to_px(b), style.line_width, style.color);
    }

    for p in landmarks.iter().filter(|p| p.is_visible()) {
        let (x, y) = to_px(p);
        draw_filled_circle_mut(
            surface,
            (x.round() as i32, y.round() as i32),
            style.marker_radius,
            style.color,
        );
    }
}

fn draw_thick_segment(
    surface: &mut RgbaImage,
    start: (f32, f32),
    end: (f32, f32),
    line_width: u32,
    color: Rgba<u8>,
) {
    let half = (line_width.max(1) as i32 - 1) / 2;
    let extra = (line_width.max(1) as i32 - 1) - half;
    for ox in -half..=extra {
        for oy in -half..=extra {
            let (dx, dy) = (ox as f32, oy as f32);
            draw_line_segment_mut(
                surface,
                (start.0 + dx, start.1 + dy),
                (end.0 + dx, end.1 + dy),
                color,
            );
        }
    }
}
