// Snapshot export - composes an annotated frame with a joint-angle text panel

use crate::models::pose::JointAngleRow;
use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BACKGROUND: Rgba<u8> = Rgba([0x18, 0x18, 0x1b, 0xff]);
const PANEL: Rgba<u8> = Rgba([0x00, 0xff, 0x88, 0xff]);
const PANEL_TEXT: Rgba<u8> = Rgba([0x0f, 0x0f, 0x12, 0xff]);
const PADDING: u32 = 18;
const LINE_HEIGHT: u32 = 20;
const FONT_PX: f32 = 15.0;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Nothing to export")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Lines for the text panel: one per row with a value
pub fn panel_lines(angles: &[JointAngleRow]) -> Vec<String> {
    angles
        .iter()
        .filter_map(|row| row.value.map(|v| format!("{}: {:.1}°", row.name, v)))
        .collect()
}

/// Builds the exported image: the annotated frame scaled up, with the angle
/// panel underneath
pub struct SnapshotComposer {
    scale: f32,
    font: Option<FontVec>,
}

impl SnapshotComposer {
    pub fn new(scale: f32, font: Option<FontVec>) -> Self {
        Self { scale, font }
    }

    /// Load the panel font; the panel is still drawn (without glyphs) if this fails
    pub fn with_font_file(scale: f32, font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(|path| match std::fs::read(path) {
            Ok(data) => match FontVec::try_from_vec(data) {
                Ok(font) => Some(font),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Invalid panel font: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read panel font: {}", e);
                None
            }
        });
        Self::new(scale, font)
    }

    pub fn compose(
        &self,
        frame: &RgbaImage,
        angles: &[JointAngleRow],
    ) -> SnapshotResult<RgbaImage> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(SnapshotError::Empty);
        }

        let scaled_w = ((width as f32 * self.scale).round() as u32).max(1);
        let scaled_h = ((height as f32 * self.scale).round() as u32).max(1);

        let lines = panel_lines(angles);
        let panel_h = if lines.is_empty() {
            0
        } else {
            lines.len() as u32 * LINE_HEIGHT + PADDING * 2
        };

        let mut out = RgbaImage::from_pixel(scaled_w, scaled_h + panel_h, BACKGROUND);
        let scaled = imageops::resize(frame, scaled_w, scaled_h, FilterType::Triangle);
        imageops::replace(&mut out, &scaled, 0, 0);

        if panel_h > 0 {
            draw_filled_rect_mut(
                &mut out,
                Rect::at(0, scaled_h as i32).of_size(scaled_w, panel_h),
                PANEL,
            );
            if let Some(font) = &self.font {
                for (i, line) in lines.iter().enumerate() {
                    // Baseline of line i sits at (i + 1) * LINE_HEIGHT below the padding
                    let top = scaled_h + PADDING + (i as u32 + 1) * LINE_HEIGHT - FONT_PX as u32;
                    draw_text_mut(
                        &mut out,
                        PANEL_TEXT,
                        PADDING as i32,
                        top as i32,
                        PxScale::from(FONT_PX),
                        font,
                        line,
                    );
                }
            }
        }

        Ok(out)
    }

    /// Compose and write `posekit-<unix_ms>.png` into `dir`
    pub fn export(
        &self,
        dir: &Path,
        frame: &RgbaImage,
        angles: &[JointAngleRow],
    ) -> SnapshotResult<PathBuf> {
        let image = self.compose(frame, angles)?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(snapshot_file_name(chrono::Utc::now().timestamp_millis()));
        image.save(&path)?;
        tracing::info!(path = %path.display(), "Saved snapshot");
        Ok(path)
    }
}

pub fn snapshot_file_name(timestamp_ms: i64) -> String {
    format!("posekit-{}.png", timestamp_ms)
}
