#![cfg(feature = "render-image")]

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;

use super::{Color, Glow, StrokeStyle, Surface, TextStyle};
use crate::geometry::{BoundingBox, Point};

/// Rings drawn to approximate a glow of the configured blur.
const GLOW_RINGS: u32 = 4;

/// Raster overlay surface backed by an RGBA image.
///
/// The overlay is transparent except for what was drawn, so it can be
/// composited over the source frame. Text needs a font; without one, labels
/// are skipped and only the count is logged.
pub struct ImageSurface {
    canvas: RgbaImage,
    font: Option<FontVec>,
    glow: Option<Glow>,
    count_text: Option<String>,
    snapshot_path: Option<PathBuf>,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            font: None,
            glow: None,
            count_text: None,
            snapshot_path: None,
        }
    }

    /// Load a TTF/OTF font used for labels and the count line.
    pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow!("invalid font file {}", path.display()))?;
        self.font = Some(font);
        Ok(self)
    }

    /// Write the overlay to `path` on every `present`.
    pub fn with_snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn count_text(&self) -> Option<&str> {
        self.count_text.as_deref()
    }

    fn rect_outline(&mut self, rect: &BoundingBox, grow: i32, color: Color) {
        let x = rect.x.round() as i32 - grow;
        let y = rect.y.round() as i32 - grow;
        let w = rect.width.round() as i32 + 2 * grow;
        let h = rect.height.round() as i32 + 2 * grow;
        if w <= 0 || h <= 0 {
            return;
        }
        draw_hollow_rect_mut(
            &mut self.canvas,
            Rect::at(x, y).of_size(w as u32, h as u32),
            rgba(color),
        );
    }

    fn segment(&mut self, from: Point, to: Point, width: f32, color: Color) {
        let half = (width.max(1.0) / 2.0).floor() as i32;
        for dx in -half..=half {
            for dy in -half..=half {
                draw_line_segment_mut(
                    &mut self.canvas,
                    (from.x as f32 + dx as f32, from.y as f32 + dy as f32),
                    (to.x as f32 + dx as f32, to.y as f32 + dy as f32),
                    rgba(color),
                );
            }
        }
    }
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}

impl Surface for ImageSurface {
    fn clear(&mut self) -> Result<()> {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        Ok(())
    }

    fn stroke_polyline(&mut self, points: &[Point], closed: bool, style: &StrokeStyle) -> Result<()> {
        for pair in points.windows(2) {
            self.segment(pair[0], pair[1], style.line_width, style.color);
        }
        if closed && points.len() > 2 {
            self.segment(points[points.len() - 1], points[0], style.line_width, style.color);
        }
        Ok(())
    }

    fn stroke_rect(&mut self, rect: &BoundingBox, style: &StrokeStyle) -> Result<()> {
        if let Some(glow) = self.glow {
            // Outer rings first, fading with distance.
            let spread = (glow.blur / 3.0).max(1.0) as u32;
            for ring in (1..=GLOW_RINGS).rev() {
                let grow = (ring * spread / GLOW_RINGS).max(1) as i32 + style.line_width as i32 / 2;
                let fade = 1.0 - ring as f32 / (GLOW_RINGS + 1) as f32;
                self.rect_outline(rect, grow, glow.color.dimmed(fade));
            }
        }
        let half = (style.line_width.max(1.0) / 2.0).floor() as i32;
        for grow in -half..=half {
            self.rect_outline(rect, grow, style.color);
        }
        Ok(())
    }

    fn fill_text(&mut self, text: &str, at: Point, style: &TextStyle) -> Result<()> {
        let Some(font) = self.font.as_ref() else {
            return Ok(());
        };
        // Baseline to top-left.
        let top = at.y - style.size_px as f64;
        draw_text_mut(
            &mut self.canvas,
            rgba(style.color),
            at.x.round() as i32,
            top.round() as i32,
            PxScale::from(style.size_px),
            font,
            text,
        );
        Ok(())
    }

    fn set_glow(&mut self, glow: Option<Glow>) {
        self.glow = glow;
    }

    fn display_count(&mut self, text: &str) {
        self.count_text = Some(text.to_string());
    }

    fn present(&mut self) -> Result<()> {
        if let (Some(font), Some(text)) = (self.font.as_ref(), self.count_text.as_ref()) {
            draw_text_mut(
                &mut self.canvas,
                Rgba([255, 255, 255, 255]),
                12,
                12,
                PxScale::from(32.0),
                font,
                text,
            );
        }
        if let Some(path) = &self.snapshot_path {
            self.canvas
                .save(path)
                .with_context(|| format!("failed to write overlay snapshot {}", path.display()))?;
        }
        Ok(())
    }
}
