//! Overlay rendering.
//!
//! The renderer makes no decisions: it draws whatever filtered detections
//! and ROI state the detection loop hands it, on an abstract [`Surface`].

#[cfg(feature = "render-image")]
mod image_surface;
mod recording;
mod renderer;

use anyhow::Result;

use crate::geometry::{BoundingBox, Point};

#[cfg(feature = "render-image")]
pub use image_surface::ImageSurface;
pub use recording::{DrawCommand, RecordingSurface};
pub use renderer::{count_text, Renderer, Theme, WAITING_TEXT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Same hue scaled towards black by `factor` (0..=1).
    pub fn dimmed(self, factor: f32) -> Self {
        let scale = |c: u8| (c as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self::rgb(scale(self.r), scale(self.g), scale(self.b))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub line_width: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub color: Color,
    pub size_px: f32,
    pub bold: bool,
}

/// Shadow/glow applied to strokes until cleared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glow {
    pub color: Color,
    pub blur: f32,
}

/// 2D drawing surface the overlay is rendered on.
///
/// Coordinates are source-frame pixels. Text is positioned by its baseline.
pub trait Surface {
    fn clear(&mut self) -> Result<()>;

    fn stroke_polyline(&mut self, points: &[Point], closed: bool, style: &StrokeStyle) -> Result<()>;

    fn stroke_rect(&mut self, rect: &BoundingBox, style: &StrokeStyle) -> Result<()>;

    fn fill_text(&mut self, text: &str, at: Point, style: &TextStyle) -> Result<()>;

    /// Set or clear the glow used by subsequent strokes.
    fn set_glow(&mut self, glow: Option<Glow>);

    /// Replace the user-facing count text.
    fn display_count(&mut self, text: &str);

    /// Flush a finished overlay (e.g. write a snapshot). Default: nothing.
    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}
