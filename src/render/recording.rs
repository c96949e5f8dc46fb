use anyhow::Result;

use super::{Glow, StrokeStyle, Surface, TextStyle};
use crate::geometry::{BoundingBox, Point};

/// History kept before a `clear` drops earlier overlays.
const MAX_RECORDED_COMMANDS: usize = 4096;

/// One recorded draw call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear,
    Polyline {
        points: Vec<Point>,
        closed: bool,
        style: StrokeStyle,
        glow: Option<Glow>,
    },
    Rect {
        rect: BoundingBox,
        style: StrokeStyle,
        glow: Option<Glow>,
    },
    Text {
        text: String,
        at: Point,
        style: TextStyle,
    },
}

/// Surface that records draw calls instead of rasterizing them.
///
/// Used headless (the daemon without `render-image`) and in tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
    glow: Option<Glow>,
    count_text: Option<String>,
    presented: u64,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything drawn since creation or the last `take_commands`, bounded
    /// for long headless runs.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Commands drawn after the most recent `Clear`.
    pub fn visible(&self) -> &[DrawCommand] {
        let start = self
            .commands
            .iter()
            .rposition(|c| *c == DrawCommand::Clear)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.commands[start..]
    }

    pub fn count_text(&self) -> Option<&str> {
        self.count_text.as_deref()
    }

    /// Number of finished overlays.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self) -> Result<()> {
        if self.commands.len() >= MAX_RECORDED_COMMANDS {
            self.commands.clear();
        }
        self.commands.push(DrawCommand::Clear);
        Ok(())
    }

    fn stroke_polyline(&mut self, points: &[Point], closed: bool, style: &StrokeStyle) -> Result<()> {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            closed,
            style: *style,
            glow: self.glow,
        });
        Ok(())
    }

    fn stroke_rect(&mut self, rect: &BoundingBox, style: &StrokeStyle) -> Result<()> {
        self.commands.push(DrawCommand::Rect {
            rect: *rect,
            style: *style,
            glow: self.glow,
        });
        Ok(())
    }

    fn fill_text(&mut self, text: &str, at: Point, style: &TextStyle) -> Result<()> {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            at,
            style: *style,
        });
        Ok(())
    }

    fn set_glow(&mut self, glow: Option<Glow>) {
        self.glow = glow;
    }

    fn display_count(&mut self, text: &str) {
        self.count_text = Some(text.to_string());
    }

    fn present(&mut self) -> Result<()> {
        self.presented += 1;
        Ok(())
    }
}
