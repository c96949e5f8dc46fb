use anyhow::Result;

use super::{Color, Glow, StrokeStyle, Surface, TextStyle};
use crate::detect::Detection;
use crate::geometry::Point;
use crate::roi::{EditorState, RoiEditor};

/// Count text shown before the first detection cycle renders.
pub const WAITING_TEXT: &str = "Waiting to detect...";

/// User-facing count line. Exactly one match reads singular.
pub fn count_text(count: usize) -> String {
    if count == 1 {
        "1 person currently enjoying the lab".to_string()
    } else {
        format!("{} people currently enjoying the lab", count)
    }
}

/// Overlay styling.
#[derive(Clone, Debug)]
pub struct Theme {
    pub accent: Color,
    pub line_width: f32,
    pub glow_blur: f32,
    pub label_size_px: f32,
    /// Gap between a box's top edge and its label baseline.
    pub label_offset: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::rgb(0x00, 0xff, 0x66),
            line_width: 3.0,
            glow_blur: 15.0,
            label_size_px: 24.0,
            label_offset: 10.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Renderer {
    theme: Theme,
}

impl Renderer {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    fn stroke(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.theme.accent,
            line_width: self.theme.line_width,
        }
    }

    /// Draw one cycle: ROI outline, boxes with confidence labels, count text.
    pub fn render(
        &self,
        surface: &mut dyn Surface,
        roi: &RoiEditor,
        detections: &[Detection],
        count: usize,
    ) -> Result<()> {
        surface.clear()?;
        self.draw_roi(surface, roi)?;

        let stroke = self.stroke();
        let label = TextStyle {
            color: self.theme.accent,
            size_px: self.theme.label_size_px,
            bold: true,
        };
        for detection in detections {
            surface.set_glow(Some(Glow {
                color: self.theme.accent,
                blur: self.theme.glow_blur,
            }));
            surface.stroke_rect(&detection.bbox, &stroke)?;
            surface.set_glow(None);

            let at = Point::new(detection.bbox.x, detection.bbox.y - self.theme.label_offset);
            surface.fill_text(&format!("{}%", detection.confidence_percent()), at, &label)?;
        }

        surface.display_count(&count_text(count));
        surface.present()
    }

    /// Redraw only the ROI outline, e.g. while the user is picking points.
    pub fn render_roi(&self, surface: &mut dyn Surface, roi: &RoiEditor) -> Result<()> {
        surface.clear()?;
        self.draw_roi(surface, roi)?;
        surface.present()
    }

    /// Blank overlay and zero count, used when the camera stops.
    pub fn reset(&self, surface: &mut dyn Surface) -> Result<()> {
        surface.set_glow(None);
        surface.clear()?;
        surface.display_count(&count_text(0));
        surface.present()
    }

    fn draw_roi(&self, surface: &mut dyn Surface, roi: &RoiEditor) -> Result<()> {
        let points = roi.points();
        match roi.state() {
            EditorState::Idle => Ok(()),
            // A single point has no visible segment yet.
            EditorState::Collecting if points.len() < 2 => Ok(()),
            EditorState::Collecting => surface.stroke_polyline(points, false, &self.stroke()),
            EditorState::Complete => surface.stroke_polyline(points, true, &self.stroke()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Size};
    use crate::render::{DrawCommand, RecordingSurface};

    fn person(x: f64, y: f64, confidence: f32) -> Detection {
        Detection::new("person", confidence, BoundingBox::new(x, y, 20.0, 40.0))
    }

    fn collecting(points: &[(f64, f64)]) -> RoiEditor {
        let mut editor = RoiEditor::new();
        editor.begin_editing();
        let size = Size::new(100.0, 100.0);
        for &(x, y) in points {
            editor.add_point(Point::new(x, y), size, size);
        }
        editor
    }

    #[test]
    fn pluralizes_count_text() {
        assert_eq!(count_text(0), "0 people currently enjoying the lab");
        assert_eq!(count_text(1), "1 person currently enjoying the lab");
        assert_eq!(count_text(2), "2 people currently enjoying the lab");
        for n in [0usize, 2, 3, 10, 101] {
            assert!(count_text(n).contains("people"), "count {}", n);
        }
    }

    #[test]
    fn render_draws_boxes_labels_and_count() {
        let renderer = Renderer::default();
        let mut surface = RecordingSurface::new();
        let detections = vec![person(10.0, 50.0, 0.874), person(60.0, 50.0, 0.5)];

        renderer
            .render(&mut surface, &RoiEditor::new(), &detections, 2)
            .unwrap();

        let commands = surface.commands();
        assert_eq!(commands[0], DrawCommand::Clear);
        let rects: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Rect { rect, glow, .. } => Some((*rect, *glow)),
                _ => None,
            })
            .collect();
        assert_eq!(rects.len(), 2);
        assert!(rects.iter().all(|(_, glow)| glow.is_some()));

        let labels: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, at, .. } => Some((text.clone(), *at)),
                _ => None,
            })
            .collect();
        assert_eq!(labels[0], ("87%".to_string(), Point::new(10.0, 40.0)));
        assert_eq!(labels[1].0, "50%");
        assert_eq!(surface.count_text(), Some("2 people currently enjoying the lab"));
        assert_eq!(surface.presented(), 1);
    }

    #[test]
    fn roi_is_open_while_collecting_and_closed_when_complete() {
        let renderer = Renderer::default();
        let mut surface = RecordingSurface::new();

        renderer
            .render_roi(&mut surface, &collecting(&[(0.0, 0.0), (50.0, 0.0), (50.0, 50.0)]))
            .unwrap();
        assert!(surface
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::Polyline { closed: false, points, .. } if points.len() == 3)));

        surface.take_commands();
        let complete = collecting(&[(0.0, 0.0), (50.0, 0.0), (50.0, 50.0), (0.0, 50.0)]);
        renderer.render_roi(&mut surface, &complete).unwrap();
        assert!(surface
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::Polyline { closed: true, points, .. } if points.len() == 4)));
    }

    #[test]
    fn idle_and_single_point_roi_draw_nothing() {
        let renderer = Renderer::default();
        let mut surface = RecordingSurface::new();

        renderer.render_roi(&mut surface, &RoiEditor::new()).unwrap();
        renderer
            .render_roi(&mut surface, &collecting(&[(5.0, 5.0)]))
            .unwrap();
        assert!(surface
            .commands()
            .iter()
            .all(|c| !matches!(c, DrawCommand::Polyline { .. })));
    }

    #[test]
    fn reset_clears_and_zeroes_count() {
        let renderer = Renderer::default();
        let mut surface = RecordingSurface::new();
        renderer
            .render(&mut surface, &RoiEditor::new(), &[person(0.0, 20.0, 0.9)], 1)
            .unwrap();
        renderer.reset(&mut surface).unwrap();
        assert_eq!(surface.commands().last(), Some(&DrawCommand::Clear));
        assert_eq!(surface.count_text(), Some("0 people currently enjoying the lab"));
    }
}
