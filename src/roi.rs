//! ROI editor.
//!
//! The editor collects up to four user picks and closes them into the
//! quadrilateral used for containment filtering. Picks arrive in display
//! space and are stored in source space.

use crate::geometry::{transform_point, Point, Size};

/// Number of points in a complete ROI.
pub const ROI_POINTS: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorState {
    #[default]
    Idle,
    Collecting,
    Complete,
}

/// Result of feeding one pick into the editor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointOutcome {
    /// Point stored; `remaining` more are needed to close the ROI.
    Added { at: Point, remaining: usize },
    /// Fourth point stored; the ROI is closed and editing has ended.
    Completed { at: Point },
    /// Not collecting (or the display size was empty); nothing changed.
    Ignored,
}

/// Owns ROI point accumulation.
///
/// Invariant: `points.len()` is 0 while `Idle`, 0..=3 while `Collecting`
/// and exactly 4 while `Complete`.
#[derive(Clone, Debug, Default)]
pub struct RoiEditor {
    state: EditorState,
    points: Vec<Point>,
}

impl RoiEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Editor already holding a closed ROI in source coordinates.
    pub fn with_polygon(polygon: [Point; ROI_POINTS]) -> Self {
        Self {
            state: EditorState::Complete,
            points: polygon.to_vec(),
        }
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn is_collecting(&self) -> bool {
        self.state == EditorState::Collecting
    }

    /// Points recorded so far, in source space and pick order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The closed ROI, only once all four points exist.
    pub fn polygon(&self) -> Option<&[Point; ROI_POINTS]> {
        if self.state != EditorState::Complete {
            return None;
        }
        self.points.as_slice().try_into().ok()
    }

    /// Start (or restart) collecting from an empty point list.
    pub fn begin_editing(&mut self) {
        self.points.clear();
        self.state = EditorState::Collecting;
    }

    /// Record one pick made on a `display` surface showing a `source` frame.
    pub fn add_point(&mut self, display_point: Point, display: Size, source: Size) -> PointOutcome {
        if self.state != EditorState::Collecting || display.is_empty() {
            return PointOutcome::Ignored;
        }

        let at = transform_point(display_point, display, source);
        self.points.push(at);

        if self.points.len() == ROI_POINTS {
            self.state = EditorState::Complete;
            log::info!("roi complete: {:?}", self.points);
            PointOutcome::Completed { at }
        } else {
            PointOutcome::Added {
                at,
                remaining: ROI_POINTS - self.points.len(),
            }
        }
    }

    /// ROI-mode button: every press starts a fresh collection.
    pub fn cancel_or_toggle(&mut self) {
        match self.state {
            EditorState::Idle => log::debug!("roi editing started"),
            EditorState::Collecting | EditorState::Complete => {
                log::debug!("roi editing restarted, {} points dropped", self.points.len())
            }
        }
        self.begin_editing();
    }
}
