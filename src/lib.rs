//! ROI People Counter
//!
//! Counts objects of a tracked class (people by default) inside a
//! user-drawn quadrilateral on a live camera feed.
//!
//! # Architecture
//!
//! A single detection loop repeatedly:
//!
//! 1. Checks the camera is running, the model is loaded and a frame is ready
//! 2. Runs a detector backend on the current frame
//! 3. Keeps tracked-label detections whose box center lies inside the ROI
//! 4. Draws boxes, confidence labels, the ROI and a count line on a surface
//!
//! Frames and detections live for one cycle; nothing is persisted.
//!
//! # Module Structure
//!
//! - `geometry`: points, sizes, boxes, display→source transform, containment
//! - `roi`: four-point ROI editor
//! - `frame`: captured frames
//! - `ingest`: capture sources (synthetic, image directories)
//! - `detect`: detector backends and registry
//! - `render`: overlay renderer and drawing surfaces
//! - `counter`: detection loop, input events, frame pacing
//! - `config`: file + env configuration

pub mod config;
pub mod counter;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod render;
pub mod roi;

pub use config::CounterConfig;
pub use counter::{
    filter_detections, CounterState, CycleOutcome, DetectionLoop, FramePacer, InputEvent,
    LoopStats, SkipReason,
};
pub use detect::{BackendRegistry, Detection, DetectorBackend, SharedBackend};
pub use frame::Frame;
pub use geometry::{contains_point, transform_point, BoundingBox, Point, Size};
pub use ingest::{open_source, CaptureSource, SourceConfig};
pub use render::{count_text, Renderer, Surface};
pub use roi::{EditorState, PointOutcome, RoiEditor};
