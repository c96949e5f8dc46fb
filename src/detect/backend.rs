use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// The model behind a backend is a black box: a frame goes in, labeled
/// boxes with confidence scores come out, in source-frame pixels.
///
/// Implementations must treat the frame as read-only and must not keep its
/// pixels beyond the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run one detection pass. A failure only affects the current cycle.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the first cycle.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
