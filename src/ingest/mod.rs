//! Capture sources.
//!
//! A capture source owns the camera side of the pipeline: start/stop
//! lifecycle, frame readiness and the current frame. The detection loop only
//! reads readiness and frames; device selection happens before a source is
//! built.
//!
//! Sources:
//! - `stub://<name>` synthetic frames (tests, demos)
//! - a local directory of still images (feature: ingest-file)
//!
//! Sources MUST NOT:
//! - Store frames to disk
//! - Log frame content

#[cfg(feature = "ingest-file")]
pub mod file;
pub mod synthetic;

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::geometry::Size;

#[cfg(feature = "ingest-file")]
pub use file::ImageDirSource;
pub use synthetic::SyntheticSource;

/// Configuration shared by all capture sources.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<name>` or a local directory path.
    pub url: String,
    /// Frame width (synthetic frames; image sources report their own).
    pub width: u32,
    /// Frame height (synthetic frames; image sources report their own).
    pub height: u32,
    /// Polls after `start` during which no frame is decodable yet.
    pub warmup_polls: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 1280,
            height: 720,
            warmup_polls: 3,
        }
    }
}

/// Frame statistics for health logging.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub not_ready_polls: u64,
    pub url: String,
}

/// Camera-side collaborator of the detection loop.
pub trait CaptureSource: Send {
    /// Begin producing frames. Frames may take a few polls to become ready.
    fn start(&mut self) -> Result<()>;

    /// Stop producing frames. Idempotent.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// The latest decodable frame, or `None` while stopped or not yet ready.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Native size of the frames this source produces.
    fn frame_size(&self) -> Size;

    fn stats(&self) -> SourceStats;
}

/// Build the source named by `config.url`.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn CaptureSource>> {
    if config.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config)?));
    }
    if !is_local_path(&config.url) {
        return Err(anyhow!(
            "capture source '{}' is not supported (use stub://<name> or a local directory)",
            config.url
        ));
    }
    #[cfg(feature = "ingest-file")]
    {
        Ok(Box::new(ImageDirSource::new(config)?))
    }
    #[cfg(not(feature = "ingest-file"))]
    {
        Err(anyhow!(
            "image directory sources require the ingest-file feature"
        ))
    }
}

fn is_local_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
