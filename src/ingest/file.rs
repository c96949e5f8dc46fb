//! Still-image directory source.
//!
//! Cycles through the PNG/JPEG files of a local directory in name order,
//! one file per poll. Useful for replaying captured scenes through the
//! counter without a camera.
//!
//! This source MUST NOT:
//! - Fetch remote URLs
//! - Write decoded frames anywhere

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{CaptureSource, SourceConfig, SourceStats};
use crate::frame::Frame;
use crate::geometry::Size;

pub struct ImageDirSource {
    config: SourceConfig,
    files: Vec<PathBuf>,
    next_index: usize,
    active: bool,
    frame_count: u64,
    not_ready_polls: u64,
    frame_size: Size,
}

impl ImageDirSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let dir = Path::new(&config.url);
        let files = list_images(dir)?;
        if files.is_empty() {
            return Err(anyhow!("no PNG/JPEG images found in {}", dir.display()));
        }
        let (width, height) = image::image_dimensions(&files[0])
            .with_context(|| format!("failed to read {}", files[0].display()))?;
        Ok(Self {
            config,
            files,
            next_index: 0,
            active: false,
            frame_count: 0,
            not_ready_polls: 0,
            frame_size: Size::new(width as f64, height as f64),
        })
    }

    fn decode(&self, path: &Path) -> Result<(Vec<u8>, u32, u32)> {
        let rgb = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok((rgb.into_raw(), width, height))
    }
}

impl CaptureSource for ImageDirSource {
    fn start(&mut self) -> Result<()> {
        self.active = true;
        log::info!(
            "ImageDirSource: started {} ({} images)",
            self.config.url,
            self.files.len()
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if !self.active {
            return None;
        }
        let path = self.files[self.next_index].clone();
        self.next_index = (self.next_index + 1) % self.files.len();

        let decoded = self
            .decode(&path)
            .and_then(|(pixels, width, height)| {
                Frame::from_rgb(pixels, width, height, self.frame_count + 1)
            });
        match decoded {
            Ok(frame) => {
                self.frame_count += 1;
                self.frame_size = frame.size();
                Some(frame)
            }
            Err(e) => {
                self.not_ready_polls += 1;
                log::warn!("ImageDirSource: {}", e);
                None
            }
        }
    }

    fn frame_size(&self) -> Size {
        self.frame_size
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            not_ready_polls: self.not_ready_polls,
            url: self.config.url.clone(),
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read image directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            .unwrap_or(false);
        if is_image && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
