//! Synthetic `stub://` source.
//!
//! Produces a slowly shifting gradient so consecutive frames differ. After
//! each `start`, the first `warmup_polls` polls report no frame, the way a
//! real camera needs a moment before its first decodable frame.

use anyhow::{anyhow, Result};

use super::{CaptureSource, SourceConfig, SourceStats};
use crate::frame::Frame;
use crate::geometry::Size;

pub struct SyntheticSource {
    config: SourceConfig,
    active: bool,
    polls_since_start: u32,
    frame_count: u64,
    not_ready_polls: u64,
    /// Simulated scene state, bumped every 50 frames.
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!("synthetic source needs a stub:// url"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic frame size must be non-zero"));
        }
        Ok(Self {
            config,
            active: false,
            polls_since_start: 0,
            frame_count: 0,
            not_ready_polls: 0,
            scene_state: 0,
        })
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl CaptureSource for SyntheticSource {
    fn start(&mut self) -> Result<()> {
        self.active = true;
        self.polls_since_start = 0;
        log::info!("SyntheticSource: started {}", self.config.url);
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            log::info!("SyntheticSource: stopped {}", self.config.url);
        }
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if !self.active {
            return None;
        }
        if self.polls_since_start < self.config.warmup_polls {
            self.polls_since_start += 1;
            self.not_ready_polls += 1;
            return None;
        }

        self.frame_count += 1;
        let pixels = self.generate_pixels();
        match Frame::from_rgb(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        ) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("SyntheticSource: dropped frame: {}", e);
                None
            }
        }
    }

    fn frame_size(&self) -> Size {
        Size::new(self.config.width as f64, self.config.height as f64)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            not_ready_polls: self.not_ready_polls,
            url: self.config.url.clone(),
        }
    }
}
