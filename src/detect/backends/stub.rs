use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::DetectorBackend;
use crate::detect::backends::COCO_PERSON;
use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::geometry::BoundingBox;

const WALKERS: usize = 4;
const DISTRACTOR_LABEL: &str = "chair";

/// Stub backend for demos and tests.
///
/// Ignores pixel content and simulates a few people walking across the
/// frame, plus one static non-person object. Output is deterministic for a
/// given seed and frame size.
pub struct StubBackend {
    rng: StdRng,
    walkers: Vec<Walker>,
    frame_size: Option<(u32, u32)>,
}

#[derive(Clone, Debug)]
struct Walker {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    width: f64,
    height: f64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_seed(0x5eed)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            walkers: Vec::new(),
            frame_size: None,
        }
    }

    fn spawn(&mut self, width: u32, height: u32) {
        let (w, h) = (width as f64, height as f64);
        self.walkers = (0..WALKERS)
            .map(|_| {
                let width = w * self.rng.gen_range(0.06..0.12);
                let height = h * self.rng.gen_range(0.25..0.45);
                Walker {
                    x: self.rng.gen_range(0.0..(w - width).max(1.0)),
                    y: self.rng.gen_range(0.0..(h - height).max(1.0)),
                    vx: self.rng.gen_range(-0.01..0.01) * w,
                    vy: self.rng.gen_range(-0.004..0.004) * h,
                    width,
                    height,
                }
            })
            .collect();
        self.frame_size = Some((width, height));
    }

    fn step(&mut self, width: u32, height: u32) {
        let (w, h) = (width as f64, height as f64);
        for walker in &mut self.walkers {
            walker.x += walker.vx;
            walker.y += walker.vy;
            if walker.x < 0.0 || walker.x + walker.width > w {
                walker.vx = -walker.vx;
                walker.x = walker.x.clamp(0.0, (w - walker.width).max(0.0));
            }
            if walker.y < 0.0 || walker.y + walker.height > h {
                walker.vy = -walker.vy;
                walker.y = walker.y.clamp(0.0, (h - walker.height).max(0.0));
            }
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let size = (frame.width, frame.height);
        if self.frame_size != Some(size) {
            self.spawn(frame.width, frame.height);
        } else {
            self.step(frame.width, frame.height);
        }

        let mut detections = Vec::with_capacity(self.walkers.len() + 1);
        for walker in &self.walkers {
            let confidence = self.rng.gen_range(0.55..0.97);
            detections.push(Detection::new(
                COCO_PERSON,
                confidence,
                BoundingBox::new(walker.x, walker.y, walker.width, walker.height),
            ));
        }
        let (w, h) = (frame.width as f64, frame.height as f64);
        detections.push(Detection::new(
            DISTRACTOR_LABEL,
            0.71,
            BoundingBox::new(w * 0.45, h * 0.7, w * 0.1, h * 0.2),
        ));
        Ok(detections)
    }
}
