use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Backend that replays a fixed script, one entry per `detect` call.
///
/// Once the script is exhausted every call returns no detections. Used to
/// exercise loop behavior around provider failures.
#[derive(Default)]
pub struct ScriptedBackend {
    script: VecDeque<Step>,
    calls: u64,
}

enum Step {
    Detect(Vec<Detection>),
    Fail(String),
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next call returns `detections`.
    pub fn then_detect(mut self, detections: Vec<Detection>) -> Self {
        self.script.push_back(Step::Detect(detections));
        self
    }

    /// Next call fails with `message`.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.script.push_back(Step::Fail(message.to_string()));
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Step::Detect(detections)) => Ok(detections),
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    #[test]
    fn replays_script_in_order() {
        let frame = Frame::from_rgb(vec![0u8; 3], 1, 1, 1).unwrap();
        let person = Detection::new("person", 0.9, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        let mut backend = ScriptedBackend::new()
            .then_fail("bad frame")
            .then_detect(vec![person.clone()]);

        assert!(backend.detect(&frame).is_err());
        assert_eq!(backend.detect(&frame).unwrap(), vec![person]);
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.calls(), 3);
    }
}
