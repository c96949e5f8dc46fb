use crate::geometry::BoundingBox;

/// One labeled box produced by a backend for a single frame.
///
/// Detections carry no identity and are dropped at the end of the cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Model score in `0.0..=1.0`.
    pub confidence: f32,
    /// Source-frame pixels.
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }

    /// Confidence as a whole percentage, rounded half away from zero.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_and_rounded() {
        let d = Detection::new("person", 0.866, BoundingBox::default());
        assert_eq!(d.confidence_percent(), 87);
        let over = Detection::new("person", 1.4, BoundingBox::default());
        assert_eq!(over.confidence, 1.0);
        assert_eq!(over.confidence_percent(), 100);
    }
}
