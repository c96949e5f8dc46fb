//! Captured frames.
//!
//! A `Frame` is the unit handed from a capture source to a detector backend.
//! Frames live for one detection cycle and are dropped afterwards; nothing in
//! the crate retains them across cycles.

use anyhow::{anyhow, Result};

use crate::geometry::Size;

/// Packed RGB8 frame in source-frame pixel space.
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Per-source sequence number, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Wrap packed RGB bytes. Fails if the buffer does not match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Read-only RGB pixels. Backends must not keep the slice past `detect`.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// RGB triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel content stays out of logs.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::from_rgb(vec![0u8; 10], 2, 2, 1).is_err());
        assert!(Frame::from_rgb(vec![0u8; 12], 2, 2, 1).is_ok());
    }

    #[test]
    fn pixel_lookup() {
        let mut data = vec![0u8; 2 * 2 * 3];
        data[9..12].copy_from_slice(&[1, 2, 3]);
        let frame = Frame::from_rgb(data, 2, 2, 7).unwrap();
        assert_eq!(frame.pixel(1, 1), Some([1, 2, 3]));
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.size(), Size::new(2.0, 2.0));
    }

    #[test]
    fn debug_omits_pixels() {
        let frame = Frame::from_rgb(vec![255u8; 3], 1, 1, 1).unwrap();
        let rendered = format!("{:?}", frame);
        assert!(!rendered.contains("255"));
    }
}
