#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::backends::COCO_PERSON;
use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::geometry::BoundingBox;

/// Values per output row: `x1, y1, x2, y2, score, class_id`.
const ROW_LEN: usize = 6;

/// Tract-based backend for ONNX object detectors.
///
/// Expects a model with one `1x3xHxW` f32 input (RGB, 0..1) and one output
/// of shape `[1, N, 6]` or `[N, 6]`, boxes in model-input pixels. Frames of
/// any size are resampled to the input size and boxes are scaled back.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.5,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Nearest-neighbour resample into a normalized NCHW tensor.
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("frame has zero size"));
        }
        let pixels = frame.pixels();
        let (src_w, src_h) = (frame.width as usize, frame.height as usize);
        let (dst_w, dst_h) = (self.width as usize, self.height as usize);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, dst_h, dst_w),
            |(_, channel, y, x)| {
                let sx = (x * src_w / dst_w).min(src_w - 1);
                let sy = (y * src_h / dst_h).min(src_h - 1);
                pixels[(sy * src_w + sx) * 3 + channel] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    fn extract_detections(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let values: Vec<f32> = rows.iter().copied().collect();
        if values.len() % ROW_LEN != 0 {
            return Err(anyhow!(
                "model output has {} values, expected a multiple of {}",
                values.len(),
                ROW_LEN
            ));
        }

        let scale_x = frame.width as f64 / self.width as f64;
        let scale_y = frame.height as f64 / self.height as f64;

        Ok(values
            .chunks_exact(ROW_LEN)
            .filter(|row| row[4] >= self.confidence_threshold)
            .map(|row| {
                let bbox = BoundingBox::from_corners(
                    row[0] as f64 * scale_x,
                    row[1] as f64 * scale_y,
                    row[2] as f64 * scale_x,
                    row[3] as f64 * scale_y,
                );
                Detection::new(class_label(row[5]), row[4], bbox)
            })
            .collect())
    }
}

fn class_label(class_id: f32) -> String {
    match class_id.round() as i64 {
        0 => COCO_PERSON.to_string(),
        other => format!("class_{}", other),
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_detections(outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::from_rgb(
            vec![0u8; (self.width * self.height * 3) as usize],
            self.width,
            self.height,
            0,
        )?;
        self.detect(&blank).map(|_| ())
    }
}
