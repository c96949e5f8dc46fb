use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::geometry::Point;
use crate::ingest::SourceConfig;
use crate::render::{Color, Theme};
use crate::roi::ROI_POINTS;

const DEFAULT_SOURCE_URL: &str = "stub://lab_camera";
const DEFAULT_SOURCE_WIDTH: u32 = 1280;
const DEFAULT_SOURCE_HEIGHT: u32 = 720;
const DEFAULT_WARMUP_POLLS: u32 = 3;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_TRACKED_LABEL: &str = "person";
const DEFAULT_REFRESH_HZ: u32 = 60;

#[derive(Debug, Deserialize, Default)]
struct CounterConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    roi: Option<Vec<Point>>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    warmup_polls: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    tracked_label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    refresh_hz: Option<u32>,
    accent_color: Option<String>,
    font_path: Option<PathBuf>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CounterConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    /// Preset ROI in source coordinates.
    pub roi: Option<[Point; ROI_POINTS]>,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub warmup_polls: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub tracked_label: String,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub refresh_hz: u32,
    /// Box, label and ROI color.
    pub accent: Color,
    pub font_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
}

impl SourceSettings {
    pub fn to_source_config(&self) -> SourceConfig {
        SourceConfig {
            url: self.url.clone(),
            width: self.width,
            height: self.height,
            warmup_polls: self.warmup_polls,
        }
    }
}

impl DisplaySettings {
    pub fn theme(&self) -> Theme {
        Theme {
            accent: self.accent,
            ..Theme::default()
        }
    }
}

impl CounterConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("COUNTER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, but with an explicit file instead of `COUNTER_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CounterConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source = SourceSettings {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            width: source_file.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            warmup_polls: source_file.warmup_polls.unwrap_or(DEFAULT_WARMUP_POLLS),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: detector_file.model_path,
            input_width: detector_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: detector_file.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            tracked_label: detector_file
                .tracked_label
                .unwrap_or_else(|| DEFAULT_TRACKED_LABEL.to_string()),
        };

        let roi = match file.roi {
            Some(points) => Some(roi_from_points(points)?),
            None => None,
        };

        let display_file = file.display.unwrap_or_default();
        let accent = match display_file.accent_color.as_deref() {
            Some(hex) => Color::from_hex(hex)
                .ok_or_else(|| anyhow!("accent color must be #rrggbb, got '{}'", hex))?,
            None => Theme::default().accent,
        };
        let display = DisplaySettings {
            refresh_hz: display_file.refresh_hz.unwrap_or(DEFAULT_REFRESH_HZ),
            accent,
            font_path: display_file.font_path,
            snapshot_path: display_file.snapshot_path,
        };

        Ok(Self {
            source,
            detector,
            roi,
            display,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("COUNTER_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(backend) = std::env::var("COUNTER_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("COUNTER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(label) = std::env::var("COUNTER_TRACKED_LABEL") {
            if !label.trim().is_empty() {
                self.detector.tracked_label = label.trim().to_string();
            }
        }
        if let Ok(roi) = std::env::var("COUNTER_ROI") {
            if !roi.trim().is_empty() {
                self.roi = Some(parse_roi(&roi)?);
            }
        }
        if let Ok(hz) = std::env::var("COUNTER_REFRESH_HZ") {
            self.display.refresh_hz = hz
                .trim()
                .parse()
                .map_err(|_| anyhow!("COUNTER_REFRESH_HZ must be an integer number of hertz"))?;
        }
        if let Ok(path) = std::env::var("COUNTER_SNAPSHOT_PATH") {
            if !path.trim().is_empty() {
                self.display.snapshot_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.detector.tracked_label = self.detector.tracked_label.trim().to_string();
        if self.detector.tracked_label.is_empty() {
            return Err(anyhow!("tracked label must not be empty"));
        }
        if self.display.refresh_hz == 0 {
            return Err(anyhow!("refresh rate must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source frame size must be greater than zero"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        let threshold = self.detector.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1, got {}",
                threshold
            ));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("backend 'tract' requires a model path"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CounterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn roi_from_points(points: Vec<Point>) -> Result<[Point; ROI_POINTS]> {
    let len = points.len();
    points
        .try_into()
        .map_err(|_| anyhow!("roi needs exactly {} points, got {}", ROI_POINTS, len))
}

/// Parse `"x,y;x,y;x,y;x,y"` into an ROI in source coordinates.
pub fn parse_roi(value: &str) -> Result<[Point; ROI_POINTS]> {
    let pair = Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$")?;
    let points = value
        .split(';')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| -> Result<Point> {
            let caps = pair
                .captures(entry)
                .ok_or_else(|| anyhow!("invalid roi point '{}', expected x,y", entry.trim()))?;
            Ok(Point::new(caps[1].parse()?, caps[2].parse()?))
        })
        .collect::<Result<Vec<_>>>()?;
    roi_from_points(points)
}
