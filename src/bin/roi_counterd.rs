//! roi_counterd - ROI people counter daemon
//!
//! This daemon:
//! 1. Loads configuration (file + env + flags)
//! 2. Loads the detector backend and opens the capture source
//! 3. Runs the detection loop at the display refresh rate
//! 4. Accepts camera/ROI commands on stdin and stops on Ctrl-C or `quit`
//!
//! Stdin commands:
//!   start | stop | toggle      camera control
//!   roi                        start (or restart) picking ROI points
//!   pick X Y W H               click at (X, Y) on a W x H display
//!   quit                       shut down

use anyhow::{anyhow, Result};
use clap::Parser;
use regex::Regex;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use roi_counter::config::{CounterConfig, DetectorSettings};
use roi_counter::detect::{BackendRegistry, StubBackend};
use roi_counter::render::{RecordingSurface, Renderer, Surface};
use roi_counter::{
    open_source, CaptureSource, DetectionLoop, FramePacer, InputEvent, Point, RoiEditor, Size,
};

#[cfg(feature = "backend-tract")]
use roi_counter::detect::TractBackend;
#[cfg(feature = "render-image")]
use roi_counter::render::ImageSurface;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "roi_counterd",
    about = "Count people inside a region of interest on a live camera feed"
)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(long, env = "COUNTER_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// UI mode for stderr progress
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,

    /// Do not read commands from stdin
    #[arg(long)]
    no_stdin: bool,

    /// Start the camera immediately
    #[arg(long)]
    start: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::detect(args.ui);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        CounterConfig::load_from(args.config.as_deref())?
    };

    let registry = {
        let _stage = ui.stage("Load detection model");
        load_backends(&cfg.detector)?
    };
    let backend = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend registered"))?;

    let source = {
        let _stage = ui.stage("Open capture source");
        open_source(cfg.source.to_source_config())?
    };
    ui.note(&format!(
        "source={} backend={} label={} refresh={}Hz",
        cfg.source.url, cfg.detector.backend, cfg.detector.tracked_label, cfg.display.refresh_hz
    ));

    #[cfg(feature = "render-image")]
    if cfg.display.snapshot_path.is_some() || cfg.display.font_path.is_some() {
        let size = source.frame_size();
        let mut surface = ImageSurface::new(size.width as u32, size.height as u32);
        if let Some(font) = &cfg.display.font_path {
            surface = surface.with_font_file(font)?;
        }
        if let Some(path) = &cfg.display.snapshot_path {
            surface = surface.with_snapshot_path(path);
        }
        return run_counter(&args, &cfg, source, surface, backend);
    }

    #[cfg(not(feature = "render-image"))]
    if cfg.display.snapshot_path.is_some() || cfg.display.font_path.is_some() {
        log::warn!("snapshot and font settings need the render-image feature; ignoring");
    }

    run_counter(&args, &cfg, source, RecordingSurface::new(), backend)
}

fn load_backends(detector: &DetectorSettings) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match detector.backend.as_str() {
        "stub" => registry.register(StubBackend::new()),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = detector
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("backend 'tract' requires a model path"))?;
            let backend =
                TractBackend::new(model_path, detector.input_width, detector.input_height)?
                    .with_threshold(detector.confidence_threshold);
            registry.register(backend);
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => {
            return Err(anyhow!(
                "backend 'tract' needs roi_counterd built with the backend-tract feature"
            ))
        }
        other => return Err(anyhow!("unknown detector backend '{}'", other)),
    }
    registry.warm_up_all()?;
    log::info!("detector backends loaded: {:?}", registry.list());
    Ok(registry)
}

fn run_counter<S: Surface>(
    args: &Args,
    cfg: &CounterConfig,
    source: Box<dyn CaptureSource>,
    surface: S,
    backend: roi_counter::SharedBackend,
) -> Result<()> {
    let roi = match cfg.roi {
        Some(polygon) => RoiEditor::with_polygon(polygon),
        None => RoiEditor::new(),
    };
    let mut counter = DetectionLoop::new(source, surface, &cfg.detector.tracked_label)
        .with_backend(backend)
        .with_roi(roi)
        .with_renderer(Renderer::new(cfg.display.theme()));

    let shutdown_tx = counter.input_sender();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(InputEvent::Shutdown);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    if !args.no_stdin {
        spawn_stdin_reader(counter.input_sender())?;
    }
    if args.start {
        counter.handle_input(InputEvent::StartCamera)?;
    }

    log::info!(
        "roi_counterd running. counting '{}' on {}",
        cfg.detector.tracked_label,
        cfg.source.url
    );
    let mut pacer = FramePacer::from_hz(cfg.display.refresh_hz);
    let stats = counter.run(&mut pacer);
    log::info!(
        "roi_counterd stopped: cycles={} rendered={} skipped={} failed={}",
        stats.cycles,
        stats.rendered,
        stats.skipped,
        stats.failed
    );
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<InputEvent>) -> Result<()> {
    let parser = CommandParser::new()?;
    std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("stdin read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parser.parse(&line) {
                    Some(event) => {
                        let stop = event == InputEvent::Shutdown;
                        if tx.send(event).is_err() || stop {
                            break;
                        }
                    }
                    None => log::warn!("unknown command: {}", line.trim()),
                }
            }
        })?;
    Ok(())
}

struct CommandParser {
    pick: Regex,
}

impl CommandParser {
    fn new() -> Result<Self> {
        let num = r"(-?\d+(?:\.\d+)?)";
        let pick = Regex::new(&format!(r"^pick\s+{num}\s+{num}\s+{num}\s+{num}$"))?;
        Ok(Self { pick })
    }

    fn parse(&self, line: &str) -> Option<InputEvent> {
        let line = line.trim().to_lowercase();
        match line.as_str() {
            "start" => return Some(InputEvent::StartCamera),
            "stop" => return Some(InputEvent::StopCamera),
            "toggle" => return Some(InputEvent::ToggleCamera),
            "roi" => return Some(InputEvent::ToggleRoi),
            "quit" | "exit" => return Some(InputEvent::Shutdown),
            _ => {}
        }
        let caps = self.pick.captures(&line)?;
        let value = |i: usize| caps[i].parse::<f64>().ok();
        Some(InputEvent::PickPoint {
            at: Point::new(value(1)?, value(2)?),
            display: Size::new(value(3)?, value(4)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        let parser = CommandParser::new().unwrap();
        assert_eq!(parser.parse("start"), Some(InputEvent::StartCamera));
        assert_eq!(parser.parse("  STOP "), Some(InputEvent::StopCamera));
        assert_eq!(parser.parse("roi"), Some(InputEvent::ToggleRoi));
        assert_eq!(parser.parse("quit"), Some(InputEvent::Shutdown));
        assert_eq!(parser.parse("dance"), None);
    }

    #[test]
    fn parses_pick_with_display_size() {
        let parser = CommandParser::new().unwrap();
        assert_eq!(
            parser.parse("pick 50 60.5 200 100"),
            Some(InputEvent::PickPoint {
                at: Point::new(50.0, 60.5),
                display: Size::new(200.0, 100.0),
            })
        );
        assert_eq!(parser.parse("pick 1 2 3"), None);
    }
}
