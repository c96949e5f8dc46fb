//! Detection loop.
//!
//! One `DetectionLoop` drives one camera feed. Each `tick` is a single cycle:
//!
//! 1. Apply pending user input (camera start/stop, ROI edits)
//! 2. Guard: camera running, model loaded, frame decodable; otherwise skip
//! 3. Run the detector on the current frame (the only blocking call)
//! 4. Apply input that arrived meanwhile; drop the results if the camera stopped
//! 5. Keep tracked-label detections whose box center lies in the ROI
//! 6. Render boxes, labels, ROI and the count text
//!
//! `run` repeats `tick` forever, pacing cycles with a [`FramePacer`] and
//! rescheduling whatever the outcome. Only a `Shutdown` input ends it.
//!
//! All state lives in [`CounterState`], owned by the loop. Other threads
//! talk to the loop only through [`InputEvent`]s, so no locking is needed.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::detect::{Detection, SharedBackend};
use crate::geometry::{contains_point, Point, Size};
use crate::ingest::CaptureSource;
use crate::render::{count_text, Renderer, Surface, WAITING_TEXT};
use crate::roi::{PointOutcome, RoiEditor, ROI_POINTS};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// User input delivered to a running loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    StartCamera,
    StopCamera,
    ToggleCamera,
    /// ROI-mode button: (re)start collecting points.
    ToggleRoi,
    /// A click on the display surface, with that surface's current size.
    PickPoint { at: Point, display: Size },
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    CameraStopped,
    ModelNotLoaded,
    FrameNotReady,
    /// Detection finished after the camera was stopped; results dropped.
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Rendered { count: usize },
    Skipped(SkipReason),
    /// Detector or surface error; this cycle drew nothing.
    Failed,
    Shutdown,
}

/// Counters for health logging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub rendered: u64,
    pub skipped: u64,
    pub failed: u64,
    pub last_count: Option<usize>,
}

/// State shared by the detection cycle and the input handlers.
pub struct CounterState {
    pub roi: RoiEditor,
    running: bool,
    backend: Option<SharedBackend>,
    shutdown: bool,
}

impl CounterState {
    pub fn new() -> Self {
        Self {
            roi: RoiEditor::new(),
            running: false,
            backend: None,
            shutdown: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn model_loaded(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }
}

impl Default for CounterState {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep detections with the tracked label whose box center is inside `roi`.
///
/// Without a closed ROI every label match passes.
pub fn filter_detections(
    detections: &[Detection],
    tracked_label: &str,
    roi: Option<&[Point; ROI_POINTS]>,
) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.label == tracked_label)
        .filter(|d| roi.map_or(true, |polygon| contains_point(polygon, d.bbox.center())))
        .cloned()
        .collect()
}

/// Sleeps out the rest of each refresh slot so cycles never overlap and never
/// run faster than the display can show them.
pub struct FramePacer {
    interval: Duration,
    last_wake: Option<Instant>,
}

impl FramePacer {
    pub fn from_hz(hz: u32) -> Self {
        let interval = if hz == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / hz as f64)
        };
        Self {
            interval,
            last_wake: None,
        }
    }

    /// No sleeping between cycles; only yields the thread.
    pub fn unpaced() -> Self {
        Self::from_hz(0)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next slot. Returns immediately if the cycle overran.
    pub fn wait(&mut self) {
        if self.interval.is_zero() {
            std::thread::yield_now();
        } else if let Some(last) = self.last_wake {
            let due = last + self.interval;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.last_wake = Some(Instant::now());
    }
}

pub struct DetectionLoop<S: Surface> {
    state: CounterState,
    source: Box<dyn CaptureSource>,
    renderer: Renderer,
    surface: S,
    tracked_label: String,
    input_tx: Sender<InputEvent>,
    input_rx: Receiver<InputEvent>,
    stats: LoopStats,
}

impl<S: Surface> DetectionLoop<S> {
    pub fn new(source: Box<dyn CaptureSource>, mut surface: S, tracked_label: &str) -> Self {
        let (input_tx, input_rx) = channel();
        surface.display_count(WAITING_TEXT);
        Self {
            state: CounterState::new(),
            source,
            renderer: Renderer::default(),
            surface,
            tracked_label: tracked_label.to_string(),
            input_tx,
            input_rx,
            stats: LoopStats::default(),
        }
    }

    pub fn with_backend(mut self, backend: SharedBackend) -> Self {
        self.load_backend(backend);
        self
    }

    /// Preset ROI in source coordinates.
    pub fn with_roi(mut self, roi: RoiEditor) -> Self {
        self.state.roi = roi;
        self
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Hand over a loaded model. Until then every cycle skips.
    pub fn load_backend(&mut self, backend: SharedBackend) {
        self.state.backend = Some(backend);
    }

    /// Sender for input handlers on other threads.
    pub fn input_sender(&self) -> Sender<InputEvent> {
        self.input_tx.clone()
    }

    pub fn state(&self) -> &CounterState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn source(&self) -> &dyn CaptureSource {
        self.source.as_ref()
    }

    /// Apply one input event right away.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::StartCamera => self.start_camera(),
            InputEvent::StopCamera => self.stop_camera(),
            InputEvent::ToggleCamera => {
                if self.state.running {
                    self.stop_camera()
                } else {
                    self.start_camera()
                }
            }
            InputEvent::ToggleRoi => {
                self.state.roi.cancel_or_toggle();
                self.renderer.render_roi(&mut self.surface, &self.state.roi)
            }
            InputEvent::PickPoint { at, display } => {
                let source_size = self.source.frame_size();
                match self.state.roi.add_point(at, display, source_size) {
                    PointOutcome::Ignored => {
                        log::debug!("pick at ({:.1}, {:.1}) ignored: not editing roi", at.x, at.y);
                        Ok(())
                    }
                    PointOutcome::Added { at, remaining } => {
                        log::info!(
                            "roi point ({:.1}, {:.1}) added, {} remaining",
                            at.x,
                            at.y,
                            remaining
                        );
                        self.renderer.render_roi(&mut self.surface, &self.state.roi)
                    }
                    PointOutcome::Completed { .. } => {
                        self.renderer.render_roi(&mut self.surface, &self.state.roi)
                    }
                }
            }
            InputEvent::Shutdown => {
                self.state.shutdown = true;
                Ok(())
            }
        }
    }

    fn start_camera(&mut self) -> Result<()> {
        if self.state.running {
            return Ok(());
        }
        self.source.start()?;
        self.state.running = true;
        log::info!("camera started");
        Ok(())
    }

    fn stop_camera(&mut self) -> Result<()> {
        if !self.state.running {
            return Ok(());
        }
        self.source.stop();
        self.state.running = false;
        self.stats.last_count = None;
        log::info!("camera stopped");
        self.renderer.reset(&mut self.surface)
    }

    fn apply_pending_inputs(&mut self) {
        while let Ok(event) = self.input_rx.try_recv() {
            if let Err(e) = self.handle_input(event) {
                log::warn!("input {:?} failed: {:#}", event, e);
            }
        }
    }

    /// Run one detection cycle.
    pub fn tick(&mut self) -> CycleOutcome {
        self.stats.cycles += 1;
        self.apply_pending_inputs();
        if self.state.shutdown {
            return CycleOutcome::Shutdown;
        }

        let outcome = self.cycle();
        match outcome {
            CycleOutcome::Rendered { .. } => self.stats.rendered += 1,
            CycleOutcome::Skipped(reason) => {
                log::trace!("cycle {} skipped: {:?}", self.stats.cycles, reason);
                self.stats.skipped += 1;
            }
            CycleOutcome::Failed => self.stats.failed += 1,
            CycleOutcome::Shutdown => {}
        }
        outcome
    }

    fn cycle(&mut self) -> CycleOutcome {
        if !self.state.running || !self.source.is_active() {
            return CycleOutcome::Skipped(SkipReason::CameraStopped);
        }
        let Some(backend) = self.state.backend.clone() else {
            return CycleOutcome::Skipped(SkipReason::ModelNotLoaded);
        };
        let Some(frame) = self.source.current_frame() else {
            return CycleOutcome::Skipped(SkipReason::FrameNotReady);
        };

        let result = match backend.lock() {
            Ok(mut guard) => guard.detect(&frame),
            Err(_) => Err(anyhow!("detector backend lock poisoned")),
        };
        let detections = match result {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("detection failed on frame {}: {:#}", frame.sequence, e);
                return CycleOutcome::Failed;
            }
        };
        drop(frame);

        // Input handlers may have run while the detector was busy.
        self.apply_pending_inputs();
        if self.state.shutdown {
            return CycleOutcome::Shutdown;
        }
        if !self.state.running {
            return CycleOutcome::Skipped(SkipReason::Discarded);
        }

        let filtered = filter_detections(&detections, &self.tracked_label, self.state.roi.polygon());
        let count = filtered.len();

        if let Err(e) = self
            .renderer
            .render(&mut self.surface, &self.state.roi, &filtered, count)
        {
            log::warn!("render failed: {:#}", e);
            return CycleOutcome::Failed;
        }

        if self.stats.last_count != Some(count) {
            log::info!("{}", count_text(count));
            self.stats.last_count = Some(count);
        }
        CycleOutcome::Rendered { count }
    }

    /// Cycle until a `Shutdown` input arrives.
    pub fn run(&mut self, pacer: &mut FramePacer) -> LoopStats {
        let mut last_health_log = Instant::now();
        loop {
            if self.tick() == CycleOutcome::Shutdown {
                break;
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let source = self.source.stats();
                log::info!(
                    "loop health: cycles={} rendered={} skipped={} failed={} source={} frames={} not_ready={}",
                    self.stats.cycles,
                    self.stats.rendered,
                    self.stats.skipped,
                    self.stats.failed,
                    source.url,
                    source.frames_captured,
                    source.not_ready_polls
                );
                last_health_log = Instant::now();
            }

            pacer.wait();
        }
        self.source.stop();
        log::info!("detection loop stopped after {} cycles", self.stats.cycles);
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn person(cx: f64, cy: f64) -> Detection {
        Detection::new(
            "person",
            0.9,
            BoundingBox::new(cx - 5.0, cy - 10.0, 10.0, 20.0),
        )
    }

    fn square_roi() -> [Point; 4] {
        [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]
    }

    #[test]
    fn filter_keeps_only_tracked_label_inside_roi() {
        let detections = vec![
            person(50.0, 50.0),
            person(150.0, 50.0),
            Detection::new("chair", 0.8, BoundingBox::new(40.0, 40.0, 20.0, 20.0)),
        ];
        let roi = square_roi();
        let filtered = filter_detections(&detections, "person", Some(&roi));
        assert_eq!(filtered, vec![person(50.0, 50.0)]);
    }

    #[test]
    fn filter_without_roi_keeps_all_label_matches() {
        let detections = vec![
            person(50.0, 50.0),
            person(150.0, 50.0),
            Detection::new("dog", 0.8, BoundingBox::default()),
        ];
        assert_eq!(filter_detections(&detections, "person", None).len(), 2);
    }

    #[test]
    fn filter_is_idempotent() {
        let detections = vec![person(10.0, 10.0), person(90.0, 95.0), person(120.0, 5.0)];
        let roi = square_roi();
        let first = filter_detections(&detections, "person", Some(&roi)).len();
        for _ in 0..10 {
            assert_eq!(filter_detections(&detections, "person", Some(&roi)).len(), first);
        }
        assert_eq!(first, 2);
    }

    #[test]
    fn pacer_spaces_wakeups() {
        let mut pacer = FramePacer::from_hz(100);
        assert_eq!(pacer.interval(), Duration::from_millis(10));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn unpaced_pacer_does_not_sleep() {
        let mut pacer = FramePacer::unpaced();
        assert!(pacer.interval().is_zero());
        pacer.wait();
    }
}
