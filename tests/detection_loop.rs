use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use roi_counter::detect::{DetectorBackend, ScriptedBackend, SharedBackend, StubBackend};
use roi_counter::render::{DrawCommand, RecordingSurface, WAITING_TEXT};
use roi_counter::roi::EditorState;
use roi_counter::{
    open_source, BoundingBox, CycleOutcome, Detection, DetectionLoop, Frame, FramePacer,
    InputEvent, Point, RoiEditor, Size, SkipReason, SourceConfig,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn source(warmup_polls: u32) -> Box<dyn roi_counter::CaptureSource> {
    open_source(SourceConfig {
        url: "stub://test_lab".to_string(),
        width: WIDTH,
        height: HEIGHT,
        warmup_polls,
    })
    .expect("synthetic source")
}

fn counter(warmup_polls: u32) -> DetectionLoop<RecordingSurface> {
    DetectionLoop::new(source(warmup_polls), RecordingSurface::new(), "person")
}

fn person_at(cx: f64, cy: f64) -> Detection {
    Detection::new("person", 0.9, BoundingBox::new(cx - 4.0, cy - 8.0, 8.0, 16.0))
}

fn shared<B: DetectorBackend + 'static>(backend: B) -> SharedBackend {
    Arc::new(Mutex::new(backend))
}

fn left_half_roi() -> RoiEditor {
    RoiEditor::with_polygon([
        Point::new(0.0, 0.0),
        Point::new(32.0, 0.0),
        Point::new(32.0, 48.0),
        Point::new(0.0, 48.0),
    ])
}

/// Stops the camera from inside the detector call, like a user pressing
/// "stop" while inference is still running.
struct StopsCameraMidDetect {
    inputs: Sender<InputEvent>,
    detections: Vec<Detection>,
}

impl DetectorBackend for StopsCameraMidDetect {
    fn name(&self) -> &'static str {
        "stops-camera"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.inputs.send(InputEvent::StopCamera)?;
        Ok(self.detections.clone())
    }
}

#[test]
fn stopped_camera_skips_without_touching_display() {
    let mut counter = counter(0).with_backend(shared(StubBackend::new()));

    assert_eq!(
        counter.tick(),
        CycleOutcome::Skipped(SkipReason::CameraStopped)
    );
    assert_eq!(counter.surface().count_text(), Some(WAITING_TEXT));
    assert_eq!(counter.surface().presented(), 0);
    assert_eq!(counter.stats().skipped, 1);
}

#[test]
fn missing_model_skips() {
    let mut counter = counter(0);
    counter.handle_input(InputEvent::StartCamera).unwrap();

    assert_eq!(
        counter.tick(),
        CycleOutcome::Skipped(SkipReason::ModelNotLoaded)
    );
    assert_eq!(counter.surface().count_text(), Some(WAITING_TEXT));
    assert!(!counter.state().model_loaded());
}

#[test]
fn warming_camera_skips_until_frame_ready() {
    let mut counter = counter(2).with_backend(shared(ScriptedBackend::new()));
    counter.handle_input(InputEvent::StartCamera).unwrap();

    for _ in 0..2 {
        assert_eq!(
            counter.tick(),
            CycleOutcome::Skipped(SkipReason::FrameNotReady)
        );
    }
    assert_eq!(counter.surface().count_text(), Some(WAITING_TEXT));
    assert_eq!(counter.tick(), CycleOutcome::Rendered { count: 0 });
    assert_eq!(
        counter.surface().count_text(),
        Some("0 people currently enjoying the lab")
    );
}

#[test]
fn provider_failure_does_not_stop_the_loop() {
    let backend = Arc::new(Mutex::new(
        ScriptedBackend::new()
            .then_fail("inference crashed")
            .then_detect(vec![person_at(10.0, 20.0)]),
    ));
    let mut counter = counter(0).with_backend(backend.clone());
    counter.handle_input(InputEvent::StartCamera).unwrap();

    assert_eq!(counter.tick(), CycleOutcome::Failed);
    assert_eq!(counter.tick(), CycleOutcome::Rendered { count: 1 });
    assert_eq!(
        counter.surface().count_text(),
        Some("1 person currently enjoying the lab")
    );

    let stats = counter.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.rendered, 1);
    assert_eq!(stats.last_count, Some(1));
    assert_eq!(backend.lock().unwrap().calls(), 2);
}

#[test]
fn roi_limits_the_count() {
    let backend = ScriptedBackend::new().then_detect(vec![
        person_at(10.0, 20.0),
        person_at(20.0, 30.0),
        person_at(50.0, 20.0),
        Detection::new("chair", 0.8, BoundingBox::new(4.0, 4.0, 8.0, 8.0)),
    ]);
    let mut counter = counter(0)
        .with_backend(shared(backend))
        .with_roi(left_half_roi());
    counter.handle_input(InputEvent::StartCamera).unwrap();

    assert_eq!(counter.tick(), CycleOutcome::Rendered { count: 2 });
    assert_eq!(
        counter.surface().count_text(),
        Some("2 people currently enjoying the lab")
    );

    let visible = counter.surface().visible();
    let rects = visible
        .iter()
        .filter(|c| matches!(c, DrawCommand::Rect { .. }))
        .count();
    assert_eq!(rects, 2);
    assert!(visible
        .iter()
        .any(|c| matches!(c, DrawCommand::Polyline { closed: true, .. })));
}

#[test]
fn results_are_dropped_when_camera_stops_mid_detect() {
    let mut counter = counter(0);
    let backend = StopsCameraMidDetect {
        inputs: counter.input_sender(),
        detections: vec![person_at(10.0, 20.0)],
    };
    counter.load_backend(shared(backend));
    counter.handle_input(InputEvent::StartCamera).unwrap();

    assert_eq!(counter.tick(), CycleOutcome::Skipped(SkipReason::Discarded));
    assert!(!counter.state().is_running());
    assert_eq!(
        counter.surface().count_text(),
        Some("0 people currently enjoying the lab")
    );
    assert!(counter
        .surface()
        .visible()
        .iter()
        .all(|c| !matches!(c, DrawCommand::Rect { .. })));

    assert_eq!(
        counter.tick(),
        CycleOutcome::Skipped(SkipReason::CameraStopped)
    );
}

#[test]
fn camera_toggle_is_idempotent_and_resets_overlay() {
    let backend = ScriptedBackend::new().then_detect(vec![person_at(10.0, 20.0)]);
    let mut counter = counter(0).with_backend(shared(backend));

    counter.handle_input(InputEvent::StartCamera).unwrap();
    counter.handle_input(InputEvent::StartCamera).unwrap();
    assert!(counter.source().is_active());
    assert_eq!(counter.tick(), CycleOutcome::Rendered { count: 1 });

    counter.handle_input(InputEvent::ToggleCamera).unwrap();
    assert!(!counter.state().is_running());
    assert!(!counter.source().is_active());
    assert!(counter.surface().visible().is_empty());
    assert_eq!(
        counter.surface().count_text(),
        Some("0 people currently enjoying the lab")
    );

    counter.handle_input(InputEvent::StopCamera).unwrap();
    counter.handle_input(InputEvent::ToggleCamera).unwrap();
    assert!(counter.state().is_running());
}

#[test]
fn picks_build_roi_in_source_space() {
    let mut counter = counter(0).with_backend(shared(ScriptedBackend::new()));
    let tx = counter.input_sender();
    let display = Size::new(128.0, 96.0);

    tx.send(InputEvent::ToggleRoi).unwrap();
    for (x, y) in [(0.0, 0.0), (64.0, 0.0), (64.0, 96.0), (0.0, 96.0)] {
        tx.send(InputEvent::PickPoint {
            at: Point::new(x, y),
            display,
        })
        .unwrap();
    }
    // Camera is stopped: inputs still apply, the cycle itself skips.
    assert_eq!(
        counter.tick(),
        CycleOutcome::Skipped(SkipReason::CameraStopped)
    );

    let roi = &counter.state().roi;
    assert_eq!(roi.state(), EditorState::Complete);
    assert_eq!(
        roi.points(),
        &[
            Point::new(0.0, 0.0),
            Point::new(32.0, 0.0),
            Point::new(32.0, 48.0),
            Point::new(0.0, 48.0),
        ]
    );
    assert!(counter
        .surface()
        .visible()
        .iter()
        .any(|c| matches!(c, DrawCommand::Polyline { closed: true, .. })));

    // A fifth pick changes nothing.
    tx.send(InputEvent::PickPoint {
        at: Point::new(10.0, 10.0),
        display,
    })
    .unwrap();
    counter.tick();
    assert_eq!(counter.state().roi.points().len(), 4);
}

#[test]
fn run_keeps_cycling_until_shutdown() {
    let backend = ScriptedBackend::new()
        .then_fail("first frame unreadable")
        .then_detect(vec![person_at(10.0, 20.0)]);
    let mut counter = counter(0).with_backend(shared(backend));
    counter.handle_input(InputEvent::StartCamera).unwrap();

    let tx = counter.input_sender();
    let worker = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        tx.send(InputEvent::Shutdown).unwrap();
    });

    let stats = counter.run(&mut FramePacer::from_hz(200));
    worker.join().unwrap();

    assert!(stats.cycles >= 3, "cycles: {}", stats.cycles);
    assert_eq!(stats.failed, 1);
    assert!(stats.rendered >= 1);
    assert!(counter.state().is_shutdown());
    assert!(!counter.source().is_active());
}
