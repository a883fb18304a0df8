//! Tests for the capture-session state machine.
//!
//! Tests construct the hardware event channel themselves and drain it into
//! the state machine by hand, so every interleaving is deterministic.

use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;

use shuttercam::config::AppConfig;
use shuttercam::hal::{AeState, AfState, HardwareEvent};
use shuttercam::session::{CameraState, SessionCore};
use shuttercam::testing::{CollectingListener, FakeBackend};
use shuttercam::types::{CaptureMode, FlashMode, LensFacing, Size};

type CallLog = Arc<Mutex<Vec<String>>>;

fn new_core_with(
    backend: FakeBackend,
) -> (
    SessionCore,
    Receiver<HardwareEvent>,
    Arc<CollectingListener>,
    CallLog,
) {
    let calls = backend.call_log();
    let listener = CollectingListener::new();
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let core = SessionCore::new(
        Box::new(backend),
        listener.clone(),
        AppConfig::default(),
        events_tx,
    );
    (core, events_rx, listener, calls)
}

fn new_core() -> (
    SessionCore,
    Receiver<HardwareEvent>,
    Arc<CollectingListener>,
    CallLog,
) {
    new_core_with(FakeBackend::new())
}

/// Feed every pending hardware event into the machine, including events
/// emitted while handling earlier ones.
fn drain(core: &mut SessionCore, events_rx: &Receiver<HardwareEvent>) {
    while let Ok(event) = events_rx.try_recv() {
        core.handle_event(event);
    }
}

fn calls_matching(calls: &CallLog, prefix: &str) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with(prefix))
        .count()
}

fn resumed_core() -> (
    SessionCore,
    Receiver<HardwareEvent>,
    Arc<CollectingListener>,
    CallLog,
) {
    let (mut core, events_rx, listener, calls) = new_core();
    core.on_resumed();
    drain(&mut core, &events_rx);
    assert_eq!(core.state(), CameraState::Preview);
    (core, events_rx, listener, calls)
}

#[test]
fn test_resume_reaches_preview() {
    let (core, _events_rx, listener, calls) = resumed_core();

    assert_eq!(core.state(), CameraState::Preview);
    assert_eq!(core.config().last_used_camera, "0");
    assert_eq!(core.config().last_used_camera_lens, LensFacing::Back);
    assert!(listener.contains("camera_available:true"));
    assert!(listener.contains("has_front_and_back:true"));
    assert!(listener.contains("flash_available:true"));
    assert!(listener.contains("change_camera:front=false"));
    assert_eq!(calls_matching(&calls, "open_device:0"), 1);
    // Photo mode binds the still stream at session configuration time.
    assert_eq!(calls_matching(&calls, "configure_session:still"), 1);
}

#[test]
fn test_pause_returns_to_init() {
    let (mut core, events_rx, _listener, calls) = resumed_core();

    core.on_paused();
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Init);
    assert_eq!(calls_matching(&calls, "close_session"), 1);
    assert_eq!(calls_matching(&calls, "close_device"), 1);
}

#[test]
fn test_still_capture_with_converged_exposure_skips_precapture() {
    let (mut core, events_rx, listener, calls) = resumed_core();
    core.set_is_image_capture_intent(true);

    core.try_take_picture();
    assert_eq!(core.state(), CameraState::WaitingLock);
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Preview);
    assert_eq!(calls_matching(&calls, "trigger_af_lock"), 1);
    assert_eq!(calls_matching(&calls, "trigger_precapture"), 0);
    assert_eq!(calls_matching(&calls, "capture_still"), 1);
    assert!(listener.contains("image_captured:8x8"));
    assert!(listener.contains("toggle_buttons:false"));
    assert_eq!(calls_matching(&calls, "cancel_af_trigger"), 1);
}

#[test]
fn test_still_capture_runs_full_precapture_sequence() {
    let mut backend = FakeBackend::new();
    backend.ae_on_lock = AeState::Searching;
    let (mut core, events_rx, listener, calls) = new_core_with(backend);
    core.on_resumed();
    drain(&mut core, &events_rx);
    core.set_is_image_capture_intent(true);

    core.try_take_picture();
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Preview);
    assert_eq!(calls_matching(&calls, "trigger_precapture"), 1);
    assert_eq!(calls_matching(&calls, "capture_still"), 1);
    assert!(listener.contains("image_captured:8x8"));
}

#[test]
fn test_absent_af_state_captures_immediately() {
    let mut backend = FakeBackend::new();
    backend.af_on_lock = AfState::Unknown;
    backend.ae_on_lock = AeState::Unknown;
    let (mut core, events_rx, _listener, calls) = new_core_with(backend);
    core.on_resumed();
    drain(&mut core, &events_rx);
    core.set_is_image_capture_intent(true);

    core.try_take_picture();
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Preview);
    assert_eq!(calls_matching(&calls, "trigger_precapture"), 0);
    assert_eq!(calls_matching(&calls, "capture_still"), 1);
}

#[test]
fn test_fixed_focus_camera_captures_without_af_lock() {
    let (mut core, events_rx, listener, calls) = resumed_core();
    core.toggle_front_back_camera();
    drain(&mut core, &events_rx);
    assert_eq!(core.config().last_used_camera, "1");
    assert_eq!(core.config().last_used_camera_lens, LensFacing::Front);

    core.set_is_image_capture_intent(true);
    core.try_take_picture();
    drain(&mut core, &events_rx);

    assert_eq!(calls_matching(&calls, "trigger_af_lock"), 0);
    assert_eq!(calls_matching(&calls, "capture_still"), 1);
    // Selfie captures are mirrored when flip_photos is set.
    assert!(calls.lock().unwrap().iter().any(|c| c.contains("flip=true")));
    assert!(listener.contains("image_captured:8x8"));
}

#[test]
fn test_shutter_press_during_capture_is_noop() {
    let (mut core, events_rx, _listener, calls) = resumed_core();
    core.set_is_image_capture_intent(true);

    core.try_take_picture();
    // Second press before the first capture resolves.
    core.try_take_picture();
    drain(&mut core, &events_rx);

    assert_eq!(calls_matching(&calls, "trigger_af_lock"), 1);
    assert_eq!(calls_matching(&calls, "capture_still"), 1);
}

#[test]
fn test_capture_writes_explicit_target() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.jpg");

    let (mut core, events_rx, listener, _calls) = resumed_core();
    core.set_target_path(Some(target.clone()));

    core.try_take_picture();
    drain(&mut core, &events_rx);

    assert!(target.exists());
    assert!(listener.contains("media_saved"));
    // An explicit intent target is not rescanned into the media index.
    assert!(!listener.contains("media_rescan"));
}

#[test]
fn test_still_failure_recovers_to_preview() {
    let mut backend = FakeBackend::new();
    backend.fail_still = true;
    let (mut core, events_rx, listener, calls) = new_core_with(backend);
    core.on_resumed();
    drain(&mut core, &events_rx);
    core.set_is_image_capture_intent(true);

    core.try_take_picture();
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Preview);
    assert!(listener.contains("error:capture failed"));
    assert!(listener.contains("toggle_buttons:false"));
    assert!(!listener.contains("image_captured"));
    assert_eq!(calls_matching(&calls, "cancel_af_trigger"), 1);
}

#[test]
fn test_configure_failure_recovers_to_preview() {
    let mut backend = FakeBackend::new();
    backend.fail_configure = true;
    let (mut core, events_rx, listener, _calls) = new_core_with(backend);
    core.on_resumed();
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Preview);
    assert!(listener.contains("error:session configuration failed"));
}

#[test]
fn test_device_error_collapses_to_init() {
    let (mut core, events_rx, listener, _calls) = resumed_core();

    core.handle_event(HardwareEvent::DeviceError("hardware fault".to_string()));
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Init);
    assert!(core.current_camera().is_none());
    assert!(listener.contains("camera_available:false"));
    assert!(listener.contains("error:camera hardware unavailable"));
}

#[test]
fn test_recording_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("clip.mp4");

    let (mut core, events_rx, listener, calls) = resumed_core();
    core.init_video_mode();
    drain(&mut core, &events_rx);
    assert_eq!(core.state(), CameraState::Preview);
    assert_eq!(core.capture_mode(), CaptureMode::Video);
    core.set_target_path(Some(target.clone()));

    core.toggle_recording();
    assert_eq!(core.state(), CameraState::StartingRecording);
    drain(&mut core, &events_rx);
    assert_eq!(core.state(), CameraState::Recording);
    assert!(core.is_recording());
    assert!(listener.contains("recording_started"));
    assert_eq!(calls_matching(&calls, "configure_session:recorder"), 1);

    core.handle_event(HardwareEvent::RecordingProgress {
        duration_nanos: 1_500_000_000,
    });
    assert!(listener.contains("duration:1500000000"));

    core.toggle_recording();
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Preview);
    assert!(!core.is_recording());
    assert!(listener.contains("recording_stopped"));
    assert!(listener.contains(&format!("media_saved:{}", target.display())));
}

#[test]
fn test_double_start_produces_one_recording() {
    let dir = tempfile::tempdir().unwrap();
    let (mut core, events_rx, _listener, calls) = resumed_core();
    core.init_video_mode();
    drain(&mut core, &events_rx);
    core.set_target_path(Some(dir.path().join("clip.mp4")));

    core.toggle_recording();
    // Second toggle while the recorder session is still configuring.
    core.toggle_recording();
    drain(&mut core, &events_rx);

    assert_eq!(core.state(), CameraState::Recording);
    assert_eq!(calls_matching(&calls, "start_recorder"), 1);
}

#[test]
fn test_failed_recorder_stop_deletes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("clip.mp4");
    std::fs::write(&target, b"partial").unwrap();

    let mut backend = FakeBackend::new();
    backend.fail_recorder_stop = true;
    let (mut core, events_rx, listener, _calls) = new_core_with(backend);
    core.on_resumed();
    drain(&mut core, &events_rx);
    core.init_video_mode();
    drain(&mut core, &events_rx);
    core.set_target_path(Some(target.clone()));

    core.toggle_recording();
    drain(&mut core, &events_rx);
    assert_eq!(core.state(), CameraState::Recording);

    core.toggle_recording();
    drain(&mut core, &events_rx);

    assert!(!target.exists());
    assert!(listener.contains("recording_stopped"));
    assert!(listener.contains("error:recording failed"));
    assert_eq!(core.state(), CameraState::Preview);
}

#[test]
fn test_camera_switch_round_trip() {
    let (mut core, events_rx, _listener, _calls) = resumed_core();
    core.config_mut().back_photo_res_index = 1;

    core.toggle_front_back_camera();
    drain(&mut core, &events_rx);
    assert_eq!(core.current_camera().unwrap().id, "1");

    core.toggle_front_back_camera();
    drain(&mut core, &events_rx);
    assert_eq!(core.current_camera().unwrap().id, "0");
    assert_eq!(core.state(), CameraState::Preview);
    assert_eq!(core.config().last_used_camera_lens, LensFacing::Back);
    // A round trip does not disturb the persisted resolution selection.
    assert_eq!(core.config().back_photo_res_index, 1);
}

#[test]
fn test_capture_without_storage_permission_is_blocked() {
    let (mut core, events_rx, listener, calls) = resumed_core();
    core.set_permissions(shuttercam::PermissionSet {
        camera: true,
        microphone: true,
        storage: false,
    });

    // The default destination is the media index, which needs storage.
    core.try_take_picture();
    drain(&mut core, &events_rx);
    assert!(listener.contains("error:permission denied"));
    assert_eq!(calls_matching(&calls, "capture_still"), 0);
    assert_eq!(core.state(), CameraState::Preview);

    // A return-data intent never touches storage and still works.
    core.set_is_image_capture_intent(true);
    core.try_take_picture();
    drain(&mut core, &events_rx);
    assert_eq!(calls_matching(&calls, "capture_still"), 1);
    assert!(listener.contains("image_captured:8x8"));
}

#[test]
fn test_flash_cycle_reapplies_repeating_request() {
    let (mut core, events_rx, listener, calls) = resumed_core();
    let before = calls_matching(&calls, "set_repeating");

    core.toggle_flashlight();
    drain(&mut core, &events_rx);

    assert_eq!(core.flash_mode(), FlashMode::On);
    assert_eq!(core.config().flashlight_state, FlashMode::On);
    assert!(listener.contains("change_flash:On"));
    assert_eq!(calls_matching(&calls, "set_repeating"), before + 1);
    assert!(calls
        .lock()
        .unwrap()
        .iter()
        .any(|c| c.contains("flash=On")));
}

#[test]
fn test_flash_not_applied_on_flashless_camera() {
    let (mut core, events_rx, listener, calls) = resumed_core();
    core.toggle_front_back_camera();
    drain(&mut core, &events_rx);
    assert!(listener.contains("flash_available:false"));
    // Opening a flashless camera resets the flash state.
    assert_eq!(core.flash_mode(), FlashMode::Off);

    let before = calls_matching(&calls, "set_repeating");
    core.check_flashlight();
    assert_eq!(calls_matching(&calls, "set_repeating"), before);
}

#[test]
fn test_pinch_zoom_applies_crop_region() {
    let (mut core, events_rx, _listener, calls) = resumed_core();

    core.on_pinch(1.5);
    drain(&mut core, &events_rx);

    // A 1.5 raw factor is amplified to 2.0.
    assert!((core.zoom_ratio() - 2.0).abs() < 1e-5);
    assert!(calls.lock().unwrap().iter().any(|c| c.contains("crop=true")));

    // Pinching out below 1.0 clears the crop.
    core.on_pinch(0.1);
    assert_eq!(core.zoom_ratio(), 1.0);
    assert!(calls
        .lock()
        .unwrap()
        .iter()
        .rev()
        .next()
        .unwrap()
        .contains("crop=false"));
}

#[test]
fn test_zoom_crop_carries_into_still_capture() {
    let (mut core, events_rx, listener, calls) = resumed_core();
    core.set_is_image_capture_intent(true);

    core.on_pinch(1.5);
    assert!((core.zoom_ratio() - 2.0).abs() < 1e-5);

    core.try_take_picture();
    drain(&mut core, &events_rx);

    // The zoomed-in framing applies to the still request, not just preview.
    assert!(calls
        .lock()
        .unwrap()
        .iter()
        .any(|c| c.starts_with("capture_still") && c.contains("crop=true")));
    assert!(listener.contains("image_captured:8x8"));

    // Back at 1x the crop is dropped from the next capture.
    core.on_pinch(0.1);
    core.try_take_picture();
    drain(&mut core, &events_rx);
    assert!(calls
        .lock()
        .unwrap()
        .iter()
        .any(|c| c.starts_with("capture_still") && c.contains("crop=false")));
}

#[test]
fn test_zoom_never_exceeds_hardware_range() {
    let (mut core, events_rx, _listener, _calls) = resumed_core();
    drain(&mut core, &events_rx);

    for _ in 0..20 {
        core.on_pinch(2.0);
    }
    assert_eq!(core.zoom_ratio(), 8.0);

    for _ in 0..20 {
        core.on_pinch(0.5);
    }
    assert_eq!(core.zoom_ratio(), 1.0);
}

#[test]
fn test_tap_focus_persists_across_capture() {
    let (mut core, events_rx, listener, calls) = resumed_core();
    core.set_view_size(Size::new(1080, 1920));
    core.set_is_image_capture_intent(true);

    core.on_tap(540.0, 960.0);
    assert!(listener.contains("focus:540,960"));
    let metering_sets = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.contains("metering=true"))
        .count();
    assert_eq!(metering_sets, 1);

    core.try_take_picture();
    drain(&mut core, &events_rx);

    // The focus region is re-applied when the capture unlocks focus.
    let metering_sets_after = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.contains("metering=true"))
        .count();
    assert!(metering_sets_after > metering_sets);
    assert_eq!(core.state(), CameraState::Preview);
}

#[test]
fn test_device_orientation_affects_jpeg_orientation() {
    let (mut core, events_rx, _listener, calls) = resumed_core();
    core.set_is_image_capture_intent(true);

    // Landscape-right bucket: sensor 90 + compensation 90 = 180.
    core.set_device_orientation(80);
    core.try_take_picture();
    drain(&mut core, &events_rx);

    assert!(calls
        .lock()
        .unwrap()
        .iter()
        .any(|c| c.contains("capture_still:orientation=180")));
}

#[test]
fn test_video_mode_without_microphone_falls_back_to_photo() {
    let (mut core, events_rx, listener, _calls) = resumed_core();
    core.set_permissions(shuttercam::PermissionSet {
        camera: true,
        microphone: false,
        storage: true,
    });

    core.init_video_mode();
    drain(&mut core, &events_rx);

    assert!(listener.contains("error:permission denied"));
    assert_eq!(core.capture_mode(), CaptureMode::Photo);
    assert_eq!(core.state(), CameraState::Preview);
}

#[test]
fn test_strict_video_intent_does_not_fall_back() {
    let (mut core, events_rx, listener, _calls) = resumed_core();
    core.set_permissions(shuttercam::PermissionSet {
        camera: true,
        microphone: false,
        storage: true,
    });
    core.set_strict_video_intent(true);

    core.init_video_mode();
    drain(&mut core, &events_rx);

    assert!(listener.contains("error:permission denied"));
    // Still in photo mode and no reopen happened on its behalf.
    assert_eq!(core.capture_mode(), CaptureMode::Photo);
}

#[test]
fn test_missing_camera_permission_blocks_open() {
    let (mut core, _events_rx, listener, calls) = new_core();
    core.set_permissions(shuttercam::PermissionSet {
        camera: false,
        microphone: true,
        storage: true,
    });

    core.on_resumed();

    assert_eq!(core.state(), CameraState::Init);
    assert!(listener.contains("error:permission denied"));
    assert!(listener.contains("camera_available:false"));
    assert_eq!(calls_matching(&calls, "open_device"), 0);
}

#[test]
fn test_recording_in_progress_blocks_mid_states() {
    let dir = tempfile::tempdir().unwrap();
    let (mut core, events_rx, _listener, calls) = resumed_core();
    core.init_video_mode();
    drain(&mut core, &events_rx);
    core.set_target_path(Some(dir.path().join("clip.mp4")));

    core.toggle_recording();
    drain(&mut core, &events_rx);
    assert_eq!(core.state(), CameraState::Recording);

    // The shutter is a no-op while recording.
    core.try_take_picture();
    assert_eq!(calls_matching(&calls, "capture_still"), 0);
}

#[test]
fn test_camera_state_serialization() {
    let json = serde_json::to_string(&CameraState::WaitingPrecapture).unwrap();
    assert!(json.contains("WaitingPrecapture"));
    let state: CameraState = serde_json::from_str(&json).unwrap();
    assert_eq!(state, CameraState::WaitingPrecapture);

    let camera = shuttercam::testing::fixture_back_camera();
    let json = serde_json::to_string(&camera).unwrap();
    let decoded: shuttercam::CameraInfo = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, camera);
}

#[test]
fn test_config_persisted_on_flash_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shuttercam.toml");

    let (mut core, events_rx, _listener, _calls) = resumed_core();
    core.set_config_path(Some(path.clone()));
    core.toggle_flashlight();
    drain(&mut core, &events_rx);

    let reloaded = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(reloaded.flashlight_state, FlashMode::On);
}
