//! A hardware backend that answers every command synchronously with
//! scripted events. Tests construct the event channel themselves and drain
//! it into the state machine by hand, so every interleaving is explicit.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;

use crate::errors::CameraError;
use crate::hal::{
    AeState, AfState, CameraBackend, HardwareEvent, RepeatingParams, StillRequest, StreamSet,
};
use crate::preview::PreviewListener;
use crate::types::{CameraInfo, CapturedImage, FlashMode, LensFacing, Rect, Size, VideoQuality};

/// The standard back camera every test enumerates.
pub fn fixture_back_camera() -> CameraInfo {
    CameraInfo {
        id: "0".to_string(),
        facing: LensFacing::Back,
        sensor_orientation: 90,
        flash_available: true,
        focus_available: true,
        min_zoom_ratio: 1.0,
        max_zoom_ratio: 8.0,
        active_array: Rect::new(0, 0, 4032, 3024),
        photo_sizes: vec![
            Size::new(4032, 3024),
            Size::new(3840, 2160),
            Size::new(1920, 1080),
            Size::new(1280, 720),
        ],
        video_qualities: vec![
            VideoQuality::Uhd,
            VideoQuality::Fhd,
            VideoQuality::Hd,
            VideoQuality::Sd,
        ],
    }
}

/// The standard front camera: no flash, fixed focus.
pub fn fixture_front_camera() -> CameraInfo {
    CameraInfo {
        id: "1".to_string(),
        facing: LensFacing::Front,
        sensor_orientation: 270,
        flash_available: false,
        focus_available: false,
        min_zoom_ratio: 1.0,
        max_zoom_ratio: 2.0,
        active_array: Rect::new(0, 0, 3264, 2448),
        photo_sizes: vec![Size::new(3264, 2448), Size::new(1920, 1080)],
        video_qualities: vec![VideoQuality::Fhd, VideoQuality::Hd],
    }
}

/// A real, decodable JPEG payload for still-capture events.
pub fn fake_jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 100, 50]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .expect("in-memory jpeg encode");
    bytes
}

/// Scriptable backend. Commands append to a shared call log and emit their
/// completion events immediately on the channel handed to `open_device`.
pub struct FakeBackend {
    cameras: Vec<CameraInfo>,
    events: Option<Sender<HardwareEvent>>,
    calls: Arc<Mutex<Vec<String>>>,

    /// AF state reported after an AF lock trigger.
    pub af_on_lock: AfState,
    /// AE state reported alongside the AF lock result.
    pub ae_on_lock: AeState,
    /// Session configuration fails instead of completing.
    pub fail_configure: bool,
    /// Still captures fail instead of producing a payload.
    pub fail_still: bool,
    /// The recorder reports a failed stop.
    pub fail_recorder_stop: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            cameras: vec![fixture_back_camera(), fixture_front_camera()],
            events: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            af_on_lock: AfState::FocusedLocked,
            ae_on_lock: AeState::Converged,
            fail_configure: false,
            fail_still: false,
            fail_recorder_stop: false,
        }
    }

    /// Shared handle onto the call log, cloned before the backend is boxed
    /// into a session.
    pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: &str) {
        self.calls.lock().expect("lock poisoned").push(call.to_string());
    }

    fn emit(&self, event: HardwareEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for FakeBackend {
    fn enumerate_cameras(&mut self) -> Result<Vec<CameraInfo>, CameraError> {
        self.record("enumerate_cameras");
        Ok(self.cameras.clone())
    }

    fn open_device(
        &mut self,
        camera_id: &str,
        events: Sender<HardwareEvent>,
    ) -> Result<(), CameraError> {
        self.record(&format!("open_device:{}", camera_id));
        self.events = Some(events);
        self.emit(HardwareEvent::Opened);
        Ok(())
    }

    fn close_device(&mut self) {
        self.record("close_device");
        self.events = None;
    }

    fn configure_session(&mut self, streams: StreamSet) -> Result<(), CameraError> {
        let label = match &streams {
            StreamSet::PreviewOnly => "preview".to_string(),
            StreamSet::PreviewAndStill { resolution } => format!("still:{}", resolution),
            StreamSet::PreviewAndRecorder { recorder } => {
                format!("recorder:{}", recorder.video_size)
            }
        };
        self.record(&format!("configure_session:{}", label));

        if self.fail_configure {
            self.emit(HardwareEvent::SessionConfigureFailed(
                "scripted configure failure".to_string(),
            ));
        } else {
            self.emit(HardwareEvent::SessionConfigured);
        }
        Ok(())
    }

    fn stop_repeating(&mut self) -> Result<(), CameraError> {
        self.record("stop_repeating");
        Ok(())
    }

    fn abort_captures(&mut self) -> Result<(), CameraError> {
        self.record("abort_captures");
        Ok(())
    }

    fn close_session(&mut self) {
        self.record("close_session");
    }

    fn set_repeating(&mut self, params: RepeatingParams) -> Result<(), CameraError> {
        self.record(&format!(
            "set_repeating:flash={:?},metering={},crop={}",
            params.flash,
            params.metering.is_some(),
            params.crop_region.is_some()
        ));
        Ok(())
    }

    fn trigger_af_lock(&mut self) -> Result<(), CameraError> {
        self.record("trigger_af_lock");
        self.emit(HardwareEvent::CaptureResult {
            af: self.af_on_lock,
            ae: self.ae_on_lock,
        });
        Ok(())
    }

    fn trigger_precapture(&mut self) -> Result<(), CameraError> {
        self.record("trigger_precapture");
        self.emit(HardwareEvent::CaptureResult {
            af: self.af_on_lock,
            ae: AeState::Precapture,
        });
        self.emit(HardwareEvent::CaptureResult {
            af: self.af_on_lock,
            ae: AeState::Converged,
        });
        Ok(())
    }

    fn cancel_af_trigger(&mut self) -> Result<(), CameraError> {
        self.record("cancel_af_trigger");
        Ok(())
    }

    fn capture_still(&mut self, request: StillRequest) -> Result<(), CameraError> {
        self.record(&format!(
            "capture_still:orientation={},quality={},flip={},crop={}",
            request.jpeg_orientation,
            request.jpeg_quality,
            request.flip_horizontal,
            request.crop_region.is_some()
        ));
        if self.fail_still {
            self.emit(HardwareEvent::StillFailed(
                "scripted capture failure".to_string(),
            ));
        } else {
            self.emit(HardwareEvent::StillTaken(fake_jpeg()));
        }
        Ok(())
    }

    fn start_recorder(&mut self) -> Result<(), CameraError> {
        self.record("start_recorder");
        self.emit(HardwareEvent::RecorderStarted);
        Ok(())
    }

    fn stop_recorder(&mut self) -> Result<(), CameraError> {
        self.record("stop_recorder");
        self.emit(HardwareEvent::RecorderStopped {
            ok: !self.fail_recorder_stop,
        });
        Ok(())
    }
}

/// Listener that records everything it is told, for assertions.
#[derive(Default)]
pub struct CollectingListener {
    pub events: Mutex<Vec<String>>,
    pub images: Mutex<Vec<CapturedImage>>,
}

impl CollectingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<String> {
        self.events.lock().expect("lock poisoned").clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.recorded().iter().any(|e| e.contains(needle))
    }

    fn push(&self, event: String) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}

impl PreviewListener for CollectingListener {
    fn set_camera_available(&self, available: bool) {
        self.push(format!("camera_available:{}", available));
    }

    fn set_has_front_and_back_camera(&self, has_both: bool) {
        self.push(format!("has_front_and_back:{}", has_both));
    }

    fn set_flash_available(&self, available: bool) {
        self.push(format!("flash_available:{}", available));
    }

    fn on_change_camera(&self, is_front: bool) {
        self.push(format!("change_camera:front={}", is_front));
    }

    fn on_change_flash_mode(&self, mode: FlashMode) {
        self.push(format!("change_flash:{:?}", mode));
    }

    fn on_focus_camera(&self, x: f32, y: f32) {
        self.push(format!("focus:{},{}", x, y));
    }

    fn on_video_recording_started(&self) {
        self.push("recording_started".to_string());
    }

    fn on_video_recording_stopped(&self) {
        self.push("recording_stopped".to_string());
    }

    fn on_video_duration_changed(&self, duration_nanos: u64) {
        self.push(format!("duration:{}", duration_nanos));
    }

    fn on_media_saved(&self, path: &std::path::Path) {
        self.push(format!("media_saved:{}", path.display()));
    }

    fn on_image_captured(&self, image: CapturedImage) {
        self.push(format!("image_captured:{}x{}", image.width, image.height));
        self.images.lock().expect("lock poisoned").push(image);
    }

    fn toggle_bottom_buttons(&self, hide: bool) {
        self.push(format!("toggle_buttons:{}", hide));
    }

    fn on_media_rescan(&self, path: &std::path::Path) {
        self.push(format!("media_rescan:{}", path.display()));
    }

    fn on_camera_error(&self, error: &CameraError) {
        self.push(format!("error:{}", error));
    }
}
