//! The capture-session state machine.
//!
//! Owns the camera device, the bound capture session, and the recorder for
//! its whole lifecycle. Commands arrive serialized from the host; hardware
//! events arrive on a dedicated background worker. The machine cycles for
//! the app's lifetime, collapsing back to `Preview` after every capture or
//! recording episode and to `Init` only when the camera closes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::CameraError;
use crate::gesture::{
    pinch_zoom_ratio, tap_to_metering, zoom_crop_region, MeteringRegions,
    PreviewToCameraTransform,
};
use crate::hal::{
    AeState, AfState, CameraBackend, HardwareEvent, RecorderConfig, RepeatingParams, StillRequest,
    StreamSet, VIDEO_BIT_RATE, VIDEO_FRAME_RATE,
};
use crate::orientation::{jpeg_orientation, recorder_orientation_hint, OrientationWatcher};
use crate::output::{
    decode_captured_image, delete_partial_output, write_capture, MediaOutput, MediaOutputResolver,
};
use crate::preview::{PermissionSet, Preview, PreviewListener};
use crate::resolution::{cached_cameras, resolve_photo, resolve_video};
use crate::types::{CameraInfo, CaptureMode, FlashMode, LensFacing, Rect, Size};

/// Bounded wait for the camera open/close lock. Exceeding it is fatal to
/// that attempt and is never retried.
pub const OPEN_CAMERA_TIMEOUT: Duration = Duration::from_millis(2500);

const FALLBACK_PHOTO_SIZE: Size = Size {
    width: 1920,
    height: 1080,
};

/// Machine states. Photo path:
/// `Init -> Preview -> {WaitingLock -> WaitingPrecapture ->
/// WaitingNonPrecapture} -> PictureTaken -> Preview`. Video path:
/// `Preview -> StartingRecording -> Recording -> StoppingRecording -> Preview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraState {
    Init,
    Preview,
    WaitingLock,
    WaitingPrecapture,
    WaitingNonPrecapture,
    PictureTaken,
    StartingRecording,
    Recording,
    StoppingRecording,
}

/// Binary semaphore guarding device open/close, released by the open
/// callback or the close path.
struct OpenLock {
    available: Mutex<bool>,
    cv: Condvar,
}

impl OpenLock {
    fn new() -> Self {
        Self {
            available: Mutex::new(true),
            cv: Condvar::new(),
        }
    }

    fn try_acquire(&self, timeout: Duration) -> bool {
        let mut available = self.available.lock().expect("lock poisoned");
        let deadline = Instant::now() + timeout;
        while !*available {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(available, deadline - now)
                .expect("lock poisoned");
            available = guard;
        }
        *available = false;
        true
    }

    fn release(&self) {
        *self.available.lock().expect("lock poisoned") = true;
        self.cv.notify_one();
    }
}

/// The state machine proper. Synchronous: every command and every hardware
/// event is handled to completion under the owner's serialization.
pub struct SessionCore {
    backend: Box<dyn CameraBackend>,
    listener: Arc<dyn PreviewListener>,
    config: AppConfig,
    config_path: Option<PathBuf>,
    output: MediaOutputResolver,
    events_tx: Sender<HardwareEvent>,
    open_lock: Arc<OpenLock>,

    state: CameraState,
    mode: CaptureMode,
    use_front: bool,
    flash: FlashMode,
    camera: Option<CameraInfo>,

    view_size: Size,
    display_rotation: u32,
    orientation: OrientationWatcher,

    zoom_ratio: f32,
    zoom_region: Option<Rect>,
    metering: Option<MeteringRegions>,
    last_focus: Option<(f32, f32)>,

    is_recording: bool,
    pending_video_path: Option<PathBuf>,
    pending_image_output: Option<MediaOutput>,

    permissions: PermissionSet,
    strict_video_intent: bool,
}

impl SessionCore {
    pub fn new(
        backend: Box<dyn CameraBackend>,
        listener: Arc<dyn PreviewListener>,
        config: AppConfig,
        events_tx: Sender<HardwareEvent>,
    ) -> Self {
        let mode = if config.init_photo_mode {
            CaptureMode::Photo
        } else {
            CaptureMode::Video
        };
        let use_front = config.last_used_camera_lens == LensFacing::Front;
        let flash = config.flashlight_state;
        let output = MediaOutputResolver::new(config.save_photos_folder.clone());

        Self {
            backend,
            listener,
            config,
            config_path: None,
            output,
            events_tx,
            open_lock: Arc::new(OpenLock::new()),
            state: CameraState::Init,
            mode,
            use_front,
            flash,
            camera: None,
            view_size: Size::new(1080, 1920),
            display_rotation: 0,
            orientation: OrientationWatcher::new(),
            zoom_ratio: 1.0,
            zoom_region: None,
            metering: None,
            last_focus: None,
            is_recording: false,
            pending_video_path: None,
            pending_image_output: None,
            permissions: PermissionSet::default(),
            strict_video_intent: false,
        }
    }

    // --- host-facing setters -------------------------------------------------

    pub fn set_config_path(&mut self, path: Option<PathBuf>) {
        self.config_path = path;
    }

    pub fn set_permissions(&mut self, permissions: PermissionSet) {
        self.permissions = permissions;
    }

    /// The launching intent strictly requires video; permission denial must
    /// not fall back to photo mode.
    pub fn set_strict_video_intent(&mut self, strict: bool) {
        self.strict_video_intent = strict;
    }

    pub fn set_view_size(&mut self, size: Size) {
        self.view_size = size;
    }

    pub fn set_display_rotation(&mut self, degrees: u32) {
        self.display_rotation = degrees;
    }

    pub fn set_target_path(&mut self, path: Option<PathBuf>) {
        self.output.set_target_path(path);
    }

    pub fn set_is_image_capture_intent(&mut self, is_image_capture_intent: bool) {
        self.output.set_is_image_capture_intent(is_image_capture_intent);
    }

    /// Raw device orientation reading; buckets with hysteresis internally.
    pub fn set_device_orientation(&mut self, raw_degrees: i32) {
        self.orientation.update(raw_degrees);
    }

    // --- accessors -----------------------------------------------------------

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn flash_mode(&self) -> FlashMode {
        self.flash
    }

    pub fn zoom_ratio(&self) -> f32 {
        self.zoom_ratio
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn current_camera(&self) -> Option<&CameraInfo> {
        self.camera.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    // --- lifecycle -----------------------------------------------------------

    pub fn on_resumed(&mut self) {
        self.open_camera();
    }

    /// Guaranteed-cleanup path: releases the hardware even with a capture or
    /// recording in flight. The in-flight request is left to finish or fail
    /// via its hardware callback.
    pub fn on_paused(&mut self) {
        self.close_camera();
    }

    fn open_camera(&mut self) {
        if !self.permissions.camera {
            let err = CameraError::PermissionDenied("camera permission not granted".to_string());
            self.listener.on_camera_error(&err);
            self.listener.set_camera_available(false);
            return;
        }

        let cameras = match cached_cameras(|| self.backend.enumerate_cameras()) {
            Ok(cameras) => cameras,
            Err(e) => {
                let err = CameraError::HardwareUnavailable(e.to_string());
                self.listener.on_camera_error(&err);
                self.listener.set_camera_available(false);
                return;
            }
        };

        let has_front = cameras.iter().any(|c| c.facing == LensFacing::Front);
        let has_back = cameras.iter().any(|c| c.facing == LensFacing::Back);
        self.listener
            .set_has_front_and_back_camera(has_front && has_back);

        let wanted = if self.use_front {
            LensFacing::Front
        } else {
            LensFacing::Back
        };
        let camera = cameras
            .iter()
            .find(|c| c.facing == wanted)
            .or_else(|| cameras.first())
            .cloned();

        let camera = match camera {
            Some(camera) => camera,
            None => {
                let err = CameraError::HardwareUnavailable("no cameras present".to_string());
                self.listener.on_camera_error(&err);
                self.listener.set_camera_available(false);
                return;
            }
        };

        self.use_front = camera.facing == LensFacing::Front;
        self.config.last_used_camera = camera.id.clone();
        self.config.last_used_camera_lens = camera.facing;
        self.persist_config();

        // Zoom and metering are per-session; a fresh open starts neutral.
        self.zoom_ratio = 1.0;
        self.zoom_region = None;
        self.metering = None;

        if !self.open_lock.try_acquire(OPEN_CAMERA_TIMEOUT) {
            self.listener.on_camera_error(&CameraError::OpenTimeout);
            return;
        }

        let id = camera.id.clone();
        self.camera = Some(camera);

        if let Err(e) = self.backend.open_device(&id, self.events_tx.clone()) {
            self.open_lock.release();
            self.camera = None;
            let err = CameraError::HardwareUnavailable(e.to_string());
            self.listener.on_camera_error(&err);
            self.listener.set_camera_available(false);
        }
    }

    fn close_camera(&mut self) {
        if !self.open_lock.try_acquire(OPEN_CAMERA_TIMEOUT) {
            log::warn!("timed out acquiring camera lock for close, closing anyway");
        }
        // Teardown ordering matters: stop repeating, abort in-flight
        // captures, then close session before device.
        let _ = self.backend.stop_repeating();
        let _ = self.backend.abort_captures();
        self.backend.close_session();
        self.backend.close_device();
        self.camera = None;
        self.is_recording = false;
        self.pending_image_output = None;
        if let Some(path) = self.pending_video_path.take() {
            delete_partial_output(&path);
        }
        self.state = CameraState::Init;
        self.open_lock.release();
    }

    // --- hardware events -----------------------------------------------------

    pub fn handle_event(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::Opened => {
                self.open_lock.release();
                self.on_device_opened();
            }
            HardwareEvent::Disconnected => {
                self.open_lock.release();
                self.backend.close_device();
                self.camera = None;
                self.state = CameraState::Init;
                self.listener.set_camera_available(false);
            }
            HardwareEvent::DeviceError(message) => {
                self.open_lock.release();
                self.backend.close_device();
                self.camera = None;
                self.state = CameraState::Init;
                self.listener.set_camera_available(false);
                self.listener
                    .on_camera_error(&CameraError::HardwareUnavailable(message));
            }
            HardwareEvent::SessionConfigured => self.on_session_configured(),
            HardwareEvent::SessionConfigureFailed(message) => {
                let was_starting_recording = self.state == CameraState::StartingRecording;
                self.state = CameraState::Preview;
                if was_starting_recording {
                    if let Some(path) = self.pending_video_path.take() {
                        delete_partial_output(&path);
                    }
                }
                self.listener
                    .on_camera_error(&CameraError::SessionConfigureFailed(message));
            }
            HardwareEvent::CaptureResult { af, ae } => self.process_convergence(af, ae),
            HardwareEvent::StillTaken(data) => self.finish_still(data),
            HardwareEvent::StillFailed(message) => {
                self.pending_image_output = None;
                self.listener.toggle_bottom_buttons(false);
                self.listener
                    .on_camera_error(&CameraError::CaptureFailed(message));
                self.unlock_focus();
            }
            HardwareEvent::RecorderStarted => self.listener.on_video_recording_started(),
            HardwareEvent::RecordingProgress { duration_nanos } => {
                self.listener.on_video_duration_changed(duration_nanos)
            }
            HardwareEvent::RecorderStopped { ok } => self.finish_recording(ok),
        }
    }

    fn on_device_opened(&mut self) {
        let Some(camera) = self.camera.clone() else {
            return;
        };

        if !camera.flash_available {
            self.flash = FlashMode::Off;
        }
        self.listener.set_flash_available(camera.flash_available);
        self.listener.on_change_camera(self.use_front);

        self.configure_for_mode();
        self.listener.set_camera_available(true);
    }

    /// Bind the stream set the current mode needs. The still stream is part
    /// of the photo session; video mode starts preview-only and rebuilds
    /// with the recorder surface when recording starts.
    fn configure_for_mode(&mut self) {
        let streams = match self.mode {
            CaptureMode::Photo => {
                let resolution = self
                    .camera
                    .as_ref()
                    .and_then(|camera| resolve_photo(camera, &self.config))
                    .unwrap_or(FALLBACK_PHOTO_SIZE);
                StreamSet::PreviewAndStill { resolution }
            }
            CaptureMode::Video => StreamSet::PreviewOnly,
        };

        if let Err(e) = self.backend.configure_session(streams) {
            self.state = CameraState::Preview;
            self.listener
                .on_camera_error(&CameraError::SessionConfigureFailed(e.to_string()));
        }
    }

    fn on_session_configured(&mut self) {
        let params = self.repeating_params();
        if let Err(e) = self.backend.set_repeating(params) {
            log::warn!("failed to install repeating request: {}", e);
        }

        if self.state == CameraState::StartingRecording {
            match self.backend.start_recorder() {
                Ok(()) => {
                    self.is_recording = true;
                    self.state = CameraState::Recording;
                }
                Err(e) => {
                    if let Some(path) = self.pending_video_path.take() {
                        delete_partial_output(&path);
                    }
                    self.listener
                        .on_camera_error(&CameraError::RecordingFailed(e.to_string()));
                    self.reopen_preview_session();
                }
            }
        } else {
            self.state = CameraState::Preview;
        }
    }

    /// The documented convergence protocol: AF and AE are asynchronous to
    /// the request that triggers them, so still capture serializes on their
    /// reported states instead of a fixed delay.
    fn process_convergence(&mut self, af: AfState, ae: AeState) {
        match self.state {
            CameraState::WaitingLock => {
                if af == AfState::Unknown {
                    self.capture_still_picture();
                } else if af.is_locked() {
                    if matches!(ae, AeState::Unknown | AeState::Converged) {
                        self.capture_still_picture();
                    } else {
                        self.run_precapture_sequence();
                    }
                }
            }
            CameraState::WaitingPrecapture => {
                if matches!(
                    ae,
                    AeState::Unknown | AeState::Precapture | AeState::FlashRequired
                ) {
                    self.state = CameraState::WaitingNonPrecapture;
                }
            }
            CameraState::WaitingNonPrecapture => {
                if ae != AeState::Precapture {
                    self.capture_still_picture();
                }
            }
            _ => {}
        }
    }

    // --- still capture -------------------------------------------------------

    fn lock_focus(&mut self) {
        match self.backend.trigger_af_lock() {
            Ok(()) => self.state = CameraState::WaitingLock,
            Err(e) => {
                log::warn!("AF lock trigger failed: {}", e);
                self.state = CameraState::Preview;
            }
        }
    }

    fn run_precapture_sequence(&mut self) {
        match self.backend.trigger_precapture() {
            Ok(()) => self.state = CameraState::WaitingPrecapture,
            Err(e) => log::warn!("precapture trigger failed: {}", e),
        }
    }

    fn capture_still_picture(&mut self) {
        let Some(camera) = self.camera.clone() else {
            return;
        };

        self.state = CameraState::PictureTaken;
        let rotation_at_capture = self.orientation.last_handled();
        let request = StillRequest {
            jpeg_orientation: jpeg_orientation(camera.sensor_orientation, rotation_at_capture),
            jpeg_quality: self.config.photo_quality,
            flash: self.flash,
            crop_region: self.zoom_region,
            flip_horizontal: self.use_front && self.config.flip_photos,
        };
        self.pending_image_output = Some(self.output.image_output(Local::now()));

        if let Err(e) = self.issue_still(request) {
            self.pending_image_output = None;
            self.listener
                .on_camera_error(&CameraError::CaptureFailed(e.to_string()));
            self.state = CameraState::Preview;
        }
    }

    fn issue_still(&mut self, request: StillRequest) -> Result<(), CameraError> {
        self.backend.stop_repeating()?;
        self.backend.abort_captures()?;
        self.backend.capture_still(request)
    }

    fn finish_still(&mut self, data: Vec<u8>) {
        let output = self
            .pending_image_output
            .take()
            .unwrap_or_else(|| self.output.image_output(Local::now()));

        match output {
            MediaOutput::InMemory => {
                // Decode failure here is a soft failure: no image delivered,
                // controls still come back.
                match decode_captured_image(&data) {
                    Some(image) => self.listener.on_image_captured(image),
                    None => self.listener.on_camera_error(&CameraError::DecodeError(
                        "could not decode captured image".to_string(),
                    )),
                }
            }
            MediaOutput::ExplicitPath(path) => match write_capture(&path, &data) {
                Ok(()) => self.listener.on_media_saved(&path),
                Err(e) => self.listener.on_camera_error(&e),
            },
            MediaOutput::MediaIndex { path, .. } => match write_capture(&path, &data) {
                Ok(()) => {
                    self.listener.on_media_rescan(&path);
                    self.listener.on_media_saved(&path);
                }
                Err(e) => self.listener.on_camera_error(&e),
            },
        }

        self.listener.toggle_bottom_buttons(false);
        self.unlock_focus();
    }

    fn unlock_focus(&mut self) {
        if let Err(e) = self.backend.cancel_af_trigger() {
            log::warn!("failed to cancel AF trigger: {}", e);
        }
        self.state = CameraState::Preview;
        let params = self.repeating_params();
        if let Err(e) = self.backend.set_repeating(params) {
            log::warn!("failed to restore repeating request: {}", e);
        }
        // A tap-to-focus region set before the capture stays in effect.
        if let Some((x, y)) = self.last_focus {
            self.focus_area(x, y);
        }
    }

    // --- video recording -----------------------------------------------------

    fn start_recording(&mut self) {
        if !self.permissions.microphone {
            self.listener.on_camera_error(&CameraError::PermissionDenied(
                "microphone permission required for recording".to_string(),
            ));
            return;
        }
        let Some(camera) = self.camera.clone() else {
            return;
        };

        let output = self.output.video_output(Local::now());
        if !self.storage_permitted(&output) {
            self.listener.on_camera_error(&CameraError::PermissionDenied(
                "storage permission required to save media".to_string(),
            ));
            return;
        }
        let path = match output.path() {
            Some(path) => path.to_path_buf(),
            None => return,
        };

        self.state = CameraState::StartingRecording;
        self.backend.close_session();
        self.pending_video_path = Some(path.clone());

        let quality = resolve_video(&camera, &self.config);
        let recorder = RecorderConfig {
            output_path: path,
            video_size: quality.size(),
            orientation_hint: recorder_orientation_hint(
                camera.sensor_orientation,
                self.display_rotation,
            ),
            bit_rate: VIDEO_BIT_RATE,
            frame_rate: VIDEO_FRAME_RATE,
        };

        if let Err(e) = self
            .backend
            .configure_session(StreamSet::PreviewAndRecorder { recorder })
        {
            if let Some(path) = self.pending_video_path.take() {
                delete_partial_output(&path);
            }
            self.listener
                .on_camera_error(&CameraError::RecordingFailed(e.to_string()));
            self.state = CameraState::Preview;
        }
    }

    fn stop_recording(&mut self) {
        self.state = CameraState::StoppingRecording;
        self.is_recording = false;
        if let Err(e) = self.backend.stop_recorder() {
            log::warn!("recorder stop failed: {}", e);
            self.finish_recording(false);
        }
    }

    fn finish_recording(&mut self, ok: bool) {
        self.is_recording = false;
        self.listener.on_video_recording_stopped();

        if let Some(path) = self.pending_video_path.take() {
            if ok {
                self.listener.on_media_rescan(&path);
                self.listener.on_media_saved(&path);
            } else {
                // A stop failure leaves a corrupt file; delete it rather
                // than surface it as a saved artifact.
                delete_partial_output(&path);
                self.listener.on_camera_error(&CameraError::RecordingFailed(
                    "recorder stopped with error".to_string(),
                ));
            }
        }

        self.state = CameraState::StoppingRecording;
        self.reopen_preview_session();
    }

    fn reopen_preview_session(&mut self) {
        self.backend.close_session();
        self.configure_for_mode();
    }

    // --- host commands -------------------------------------------------------

    pub fn try_take_picture(&mut self) {
        // A shutter press while a capture is in flight is a no-op.
        if self.state != CameraState::Preview {
            return;
        }
        if !self.storage_permitted(&self.output.image_output(Local::now())) {
            self.listener.on_camera_error(&CameraError::PermissionDenied(
                "storage permission required to save media".to_string(),
            ));
            return;
        }

        let focus_supported = self
            .camera
            .as_ref()
            .map(|camera| camera.focus_available)
            .unwrap_or(false);

        if focus_supported {
            self.lock_focus();
        } else {
            self.capture_still_picture();
        }
    }

    pub fn toggle_recording(&mut self) {
        if self.camera.is_none() {
            return;
        }
        if self.state != CameraState::Preview && self.state != CameraState::Recording {
            return;
        }

        if self.is_recording {
            self.stop_recording();
        } else {
            self.start_recording();
        }
    }

    pub fn init_photo_mode(&mut self) {
        self.mode = CaptureMode::Photo;
        self.config.init_photo_mode = true;
        self.persist_config();
        self.close_camera();
        self.open_camera();
    }

    pub fn init_video_mode(&mut self) {
        if !self.permissions.microphone {
            self.listener.on_camera_error(&CameraError::PermissionDenied(
                "microphone permission required for video mode".to_string(),
            ));
            if !self.strict_video_intent {
                // Denial falls back to photo mode instead of terminating.
                self.init_photo_mode();
            }
            return;
        }

        self.last_focus = None;
        self.metering = None;
        self.mode = CaptureMode::Video;
        self.config.init_photo_mode = false;
        self.persist_config();
        self.close_camera();
        self.open_camera();
    }

    pub fn toggle_front_back_camera(&mut self) {
        self.use_front = !self.use_front;
        self.close_camera();
        self.open_camera();
    }

    pub fn toggle_flashlight(&mut self) {
        let next = self.flash.next(self.mode);
        self.set_flashlight_state(next);
    }

    pub fn set_flashlight_state(&mut self, state: FlashMode) {
        self.flash = state;
        self.config.flashlight_state = state;
        self.persist_config();
        self.check_flashlight();
    }

    pub fn check_flashlight(&mut self) {
        let flash_available = self
            .camera
            .as_ref()
            .map(|camera| camera.flash_available)
            .unwrap_or(false);
        let live = self.state == CameraState::Preview || self.state == CameraState::Recording;
        if !live || !flash_available {
            return;
        }

        let params = self.repeating_params();
        if let Err(e) = self.backend.set_repeating(params) {
            log::warn!("failed to apply flash mode: {}", e);
            return;
        }
        self.listener.on_change_flash_mode(self.flash);
    }

    /// Pinch gesture; amplifies the raw scale factor and clamps into the
    /// hardware zoom range.
    pub fn on_pinch(&mut self, scale_factor: f32) {
        let Some(camera) = self.camera.clone() else {
            return;
        };

        self.zoom_ratio = pinch_zoom_ratio(
            self.zoom_ratio,
            scale_factor,
            camera.min_zoom_ratio,
            camera.max_zoom_ratio,
        );
        self.zoom_region = if self.zoom_ratio > 1.0 {
            Some(zoom_crop_region(camera.active_array, self.zoom_ratio))
        } else {
            None
        };

        let params = self.repeating_params();
        if let Err(e) = self.backend.set_repeating(params) {
            log::warn!("failed to apply zoom: {}", e);
        }
    }

    /// Tap-to-focus gesture in view coordinates.
    pub fn on_tap(&mut self, x: f32, y: f32) {
        self.last_focus = Some((x, y));
        self.focus_area(x, y);
        self.listener.on_focus_camera(x, y);
    }

    fn focus_area(&mut self, x: f32, y: f32) {
        let Some(camera) = self.camera.clone() else {
            return;
        };

        let transform = PreviewToCameraTransform::new(
            camera.sensor_orientation,
            self.use_front,
            self.view_size.width as f32,
            self.view_size.height as f32,
        );
        self.metering = Some(tap_to_metering(&transform, x, y, camera.active_array));

        let params = self.repeating_params();
        if let Err(e) = self.backend.set_repeating(params) {
            log::warn!("failed to apply focus region: {}", e);
        }
    }

    /// Intent-supplied destinations and in-process delivery do not touch the
    /// shared media index, so only the default destination needs storage.
    fn storage_permitted(&self, output: &MediaOutput) -> bool {
        self.permissions.storage || !matches!(output, MediaOutput::MediaIndex { .. })
    }

    fn repeating_params(&self) -> RepeatingParams {
        RepeatingParams {
            flash: self.flash,
            metering: self.metering,
            crop_region: self.zoom_region,
        }
    }

    fn persist_config(&self) {
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save_to_file(path) {
                log::warn!("failed to persist config: {}", e);
            }
        }
    }
}

/// Thread-safe owner of a [`SessionCore`]: spawns the background worker on
/// resume, joins it on pause, and exposes the [`Preview`] contract.
pub struct CaptureSession {
    core: Arc<Mutex<SessionCore>>,
    events_rx: Receiver<HardwareEvent>,
    worker: Option<thread::JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
}

impl CaptureSession {
    pub fn new(
        backend: Box<dyn CameraBackend>,
        listener: Arc<dyn PreviewListener>,
        config: AppConfig,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let core = SessionCore::new(backend, listener, config, events_tx);
        Self {
            core: Arc::new(Mutex::new(core)),
            events_rx,
            worker: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run a closure against the underlying state machine.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut SessionCore) -> R) -> R {
        let mut core = self.core.lock().expect("lock poisoned");
        f(&mut core)
    }

    fn start_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        self.stop_flag.store(false, Ordering::Relaxed);

        let core = Arc::clone(&self.core);
        let stop_flag = Arc::clone(&self.stop_flag);
        let events_rx = self.events_rx.clone();

        match thread::Builder::new()
            .name("shuttercam-camera-events".to_string())
            .spawn(move || event_loop(core, events_rx, stop_flag))
        {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => log::error!("failed to spawn camera event worker: {}", e),
        }
    }

    fn stop_worker(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Teardown: join the worker so event handling has a single owner, hand
    /// any still-queued events to the machine, then close the camera. A
    /// queued `Opened` would otherwise hold the open lock across the close
    /// and force the bounded wait.
    fn shutdown(&mut self) {
        self.stop_worker();
        while let Ok(event) = self.events_rx.try_recv() {
            self.with_core(|core| core.handle_event(event));
        }
        self.with_core(|core| core.on_paused());
    }
}

fn event_loop(
    core: Arc<Mutex<SessionCore>>,
    events_rx: Receiver<HardwareEvent>,
    stop_flag: Arc<AtomicBool>,
) {
    loop {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }
        match events_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => core.lock().expect("lock poisoned").handle_event(event),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

impl Preview for CaptureSession {
    fn on_resumed(&mut self) {
        self.start_worker();
        self.with_core(|core| core.on_resumed());
    }

    fn on_paused(&mut self) {
        // No capture callback may run after teardown; the worker is joined
        // before pause returns.
        self.shutdown();
    }

    fn toggle_front_back_camera(&mut self) {
        self.with_core(|core| core.toggle_front_back_camera());
    }

    fn toggle_flashlight(&mut self) {
        self.with_core(|core| core.toggle_flashlight());
    }

    fn set_flashlight_state(&mut self, state: FlashMode) {
        self.with_core(|core| core.set_flashlight_state(state));
    }

    fn try_take_picture(&mut self) {
        self.with_core(|core| core.try_take_picture());
    }

    fn toggle_recording(&mut self) {
        self.with_core(|core| core.toggle_recording());
    }

    fn init_photo_mode(&mut self) {
        self.with_core(|core| core.init_photo_mode());
    }

    fn init_video_mode(&mut self) {
        self.with_core(|core| core.init_video_mode());
    }

    fn check_flashlight(&mut self) {
        self.with_core(|core| core.check_flashlight());
    }

    fn set_target_path(&mut self, path: Option<PathBuf>) {
        self.with_core(|core| core.set_target_path(path));
    }

    fn set_is_image_capture_intent(&mut self, is_image_capture_intent: bool) {
        self.with_core(|core| core.set_is_image_capture_intent(is_image_capture_intent));
    }

    fn camera_state(&self) -> CameraState {
        self.with_core(|core| core.state())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
