//! Hardware backend abstraction.
//!
//! The camera device is a single-owner, asynchronous resource: commands are
//! issued through [`CameraBackend`] and the hardware answers later through
//! [`HardwareEvent`]s on a channel. The session state machine is the only
//! consumer of both sides.

use std::path::PathBuf;

use crossbeam_channel::Sender;

use crate::errors::CameraError;
use crate::gesture::MeteringRegions;
use crate::types::{CameraInfo, FlashMode, Rect, Size};

/// Recording defaults matching typical device encoders.
pub const VIDEO_BIT_RATE: u32 = 10_000_000;
pub const VIDEO_FRAME_RATE: u32 = 30;

/// Autofocus convergence state reported in a capture result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfState {
    /// The hardware reported no AF state at all.
    Unknown,
    Scanning,
    FocusedLocked,
    NotFocusedLocked,
}

impl AfState {
    /// Locked in either outcome; the capture can proceed.
    pub fn is_locked(&self) -> bool {
        matches!(self, AfState::FocusedLocked | AfState::NotFocusedLocked)
    }
}

/// Auto-exposure convergence state reported in a capture result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeState {
    /// The hardware reported no AE state at all.
    Unknown,
    Searching,
    Converged,
    Precapture,
    FlashRequired,
}

/// Asynchronous hardware callbacks, delivered on the background worker.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    /// Device finished opening and is ready for a session.
    Opened,
    /// Device was taken away (unplugged, claimed by another client).
    Disconnected,
    /// Device-level error from the open attempt or a live device.
    DeviceError(String),
    /// The requested stream set is live.
    SessionConfigured,
    SessionConfigureFailed(String),
    /// Partial or total capture result carrying convergence state.
    CaptureResult { af: AfState, ae: AeState },
    /// Still capture completed; payload is the encoded image.
    StillTaken(Vec<u8>),
    StillFailed(String),
    RecorderStarted,
    RecordingProgress { duration_nanos: u64 },
    /// Recorder finished. `ok` is false when stop failed and the partial
    /// output must be discarded.
    RecorderStopped { ok: bool },
}

/// The stream combinations a session can be configured with. The set is
/// fixed at session creation; changing it requires a full rebuild.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSet {
    PreviewOnly,
    PreviewAndStill { resolution: Size },
    PreviewAndRecorder { recorder: RecorderConfig },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub output_path: PathBuf,
    pub video_size: Size,
    pub orientation_hint: Option<u32>,
    pub bit_rate: u32,
    pub frame_rate: u32,
}

/// Parameters applied to the repeating preview request.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingParams {
    pub flash: FlashMode,
    pub metering: Option<MeteringRegions>,
    pub crop_region: Option<Rect>,
}

/// One still capture, with everything baked in at trigger time.
#[derive(Debug, Clone, PartialEq)]
pub struct StillRequest {
    pub jpeg_orientation: u32,
    pub jpeg_quality: u8,
    pub flash: FlashMode,
    pub crop_region: Option<Rect>,
    /// Mirror the output, used for flip-selfie captures.
    pub flip_horizontal: bool,
}

/// Contract every hardware backend satisfies. Calls return immediately;
/// completion arrives as [`HardwareEvent`]s on the sender handed to
/// [`CameraBackend::open_device`]. Implementations own the device, session,
/// still stream, and recorder exclusively.
pub trait CameraBackend: Send {
    fn enumerate_cameras(&mut self) -> Result<Vec<CameraInfo>, CameraError>;

    /// Begin opening a device. `Opened`, `Disconnected`, or `DeviceError`
    /// follows on the event channel.
    fn open_device(
        &mut self,
        camera_id: &str,
        events: Sender<HardwareEvent>,
    ) -> Result<(), CameraError>;

    /// Close the device and release every attached resource. Idempotent.
    fn close_device(&mut self);

    /// Configure a session with the given stream set. `SessionConfigured`
    /// or `SessionConfigureFailed` follows.
    fn configure_session(&mut self, streams: StreamSet) -> Result<(), CameraError>;

    fn stop_repeating(&mut self) -> Result<(), CameraError>;
    fn abort_captures(&mut self) -> Result<(), CameraError>;

    /// Close the session only, leaving the device open. Idempotent.
    fn close_session(&mut self);

    /// Install or refresh the repeating preview request.
    fn set_repeating(&mut self, params: RepeatingParams) -> Result<(), CameraError>;

    /// Trigger the AF lock sequence; convergence arrives via
    /// `CaptureResult` events.
    fn trigger_af_lock(&mut self) -> Result<(), CameraError>;

    /// Trigger the exposure precapture sequence.
    fn trigger_precapture(&mut self) -> Result<(), CameraError>;

    /// Return AF to idle after a capture.
    fn cancel_af_trigger(&mut self) -> Result<(), CameraError>;

    /// Fire one still capture. `StillTaken` or `StillFailed` follows.
    fn capture_still(&mut self, request: StillRequest) -> Result<(), CameraError>;

    /// Start the recorder attached by a `PreviewAndRecorder` session.
    fn start_recorder(&mut self) -> Result<(), CameraError>;

    /// Stop the recorder. `RecorderStopped` follows.
    fn stop_recorder(&mut self) -> Result<(), CameraError>;
}
