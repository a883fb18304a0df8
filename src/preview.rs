//! The preview capability contract between the host UI and a hardware
//! backend implementation.
//!
//! The host drives the preview through [`Preview`] and receives results
//! through [`PreviewListener`]. Listener calls may arrive on the background
//! worker; the host is responsible for re-dispatching to its UI thread
//! before touching UI state.

use std::path::{Path, PathBuf};

use crate::errors::CameraError;
use crate::session::CameraState;
use crate::types::{CapturedImage, FlashMode};

/// Permissions the host has obtained on behalf of the preview. The host
/// owns the request dialogs; the core only consults the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSet {
    pub camera: bool,
    pub microphone: bool,
    pub storage: bool,
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self {
            camera: true,
            microphone: true,
            storage: true,
        }
    }
}

/// Commands the host UI issues against a preview implementation. All calls
/// are expected to arrive serialized from the host's single-threaded
/// dispatch.
pub trait Preview {
    /// Host became visible; start the background worker and open the camera.
    fn on_resumed(&mut self);
    /// Host is going away; tear everything down and release the hardware.
    fn on_paused(&mut self);

    fn toggle_front_back_camera(&mut self);
    fn toggle_flashlight(&mut self);
    fn set_flashlight_state(&mut self, state: FlashMode);
    fn try_take_picture(&mut self);
    fn toggle_recording(&mut self);
    fn init_photo_mode(&mut self);
    fn init_video_mode(&mut self);
    fn check_flashlight(&mut self);

    /// Explicit output destination from a third-party capture intent.
    fn set_target_path(&mut self, path: Option<PathBuf>);
    /// Marks the return-data image capture intent variant.
    fn set_is_image_capture_intent(&mut self, is_image_capture_intent: bool);

    fn camera_state(&self) -> CameraState;
}

/// Callbacks into the host UI. Default implementations are no-ops so hosts
/// and tests implement only what they observe.
#[allow(unused_variables)]
pub trait PreviewListener: Send + Sync {
    fn set_camera_available(&self, available: bool) {}
    fn set_has_front_and_back_camera(&self, has_both: bool) {}
    fn set_flash_available(&self, available: bool) {}
    fn on_change_camera(&self, is_front: bool) {}
    fn on_change_flash_mode(&self, mode: FlashMode) {}
    fn on_focus_camera(&self, x: f32, y: f32) {}
    fn on_video_recording_started(&self) {}
    fn on_video_recording_stopped(&self) {}
    fn on_video_duration_changed(&self, duration_nanos: u64) {}
    /// A capture landed at `path`; for intents the host returns it to the
    /// caller with a read grant on the locator.
    fn on_media_saved(&self, path: &Path) {}
    /// Return-data intents get the decoded capture directly.
    fn on_image_captured(&self, image: CapturedImage) {}
    fn toggle_bottom_buttons(&self, hide: bool) {}
    /// An internally-saved artifact should be rescanned into the media
    /// index so gallery-style consumers pick it up.
    fn on_media_rescan(&self, path: &Path) {}
    /// Boundary-converted hardware failures; nothing is retried.
    fn on_camera_error(&self, error: &CameraError) {}
}
