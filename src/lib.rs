//! ShutterCam: a camera capture core built around an event-driven session
//! state machine.
//!
//! This crate owns the full capture lifecycle against a hardware backend:
//! opening and closing the device, still capture with autofocus and exposure
//! convergence, video recording, orientation compensation, resolution
//! selection, and zoom/focus gesture mapping. The host UI talks to it
//! through the [`Preview`] trait and listens through [`PreviewListener`];
//! hardware talks back through [`hal::HardwareEvent`]s.
//!
//! # Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use shuttercam::{AppConfig, CaptureSession, Preview};
//!
//! let backend = my_backend();
//! let listener = Arc::new(MyListener::new());
//! let mut session = CaptureSession::new(backend, listener, AppConfig::load_or_default());
//! session.on_resumed();
//! session.try_take_picture();
//! ```

pub mod config;
pub mod errors;
pub mod gesture;
pub mod hal;
pub mod orientation;
pub mod output;
pub mod preview;
pub mod resolution;
pub mod session;
pub mod types;

// Testing utilities - scripted backend for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use errors::CameraError;
pub use preview::{PermissionSet, Preview, PreviewListener};
pub use session::{CameraState, CaptureSession, SessionCore};
pub use types::{
    CameraInfo, CaptureMode, CapturedImage, FlashMode, LensFacing, Size, VideoQuality,
};

/// Initialize logging for the capture core
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "shuttercam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
