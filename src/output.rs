//! Media output resolution.
//!
//! Decides where one capture goes: back into the process as raw image data,
//! to an explicit destination a third-party intent supplied, or into the
//! default media index. Exactly one destination is produced per request.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::errors::CameraError;
use crate::types::{CaptureMode, CapturedImage};

/// Metadata row accompanying a media-index destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: PathBuf,
}

/// One capture destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutput {
    /// Deliver the decoded capture in-process; only for return-data intents.
    InMemory,
    /// Write to the exact location the caller asked for.
    ExplicitPath(PathBuf),
    /// Default save path through the media index.
    MediaIndex { path: PathBuf, entry: MediaEntry },
}

impl MediaOutput {
    /// The filesystem locator for outputs that have one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            MediaOutput::InMemory => None,
            MediaOutput::ExplicitPath(path) => Some(path),
            MediaOutput::MediaIndex { path, .. } => Some(path),
        }
    }
}

/// Resolves a destination per capture from the caller context.
#[derive(Debug, Clone)]
pub struct MediaOutputResolver {
    save_folder: PathBuf,
    target_path: Option<PathBuf>,
    is_image_capture_intent: bool,
}

impl MediaOutputResolver {
    pub fn new(save_folder: PathBuf) -> Self {
        Self {
            save_folder,
            target_path: None,
            is_image_capture_intent: false,
        }
    }

    /// Explicit destination supplied by a third-party capture intent.
    pub fn set_target_path(&mut self, path: Option<PathBuf>) {
        self.target_path = path;
    }

    /// Marks the "get a picture back in this process" intent variant.
    pub fn set_is_image_capture_intent(&mut self, is_image_capture_intent: bool) {
        self.is_image_capture_intent = is_image_capture_intent;
    }

    pub fn is_image_capture_intent(&self) -> bool {
        self.is_image_capture_intent
    }

    /// Destination for a still capture. An explicit target always wins; the
    /// in-memory path is used only for the return-data intent variant.
    pub fn image_output(&self, now: DateTime<Local>) -> MediaOutput {
        if let Some(target) = &self.target_path {
            return MediaOutput::ExplicitPath(target.clone());
        }
        if self.is_image_capture_intent {
            return MediaOutput::InMemory;
        }
        self.media_index_output(CaptureMode::Photo, now)
    }

    /// Destination for a video recording. Video never goes in-memory.
    pub fn video_output(&self, now: DateTime<Local>) -> MediaOutput {
        if let Some(target) = &self.target_path {
            return MediaOutput::ExplicitPath(target.clone());
        }
        self.media_index_output(CaptureMode::Video, now)
    }

    fn media_index_output(&self, mode: CaptureMode, now: DateTime<Local>) -> MediaOutput {
        let name = media_filename(mode, now);
        let mime_type = match mode {
            CaptureMode::Photo => "image/jpeg",
            CaptureMode::Video => "video/mp4",
        };
        MediaOutput::MediaIndex {
            path: self.save_folder.join(&name),
            entry: MediaEntry {
                display_name: name,
                mime_type: mime_type.to_string(),
                relative_path: self.save_folder.clone(),
            },
        }
    }
}

/// Timestamped capture filename, `IMG_yyyyMMdd_HHmmss.jpg` style.
pub fn media_filename(mode: CaptureMode, now: DateTime<Local>) -> String {
    let stamp = now.format("%Y%m%d_%H%M%S");
    match mode {
        CaptureMode::Photo => format!("IMG_{}.jpg", stamp),
        CaptureMode::Video => format!("VID_{}.mp4", stamp),
    }
}

/// Write a captured buffer to its destination path.
pub fn write_capture(path: &Path, data: &[u8]) -> Result<(), CameraError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CameraError::IoError(format!("failed to create {:?}: {}", parent, e)))?;
    }
    fs::write(path, data)
        .map_err(|e| CameraError::IoError(format!("failed to write {:?}: {}", path, e)))
}

/// Remove a partially written output so no corrupt artifact is left behind.
pub fn delete_partial_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("failed to delete partial output {:?}: {}", path, e);
    }
}

/// Decode a captured JPEG buffer into displayable RGB pixels. Failures,
/// including allocation failures under memory pressure, are soft: the caller
/// gets `None` and no image is delivered.
pub fn decode_captured_image(jpeg_data: &[u8]) -> Option<CapturedImage> {
    match image::load_from_memory(jpeg_data) {
        Ok(decoded) => {
            let rgb = decoded.to_rgb8();
            Some(CapturedImage {
                width: rgb.width(),
                height: rgb.height(),
                data: rgb.into_raw(),
            })
        }
        Err(e) => {
            log::warn!("failed to decode captured image: {}", e);
            None
        }
    }
}
