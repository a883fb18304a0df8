//! Resolution and video-quality selection.
//!
//! Hardware capability does not change at runtime, so the enumerated camera
//! set is cached for the process lifetime and only re-enumerated when the
//! cache is empty. The sort orders are deterministic so a persisted index
//! keeps pointing at the same semantic choice across app runs.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Mutex;

use lazy_static::lazy_static;

use crate::config::AppConfig;
use crate::errors::CameraError;
use crate::types::{CameraInfo, CaptureMode, Size, VideoQuality};

/// Video streams above this are filtered out of the selectable set.
pub const MAX_VIDEO_WIDTH: u32 = 4096;
pub const MAX_VIDEO_HEIGHT: u32 = 2160;

lazy_static! {
    static ref CAMERA_CACHE: Mutex<Vec<CameraInfo>> = Mutex::new(Vec::new());
}

/// Return the cached camera set, enumerating through `enumerate` only when
/// the cache is empty.
pub fn cached_cameras<F>(enumerate: F) -> Result<Vec<CameraInfo>, CameraError>
where
    F: FnOnce() -> Result<Vec<CameraInfo>, CameraError>,
{
    let mut cache = CAMERA_CACHE.lock().expect("lock poisoned");
    if cache.is_empty() {
        *cache = enumerate()?;
        log::info!("enumerated {} camera(s)", cache.len());
    }
    Ok(cache.clone())
}

/// Drop the process-wide enumeration cache. Test hook; production code never
/// needs it because capabilities are fixed.
pub fn clear_camera_cache() {
    CAMERA_CACHE.lock().expect("lock poisoned").clear();
}

/// Photo sizes in selection order: descending aspect ratio, then descending
/// pixel count, deduplicated by pixel count, degenerate sizes excluded.
pub fn photo_sizes(camera: &CameraInfo) -> Vec<Size> {
    let mut sizes: Vec<Size> = camera
        .photo_sizes
        .iter()
        .copied()
        .filter(|size| !size.is_degenerate())
        .collect();

    sizes.sort_by(|a, b| {
        b.ratio()
            .partial_cmp(&a.ratio())
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.pixels().cmp(&a.pixels()))
            .then_with(|| b.width.cmp(&a.width))
    });
    // Pixel-count duplicates may not be adjacent in a ratio-major order,
    // so deduplicate globally.
    let mut seen = HashSet::new();
    sizes.retain(|size| seen.insert(size.pixels()));
    sizes
}

/// Video qualities in selection order: descending pixel count, capped at the
/// maximum recordable stream size.
pub fn video_qualities(camera: &CameraInfo) -> Vec<VideoQuality> {
    let mut qualities: Vec<VideoQuality> = camera
        .video_qualities
        .iter()
        .copied()
        .filter(|quality| {
            let size = quality.size();
            size.width <= MAX_VIDEO_WIDTH && size.height <= MAX_VIDEO_HEIGHT
        })
        .collect();
    qualities.sort_by(|a, b| b.pixels().cmp(&a.pixels()));
    qualities.dedup();
    qualities
}

/// Clamp a persisted index into `[0, count)`. An index left behind by an
/// older firmware size list collapses to the first entry instead of failing.
pub fn clamp_index(index: usize, count: usize) -> usize {
    if count == 0 || index < count {
        index.min(count.saturating_sub(1))
    } else {
        0
    }
}

/// Resolve the photo size the user selected for this camera.
pub fn resolve_photo(camera: &CameraInfo, config: &AppConfig) -> Option<Size> {
    let sizes = photo_sizes(camera);
    if sizes.is_empty() {
        return None;
    }
    let index = config.resolution_index(camera.facing, CaptureMode::Photo);
    Some(sizes[clamp_index(index, sizes.len())])
}

/// Resolve the video quality the user selected for this camera. Falls back
/// to HD when the camera reports no usable ladder entry.
pub fn resolve_video(camera: &CameraInfo, config: &AppConfig) -> VideoQuality {
    let qualities = video_qualities(camera);
    if qualities.is_empty() {
        return VideoQuality::Hd;
    }
    let index = config.resolution_index(camera.facing, CaptureMode::Video);
    qualities[clamp_index(index, qualities.len())]
}
