//! Core value types shared across the capture pipeline.

use serde::{Deserialize, Serialize};

const ONE_MEGA_PIXEL: f32 = 1_000_000.0;

/// A still/preview output size reported by the camera hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Megapixel label with one decimal, e.g. "12.2".
    pub fn megapixels(&self) -> String {
        format!("{:.1}", self.pixels() as f32 / ONE_MEGA_PIXEL)
    }

    /// Sizes that round down to zero megapixels are not worth offering.
    pub fn is_degenerate(&self) -> bool {
        self.megapixels() == "0.0"
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle, used for sensor regions and crop windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Which way a camera lens points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LensFacing {
    Front,
    Back,
}

impl LensFacing {
    pub fn flipped(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LensFacing::Front => "front",
            LensFacing::Back => "back",
        }
    }
}

/// The two capture modes the host can put the preview into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    Photo,
    Video,
}

/// Flashlight state. Auto is only meaningful for still capture; video mode
/// treats the flash as a torch and cycles Off/On only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashMode {
    Off,
    On,
    Auto,
}

impl FlashMode {
    /// Cycle to the next state for the given capture mode.
    pub fn next(self, mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Photo => match self {
                FlashMode::Off => FlashMode::On,
                FlashMode::On => FlashMode::Auto,
                FlashMode::Auto => FlashMode::Off,
            },
            CaptureMode::Video => match self {
                FlashMode::Off => FlashMode::On,
                _ => FlashMode::Off,
            },
        }
    }

    pub fn from_index(index: u8) -> Self {
        match index {
            1 => FlashMode::On,
            2 => FlashMode::Auto,
            _ => FlashMode::Off,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            FlashMode::Off => 0,
            FlashMode::On => 1,
            FlashMode::Auto => 2,
        }
    }
}

/// The standard video quality ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoQuality {
    Uhd,
    Fhd,
    Hd,
    Sd,
}

impl VideoQuality {
    pub fn size(&self) -> Size {
        match self {
            VideoQuality::Uhd => Size::new(3840, 2160),
            VideoQuality::Fhd => Size::new(1920, 1080),
            VideoQuality::Hd => Size::new(1280, 720),
            VideoQuality::Sd => Size::new(720, 480),
        }
    }

    pub fn pixels(&self) -> u64 {
        self.size().pixels()
    }
}

/// One physical camera as enumerated at startup. Immutable afterwards;
/// capability flags never change at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub id: String,
    pub facing: LensFacing,
    /// Fixed mounting orientation of the sensor, in degrees.
    pub sensor_orientation: u32,
    pub flash_available: bool,
    pub focus_available: bool,
    pub min_zoom_ratio: f32,
    pub max_zoom_ratio: f32,
    /// Full pixel array the sensor exposes, in sensor coordinates.
    pub active_array: Rect,
    pub photo_sizes: Vec<Size>,
    pub video_qualities: Vec<VideoQuality>,
}

/// A decoded still capture handed back to the host for return-data intents.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8 pixels.
    pub data: Vec<u8>,
}
