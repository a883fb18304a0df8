//! Zoom and focus gesture mapping.
//!
//! Pinch scale factors are amplified and clamped into the hardware zoom
//! range. Taps travel from view space through the inverted camera-to-preview
//! transform into the [-1000, 1000] sensor-relative grid, then into metering
//! rectangles on the sensor's active pixel array.

use crate::types::Rect;

/// Half-size of a tap focus region on the [-1000, 1000] grid.
const FOCUS_HALF_SIZE: i32 = 50;
/// The exposure region is 1.5x the focus region.
const EXPOSURE_HALF_SIZE: i32 = 75;
/// Highest metering weight the hardware accepts.
pub const METERING_WEIGHT_MAX: i32 = 1000;

const GRID_MIN: i32 = -1000;
const GRID_MAX: i32 = 1000;

/// Amplify a raw pinch scale factor by doubling its deviation from 1.0.
pub fn amplify_pinch(scale_factor: f32) -> f32 {
    if scale_factor > 1.0 {
        1.0 + (scale_factor - 1.0) * 2.0
    } else {
        1.0 - (1.0 - scale_factor) * 2.0
    }
}

/// New zoom ratio for a pinch event, clamped into the hardware range.
pub fn pinch_zoom_ratio(current: f32, scale_factor: f32, min: f32, max: f32) -> f32 {
    (current * amplify_pinch(scale_factor)).clamp(min, max)
}

/// Centered crop of the active array for a digital zoom ratio.
pub fn zoom_crop_region(active_array: Rect, zoom_ratio: f32) -> Rect {
    let ratio = zoom_ratio.max(1.0);
    let crop_w = (active_array.width() as f32 / ratio) as i32;
    let crop_h = (active_array.height() as f32 / ratio) as i32;
    let left = active_array.left + (active_array.width() - crop_w) / 2;
    let top = active_array.top + (active_array.height() - crop_h) / 2;
    Rect::new(left, top, left + crop_w, top + crop_h)
}

/// Row-major 2x3 affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    m: [f32; 6],
}

impl Affine {
    fn identity() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    fn scale(sx: f32, sy: f32) -> Self {
        Self {
            m: [sx, 0.0, 0.0, 0.0, sy, 0.0],
        }
    }

    fn rotate_degrees(degrees: f32) -> Self {
        let radians = degrees.to_radians();
        let (sin, cos) = radians.sin_cos();
        Self {
            m: [cos, -sin, 0.0, sin, cos, 0.0],
        }
    }

    fn translate(tx: f32, ty: f32) -> Self {
        Self {
            m: [1.0, 0.0, tx, 0.0, 1.0, ty],
        }
    }

    /// Apply `op` after self, like Android's Matrix.post* family.
    fn post(self, op: Affine) -> Self {
        let a = op.m;
        let b = self.m;
        Self {
            m: [
                a[0] * b[0] + a[1] * b[3],
                a[0] * b[1] + a[1] * b[4],
                a[0] * b[2] + a[1] * b[5] + a[2],
                a[3] * b[0] + a[4] * b[3],
                a[3] * b[1] + a[4] * b[4],
                a[3] * b[2] + a[4] * b[5] + a[5],
            ],
        }
    }

    fn invert(self) -> Option<Self> {
        let [a, b, tx, c, d, ty] = self.m;
        let det = a * d - b * c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let ia = d * inv_det;
        let ib = -b * inv_det;
        let ic = -c * inv_det;
        let id = a * inv_det;
        Some(Self {
            m: [
                ia,
                ib,
                -(ia * tx + ib * ty),
                ic,
                id,
                -(ic * tx + id * ty),
            ],
        })
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.m[0] * x + self.m[1] * y + self.m[2],
            self.m[3] * x + self.m[4] * y + self.m[5],
        )
    }
}

/// Maps view-space touch coordinates into the [-1000, 1000] camera grid.
///
/// Built from the camera-to-preview transform (mirror for the front camera,
/// rotate by the sensor orientation, scale and center onto the view) and
/// inverted once.
#[derive(Debug, Clone, Copy)]
pub struct PreviewToCameraTransform {
    inverse: Affine,
}

impl PreviewToCameraTransform {
    pub fn new(sensor_orientation: u32, mirrored: bool, view_width: f32, view_height: f32) -> Self {
        let y_scale = if mirrored { -1.0 } else { 1.0 };
        let camera_to_preview = Affine::scale(1.0, y_scale)
            .post(Affine::rotate_degrees(sensor_orientation as f32))
            .post(Affine::scale(view_width / 2000.0, view_height / 2000.0))
            .post(Affine::translate(view_width / 2.0, view_height / 2.0));

        // The forward transform is always invertible: both scales are
        // non-zero for any real view.
        let inverse = camera_to_preview.invert().unwrap_or_else(Affine::identity);
        Self { inverse }
    }

    /// Map a view-space touch point into camera grid coordinates.
    pub fn map_touch(&self, x: f32, y: f32) -> (i32, i32) {
        let (cx, cy) = self.inverse.map(x, y);
        (cx as i32, cy as i32)
    }
}

/// A weighted metering rectangle in sensor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeteringRectangle {
    pub rect: Rect,
    pub weight: i32,
}

/// Focus and exposure regions produced by one tap. The regions persist until
/// explicitly replaced; auto-cancel stays disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeteringRegions {
    pub focus: MeteringRectangle,
    pub exposure: MeteringRectangle,
    pub auto_cancel: bool,
}

/// Square region on the camera grid around a point, shifted back inside the
/// grid when the tap lands near an edge.
fn grid_region(center_x: i32, center_y: i32, half_size: i32) -> Rect {
    let mut rect = Rect::new(
        center_x - half_size,
        center_y - half_size,
        center_x + half_size,
        center_y + half_size,
    );

    if rect.left < GRID_MIN {
        rect.left = GRID_MIN;
        rect.right = rect.left + 2 * half_size;
    } else if rect.right > GRID_MAX {
        rect.right = GRID_MAX;
        rect.left = rect.right - 2 * half_size;
    }

    if rect.top < GRID_MIN {
        rect.top = GRID_MIN;
        rect.bottom = rect.top + 2 * half_size;
    } else if rect.bottom > GRID_MAX {
        rect.bottom = GRID_MAX;
        rect.top = rect.bottom - 2 * half_size;
    }

    rect
}

/// Convert a [-1000, 1000] grid rectangle into sensor active-array pixels.
fn grid_to_sensor(active_array: Rect, rect: Rect) -> Rect {
    let crop = active_array;
    let left_f = (rect.left + 1000) as f32 / 2000.0;
    let top_f = (rect.top + 1000) as f32 / 2000.0;
    let right_f = (rect.right + 1000) as f32 / 2000.0;
    let bottom_f = (rect.bottom + 1000) as f32 / 2000.0;

    let mut left = crop.left + (left_f * (crop.width() - 1) as f32) as i32;
    let mut right = crop.left + (right_f * (crop.width() - 1) as f32) as i32;
    let mut top = crop.top + (top_f * (crop.height() - 1) as f32) as i32;
    let mut bottom = crop.top + (bottom_f * (crop.height() - 1) as f32) as i32;

    left = left.clamp(crop.left, crop.right);
    right = right.clamp(crop.left, crop.right);
    top = top.clamp(crop.top, crop.bottom);
    bottom = bottom.clamp(crop.top, crop.bottom);

    Rect::new(left, top, right, bottom)
}

/// Build the focus and exposure metering regions for a tap.
pub fn tap_to_metering(
    transform: &PreviewToCameraTransform,
    x: f32,
    y: f32,
    active_array: Rect,
) -> MeteringRegions {
    let (cx, cy) = transform.map_touch(x, y);

    let focus_rect = grid_to_sensor(active_array, grid_region(cx, cy, FOCUS_HALF_SIZE));
    let exposure_rect = grid_to_sensor(active_array, grid_region(cx, cy, EXPOSURE_HALF_SIZE));

    MeteringRegions {
        focus: MeteringRectangle {
            rect: focus_rect,
            weight: METERING_WEIGHT_MAX,
        },
        exposure: MeteringRectangle {
            rect: exposure_rect,
            weight: METERING_WEIGHT_MAX,
        },
        auto_cancel: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amplify_doubles_deviation() {
        assert!((amplify_pinch(1.1) - 1.2).abs() < 1e-6);
        assert!((amplify_pinch(0.9) - 0.8).abs() < 1e-6);
        assert!((amplify_pinch(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pinch_zoom_clamps_both_ends() {
        assert_eq!(pinch_zoom_ratio(1.0, 0.1, 1.0, 4.0), 1.0);
        assert_eq!(pinch_zoom_ratio(3.9, 2.0, 1.0, 4.0), 4.0);
        let mid = pinch_zoom_ratio(2.0, 1.1, 1.0, 4.0);
        assert!(mid > 2.0 && mid < 4.0);
    }

    #[test]
    fn test_zoom_crop_region_centered() {
        let active = Rect::new(0, 0, 4000, 3000);
        let crop = zoom_crop_region(active, 2.0);
        assert_eq!(crop, Rect::new(1000, 750, 3000, 2250));
        // Zoom 1.0 keeps the full array.
        assert_eq!(zoom_crop_region(active, 1.0), active);
    }

    #[test]
    fn test_grid_region_clamped_at_edges() {
        let rect = grid_region(-990, 990, FOCUS_HALF_SIZE);
        assert_eq!(rect.left, -1000);
        assert_eq!(rect.right, -900);
        assert_eq!(rect.bottom, 1000);
        assert_eq!(rect.top, 900);
    }

    #[test]
    fn test_center_tap_maps_to_grid_origin() {
        let transform = PreviewToCameraTransform::new(90, false, 1080.0, 1920.0);
        let (cx, cy) = transform.map_touch(540.0, 960.0);
        assert!(cx.abs() <= 1);
        assert!(cy.abs() <= 1);
    }

    #[test]
    fn test_exposure_region_larger_than_focus() {
        let transform = PreviewToCameraTransform::new(0, false, 1000.0, 1000.0);
        let regions = tap_to_metering(&transform, 500.0, 500.0, Rect::new(0, 0, 4000, 3000));
        assert!(regions.exposure.rect.width() > regions.focus.rect.width());
        assert!(regions.exposure.rect.height() > regions.focus.rect.height());
        assert!(!regions.auto_cancel);
    }

    #[test]
    fn test_metering_regions_inside_active_array() {
        let active = Rect::new(0, 0, 4032, 3024);
        let transform = PreviewToCameraTransform::new(270, true, 1080.0, 2340.0);
        for &(x, y) in &[(0.0, 0.0), (1079.0, 2339.0), (10.0, 2000.0)] {
            let regions = tap_to_metering(&transform, x, y, active);
            for rect in [regions.focus.rect, regions.exposure.rect] {
                assert!(rect.left >= active.left && rect.right <= active.right);
                assert!(rect.top >= active.top && rect.bottom <= active.bottom);
            }
        }
    }
}
