use crate::canvas::Surface;

const MIN_PIXEL_RATIO: f32 = 1.0;
// Backing stores above 2x cost far more than they add for a background effect
const MAX_PIXEL_RATIO: f32 = 2.0;

/// Logical size of the drawing area and the ratio applied to its backing store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub ratio: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, device_ratio: f32) -> Self {
        Self {
            width: sanitize_extent(width),
            height: sanitize_extent(height),
            ratio: clamp_pixel_ratio(device_ratio),
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn longest_side(&self) -> f32 {
        self.width.max(self.height)
    }

    pub fn shortest_side(&self) -> f32 {
        self.width.min(self.height)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width * 0.5, self.height * 0.5)
    }

    /// Sizes the surface's backing store and installs the logical transform.
    pub fn apply_to<S: Surface + ?Sized>(&self, surface: &mut S) {
        surface.set_size(self.width, self.height, self.ratio);
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

pub fn clamp_pixel_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() {
        ratio.clamp(MIN_PIXEL_RATIO, MAX_PIXEL_RATIO)
    } else {
        MIN_PIXEL_RATIO
    }
}

fn sanitize_extent(value: f32) -> f32 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::testing::{DrawOp, RecordingSurface};

    #[test]
    fn pixel_ratio_is_clamped_to_one_and_two() {
        assert_eq!(clamp_pixel_ratio(0.5), 1.0);
        assert_eq!(clamp_pixel_ratio(1.25), 1.25);
        assert_eq!(clamp_pixel_ratio(3.0), 2.0);
        assert_eq!(clamp_pixel_ratio(f32::NAN), 1.0);
        assert_eq!(clamp_pixel_ratio(f32::INFINITY), 1.0);
    }

    #[test]
    fn negative_or_nan_extents_collapse_to_zero() {
        let viewport = Viewport::new(-10.0, f32::NAN, 1.0);
        assert_eq!(viewport.width, 0.0);
        assert_eq!(viewport.height, 0.0);
        assert_eq!(viewport.area(), 0.0);
    }

    #[test]
    fn apply_to_passes_logical_size_and_ratio() {
        let mut surface = RecordingSurface::default();
        Viewport::new(320.0, 200.0, 4.0).apply_to(&mut surface);
        assert_eq!(surface.ops, vec![DrawOp::SetSize(320.0, 200.0, 2.0)]);
    }
}
