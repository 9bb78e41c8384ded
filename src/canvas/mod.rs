//! Drawing surface abstraction used by the starfield.
//!
//! Every coordinate handed to a [`Surface`] is in logical pixels; the surface
//! owns the mapping onto its backing store.

mod raster;

pub use raster::Raster;

/// Straight (non-premultiplied) color. Channels are 0..=255, alpha is 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT_WHITE: Rgba = Rgba::new(255.0, 255.0, 255.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    fn lerp(self, other: Rgba, t: f32) -> Rgba {
        Rgba {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }
}

/// Hue in degrees, saturation and lightness in 0..=1, alpha in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsla {
    pub h: f32,
    pub s: f32,
    pub l: f32,
    pub a: f32,
}

impl Hsla {
    pub const fn new(h: f32, s: f32, l: f32, a: f32) -> Self {
        Self { h, s, l, a }
    }

    pub fn to_rgba(self) -> Rgba {
        let s = self.s.clamp(0.0, 1.0);
        let l = self.l.clamp(0.0, 1.0);
        let h = self.h.rem_euclid(360.0) / 60.0;

        let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = l - chroma / 2.0;

        Rgba::new(
            (r + m) * 255.0,
            (g + m) * 255.0,
            (b + m) * 255.0,
            self.a.clamp(0.0, 1.0),
        )
    }
}

impl From<Hsla> for Rgba {
    fn from(color: Hsla) -> Self {
        color.to_rgba()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Rgba,
}

impl ColorStop {
    pub fn new(offset: f32, color: impl Into<Rgba>) -> Self {
        Self {
            offset,
            color: color.into(),
        }
    }
}

/// Samples sorted stops at `t`, holding the end colors outside the stop range.
fn sample_stops(stops: &[ColorStop], t: f32) -> Rgba {
    let Some(first) = stops.first() else {
        return Rgba::TRANSPARENT_WHITE;
    };
    if t <= first.offset {
        return first.color;
    }

    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            if span <= f32::EPSILON {
                return b.color;
            }
            return a.color.lerp(b.color, (t - a.offset) / span);
        }
    }

    stops[stops.len() - 1].color
}

/// Gradient along the line from `(x0, y0)` to `(x1, y1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub stops: Vec<ColorStop>,
}

impl LinearGradient {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            stops: Vec::with_capacity(3),
        }
    }

    pub fn with_stop(mut self, offset: f32, color: impl Into<Rgba>) -> Self {
        self.stops.push(ColorStop::new(offset, color));
        self
    }

    /// Color at a logical position. A degenerate gradient paints nothing.
    pub fn color_at(&self, x: f32, y: f32) -> Rgba {
        let dx = self.x1 - self.x0;
        let dy = self.y1 - self.y0;
        let len_sq = dx * dx + dy * dy;
        if len_sq <= f32::EPSILON {
            return Rgba::TRANSPARENT_WHITE;
        }
        let t = ((x - self.x0) * dx + (y - self.y0) * dy) / len_sq;
        sample_stops(&self.stops, t.clamp(0.0, 1.0))
    }
}

/// Concentric radial gradient between `inner_radius` and `outer_radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub cx: f32,
    pub cy: f32,
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub stops: Vec<ColorStop>,
}

impl RadialGradient {
    pub fn new(cx: f32, cy: f32, inner_radius: f32, outer_radius: f32) -> Self {
        Self {
            cx,
            cy,
            inner_radius,
            outer_radius,
            stops: Vec::with_capacity(2),
        }
    }

    pub fn with_stop(mut self, offset: f32, color: impl Into<Rgba>) -> Self {
        self.stops.push(ColorStop::new(offset, color));
        self
    }

    pub fn color_at(&self, x: f32, y: f32) -> Rgba {
        let dist = ((x - self.cx).powi(2) + (y - self.cy).powi(2)).sqrt();
        let span = self.outer_radius - self.inner_radius;
        let t = if span <= f32::EPSILON {
            if dist >= self.outer_radius { 1.0 } else { 0.0 }
        } else {
            (dist - self.inner_radius) / span
        };
        sample_stops(&self.stops, t.clamp(0.0, 1.0))
    }
}

/// A 2D drawing surface addressed in logical pixels.
pub trait Surface {
    /// Resizes the backing store to `floor(logical * ratio)` and maps logical
    /// coordinates onto it.
    fn set_size(&mut self, width: f32, height: f32, ratio: f32);
    fn clear(&mut self);
    /// Fills the whole logical area with `gradient`.
    fn fill_radial_gradient(&mut self, gradient: &RadialGradient);
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgba);
    /// Strokes one connected path through `points`. Fewer than two points
    /// paint nothing.
    fn stroke_polyline(&mut self, points: &[(f32, f32)], width: f32, gradient: &LinearGradient);
}
