use super::{LinearGradient, RadialGradient, Rgba, Surface};

/// Premultiplied RGBA pixel: color channels already scaled by alpha.
type Pixel = [f32; 4];

/// Software backing store. Logical coordinates are scaled by
/// `ratio * resolution` onto a `floor(width * scale) x floor(height * scale)`
/// pixel grid.
pub struct Raster {
    width: usize,
    height: usize,
    /// Backing pixels per logical pixel at a ratio of 1.
    resolution: f32,
    scale: f32,
    pixels: Vec<Pixel>,
    scratch: Vec<(f32, f32)>,
}

impl Raster {
    pub fn new() -> Self {
        Self::with_resolution(1.0)
    }

    /// A raster coarser (or finer) than one backing pixel per logical pixel.
    pub fn with_resolution(resolution: f32) -> Self {
        let resolution = if resolution.is_finite() && resolution > 0.0 { resolution } else { 1.0 };
        Self {
            width: 0,
            height: 0,
            resolution,
            scale: resolution,
            pixels: Vec::new(),
            scratch: Vec::new(),
        }
    }

    #[inline]
    pub fn backing_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Premultiplied pixel at backing coordinates.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.pixels[y * self.width + x]
    }

    /// Composites one backing pixel over an opaque background.
    #[inline]
    pub fn composite_over(&self, x: usize, y: usize, bg: (f32, f32, f32)) -> (f32, f32, f32) {
        let [r, g, b, a] = self.pixel(x, y);
        let keep = 1.0 - a;
        (r + bg.0 * keep, g + bg.1 * keep, b + bg.2 * keep)
    }

    #[inline]
    fn blend(&mut self, x: usize, y: usize, color: Rgba, coverage: f32) {
        let alpha = color.a * coverage;
        if alpha <= 0.0 {
            return;
        }
        let dst = &mut self.pixels[y * self.width + x];
        let keep = 1.0 - alpha;
        dst[0] = color.r * alpha + dst[0] * keep;
        dst[1] = color.g * alpha + dst[1] * keep;
        dst[2] = color.b * alpha + dst[2] * keep;
        dst[3] = alpha + dst[3] * keep;
    }

    /// Backing-pixel range covering `[min, max]` in backing units, clipped.
    fn span(min: f32, max: f32, limit: usize) -> Option<(usize, usize)> {
        if limit == 0 || max < 0.0 || min >= limit as f32 {
            return None;
        }
        let lo = min.floor().max(0.0) as usize;
        let hi = (max.ceil() as usize).min(limit - 1);
        (lo <= hi).then_some((lo, hi))
    }
}

impl Default for Raster {
    fn default() -> Self {
        Self::new()
    }
}

fn distance_to_segment(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - a.0) * dx + (py - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + dx * t, a.1 + dy * t);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

impl Surface for Raster {
    fn set_size(&mut self, width: f32, height: f32, ratio: f32) {
        self.scale = ratio * self.resolution;
        self.width = (width.max(0.0) * self.scale).floor() as usize;
        self.height = (height.max(0.0) * self.scale).floor() as usize;
        self.pixels.clear();
        self.pixels.resize(self.width * self.height, [0.0; 4]);
    }

    fn clear(&mut self) {
        self.pixels.fill([0.0; 4]);
    }

    fn fill_radial_gradient(&mut self, gradient: &RadialGradient) {
        let inv = 1.0 / self.scale;
        for y in 0..self.height {
            let ly = (y as f32 + 0.5) * inv;
            for x in 0..self.width {
                let lx = (x as f32 + 0.5) * inv;
                let color = gradient.color_at(lx, ly);
                self.blend(x, y, color, 1.0);
            }
        }
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgba) {
        if radius <= 0.0 || color.a <= 0.0 {
            return;
        }
        let cx = x * self.scale;
        let cy = y * self.scale;
        let r = radius * self.scale;

        let Some((x0, x1)) = Self::span(cx - r - 1.0, cx + r + 1.0, self.width) else {
            return;
        };
        let Some((y0, y1)) = Self::span(cy - r - 1.0, cy + r + 1.0, self.height) else {
            return;
        };

        for py in y0..=y1 {
            for px in x0..=x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                // One-pixel soft edge
                let coverage = (r - dist + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(px, py, color, coverage);
                }
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], width: f32, gradient: &LinearGradient) {
        if points.len() < 2 || width <= 0.0 {
            return;
        }
        let scale = self.scale;
        let mut scaled = std::mem::take(&mut self.scratch);
        scaled.clear();
        scaled.extend(points.iter().map(|&(x, y)| (x * scale, y * scale)));
        let half = width * scale * 0.5;

        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for &(x, y) in &scaled {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let bounds = Self::span(min_x - half - 1.0, max_x + half + 1.0, self.width)
            .zip(Self::span(min_y - half - 1.0, max_y + half + 1.0, self.height));
        let Some(((x0, x1), (y0, y1))) = bounds else {
            self.scratch = scaled;
            return;
        };

        // Each pixel is painted once with its distance to the nearest segment,
        // so joints between segments do not double up.
        for py in y0..=y1 {
            for px in x0..=x1 {
                let (sx, sy) = (px as f32 + 0.5, py as f32 + 0.5);
                let dist = scaled
                    .windows(2)
                    .map(|seg| distance_to_segment(sx, sy, seg[0], seg[1]))
                    .fold(f32::MAX, f32::min);
                let coverage = (half - dist + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    let color = gradient.color_at(sx / scale, sy / scale);
                    self.blend(px, py, color, coverage);
                }
            }
        }
        self.scratch = scaled;
    }
}
