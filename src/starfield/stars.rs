use super::rand_range;
use super::viewport::Viewport;
use crate::canvas::{Hsla, Surface};
use std::f32::consts::PI;

const BASE_STAR_COUNT: f32 = 220.0;
const REFERENCE_AREA: f32 = 1280.0 * 720.0;
pub const MIN_STARS: usize = 120;
pub const MAX_STARS: usize = 500;

// Per-frame rates below were tuned at 60 Hz; they are scaled by `dt * 60`.
const REFERENCE_FPS: f32 = 60.0;
const TWINKLE_RATE: f32 = 0.03;

const WRAP_MARGIN: f32 = 2.0;
const GLOW_RADIUS_SCALE: f32 = 2.7;
const GLOW_ALPHA_SCALE: f32 = 0.35;
const GLOW_ALPHA_CAP: f32 = 0.8;
const FLASH_GROWTH: f32 = 0.9;

/// One ambient star. Stored by value in [`StarPopulation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub base_alpha: f32,
    pub twinkle_speed: f32,
    pub phase: f32,
    pub drift_x: f32,
    pub drift_y: f32,
    pub hue: f32,
    pub next_flash: f64,
    pub flash_until: f64,
    pub flash_duration: f64,
    pub flash_amp: f32,
    /// Opacity as of the last update.
    pub alpha: f32,
    /// Radius as of the last update, including flash growth.
    pub display_radius: f32,
}

impl Star {
    fn random(rng: &mut fastrand::Rng, viewport: &Viewport, now: f64) -> Self {
        let radius = rand_range(rng, 0.5, 1.6);
        let base_alpha = rand_range(rng, 0.5, 1.0);
        Self {
            x: rng.f32() * viewport.width,
            y: rng.f32() * viewport.height,
            radius,
            base_alpha,
            twinkle_speed: rand_range(rng, 0.5, 1.6),
            phase: rng.f32() * PI * 2.0,
            drift_x: rand_range(rng, -0.02, 0.02),
            drift_y: rand_range(rng, -0.02, 0.02),
            hue: rand_range(rng, 200.0, 250.0),
            next_flash: now + rand_range(rng, 1.5, 6.0) as f64,
            flash_until: now,
            flash_duration: 0.0,
            flash_amp: 0.0,
            alpha: base_alpha,
            display_radius: radius,
        }
    }

    /// Fraction of the current flash window elapsed, or `None` outside a window.
    pub fn flash_progress(&self, now: f64) -> Option<f32> {
        if self.flash_until > now && self.flash_duration > 0.0 {
            let progress = 1.0 - (self.flash_until - now) / self.flash_duration;
            Some(progress.clamp(0.0, 1.0) as f32)
        } else {
            None
        }
    }

    pub fn flash_boost(&self, now: f64) -> f32 {
        self.flash_progress(now)
            .map_or(0.0, |progress| flash_pulse(progress, self.flash_amp))
    }

    /// Brightness factor in `[0.45, 1]` following the twinkle phase.
    pub fn twinkle(&self) -> f32 {
        0.45 + 0.55 * ((self.phase.sin() + 1.0) * 0.5)
    }

    fn maybe_start_flash(&mut self, rng: &mut fastrand::Rng, now: f64) {
        if now < self.next_flash {
            return;
        }
        self.flash_duration = rand_range(rng, 0.25, 0.65) as f64;
        self.flash_until = now + self.flash_duration;
        self.flash_amp = rand_range(rng, 0.6, 1.1);
        self.next_flash = self.flash_until + rand_range(rng, 2.5, 6.5) as f64;
    }

    fn drift(&mut self, frames: f32, viewport: &Viewport) {
        self.x += self.drift_x * frames;
        self.y += self.drift_y * frames;

        if self.x < -WRAP_MARGIN {
            self.x = viewport.width + WRAP_MARGIN;
        }
        if self.x > viewport.width + WRAP_MARGIN {
            self.x = -WRAP_MARGIN;
        }
        if self.y < -WRAP_MARGIN {
            self.y = viewport.height + WRAP_MARGIN;
        }
        if self.y > viewport.height + WRAP_MARGIN {
            self.y = -WRAP_MARGIN;
        }
    }
}

/// Smooth flash pulse: zero at both window ends, peaking mid-window.
pub fn flash_pulse(progress: f32, amplitude: f32) -> f32 {
    (progress * PI).sin().powi(2) * amplitude
}

/// Star count for a viewport, clamped to `[MIN_STARS, MAX_STARS]`.
pub fn target_count(viewport: &Viewport, density_multiplier: f32) -> usize {
    let density = BASE_STAR_COUNT * density_multiplier * (viewport.area() / REFERENCE_AREA);
    let density = if density.is_finite() { density.floor() } else { 0.0 };
    (density.max(0.0) as usize).clamp(MIN_STARS, MAX_STARS)
}

#[derive(Debug, Default)]
pub struct StarPopulation {
    stars: Vec<Star>,
}

impl StarPopulation {
    pub fn new() -> Self {
        Self { stars: Vec::new() }
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    /// Replaces the whole population, reusing the existing allocation.
    pub fn initialize(&mut self, rng: &mut fastrand::Rng, viewport: &Viewport, density_multiplier: f32, now: f64) {
        let count = target_count(viewport, density_multiplier);
        self.stars.clear();
        self.stars.reserve(count);
        for _ in 0..count {
            self.stars.push(Star::random(rng, viewport, now));
        }
    }

    pub fn update(&mut self, rng: &mut fastrand::Rng, dt: f32, now: f64, viewport: &Viewport) {
        let frames = dt * REFERENCE_FPS;
        for star in &mut self.stars {
            star.phase += TWINKLE_RATE * star.twinkle_speed * frames;
            star.maybe_start_flash(rng, now);

            let boost = star.flash_boost(now);
            star.alpha = (star.base_alpha * star.twinkle() + boost).min(1.0);
            star.display_radius = star.radius * (1.0 + boost * FLASH_GROWTH);

            star.drift(frames, viewport);
        }
    }

    pub fn draw<S: Surface + ?Sized>(&self, surface: &mut S) {
        for star in &self.stars {
            let glow_alpha = (star.alpha * GLOW_ALPHA_SCALE).min(GLOW_ALPHA_CAP);
            surface.fill_circle(
                star.x,
                star.y,
                star.display_radius * GLOW_RADIUS_SCALE,
                Hsla::new(star.hue, 0.90, 0.75, glow_alpha).to_rgba(),
            );
            surface.fill_circle(
                star.x,
                star.y,
                star.display_radius,
                Hsla::new(star.hue, 0.82, 0.88, star.alpha).to_rgba(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::testing::RecordingSurface;

    const FRAME: f32 = 1.0 / 60.0;

    fn seeded_population(seed: u64, viewport: &Viewport) -> (StarPopulation, fastrand::Rng) {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut population = StarPopulation::new();
        population.initialize(&mut rng, viewport, 1.0, 0.0);
        (population, rng)
    }

    #[test]
    fn reference_viewport_yields_base_count() {
        let viewport = Viewport::new(1280.0, 720.0, 1.0);
        assert_eq!(target_count(&viewport, 1.0), 220);
        assert_eq!(target_count(&viewport, 1.5), 330);

        let (population, _) = seeded_population(1, &viewport);
        assert!((190..=230).contains(&population.len()));
    }

    #[test]
    fn count_is_clamped_for_extreme_viewports() {
        for multiplier in [1.0, 1.5] {
            for (w, h) in [(0.0, 0.0), (10.0, 10.0), (320.0, 240.0), (7680.0, 4320.0), (20000.0, 20000.0)] {
                let count = target_count(&Viewport::new(w, h, 1.0), multiplier);
                assert!(
                    (MIN_STARS..=MAX_STARS).contains(&count),
                    "{w}x{h} at {multiplier} gave {count}"
                );
            }
        }
        assert_eq!(target_count(&Viewport::new(10.0, 10.0, 1.0), 1.5), MIN_STARS);
        assert_eq!(target_count(&Viewport::new(7680.0, 4320.0, 1.0), 1.0), MAX_STARS);
    }

    #[test]
    fn initialized_stars_use_documented_ranges() {
        let viewport = Viewport::new(800.0, 600.0, 1.0);
        let mut rng = fastrand::Rng::with_seed(7);
        let mut population = StarPopulation::new();
        population.initialize(&mut rng, &viewport, 1.0, 100.0);

        for star in population.stars() {
            assert!((0.0..=800.0).contains(&star.x) && (0.0..=600.0).contains(&star.y));
            assert!((0.5..1.6).contains(&star.radius));
            assert!((0.5..1.0).contains(&star.base_alpha));
            assert!((200.0..250.0).contains(&star.hue));
            assert!(star.drift_x.abs() <= 0.02 && star.drift_y.abs() <= 0.02);
            assert!((101.5..106.0).contains(&star.next_flash));
            assert_eq!(star.flash_progress(100.0), None);
        }
    }

    #[test]
    fn opacity_and_radius_stay_in_bounds() {
        let viewport = Viewport::new(640.0, 480.0, 1.0);
        let (mut population, mut rng) = seeded_population(42, &viewport);

        let mut now = 0.0f64;
        for _ in 0..1200 {
            now += FRAME as f64;
            population.update(&mut rng, FRAME, now, &viewport);
            for star in population.stars() {
                assert!((0.0..=1.0).contains(&star.alpha), "alpha {}", star.alpha);
                assert!(star.display_radius >= star.radius);
            }
        }
    }

    #[test]
    fn flash_windows_are_ordered_and_disjoint() {
        let viewport = Viewport::new(640.0, 480.0, 1.0);
        let (mut population, mut rng) = seeded_population(9, &viewport);

        let mut scheduled: Vec<f64> = population.stars().iter().map(|s| s.next_flash).collect();
        let mut window_end: Vec<f64> = population.stars().iter().map(|s| s.flash_until).collect();
        let mut flashes = 0;

        let mut now = 0.0f64;
        for _ in 0..3000 {
            now += FRAME as f64;
            population.update(&mut rng, FRAME, now, &viewport);

            for (i, star) in population.stars().iter().enumerate() {
                if star.flash_until != window_end[i] {
                    let start = star.flash_until - star.flash_duration;
                    assert!(start + 1e-9 >= scheduled[i], "flash began before it was due");
                    assert!(start + 1e-9 >= window_end[i], "flash windows overlap");
                    assert!(star.next_flash > star.flash_until);
                    flashes += 1;
                    window_end[i] = star.flash_until;
                    scheduled[i] = star.next_flash;
                }
            }
        }
        assert!(flashes > 0, "at least one flash should occur in 50 simulated seconds");
    }

    #[test]
    fn flash_pulse_vanishes_at_window_ends() {
        for amp in [0.6, 0.85, 1.1] {
            assert!(flash_pulse(0.0, amp).abs() < 1e-6);
            assert!(flash_pulse(1.0, amp).abs() < 1e-6);
            for step in 1..100 {
                let progress = step as f32 / 100.0;
                assert!(flash_pulse(progress, amp) > 0.0, "zero pulse at {progress}");
            }
            assert!((flash_pulse(0.5, amp) - amp).abs() < 1e-6);
        }
    }

    #[test]
    fn flash_contribution_is_zero_at_start_and_end() {
        let viewport = Viewport::new(100.0, 100.0, 1.0);
        let (mut population, mut rng) = seeded_population(3, &viewport);
        let due = population.stars()[0].next_flash;

        population.update(&mut rng, 0.0, due, &viewport);
        let star = population.stars()[0];
        let progress = star.flash_progress(due).expect("flash window should be open");
        assert!(progress < 1e-6);
        assert!(star.flash_boost(due).abs() < 1e-6);

        let mid = due + star.flash_duration * 0.5;
        assert!(star.flash_boost(mid) > 0.5);
        assert_eq!(star.flash_boost(star.flash_until), 0.0);
    }

    #[test]
    fn drift_wraps_to_opposite_edge() {
        let viewport = Viewport::new(100.0, 50.0, 1.0);
        let (mut population, mut rng) = seeded_population(5, &viewport);
        {
            let star = &mut population.stars[0];
            star.x = -1.99;
            star.y = 51.99;
            star.drift_x = -0.02;
            star.drift_y = 0.02;
        }
        population.update(&mut rng, FRAME, 0.0, &viewport);
        let star = population.stars()[0];
        assert_eq!(star.x, 102.0);
        assert_eq!(star.y, -2.0);
    }

    #[test]
    fn zero_dt_leaves_phase_and_position_untouched() {
        let viewport = Viewport::new(300.0, 300.0, 1.0);
        let (mut population, mut rng) = seeded_population(11, &viewport);
        let before: Vec<(f32, f32, f32)> = population.stars().iter().map(|s| (s.x, s.y, s.phase)).collect();

        population.update(&mut rng, 0.0, 0.5, &viewport);
        let after: Vec<(f32, f32, f32)> = population.stars().iter().map(|s| (s.x, s.y, s.phase)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn draw_paints_glow_beneath_core() {
        let viewport = Viewport::new(200.0, 200.0, 1.0);
        let (mut population, mut rng) = seeded_population(2, &viewport);
        population.update(&mut rng, FRAME, 0.1, &viewport);

        let mut surface = RecordingSurface::default();
        population.draw(&mut surface);
        let circles: Vec<_> = surface.circles().collect();
        assert_eq!(circles.len(), population.len() * 2);

        for (pair, star) in circles.chunks(2).zip(population.stars()) {
            let (glow_radius, glow) = pair[0];
            let (core_radius, core) = pair[1];
            assert!((glow_radius - core_radius * 2.7).abs() < 1e-4);
            assert!(glow.a <= 0.8);
            assert!((glow.a - (star.alpha * 0.35).min(0.8)).abs() < 1e-6);
            assert_eq!(core.a, star.alpha);
        }
    }
}
