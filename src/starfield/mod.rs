//! Twinkling background starfield with flashing stars and shooting stars.

pub mod lifecycle;
pub mod shooting;
pub mod stars;
pub mod viewport;

use crate::canvas::{RadialGradient, Rgba, Surface};
#[cfg(test)]
use shooting::ShootingStar;
use shooting::ShootingStars;
use stars::{Star, StarPopulation};
use viewport::Viewport;

pub use lifecycle::{Controller, FrameHandle, FrameScheduler};

/// Longest step a single frame may simulate, so a suspended host does not
/// teleport everything on resume.
pub const MAX_FRAME_DT: f64 = 0.05;

const VIGNETTE_INNER: f32 = 0.1;
const VIGNETTE_OUTER: f32 = 0.75;
const VIGNETTE_CENTER: Rgba = Rgba::new(11.0, 16.0, 32.0, 0.0);
const VIGNETTE_EDGE: Rgba = Rgba::new(11.0, 16.0, 32.0, 0.35);

pub(crate) fn rand_range(rng: &mut fastrand::Rng, min: f32, max: f32) -> f32 {
    min + rng.f32() * (max - min)
}

/// Density and spawn cadence, switched by the boost signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boost {
    pub density_multiplier: f32,
    pub spawn_interval_scale: f64,
}

impl Boost {
    pub const BASELINE: Boost = Boost {
        density_multiplier: 1.0,
        spawn_interval_scale: 1.0,
    };

    pub const BOOSTED: Boost = Boost {
        density_multiplier: 1.5,
        spawn_interval_scale: 0.65,
    };

    pub fn from_signal(enabled: bool) -> Self {
        if enabled { Self::BOOSTED } else { Self::BASELINE }
    }

    pub fn is_boosted(&self) -> bool {
        *self == Self::BOOSTED
    }
}

impl Default for Boost {
    fn default() -> Self {
        Self::BASELINE
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub dt: f64,
    pub stars: usize,
    pub shooting_stars: usize,
    pub spawned: bool,
    pub expired: usize,
}

/// All simulation state for one canvas.
pub struct Starfield {
    viewport: Viewport,
    stars: StarPopulation,
    shooting: ShootingStars,
    boost: Boost,
    last_time: Option<f64>,
    rng: fastrand::Rng,
    generation: u64,
}

impl Starfield {
    pub fn new(rng: fastrand::Rng) -> Self {
        Self {
            viewport: Viewport::default(),
            stars: StarPopulation::new(),
            shooting: ShootingStars::new(),
            boost: Boost::BASELINE,
            last_time: None,
            rng,
            generation: 0,
        }
    }

    #[cfg(test)]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn stars(&self) -> &[Star] {
        self.stars.stars()
    }

    #[cfg(test)]
    pub fn shooting_stars(&self) -> &[ShootingStar] {
        self.shooting.active()
    }

    #[cfg(test)]
    pub fn next_spawn(&self) -> Option<f64> {
        self.shooting.next_spawn()
    }

    pub fn boost(&self) -> Boost {
        self.boost
    }

    #[cfg(test)]
    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }

    /// Number of times the star population has been rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Applies a new viewport to the surface and rebuilds everything that
    /// depends on its coordinates.
    pub fn resize<S: Surface + ?Sized>(&mut self, surface: &mut S, width: f32, height: f32, device_ratio: f32, now: f64) {
        self.viewport = Viewport::new(width, height, device_ratio);
        self.viewport.apply_to(surface);
        log::debug!(
            "viewport {}x{} at {:.2}x (backing {}x{})",
            self.viewport.width,
            self.viewport.height,
            self.viewport.ratio,
            (self.viewport.width * self.viewport.ratio).floor(),
            (self.viewport.height * self.viewport.ratio).floor()
        );
        self.reinitialize(now);
        self.last_time = None;
    }

    /// Switches density and spawn cadence, then rebuilds so the change shows
    /// at once.
    pub fn set_boost(&mut self, enabled: bool, now: f64) {
        self.boost = Boost::from_signal(enabled);
        log::debug!(
            "boost {} (density x{}, spawn interval x{})",
            if enabled { "on" } else { "off" },
            self.boost.density_multiplier,
            self.boost.spawn_interval_scale
        );
        self.reinitialize(now);
    }

    /// Forgets the previous frame time so the next frame only seeds it.
    pub fn reset_clock(&mut self) {
        self.last_time = None;
    }

    fn reinitialize(&mut self, now: f64) {
        self.stars
            .initialize(&mut self.rng, &self.viewport, self.boost.density_multiplier, now);
        self.shooting.reset();
        self.generation += 1;
        log::debug!("star population rebuilt with {} stars", self.stars.len());
    }

    fn advance_clock(&mut self, now: f64) -> f64 {
        let dt = match self.last_time {
            Some(last) => (now - last).clamp(0.0, MAX_FRAME_DT),
            None => 0.0,
        };
        self.last_time = Some(now);
        dt
    }

    fn paint_vignette<S: Surface + ?Sized>(&self, surface: &mut S) {
        let (cx, cy) = self.viewport.center();
        let gradient = RadialGradient::new(
            cx,
            cy,
            self.viewport.shortest_side() * VIGNETTE_INNER,
            self.viewport.longest_side() * VIGNETTE_OUTER,
        )
        .with_stop(0.0, VIGNETTE_CENTER)
        .with_stop(1.0, VIGNETTE_EDGE);
        surface.fill_radial_gradient(&gradient);
    }

    /// Advances the simulation to `now` (seconds) and paints one frame.
    pub fn frame<S: Surface + ?Sized>(&mut self, surface: &mut S, now: f64) -> FrameStats {
        let dt = self.advance_clock(now);

        let spawned = self.shooting.maybe_spawn(
            &mut self.rng,
            now,
            &self.viewport,
            self.boost.spawn_interval_scale,
        );

        surface.clear();
        self.paint_vignette(surface);

        self.stars.update(&mut self.rng, dt as f32, now, &self.viewport);
        self.stars.draw(surface);

        self.shooting.update(dt as f32);
        self.shooting.draw(surface);
        let expired = self.shooting.prune(&self.viewport);

        FrameStats {
            dt,
            stars: self.stars.len(),
            shooting_stars: self.shooting.active().len(),
            spawned,
            expired,
        }
    }
}
