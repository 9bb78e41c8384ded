use super::rand_range;
use super::viewport::Viewport;
use crate::canvas::{Hsla, LinearGradient, Rgba, Surface};
use std::collections::VecDeque;
use std::f32::consts::PI;

pub const TRAIL_CAPACITY: usize = 22;
// The gradient fades out at this trail index; older points are stroked transparent.
const TRAIL_LOOKAHEAD: usize = 14;
const TRAIL_WIDTH: f32 = 2.8;
pub const EXIT_MARGIN: f32 = 250.0;

pub const SPAWN_INTERVAL_MIN: f64 = 4.0;
pub const SPAWN_INTERVAL_MAX: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
    pub fade: f32,
}

#[derive(Debug, Clone)]
pub struct ShootingStar {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
    pub max_life: f32,
    pub hue: f32,
    /// Most recent point first.
    pub trail: VecDeque<TrailPoint>,
}

/// Linear fade from 1 at birth to exactly 0 at `max_life`.
pub fn fade_for(life: f32, max_life: f32) -> f32 {
    (1.0 - life / max_life).max(0.0)
}

impl ShootingStar {
    fn spawn(rng: &mut fastrand::Rng, viewport: &Viewport) -> Self {
        let angle = rand_range(rng, PI * 0.15, PI * 0.35);
        let speed = viewport.longest_side() * rand_range(rng, 0.45, 0.65);
        let x = rand_range(rng, -0.25 * viewport.width, 0.15 * viewport.width);
        let y = rand_range(rng, -0.2 * viewport.height, 0.35 * viewport.height);

        Self {
            x,
            y,
            vx: angle.cos() * speed,
            vy: angle.sin() * speed,
            life: 0.0,
            max_life: rand_range(rng, 1.1, 1.8),
            hue: rand_range(rng, 195.0, 220.0),
            trail: VecDeque::with_capacity(TRAIL_CAPACITY + 1),
        }
    }

    pub fn fade(&self) -> f32 {
        fade_for(self.life, self.max_life)
    }

    pub fn advance(&mut self, dt: f32) {
        self.life += dt;
        self.x += self.vx * dt;
        self.y += self.vy * dt;

        let fade = self.fade();
        self.trail.push_front(TrailPoint {
            x: self.x,
            y: self.y,
            fade,
        });
        self.trail.truncate(TRAIL_CAPACITY);
    }

    /// True once the star is more than the exit margin past an edge it is
    /// moving away from. Stars still approaching from off-screen are kept.
    pub fn has_left(&self, viewport: &Viewport) -> bool {
        let past_right = self.x > viewport.width + EXIT_MARGIN && self.vx >= 0.0;
        let past_left = self.x < -EXIT_MARGIN && self.vx <= 0.0;
        let past_bottom = self.y > viewport.height + EXIT_MARGIN && self.vy >= 0.0;
        let past_top = self.y < -EXIT_MARGIN && self.vy <= 0.0;
        past_right || past_left || past_bottom || past_top
    }

    pub fn is_finished(&self, viewport: &Viewport) -> bool {
        self.life > self.max_life || self.has_left(viewport)
    }

    fn draw<S: Surface + ?Sized>(&self, surface: &mut S, path: &mut Vec<(f32, f32)>) {
        let fade = self.fade();

        let tail_index = TRAIL_LOOKAHEAD.min(self.trail.len().saturating_sub(1));
        if let Some(tail) = self.trail.get(tail_index) {
            let gradient = LinearGradient::new(self.x, self.y, tail.x, tail.y)
                .with_stop(0.0, Hsla::new(self.hue, 0.95, 0.92, 0.85 * fade))
                .with_stop(0.6, Hsla::new(self.hue, 0.90, 0.70, 0.4 * fade))
                .with_stop(1.0, Rgba::TRANSPARENT_WHITE);

            path.clear();
            path.push((self.x, self.y));
            path.extend(self.trail.iter().skip(1).map(|p| (p.x, p.y)));
            surface.stroke_polyline(path, TRAIL_WIDTH, &gradient);
        }

        surface.fill_circle(
            self.x,
            self.y,
            2.6 + 1.4 * fade,
            Hsla::new(self.hue, 1.0, 0.95, 0.9 * fade + 0.1).to_rgba(),
        );
    }
}

/// Active shooting stars plus the schedule that emits them.
#[derive(Debug, Default)]
pub struct ShootingStars {
    active: Vec<ShootingStar>,
    /// `None` means the next check spawns immediately.
    next_spawn: Option<f64>,
    path: Vec<(f32, f32)>,
}

impl ShootingStars {
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            next_spawn: None,
            path: Vec::with_capacity(TRAIL_CAPACITY),
        }
    }

    pub fn active(&self) -> &[ShootingStar] {
        &self.active
    }

    #[cfg(test)]
    pub fn next_spawn(&self) -> Option<f64> {
        self.next_spawn
    }

    /// Drops every active star and the pending schedule.
    pub fn reset(&mut self) {
        self.active.clear();
        self.next_spawn = None;
    }

    /// Spawns one star if the schedule is due and returns whether it did.
    pub fn maybe_spawn(&mut self, rng: &mut fastrand::Rng, now: f64, viewport: &Viewport, interval_scale: f64) -> bool {
        if self.next_spawn.is_some_and(|due| now < due) {
            return false;
        }

        let star = ShootingStar::spawn(rng, viewport);
        log::trace!(
            "shooting star at ({:.0}, {:.0}) v=({:.0}, {:.0}) life {:.2}s",
            star.x,
            star.y,
            star.vx,
            star.vy,
            star.max_life
        );
        self.active.push(star);

        let min = SPAWN_INTERVAL_MIN * interval_scale;
        let max = SPAWN_INTERVAL_MAX * interval_scale;
        self.next_spawn = Some(now + min + rng.f64() * (max - min));
        true
    }

    pub fn update(&mut self, dt: f32) {
        for star in &mut self.active {
            star.advance(dt);
        }
    }

    pub fn draw<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        for star in &self.active {
            star.draw(surface, &mut self.path);
        }
    }

    /// Removes finished stars and returns how many were dropped.
    pub fn prune(&mut self, viewport: &Viewport) -> usize {
        let before = self.active.len();
        self.active.retain(|star| !star.is_finished(viewport));
        before - self.active.len()
    }

    #[cfg(test)]
    pub(crate) fn push(&mut self, star: ShootingStar) {
        self.active.push(star);
    }
}
