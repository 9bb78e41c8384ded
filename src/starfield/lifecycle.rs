use super::{FrameStats, Starfield};
use crate::canvas::Surface;

/// Identifies one outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// The host's display-refresh scheduler.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Drives a [`Starfield`] from host events: frames, visibility, resize and
/// boost. Without a surface every entry point is a no-op.
pub struct Controller<S: Surface> {
    surface: Option<S>,
    starfield: Starfield,
    state: LoopState,
    pending: Option<FrameHandle>,
}

impl<S: Surface> Controller<S> {
    pub fn attach(surface: Option<S>, starfield: Starfield) -> Self {
        if surface.is_none() {
            log::info!("no drawing surface; starfield disabled");
        }
        Self {
            surface,
            starfield,
            state: LoopState::Stopped,
            pending: None,
        }
    }

    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn starfield(&self) -> &Starfield {
        &self.starfield
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn start<H: FrameScheduler + ?Sized>(&mut self, scheduler: &mut H) {
        if self.surface.is_none() {
            return;
        }
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        self.starfield.reset_clock();
        self.pending = Some(scheduler.request_frame());
        if self.state != LoopState::Running {
            log::info!("animation running");
        }
        self.state = LoopState::Running;
    }

    /// Withholds further frames. Particle state is left as is.
    pub fn stop<H: FrameScheduler + ?Sized>(&mut self, scheduler: &mut H) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        if self.state != LoopState::Stopped {
            log::info!("animation stopped");
        }
        self.state = LoopState::Stopped;
    }

    /// Runs the frame for `handle` and requests the next one while running.
    /// Handles that are not the pending request are ignored.
    pub fn tick<H: FrameScheduler + ?Sized>(&mut self, handle: FrameHandle, now: f64, scheduler: &mut H) -> Option<FrameStats> {
        if self.pending != Some(handle) {
            log::trace!("ignoring stale frame {:?}", handle);
            return None;
        }
        self.pending = None;

        let surface = self.surface.as_mut()?;
        let stats = self.starfield.frame(surface, now);
        log::trace!(
            "frame dt={:.4} stars={} shooting={}",
            stats.dt,
            stats.stars,
            stats.shooting_stars
        );

        if self.state == LoopState::Running {
            self.pending = Some(scheduler.request_frame());
        }
        Some(stats)
    }

    pub fn on_visibility<H: FrameScheduler + ?Sized>(&mut self, hidden: bool, scheduler: &mut H) {
        if hidden {
            self.stop(scheduler);
        } else {
            self.start(scheduler);
        }
    }

    pub fn on_resize(&mut self, width: f32, height: f32, device_ratio: f32, now: f64) {
        if let Some(surface) = self.surface.as_mut() {
            self.starfield.resize(surface, width, height, device_ratio, now);
        }
    }

    /// A missing payload counts as "off".
    pub fn on_boost(&mut self, detail: Option<bool>, now: f64) {
        if self.surface.is_none() {
            return;
        }
        self.starfield.set_boost(detail.unwrap_or(false), now);
    }

    /// Stops the loop and hands the surface back; the controller is inert
    /// afterwards.
    pub fn dispose<H: FrameScheduler + ?Sized>(&mut self, scheduler: &mut H) -> Option<S> {
        self.stop(scheduler);
        self.surface.take()
    }
}

/// Reads a textual boost payload. Anything unrecognized is "off".
pub fn boost_from_payload(payload: Option<&str>) -> bool {
    matches!(
        payload.map(|p| p.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
