use crate::canvas::Raster;
use crate::starfield::{FrameHandle, FrameScheduler};
use crossterm::{
    cursor::Show,
    event::DisableFocusChange,
    execute,
    terminal::{self, LeaveAlternateScreen},
};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Writes a raster to the terminal as `▄` cells: the cell background is the
/// upper pixel and the foreground the lower one.
pub struct HalfBlockPresenter {
    bg: (f32, f32, f32),
    output_buf: Vec<u8>,
}

impl HalfBlockPresenter {
    pub fn new(bg: (u8, u8, u8)) -> Self {
        Self {
            bg: (bg.0 as f32, bg.1 as f32, bg.2 as f32),
            output_buf: Vec::new(),
        }
    }

    /// Box-filters the backing pixels that fall inside terminal pixel
    /// `(px, py)` of a `grid_w x grid_h` grid.
    fn sample(&self, raster: &Raster, px: usize, py: usize, grid_w: usize, grid_h: usize) -> (u8, u8, u8) {
        let (bw, bh) = raster.backing_size();
        if bw == 0 || bh == 0 {
            return to_rgb8(self.bg);
        }

        let x0 = (px * bw / grid_w).min(bw - 1);
        let x1 = ((px + 1) * bw / grid_w).clamp(x0 + 1, bw);
        let y0 = (py * bh / grid_h).min(bh - 1);
        let y1 = ((py + 1) * bh / grid_h).clamp(y0 + 1, bh);

        let mut sum = (0.0f32, 0.0f32, 0.0f32);
        for y in y0..y1 {
            for x in x0..x1 {
                let (r, g, b) = raster.composite_over(x, y, self.bg);
                sum.0 += r;
                sum.1 += g;
                sum.2 += b;
            }
        }
        let n = ((x1 - x0) * (y1 - y0)) as f32;
        to_rgb8((sum.0 / n, sum.1 / n, sum.2 / n))
    }

    /// Builds the escape sequence for a full frame of `cols x rows` cells.
    pub fn render(&mut self, raster: &Raster, cols: usize, rows: usize) -> io::Result<&[u8]> {
        self.output_buf.clear();
        self.output_buf.extend_from_slice(b"\x1b[H");

        let grid_w = cols.max(1);
        let grid_h = rows.max(1) * 2;

        let mut prev_top_color: Option<(u8, u8, u8)> = None;
        let mut prev_bot_color: Option<(u8, u8, u8)> = None;

        for row in 0..rows {
            for x in 0..cols {
                let top_color = self.sample(raster, x, row * 2, grid_w, grid_h);
                let bot_color = self.sample(raster, x, row * 2 + 1, grid_w, grid_h);

                if prev_top_color != Some(top_color) {
                    write!(
                        self.output_buf,
                        "\x1b[48;2;{};{};{}m",
                        top_color.0, top_color.1, top_color.2
                    )?;
                    prev_top_color = Some(top_color);
                }
                if prev_bot_color != Some(bot_color) {
                    write!(
                        self.output_buf,
                        "\x1b[38;2;{};{};{}m",
                        bot_color.0, bot_color.1, bot_color.2
                    )?;
                    prev_bot_color = Some(bot_color);
                }

                self.output_buf.extend_from_slice("▄".as_bytes());
            }
            self.output_buf.extend_from_slice(b"\x1b[0m");
            prev_top_color = None;
            prev_bot_color = None;
            if row + 1 < rows {
                self.output_buf.extend_from_slice(b"\r\n");
            }
        }

        Ok(&self.output_buf)
    }

    pub fn present<W: Write>(&mut self, raster: &Raster, cols: usize, rows: usize, out: &mut W) -> io::Result<()> {
        let frame = self.render(raster, cols, rows)?;
        out.write_all(frame)?;
        out.flush()
    }
}

fn to_rgb8(color: (f32, f32, f32)) -> (u8, u8, u8) {
    (
        color.0.round().clamp(0.0, 255.0) as u8,
        color.1.round().clamp(0.0, 255.0) as u8,
        color.2.round().clamp(0.0, 255.0) as u8,
    )
}

/// Frame scheduler paced by a fixed refresh interval. The host polls it for
/// the time until the pending frame is due and fires the frame once it is.
pub struct TerminalScheduler {
    frame_interval: Duration,
    next_id: u64,
    pending: Option<(FrameHandle, Instant)>,
    last_deadline: Option<Instant>,
}

impl TerminalScheduler {
    pub fn new(fps: u32) -> Self {
        Self {
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            next_id: 0,
            pending: None,
            last_deadline: None,
        }
    }

    /// Deadlines follow the previous one by one interval so pacing does not
    /// drift with frame cost, but never lie in the past.
    pub fn request_frame_at(&mut self, now: Instant) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        let deadline = match self.last_deadline {
            Some(last) if last + self.frame_interval > now => last + self.frame_interval,
            _ => now,
        };
        self.pending = Some((handle, deadline));
        handle
    }

    /// Time left before the pending frame, `None` while nothing is scheduled.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
    }

    /// Takes the pending frame if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<FrameHandle> {
        match self.pending {
            Some((handle, deadline)) if deadline <= now => {
                self.pending = None;
                self.last_deadline = Some(deadline);
                Some(handle)
            }
            _ => None,
        }
    }
}

impl FrameScheduler for TerminalScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.request_frame_at(Instant::now())
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending.is_some_and(|(pending, _)| pending == handle) {
            self.pending = None;
        }
    }
}

/// Leaves raw mode and the alternate screen, ignoring failures.
pub fn restore_terminal_best_effort() {
    let _ = terminal::disable_raw_mode();
    let _ = execute!(io::stdout(), DisableFocusChange, Show, LeaveAlternateScreen);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Rgba, Surface};

    #[test]
    fn empty_raster_renders_background() {
        let raster = Raster::new();
        let mut presenter = HalfBlockPresenter::new((11, 16, 32));
        let frame = presenter.render(&raster, 2, 1).unwrap().to_vec();
        let text = String::from_utf8(frame).unwrap();
        assert!(text.starts_with("\x1b[H\x1b[48;2;11;16;32m\x1b[38;2;11;16;32m"));
        assert_eq!(text.matches('▄').count(), 2);
    }

    #[test]
    fn rows_are_separated_and_reset() {
        let mut raster = Raster::new();
        raster.set_size(4.0, 6.0, 2.0);
        let mut presenter = HalfBlockPresenter::new((0, 0, 0));
        let text = String::from_utf8(presenter.render(&raster, 4, 3).unwrap().to_vec()).unwrap();
        assert_eq!(text.matches('▄').count(), 12);
        assert_eq!(text.matches("\r\n").count(), 2);
        assert_eq!(text.matches("\x1b[0m").count(), 3);
    }

    #[test]
    fn supersampled_pixels_are_averaged() {
        let mut raster = Raster::new();
        // 2x2 backing pixels per terminal pixel
        raster.set_size(1.0, 2.0, 2.0);
        raster.fill_circle(0.25, 0.25, 0.05, Rgba::new(255.0, 255.0, 255.0, 1.0));
        let presenter = HalfBlockPresenter::new((0, 0, 0));

        let top = presenter.sample(&raster, 0, 0, 1, 2);
        let bottom = presenter.sample(&raster, 0, 1, 1, 2);
        assert!(top.0 > 0 && top.0 < 255, "top {top:?}");
        assert_eq!(bottom, (0, 0, 0));
    }

    #[test]
    fn scheduler_paces_and_cancels() {
        let mut scheduler = TerminalScheduler::new(50);
        let start = Instant::now();

        let first = scheduler.request_frame_at(start);
        assert_eq!(scheduler.time_until_due(start), Some(Duration::ZERO));
        assert_eq!(scheduler.take_due(start), Some(first));
        assert_eq!(scheduler.take_due(start), None);

        let second = scheduler.request_frame_at(start);
        assert_ne!(first, second);
        assert_eq!(scheduler.time_until_due(start), Some(Duration::from_millis(20)));
        assert_eq!(scheduler.take_due(start + Duration::from_millis(10)), None);

        scheduler.cancel_frame(second);
        assert_eq!(scheduler.time_until_due(start), None);
        assert_eq!(scheduler.take_due(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn late_requests_are_due_immediately() {
        let mut scheduler = TerminalScheduler::new(60);
        let start = Instant::now();
        let handle = scheduler.request_frame_at(start);
        scheduler.take_due(start);

        let late = start + Duration::from_secs(2);
        let next = scheduler.request_frame_at(late);
        assert_ne!(handle, next);
        assert_eq!(scheduler.take_due(late), Some(next));
    }
}
