use anyhow::Context;
use clap::Parser;
use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, BufWriter, Stdout, Write, stdout};
use std::time::{Duration, Instant};

mod canvas;
mod config;
mod screen;
mod starfield;

use canvas::Raster;
use config::Config;
use screen::{HalfBlockPresenter, TerminalScheduler};
use starfield::lifecycle::boost_from_payload;
use starfield::{Controller, Starfield};

// Upper bound on an idle poll while the loop is stopped
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Logical canvas for a terminal: each half-block is `cell_scale` logical
/// pixels square.
fn logical_size(cols: u16, rows: u16, cell_scale: f32) -> (f32, f32) {
    (cols as f32 * cell_scale, rows as f32 * 2.0 * cell_scale)
}

struct Host {
    controller: Controller<Raster>,
    scheduler: TerminalScheduler,
    presenter: HalfBlockPresenter,
    pixel_ratio: f32,
    cell_scale: f32,
    grid: (u16, u16),
    pending_resize: Option<(u16, u16)>,
    boosted: bool,
    paused: bool,
    focused: bool,
    clock: Instant,
}

enum Flow {
    Continue,
    Quit,
}

impl Host {
    fn new(config: &Config, grid: (u16, u16)) -> Self {
        let cell_scale = config.cell_scale as f32;
        // The raster keeps `pixel_ratio` backing pixels per half-block edge
        // whatever the logical scale.
        let raster = Raster::with_resolution(1.0 / cell_scale);
        let controller = Controller::attach(Some(raster), Starfield::new(fastrand::Rng::new()));
        Self {
            controller,
            scheduler: TerminalScheduler::new(config.fps),
            presenter: HalfBlockPresenter::new(config.bg_color),
            pixel_ratio: config.pixel_ratio,
            cell_scale,
            grid,
            pending_resize: None,
            boosted: boost_from_payload(config.boost.as_deref()),
            paused: false,
            focused: true,
            clock: Instant::now(),
        }
    }

    /// Seconds on the host's monotonic clock.
    fn now(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    /// The loop only runs while the terminal has focus and is not paused.
    fn hidden(&self) -> bool {
        self.paused || !self.focused
    }

    fn begin(&mut self) {
        let (width, height) = logical_size(self.grid.0, self.grid.1, self.cell_scale);
        let now = self.now();
        self.controller.on_resize(width, height, self.pixel_ratio, now);
        if self.boosted {
            self.controller.on_boost(Some(true), now);
        }
        self.controller.start(&mut self.scheduler);
        log::info!(
            "starfield started on {}x{} cells, {} stars",
            self.grid.0,
            self.grid.1,
            self.controller.starfield().stars().len()
        );
    }

    fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Flow::Quit,
                KeyCode::Char('b') => {
                    self.boosted = !self.boosted;
                    let now = self.now();
                    self.controller.on_boost(Some(self.boosted), now);
                    let starfield = self.controller.starfield();
                    log::info!(
                        "boost {}: {} stars (population #{})",
                        if starfield.boost().is_boosted() { "on" } else { "off" },
                        starfield.stars().len(),
                        starfield.generation()
                    );
                }
                KeyCode::Char('p') => {
                    self.paused = !self.paused;
                    self.controller.on_visibility(self.hidden(), &mut self.scheduler);
                    log::debug!("loop {:?}", self.controller.state());
                }
                _ => {}
            },
            // Bursts of resize events collapse into one resize before the next frame
            Event::Resize(cols, rows) => self.pending_resize = Some((cols, rows)),
            Event::FocusLost => {
                self.focused = false;
                self.controller.on_visibility(true, &mut self.scheduler);
            }
            Event::FocusGained => {
                self.focused = true;
                self.controller.on_visibility(self.hidden(), &mut self.scheduler);
            }
            _ => {}
        }
        Flow::Continue
    }

    fn apply_pending_resize(&mut self, out: &mut BufWriter<Stdout>) -> anyhow::Result<()> {
        if let Some(grid) = self.pending_resize.take() {
            self.grid = grid;
            let (width, height) = logical_size(grid.0, grid.1, self.cell_scale);
            let now = self.now();
            self.controller.on_resize(width, height, self.pixel_ratio, now);
            execute!(out, Clear(ClearType::All)).context("clearing terminal after resize")?;
        }
        Ok(())
    }

    fn run(&mut self, out: &mut BufWriter<Stdout>) -> anyhow::Result<()> {
        self.begin();

        loop {
            let timeout = self
                .scheduler
                .time_until_due(Instant::now())
                .unwrap_or(IDLE_POLL);
            if event::poll(timeout).context("polling terminal events")? {
                let event = event::read().context("reading terminal event")?;
                if let Flow::Quit = self.handle_event(event) {
                    break;
                }
            }

            let Some(handle) = self.scheduler.take_due(Instant::now()) else {
                continue;
            };
            self.apply_pending_resize(out)?;
            let now = self.now();
            if self.controller.tick(handle, now, &mut self.scheduler).is_some() {
                if let Some(raster) = self.controller.surface() {
                    self.presenter
                        .present(raster, self.grid.0 as usize, self.grid.1 as usize, out)
                        .context("writing frame")?;
                }
            }
        }

        self.controller.dispose(&mut self.scheduler);
        log::info!("starfield stopped");
        Ok(())
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let mut out = BufWriter::with_capacity(1024 * 64, stdout());

    terminal::enable_raw_mode().context("enabling raw mode")?;
    execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All), EnableFocusChange)
        .context("entering alternate screen")?;

    let grid = terminal::size().context("querying terminal size")?;
    let result = Host::new(config, grid).run(&mut out);

    let restored = leave_screen(&mut out, terminal::disable_raw_mode);
    if restored.is_err() {
        screen::restore_terminal_best_effort();
    }
    result.and(restored)
}

/// Leaves the alternate screen. Raw mode is released even when the escape
/// sequences cannot be written.
fn leave_screen<W: Write>(out: &mut W, disable_raw_mode: impl FnOnce() -> io::Result<()>) -> anyhow::Result<()> {
    let written = execute!(out, DisableFocusChange, Show, LeaveAlternateScreen).and_then(|()| out.flush());
    let released = disable_raw_mode();
    written.context("leaving alternate screen")?;
    released.context("disabling raw mode")
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // The handle must outlive the animation or buffered lines are lost.
    let _logger = match config::setup_logging(&config.log_level, config.log_dir.as_deref()) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("starfield: logging disabled: {err:#}");
            None
        }
    };

    std::panic::set_hook(Box::new(|info| {
        screen::restore_terminal_best_effort();
        eprintln!("{info}");
    }));

    run(&config)
}
