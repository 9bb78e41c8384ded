use anyhow::Context;
use clap::Parser;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};
use std::path::{Path, PathBuf};

/// Twinkling starfield with flashing stars and shooting stars, drawn behind
/// whatever you are not doing in this terminal.
///
/// Keys: b = toggle boost, p = pause/resume, q / Esc / Ctrl+C = quit.
#[derive(Debug, Parser)]
#[command(name = "starfield", version, about, long_about = None)]
pub struct Config {
    /// Start boosted: denser stars and more frequent shooting stars.
    /// Accepts an optional payload (on/off, true/false, 1/0).
    #[arg(
        long,
        env = "STARFIELD_BOOST",
        num_args = 0..=1,
        default_missing_value = "on",
        value_name = "PAYLOAD"
    )]
    pub boost: Option<String>,

    /// Logical pixels along each edge of a half-block, so a terminal maps
    /// onto a window-sized canvas
    #[arg(
        long,
        env = "STARFIELD_CELL_SCALE",
        default_value_t = 8,
        value_parser = clap::value_parser!(u16).range(1..=32)
    )]
    pub cell_scale: u16,

    /// Supersampling factor for the backing store (clamped to 1..=2)
    #[arg(long, env = "STARFIELD_PIXEL_RATIO", default_value_t = 2.0)]
    pub pixel_ratio: f32,

    /// Target frames per second
    #[arg(
        long,
        env = "STARFIELD_FPS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u32).range(1..=240)
    )]
    pub fps: u32,

    /// Background color as hex (e.g. --bg-color 1a1b26)
    #[arg(long, env = "STARFIELD_BG_COLOR", default_value = "0b1020", value_parser = parse_hex_color)]
    pub bg_color: (u8, u8, u8),

    /// Log filter, e.g. "info" or "starfield=trace"
    #[arg(long, env = "STARFIELD_LOG", default_value = "info")]
    pub log_level: String,

    /// Directory for log files; logging is off unless set
    #[arg(long, env = "STARFIELD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

pub fn parse_hex_color(hex: &str) -> Result<(u8, u8, u8), String> {
    let hex = hex.trim_start_matches('#');
    let invalid = || format!("invalid hex color '{hex}', expected RRGGBB (e.g. 1a1b26)");
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }

    let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| invalid())?;
    let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| invalid())?;
    let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| invalid())?;

    Ok((r, g, b))
}

/// Starts file logging when a directory is configured. The terminal itself is
/// the render target, so nothing is duplicated to stdout or stderr.
pub fn setup_logging(level: &str, dir: Option<&Path>) -> anyhow::Result<Option<LoggerHandle>> {
    let Some(dir) = dir else {
        return Ok(None);
    };

    let handle = Logger::try_with_str(level)
        .with_context(|| format!("invalid log filter '{level}'"))?
        .log_to_file(FileSpec::default().directory(dir).basename("starfield"))
        .rotate(
            Criterion::Size(1024 * 1024), //1MB
            Naming::Timestamps,
            Cleanup::KeepLogFiles(5),
        )
        .start()
        .with_context(|| format!("starting logger in {}", dir.display()))?;

    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Config::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["starfield"]).unwrap();
        assert_eq!(config.boost, None);
        assert_eq!(config.cell_scale, 8);
        assert_eq!(config.pixel_ratio, 2.0);
        assert_eq!(config.fps, 60);
        assert_eq!(config.bg_color, (0x0b, 0x10, 0x20));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn bare_boost_flag_means_on() {
        let config = Config::try_parse_from(["starfield", "--boost"]).unwrap();
        assert_eq!(config.boost.as_deref(), Some("on"));

        let config = Config::try_parse_from(["starfield", "--boost=off"]).unwrap();
        assert_eq!(config.boost.as_deref(), Some("off"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::try_parse_from(["starfield", "--fps", "0"]).is_err());
        assert!(Config::try_parse_from(["starfield", "--cell-scale", "0"]).is_err());
        assert!(Config::try_parse_from(["starfield", "--bg-color", "12345"]).is_err());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("1a1b26"), Ok((0x1a, 0x1b, 0x26)));
        assert_eq!(parse_hex_color("#FFffFF"), Ok((255, 255, 255)));
        assert!(parse_hex_color("zz0000").is_err());
        assert!(parse_hex_color("ééé").is_err());
    }

    #[test]
    fn logging_is_off_without_a_directory() {
        assert!(setup_logging("info", None).unwrap().is_none());
    }
}
