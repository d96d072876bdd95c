#![forbid(unsafe_code)]

//! Command-line options.
//!
//! Every option can also be set through a `TTYIMG_*` environment variable;
//! an explicit flag wins. `-h` is height, so help is `--help` only.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{ArgAction, Parser, ValueEnum};
use ttyimg_core::{Axis, Dimension, Scale};
use ttyimg_image::{ImageProtocol, ResizeMode};

#[derive(Debug, Parser)]
#[command(
    name = "ttyimg",
    version,
    about = "Render an image in the terminal, sized to the real screen.",
    disable_help_flag = true
)]
pub struct Opts {
    /// Resize width: <n> (pixels), <n>px, <n>c (cells), or <n>%
    #[arg(
        short = 'w',
        long,
        default_value = "80%",
        env = "TTYIMG_WIDTH",
        allow_hyphen_values = true
    )]
    pub width: String,

    /// Resize height: <n> (pixels), <n>px, <n>c (cells), or <n>%
    #[arg(
        short = 'h',
        long,
        default_value = "60%",
        env = "TTYIMG_HEIGHT",
        allow_hyphen_values = true
    )]
    pub height: String,

    /// How the image is fitted to the requested size
    #[arg(short = 'm', long, value_enum, ignore_case = true, default_value_t = ModeArg::Fit, env = "TTYIMG_MODE")]
    pub mode: ModeArg,

    /// Center the image horizontally (--center=false to disable)
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true",
        env = "TTYIMG_CENTER"
    )]
    pub center: bool,

    /// Graphics protocol to use
    #[arg(short = 'p', long, value_enum, ignore_case = true, default_value_t = ProtocolArg::Auto, env = "TTYIMG_PROTOCOL")]
    pub protocol: ProtocolArg,

    /// Protocol to use when none is detected
    #[arg(short = 'f', long, value_enum, ignore_case = true, default_value_t = FallbackArg::Sixel, env = "TTYIMG_FALLBACK")]
    pub fallback: FallbackArg,

    /// Screen size in pixels when it cannot be probed: <w>x<h>, or
    /// <w>x<h>xForce to skip probing
    #[arg(long, value_name = "WxH", default_value = "1920x1080", env = "TTYIMG_SPX")]
    pub spx: String,

    /// Screen size in cells when it cannot be probed: <w>x<h>, or
    /// <w>x<h>xForce to skip probing
    #[arg(long, value_name = "WxH", default_value = "120x30", env = "TTYIMG_SC")]
    pub sc: String,

    /// Multiply the screen size: <float>x<float>, for centering in part of
    /// the screen
    #[arg(long, value_name = "HxV", default_value = "1x1", env = "TTYIMG_SCALE")]
    pub scale: String,

    /// Cache converted documents (--cache=false to disable)
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true",
        env = "TTYIMG_CACHE"
    )]
    pub cache: bool,

    /// Terminal query timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 50, env = "TTYIMG_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Append diagnostics to this file (level from TTYIMG_LOG, default debug)
    #[arg(long, value_name = "PATH", env = "TTYIMG_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Check that the installed version is VERSION and report detected
    /// graphics support
    #[arg(long, value_name = "VERSION")]
    pub validate: Option<String>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Image or document to show
    #[arg(required_unless_present = "validate")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Fit,
    #[value(alias = "strech")]
    Stretch,
    Crop,
}

impl From<ModeArg> for ResizeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fit => Self::Fit,
            ModeArg::Stretch => Self::Stretch,
            ModeArg::Crop => Self::Crop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    Auto,
    Kitty,
    #[value(alias = "iterm2")]
    Iterm,
    Sixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FallbackArg {
    Kitty,
    #[value(alias = "iterm2")]
    Iterm,
    Sixel,
}

impl From<FallbackArg> for ImageProtocol {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::Kitty => Self::Kitty,
            FallbackArg::Iterm => Self::Iterm2,
            FallbackArg::Sixel => Self::Sixel,
        }
    }
}

/// Validated settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub width: Dimension,
    pub height: Dimension,
    pub mode: ResizeMode,
    pub center: bool,
    /// `None` means detect.
    pub protocol: Option<ImageProtocol>,
    pub fallback: ImageProtocol,
    pub pixel_fallback: String,
    pub cell_fallback: String,
    pub scale: Scale,
    pub cache: bool,
    pub timeout: Duration,
    pub path: Option<PathBuf>,
}

impl Config {
    /// Check user input before any terminal I/O happens.
    ///
    /// # Errors
    ///
    /// A malformed width, height, or scale.
    pub fn from_opts(opts: &Opts) -> anyhow::Result<Self> {
        let width = Dimension::parse(&opts.width, Axis::Horizontal).context("--width")?;
        let height = Dimension::parse(&opts.height, Axis::Vertical).context("--height")?;
        let scale: Scale = opts.scale.parse().context("--scale")?;

        let protocol = match opts.protocol {
            ProtocolArg::Auto => None,
            ProtocolArg::Kitty => Some(ImageProtocol::Kitty),
            ProtocolArg::Iterm => Some(ImageProtocol::Iterm2),
            ProtocolArg::Sixel => Some(ImageProtocol::Sixel),
        };

        Ok(Self {
            width,
            height,
            mode: opts.mode.into(),
            center: opts.center,
            protocol,
            fallback: opts.fallback.into(),
            pixel_fallback: opts.spx.clone(),
            cell_fallback: opts.sc.clone(),
            scale,
            cache: opts.cache,
            timeout: Duration::from_millis(opts.timeout_ms),
            path: opts.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttyimg_core::{DimensionError, Unit};

    fn parse(args: &[&str]) -> Opts {
        let argv = std::iter::once("ttyimg").chain(args.iter().copied());
        Opts::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let opts = parse(&["cat.png"]);
        assert_eq!(opts.width, "80%");
        assert_eq!(opts.height, "60%");
        assert_eq!(opts.mode, ModeArg::Fit);
        assert!(opts.center);
        assert_eq!(opts.protocol, ProtocolArg::Auto);
        assert_eq!(opts.fallback, FallbackArg::Sixel);
        assert_eq!(opts.spx, "1920x1080");
        assert_eq!(opts.sc, "120x30");
        assert_eq!(opts.scale, "1x1");
        assert!(opts.cache);
        assert_eq!(opts.timeout_ms, 50);
        assert_eq!(opts.path, Some(PathBuf::from("cat.png")));
    }

    #[test]
    fn short_h_is_height() {
        let opts = parse(&["-w", "40c", "-h", "-5c", "cat.png"]);
        assert_eq!(opts.width, "40c");
        assert_eq!(opts.height, "-5c");
    }

    #[test]
    fn bool_flags_take_explicit_values() {
        let opts = parse(&["--center=false", "--cache=false", "cat.png"]);
        assert!(!opts.center);
        assert!(!opts.cache);

        let opts = parse(&["--center", "cat.png"]);
        assert!(opts.center);
        assert_eq!(opts.path, Some(PathBuf::from("cat.png")));
    }

    #[test]
    fn enums_ignore_case_and_accept_aliases() {
        let opts = parse(&["-m", "Strech", "-p", "KITTY", "-f", "iterm", "x.png"]);
        assert_eq!(opts.mode, ModeArg::Stretch);
        assert_eq!(opts.protocol, ProtocolArg::Kitty);
        assert_eq!(opts.fallback, FallbackArg::Iterm);
    }

    #[test]
    fn path_required_unless_validating() {
        assert!(Opts::try_parse_from(["ttyimg"]).is_err());
        let opts = Opts::try_parse_from(["ttyimg", "--validate", "1.0.5"]).unwrap();
        assert_eq!(opts.validate.as_deref(), Some("1.0.5"));
        assert!(opts.path.is_none());
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        assert!(Opts::try_parse_from(["ttyimg", "-p", "ascii", "x.png"]).is_err());
    }

    #[test]
    fn config_parses_sizes() {
        let config = Config::from_opts(&parse(&["-w", "75%", "-h", "12c", "x.png"])).unwrap();
        assert_eq!(config.width, Dimension::new(75, Unit::Percent, Axis::Horizontal));
        assert_eq!(config.height, Dimension::new(12, Unit::Cell, Axis::Vertical));
        assert_eq!(config.protocol, None);
        assert_eq!(config.fallback, ImageProtocol::Sixel);
        assert_eq!(config.mode, ResizeMode::Fit);
        assert_eq!(config.timeout, Duration::from_millis(50));
    }

    #[test]
    fn config_rejects_bad_dimension() {
        let err = Config::from_opts(&parse(&["-w", "12xyz", "x.png"])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DimensionError>(),
            Some(&DimensionError::InvalidFormat("12xyz".into()))
        );
        assert!(format!("{err:#}").starts_with("--width"));
    }

    #[test]
    fn config_rejects_bad_scale() {
        assert!(Config::from_opts(&parse(&["--scale", "big", "x.png"])).is_err());
    }

    #[test]
    fn forced_protocol_maps_through() {
        let config = Config::from_opts(&parse(&["-p", "iterm", "x.png"])).unwrap();
        assert_eq!(config.protocol, Some(ImageProtocol::Iterm2));
    }
}
