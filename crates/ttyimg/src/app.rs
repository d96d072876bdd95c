#![forbid(unsafe_code)]

//! One invocation: resolve geometry, size the image, pick a protocol, draw.

use std::io::Write;
use std::path::Path;

use anyhow::Context as _;
use image::GenericImageView;
use ttyimg_core::{EscapeQuery, GeometryResolver, TerminalPort, center};
use ttyimg_image::{
    DetectionHints, DocumentCache, ImageProtocol, choose_protocol, detect_capabilities, resize,
    write_image,
};

use crate::cli::Config;

/// Buffer size for image output.
pub const OUTPUT_BUFFER: usize = 64 * 1024;

/// Probe state shared by everything that talks to the terminal in one run.
pub struct Session<'a> {
    pub port: &'a dyn TerminalPort,
    pub query: EscapeQuery,
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(port: &'a dyn TerminalPort) -> Self {
        Self {
            port,
            query: EscapeQuery::new(),
        }
    }

    fn protocol(&mut self, config: &Config) -> ImageProtocol {
        if let Some(protocol) = config.protocol {
            return protocol;
        }
        let caps = detect_capabilities(
            &DetectionHints::from_env(),
            Some(config.fallback),
            self.port,
            &mut self.query,
            config.timeout,
        );
        choose_protocol(caps, config.fallback)
    }
}

/// Show the image at `path` on `out`.
///
/// # Errors
///
/// Loading, converting, or encoding the image failed, or `out` did.
pub fn show(
    session: &mut Session<'_>,
    config: &Config,
    path: &Path,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let resolution = GeometryResolver::new(&config.pixel_fallback, &config.cell_fallback)
        .with_timeout(config.timeout)
        .with_scale(config.scale)
        .resolve(session.port, &mut session.query);
    let screen = resolution.size;

    let width = clamp_target(config.width.resolve(&screen));
    let height = clamp_target(config.height.resolve(&screen));
    tracing::debug!(
        width_spec = %config.width,
        height_spec = %config.height,
        width,
        height,
        "target size resolved"
    );

    let cache = if config.cache {
        DocumentCache::user_default()
    } else {
        None
    };
    let image = ttyimg_image::load(path, cache.as_ref(), (width, height))
        .with_context(|| format!("cannot show {}", path.display()))?;
    let image = resize(&image, width, height, config.mode);

    let protocol = session.protocol(config);
    tracing::debug!(%protocol, "protocol selected");

    let offset = config.center.then(|| {
        let (w, h) = image.dimensions();
        center(w, h, &screen).0
    });
    draw(out, &image, protocol, offset)
}

/// Emit the optional horizontal offset, the image, and a newline.
pub fn draw(
    out: &mut dyn Write,
    image: &image::DynamicImage,
    protocol: ImageProtocol,
    offset_cells: Option<u32>,
) -> anyhow::Result<()> {
    if let Some(cells) = offset_cells {
        write!(out, "\x1b[{cells}C")?;
    }
    write_image(out, image, protocol).with_context(|| format!("{protocol} encoding failed"))?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// `--validate`: compare versions and report what the terminal supports.
///
/// Returns whether `expected` matches this build.
pub fn validate(
    session: &mut Session<'_>,
    config: &Config,
    expected: &str,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<bool> {
    let version = env!("CARGO_PKG_VERSION");
    let matches = expected == version;
    if matches {
        writeln!(out, "ttyimg version matches: '{version}'")?;
    } else {
        writeln!(
            err,
            "ttyimg version mismatch, got: '{expected}' expects: '{version}'."
        )?;
    }

    let caps = detect_capabilities(
        &DetectionHints::from_env(),
        Some(config.fallback),
        session.port,
        &mut session.query,
        config.timeout,
    );
    writeln!(out, "{caps}")?;
    out.flush()?;
    Ok(matches)
}

/// Negative sizes mean nothing to the resizer; treat them as unconstrained.
fn clamp_target(pixels: i64) -> u32 {
    u32::try_from(pixels.max(0)).unwrap_or(u32::MAX)
}
