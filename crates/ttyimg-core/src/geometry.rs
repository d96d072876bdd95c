#![forbid(unsafe_code)]

//! Screen geometry resolution.
//!
//! [`GeometryResolver`] runs two independent first-success chains, one for
//! the pixel size of the terminal and one for its size in cells, and falls
//! back to user-supplied `WxH` strings when a chain comes up empty.
//!
//! # Resolution order
//!
//! ```text
//! pixels: [forced fallback] | escape 14t -> kernel -> window system -> fallback
//! cells:  [forced fallback] | kernel -> escape 18t -> fallback
//! ```
//!
//! Resolution never fails. A field nobody could determine stays 0, and every
//! consumer treats 0 as "unknown".

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::dimension::Axis;
use crate::error::ScaleError;
use crate::escape_query::{DEFAULT_TIMEOUT, EscapeQuery};
use crate::port::TerminalPort;
use crate::probe::{
    EscapeCellProbe, EscapePixelProbe, Extent, GeometryProbe, KernelCellProbe, KernelPixelProbe,
    ProbeContext, ProbeSource, first_success,
};

/// Resolved terminal geometry. Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub width_px: u32,
    pub height_px: u32,
    pub width_cell: u32,
    pub height_cell: u32,
}

impl ScreenSize {
    #[must_use]
    pub const fn new(width_px: u32, height_px: u32, width_cell: u32, height_cell: u32) -> Self {
        Self {
            width_px,
            height_px,
            width_cell,
            height_cell,
        }
    }

    #[must_use]
    pub const fn pixels(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Horizontal => self.width_px,
            Axis::Vertical => self.height_px,
        }
    }

    #[must_use]
    pub const fn cells(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Horizontal => self.width_cell,
            Axis::Vertical => self.height_cell,
        }
    }

    /// Whole pixels per cell along `axis`, or `None` when unknown.
    ///
    /// Unknown covers both a zero cell count and a ratio that truncates to 0.
    #[must_use]
    pub const fn cell_pixels(&self, axis: Axis) -> Option<u32> {
        let cells = self.cells(axis);
        if cells == 0 {
            return None;
        }
        match self.pixels(axis) / cells {
            0 => None,
            ratio => Some(ratio),
        }
    }

    /// Every field multiplied by the matching factor, truncated.
    #[must_use]
    pub fn scaled(self, scale: Scale) -> Self {
        let mul = |value: u32, factor: f64| (f64::from(value) * factor) as u32;
        Self {
            width_px: mul(self.width_px, scale.horizontal),
            height_px: mul(self.height_px, scale.vertical),
            width_cell: mul(self.width_cell, scale.horizontal),
            height_cell: mul(self.height_cell, scale.vertical),
        }
    }
}

/// A `WxH` or `WxHxForce` fallback string.
///
/// Parsing is lenient: `x` and `X` both separate, `force` is recognised in
/// any case anywhere in the text, and an unreadable size becomes `0x0`
/// rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FallbackSpec {
    pub extent: Extent,
    /// Skip probing and use `extent` unconditionally.
    pub forced: bool,
}

impl FallbackSpec {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let forced = text.to_ascii_lowercase().contains("force");
        let mut fields = text.split(['x', 'X']).map(str::trim);
        let width = fields.next().and_then(|f| f.parse::<u32>().ok());
        let height = fields.next().and_then(|f| f.parse::<u32>().ok());
        let extent = match (width, height) {
            (Some(width), Some(height)) => Extent::new(width, height),
            _ => Extent::default(),
        };
        Self { extent, forced }
    }
}

/// Horizontal and vertical multipliers applied to the resolved geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub horizontal: f64,
    pub vertical: f64,
}

impl Scale {
    pub const IDENTITY: Self = Self {
        horizontal: 1.0,
        vertical: 1.0,
    };
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FromStr for Scale {
    type Err = ScaleError;

    /// Parse `<float>x<float>`, e.g. `1x1` or `0.5X2`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ScaleError::InvalidFormat(text.to_owned());
        let (h, v) = text.split_once(['x', 'X']).ok_or_else(invalid)?;
        let factor = |s: &str| {
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .ok_or_else(invalid)
        };
        Ok(Self {
            horizontal: factor(h)?,
            vertical: factor(v)?,
        })
    }
}

/// Resolved geometry with the provenance of each half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub size: ScreenSize,
    pub pixel_source: ProbeSource,
    pub cell_source: ProbeSource,
    pub forced_pixels: bool,
    pub forced_cells: bool,
}

/// Default pixel-size strategies for this platform.
#[must_use]
pub fn default_pixel_probes() -> Vec<Box<dyn GeometryProbe>> {
    #[allow(unused_mut)]
    let mut probes: Vec<Box<dyn GeometryProbe>> =
        vec![Box::new(EscapePixelProbe), Box::new(KernelPixelProbe)];
    #[cfg(unix)]
    probes.extend(crate::window_manager::probes());
    #[cfg(windows)]
    probes.push(Box::new(crate::foreground_window::ForegroundWindowProbe));
    probes
}

/// Default cell-size strategies.
#[must_use]
pub fn default_cell_probes() -> Vec<Box<dyn GeometryProbe>> {
    vec![Box::new(KernelCellProbe), Box::new(EscapeCellProbe)]
}

/// Runs the pixel and cell chains and applies fallbacks and scale.
///
/// # Example
///
/// ```no_run
/// use ttyimg_core::{EscapeQuery, GeometryResolver, TtyPort};
///
/// let resolver = GeometryResolver::new("1920x1080", "120x30");
/// let resolution = resolver.resolve(&TtyPort::new(), &mut EscapeQuery::new());
/// println!("{:?} via {}", resolution.size, resolution.pixel_source);
/// ```
pub struct GeometryResolver {
    pixel_fallback: FallbackSpec,
    cell_fallback: FallbackSpec,
    scale: Scale,
    timeout: Duration,
    pixel_probes: Vec<Box<dyn GeometryProbe>>,
    cell_probes: Vec<Box<dyn GeometryProbe>>,
}

impl fmt::Debug for GeometryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = |probes: &[Box<dyn GeometryProbe>]| -> Vec<ProbeSource> {
            probes.iter().map(|p| p.source()).collect()
        };
        f.debug_struct("GeometryResolver")
            .field("pixel_fallback", &self.pixel_fallback)
            .field("cell_fallback", &self.cell_fallback)
            .field("scale", &self.scale)
            .field("timeout", &self.timeout)
            .field("pixel_probes", &sources(&self.pixel_probes))
            .field("cell_probes", &sources(&self.cell_probes))
            .finish()
    }
}

impl GeometryResolver {
    /// Resolver with the platform's default strategies.
    #[must_use]
    pub fn new(pixel_fallback: &str, cell_fallback: &str) -> Self {
        Self {
            pixel_fallback: FallbackSpec::parse(pixel_fallback),
            cell_fallback: FallbackSpec::parse(cell_fallback),
            scale: Scale::IDENTITY,
            timeout: DEFAULT_TIMEOUT,
            pixel_probes: default_pixel_probes(),
            cell_probes: default_cell_probes(),
        }
    }

    /// Per-query timeout for escape-sequence strategies.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the pixel-size chain.
    #[must_use]
    pub fn with_pixel_probes(mut self, probes: Vec<Box<dyn GeometryProbe>>) -> Self {
        self.pixel_probes = probes;
        self
    }

    /// Replace the cell-size chain.
    #[must_use]
    pub fn with_cell_probes(mut self, probes: Vec<Box<dyn GeometryProbe>>) -> Self {
        self.cell_probes = probes;
        self
    }

    /// Resolve the screen geometry. Never fails.
    pub fn resolve(&self, port: &dyn TerminalPort, query: &mut EscapeQuery) -> Resolution {
        let mut cx = ProbeContext {
            port,
            query,
            timeout: self.timeout,
        };

        let (pixels, pixel_source) = run_chain(&self.pixel_probes, self.pixel_fallback, &mut cx);
        let (cells, cell_source) = run_chain(&self.cell_probes, self.cell_fallback, &mut cx);

        let size = ScreenSize::new(pixels.width, pixels.height, cells.width, cells.height)
            .scaled(self.scale);

        #[cfg(feature = "tracing")]
        tracing::info!(
            width_px = size.width_px,
            height_px = size.height_px,
            width_cell = size.width_cell,
            height_cell = size.height_cell,
            %pixel_source,
            %cell_source,
            forced_pixels = self.pixel_fallback.forced,
            forced_cells = self.cell_fallback.forced,
            "screen geometry resolved"
        );

        Resolution {
            size,
            pixel_source,
            cell_source,
            forced_pixels: self.pixel_fallback.forced,
            forced_cells: self.cell_fallback.forced,
        }
    }
}

fn run_chain(
    probes: &[Box<dyn GeometryProbe>],
    fallback: FallbackSpec,
    cx: &mut ProbeContext<'_>,
) -> (Extent, ProbeSource) {
    if !fallback.forced {
        if let Some(found) = first_success(probes, cx) {
            return (found.extent, found.source);
        }
    }
    let source = if fallback.extent.is_positive() {
        ProbeSource::Fallback
    } else {
        ProbeSource::Unresolved
    };
    #[cfg(feature = "tracing")]
    tracing::debug!(
        width = fallback.extent.width,
        height = fallback.extent.height,
        forced = fallback.forced,
        %source,
        "using fallback geometry"
    );
    (fallback.extent, source)
}
