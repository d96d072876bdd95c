#![forbid(unsafe_code)]

//! Geometry strategies and the first-success chain that runs them.
//!
//! Each strategy implements [`GeometryProbe`]. A chain is just a slice of
//! boxed strategies tried in order; the first one that reports a positive
//! width *and* height wins. A `(0, 0)` report counts as a failure.
//!
//! # Escape-sequence reports
//!
//! | Query | Reply | Meaning |
//! |-------|-------|---------|
//! | `CSI 14 t` | `CSI 4 ; height ; width t` | text area in pixels |
//! | `CSI 18 t` | `CSI 8 ; rows ; columns t` | text area in cells |

use std::fmt;
use std::time::Duration;

use crate::error::ProbeError;
use crate::escape_query::EscapeQuery;
use crate::port::TerminalPort;

const PIXEL_SIZE_QUERY: &[u8] = b"\x1b[14t";
const CELL_SIZE_QUERY: &[u8] = b"\x1b[18t";
const SIZE_REPORT_TERMINATOR: u8 = b't';

/// Which strategy produced a value. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeSource {
    /// `CSI 14 t` / `CSI 18 t` round trip.
    EscapeSequence,
    /// TIOCGWINSZ via the terminal driver.
    Kernel,
    /// `wlr-randr` (wlroots compositors).
    WlrRandr,
    /// `swaymsg -t get_outputs`.
    Sway,
    /// `xdotool` + `xwininfo` on the active X11 window.
    Xwininfo,
    /// A zenity (GTK) window measured with `xdotool`.
    Zenity,
    /// A kdialog (Qt) window measured with `xdotool`.
    Kdialog,
    /// The foreground window's client area (Windows).
    ForegroundWindow,
    /// The user-supplied fallback string.
    Fallback,
    /// Nothing produced a value.
    Unresolved,
}

impl ProbeSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EscapeSequence => "escape-sequence",
            Self::Kernel => "kernel",
            Self::WlrRandr => "wlr-randr",
            Self::Sway => "sway",
            Self::Xwininfo => "xwininfo",
            Self::Zenity => "gtk-zenity",
            Self::Kdialog => "qt-kdialog",
            Self::ForegroundWindow => "foreground-window",
            Self::Fallback => "fallback",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ProbeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A width/height pair in whatever unit the strategy measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both sides non-zero.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// The winning measurement of one chain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryProbeResult {
    pub extent: Extent,
    pub source: ProbeSource,
}

/// What a strategy may use while measuring.
pub struct ProbeContext<'a> {
    pub port: &'a dyn TerminalPort,
    pub query: &'a mut EscapeQuery,
    /// Per-query timeout for escape-sequence strategies.
    pub timeout: Duration,
}

/// One way of learning a terminal or screen size.
pub trait GeometryProbe {
    fn source(&self) -> ProbeSource;

    /// Measure, or explain why not.
    fn measure(&self, cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError>;
}

/// Try `probes` in order; return the first positive measurement.
pub fn first_success(
    probes: &[Box<dyn GeometryProbe>],
    cx: &mut ProbeContext<'_>,
) -> Option<GeometryProbeResult> {
    for probe in probes {
        let source = probe.source();
        match probe.measure(cx) {
            Ok(extent) if extent.is_positive() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%source, width = extent.width, height = extent.height, "probe succeeded");
                return Some(GeometryProbeResult { extent, source });
            }
            Ok(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%source, error = %ProbeError::EmptyExtent, "probe failed");
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%source, error = %_err, "probe failed");
            }
        }
    }
    None
}

/// Pixel size via `CSI 14 t`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapePixelProbe;

impl GeometryProbe for EscapePixelProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::EscapeSequence
    }

    fn measure(&self, cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        let reply = cx.query.query(
            cx.port,
            PIXEL_SIZE_QUERY,
            SIZE_REPORT_TERMINATOR,
            cx.timeout,
        )?;
        parse_size_report(&reply, 4)
    }
}

/// Cell size via `CSI 18 t`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapeCellProbe;

impl GeometryProbe for EscapeCellProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::EscapeSequence
    }

    fn measure(&self, cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        let reply = cx.query.query(
            cx.port,
            CELL_SIZE_QUERY,
            SIZE_REPORT_TERMINATOR,
            cx.timeout,
        )?;
        parse_size_report(&reply, 8)
    }
}

/// Pixel size from the terminal driver's `ws_xpixel`/`ws_ypixel`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelPixelProbe;

impl GeometryProbe for KernelPixelProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::Kernel
    }

    fn measure(&self, cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        let ws = cx.port.window_size()?;
        Ok(Extent::new(u32::from(ws.width), u32::from(ws.height)))
    }
}

/// Cell size from the terminal driver's `ws_col`/`ws_row`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelCellProbe;

impl GeometryProbe for KernelCellProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::Kernel
    }

    fn measure(&self, cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        let ws = cx.port.window_size()?;
        Ok(Extent::new(u32::from(ws.columns), u32::from(ws.rows)))
    }
}

/// Parse a `[<code>;<height>;<width>t` size report.
///
/// Stray bytes before the report are skipped. The leading ESC may or may not
/// already be stripped.
pub fn parse_size_report(reply: &[u8], code: u32) -> Result<Extent, ProbeError> {
    let malformed = || ProbeError::MalformedResponse(String::from_utf8_lossy(reply).into_owned());

    let text = std::str::from_utf8(reply).map_err(|_| malformed())?;
    let marker = format!("[{code};");
    let start = text.find(&marker).ok_or_else(malformed)?;
    let payload = &text[start + marker.len()..];
    let end = payload.find('t').ok_or_else(malformed)?;

    let mut fields = payload[..end].split(';');
    let height = parse_field(fields.next()).ok_or_else(malformed)?;
    let width = parse_field(fields.next()).ok_or_else(malformed)?;
    if fields.next().is_some() {
        return Err(malformed());
    }
    Ok(Extent::new(width, height))
}

fn parse_field(field: Option<&str>) -> Option<u32> {
    let field = field?;
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedPort, serial};

    // --- size report parsing ---

    #[test]
    fn parse_pixel_report() {
        let extent = parse_size_report(b"[4;680;1550t", 4).unwrap();
        assert_eq!(extent, Extent::new(1550, 680));
    }

    #[test]
    fn parse_report_with_escape_still_present() {
        let extent = parse_size_report(b"\x1b[8;36;172t", 8).unwrap();
        assert_eq!(extent, Extent::new(172, 36));
    }

    #[test]
    fn parse_report_with_leading_garbage() {
        let extent = parse_size_report(b"junk[4;1080;1920t", 4).unwrap();
        assert_eq!(extent, Extent::new(1920, 1080));
    }

    #[test]
    fn parse_report_wrong_code() {
        assert!(parse_size_report(b"[8;36;172t", 4).is_err());
    }

    #[test]
    fn parse_report_non_numeric() {
        assert!(matches!(
            parse_size_report(b"[4;abc;1550t", 4),
            Err(ProbeError::MalformedResponse(_))
        ));
        assert!(parse_size_report(b"[4;-1;1550t", 4).is_err());
    }

    #[test]
    fn parse_report_wrong_field_count() {
        assert!(parse_size_report(b"[4;680t", 4).is_err());
        assert!(parse_size_report(b"[4;680;1550;9t", 4).is_err());
    }

    #[test]
    fn parse_report_empty() {
        assert!(parse_size_report(b"", 4).is_err());
    }

    // --- chain ---

    struct Fixed(ProbeSource, Result<Extent, &'static str>);

    impl GeometryProbe for Fixed {
        fn source(&self) -> ProbeSource {
            self.0
        }

        fn measure(&self, _cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
            self.1.map_err(ProbeError::Unsupported)
        }
    }

    #[test]
    fn chain_skips_errors_and_zero_extents() {
        let port = ScriptedPort::new();
        let mut query = EscapeQuery::new();
        let mut cx = ProbeContext {
            port: &port,
            query: &mut query,
            timeout: Duration::from_millis(10),
        };
        let probes: Vec<Box<dyn GeometryProbe>> = vec![
            Box::new(Fixed(ProbeSource::EscapeSequence, Err("no"))),
            Box::new(Fixed(ProbeSource::Kernel, Ok(Extent::new(0, 0)))),
            Box::new(Fixed(ProbeSource::WlrRandr, Ok(Extent::new(800, 0)))),
            Box::new(Fixed(ProbeSource::Sway, Ok(Extent::new(2560, 1440)))),
            Box::new(Fixed(ProbeSource::Xwininfo, Ok(Extent::new(1, 1)))),
        ];
        let result = first_success(&probes, &mut cx).unwrap();
        assert_eq!(result.source, ProbeSource::Sway);
        assert_eq!(result.extent, Extent::new(2560, 1440));
    }

    #[test]
    fn chain_of_failures_is_none() {
        let port = ScriptedPort::new();
        let mut query = EscapeQuery::new();
        let mut cx = ProbeContext {
            port: &port,
            query: &mut query,
            timeout: Duration::from_millis(10),
        };
        let probes: Vec<Box<dyn GeometryProbe>> =
            vec![Box::new(Fixed(ProbeSource::Kernel, Err("no")))];
        assert!(first_success(&probes, &mut cx).is_none());
        assert!(first_success(&[], &mut cx).is_none());
    }

    #[test]
    fn kernel_probes_read_window_size() {
        let port = ScriptedPort::new().window(120, 30, 1200, 600);
        let mut query = EscapeQuery::new();
        let mut cx = ProbeContext {
            port: &port,
            query: &mut query,
            timeout: Duration::from_millis(10),
        };
        assert_eq!(KernelPixelProbe.measure(&mut cx).unwrap(), Extent::new(1200, 600));
        assert_eq!(KernelCellProbe.measure(&mut cx).unwrap(), Extent::new(120, 30));
    }

    #[test]
    fn escape_pixel_probe_round_trip() {
        let _lock = serial();
        let port = ScriptedPort::new().reply(b"\x1b[4;1080;1920t".to_vec());
        let mut query = EscapeQuery::new();
        let mut cx = ProbeContext {
            port: &port,
            query: &mut query,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(
            EscapePixelProbe.measure(&mut cx).unwrap(),
            Extent::new(1920, 1080)
        );
        assert_eq!(port.written(), PIXEL_SIZE_QUERY);
    }

    #[test]
    fn source_names_are_stable() {
        assert_eq!(ProbeSource::EscapeSequence.to_string(), "escape-sequence");
        assert_eq!(ProbeSource::Fallback.as_str(), "fallback");
    }
}
