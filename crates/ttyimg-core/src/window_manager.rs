#![forbid(unsafe_code)]

//! Screen-size strategies that ask the window system instead of the
//! terminal.
//!
//! These run only after the terminal itself failed to report a pixel size.
//! Each one shells out to a helper program; a missing program, a non-zero
//! exit status, or unparseable output is an ordinary probe failure.
//!
//! Order, fastest and most reliable first:
//!
//! | Strategy | Helper | Precondition |
//! |----------|--------|--------------|
//! | [`WlrRandrProbe`] | `wlr-randr` | `WAYLAND_DISPLAY` set |
//! | [`SwayProbe`] | `swaymsg -t get_outputs` | `WAYLAND_DISPLAY` set |
//! | [`XwininfoProbe`] | `xdotool`, `xwininfo` | none |
//! | [`ToolkitWindowProbe::zenity`] | `zenity`, `xdotool` | none |
//! | [`ToolkitWindowProbe::kdialog`] | `kdialog`, `xdotool` | none |

use std::env;
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;

use crate::error::ProbeError;
use crate::probe::{Extent, GeometryProbe, ProbeContext, ProbeSource};

/// How long a toolkit helper gets to map its window.
const TOOLKIT_WINDOW_DELAY: Duration = Duration::from_millis(100);

static MODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)x(\d+)").expect("valid regex"));
static WIDTH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Width: (\d+)").expect("valid regex"));
static HEIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Height: (\d+)").expect("valid regex"));
static GEOMETRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Geometry: (\d+)x(\d+)").expect("valid regex"));

/// The window-system strategies in priority order.
#[must_use]
pub fn probes() -> Vec<Box<dyn GeometryProbe>> {
    vec![
        Box::new(WlrRandrProbe),
        Box::new(SwayProbe),
        Box::new(XwininfoProbe),
        Box::new(ToolkitWindowProbe::zenity()),
        Box::new(ToolkitWindowProbe::kdialog()),
    ]
}

fn require_wayland() -> Result<(), ProbeError> {
    if env::var_os("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty()) {
        Ok(())
    } else {
        Err(ProbeError::Unsupported("not in a Wayland session"))
    }
}

/// Run a helper to completion and return its stdout.
fn run(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;
    if !output.status.success() {
        return Err(ProbeError::Io(io::Error::other(format!(
            "{program} exited with {}",
            output.status
        ))));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn malformed(output: &str) -> ProbeError {
    ProbeError::MalformedResponse(output.trim().chars().take(120).collect())
}

fn capture_pair(re: &Regex, text: &str) -> Option<Extent> {
    let caps = re.captures(text)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some(Extent::new(width, height))
}

/// Output modes listed by `wlr-randr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WlrRandrProbe;

impl GeometryProbe for WlrRandrProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::WlrRandr
    }

    fn measure(&self, _cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        require_wayland()?;
        let output = run("wlr-randr", &[])?;
        parse_wlr_randr(&output).ok_or_else(|| malformed(&output))
    }
}

/// Prefer the mode flagged `current`, else the first mode listed.
pub fn parse_wlr_randr(output: &str) -> Option<Extent> {
    output
        .lines()
        .filter(|line| line.contains("current"))
        .find_map(|line| capture_pair(&MODE_RE, line))
        .or_else(|| capture_pair(&MODE_RE, output))
}

/// Outputs reported by sway's IPC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwayProbe;

impl GeometryProbe for SwayProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::Sway
    }

    fn measure(&self, _cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        require_wayland()?;
        let output = run("swaymsg", &["-t", "get_outputs", "-r"])?;
        parse_sway_outputs(&output).ok_or_else(|| malformed(&output))
    }
}

/// `current_mode` of the focused output, else of the first output that has
/// one.
pub fn parse_sway_outputs(json: &str) -> Option<Extent> {
    let outputs: serde_json::Value = serde_json::from_str(json).ok()?;
    let outputs = outputs.as_array()?;

    let mode_of = |output: &serde_json::Value| -> Option<Extent> {
        let mode = output.get("current_mode")?;
        let width = u32::try_from(mode.get("width")?.as_u64()?).ok()?;
        let height = u32::try_from(mode.get("height")?.as_u64()?).ok()?;
        Some(Extent::new(width, height))
    };

    outputs
        .iter()
        .filter(|o| o.get("focused").and_then(serde_json::Value::as_bool) == Some(true))
        .find_map(mode_of)
        .or_else(|| outputs.iter().find_map(mode_of))
}

/// The active X11 window, via `xdotool` and `xwininfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XwininfoProbe;

impl GeometryProbe for XwininfoProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::Xwininfo
    }

    fn measure(&self, _cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        let window = run("xdotool", &["getactivewindow"])?;
        let window = window.trim();
        if window.is_empty() {
            return Err(malformed(window));
        }
        let output = run("xwininfo", &["-id", window])?;
        parse_xwininfo(&output).ok_or_else(|| malformed(&output))
    }
}

pub fn parse_xwininfo(output: &str) -> Option<Extent> {
    let width = WIDTH_RE.captures(output)?.get(1)?.as_str().parse().ok()?;
    let height = HEIGHT_RE.captures(output)?.get(1)?.as_str().parse().ok()?;
    Some(Extent::new(width, height))
}

/// Opens a throwaway toolkit dialog and measures its window.
///
/// The dialog inherits the session's scaling, which is the point: on some
/// desktops it is the only window we can find at all.
#[derive(Debug, Clone, Copy)]
pub struct ToolkitWindowProbe {
    program: &'static str,
    args: &'static [&'static str],
    source: ProbeSource,
}

impl ToolkitWindowProbe {
    #[must_use]
    pub const fn zenity() -> Self {
        Self {
            program: "zenity",
            args: &["--question", "--title="],
            source: ProbeSource::Zenity,
        }
    }

    #[must_use]
    pub const fn kdialog() -> Self {
        Self {
            program: "kdialog",
            args: &["--title="],
            source: ProbeSource::Kdialog,
        }
    }
}

impl GeometryProbe for ToolkitWindowProbe {
    fn source(&self) -> ProbeSource {
        self.source
    }

    fn measure(&self, _cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
        let child = Command::new(self.program)
            .args(self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let _dialog = KillOnDrop(child);

        thread::sleep(TOOLKIT_WINDOW_DELAY);

        let ids = run("xdotool", &["search", "--name", self.program])?;
        let window = ids
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| malformed(&ids))?;
        let geometry = run("xdotool", &["getwindowgeometry", window])?;
        parse_window_geometry(&geometry).ok_or_else(|| malformed(&geometry))
    }
}

pub fn parse_window_geometry(output: &str) -> Option<Extent> {
    capture_pair(&GEOMETRY_RE, output)
}

/// Kills and reaps a helper process on every exit path.
struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wlr_randr_prefers_current_mode() {
        let output = "\
eDP-1 \"Sharp Corporation 0x14F9 (eDP-1)\"
  Physical size: 290x190 mm
  Enabled: yes
  Modes:
    2256x1504 px, 59.999001 Hz (preferred)
    1920x1200 px, 59.999001 Hz (current)
";
        assert_eq!(parse_wlr_randr(output), Some(Extent::new(1920, 1200)));
    }

    #[test]
    fn wlr_randr_without_current_takes_first_pair() {
        let output = "HDMI-A-1\n  Modes:\n    1280x720 px, 60 Hz\n";
        assert_eq!(parse_wlr_randr(output), Some(Extent::new(1280, 720)));
        assert_eq!(parse_wlr_randr("no modes here"), None);
    }

    #[test]
    fn sway_prefers_focused_output() {
        let json = r#"[
            {"name": "DP-1", "focused": false, "current_mode": {"width": 1920, "height": 1080, "refresh": 60000}},
            {"name": "DP-2", "focused": true, "current_mode": {"width": 3840, "height": 2160, "refresh": 60000}}
        ]"#;
        assert_eq!(parse_sway_outputs(json), Some(Extent::new(3840, 2160)));
    }

    #[test]
    fn sway_falls_back_to_first_output_with_mode() {
        let json = r#"[
            {"name": "HEADLESS-1", "focused": true},
            {"name": "DP-1", "current_mode": {"width": 2560, "height": 1440}}
        ]"#;
        assert_eq!(parse_sway_outputs(json), Some(Extent::new(2560, 1440)));
        assert_eq!(parse_sway_outputs("not json"), None);
        assert_eq!(parse_sway_outputs("{}"), None);
    }

    #[test]
    fn xwininfo_width_and_height() {
        let output = "\
xwininfo: Window id: 0x3a00007 \"term\"
  Absolute upper-left X:  0
  Width: 1366
  Height: 705
  Depth: 24
";
        assert_eq!(parse_xwininfo(output), Some(Extent::new(1366, 705)));
        assert_eq!(parse_xwininfo("Width: 10"), None);
    }

    #[test]
    fn window_geometry_line() {
        let output = "Window 58720263\n  Position: 0,0 (screen: 0)\n  Geometry: 1600x900\n";
        assert_eq!(parse_window_geometry(output), Some(Extent::new(1600, 900)));
    }

    #[test]
    fn chain_order_is_fixed() {
        let sources: Vec<_> = probes().iter().map(|p| p.source()).collect();
        assert_eq!(
            sources,
            vec![
                ProbeSource::WlrRandr,
                ProbeSource::Sway,
                ProbeSource::Xwininfo,
                ProbeSource::Zenity,
                ProbeSource::Kdialog,
            ]
        );
    }
}
