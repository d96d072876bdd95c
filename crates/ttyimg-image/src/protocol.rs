#![forbid(unsafe_code)]

//! Terminal graphics protocol detection.
//!
//! Kitty and iTerm2 support is inferred from the environment. Sixel support
//! is asked of the terminal itself with a primary device attributes (DA1)
//! query, but only when the environment says nothing and the fallback is
//! not sixel anyway.

use std::env;
use std::fmt;
use std::time::Duration;

use ttyimg_core::{EscapeQuery, TerminalPort};

const DA1_QUERY: &[u8] = b"\x1b[c";
const DA1_TERMINATOR: u8 = b'c';
/// DA1 attribute advertising sixel graphics.
const DA1_SIXEL: &str = "4";

/// Graphics protocol used to draw the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageProtocol {
    Kitty,
    Iterm2,
    Sixel,
}

impl fmt::Display for ImageProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kitty => "kitty",
            Self::Iterm2 => "iterm",
            Self::Sixel => "sixel",
        })
    }
}

/// Environment facts protocol detection looks at.
#[derive(Debug, Clone, Default)]
pub struct DetectionHints {
    pub term: Option<String>,
    pub term_program: Option<String>,
    pub lc_terminal: Option<String>,
    pub kitty_window_id: bool,
}

impl DetectionHints {
    /// Capture hints from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            term: env::var("TERM").ok(),
            term_program: env::var("TERM_PROGRAM").ok(),
            lc_terminal: env::var("LC_TERMINAL").ok(),
            kitty_window_id: env::var_os("KITTY_WINDOW_ID").is_some(),
        }
    }

    #[must_use]
    pub fn kitty_capable(&self) -> bool {
        let term = self.term.as_deref().unwrap_or_default();
        let program = self.term_program.as_deref().unwrap_or_default();
        term.contains("kitty") || self.kitty_window_id || matches!(program, "ghostty" | "WezTerm")
    }

    #[must_use]
    pub fn iterm2_capable(&self) -> bool {
        let program = self.term_program.as_deref().unwrap_or_default();
        matches!(program, "iTerm.app" | "WezTerm") || self.lc_terminal.as_deref() == Some("iTerm2")
    }
}

/// What the terminal was found to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub kitty: bool,
    pub iterm2: bool,
    pub sixel: bool,
}

impl Capabilities {
    /// Preferred protocol among the supported ones.
    #[must_use]
    pub const fn preferred(self) -> Option<ImageProtocol> {
        if self.kitty {
            Some(ImageProtocol::Kitty)
        } else if self.iterm2 {
            Some(ImageProtocol::Iterm2)
        } else if self.sixel {
            Some(ImageProtocol::Sixel)
        } else {
            None
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Iterm: {}, Kitty: {}, Sixel: {}",
            self.iterm2, self.kitty, self.sixel
        )
    }
}

/// Probe the terminal's graphics support.
///
/// The DA1 query is skipped when kitty or iTerm2 was already detected, or
/// when `fallback` is sixel (the answer could not change the outcome).
pub fn detect_capabilities(
    hints: &DetectionHints,
    fallback: Option<ImageProtocol>,
    port: &dyn TerminalPort,
    query: &mut EscapeQuery,
    timeout: Duration,
) -> Capabilities {
    let mut caps = Capabilities {
        kitty: hints.kitty_capable(),
        iterm2: hints.iterm2_capable(),
        sixel: false,
    };
    if !caps.kitty && !caps.iterm2 && fallback != Some(ImageProtocol::Sixel) {
        caps.sixel = query_sixel(port, query, timeout);
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(?caps, "graphics capabilities detected");
    caps
}

/// Detected protocol, else `fallback`.
#[must_use]
pub fn choose_protocol(caps: Capabilities, fallback: ImageProtocol) -> ImageProtocol {
    caps.preferred().unwrap_or(fallback)
}

fn query_sixel(port: &dyn TerminalPort, query: &mut EscapeQuery, timeout: Duration) -> bool {
    match query.query(port, DA1_QUERY, DA1_TERMINATOR, timeout) {
        Ok(reply) => da1_reports_sixel(&reply),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %_err, "DA1 query failed");
            false
        }
    }
}

/// Whether a `CSI ? <attrs> c` reply lists the sixel attribute.
#[must_use]
pub fn da1_reports_sixel(reply: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(reply) else {
        return false;
    };
    let Some(start) = text.find("[?") else {
        return false;
    };
    let body = &text[start + 2..];
    let body = body.strip_suffix('c').unwrap_or(body);
    body.split(';').any(|attr| attr == DA1_SIXEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttyimg_core::testing::{ScriptedPort, serial};

    fn hints(term: &str, program: &str) -> DetectionHints {
        DetectionHints {
            term: Some(term.to_string()),
            term_program: Some(program.to_string()),
            ..DetectionHints::default()
        }
    }

    // --- environment ---

    #[test]
    fn detects_kitty_from_env() {
        assert!(hints("xterm-kitty", "").kitty_capable());
        assert!(hints("xterm-256color", "ghostty").kitty_capable());
        let h = DetectionHints {
            kitty_window_id: true,
            ..DetectionHints::default()
        };
        assert!(h.kitty_capable());
        assert!(!hints("xterm-256color", "Apple_Terminal").kitty_capable());
    }

    #[test]
    fn detects_iterm2_from_env() {
        assert!(hints("xterm-256color", "iTerm.app").iterm2_capable());
        let h = DetectionHints {
            lc_terminal: Some("iTerm2".into()),
            ..DetectionHints::default()
        };
        assert!(h.iterm2_capable());
        assert!(!hints("xterm-256color", "vscode").iterm2_capable());
    }

    #[test]
    fn wezterm_prefers_kitty() {
        let caps = Capabilities {
            kitty: hints("", "WezTerm").kitty_capable(),
            iterm2: hints("", "WezTerm").iterm2_capable(),
            sixel: false,
        };
        assert_eq!(caps.preferred(), Some(ImageProtocol::Kitty));
    }

    // --- DA1 ---

    #[test]
    fn da1_parsing() {
        assert!(da1_reports_sixel(b"[?62;4;6;22c"));
        assert!(da1_reports_sixel(b"\x1b[?64;1;2;4c"));
        assert!(!da1_reports_sixel(b"[?62;1;6;22c"));
        assert!(!da1_reports_sixel(b"[?1;2c"));
        assert!(!da1_reports_sixel(b"[?64;14c"));
        assert!(!da1_reports_sixel(b"garbage"));
    }

    #[test]
    fn sixel_is_queried_when_env_is_silent() {
        let _lock = serial();
        let port = ScriptedPort::new().reply(b"\x1b[?62;4;22c".to_vec());
        let mut query = EscapeQuery::new();
        let caps = detect_capabilities(
            &hints("xterm-256color", ""),
            Some(ImageProtocol::Kitty),
            &port,
            &mut query,
            Duration::from_millis(500),
        );
        assert_eq!(caps, Capabilities {
            kitty: false,
            iterm2: false,
            sixel: true
        });
        assert_eq!(port.written(), DA1_QUERY);
    }

    #[test]
    fn sixel_fallback_skips_query() {
        let port = ScriptedPort::new();
        let mut query = EscapeQuery::new();
        let caps = detect_capabilities(
            &hints("xterm-256color", ""),
            Some(ImageProtocol::Sixel),
            &port,
            &mut query,
            Duration::from_millis(10),
        );
        assert_eq!(caps, Capabilities::default());
        assert!(port.written().is_empty());
        assert_eq!(choose_protocol(caps, ImageProtocol::Sixel), ImageProtocol::Sixel);
    }

    #[test]
    fn env_detection_skips_query() {
        let port = ScriptedPort::new();
        let mut query = EscapeQuery::new();
        let caps = detect_capabilities(
            &hints("xterm-kitty", ""),
            None,
            &port,
            &mut query,
            Duration::from_millis(10),
        );
        assert!(caps.kitty);
        assert!(port.written().is_empty());
    }

    #[test]
    fn failed_query_uses_fallback() {
        let _lock = serial();
        let port = ScriptedPort::new().refuse_raw_mode();
        let mut query = EscapeQuery::new();
        let caps = detect_capabilities(
            &hints("dumb", ""),
            Some(ImageProtocol::Iterm2),
            &port,
            &mut query,
            Duration::from_millis(10),
        );
        assert_eq!(choose_protocol(caps, ImageProtocol::Iterm2), ImageProtocol::Iterm2);
    }

    #[test]
    fn capabilities_display() {
        let caps = Capabilities {
            kitty: true,
            iterm2: false,
            sixel: false,
        };
        assert_eq!(caps.to_string(), "Iterm: false, Kitty: true, Sixel: false");
    }
}
