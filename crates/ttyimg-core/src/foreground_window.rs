#![forbid(unsafe_code)]

//! Pixel size of the foreground window on Windows.
//!
//! The client rectangle of the foreground window (normally the terminal
//! the user just typed into), less the frame that `AdjustWindowRectEx`
//! reports for the window's style.

use crate::error::ProbeError;
use crate::probe::Extent;

/// Width and height of a rectangle given as its edges.
#[must_use]
pub const fn rect_size(left: i32, top: i32, right: i32, bottom: i32) -> (i64, i64) {
    (right as i64 - left as i64, bottom as i64 - top as i64)
}

/// Client size with the frame size taken off each axis.
///
/// # Errors
///
/// [`ProbeError::EmptyExtent`] when nothing positive is left.
pub fn client_minus_frame(client: (i64, i64), frame: (i64, i64)) -> Result<Extent, ProbeError> {
    let width = u32::try_from(client.0 - frame.0).unwrap_or(0);
    let height = u32::try_from(client.1 - frame.1).unwrap_or(0);
    let extent = Extent::new(width, height);
    if extent.is_positive() {
        Ok(extent)
    } else {
        Err(ProbeError::EmptyExtent)
    }
}

#[cfg(windows)]
pub use self::win32::ForegroundWindowProbe;

#[cfg(windows)]
mod win32 {
    use std::io;

    use winsafe::{self as w, co, prelude::*};

    use super::{client_minus_frame, rect_size};
    use crate::error::ProbeError;
    use crate::probe::{Extent, GeometryProbe, ProbeContext, ProbeSource};

    /// `GetForegroundWindow` + `GetClientRect` + `AdjustWindowRectEx`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ForegroundWindowProbe;

    fn win_err(err: co::ERROR) -> ProbeError {
        ProbeError::Io(io::Error::other(err.to_string()))
    }

    impl GeometryProbe for ForegroundWindowProbe {
        fn source(&self) -> ProbeSource {
            ProbeSource::ForegroundWindow
        }

        fn measure(&self, _cx: &mut ProbeContext<'_>) -> Result<Extent, ProbeError> {
            let hwnd = w::HWND::GetForegroundWindow()
                .ok_or(ProbeError::Unsupported("no foreground window"))?;
            let client = hwnd.GetClientRect().map_err(win_err)?;
            let info = hwnd.GetWindowInfo().map_err(win_err)?;
            let frame =
                w::AdjustWindowRectEx(w::RECT::default(), info.dwStyle, false, co::WS_EX::NoValue)
                    .map_err(win_err)?;

            client_minus_frame(
                rect_size(client.left, client.top, client.right, client.bottom),
                rect_size(frame.left, frame.top, frame.right, frame.bottom),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_taken_off_both_axes() {
        let client = rect_size(0, 0, 1280, 720);
        // A typical overlapped-window frame: 8 px sides, 31 px caption.
        let frame = rect_size(-8, -31, 8, 8);
        assert_eq!(frame, (16, 39));
        assert_eq!(client_minus_frame(client, frame).unwrap(), Extent::new(1264, 681));
    }

    #[test]
    fn frameless_window_keeps_client_size() {
        let client = rect_size(0, 0, 800, 600);
        assert_eq!(client_minus_frame(client, (0, 0)).unwrap(), Extent::new(800, 600));
    }

    #[test]
    fn frame_larger_than_client_is_empty() {
        assert!(matches!(
            client_minus_frame((10, 300), (16, 39)),
            Err(ProbeError::EmptyExtent)
        ));
        assert!(matches!(
            client_minus_frame((0, 0), (0, 0)),
            Err(ProbeError::EmptyExtent)
        ));
    }

    #[test]
    fn extreme_edges_do_not_overflow() {
        let side = i64::from(u32::MAX);
        assert_eq!(rect_size(i32::MIN, i32::MIN, i32::MAX, i32::MAX), (side, side));
    }
}
