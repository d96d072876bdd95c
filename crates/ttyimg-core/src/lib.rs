#![forbid(unsafe_code)]

//! Core: terminal geometry resolution, size units, and image centering.
//!
//! The pieces, leaves first:
//!
//! - [`port`]: the seam to the controlling terminal ([`port::TerminalPort`]).
//! - [`raw_mode`]: scoped raw-mode acquisition with guaranteed release.
//! - [`escape_query`]: one escape-sequence round trip, bounded by a timeout.
//! - [`probe`] / [`window_manager`] / [`foreground_window`]: the ordered
//!   geometry strategies.
//! - [`geometry`]: the resolved [`geometry::ScreenSize`] and the chain that
//!   produces it.
//! - [`dimension`]: user size specifications resolved against a screen.
//! - [`centering`]: pixel offsets turned into cell offsets.

pub mod centering;
pub mod dimension;
pub mod error;
pub mod escape_query;
pub mod foreground_window;
pub mod geometry;
pub mod port;
pub mod probe;
pub mod raw_mode;
#[cfg(unix)]
pub mod window_manager;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use centering::center;
pub use dimension::{Axis, Dimension, Unit};
pub use error::{DimensionError, ProbeError, ScaleError};
pub use escape_query::EscapeQuery;
pub use geometry::{FallbackSpec, GeometryResolver, Resolution, Scale, ScreenSize};
pub use port::{KernelWindowSize, TerminalPort, TtyPort};
pub use probe::{Extent, GeometryProbe, ProbeSource};
pub use raw_mode::RawModeSession;
