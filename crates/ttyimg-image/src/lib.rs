#![forbid(unsafe_code)]

//! The image side of ttyimg: load a file (converting office documents),
//! fit it to a pixel box, and encode it for a terminal graphics protocol.

pub mod cache;
pub mod encode;
pub mod error;
pub mod protocol;
pub mod resize;
pub mod source;
pub mod svg;

pub use cache::DocumentCache;
pub use encode::write_image;
pub use error::ImageError;
pub use protocol::{
    Capabilities, DetectionHints, ImageProtocol, choose_protocol, detect_capabilities,
};
pub use resize::{ResizeMode, resize};
pub use source::load;
