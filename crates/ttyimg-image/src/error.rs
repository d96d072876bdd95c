#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

/// Errors raised while loading, converting, or encoding an image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image encode error: {0}")]
    Encode(#[source] image::ImageError),

    /// Neither `libreoffice` nor `soffice` could be started.
    #[error("can't preview documents, no supported backend is installed")]
    NoOfficeBackend,

    #[error("converting {} failed: {reason}", .path.display())]
    Conversion { path: PathBuf, reason: String },

    #[error("document cache: {0}")]
    Cache(#[source] io::Error),

    #[error("svg rendering failed: {0}")]
    Svg(String),

    #[error("sixel encoding failed: {0}")]
    Sixel(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_names_path() {
        let err = ImageError::Open {
            path: PathBuf::from("/tmp/missing.png"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.png"), "{msg}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn backend_message_is_user_facing() {
        assert_eq!(
            ImageError::NoOfficeBackend.to_string(),
            "can't preview documents, no supported backend is installed"
        );
    }
}
