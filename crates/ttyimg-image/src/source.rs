#![forbid(unsafe_code)]

//! Turning a path into pixels.
//!
//! Raster images are decoded directly and SVGs are rasterized. Office
//! documents and PDFs are first rendered to PNG by a headless LibreOffice,
//! optionally through the [`DocumentCache`].

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::{DynamicImage, ImageReader};

use crate::cache::DocumentCache;
use crate::error::ImageError;
use crate::svg;

/// Name fragments that mark a document needing conversion.
const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".xls", ".doc", ".ppt", ".ods", ".odp", ".odg", ".odt",
];

/// Office executables, tried in order.
const OFFICE_BACKENDS: &[&str] = &["libreoffice", "soffice"];

/// Whether `path` is a document rendered through LibreOffice.
///
/// Matches anywhere in the name, so `report.docx` and `sheet.xlsx` count.
#[must_use]
pub fn is_document(path: &Path) -> bool {
    let name = path.to_string_lossy().to_ascii_lowercase();
    DOCUMENT_EXTENSIONS.iter().any(|ext| name.contains(ext))
}

/// Load and decode the image at `path`, converting documents first.
///
/// `target` is the requested pixel box (0 meaning unconstrained); only SVGs
/// use it, to pick their canvas size.
///
/// # Errors
///
/// Any [`ImageError`] from opening, converting, or decoding. Cache failures
/// are not errors: the document is converted uncached instead.
pub fn load(
    path: &Path,
    cache: Option<&DocumentCache>,
    target: (u32, u32),
) -> Result<DynamicImage, ImageError> {
    if is_document(path) {
        load_document(path, cache)
    } else if svg::is_svg(path) {
        let data = std::fs::read(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        svg::rasterize(&data, svg::canvas_side(target.0, target.1))
    } else {
        decode_file(path)
    }
}

/// Decode a raster file; the format is sniffed from its content, falling
/// back to the extension.
pub fn decode_file(path: &Path) -> Result<DynamicImage, ImageError> {
    let open_err = |source: io::Error| ImageError::Open {
        path: path.to_path_buf(),
        source,
    };
    let reader = ImageReader::open(path)
        .map_err(open_err)?
        .with_guessed_format()
        .map_err(open_err)?;
    Ok(reader.decode()?)
}

fn load_document(path: &Path, cache: Option<&DocumentCache>) -> Result<DynamicImage, ImageError> {
    let key = cache.and_then(|_| match DocumentCache::key(path) {
        Ok(key) => Some(key),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(path = %path.display(), error = %_err, "document cache key unavailable");
            None
        }
    });

    if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
        if let Some(image) = cache.get(key) {
            #[cfg(feature = "tracing")]
            tracing::debug!(path = %path.display(), key, "document cache hit");
            return Ok(image);
        }
    }

    let image = convert_document(path)?;

    if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
        if let Err(_err) = cache.put(key, &image) {
            #[cfg(feature = "tracing")]
            tracing::warn!(path = %path.display(), error = %_err, "document cache write failed");
        }
    }
    Ok(image)
}

/// Render the first page of a document to an image with LibreOffice.
///
/// # Errors
///
/// [`ImageError::NoOfficeBackend`] if no office executable can be started,
/// [`ImageError::Conversion`] if it fails or produces nothing.
pub fn convert_document(path: &Path) -> Result<DynamicImage, ImageError> {
    let outdir = tempfile::tempdir()?;
    run_office(path, outdir.path())?;

    let produced = converted_path(path, outdir.path()).ok_or_else(|| ImageError::Conversion {
        path: path.to_path_buf(),
        reason: "document has no file name".into(),
    })?;
    if !produced.exists() {
        return Err(ImageError::Conversion {
            path: path.to_path_buf(),
            reason: format!("no output at {}", produced.display()),
        });
    }
    decode_file(&produced)
}

fn run_office(path: &Path, outdir: &Path) -> Result<(), ImageError> {
    for backend in OFFICE_BACKENDS {
        let status = Command::new(backend)
            .arg("--headless")
            .args(["--convert-to", "png"])
            .arg(path)
            .arg("--outdir")
            .arg(outdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(backend, path = %path.display(), "document converted");
                return Ok(());
            }
            Ok(status) => {
                return Err(ImageError::Conversion {
                    path: path.to_path_buf(),
                    reason: format!("{backend} exited with {status}"),
                });
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(ImageError::Io(err)),
        }
    }
    Err(ImageError::NoOfficeBackend)
}

/// Where LibreOffice puts the PNG for `path`: `<outdir>/<stem>.png`.
fn converted_path(path: &Path, outdir: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".png");
    Some(outdir.join(name))
}
