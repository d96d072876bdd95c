#![forbid(unsafe_code)]

//! Graphics protocol encoders.
//!
//! | Protocol | Payload | Framing |
//! |----------|---------|---------|
//! | kitty | base64 PNG, 4096-byte chunks | `ESC _ G a=T,f=100,m=<more> ; <chunk> ESC \` |
//! | iTerm2 | base64 PNG | `ESC ] 1337 ; File=inline=1;size=<n> : <data> BEL` |
//! | sixel | palette-quantized pixels | DCS sixel string |

use std::io::{Cursor, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};

use crate::error::ImageError;
use crate::protocol::ImageProtocol;

const KITTY_CHUNK_SIZE: usize = 4096;

/// Write `image` to `out` using `protocol`.
///
/// # Errors
///
/// [`ImageError::Encode`] or [`ImageError::Sixel`] if the payload cannot be
/// produced, [`ImageError::Io`] if writing fails.
pub fn write_image<W: Write + ?Sized>(
    out: &mut W,
    image: &DynamicImage,
    protocol: ImageProtocol,
) -> Result<(), ImageError> {
    match protocol {
        ImageProtocol::Kitty => {
            for chunk in encode_kitty_png(&png_bytes(image)?) {
                out.write_all(chunk.as_bytes())?;
            }
        }
        ImageProtocol::Iterm2 => {
            out.write_all(encode_iterm2_png(&png_bytes(image)?).as_bytes())?;
        }
        ImageProtocol::Sixel => {
            out.write_all(encode_sixel(image)?.as_bytes())?;
        }
    }
    Ok(())
}

/// PNG-encode `image`.
pub fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(ImageError::Encode)?;
    Ok(out.into_inner())
}

/// Encode PNG payload as kitty graphics protocol escape sequences.
#[must_use]
pub fn encode_kitty_png(png_bytes: &[u8]) -> Vec<String> {
    let encoded = STANDARD.encode(png_bytes);
    let mut chunks = Vec::new();
    let mut offset = 0usize;
    let mut first = true;

    while offset < encoded.len() {
        let end = (offset + KITTY_CHUNK_SIZE).min(encoded.len());
        let chunk = &encoded[offset..end];
        let more = u8::from(end < encoded.len());
        let metadata = if first { "a=T,f=100," } else { "" };
        chunks.push(format!("\x1b_G{metadata}m={more};{chunk}\x1b\\"));
        offset = end;
        first = false;
    }

    if chunks.is_empty() {
        chunks.push("\x1b_Ga=T,f=100,m=0;\x1b\\".to_string());
    }

    chunks
}

/// Encode PNG payload as an iTerm2 inline image escape sequence.
#[must_use]
pub fn encode_iterm2_png(png_bytes: &[u8]) -> String {
    let payload = STANDARD.encode(png_bytes);
    format!(
        "\x1b]1337;File=inline=1;size={}:{payload}\x07",
        png_bytes.len()
    )
}

/// Encode `image` as a sixel string.
pub fn encode_sixel(image: &DynamicImage) -> Result<String, ImageError> {
    let rgba = image.to_rgba8();
    let width = i32::try_from(rgba.width()).map_err(|e| ImageError::Sixel(e.to_string()))?;
    let height = i32::try_from(rgba.height()).map_err(|e| ImageError::Sixel(e.to_string()))?;
    icy_sixel::sixel_string(
        rgba.as_raw(),
        width,
        height,
        icy_sixel::PixelFormat::RGBA8888,
        icy_sixel::DiffusionMethod::Stucki,
        icy_sixel::MethodForLargest::Auto,
        icy_sixel::MethodForRep::Auto,
        icy_sixel::Quality::HIGH,
    )
    .map_err(|e| ImageError::Sixel(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn tiny() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([10, 200, 10, 255])))
    }

    #[test]
    fn kitty_chunks_include_metadata_once() {
        let payload = vec![0u8; 8000];
        let encoded = encode_kitty_png(&payload);
        assert!(encoded.len() > 1);
        assert!(encoded[0].starts_with("\x1b_Ga=T,f=100,m=1;"));
        for chunk in &encoded[1..encoded.len() - 1] {
            assert!(chunk.starts_with("\x1b_Gm=1;"));
        }
        let last = encoded.last().unwrap();
        assert!(last.starts_with("\x1b_Gm=0;"));
        assert!(encoded.iter().all(|c| c.ends_with("\x1b\\")));
    }

    #[test]
    fn kitty_single_chunk() {
        let encoded = encode_kitty_png(b"abc");
        assert_eq!(encoded, vec!["\x1b_Ga=T,f=100,m=0;YWJj\x1b\\".to_string()]);
    }

    #[test]
    fn kitty_empty_payload_still_terminates() {
        assert_eq!(encode_kitty_png(&[]), vec!["\x1b_Ga=T,f=100,m=0;\x1b\\".to_string()]);
    }

    #[test]
    fn iterm2_frame() {
        assert_eq!(
            encode_iterm2_png(b"abc"),
            "\x1b]1337;File=inline=1;size=3:YWJj\x07"
        );
    }

    #[test]
    fn png_bytes_have_signature() {
        let png = png_bytes(&tiny()).unwrap();
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn write_image_kitty_and_iterm() {
        let mut out = Vec::new();
        write_image(&mut out, &tiny(), ImageProtocol::Kitty).unwrap();
        assert!(out.starts_with(b"\x1b_Ga=T,f=100,"));

        let mut out = Vec::new();
        write_image(&mut out, &tiny(), ImageProtocol::Iterm2).unwrap();
        assert!(out.starts_with(b"\x1b]1337;File=inline=1;size="));
        assert_eq!(out.last(), Some(&0x07));
    }

    #[test]
    fn sixel_is_a_dcs_string() {
        let sixel = encode_sixel(&tiny()).unwrap();
        assert!(sixel.starts_with("\x1bP"), "{sixel:?}");
        assert!(sixel.ends_with("\x1b\\"), "{sixel:?}");
    }
}
