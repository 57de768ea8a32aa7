//! Image canonicalisation: arbitrary JPEG/PNG → opaque RGB PNG.
//!
//! ## Why upscale small images?
//!
//! Roster screenshots from phones are often 1000–1200 px wide with 9–10 px
//! glyphs. Vision models tile the image and small glyphs end up a few pixels
//! tall inside a tile, which is where digits start getting swapped (`8`↔`3`,
//! `0`↔`6`). Doubling anything narrower than [`MIN_WIDTH`] with a bicubic
//! filter gives the model larger, smoother glyphs without inventing detail.
//!
//! ## Why flatten to RGB?
//!
//! Transparent PNG screenshots composite against black in some decoders and
//! white in others. Dropping alpha up front makes the pixels the model sees
//! independent of who decodes them.
//!
//! ## Why spawn_blocking?
//!
//! Decoding, resampling and PNG compression of a 3000 px image take tens of
//! milliseconds of pure CPU. [`prepare_png_async`] moves that onto Tokio's
//! blocking pool so the worker threads keep serving other requests.

use crate::error::RosterError;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::{debug, info};

/// Images narrower than this are upscaled.
pub const MIN_WIDTH: u32 = 1500;
/// Integer upscale factor applied to both dimensions.
pub const SCALE_FACTOR: u32 = 2;

/// Canonicalise raw image bytes into PNG bytes for the vision model.
///
/// Already-canonical input (PNG, at least [`MIN_WIDTH`] wide, 8-bit opaque
/// RGB) is returned unchanged. Everything else is flattened to RGB, upscaled
/// by [`SCALE_FACTOR`] if too narrow, and re-encoded as PNG.
///
/// Deterministic for a given input and `image` crate version.
pub fn prepare_png(bytes: &[u8]) -> Result<Vec<u8>, RosterError> {
    let format = image::guess_format(bytes).ok();
    let img = image::load_from_memory(bytes).map_err(|e| RosterError::InvalidImage {
        detail: e.to_string(),
    })?;

    let (width, height) = (img.width(), img.height());
    debug!(
        "Decoded {:?} image: {}x{} px, {:?}",
        format,
        width,
        height,
        img.color()
    );

    // The PNG decoder expands palette and low-bit-depth images to RGB8, so
    // the decoded colour type alone does not prove the file is truecolour.
    if format == Some(ImageFormat::Png)
        && width >= MIN_WIDTH
        && img.color() == ColorType::Rgb8
        && is_truecolor_png(bytes)
    {
        debug!("Image already canonical, passing through");
        return Ok(bytes.to_vec());
    }

    let rgb = img.to_rgb8();
    let canonical = if width < MIN_WIDTH {
        let (target_w, target_h) = scaled_dimensions(width, height)?;
        info!(
            "Upscaling {}x{} → {}x{} px (bicubic)",
            width, height, target_w, target_h
        );
        imageops::resize(&rgb, target_w, target_h, FilterType::CatmullRom)
    } else {
        rgb
    };

    encode_png(DynamicImage::ImageRgb8(canonical))
}

/// Async wrapper running [`prepare_png`] on the blocking pool.
pub async fn prepare_png_async(bytes: Vec<u8>) -> Result<Vec<u8>, RosterError> {
    tokio::task::spawn_blocking(move || prepare_png(&bytes))
        .await
        .map_err(|e| RosterError::Internal(format!("Preprocess task panicked: {}", e)))?
}

/// Whether the PNG header declares 8-bit RGB without a palette.
fn is_truecolor_png(bytes: &[u8]) -> bool {
    match png::Decoder::new(bytes).read_info() {
        Ok(reader) => {
            let info = reader.info();
            info.color_type == png::ColorType::Rgb && info.bit_depth == png::BitDepth::Eight
        }
        Err(_) => false,
    }
}

fn scaled_dimensions(width: u32, height: u32) -> Result<(u32, u32), RosterError> {
    match (
        width.checked_mul(SCALE_FACTOR),
        height.checked_mul(SCALE_FACTOR),
    ) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(RosterError::EncodeError {
            detail: format!("upscaled dimensions overflow for {width}x{height} px"),
        }),
    }
}

fn encode_png(img: DynamicImage) -> Result<Vec<u8>, RosterError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| RosterError::EncodeError {
            detail: e.to_string(),
        })?;
    debug!("Encoded canonical PNG: {} bytes", buf.len());
    Ok(buf)
}
