//! Portable-map encoding: page image → raw PPM/PGM for the DjVu compressor.
//!
//! ## Why PNM at all?
//!
//! `c44` does not read JPEG or PNG; it reads portable pixmaps. Each page is
//! therefore decoded with the `image` crate and re-emitted as a raw `P6`
//! (color) or `P5` (grayscale) file: a short text header followed by
//! unpadded row-major samples. These files are huge — the caller deletes
//! them the moment compression finishes.
//!
//! ## Alpha handling
//!
//! PNM has no alpha channel, so transparent pages are composited over an
//! opaque white background — the common case for book scans — with
//!
//! ```text
//! result = (alpha * src + (255 - alpha) * 255) / 255
//! ```
//!
//! in the unsigned 8-bit domain, division truncating toward zero. The
//! arithmetic is bit-exact and applied independently per channel; only the
//! sample offsets below decide which bytes are read, never the blend
//! itself.

use crate::error::DjvuPressError;
use image::DynamicImage;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

// Logical sample offsets within one RGBA pixel as decoded by `image`.
const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;
const ALPHA: usize = 3;

/// The background color transparent samples are composited onto.
const BACKGROUND: u8 = 255;

/// Which portable-map variant an image encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortableMapFormat {
    /// `P6` pixmap: 3 bytes per pixel.
    Color,
    /// `P5` graymap: 1 byte per pixel.
    Gray,
}

impl PortableMapFormat {
    /// The conventional file extension for this variant.
    pub fn extension(&self) -> &'static str {
        match self {
            PortableMapFormat::Color => "ppm",
            PortableMapFormat::Gray => "pgm",
        }
    }

    /// The magic tag line opening the file.
    fn tag(&self) -> &'static [u8] {
        match self {
            PortableMapFormat::Color => b"P6\n",
            PortableMapFormat::Gray => b"P5\n",
        }
    }
}

/// Decode `image_path` and write it to `dest` as a portable map.
///
/// Reports which variant was written so the caller can rename the file to
/// the matching extension — the extension cannot be known until the pixel
/// layout has been inspected.
pub fn encode_file(
    image_path: &Path,
    dest: &Path,
    comment: &str,
) -> Result<PortableMapFormat, DjvuPressError> {
    let img = image::open(image_path).map_err(|e| DjvuPressError::ImageDecode {
        path: image_path.to_path_buf(),
        detail: e.to_string(),
    })?;
    encode_image(&img, dest, comment).map_err(|e| match e {
        // Attribute the unsupported layout to the source image, not to the
        // destination the caller picked.
        DjvuPressError::UnsupportedImage { .. } => DjvuPressError::UnsupportedImage {
            path: image_path.to_path_buf(),
        },
        other => other,
    })
}

/// Write a decoded image to `dest` as a portable map.
///
/// Only 8-bit RGB, RGBA and grayscale layouts are supported; anything else
/// (16-bit, grayscale+alpha, float) is rejected without producing a usable
/// file.
pub fn encode_image(
    img: &DynamicImage,
    dest: &Path,
    comment: &str,
) -> Result<PortableMapFormat, DjvuPressError> {
    let format = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => PortableMapFormat::Color,
        DynamicImage::ImageLuma8(_) => PortableMapFormat::Gray,
        _ => {
            return Err(DjvuPressError::UnsupportedImage {
                path: dest.to_path_buf(),
            })
        }
    };

    let file = std::fs::File::create(dest).map_err(|e| DjvuPressError::io(dest, e))?;
    let mut out = BufWriter::new(file);
    let io_err = |e| DjvuPressError::io(dest, e);

    // Header: tag, comment, dimensions, maximum sample value.
    out.write_all(format.tag()).map_err(io_err)?;
    writeln!(out, "# {comment}").map_err(io_err)?;
    writeln!(out, "{} {}", img.width(), img.height()).map_err(io_err)?;
    out.write_all(b"255\n").map_err(io_err)?;

    match img {
        DynamicImage::ImageRgb8(buf) => {
            // Already interleaved RGB triplets; write as is.
            out.write_all(buf.as_raw()).map_err(io_err)?;
        }
        DynamicImage::ImageRgba8(buf) => {
            for px in buf.as_raw().chunks_exact(4) {
                let alpha = px[ALPHA];
                out.write_all(&[
                    alpha_blend(px[RED], alpha, BACKGROUND),
                    alpha_blend(px[GREEN], alpha, BACKGROUND),
                    alpha_blend(px[BLUE], alpha, BACKGROUND),
                ])
                .map_err(io_err)?;
            }
        }
        DynamicImage::ImageLuma8(buf) => {
            out.write_all(buf.as_raw()).map_err(io_err)?;
        }
        _ => unreachable!("format dispatch rejected other layouts"),
    }

    out.flush().map_err(io_err)?;
    debug!(
        "Encoded {}x{} {} map to {}",
        img.width(),
        img.height(),
        format.extension(),
        dest.display()
    );
    Ok(format)
}

/// Blend one sample over a background color by its alpha, in the 8-bit
/// unsigned domain.
pub fn alpha_blend(src: u8, alpha: u8, bg: u8) -> u8 {
    let (src, alpha, bg) = (u32::from(src), u32::from(alpha), u32::from(bg));
    ((alpha * src + (255 - alpha) * bg) / 255) as u8
}
