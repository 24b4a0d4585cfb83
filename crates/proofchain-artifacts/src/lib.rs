#![warn(missing_docs)]
//! # proofchain-artifacts
//!
//! ## Purpose
//! Derives shareable proof artifacts from an anchored verification.
//!
//! ## Responsibilities
//! - Encode an explorer link as a deterministic PNG QR code.
//! - Compose the fixed-layout certificate raster from hash and QR code.
//!
//! ## Data flow
//! Explorer link -> [`encode`] -> [`EncodedImage`].
//! Hash + [`EncodedImage`] -> [`render_certificate`] -> [`CertificateImage`].
//!
//! ## Ownership and lifetimes
//! Both derivations are pure: inputs are borrowed, outputs own their bytes.
//!
//! ## Error model
//! Encoding, decoding, and layout failures return [`ArtifactError`]. A
//! certificate is never produced without its code.

use std::io::Cursor;

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use proofchain_core::{CertificateImage, EncodedImage};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;
use tracing::debug;

/// Suggested file name for downloaded certificates.
pub const CERTIFICATE_FILE_NAME: &str = "ProofChain-Certificate.png";
/// Certificate canvas width in pixels.
pub const CERTIFICATE_WIDTH: u32 = 800;
/// Certificate canvas height in pixels.
pub const CERTIFICATE_HEIGHT: u32 = 1000;
/// Certificate heading.
pub const CERTIFICATE_TITLE: &str = "ProofChain Verification Certificate";
/// Label printed above the hash.
pub const CERTIFICATE_HASH_LABEL: &str = "Document Hash:";
/// Attribution printed below the code.
pub const CERTIFICATE_FOOTER: &str = "Verified on Sui Blockchain - ProofChain";

/// Top-left corner and edge length of the code on the certificate.
pub const CERTIFICATE_CODE_X: u32 = 50;
/// See [`CERTIFICATE_CODE_X`].
pub const CERTIFICATE_CODE_Y: u32 = 250;
/// See [`CERTIFICATE_CODE_X`].
pub const CERTIFICATE_CODE_SIZE: u32 = 260;

const BACKGROUND: Rgba<u8> = Rgba([0x0A, 0x19, 0x2F, 0xFF]);
const ACCENT: Rgba<u8> = Rgba([0x24, 0xFF, 0x8A, 0xFF]);
const TEXT: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);

const MARGIN_X: u32 = 50;
const TITLE_Y: u32 = 56;
const LABEL_Y: u32 = 144;
const HASH_Y: u32 = 174;
const FOOTER_Y: u32 = 544;
const GLYPH_SIZE: u32 = 8;

/// Error-correction tolerance of the scannable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCorrection {
    /// ~7% damage tolerance.
    Low,
    /// ~15% damage tolerance.
    Medium,
    /// ~25% damage tolerance.
    Quartile,
    /// ~30% damage tolerance.
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

/// Rendering options for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Error-correction level.
    pub error_correction: ErrorCorrection,
    /// Quiet-zone width in modules.
    pub margin: u32,
    /// Target edge length in pixels. Modules are drawn at the largest whole
    /// pixel size that fits, so the output edge may be slightly smaller.
    pub pixel_size: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::High,
            margin: 1,
            pixel_size: 400,
        }
    }
}

/// Encodes `link` as a grayscale PNG QR code.
///
/// Identical `link` and `options` always yield identical bytes.
///
/// # Errors
/// Returns [`ArtifactError::EmptyPayload`] for a blank link,
/// [`ArtifactError::Encode`] when the payload does not fit a QR code or PNG
/// encoding fails.
pub fn encode(link: &str, options: &EncodeOptions) -> Result<EncodedImage, ArtifactError> {
    if link.trim().is_empty() {
        return Err(ArtifactError::EmptyPayload);
    }

    let code = QrCode::with_error_correction_level(link.as_bytes(), options.error_correction.into())
        .map_err(|error| ArtifactError::Encode(error.to_string()))?;

    let modules = code.width() as u32;
    let total_modules = modules + options.margin * 2;
    let module_px = (options.pixel_size / total_modules).max(1);
    let edge = total_modules * module_px;

    let mut bitmap = GrayImage::from_pixel(edge, edge, Luma([0xFF]));
    for (index, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }

        let index = index as u32;
        let left = (index % modules + options.margin) * module_px;
        let top = (index / modules + options.margin) * module_px;
        for y in top..top + module_px {
            for x in left..left + module_px {
                bitmap.put_pixel(x, y, Luma([0x00]));
            }
        }
    }

    let png = encode_png(DynamicImage::ImageLuma8(bitmap))?;
    debug!(stage = "artifacts", action = "encode", modules, edge, "encoded scannable code");
    Ok(EncodedImage::from_png(png))
}

/// Composes the certificate raster.
///
/// The code is decoded before anything is drawn; an undecodable code fails
/// the whole render.
///
/// # Errors
/// Returns [`ArtifactError::Decode`] when `code` is not a valid image,
/// [`ArtifactError::HashTooLong`] when the hash cannot fit above the code, and
/// [`ArtifactError::Encode`] when PNG encoding fails.
pub fn render_certificate(
    hash: &str,
    code: &EncodedImage,
) -> Result<CertificateImage, ArtifactError> {
    let decoded = image::load_from_memory_with_format(code.png(), ImageFormat::Png)
        .map_err(|error| ArtifactError::Decode(error.to_string()))?;

    let (hash_scale, hash_lines) = layout_hash(hash)?;

    let mut canvas = RgbaImage::from_pixel(CERTIFICATE_WIDTH, CERTIFICATE_HEIGHT, BACKGROUND);
    draw_text(&mut canvas, CERTIFICATE_TITLE, MARGIN_X, TITLE_Y, 2, ACCENT);
    draw_text(&mut canvas, CERTIFICATE_HASH_LABEL, MARGIN_X, LABEL_Y, 2, TEXT);

    let line_height = GLYPH_SIZE * hash_scale + 4;
    for (row, line) in hash_lines.iter().enumerate() {
        let y = HASH_Y + row as u32 * line_height;
        draw_text(&mut canvas, line, MARGIN_X, y, hash_scale, TEXT);
    }

    let scaled = imageops::resize(
        &decoded.to_rgba8(),
        CERTIFICATE_CODE_SIZE,
        CERTIFICATE_CODE_SIZE,
        FilterType::Nearest,
    );
    imageops::overlay(
        &mut canvas,
        &scaled,
        i64::from(CERTIFICATE_CODE_X),
        i64::from(CERTIFICATE_CODE_Y),
    );

    draw_text(&mut canvas, CERTIFICATE_FOOTER, MARGIN_X, FOOTER_Y, 2, ACCENT);

    let png = encode_png(DynamicImage::ImageRgba8(canvas))?;
    debug!(
        stage = "artifacts",
        action = "render_certificate",
        bytes = png.len(),
        "rendered certificate"
    );
    Ok(CertificateImage {
        width: CERTIFICATE_WIDTH,
        height: CERTIFICATE_HEIGHT,
        png,
    })
}

// Picks the largest glyph scale whose wrapped lines end above the code.
fn layout_hash(hash: &str) -> Result<(u32, Vec<String>), ArtifactError> {
    let usable_width = CERTIFICATE_WIDTH - MARGIN_X * 2;
    let chars: Vec<char> = hash.chars().collect();

    for scale in [2_u32, 1] {
        let per_line = (usable_width / (GLYPH_SIZE * scale)) as usize;
        let line_height = GLYPH_SIZE * scale + 4;
        let lines: Vec<String> = chars
            .chunks(per_line)
            .map(|chunk| chunk.iter().collect())
            .collect();

        let bottom = HASH_Y + lines.len() as u32 * line_height;
        if bottom <= CERTIFICATE_CODE_Y {
            return Ok((scale, lines));
        }
    }

    Err(ArtifactError::HashTooLong(chars.len()))
}

fn draw_text(canvas: &mut RgbaImage, text: &str, x: u32, y: u32, scale: u32, color: Rgba<u8>) {
    let advance = GLYPH_SIZE * scale;
    for (column, character) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(character).or_else(|| BASIC_FONTS.get('?')) else {
            continue;
        };

        let origin_x = x + column as u32 * advance;
        for (row, bits) in glyph.iter().enumerate() {
            for bit in 0..GLYPH_SIZE {
                if bits & (1 << bit) == 0 {
                    continue;
                }

                let px = origin_x + bit * scale;
                let py = y + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        if px + dx < canvas.width() && py + dy < canvas.height() {
                            canvas.put_pixel(px + dx, py + dy, color);
                        }
                    }
                }
            }
        }
    }
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, ArtifactError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|error| ArtifactError::Encode(error.to_string()))?;
    Ok(png)
}

/// Artifact generation errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Nothing to encode.
    #[error("scannable code payload is empty")]
    EmptyPayload,
    /// QR or PNG encoding failed.
    #[error("artifact encoding failed: {0}")]
    Encode(String),
    /// The scannable code could not be decoded for compositing.
    #[error("scannable code could not be decoded: {0}")]
    Decode(String),
    /// The hash does not fit the certificate layout.
    #[error("hash of {0} characters does not fit the certificate")]
    HashTooLong(usize),
}
