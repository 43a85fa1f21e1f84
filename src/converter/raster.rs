//! Raster image conversion (png, jpg, bmp) via the `image` crate.

use super::{run_blocking, ConversionCapability};
use crate::error::ConversionError;
use crate::format::{Format, MediaKind};
use crate::job::ConversionOptions;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Largest edge of any raster image produced, in pixels.
pub(crate) const MAX_RASTER_EDGE: u64 = 16384;

/// Largest pixel count of any raster image produced (256 MiB as RGBA).
const MAX_RASTER_PIXELS: u64 = 64 * 1024 * 1024;

/// Converts between raster image formats.
///
/// Honoured hints: `quality` (JPEG, 1-100) and `resolution` (`WxH` bounding
/// box, aspect ratio preserved).
pub struct ImageConverter;

impl ImageConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversionCapability for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn detect_format(&self, bytes: &[u8]) -> Option<Format> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some(Format::PNG),
            ImageFormat::Jpeg => Some(Format::JPG),
            ImageFormat::Bmp => Some(Format::BMP),
            _ => None,
        }
    }

    fn accepts(&self, from: Format, to: Format) -> bool {
        from.kind() == MediaKind::Image && to.kind() == MediaKind::Image
    }

    async fn convert(
        &self,
        input: Vec<u8>,
        from: Format,
        to: Format,
        options: ConversionOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        run_blocking(move || {
            let img = decode(&input, from)?;
            debug!(
                from = %from,
                to = %to,
                width = img.width(),
                height = img.height(),
                "decoded raster image"
            );
            encode(img, to, &options)
        })
        .await
    }
}

fn image_format(format: Format) -> Option<ImageFormat> {
    match format.canonical() {
        "png" => Some(ImageFormat::Png),
        "jpg" => Some(ImageFormat::Jpeg),
        "bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// Decodes raster bytes, trusting the content signature over the declared format.
fn decode(bytes: &[u8], declared: Format) -> Result<DynamicImage, ConversionError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ConversionError::CorruptInput(e.to_string()))?;
    if reader.format().is_none() {
        match image_format(declared) {
            Some(format) => reader.set_format(format),
            None => return Err(ConversionError::UnsupportedFormat(declared.to_string())),
        }
    }
    reader
        .decode()
        .map_err(|e| ConversionError::CorruptInput(format!("cannot decode {} image: {}", declared, e)))
}

/// Encodes a decoded image into `to`, applying the raster option hints.
pub(crate) fn encode(
    img: DynamicImage,
    to: Format,
    options: &ConversionOptions,
) -> Result<Vec<u8>, ConversionError> {
    let img = match options.dimensions("resolution")? {
        Some((width, height)) => {
            let (fit_width, fit_height) = fitted_size(img.width(), img.height(), width, height);
            check_raster_size(fit_width, fit_height)?;
            img.resize(width, height, FilterType::Lanczos3)
        }
        None => img,
    };

    let mut out = Vec::new();
    match to.canonical() {
        "jpg" => {
            let quality = options
                .parse::<u8>("quality")?
                .unwrap_or(DEFAULT_JPEG_QUALITY);
            if !(1..=100).contains(&quality) {
                return Err(ConversionError::ConversionFailure(format!(
                    "jpeg quality must be between 1 and 100, got {}",
                    quality
                )));
            }
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(flatten_onto_white(&img));
            let encoder = JpegEncoder::new_with_quality(&mut out, quality);
            rgb.write_with_encoder(encoder).map_err(encode_failure)?;
        }
        "png" => {
            img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(encode_failure)?;
        }
        "bmp" => {
            let img = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            img.write_to(&mut Cursor::new(&mut out), ImageFormat::Bmp)
                .map_err(encode_failure)?;
        }
        _ => return Err(ConversionError::UnsupportedFormat(to.to_string())),
    }
    Ok(out)
}

/// Size of `width`x`height` scaled to fit inside `max_width`x`max_height`,
/// aspect ratio preserved, the same way `DynamicImage::resize` computes it.
fn fitted_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u64, u64) {
    let ratio = f64::min(
        max_width as f64 / width.max(1) as f64,
        max_height as f64 / height.max(1) as f64,
    );
    let fit_width = ((width as f64 * ratio).round() as u64).max(1);
    let fit_height = ((height as f64 * ratio).round() as u64).max(1);
    (fit_width, fit_height)
}

/// Rejects output sizes that would not fit the raster limits.
pub(crate) fn check_raster_size(width: u64, height: u64) -> Result<(), ConversionError> {
    if width > MAX_RASTER_EDGE
        || height > MAX_RASTER_EDGE
        || width.saturating_mul(height) > MAX_RASTER_PIXELS
    {
        return Err(ConversionError::ConversionFailure(format!(
            "output size {}x{} exceeds the raster limit ({} pixel edge, {} pixels)",
            width, height, MAX_RASTER_EDGE, MAX_RASTER_PIXELS
        )));
    }
    Ok(())
}

fn encode_failure(e: image::ImageError) -> ConversionError {
    ConversionError::ConversionFailure(format!("image encoding failed: {}", e))
}

/// Composites the image over a white background, dropping alpha.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    out
}
