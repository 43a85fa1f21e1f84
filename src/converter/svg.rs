//! SVG conversion: vector PDF via svg2pdf, raster output via resvg.

use super::raster::{check_raster_size, encode};
use super::{run_blocking, ConversionCapability};
use crate::error::ConversionError;
use crate::format::{Format, MediaKind};
use crate::job::ConversionOptions;
use async_trait::async_trait;
use resvg::tiny_skia;
use tracing::info;

/// SVG converter.
///
/// PDF output keeps complete vector graphics (no rasterization). Raster
/// targets are rendered with resvg at the document's own size, multiplied by
/// the optional `scale` hint, then encoded like any other raster image.
pub struct SvgConverter;

impl SvgConverter {
    /// Creates a new converter with default options.
    pub fn new() -> Self {
        Self
    }

    /// Parses SVG bytes into a usvg tree with non-empty dimensions.
    fn parse(svg: &[u8]) -> Result<usvg::Tree, ConversionError> {
        let tree = usvg::Tree::from_data(svg, &usvg::Options::default())
            .map_err(|e| ConversionError::CorruptInput(format!("failed to parse SVG content: {}", e)))?;

        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(ConversionError::CorruptInput(format!(
                "invalid SVG dimensions: {}x{}",
                size.width(),
                size.height()
            )));
        }

        info!(
            "SVG parsed successfully: {}x{} units",
            size.width(),
            size.height()
        );
        Ok(tree)
    }

    fn to_pdf(tree: &usvg::Tree) -> Vec<u8> {
        let pdf_data = svg2pdf::to_pdf(
            tree,
            svg2pdf::ConversionOptions::default(),
            svg2pdf::PageOptions::default(),
        );
        info!("PDF export complete (VECTOR): {} bytes", pdf_data.len());
        pdf_data
    }

    fn rasterize(tree: &usvg::Tree, scale: f32) -> Result<image::DynamicImage, ConversionError> {
        let size = tree.size();
        // Float to int casts saturate, so an overflowing scale still fails the check.
        let width = (size.width() * scale).ceil() as u64;
        let height = (size.height() * scale).ceil() as u64;
        check_raster_size(width, height)?;

        let mut pixmap = tiny_skia::Pixmap::new(width as u32, height as u32).ok_or_else(|| {
            ConversionError::ConversionFailure(format!("cannot allocate {}x{} canvas", width, height))
        })?;
        resvg::render(
            tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        let png = pixmap
            .encode_png()
            .map_err(|e| ConversionError::ConversionFailure(format!("PNG encoding failed: {}", e)))?;
        image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| ConversionError::ConversionFailure(e.to_string()))
    }
}

impl Default for SvgConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversionCapability for SvgConverter {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn detect_format(&self, bytes: &[u8]) -> Option<Format> {
        let head = &bytes[..bytes.len().min(1024)];
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
            Some(Format::SVG)
        } else {
            None
        }
    }

    fn accepts(&self, from: Format, to: Format) -> bool {
        from == Format::SVG && (to == Format::PDF || to.kind() == MediaKind::Image)
    }

    async fn convert(
        &self,
        input: Vec<u8>,
        _from: Format,
        to: Format,
        options: ConversionOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        run_blocking(move || {
            let tree = SvgConverter::parse(&input)?;
            if to == Format::PDF {
                return Ok(SvgConverter::to_pdf(&tree));
            }

            let scale = options.parse::<f32>("scale")?.unwrap_or(1.0);
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ConversionError::ConversionFailure(format!(
                    "scale must be a positive number, got {}",
                    scale
                )));
            }
            let img = SvgConverter::rasterize(&tree, scale)?;
            encode(img, to, &options)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
            <rect x="10" y="10" width="80" height="80" fill="blue"/>
        </svg>"#;

    #[tokio::test]
    async fn test_convert_simple_svg_to_pdf() {
        let converter = SvgConverter::new();

        let pdf = converter
            .convert(
                SQUARE.as_bytes().to_vec(),
                Format::SVG,
                Format::PDF,
                ConversionOptions::new(),
            )
            .await
            .unwrap();

        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_rasterize_to_png_with_scale() {
        let converter = SvgConverter::new();
        let options = ConversionOptions::new().with("scale", "2");

        let png = converter
            .convert(SQUARE.as_bytes().to_vec(), Format::SVG, Format::PNG, options)
            .await
            .unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 200));
    }

    #[tokio::test]
    async fn test_oversized_raster_output_is_rejected() {
        let converter = SvgConverter::new();

        let upscaled = converter
            .convert(
                SQUARE.as_bytes().to_vec(),
                Format::SVG,
                Format::PNG,
                ConversionOptions::new().with("resolution", "60000x60000"),
            )
            .await;
        let scaled = converter
            .convert(
                SQUARE.as_bytes().to_vec(),
                Format::SVG,
                Format::PNG,
                ConversionOptions::new().with("scale", "1000"),
            )
            .await;

        assert!(matches!(upscaled, Err(ConversionError::ConversionFailure(_))));
        assert!(matches!(scaled, Err(ConversionError::ConversionFailure(_))));
    }

    #[tokio::test]
    async fn test_invalid_svg() {
        let converter = SvgConverter::new();

        let result = converter
            .convert(
                b"not an svg".to_vec(),
                Format::SVG,
                Format::PDF,
                ConversionOptions::new(),
            )
            .await;

        assert!(matches!(result, Err(ConversionError::CorruptInput(_))));
    }

    #[tokio::test]
    async fn test_zero_dimensions() {
        let converter = SvgConverter::new();
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="0" height="0"></svg>"#;

        let result = converter
            .convert(
                svg.as_bytes().to_vec(),
                Format::SVG,
                Format::PDF,
                ConversionOptions::new(),
            )
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_detect_format() {
        let converter = SvgConverter::new();
        assert_eq!(converter.detect_format(SQUARE.as_bytes()), Some(Format::SVG));
        assert_eq!(
            converter.detect_format(b"<?xml version=\"1.0\"?>\n<svg></svg>"),
            Some(Format::SVG)
        );
        assert_eq!(converter.detect_format(b"<html></html>"), None);
    }

    #[test]
    fn test_accepts() {
        let converter = SvgConverter::new();
        assert!(converter.accepts(Format::SVG, Format::PDF));
        assert!(converter.accepts(Format::SVG, Format::JPEG));
        assert!(!converter.accepts(Format::SVG, Format::MP4));
        assert!(!converter.accepts(Format::PNG, Format::PDF));
    }
}
