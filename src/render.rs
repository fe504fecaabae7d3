use std::sync::Arc;

use resvg::{tiny_skia, usvg};
use tracing::debug;

use crate::error::PipelineError;

/// Turns SVG bytes into PNG bytes.
pub trait ImageConverter {
    fn to_raster_image(&self, svg: &[u8]) -> Result<Vec<u8>, PipelineError>;
}

/// `resvg`-backed rasterizer.
pub struct SvgRasterizer {
    scale: f32,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgRasterizer {
    pub fn new(scale: f32, load_system_fonts: bool) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        if load_system_fonts {
            fontdb.load_system_fonts();
            debug!("loaded {} font faces", fontdb.len());
        }
        Self {
            scale,
            fontdb: Arc::new(fontdb),
        }
    }
}

impl Default for SvgRasterizer {
    fn default() -> Self {
        Self::new(1.0, false)
    }
}

impl ImageConverter for SvgRasterizer {
    fn to_raster_image(&self, svg: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_data(svg, &options)
            .map_err(|e| PipelineError::Conversion(e.to_string()))?;

        let size = tree.size();
        let width = scaled_dimension(size.width(), self.scale)?;
        let height = scaled_dimension(size.height(), self.scale)?;
        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            PipelineError::Conversion(format!("cannot allocate {width}x{height} canvas"))
        })?;

        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(self.scale, self.scale),
            &mut pixmap.as_mut(),
        );

        let png = pixmap
            .encode_png()
            .map_err(|e| PipelineError::Conversion(e.to_string()))?;
        debug!(
            "converted svg ({} bytes) to {width}x{height} png ({} bytes)",
            svg.len(),
            png.len()
        );
        Ok(png)
    }
}

/// Largest output edge, in pixels.
const MAX_DIMENSION: u32 = 16_384;

fn scaled_dimension(length: f32, scale: f32) -> Result<u32, PipelineError> {
    let scaled = (length * scale).ceil();
    if !scaled.is_finite() || scaled < 1.0 || scaled > MAX_DIMENSION as f32 {
        return Err(PipelineError::Conversion(format!(
            "scaled size {length} x {scale} is outside 1..={MAX_DIMENSION} px"
        )));
    }
    Ok(scaled as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    const SVG: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="16"><rect width="32" height="16" fill="#d5d7e1"/></svg>"##;

    fn png_dimensions(png: &[u8]) -> (u32, u32) {
        // IHDR is the first chunk: width and height follow the 8-byte magic and 8-byte chunk header.
        let w = u32::from_be_bytes(png[16..20].try_into().unwrap());
        let h = u32::from_be_bytes(png[20..24].try_into().unwrap());
        (w, h)
    }

    #[test]
    fn renders_png() {
        let png = SvgRasterizer::default().to_raster_image(SVG).unwrap();
        assert!(png.starts_with(PNG_MAGIC));
        assert_eq!(png_dimensions(&png), (32, 16));
    }

    #[test]
    fn scale_applies_to_output() {
        let png = SvgRasterizer::new(10.0, false).to_raster_image(SVG).unwrap();
        assert_eq!(png_dimensions(&png), (320, 160));
    }

    #[test]
    fn malformed_svg_is_conversion_error() {
        let err = SvgRasterizer::default()
            .to_raster_image(b"<svg><rect")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conversion(_)));
    }

    #[test]
    fn non_svg_is_conversion_error() {
        let err = SvgRasterizer::default()
            .to_raster_image(b"\x89PNG not an svg")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conversion(_)));
    }

    #[test]
    fn oversized_scale_is_conversion_error() {
        let err = SvgRasterizer::new(1e9, false).to_raster_image(SVG).unwrap_err();
        assert!(
            matches!(&err, PipelineError::Conversion(msg)
                if msg.contains("16384") && !msg.contains("4294967295")),
            "{err:?}"
        );
    }

    #[test]
    fn scaled_dimension_bounds() {
        assert_eq!(scaled_dimension(32.0, 1.5).unwrap(), 48);
        assert_eq!(scaled_dimension(10.2, 1.0).unwrap(), 11);
        assert!(scaled_dimension(f32::MAX, 2.0).is_err());
        assert!(scaled_dimension(20_000.0, 1.0).is_err());
    }
}
