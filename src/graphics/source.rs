use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};

/// Geometry of the generated test image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpec {
    pub width: u32,
    pub height: u32,
    pub marker_x: u32,
    pub marker_y: u32,
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec {
            width: 300,
            height: 200,
            marker_x: 10,
            marker_y: 10,
        }
    }
}

/// Encode a transparent canvas with one opaque white marker pixel.
///
/// A marker outside the canvas is silently skipped.
pub fn source_png(spec: SourceSpec) -> Result<Vec<u8>> {
    if spec.width == 0 || spec.height == 0 {
        return Err(eyre!(
            "source image must be non-empty, got {}x{}",
            spec.width,
            spec.height
        ));
    }

    let mut canvas = RgbaImage::new(spec.width, spec.height);
    if spec.marker_x < spec.width && spec.marker_y < spec.height {
        canvas.put_pixel(spec.marker_x, spec.marker_y, Rgba([255, 255, 255, 255]));
    }

    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::Adaptive)
        .write_image(
            canvas.as_raw(),
            spec.width,
            spec.height,
            ExtendedColorType::Rgba8,
        )
        .wrap_err("failed to encode source image")?;
    Ok(out)
}

pub fn load_png(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .wrap_err_with(|| format!("failed to read image {}", path.display()))?;
    match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => Ok(bytes),
        Ok(other) => Err(eyre!("{} is {other:?}, expected PNG", path.display())),
        Err(e) => Err(eyre!("{} is not a recognised image: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn default_source_is_png() {
        let bytes = source_png(SourceSpec::default()).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn marker_pixel_is_white_and_rest_transparent() {
        let bytes = source_png(SourceSpec::default()).unwrap();
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .into_rgba8();
        assert_eq!(img.dimensions(), (300, 200));
        assert_eq!(img.get_pixel(10, 10), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(299, 199), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn marker_outside_canvas_is_skipped() {
        let spec = SourceSpec {
            width: 4,
            height: 4,
            marker_x: 40,
            marker_y: 1,
        };
        let bytes = source_png(spec).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().into_rgba8();
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn empty_canvas_is_rejected() {
        let spec = SourceSpec {
            width: 0,
            ..SourceSpec::default()
        };
        assert!(source_png(spec).is_err());
    }

    #[test]
    fn load_png_rejects_non_png() {
        let temp = std::env::temp_dir().join("leakprobe_test_not_png.bin");
        std::fs::write(&temp, b"definitely not an image").unwrap();
        assert!(load_png(&temp).is_err());
        let _ = std::fs::remove_file(&temp);
    }

    #[test]
    fn load_png_reads_encoded_file() {
        let temp = std::env::temp_dir().join("leakprobe_test_source.png");
        let bytes = source_png(SourceSpec::default()).unwrap();
        std::fs::write(&temp, &bytes).unwrap();
        assert_eq!(load_png(&temp).unwrap(), bytes);
        let _ = std::fs::remove_file(&temp);
    }

    #[test]
    fn load_png_missing_file_errors() {
        assert!(load_png(Path::new("/nonexistent/leakprobe.png")).is_err());
    }
}
