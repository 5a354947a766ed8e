use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageFormat, RgbaImage};

// ============================================================================
// FORMATS
// ============================================================================

/// Formats the edited image can be exported as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    /// Lossless WebP; the quality setting is ignored.
    Webp,
}

impl ExportFormat {
    pub fn all() -> &'static [ExportFormat] {
        &[ExportFormat::Png, ExportFormat::Jpeg, ExportFormat::Webp]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Webp => "image/webp",
        }
    }

    /// Whether the quality setting changes the output.
    pub fn is_lossy(&self) -> bool {
        matches!(self, ExportFormat::Jpeg)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "webp" => Some(ExportFormat::Webp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_name)
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            ExportFormat::Png => ImageFormat::Png,
            ExportFormat::Jpeg => ImageFormat::Jpeg,
            ExportFormat::Webp => ImageFormat::WebP,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for decoding and encoding images.
#[derive(Debug)]
pub enum ImageIoError {
    Io(std::io::Error),
    Image(image::ImageError),
    UnsupportedFormat(String),
}

impl std::fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageIoError::Io(e) => write!(f, "I/O error: {}", e),
            ImageIoError::Image(e) => write!(f, "Image error: {}", e),
            ImageIoError::UnsupportedFormat(e) => write!(f, "Unsupported format: {}", e),
        }
    }
}

impl std::error::Error for ImageIoError {}

impl From<std::io::Error> for ImageIoError {
    fn from(e: std::io::Error) -> Self {
        ImageIoError::Io(e)
    }
}

impl From<image::ImageError> for ImageIoError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(u) => ImageIoError::UnsupportedFormat(u.to_string()),
            image::ImageError::IoError(io) => ImageIoError::Io(io),
            other => ImageIoError::Image(other),
        }
    }
}

// ============================================================================
// DECODE
// ============================================================================

/// Decode an encoded image blob (format sniffed from the bytes) to RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageIoError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Read and decode an image file.
pub fn load_image_file(path: &Path) -> Result<RgbaImage, ImageIoError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

// ============================================================================
// ENCODE
// ============================================================================

/// Encode to `format`. `quality` (1–100) applies to lossy formats.
pub fn encode_image(image: &RgbaImage, format: ExportFormat, quality: u8) -> Result<Vec<u8>, ImageIoError> {
    let mut out = Vec::new();
    write_encoded(image, &mut out, format, quality)?;
    Ok(out)
}

/// Encode and write to `path`.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: ExportFormat, quality: u8) -> Result<(), ImageIoError> {
    let bytes = encode_image(image, format, quality)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn write_encoded(image: &RgbaImage, out: &mut Vec<u8>, format: ExportFormat, quality: u8) -> Result<(), ImageIoError> {
    let quality = quality.clamp(1, 100);
    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut *out).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        ExportFormat::Jpeg => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut *out, quality);
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        ExportFormat::Webp => {
            let mut cursor = Cursor::new(&mut *out);
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut cursor, format.image_format())?;
        }
    }
    Ok(())
}

/// Copy the image to the OS clipboard.
pub fn copy_to_system_clipboard(image: &RgbaImage) -> Result<(), String> {
    let mut clipboard = arboard::Clipboard::new().map_err(|e| format!("Clipboard unavailable: {}", e))?;
    clipboard
        .set_image(arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: Cow::Borrowed(image.as_raw()),
        })
        .map_err(|e| format!("Failed to copy image: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(16, 8, |x, y| Rgba([(x * 16) as u8, (y * 32) as u8, 90, 255]))
    }

    #[test]
    fn png_is_lossless() {
        let img = sample();
        let bytes = encode_image(&img, ExportFormat::Png, 75).expect("png encode");
        assert_eq!(decode_image(&bytes).expect("png decode"), img);
    }

    #[test]
    fn jpeg_decodes_to_same_size() {
        let bytes = encode_image(&sample(), ExportFormat::Jpeg, 40).expect("jpeg encode");
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
        assert_eq!(decode_image(&bytes).expect("jpeg decode").dimensions(), (16, 8));
    }

    #[test]
    fn format_lookup() {
        assert_eq!(ExportFormat::from_name("JPEG"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_path(Path::new("out/pic.webp")), Some(ExportFormat::Webp));
        assert_eq!(ExportFormat::from_name("gif"), None);
        assert_eq!(ExportFormat::from_name("avif"), None);
        assert_eq!(ExportFormat::Webp.mime_type(), "image/webp");
    }

    #[test]
    fn only_jpeg_takes_quality() {
        let lossy: Vec<ExportFormat> = ExportFormat::all().iter().copied().filter(|f| f.is_lossy()).collect();
        assert_eq!(lossy, vec![ExportFormat::Jpeg]);
    }

    #[test]
    fn webp_is_lossless() {
        let img = sample();
        let bytes = encode_image(&img, ExportFormat::Webp, 10).expect("webp encode");
        assert_eq!(&bytes[8..12], b"WEBP");
        assert_eq!(decode_image(&bytes).expect("webp decode"), img);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn write_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.png");
        encode_and_write(&sample(), &path, ExportFormat::Png, 100).expect("write");
        assert_eq!(load_image_file(&path).expect("read").dimensions(), (16, 8));
    }
}
