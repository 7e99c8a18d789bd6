//! Image detection and JPEG re-encoding.
//!
//! The converter consumes entry bytes and produces JPEG bytes; it never
//! touches the filesystem. Entries that are already JPEG are copied without
//! re-encoding (avoids generation loss), GIFs are copied as-is so animation
//! survives, and anything else that looks like an image is decoded and
//! re-encoded. HEIC and AVIF are recognized as images but need a system
//! libheif to decode; those entries surface as `ConvertError` and take the
//! per-entry skip path.

use std::io::Cursor;
use std::path::Path;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Extensions treated as image entries during scanning.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "tiff", "tif", "bmp", "avif",
];

/// Per-entry conversion failure. Recovered locally by the pipeline: the entry
/// is recorded as skipped and the job continues.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode jpeg: {0}")]
    Encode(#[source] image::ImageError),
}

/// Outcome of handling one image entry.
#[derive(Debug)]
pub enum Converted {
    /// Entry copied unchanged (already JPEG, or a GIF kept for animation).
    CopiedAsIs,
    /// Entry re-encoded; `jpeg` holds the new bytes.
    ToJpeg { jpeg: Vec<u8>, original_format: String },
}

#[derive(Debug, Clone)]
pub struct ImageConverter {
    jpeg_quality: u8,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageConverter {
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_quality(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    /// Whether an entry name looks like an image we handle.
    pub fn is_image(name: &str) -> bool {
        extension_of(name)
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Whether the entry keeps its bytes (and name) untouched.
    fn copies_as_is(name: &str) -> bool {
        matches!(
            extension_of(name).as_deref(),
            Some("jpg") | Some("jpeg") | Some("gif")
        )
    }

    /// Handle one image entry.
    ///
    /// `name` is the archive entry name, used for the copy-as-is decision and
    /// error context; `bytes` is the full entry content. The actual format is
    /// sniffed from the bytes, not trusted from the extension.
    pub fn convert(&self, name: &str, bytes: &[u8]) -> Result<Converted, ConvertError> {
        if Self::copies_as_is(name) {
            return Ok(Converted::CopiedAsIs);
        }

        let format = image::guess_format(bytes).map_err(ConvertError::Decode)?;
        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(ConvertError::Decode)?;
        let img = flatten_alpha(img);

        let mut jpeg = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), self.jpeg_quality);
        img.write_with_encoder(encoder)
            .map_err(ConvertError::Encode)?;

        Ok(Converted::ToJpeg {
            jpeg,
            original_format: format!("{format:?}").to_uppercase(),
        })
    }
}

/// Composite transparent images onto a white background; JPEG has no alpha.
fn flatten_alpha(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }
    let mut white = image::RgbaImage::from_pixel(
        img.width(),
        img.height(),
        image::Rgba([255, 255, 255, 255]),
    );
    image::imageops::overlay(&mut white, &img.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(white).to_rgb8().into()
}

/// Lowercased extension of an entry name, if any.
fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Rewrite an entry name for its converted form: same path, `.jpg` extension.
pub(crate) fn jpeg_entry_name(name: &str) -> String {
    let mut path = Path::new(name).to_path_buf();
    path.set_extension("jpg");
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn detects_images_by_extension_case_insensitively() {
        assert!(ImageConverter::is_image("IMG_0001.HEIC"));
        assert!(ImageConverter::is_image("photo.png"));
        assert!(ImageConverter::is_image("dir/photo.Tif"));
        assert!(!ImageConverter::is_image("notes.txt"));
        assert!(!ImageConverter::is_image("archive.zip"));
        assert!(!ImageConverter::is_image("no_extension"));
    }

    #[test]
    fn default_converter_matches_new() {
        assert_eq!(
            ImageConverter::default().jpeg_quality,
            ImageConverter::new().jpeg_quality
        );
    }

    #[test]
    fn jpeg_and_gif_copy_as_is() {
        let converter = ImageConverter::new();
        // Content is irrelevant for copy-as-is entries.
        assert!(matches!(
            converter.convert("a.JPG", b"anything").unwrap(),
            Converted::CopiedAsIs
        ));
        assert!(matches!(
            converter.convert("b.gif", b"anything").unwrap(),
            Converted::CopiedAsIs
        ));
    }

    #[test]
    fn png_converts_to_jpeg() {
        let converter = ImageConverter::new();
        let out = converter.convert("pic.png", &png_bytes(8, 6)).unwrap();
        match out {
            Converted::ToJpeg {
                jpeg,
                original_format,
            } => {
                assert_eq!(original_format, "PNG");
                let decoded = image::load_from_memory(&jpeg).unwrap();
                assert_eq!((decoded.width(), decoded.height()), (8, 6));
                assert_eq!(
                    image::guess_format(&jpeg).unwrap(),
                    image::ImageFormat::Jpeg
                );
            }
            other => panic!("expected conversion, got {other:?}"),
        }
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let rgba =
            image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 0]));
        let flattened = flatten_alpha(DynamicImage::ImageRgba8(rgba));
        let rgb = flattened.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let converter = ImageConverter::new();
        let err = converter
            .convert("broken.png", b"this is not an image")
            .unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }

    #[test]
    fn converted_entry_names_get_jpg_extension() {
        assert_eq!(jpeg_entry_name("a/b/photo.heic"), "a/b/photo.jpg");
        assert_eq!(jpeg_entry_name("photo.webp"), "photo.jpg");
    }
}
