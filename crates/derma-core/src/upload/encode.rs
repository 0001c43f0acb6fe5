use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use tracing::debug;

use crate::api::UploadError;

/// A JPEG ready to upload
#[derive(Clone, PartialEq, Eq)]
pub struct JpegImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl JpegImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for JpegImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpegImage")
            .field("bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Encode an image as JPEG at `quality` (1-100). Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<JpegImage, UploadError> {
    if !(1..=100).contains(&quality) {
        return Err(UploadError::Encode(format!("quality {} out of range 1-100", quality)));
    }

    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(UploadError::Encode("image has no pixels".to_string()));
    }

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode(
        rgb.as_raw(),
        width,
        height,
        ColorType::Rgb8,
    )?;

    debug!(width, height, quality, bytes = bytes.len(), "Encoded JPEG");
    Ok(JpegImage { bytes, width, height })
}

/// Decode any supported image file and re-encode it as JPEG
pub fn load_jpeg(path: &Path, quality: u8) -> Result<JpegImage, UploadError> {
    let image = image::open(path)
        .map_err(|e| UploadError::Encode(format!("{}: {}", path.display(), e)))?;
    encode_jpeg(&image, quality)
}
