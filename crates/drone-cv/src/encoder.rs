//! JPEG encoding of annotated frames

use crate::{CvError, CvResult};
use bytes::Bytes;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

/// Encode an RGB image as JPEG; `quality` is clamped to 1-100
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> CvResult<Bytes> {
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
    encoder
        .encode_image(image)
        .map_err(|e| CvError::encoding(e.to_string()))?;
    Ok(Bytes::from(jpeg))
}
