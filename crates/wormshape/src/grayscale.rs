//! Frame decoding.
//!
//! The detector itself works on an already decoded [`GrayImage`]; this
//! helper turns encoded bytes (PNG, JPEG, BMP, WebP) into one for the
//! command line and for tests.

use image::GrayImage;

use crate::types::InputError;

/// Decode raw image bytes and convert to grayscale.
///
/// Color frames are reduced with the standard luminance weights.
///
/// # Errors
///
/// Returns [`InputError::EmptyInput`] if `bytes` is empty and
/// [`InputError::ImageDecode`] if the format is unrecognized or the data
/// is corrupt.
pub fn decode_frame(bytes: &[u8]) -> Result<GrayImage, InputError> {
    if bytes.is_empty() {
        return Err(InputError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?.to_luma8())
}
