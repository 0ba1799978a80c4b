//! Local image plumbing: upload validation, thumbnails, recompression, and
//! data-URL conversions. Everything round-trips through the `image` crate;
//! payloads on the wire are base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::config::MAX_UPLOAD_BYTES;
use crate::error::ImageError;

pub mod watermark;

const SUPPORTED_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Checks an upload before any decoding: size cap first, then format sniff.
pub fn validate_upload(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ImageError::TooLarge);
    }
    let format = image::guess_format(bytes).map_err(|_| ImageError::UnsupportedFormat)?;
    if SUPPORTED_FORMATS.contains(&format) {
        Ok(format)
    } else {
        Err(ImageError::UnsupportedFormat)
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    Ok(image::load_from_memory(bytes)?)
}

fn mime_str(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn to_data_url(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", mime_str(format), BASE64.encode(bytes))
}

/// The base64 payload of a data URL, without the `data:...;base64,` prefix.
pub fn data_url_payload(url: &str) -> Result<&str, ImageError> {
    url.split_once(',')
        .map(|(_, payload)| payload)
        .ok_or(ImageError::MalformedDataUrl)
}

pub fn decode_data_url(url: &str) -> Result<DynamicImage, ImageError> {
    let bytes = BASE64.decode(data_url_payload(url)?)?;
    decode(&bytes)
}

/// Accepts either a bare base64 payload or a full data URL.
pub fn decode_base64_image(input: &str) -> Result<DynamicImage, ImageError> {
    let payload = if input.starts_with("data:") {
        data_url_payload(input)?
    } else {
        input
    };
    let bytes = BASE64.decode(payload)?;
    decode(&bytes)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
    image.to_rgb8().write_with_encoder(encoder)?;
    Ok(out)
}

pub fn jpeg_data_url(image: &DynamicImage, quality: u8) -> Result<String, ImageError> {
    Ok(to_data_url(&encode_jpeg(image, quality)?, ImageFormat::Jpeg))
}

/// Square cover-crop preview for the history strip.
pub fn thumbnail(image: &DynamicImage, size: u32) -> DynamicImage {
    image.resize_to_fill(size, size, FilterType::Triangle)
}

pub fn thumbnail_data_url(image: &DynamicImage, size: u32) -> Result<String, ImageError> {
    jpeg_data_url(&thumbnail(image, size), 70)
}

/// Shrinks an image to fit within `max_width` on both axes. Images already
/// small enough pass through untouched.
pub fn shrink_to_fit(image: &DynamicImage, max_width: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_width {
        image.clone()
    } else {
        image.thumbnail(max_width, max_width)
    }
}

/// Recompresses an image payload for upload: shrink, re-encode as JPEG, and
/// return the bare base64 payload the wire format wants.
pub fn compress_payload(
    input: &str,
    max_width: u32,
    quality: u8,
) -> Result<String, ImageError> {
    let image = decode_base64_image(input)?;
    let shrunk = shrink_to_fit(&image, max_width);
    Ok(BASE64.encode(encode_jpeg(&shrunk, quality)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 90, 60]),
        ));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .expect("png encode");
        out
    }

    #[test]
    fn validate_accepts_png_and_jpeg() {
        let png = png_bytes(4, 4);
        assert_eq!(validate_upload(&png).expect("png"), ImageFormat::Png);

        let img = decode(&png).expect("decode");
        let jpeg = encode_jpeg(&img, 80).expect("jpeg");
        assert_eq!(validate_upload(&jpeg).expect("jpeg"), ImageFormat::Jpeg);
    }

    #[test]
    fn validate_rejects_oversized_payload() {
        let huge = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(validate_upload(&huge), Err(ImageError::TooLarge)));
    }

    #[test]
    fn validate_rejects_unknown_bytes() {
        assert!(matches!(
            validate_upload(b"definitely not an image"),
            Err(ImageError::UnsupportedFormat)
        ));
    }

    #[test]
    fn validate_rejects_supported_decoder_but_wrong_format() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Bmp)
            .expect("bmp encode");
        assert!(matches!(
            validate_upload(&out),
            Err(ImageError::UnsupportedFormat)
        ));
    }

    #[test]
    fn data_url_round_trip() {
        let png = png_bytes(6, 3);
        let url = to_data_url(&png, ImageFormat::Png);
        assert!(url.starts_with("data:image/png;base64,"));

        let payload = data_url_payload(&url).expect("payload");
        assert_eq!(BASE64.decode(payload).expect("decode"), png);

        let decoded = decode_data_url(&url).expect("image");
        assert_eq!((decoded.width(), decoded.height()), (6, 3));
    }

    #[test]
    fn data_url_payload_rejects_plain_base64() {
        assert!(data_url_payload("AAAA").is_err());
    }

    #[test]
    fn decode_base64_image_accepts_both_forms() {
        let png = png_bytes(5, 5);
        let bare = BASE64.encode(&png);
        let url = to_data_url(&png, ImageFormat::Png);
        assert!(decode_base64_image(&bare).is_ok());
        assert!(decode_base64_image(&url).is_ok());
    }

    #[test]
    fn thumbnail_is_square_cover_crop() {
        let wide = decode(&png_bytes(300, 100)).expect("decode");
        let thumb = thumbnail(&wide, 50);
        assert_eq!((thumb.width(), thumb.height()), (50, 50));
    }

    #[test]
    fn shrink_preserves_aspect_and_skips_small_images() {
        let img = decode(&png_bytes(400, 200)).expect("decode");
        let shrunk = shrink_to_fit(&img, 200);
        assert_eq!((shrunk.width(), shrunk.height()), (200, 100));

        let small = decode(&png_bytes(100, 50)).expect("decode");
        let untouched = shrink_to_fit(&small, 200);
        assert_eq!((untouched.width(), untouched.height()), (100, 50));
    }

    #[test]
    fn compress_payload_yields_bare_base64_jpeg() {
        let png = png_bytes(300, 300);
        let url = to_data_url(&png, ImageFormat::Png);
        let compressed = compress_payload(&url, 200, 60).expect("compress");
        assert!(!compressed.contains(','));

        let bytes = BASE64.decode(&compressed).expect("decode");
        assert_eq!(
            image::guess_format(&bytes).expect("format"),
            ImageFormat::Jpeg
        );
        let img = decode(&bytes).expect("decode image");
        assert_eq!(img.width(), 200);
    }
}
