//! Stamps the app mark onto generated images before non-premium downloads.
//!
//! Text is rasterized from 8x8 bitmap glyphs scaled up to the target font
//! size, over a translucent backing box in the bottom-right corner.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::ImageError;
use crate::imaging::encode_jpeg;

const MARK_TEXT: &str = "HomeCanvas";
const EDGE_INSET: i32 = 20;
const BOX_COLOR: Rgba<u8> = Rgba([0, 0, 0, 153]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 242]);

/// Returns a watermarked copy encoded as JPEG.
pub fn stamp_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut rgba = image.to_rgba8();
    stamp(&mut rgba);
    encode_jpeg(&DynamicImage::ImageRgba8(rgba), quality)
}

/// Draws the mark in place. Images too small to fit the text are left alone.
pub fn stamp(image: &mut RgbaImage) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let font_size = (width as f32 * 0.04).max(24.0) as i32;
    let glyph_scale = ((font_size as f32 / 8.0).round() as i32).max(1);
    let text_width = MARK_TEXT.chars().count() as i32 * 8 * glyph_scale;

    let x = width - text_width - EDGE_INSET;
    let baseline = height - EDGE_INSET;
    if x < 0 || baseline - font_size < 0 {
        return;
    }

    fill_rect(
        image,
        x - 10,
        baseline - font_size - 5,
        text_width + 20,
        font_size + 15,
        BOX_COLOR,
    );
    draw_text(image, x, baseline - font_size, glyph_scale, TEXT_COLOR);
}

fn blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f32::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f32::from(d) * inv + f32::from(s) * a).round() as u8;
    Rgba([
        mix(dst[0], src[0]),
        mix(dst[1], src[1]),
        mix(dst[2], src[2]),
        255,
    ])
}

fn fill_rect(image: &mut RgbaImage, x: i32, y: i32, w: i32, h: i32, color: Rgba<u8>) {
    let (img_w, img_h) = (image.width() as i32, image.height() as i32);
    for py in y.max(0)..(y + h).min(img_h) {
        for px in x.max(0)..(x + w).min(img_w) {
            let dst = *image.get_pixel(px as u32, py as u32);
            image.put_pixel(px as u32, py as u32, blend(dst, color));
        }
    }
}

fn draw_text(image: &mut RgbaImage, x: i32, y: i32, scale: i32, color: Rgba<u8>) {
    let (img_w, img_h) = (image.width() as i32, image.height() as i32);
    let mut cursor_x = x;
    for ch in MARK_TEXT.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8 * scale;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale;
                let py = y + row_idx as i32 * scale;
                for sy in 0..scale {
                    for sx in 0..scale {
                        let (tx, ty) = (px + sx, py + sy);
                        if tx >= 0 && ty >= 0 && tx < img_w && ty < img_h {
                            let dst = *image.get_pixel(tx as u32, ty as u32);
                            image.put_pixel(tx as u32, ty as u32, blend(dst, color));
                        }
                    }
                }
            }
        }
        cursor_x += 8 * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn stamp_darkens_bottom_right_corner() {
        let mut img = white_image(800, 600);
        stamp(&mut img);

        // The backing box must have dimmed at least part of the corner.
        let corner = img
            .enumerate_pixels()
            .filter(|(x, y, _)| *x > 400 && *y > 500)
            .any(|(_, _, p)| p[0] < 255);
        assert!(corner);

        // Top-left quadrant stays untouched.
        assert_eq!(*img.get_pixel(10, 10), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn stamp_preserves_dimensions() {
        let mut img = white_image(640, 480);
        stamp(&mut img);
        assert_eq!((img.width(), img.height()), (640, 480));
    }

    #[test]
    fn stamp_skips_images_too_small_for_the_mark() {
        let mut img = white_image(40, 20);
        let before = img.clone();
        stamp(&mut img);
        assert_eq!(img, before);
    }

    #[test]
    fn stamp_jpeg_produces_valid_jpeg() {
        let img = DynamicImage::ImageRgba8(white_image(400, 300));
        let bytes = stamp_jpeg(&img, 90).expect("encode");
        assert_eq!(
            image::guess_format(&bytes).expect("format"),
            image::ImageFormat::Jpeg
        );
    }
}
