//! MMS image preparation
//!
//! The gateway only accepts small JPEG attachments: images are flattened
//! onto white, downscaled to fit the size ceiling and re-encoded.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

pub const MAX_WIDTH: u32 = 1500;
pub const MAX_HEIGHT: u32 = 1440;
pub const MAX_FILENAME_LEN: usize = 40;

/// JPEG quality for MMS attachments
const JPEG_QUALITY: u8 = 85;

/// Decode, flatten and downscale an image, returning JPEG bytes
pub fn prepare_mms_image(data: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(data)?;
    let img = fit_within(img, MAX_WIDTH, MAX_HEIGHT);
    let rgb = flatten_on_white(&img);

    let mut buffer = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buffer), JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(buffer)
}

/// Downscale preserving aspect ratio; smaller images are left untouched
fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Attachment filename, truncated to the gateway limit keeping the extension
pub fn mms_filename(unix_secs: i64) -> String {
    truncate_filename(&format!("mms_{unix_secs}.jpg"))
}

pub fn truncate_filename(name: &str) -> String {
    if name.chars().count() <= MAX_FILENAME_LEN {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    let keep = MAX_FILENAME_LEN.saturating_sub(ext.chars().count());
    let stem: String = stem.chars().take(keep).collect();
    format!("{stem}{ext}")
}
