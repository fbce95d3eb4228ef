use image::DynamicImage;
use tracing::warn;

use crate::phash;
use crate::watermark;

/// Outcome of checking an image against the block list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDecision {
    Allowed,
    Blocked { phash: u64 },
}

/// Check a decoded image against the caller-supplied blocked set. The
/// caller (the pipeline) owns the Store lookup; this function is pure
/// given a candidate hash.
pub fn check(img: &DynamicImage, is_blocked: impl FnOnce(u64) -> bool) -> BlockDecision {
    let hash = phash::compute(img);
    if is_blocked(hash) {
        BlockDecision::Blocked { phash: hash }
    } else {
        BlockDecision::Allowed
    }
}

pub fn phash_of(img: &DynamicImage) -> u64 {
    phash::compute(img)
}

pub fn hamming(a: u64, b: u64) -> u32 {
    phash::hamming(a, b)
}

/// Render a watermark if a font is available at `font_path`; on any
/// failure (missing font, bad font, empty text) the original image is
/// returned unchanged and a warning is logged — watermarking never fails
/// the dispatch.
pub fn watermark_if_configured(img: &DynamicImage, text: &str, font_path: &str) -> DynamicImage {
    if text.trim().is_empty() {
        return img.clone();
    }
    match watermark::load_font(font_path) {
        Some(bytes) => watermark::apply(img, text, &bytes),
        None => {
            warn!(font_path, "watermark skipped, original image dispatched");
            img.clone()
        }
    }
}

/// Encode `img` as JPEG at quality 95.
pub fn encode_jpeg(img: &DynamicImage) -> crate::error::Result<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 95);
    img.write_with_encoder(encoder)?;
    Ok(buf.into_inner())
}
