use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, Rgba};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::warn;

const SHADOW_ALPHA: u8 = 80;
const FOREGROUND_ALPHA: u8 = 100;
const SHADOW_OFFSET: i32 = 2;
const BASELINE_FRACTION: f32 = 0.60;
const MIN_FONT_SIZE: f32 = 12.0;
const FONT_WIDTH_FRACTION: f32 = 0.07;

/// Render `text` onto `img`, centered horizontally with the baseline at
/// 60% of the image height, as a drop-shadowed overlay.
///
/// Font loading or rendering failures leave `img` untouched and are
/// logged — a missing or unreadable font must never fail the dispatch.
pub fn apply(img: &DynamicImage, text: &str, font_bytes: &[u8]) -> DynamicImage {
    let font = match FontRef::try_from_slice(font_bytes) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "failed to parse watermark font, leaving image unaltered");
            return img.clone();
        }
    };

    let width = img.width();
    let height = img.height();
    let font_size = (FONT_WIDTH_FRACTION * width as f32).round().max(MIN_FONT_SIZE);
    let scale = PxScale::from(font_size);

    let (text_w, _text_h) = text_size(scale, &font, text);
    let x = ((width as i32 - text_w as i32) / 2).max(0);
    let y = (height as f32 * BASELINE_FRACTION - font_size) as i32;

    let mut out = img.to_rgba8();
    draw_text_mut(
        &mut out,
        Rgba([0, 0, 0, SHADOW_ALPHA]),
        x + SHADOW_OFFSET,
        y + SHADOW_OFFSET,
        scale,
        &font,
        text,
    );
    draw_text_mut(
        &mut out,
        Rgba([255, 255, 255, FOREGROUND_ALPHA]),
        x,
        y,
        scale,
        &font,
        text,
    );

    DynamicImage::ImageRgba8(out)
}

/// Load font bytes from `path`, falling back to `None` (and logging) on
/// any failure so the caller can skip watermarking without failing dispatch.
pub fn load_font(path: &str) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(path, error = %e, "failed to read watermark font file, skipping watermark");
            None
        }
    }
}
