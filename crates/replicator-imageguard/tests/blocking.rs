use image::{DynamicImage, Rgba, RgbaImage};
use replicator_imageguard::{check, hamming, phash_of, BlockDecision};

fn checkerboard(seed: u8) -> DynamicImage {
    let mut img = RgbaImage::new(64, 64);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let on = (x / 8 + y / 8 + seed as u32) % 2 == 0;
        *pixel = if on { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) };
    }
    DynamicImage::ImageRgba8(img)
}

#[test]
fn image_within_threshold_is_blocked() {
    let reference = phash_of(&checkerboard(0));
    // Flip a handful of bits to simulate a near-duplicate within threshold.
    let near_duplicate = reference ^ 0b111;

    let decision = check(&checkerboard(0), |candidate| hamming(candidate, near_duplicate) <= 5);
    assert!(matches!(decision, BlockDecision::Blocked { .. }));
}

#[test]
fn image_outside_threshold_is_allowed() {
    let reference = phash_of(&checkerboard(0));
    let far_hash = !reference;

    let decision = check(&checkerboard(0), |candidate| hamming(candidate, far_hash) <= 5);
    assert_eq!(decision, BlockDecision::Allowed);
}

#[test]
fn watermark_with_missing_font_path_leaves_image_unchanged() {
    use replicator_imageguard::watermark_if_configured;

    let img = checkerboard(1);
    let out = watermark_if_configured(&img, "SAMPLE", "/nonexistent/font.ttf");
    assert_eq!(out.to_rgba8().into_raw(), img.to_rgba8().into_raw());
}
