use image::{imageops::FilterType, DynamicImage, GenericImageView};

const SAMPLE_SIZE: usize = 32;
const LOW_FREQ: usize = 8;

/// Compute a 64-bit perceptual hash of `img`.
///
/// Downsamples to a `32x32` luminance grid, runs a 2-D DCT-II, takes the
/// top-left `8x8` low-frequency block, and sets one bit per coefficient
/// based on whether it is above the median of that block (excluding the
/// DC term, which dominates the scale and would otherwise skew it).
pub fn compute(img: &DynamicImage) -> u64 {
    let small = img.resize_exact(SAMPLE_SIZE as u32, SAMPLE_SIZE as u32, FilterType::Lanczos3);
    let grid = luminance_grid(&small);
    let spectrum = dct_2d(&grid);
    let block = low_frequency_block(&spectrum);
    let median = median_excluding_dc(&block);

    let mut hash: u64 = 0;
    for (i, value) in block.iter().enumerate() {
        if *value > median {
            hash |= 1 << i;
        }
    }
    hash
}

pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn luminance_grid(img: &DynamicImage) -> Vec<Vec<f64>> {
    let mut grid = vec![vec![0.0; SAMPLE_SIZE]; SAMPLE_SIZE];
    for y in 0..SAMPLE_SIZE as u32 {
        for x in 0..SAMPLE_SIZE as u32 {
            let px = img.get_pixel(x, y);
            let [r, g, b, _] = px.0;
            let lum = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            grid[y as usize][x as usize] = lum;
        }
    }
    grid
}

/// Naive 2-D DCT-II: a row pass followed by a column pass. `32x32` is small
/// enough that the O(n^3) approach is not worth optimizing.
fn dct_2d(grid: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = grid.len();
    let mut rows = vec![vec![0.0; n]; n];
    for (y, row) in grid.iter().enumerate() {
        rows[y] = dct_1d(row);
    }
    let mut cols_then_rows = vec![vec![0.0; n]; n];
    for x in 0..n {
        let column: Vec<f64> = (0..n).map(|y| rows[y][x]).collect();
        let transformed = dct_1d(&column);
        for (y, value) in transformed.into_iter().enumerate() {
            cols_then_rows[y][x] = value;
        }
    }
    cols_then_rows
}

fn dct_1d(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    let mut out = vec![0.0; n];
    for (k, slot) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (i, value) in input.iter().enumerate() {
            sum += value * ((std::f64::consts::PI / n as f64) * (i as f64 + 0.5) * k as f64).cos();
        }
        *slot = sum;
    }
    out
}

fn low_frequency_block(spectrum: &[Vec<f64>]) -> Vec<f64> {
    let mut block = Vec::with_capacity(LOW_FREQ * LOW_FREQ);
    for row in spectrum.iter().take(LOW_FREQ) {
        block.extend(row.iter().take(LOW_FREQ));
    }
    block
}

fn median_excluding_dc(block: &[f64]) -> f64 {
    let mut rest: Vec<f64> = block[1..].to_vec();
    rest.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = rest.len() / 2;
    if rest.len() % 2 == 0 {
        (rest[mid - 1] + rest[mid]) / 2.0
    } else {
        rest[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(color: [u8; 4]) -> DynamicImage {
        let img = RgbaImage::from_pixel(64, 64, Rgba(color));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn hash_is_symmetric_under_hamming_distance() {
        let a = compute(&solid([10, 20, 30, 255]));
        let b = compute(&solid([200, 100, 50, 255]));
        assert_eq!(hamming(a, b), hamming(b, a));
    }

    #[test]
    fn identical_images_hash_identically() {
        let a = compute(&solid([128, 128, 128, 255]));
        let b = compute(&solid([128, 128, 128, 255]));
        assert_eq!(hamming(a, b), 0);
    }
}
