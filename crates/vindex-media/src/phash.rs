//! 64-bit DCT perceptual hash.
//!
//! Grayscale, downsample to 32x32, 2D DCT-II, keep the top-left 8x8
//! coefficient block and threshold against its median. Hamming distance
//! between two hashes approximates perceptual distance between the images.

use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;

use crate::error::{MediaError, MediaResult};

const DCT_SIZE: usize = 32;
const HASH_SIZE: usize = 8;

/// Hash an image file. Runs on the blocking pool; JPEG decode is CPU-bound.
pub async fn hash_file(path: &Path) -> MediaResult<u64> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::open(&path)
            .map_err(|e| MediaError::ImageDecode(format!("{}: {e}", path.display())))?;
        Ok(hash_gray(&image::imageops::grayscale(&img)))
    })
    .await
    .map_err(|e| MediaError::ImageDecode(format!("hash task failed: {e}")))?
}

/// Hash a grayscale image.
pub fn hash_gray(img: &GrayImage) -> u64 {
    let small = image::imageops::resize(
        img,
        DCT_SIZE as u32,
        DCT_SIZE as u32,
        FilterType::Triangle,
    );

    let mut pixels = [[0f64; DCT_SIZE]; DCT_SIZE];
    for (x, y, p) in small.enumerate_pixels() {
        pixels[y as usize][x as usize] = p.0[0] as f64;
    }

    let coeffs = dct_2d(&pixels);

    let mut low: Vec<f64> = Vec::with_capacity(HASH_SIZE * HASH_SIZE);
    for row in coeffs.iter().take(HASH_SIZE) {
        low.extend_from_slice(&row[..HASH_SIZE]);
    }
    let median = median(&low);

    let mut hash = 0u64;
    for (i, &c) in low.iter().enumerate() {
        if c > median {
            hash |= 1 << (63 - i);
        }
    }
    hash
}

/// Row-column separable 2D DCT-II.
fn dct_2d(input: &[[f64; DCT_SIZE]; DCT_SIZE]) -> [[f64; DCT_SIZE]; DCT_SIZE] {
    let mut rows = [[0f64; DCT_SIZE]; DCT_SIZE];
    for (y, row) in input.iter().enumerate() {
        rows[y] = dct_1d(row);
    }

    let mut out = [[0f64; DCT_SIZE]; DCT_SIZE];
    for x in 0..DCT_SIZE {
        let mut column = [0f64; DCT_SIZE];
        for y in 0..DCT_SIZE {
            column[y] = rows[y][x];
        }
        let transformed = dct_1d(&column);
        for y in 0..DCT_SIZE {
            out[y][x] = transformed[y];
        }
    }
    out
}

fn dct_1d(input: &[f64; DCT_SIZE]) -> [f64; DCT_SIZE] {
    let n = DCT_SIZE as f64;
    let mut out = [0f64; DCT_SIZE];
    for (k, slot) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (i, &x) in input.iter().enumerate() {
            sum += x * (std::f64::consts::PI / n * (i as f64 + 0.5) * k as f64).cos();
        }
        *slot = sum;
    }
    out
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Bitwise Hamming distance between two hashes.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Hex-encode a hash for storage.
pub fn phash_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Parse a stored hex hash.
pub fn parse_phash_hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient_image() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| Luma([((x + y) * 2) as u8]))
    }

    fn checkerboard_image() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_gray(&gradient_image()), hash_gray(&gradient_image()));
    }

    #[test]
    fn test_distinct_images_have_distant_hashes() {
        let a = hash_gray(&gradient_image());
        let b = hash_gray(&checkerboard_image());
        assert!(hamming_distance(a, b) > 6, "distance was {}", hamming_distance(a, b));
    }

    #[test]
    fn test_flat_images_hash_identically() {
        let white = GrayImage::from_pixel(64, 64, Luma([255]));
        let also_white = GrayImage::from_pixel(128, 128, Luma([255]));
        assert_eq!(hash_gray(&white), hash_gray(&also_white));
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0, u64::MAX), 64);
        assert_eq!(hamming_distance(0b1010, 0b0101), 4);
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = 0xdead_beef_0123_4567u64;
        assert_eq!(parse_phash_hex(&phash_hex(hash)), Some(hash));
        assert_eq!(phash_hex(5).len(), 16);
        assert_eq!(parse_phash_hex("not hex"), None);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }
}
