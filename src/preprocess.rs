//! Frame preprocessing: color knock-out and binary threshold.
use image::{GrayImage, Luma, RgbImage};

// Fixed-point BT.601 weights, same as OpenCV's BGR2GRAY (sum == 1 << 14)
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const WEIGHT_SHIFT: u32 = 14;

/// Value written for samples above the threshold.
pub const WHITE: u8 = 255;
/// Value written for samples at or below the threshold.
pub const BLACK: u8 = 0;

/// Convert an RGB frame to a single intensity channel.
pub fn to_luma(frame: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(frame.width(), frame.height());

    for (src, dst) in frame.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        *dst = Luma([luma(r, g, b)]);
    }

    gray
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT;
    ((weighted + (1 << (WEIGHT_SHIFT - 1))) >> WEIGHT_SHIFT) as u8
}

/// Binary threshold in place. Samples strictly greater than `threshold`
/// become [`WHITE`], everything else becomes [`BLACK`].
pub fn threshold(frame: &mut GrayImage, threshold: u8) {
    for pixel in frame.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { WHITE } else { BLACK };
    }
}

/// Grayscale then threshold.
pub fn binarize(frame: &RgbImage, cutoff: u8) -> GrayImage {
    let mut gray = to_luma(frame);
    threshold(&mut gray, cutoff);
    gray
}

/// Sum of every sample in the frame.
pub fn pixel_sum(frame: &GrayImage) -> u64 {
    frame.as_raw().iter().map(|&v| v as u64).sum()
}
