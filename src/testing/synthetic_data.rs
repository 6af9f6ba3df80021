//! Synthetic frames for offline tests

use crate::types::Frame;

/// RGB gradient that shifts with `sequence`, so consecutive frames differ.
pub fn synthetic_frame(sequence: u64, width: u32, height: u32) -> Frame {
    let base = (sequence % 256) as u8;
    let mut data = Vec::with_capacity((width * height * 3) as usize);

    for y in 0..height {
        for x in 0..width {
            data.push(base.wrapping_add((x % 256) as u8));
            data.push(base.wrapping_add((y % 256) as u8));
            data.push(base.wrapping_add(((x + y) % 256) as u8));
        }
    }

    Frame::from_image(
        image::RgbImage::from_raw(width, height, data)
            .unwrap_or_else(|| image::RgbImage::new(width, height)),
    )
}

/// Per-pixel xorshift noise. Nearly incompressible, so it is the hardest
/// input for encoder rate control.
pub fn noise_frame(seed: u32, width: u32, height: u32) -> Frame {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let data = (0..width * height * 3)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();

    Frame::from_image(
        image::RgbImage::from_raw(width, height, data)
            .unwrap_or_else(|| image::RgbImage::new(width, height)),
    )
}
