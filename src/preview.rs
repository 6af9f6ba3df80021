//! Annotated preview composition
//!
//! Builds the combined preview surface shown to the operator: one tile per
//! readable camera, scaled to a common height, with a label band and a red
//! REC marker while recording. Tiles are always built from copies, so the
//! captured frames handed to the recording session stay untouched.

use image::{imageops, imageops::FilterType, Rgb, RgbImage};

use crate::types::{CameraId, Frame};

/// Height of the dark band behind each tile's label.
pub const LABEL_BAND: u32 = 14;

const BAND_COLOR: Rgb<u8> = Rgb([24, 24, 24]);
const REC_COLOR: Rgb<u8> = Rgb([220, 30, 30]);
const REC_BORDER: u32 = 3;

/// Placement of one camera inside a [`PreviewSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTile {
    pub id: CameraId,
    pub label: String,
    pub x: u32,
    pub width: u32,
    pub height: u32,
}

/// Combined preview image plus the metadata a renderer needs to overlay text.
#[derive(Debug, Clone)]
pub struct PreviewSurface {
    pub image: RgbImage,
    pub tiles: Vec<PreviewTile>,
    pub recording: bool,
}

impl PreviewSurface {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Lay the given frames side by side at `tile_height`, in iteration order.
///
/// Returns `None` when there is nothing to show.
pub fn compose<'a, I>(frames: I, tile_height: u32, recording: bool) -> Option<PreviewSurface>
where
    I: IntoIterator<Item = (CameraId, &'a str, &'a Frame)>,
{
    let tile_height = tile_height.max(LABEL_BAND * 2);

    let mut scaled = Vec::new();
    for (id, label, frame) in frames {
        let width = scaled_width(frame, tile_height);
        let image = imageops::resize(&frame.to_image(), width, tile_height, FilterType::Triangle);
        scaled.push((id, label.to_string(), image));
    }
    if scaled.is_empty() {
        return None;
    }

    let total_width: u32 = scaled.iter().map(|(_, _, img)| img.width()).sum();
    let mut canvas = RgbImage::new(total_width, tile_height);
    let mut tiles = Vec::with_capacity(scaled.len());

    let mut x = 0u32;
    for (id, label, mut image) in scaled {
        annotate(&mut image, recording);
        let width = image.width();
        imageops::replace(&mut canvas, &image, x as i64, 0);
        tiles.push(PreviewTile {
            id,
            label,
            x,
            width,
            height: tile_height,
        });
        x += width;
    }

    Some(PreviewSurface {
        image: canvas,
        tiles,
        recording,
    })
}

fn scaled_width(frame: &Frame, tile_height: u32) -> u32 {
    let (w, h) = frame.dimensions();
    ((w as u64 * tile_height as u64) / h.max(1) as u64).max(1) as u32
}

/// Label band across the top; red border and corner block while recording.
fn annotate(tile: &mut RgbImage, recording: bool) {
    let (w, h) = tile.dimensions();
    fill_rect(tile, 0, 0, w, LABEL_BAND.min(h), BAND_COLOR);

    if recording {
        fill_rect(tile, 0, 0, w, REC_BORDER, REC_COLOR);
        fill_rect(tile, 0, h.saturating_sub(REC_BORDER), w, REC_BORDER, REC_COLOR);
        fill_rect(tile, 0, 0, REC_BORDER, h, REC_COLOR);
        fill_rect(tile, w.saturating_sub(REC_BORDER), 0, REC_BORDER, h, REC_COLOR);

        let marker = LABEL_BAND - 4;
        fill_rect(tile, w.saturating_sub(marker + 6), 2, marker, marker, REC_COLOR);
    }
}

fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x0 + w).min(img.width());
    let y_end = (y0 + h).min(img.height());
    for y in y0..y_end {
        for x in x0..x_end {
            img.put_pixel(x, y, color);
        }
    }
}
