//! Core value types shared by discovery, naming, the registry and recording.

use std::fmt;

use image::{imageops::FilterType, RgbImage};
use serde::{Deserialize, Serialize};

use crate::errors::CameraError;

/// Enumeration index of a physical camera as exposed by the capture API.
///
/// Only stable within one process run.
pub type CameraId = u32;

/// Operator-supplied camera label. Doubles as the camera's output folder name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CameraName(String);

impl CameraName {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CameraError> {
        validate_label(raw.as_ref())
            .map(CameraName)
            .map_err(|msg| CameraError::InvalidInput(format!("camera name {}", msg)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CameraName {
    type Error = CameraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CameraName::new(value)
    }
}

impl From<CameraName> for String {
    fn from(name: CameraName) -> Self {
        name.0
    }
}

/// Trim a label and check it can safely become a single path component.
///
/// Returns the trimmed label, or a short reason suitable for appending to
/// "camera name" / "trial name".
pub(crate) fn validate_label(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("must not be empty".to_string());
    }
    if trimmed == "." || trimmed == ".." {
        return Err(format!("'{}' is not a valid folder name", trimmed));
    }
    if trimmed
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control())
    {
        return Err(format!("'{}' contains path separators or control characters", trimmed));
    }
    Ok(trimmed.to_string())
}

/// Immutable RGB8 snapshot captured from one camera.
///
/// Frames are never modified after construction; `resized` and
/// `to_image` hand out new buffers so the captured pixels that reach a
/// sink are exactly the ones the device produced.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a packed RGB8 buffer, rejecting buffers whose length doesn't match.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidInput(format!(
                "frame dimensions {}x{} are empty",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::InvalidInput(format!(
                "frame buffer holds {} bytes, {}x{} RGB needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the pixels as an `image` buffer, for annotation and scaling.
    pub fn to_image(&self) -> RgbImage {
        // Length is validated at construction.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// New frame scaled to `width`x`height`.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        let scaled = image::imageops::resize(&self.to_image(), width, height, FilterType::Triangle);
        Frame::from_image(scaled)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_name_is_trimmed() {
        let name = CameraName::new("  front ").unwrap();
        assert_eq!(name.as_str(), "front");
    }

    #[test]
    fn test_camera_name_rejects_separators() {
        assert!(CameraName::new("").is_err());
        assert!(CameraName::new("   ").is_err());
        assert!(CameraName::new("a/b").is_err());
        assert!(CameraName::new("..").is_err());
    }

    #[test]
    fn test_frame_rejects_short_buffer() {
        assert!(Frame::from_rgb(4, 4, vec![0; 10]).is_err());
        assert!(Frame::from_rgb(0, 4, vec![]).is_err());
    }

    #[test]
    fn test_resized_leaves_source_untouched() {
        let frame = Frame::from_rgb(4, 2, vec![200; 4 * 2 * 3]).unwrap();
        let smaller = frame.resized(2, 1);
        assert_eq!(smaller.dimensions(), (2, 1));
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.data().len(), 24);
    }
}
