use crate::errors::CameraError;
use crate::platform::{CameraBackend, CameraDevice, OpenParams};
use crate::types::{CameraId, Frame};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};

/// Camera backend backed by nokhwa with a fixed capture API.
pub struct NokhwaBackend {
    api: ApiBackend,
    label: String,
}

impl NokhwaBackend {
    /// The platform's native capture API
    pub fn native() -> Self {
        Self::with_api(native_api())
    }

    /// Let nokhwa pick the capture API
    pub fn auto() -> Self {
        Self::with_api(ApiBackend::Auto)
    }

    pub fn with_api(api: ApiBackend) -> Self {
        Self {
            api,
            label: format!("{:?}", api),
        }
    }
}

#[cfg(target_os = "windows")]
fn native_api() -> ApiBackend {
    ApiBackend::MediaFoundation
}

#[cfg(target_os = "macos")]
fn native_api() -> ApiBackend {
    ApiBackend::AVFoundation
}

#[cfg(target_os = "linux")]
fn native_api() -> ApiBackend {
    ApiBackend::Video4Linux
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn native_api() -> ApiBackend {
    ApiBackend::Auto
}

pub(crate) fn native_api_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "MediaFoundation"
    } else if cfg!(target_os = "macos") {
        "AVFoundation"
    } else if cfg!(target_os = "linux") {
        "Video4Linux"
    } else {
        "Auto"
    }
}

impl CameraBackend for NokhwaBackend {
    fn name(&self) -> &str {
        &self.label
    }

    fn open(&self, id: CameraId, params: &OpenParams) -> Result<Box<dyn CameraDevice>, CameraError> {
        // MJPEG is the broadest-supported USB camera format; Closest lets the
        // driver fall back when the exact mode is missing.
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            nokhwa::utils::CameraFormat::new(
                Resolution::new(params.width, params.height),
                FrameFormat::MJPEG,
                params.fps,
            ),
        ));

        let mut camera = Camera::with_backend(CameraIndex::Index(id), requested_format, self.api)
            .map_err(|e| {
                CameraError::DeviceUnavailable(format!(
                    "Failed to initialize camera {} ({}): {}",
                    id, self.label, e
                ))
            })?;

        camera.open_stream().map_err(|e| {
            CameraError::DeviceUnavailable(format!("Failed to start stream on camera {}: {}", id, e))
        })?;

        log::debug!(
            "Camera {} streaming via {} at {:?}",
            id,
            self.label,
            camera.camera_format()
        );

        Ok(Box::new(NokhwaDevice {
            id,
            camera: Some(camera),
        }))
    }
}

struct NokhwaDevice {
    id: CameraId,
    camera: Option<Camera>,
}

impl CameraDevice for NokhwaDevice {
    fn id(&self) -> CameraId {
        self.id
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        let camera = self.camera.as_mut().ok_or(CameraError::DeviceClosed(self.id))?;

        let buffer = camera
            .frame()
            .map_err(|e| CameraError::ReadError(format!("Failed to capture frame: {}", e)))?;

        let raw_bytes = buffer.buffer();
        let width = buffer.resolution().width_x;
        let height = buffer.resolution().height_y;

        // nokhwa hands back MJPEG even when RGB was requested on some drivers,
        // so sniff the JPEG SOI marker before trusting the buffer layout.
        if raw_bytes.len() >= 3 && raw_bytes[..3] == [0xFF, 0xD8, 0xFF] {
            let img = image::load_from_memory(raw_bytes)
                .map_err(|e| CameraError::ReadError(format!("Failed to decode MJPEG: {}", e)))?;
            return Ok(Frame::from_image(img.to_rgb8()));
        }

        if raw_bytes.len() == width as usize * height as usize * 3 {
            return Frame::from_rgb(width, height, raw_bytes.to_vec());
        }

        let mut rgb = vec![0u8; width as usize * height as usize * 3];
        buffer
            .decode_image_to_buffer::<RgbFormat>(&mut rgb)
            .map_err(|e| CameraError::ReadError(format!("Failed to decode frame: {}", e)))?;
        Frame::from_rgb(width, height, rgb)
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::debug!("Camera {} stop_stream failed: {}", self.id, e);
            }
        }
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        self.release();
    }
}
