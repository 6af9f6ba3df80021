use crate::errors::CameraError;
use crate::platform::{CameraBackend, CameraDevice, OpenParams};
use crate::types::{CameraId, Frame};

/// Exclusive, owned access to one opened camera.
///
/// Reading after [`release`](CameraHandle::release) is an error. The device is
/// released exactly once, either explicitly or on drop.
pub struct CameraHandle {
    id: CameraId,
    device: Option<Box<dyn CameraDevice>>,
}

impl CameraHandle {
    pub fn open(
        backend: &dyn CameraBackend,
        id: CameraId,
        params: &OpenParams,
    ) -> Result<Self, CameraError> {
        let device = backend.open(id, params)?;
        Ok(Self {
            id,
            device: Some(device),
        })
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn read(&mut self) -> Result<Frame, CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::DeviceClosed(self.id))?;
        device.read()
    }

    /// Release the device. Returns false if it was already released.
    pub fn release(&mut self) -> bool {
        match self.device.take() {
            Some(mut device) => {
                device.release();
                log::debug!("Released camera {}", self.id);
                true
            }
            None => false,
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraHandle")
            .field("id", &self.id)
            .field("is_open", &self.is_open())
            .finish()
    }
}
