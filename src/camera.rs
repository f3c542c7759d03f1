use async_trait::async_trait;
use bytes::Bytes;
use opencv::{
    core::{Mat, Vector},
    imgcodecs,
    prelude::*,
    videoio,
};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

/// One encoded still image sampled from the live stream.
///
/// Ephemeral: owned by the sampler until dispatched, then by the single
/// in-flight submission that carries it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Bytes,
    pub captured_at: Instant,
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    OpenCameraFailed(opencv::Error),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
}

impl From<opencv::Error> for CameraError {
    fn from(err: opencv::Error) -> Self {
        CameraError::OpenCvError(err)
    }
}

/// Boundary to the live video device.
///
/// `Ok(None)` means the stream is not ready yet (no frame, or dimensions
/// still unknown); callers skip their cycle without side effects.
#[async_trait]
pub trait FrameSource: Send + Sync + 'static {
    async fn current_frame(&self) -> Result<Option<Frame>, CameraError>;
}

#[derive(Debug)]
pub struct Camera {
    capture: Mutex<videoio::VideoCapture>,
}

impl Camera {
    pub async fn new() -> Result<Self, CameraError> {
        let capture = videoio::VideoCapture::new(0, videoio::CAP_ANY)
            .map_err(CameraError::OpenCameraFailed)?;
        Ok(Self {
            capture: Mutex::new(capture),
        })
    }
}

#[async_trait]
impl FrameSource for Camera {
    async fn current_frame(&self) -> Result<Option<Frame>, CameraError> {
        let mut cam = self.capture.lock().await;
        let mut frame = Mat::default();
        let grabbed = cam.read(&mut frame).map_err(CameraError::ReadFrameFailed)?;
        if !grabbed || frame.empty() || frame.cols() == 0 {
            return Ok(None);
        }

        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".jpg", &frame, &mut buf, &Vector::new())
            .map_err(CameraError::EncodeFrameFailed)?;

        let encoded: Vec<u8> = buf.into();
        Ok(Some(Frame {
            bytes: Bytes::from(encoded),
            captured_at: Instant::now(),
        }))
    }
}
