use std::io::Cursor;

use chrono::Utc;
use herbsight_shared::constants::CAPTURE_JPEG_QUALITY;
use herbsight_shared::CapturedImage;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera device found")]
    NoDeviceFound,

    #[error("Camera capture is not supported here")]
    Unsupported,

    #[error("Camera is not ready")]
    NotReady,

    #[error("Frame grab failed: {0}")]
    Frame(String),

    #[error("JPEG encode failed: {0}")]
    Encode(String),
}

impl CaptureError {
    /// Map a platform error name (as reported by browser-style media APIs)
    /// onto a capture error kind.
    pub fn from_platform_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => Self::PermissionDenied,
            "NotFoundError" | "DevicesNotFoundError" => Self::NoDeviceFound,
            "NotSupportedError" | "TypeError" => Self::Unsupported,
            other => Self::Frame(other.to_string()),
        }
    }

    /// Message shown inline in the capture view.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Camera access denied. Please enable camera permissions in your browser settings."
            }
            Self::NoDeviceFound => "No camera found. Please connect a camera and try again.",
            Self::Unsupported => "Camera access is not supported on this device.",
            Self::NotReady | Self::Frame(_) | Self::Encode(_) => {
                "Failed to capture photo. Please try again."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

impl FacingMode {
    pub fn flipped(self) -> Self {
        match self {
            Self::Environment => Self::User,
            Self::User => Self::Environment,
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1920,
            ideal_height: 1080,
            jpeg_quality: CAPTURE_JPEG_QUALITY,
        }
    }
}

/// What the provider asks the device for. Resolution is a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// One RGB8 video frame
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// A live camera stream. Holding one keeps the device locked.
pub trait MediaStream {
    fn grab_frame(&mut self) -> Result<RawFrame, CaptureError>;

    /// Release the hardware. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Platform camera binding.
pub trait CameraDevice {
    type Stream: MediaStream;

    fn acquire(&mut self, request: &StreamRequest) -> Result<Self::Stream, CaptureError>;
}

/// Stand-in device for platforms without camera access.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCamera;

#[derive(Debug)]
pub enum NoStream {}

impl MediaStream for NoStream {
    fn grab_frame(&mut self) -> Result<RawFrame, CaptureError> {
        match *self {}
    }

    fn stop(&mut self) {
        match *self {}
    }
}

impl CameraDevice for UnsupportedCamera {
    type Stream = NoStream;

    fn acquire(&mut self, _request: &StreamRequest) -> Result<NoStream, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Requesting,
    Ready,
    Capturing,
    Error(CaptureError),
}

/// Owns the camera stream and turns frames into uploadable JPEGs.
pub struct CaptureProvider<D: CameraDevice> {
    device: D,
    config: CaptureConfig,
    stream: Option<D::Stream>,
    state: CaptureState,
    facing: FacingMode,
}

impl<D: CameraDevice> CaptureProvider<D> {
    pub fn new(device: D, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            stream: None,
            state: CaptureState::Idle,
            facing: FacingMode::default(),
        }
    }

    /// Acquire the camera facing the given direction. Any stream already
    /// held is released first. A failure leaves the provider in the error
    /// state with nothing acquired; calling `activate` again retries.
    pub fn activate(&mut self, facing: FacingMode) -> Result<(), CaptureError> {
        self.release();
        self.facing = facing;
        self.state = CaptureState::Requesting;

        let request = StreamRequest {
            facing,
            ideal_width: self.config.ideal_width,
            ideal_height: self.config.ideal_height,
        };

        match self.device.acquire(&request) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = CaptureState::Ready;
                info!(?facing, "Camera ready");
                Ok(())
            }
            Err(e) => {
                warn!(?facing, error = %e, "Camera activation failed");
                self.state = CaptureState::Error(e.clone());
                Err(e)
            }
        }
    }

    /// Tear the stream down and reacquire with the other camera.
    pub fn switch_facing(&mut self) -> Result<(), CaptureError> {
        let next = self.facing.flipped();
        debug!(from = ?self.facing, to = ?next, "Switching camera");
        self.activate(next)
    }

    /// Grab one still frame as a JPEG. Requires the ready state; the stream
    /// stays live afterwards.
    pub fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
        if self.state != CaptureState::Ready {
            return Err(CaptureError::NotReady);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::NotReady);
        };

        self.state = CaptureState::Capturing;
        let result = stream
            .grab_frame()
            .and_then(|frame| encode_jpeg(&frame, self.config.jpeg_quality));
        self.state = CaptureState::Ready;

        let bytes = result?;
        let file_name = format!("plant-{}.jpg", Utc::now().timestamp_millis());
        debug!(file = %file_name, size = bytes.len(), "Captured still image");

        Ok(CapturedImage::new(bytes, "image/jpeg", file_name))
    }

    /// Release the camera unconditionally.
    pub fn deactivate(&mut self) {
        self.release();
        self.state = CaptureState::Idle;
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn is_ready(&self) -> bool {
        self.state == CaptureState::Ready
    }

    pub fn holds_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Error to show inline, if the last activation failed.
    pub fn error_message(&self) -> Option<&'static str> {
        match &self.state {
            CaptureState::Error(e) => Some(e.user_message()),
            _ => None,
        }
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("Camera stream released");
        }
    }
}

impl<D: CameraDevice> Drop for CaptureProvider<D> {
    fn drop(&mut self) {
        self.release();
    }
}

fn encode_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let img = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()).ok_or_else(|| {
        CaptureError::Frame(format!(
            "buffer of {} bytes does not fit {}x{}",
            frame.rgb.len(),
            frame.width,
            frame.height
        ))
    })?;

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&img)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
