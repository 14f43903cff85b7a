//! # herbsight-media
//!
//! Camera capture for the identification flow. The [`capture::CaptureProvider`]
//! owns the camera stream, hands out one still JPEG per capture and releases
//! the hardware on every exit path.

pub mod capture;

pub use capture::{
    CameraDevice, CaptureConfig, CaptureError, CaptureProvider, CaptureState, FacingMode,
    MediaStream, RawFrame, StreamRequest, UnsupportedCamera,
};
