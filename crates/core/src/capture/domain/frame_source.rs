use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("unable to open camera {device}: {message}")]
    Open { device: String, message: String },
    #[error("camera stopped delivering frames: {0}")]
    Read(String),
}

/// Live camera feed, consumed one frame at a time by the capture loop.
pub trait FrameSource: Send {
    /// Blocks until the next frame is decoded.
    ///
    /// Returns `Ok(None)` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}
