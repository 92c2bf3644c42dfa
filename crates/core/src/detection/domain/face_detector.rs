use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Finds faces in a camera frame.
///
/// Regions carry the detector confidence and are in frame pixels.
/// `&mut self` because inference sessions are not shareable.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;
}
