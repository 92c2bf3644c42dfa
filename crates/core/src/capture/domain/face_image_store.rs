use std::path::{Path, PathBuf};

use crate::shared::constants::{FACE_IMAGE_EXTENSION, FACE_IMAGE_PREFIX};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Image artifacts of a capture batch: cropped faces written to disk for the
/// quality gate and the downstream consumer.
pub trait FaceImageStore: Send + Sync {
    /// Crops `region` out of `frame` and writes it to `path`.
    fn crop_and_save(
        &self,
        frame: &Frame,
        region: &Region,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn load_image(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Removes an artifact. Removing one that is already gone is not an error.
    fn delete(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>>;
}

/// `<output_dir>/face_<index>.jpg`, the name the downstream consumer expects.
pub fn face_image_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("{FACE_IMAGE_PREFIX}{index}.{FACE_IMAGE_EXTENSION}"))
}
