use std::path::PathBuf;

/// One saved face crop of a capture batch.
///
/// `index` is the player position, counted from the left of the frame.
/// `blur_score` and `accepted` are only meaningful once the quality gate
/// has evaluated the record.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRecord {
    pub index: usize,
    pub image_path: PathBuf,
    pub blur_score: f64,
    pub accepted: bool,
}

impl FaceRecord {
    pub fn new(index: usize, image_path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            image_path: image_path.into(),
            blur_score: 0.0,
            accepted: false,
        }
    }
}

/// Outcome of gating one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Verdict {
    pub accepted: bool,
    pub rejected_indices: Vec<usize>,
}
