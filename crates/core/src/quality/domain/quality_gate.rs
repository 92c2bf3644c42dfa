use std::sync::Arc;

use crate::capture::domain::face_image_store::FaceImageStore;
use crate::quality::domain::face_record::{FaceRecord, Verdict};
use crate::quality::domain::sharpness::laplacian_variance;

/// Accepts or rejects a capture batch by the sharpness of every face.
///
/// A face passes when its Laplacian variance is strictly above `threshold`.
/// The batch passes only when every face passes: one blurry face sends the
/// whole batch back for recapture.
pub struct CaptureQualityGate {
    threshold: f64,
    images: Arc<dyn FaceImageStore>,
}

impl CaptureQualityGate {
    pub fn new(threshold: f64, images: Arc<dyn FaceImageStore>) -> Self {
        Self { threshold, images }
    }

    /// Scores every record in place and returns the batch verdict.
    ///
    /// An image that cannot be loaded scores `0`. An empty batch is rejected.
    pub fn evaluate(&self, batch: &mut [FaceRecord]) -> Verdict {
        let mut rejected_indices = Vec::new();

        for record in batch.iter_mut() {
            record.blur_score = match self.images.load_image(&record.image_path) {
                Ok(image) => laplacian_variance(image.luminance().view()),
                Err(e) => {
                    log::warn!("Unable to load {}: {e}", record.image_path.display());
                    0.0
                }
            };
            record.accepted = record.blur_score > self.threshold;
            log::info!(
                "Face {} sharpness {:.1} ({})",
                record.index,
                record.blur_score,
                if record.accepted { "sharp" } else { "blurry" }
            );
            if !record.accepted {
                rejected_indices.push(record.index);
            }
        }

        let accepted = !batch.is_empty() && rejected_indices.is_empty();
        if accepted {
            log::info!("Batch of {} faces accepted", batch.len());
        } else {
            log::info!(
                "Batch of {} faces rejected (blurry: {rejected_indices:?})",
                batch.len()
            );
        }

        Verdict {
            accepted,
            rejected_indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use crate::shared::frame::Frame;
    use crate::shared::region::Region;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Serves in-memory frames by path; unknown paths fail to load.
    struct StubImages {
        frames: HashMap<PathBuf, Frame>,
    }

    impl StubImages {
        fn new(entries: Vec<(&str, Frame)>) -> Arc<Self> {
            Arc::new(Self {
                frames: entries
                    .into_iter()
                    .map(|(p, f)| (PathBuf::from(p), f))
                    .collect(),
            })
        }
    }

    impl FaceImageStore for StubImages {
        fn crop_and_save(
            &self,
            _frame: &Frame,
            _region: &Region,
            _path: &Path,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }

        fn load_image(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            self.frames
                .get(path)
                .cloned()
                .ok_or_else(|| format!("no image at {}", path.display()).into())
        }

        fn delete(&self, _path: &Path) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    fn checkerboard(size: u32) -> Frame {
        let mut data = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(data, size, size, 3, 0)
    }

    fn flat(size: u32) -> Frame {
        Frame::new(vec![120; (size * size * 3) as usize], size, size, 3, 0)
    }

    fn batch(paths: &[&str]) -> Vec<FaceRecord> {
        paths
            .iter()
            .enumerate()
            .map(|(i, p)| FaceRecord::new(i, *p))
            .collect()
    }

    #[test]
    fn test_all_sharp_batch_is_accepted() {
        let images = StubImages::new(vec![("a.jpg", checkerboard(16)), ("b.jpg", checkerboard(24))]);
        let gate = CaptureQualityGate::new(100.0, images);
        let mut faces = batch(&["a.jpg", "b.jpg"]);

        let verdict = gate.evaluate(&mut faces);

        assert!(verdict.accepted);
        assert!(verdict.rejected_indices.is_empty());
        assert!(faces.iter().all(|f| f.accepted && f.blur_score > 100.0));
    }

    #[test]
    fn test_one_blurry_face_rejects_whole_batch() {
        let images = StubImages::new(vec![
            ("a.jpg", checkerboard(16)),
            ("b.jpg", flat(16)),
            ("c.jpg", checkerboard(16)),
        ]);
        let gate = CaptureQualityGate::new(100.0, images);
        let mut faces = batch(&["a.jpg", "b.jpg", "c.jpg"]);

        let verdict = gate.evaluate(&mut faces);

        assert!(!verdict.accepted);
        assert_eq!(verdict.rejected_indices, vec![1]);
        assert!(faces[0].accepted);
        assert!(!faces[1].accepted);
        assert_relative_eq!(faces[1].blur_score, 0.0);
    }

    #[test]
    fn test_unloadable_image_scores_zero() {
        let images = StubImages::new(vec![("a.jpg", checkerboard(16))]);
        let gate = CaptureQualityGate::new(100.0, images);
        let mut faces = batch(&["a.jpg", "missing.jpg"]);

        let verdict = gate.evaluate(&mut faces);

        assert!(!verdict.accepted);
        assert_eq!(verdict.rejected_indices, vec![1]);
        assert_relative_eq!(faces[1].blur_score, 0.0);
    }

    #[rstest]
    #[case::below(1.0e9, false)]
    #[case::above(0.0, true)]
    fn test_threshold_is_strict(#[case] threshold: f64, #[case] expected: bool) {
        let images = StubImages::new(vec![("a.jpg", checkerboard(8))]);
        let gate = CaptureQualityGate::new(threshold, images);
        let mut faces = batch(&["a.jpg"]);
        assert_eq!(gate.evaluate(&mut faces).accepted, expected);
    }

    #[test]
    fn test_score_equal_to_threshold_is_rejected() {
        let images = StubImages::new(vec![("a.jpg", flat(8))]);
        let gate = CaptureQualityGate::new(0.0, images);
        let mut faces = batch(&["a.jpg"]);
        assert!(!gate.evaluate(&mut faces).accepted);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let gate = CaptureQualityGate::new(100.0, StubImages::new(vec![]));
        assert!(!gate.evaluate(&mut []).accepted);
    }
}
