//! YOLO face detection on ONNX Runtime (`ort`).
//!
//! Letterboxes the frame into the model input, runs inference, decodes the
//! output rows according to the model family and applies greedy NMS.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Fallback input resolution when the model input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Letterbox padding value, the YOLO convention.
const PAD_GRAY: f32 = 114.0 / 255.0;

/// Row layout of the model output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YoloLayout {
    /// YOLOv8-face: `[cx, cy, w, h, conf, landmarks...]`.
    Pose,
    /// YOLOv5 / Darknet: `[cx, cy, w, h, objectness, class scores...]`,
    /// confidence is objectness times the best class score.
    Objectness,
}

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    layout: YoloLayout,
    confidence: f64,
    nms_iou: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Loads the model. The input size is read from its NCHW input shape.
    pub fn new(
        model_path: &Path,
        layout: YoloLayout,
        confidence: f64,
        nms_iou: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if !model_path.exists() {
            return Err(format!("face model not found: {}", model_path.display()).into());
        }
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded {:?} face model {} ({input_size}px input)",
            layout,
            model_path.display()
        );

        Ok(Self {
            session,
            layout,
            confidence,
            nms_iou,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let (input, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_standard_layout()
            .as_slice()
            .ok_or("face model output is not contiguous")?
            .to_vec();

        let rows = output_rows(&data, &shape)?;
        let mut candidates: Vec<Candidate> = rows
            .iter()
            .filter_map(|row| decode_row(row, self.layout))
            .filter(|c| c.confidence >= self.confidence)
            .map(|c| letterbox.unmap(c))
            .collect();

        let kept = nms(&mut candidates, self.nms_iou);
        log::debug!("Frame {}: {} faces", frame.index(), kept.len());
        Ok(kept.iter().map(Candidate::to_region).collect())
    }
}

/// Mapping between frame pixels and the letterboxed model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn unmap(&self, c: Candidate) -> Candidate {
        let x = |v: f64| (v - self.pad_x as f64) / self.scale;
        let y = |v: f64| (v - self.pad_y as f64) / self.scale;
        Candidate {
            x1: x(c.x1),
            y1: y(c.y1),
            x2: x(c.x2),
            y2: y(c.y2),
            confidence: c.confidence,
        }
    }
}

/// Resizes the frame into a grey `target_size` square, keeping its aspect
/// ratio, as an NCHW tensor in `0..=1`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), PAD_GRAY);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = frame.channels() as usize;

    // Nearest neighbour
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                let value = src[[src_y, src_x, c.min(channels - 1)]];
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] = value as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Splits a `[1, features, detections]` or `[1, detections, features]`
/// output into per-detection rows.
fn output_rows(data: &[f32], shape: &[usize]) -> Result<Vec<Vec<f32>>, Box<dyn std::error::Error>> {
    let [_, a, b] = shape else {
        return Err(format!("unexpected face model output shape: {shape:?}").into());
    };
    let (a, b) = (*a, *b);
    if data.len() < a * b {
        return Err(format!("face model output too short for shape {shape:?}").into());
    }

    // Feature-major when there are fewer rows than columns.
    let rows = if a < b {
        (0..b)
            .map(|det| (0..a).map(|feat| data[feat * b + det]).collect())
            .collect()
    } else {
        data[..a * b].chunks(b).map(<[f32]>::to_vec).collect()
    };
    Ok(rows)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl Candidate {
    fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f64 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    fn to_region(&self) -> Region {
        let x = self.x1.round() as i32;
        let y = self.y1.round() as i32;
        Region::new(
            x,
            y,
            self.x2.round() as i32 - x,
            self.y2.round() as i32 - y,
        )
        .with_confidence(self.confidence)
    }
}

/// Box and confidence of one output row, in letterbox coordinates.
fn decode_row(row: &[f32], layout: YoloLayout) -> Option<Candidate> {
    if row.len() < 5 {
        return None;
    }
    let confidence = match layout {
        YoloLayout::Pose => row[4] as f64,
        YoloLayout::Objectness => {
            let best_class = row[5..].iter().copied().fold(None, |best: Option<f32>, s| {
                Some(best.map_or(s, |b| b.max(s)))
            });
            row[4] as f64 * best_class.unwrap_or(1.0) as f64
        }
    };
    let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
    Some(Candidate {
        x1: cx - w / 2.0,
        y1: cy - h / 2.0,
        x2: cx + w / 2.0,
        y2: cy + h / 2.0,
        confidence,
    })
}

/// Greedy NMS, most confident first.
fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates.iter() {
        if keep.iter().all(|k| k.iou(candidate) <= iou_thresh) {
            keep.push(*candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn candidate(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> Candidate {
        Candidate {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn test_letterbox_wide_frame_pads_vertically() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, lb) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2);
        assert_eq!((lb.pad_x, lb.pad_y), (0, 160));
        assert_relative_eq!(tensor[[0, 0, 0, 0]], PAD_GRAY);
        assert_relative_eq!(tensor[[0, 1, 320, 320]], 128.0 / 255.0);
    }

    #[test]
    fn test_letterbox_grayscale_frame_fills_all_channels() {
        let frame = Frame::new(vec![255u8; 64 * 64], 64, 64, 1, 0);
        let (tensor, _) = letterbox(&frame, 128);
        for c in 0..3 {
            assert_relative_eq!(tensor[[0, c, 10, 10]], 1.0);
        }
    }

    #[test]
    fn test_unmap_inverts_letterbox() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0,
            pad_y: 40,
        };
        let mapped = lb.unmap(candidate(20.0, 60.0, 100.0, 140.0, 0.9));
        assert_eq!(mapped, candidate(10.0, 10.0, 50.0, 50.0, 0.9));
    }

    #[test]
    fn test_output_rows_feature_major() {
        // 5 features x 3 detections
        let data: Vec<f32> = (0..15).map(|v| v as f32).collect();
        let rows = output_rows(&data, &[1, 5, 3]).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec![1.0, 4.0, 7.0, 10.0, 13.0]);
    }

    #[test]
    fn test_output_rows_detection_major() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let rows = output_rows(&data, &[1, 2, 6]).unwrap();
        // 2 < 6 reads as feature-major; a tall output reads row by row.
        assert_eq!(rows.len(), 6);
        let rows = output_rows(&data, &[1, 6, 2]).unwrap();
        assert_eq!(rows[0], vec![0.0, 1.0]);
    }

    #[rstest]
    #[case::two_dims(vec![1, 15])]
    #[case::four_dims(vec![1, 1, 5, 3])]
    fn test_output_rows_rejects_shape(#[case] shape: Vec<usize>) {
        assert!(output_rows(&[0.0; 15], &shape).is_err());
    }

    #[test]
    fn test_decode_pose_row() {
        let row = [50.0, 40.0, 20.0, 10.0, 0.8, 1.0, 2.0, 0.9];
        let c = decode_row(&row, YoloLayout::Pose).unwrap();
        assert_eq!(c, candidate(40.0, 35.0, 60.0, 45.0, 0.8f32 as f64));
    }

    #[test]
    fn test_decode_objectness_row() {
        let row = [50.0, 40.0, 20.0, 10.0, 0.5, 0.2, 0.8];
        let c = decode_row(&row, YoloLayout::Objectness).unwrap();
        assert_relative_eq!(c.confidence, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_short_row() {
        assert!(decode_row(&[1.0, 2.0, 3.0, 4.0], YoloLayout::Pose).is_none());
    }

    #[test]
    fn test_nms_keeps_most_confident_of_overlap() {
        let mut dets = vec![
            candidate(2.0, 2.0, 102.0, 102.0, 0.5),
            candidate(0.0, 0.0, 100.0, 100.0, 0.9),
            candidate(200.0, 200.0, 250.0, 250.0, 0.7),
        ];
        let kept = nms(&mut dets, 0.4);
        let confidences: Vec<f64> = kept.iter().map(|c| c.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7]);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(&mut [], 0.4).is_empty());
    }

    #[test]
    fn test_candidate_to_region() {
        let region = candidate(10.4, 20.6, 50.5, 60.0, 0.75).to_region();
        assert_eq!((region.x, region.y, region.width, region.height), (10, 21, 41, 39));
        assert_relative_eq!(region.confidence, 0.75);
    }

    #[test]
    fn test_missing_model_is_error() {
        let result = OnnxYoloDetector::new(Path::new("/nonexistent/face.onnx"), YoloLayout::Pose, 0.5, 0.4);
        assert!(result.is_err());
    }

    #[test]
    fn test_layout_serde_names() {
        assert_eq!(serde_json::to_string(&YoloLayout::Objectness).unwrap(), r#""objectness""#);
        let layout: YoloLayout = serde_json::from_str(r#""pose""#).unwrap();
        assert_eq!(layout, YoloLayout::Pose);
    }
}
