/// An axis-aligned face bounding box in frame pixel coordinates.
///
/// Coordinates may extend past the frame edges; [`Region::clamped`] produces
/// the visible part.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let union = self.area() as f64 + other.area() as f64 - inter;
        inter / union
    }

    /// Grows the box by `padding` pixels on every side.
    pub fn padded(&self, padding: i32) -> Region {
        Region {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + 2 * padding,
            height: self.height + 2 * padding,
            confidence: self.confidence,
        }
    }

    /// The part of the box inside a `frame_w` x `frame_h` frame.
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> Region {
        let fw = frame_w as i32;
        let fh = frame_h as i32;
        let x1 = self.x.clamp(0, fw);
        let y1 = self.y.clamp(0, fh);
        let x2 = (self.x + self.width).clamp(0, fw);
        let y2 = (self.y + self.height).clamp(0, fh);
        Region {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
            confidence: self.confidence,
        }
    }

    /// Picks the `count` most confident boxes and orders them left to right,
    /// so index `i` of the result maps to the i-th player from the left.
    ///
    /// Returns `None` when fewer than `count` boxes are available.
    pub fn select_players(regions: &[Region], count: usize) -> Option<Vec<Region>> {
        if count == 0 || regions.len() < count {
            return None;
        }
        let mut by_confidence = regions.to_vec();
        by_confidence.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        by_confidence.truncate(count);
        by_confidence.sort_by_key(|r| (r.x, r.y));
        Some(by_confidence)
    }
}
