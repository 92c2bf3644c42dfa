use ndarray::{Array2, ArrayView3};

use crate::shared::region::Region;

/// A single camera frame or face crop: contiguous RGB bytes in row-major order.
///
/// Conversion from camera pixel formats and image codecs happens at the I/O
/// boundary; everything past it works on RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of the frame in the camera stream.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels covered by `region`, clamped to the frame bounds.
    ///
    /// A region lying entirely outside the frame yields an empty frame.
    pub fn crop(&self, region: &Region) -> Frame {
        let clamped = region.clamped(self.width, self.height);
        let channels = self.channels as usize;
        let x1 = clamped.x as usize;
        let y1 = clamped.y as usize;
        let crop_w = clamped.width as usize;
        let crop_h = clamped.height as usize;

        let row_stride = self.width as usize * channels;
        let mut data = Vec::with_capacity(crop_w * crop_h * channels);
        for row in y1..y1 + crop_h {
            let start = row * row_stride + x1 * channels;
            data.extend_from_slice(&self.data[start..start + crop_w * channels]);
        }

        Frame::new(data, crop_w as u32, crop_h as u32, self.channels, self.index)
    }

    /// Luminance plane (`0.299 R + 0.587 G + 0.114 B`), shape `(height, width)`.
    ///
    /// Single-channel frames are returned as-is.
    pub fn luminance(&self) -> Array2<f64> {
        let src = self.as_ndarray();
        let (h, w) = (self.height as usize, self.width as usize);
        if self.channels < 3 {
            return Array2::from_shape_fn((h, w), |(y, x)| src[[y, x, 0]] as f64);
        }
        Array2::from_shape_fn((h, w), |(y, x)| {
            0.299 * src[[y, x, 0]] as f64 + 0.587 * src[[y, x, 1]] as f64 + 0.114 * src[[y, x, 2]] as f64
        })
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
