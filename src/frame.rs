use crate::detection::Detection;
use ndarray::Array3;

/// Detections of one video frame, in detector order.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub frame_number: u64,
    pub timestamp: f64, // in seconds
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(frame_number: u64, timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            frame_number,
            timestamp,
            detections,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Detection> {
        self.detections.iter_mut()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Decoded pixels handed to a detector, `(height, width, channel)`.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    pub frame_number: u64,
    pub timestamp: f64,
    pub image: Array3<u8>,
}

impl RasterFrame {
    pub fn new(frame_number: u64, timestamp: f64, image: Array3<u8>) -> Self {
        Self {
            frame_number,
            timestamp,
            image,
        }
    }

    /// `(width, height)`
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        let (h, w, _) = self.image.dim();
        (w as u32, h as u32)
    }
}

/// A source of decoded frames, e.g. a video decoder.
pub trait FrameSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RasterFrame>, crate::error::Error>;
}
