use crate::bbox::BBox;
use crate::error::Error;
use crate::geometry::FieldPoint;

/// A single detector output for one frame. Only the field projector may
/// attach `field_coords`; everything else is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    frame_number: u64,
    timestamp: f64,
    class: String,
    class_id: i32,
    confidence: f32,
    bbox: BBox,
    field_coords: Option<FieldPoint>,
    embedding: Option<Vec<f32>>,
}

impl Detection {
    pub fn new(
        frame_number: u64,
        timestamp: f64,
        class: impl Into<String>,
        class_id: i32,
        confidence: f32,
        bbox: BBox,
    ) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidDetection(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }

        if !bbox.is_valid() {
            return Err(Error::InvalidDetection(format!("degenerate bbox {:?}", bbox)));
        }

        Ok(Self {
            frame_number,
            timestamp,
            class: class.into(),
            class_id,
            confidence,
            bbox,
            field_coords: None,
            embedding: None,
        })
    }

    /// Attach an appearance embedding (L2-normalized here).
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = crate::math::l2_normalized(embedding);
        self
    }

    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[inline]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[inline]
    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[inline]
    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    #[inline]
    pub fn field_coords(&self) -> Option<FieldPoint> {
        self.field_coords
    }

    #[inline]
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub(crate) fn set_field_coords(&mut self, coords: Option<FieldPoint>) {
        self.field_coords = coords;
    }
}
