use crate::geometry::PixelPoint;
use serde_derive::{Deserialize, Serialize};

/// Serialized form of a bbox. The derived fields are always written and
/// ignored on read, so they can never disagree with the corners.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
struct BBoxRecord {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    #[serde(default, skip_deserializing)]
    width: f32,
    #[serde(default, skip_deserializing)]
    height: f32,
    #[serde(default, skip_deserializing)]
    center_x: f32,
    #[serde(default, skip_deserializing)]
    center_y: f32,
}

/// Left-top-right-bottom box in pixels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(from = "BBoxRecord", into = "BBoxRecord")]
pub struct BBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl From<BBoxRecord> for BBox {
    fn from(r: BBoxRecord) -> Self {
        BBox::ltrb(r.x1, r.y1, r.x2, r.y2)
    }
}

impl From<BBox> for BBoxRecord {
    fn from(b: BBox) -> Self {
        BBoxRecord {
            x1: b.x1,
            y1: b.y1,
            x2: b.x2,
            y2: b.y2,
            width: b.width(),
            height: b.height(),
            center_x: b.center_x(),
            center_y: b.center_y(),
        }
    }
}

impl BBox {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BBox { x1, y1, x2, y2 }
    }

    #[inline]
    pub fn ltwh(left: f32, top: f32, width: f32, height: f32) -> Self {
        BBox::ltrb(left, top, left + width, top + height)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.x1
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.y1
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.x2
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.y2
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[inline(always)]
    pub fn center_x(&self) -> f32 {
        self.x1 + self.width() / 2.0
    }

    #[inline(always)]
    pub fn center_y(&self) -> f32 {
        self.y1 + self.height() / 2.0
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Finite corners with positive extent.
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x2 > self.x1
            && self.y2 > self.y1
    }

    /// Bottom-center of the box, taken as the ground-contact point.
    #[inline]
    pub fn anchor(&self) -> PixelPoint {
        PixelPoint::new(self.center_x() as f64, self.y2 as f64)
    }

    #[inline]
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        BBox::ltrb(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let i_xmin = self.x1.max(other.x1);
        let i_xmax = self.x2.min(other.x2);
        let i_ymin = self.y1.max(other.y1);
        let i_ymax = self.y2.min(other.y2);
        let i_area = (i_xmax - i_xmin).max(0.) * (i_ymax - i_ymin).max(0.);

        let union = self.area() + other.area() - i_area;
        if union <= 0.0 {
            return 0.0;
        }

        i_area / union
    }
}
