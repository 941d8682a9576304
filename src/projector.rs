use crate::bbox::BBox;
use crate::detection::Detection;
use crate::error::Error;
use crate::field::FieldGeometry;
use crate::frame::Frame;
use crate::geometry::{FieldPoint, PixelPoint};
use crate::homography::Homography;

/// Outcome counts of projecting one or more frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub projected: usize,
    pub singular: usize,
    /// Projected, but outside the playing surface.
    pub off_field: usize,
}

impl ProjectionSummary {
    fn merge(&mut self, other: ProjectionSummary) {
        self.projected += other.projected;
        self.singular += other.singular;
        self.off_field += other.off_field;
    }
}

/// Maps detection anchors onto the field through a fixed homography.
#[derive(Debug, Clone)]
pub struct FieldProjector {
    homography: Homography,
    field: FieldGeometry,
}

impl FieldProjector {
    pub fn new(homography: Homography) -> Self {
        Self {
            homography,
            field: FieldGeometry::default(),
        }
    }

    pub fn with_field(mut self, field: FieldGeometry) -> Self {
        self.field = field;
        self
    }

    #[inline]
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    #[inline]
    pub fn field(&self) -> &FieldGeometry {
        &self.field
    }

    #[inline]
    pub fn anchor(bbox: &BBox) -> PixelPoint {
        bbox.anchor()
    }

    pub fn project_point(&self, p: PixelPoint) -> Result<FieldPoint, Error> {
        self.homography.project(p)
    }

    pub fn project_detection(&self, det: &Detection) -> Result<FieldPoint, Error> {
        self.project_point(Self::anchor(det.bbox()))
    }

    /// Sets `field_coords` on every detection of `frame`. All coordinates
    /// are computed before any is written; a detection whose anchor cannot
    /// be projected is left without coordinates.
    pub fn project_frame(&self, frame: &mut Frame) -> ProjectionSummary {
        let coords: Vec<Option<FieldPoint>> = frame
            .iter()
            .map(|det| match self.project_detection(det) {
                Ok(p) => Some(p),
                Err(err) => {
                    log::warn!("frame {}: {}", frame.frame_number, err);
                    None
                }
            })
            .collect();

        let frame_number = frame.frame_number;
        let mut summary = ProjectionSummary::default();
        for (det, c) in frame.iter_mut().zip(coords) {
            match c {
                Some(p) => {
                    summary.projected += 1;
                    if !self.field.contains(&p) {
                        summary.off_field += 1;
                        log::debug!(
                            "frame {}: {} lands off the field at ({:.1}, {:.1}) ft",
                            frame_number,
                            det.class(),
                            p.x,
                            p.y
                        );
                    }
                }
                None => summary.singular += 1,
            }
            det.set_field_coords(c);
        }

        summary
    }

    pub fn project_frames(&self, frames: &mut [Frame]) -> ProjectionSummary {
        let mut summary = ProjectionSummary::default();
        for frame in frames.iter_mut() {
            summary.merge(self.project_frame(frame));
        }

        if summary.singular > 0 {
            log::warn!(
                "{} of {} detections could not be projected",
                summary.singular,
                summary.singular + summary.projected
            );
        }

        summary
    }
}
