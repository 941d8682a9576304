use crate::error::{Degeneracy, Error};
use crate::field::{FieldGeometry, MarkerMapping, YardMarkerLabel};
use crate::geometry::{FieldPoint, PixelPoint, FEET_PER_YARD};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MIN_CORRESPONDENCES: usize = 4;
pub const MIN_YARD_LINES: usize = 2;

/// Where a correspondence came from when it was derived from a yard marker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct YardMarkerInfo {
    pub label: String,
    pub yard_line: i32,
    pub hash_side: String,
    pub near_far: String,
    pub yard_number: i32,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CorrespondencePoint {
    pub image_point: PixelPoint,
    pub field_point: FieldPoint,
    #[serde(
        rename = "yard_marker_info",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub label: Option<YardMarkerInfo>,
}

impl CorrespondencePoint {
    pub fn new(image_point: PixelPoint, field_point: FieldPoint) -> Self {
        Self {
            image_point,
            field_point,
            label: None,
        }
    }

    /// Correspondence for a detected yard marker: the field point comes from
    /// the label, not from the caller.
    pub fn from_marker(
        image_point: PixelPoint,
        label: &YardMarkerLabel,
        confidence: f32,
        mapping: &MarkerMapping,
        geometry: &FieldGeometry,
    ) -> Self {
        let resolved = label.resolve(mapping, geometry);

        Self {
            image_point,
            field_point: resolved.field_point,
            label: Some(YardMarkerInfo {
                label: label.to_string(),
                yard_line: resolved.yard_line,
                hash_side: label.left_right().as_str().to_string(),
                near_far: label.near_far().as_str().to_string(),
                yard_number: resolved.yard_number,
                confidence,
            }),
        }
    }

    /// The yard line this point sits on: the marker's own yard line when
    /// known, otherwise the field x rounded to the nearest yard.
    pub fn yard_line(&self) -> i64 {
        match &self.label {
            Some(info) => info.yard_line as i64,
            None => (self.field_point.x / FEET_PER_YARD).round() as i64,
        }
    }
}

/// A yard marker seen in an image, before interpretation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarkerObservation {
    pub label: String,
    pub image_point: PixelPoint,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

/// Unordered collection of correspondences feeding the calibrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceStore {
    points: Vec<CorrespondencePoint>,
}

impl CorrespondenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<CorrespondencePoint>) -> Self {
        Self { points }
    }

    /// Interprets every observation's label. Any invalid label fails the
    /// whole batch.
    pub fn from_markers(
        observations: &[MarkerObservation],
        mapping: &MarkerMapping,
        geometry: &FieldGeometry,
    ) -> Result<Self, Error> {
        let points = observations
            .iter()
            .map(|obs| {
                let label = YardMarkerLabel::parse(&obs.label)?;

                Ok(CorrespondencePoint::from_marker(
                    obs.image_point,
                    &label,
                    obs.confidence,
                    mapping,
                    geometry,
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { points })
    }

    pub fn push(&mut self, point: CorrespondencePoint) {
        self.points.push(point);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[CorrespondencePoint] {
        &self.points
    }

    pub fn image_points(&self) -> impl Iterator<Item = PixelPoint> + '_ {
        self.points.iter().map(|p| p.image_point)
    }

    pub fn field_points(&self) -> impl Iterator<Item = FieldPoint> + '_ {
        self.points.iter().map(|p| p.field_point)
    }

    pub fn yard_lines(&self) -> BTreeSet<i64> {
        self.points.iter().map(|p| p.yard_line()).collect()
    }

    /// Checks size and yard-line diversity. Geometric degeneracy is left to
    /// the calibrator.
    pub fn validate(&self) -> Result<(), Error> {
        if self.points.len() < MIN_CORRESPONDENCES {
            return Err(Error::InsufficientPoints {
                needed: MIN_CORRESPONDENCES,
                got: self.points.len(),
            });
        }

        let lines = self.yard_lines();
        if lines.len() < MIN_YARD_LINES {
            let yard_line = lines.iter().next().copied().unwrap_or_default();
            return Err(Error::degenerate(Degeneracy::SingleYardLine { yard_line }));
        }

        Ok(())
    }
}

impl FromIterator<CorrespondencePoint> for CorrespondenceStore {
    fn from_iter<I: IntoIterator<Item = CorrespondencePoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
