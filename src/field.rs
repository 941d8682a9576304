//! NCAA field geometry and the yard-marker label grammar.
//!
//! A marker label is `<side><hash><index>`:
//! - side: `n` (near) or `f` (far)
//! - hash: `l` (left) or `r` (right)
//! - index: decimal digits, `1..=5`
//!
//! e.g. `nr3` is the near-side marker 3 on the right hash. Anything else is
//! rejected; there is no best-effort parsing.

use crate::error::Error;
use crate::geometry::{FieldPoint, FEET_PER_YARD};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MARKER_INDEX_MIN: u8 = 1;
pub const MARKER_INDEX_MAX: u8 = 5;

/// Dimensions of the playing surface, in feet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FieldGeometry {
    /// End line to end line, end zones included.
    pub length_ft: f64,
    /// Sideline to sideline.
    pub width_ft: f64,
    /// Distance of each row of hash marks from its sideline.
    pub hash_offset_ft: f64,
    pub end_zone_depth_ft: f64,
}

impl Default for FieldGeometry {
    fn default() -> Self {
        Self {
            length_ft: 360.0,
            width_ft: 160.0,
            hash_offset_ft: 40.0,
            end_zone_depth_ft: 30.0,
        }
    }
}

impl FieldGeometry {
    /// Field x of an absolute yard line (0 at one end line).
    #[inline]
    pub fn yard_line_x(&self, yard_line: i32) -> f64 {
        yard_line as f64 * FEET_PER_YARD
    }

    /// Field y of a hash row.
    #[inline]
    pub fn hash_y(&self, side: HashSide) -> f64 {
        match side {
            HashSide::Left => self.hash_offset_ft,
            HashSide::Right => self.width_ft - self.hash_offset_ft,
        }
    }

    /// Yards along the whole surface.
    #[inline]
    pub fn length_yards(&self) -> f64 {
        self.length_ft / FEET_PER_YARD
    }

    /// Number painted on the field at an absolute yard line: the distance in
    /// yards to the nearer goal line, 0 inside the end zones.
    pub fn painted_number(&self, yard_line: i32) -> i32 {
        let goal = (self.end_zone_depth_ft / FEET_PER_YARD).round() as i32;
        let far_goal = self.length_yards().round() as i32 - goal;

        (yard_line - goal).min(far_goal - yard_line).max(0)
    }

    /// On the playing surface, end zones included.
    pub fn contains(&self, p: &FieldPoint) -> bool {
        (0.0..=self.length_ft).contains(&p.x) && (0.0..=self.width_ft).contains(&p.y)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.length_ft > 0.0 && self.width_ft > 0.0) {
            return Err(Error::InvalidConfig(
                "field length and width must be positive".into(),
            ));
        }

        if !(0.0..=self.width_ft / 2.0).contains(&self.hash_offset_ft) {
            return Err(Error::InvalidConfig(format!(
                "hash offset {} ft does not fit a {} ft wide field",
                self.hash_offset_ft, self.width_ft
            )));
        }

        if !(0.0..self.length_ft / 2.0).contains(&self.end_zone_depth_ft) {
            return Err(Error::InvalidConfig("end zone depth out of range".into()));
        }

        Ok(())
    }
}

/// Marker index to absolute yard line, one table per side of the field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MarkerMapping {
    pub near: [i32; 5],
    pub far: [i32; 5],
}

impl Default for MarkerMapping {
    fn default() -> Self {
        // TODO: index 5 (yard lines 5 / 115) is unverified against surveyed
        // field footage; re-check once calibrated clips with end-zone markers exist.
        Self {
            near: [20, 30, 40, 50, 5],
            far: [80, 90, 100, 110, 115],
        }
    }
}

impl MarkerMapping {
    pub fn yard_line(&self, label: &YardMarkerLabel) -> i32 {
        let slot = (label.index() - MARKER_INDEX_MIN) as usize;

        match label.near_far() {
            NearFar::Near => self.near[slot],
            NearFar::Far => self.far[slot],
        }
    }

    pub fn validate(&self, geometry: &FieldGeometry) -> Result<(), Error> {
        let max = geometry.length_yards();

        for yl in self.near.iter().chain(self.far.iter()) {
            if !(0.0..=max).contains(&(*yl as f64)) {
                return Err(Error::InvalidConfig(format!(
                    "marker yard line {} outside the field (0..={})",
                    yl, max
                )));
            }
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NearFar {
    Near,
    Far,
}

impl NearFar {
    pub fn code(self) -> char {
        match self {
            NearFar::Near => 'n',
            NearFar::Far => 'f',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NearFar::Near => "near",
            NearFar::Far => "far",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HashSide {
    Left,
    Right,
}

impl HashSide {
    pub fn code(self) -> char {
        match self {
            HashSide::Left => 'l',
            HashSide::Right => 'r',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashSide::Left => "left",
            HashSide::Right => "right",
        }
    }
}

/// A parsed yard-marker label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YardMarkerLabel {
    near_far: NearFar,
    left_right: HashSide,
    index: u8,
}

impl YardMarkerLabel {
    pub fn new(near_far: NearFar, left_right: HashSide, index: u8) -> Result<Self, Error> {
        if !(MARKER_INDEX_MIN..=MARKER_INDEX_MAX).contains(&index) {
            return Err(Error::InvalidLabel {
                label: format!("{}{}{}", near_far.code(), left_right.code(), index),
                reason: "marker index must be within 1..=5",
            });
        }

        Ok(Self {
            near_far,
            left_right,
            index,
        })
    }

    pub fn parse(label: &str) -> Result<Self, Error> {
        let invalid = |reason| Error::InvalidLabel {
            label: label.to_string(),
            reason,
        };

        let mut chars = label.chars();

        let near_far = match chars.next().map(|c| c.to_ascii_lowercase()) {
            Some('n') => NearFar::Near,
            Some('f') => NearFar::Far,
            Some(_) => return Err(invalid("first character must be 'n' or 'f'")),
            None => return Err(invalid("empty label")),
        };

        let left_right = match chars.next().map(|c| c.to_ascii_lowercase()) {
            Some('l') => HashSide::Left,
            Some('r') => HashSide::Right,
            Some(_) => return Err(invalid("second character must be 'l' or 'r'")),
            None => return Err(invalid("missing hash side")),
        };

        let digits = chars.as_str();
        if digits.is_empty() {
            return Err(invalid("missing marker index"));
        }

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("marker index must be decimal digits"));
        }

        let index: u8 = digits
            .parse()
            .map_err(|_| invalid("marker index must be within 1..=5"))?;

        if !(MARKER_INDEX_MIN..=MARKER_INDEX_MAX).contains(&index) {
            return Err(invalid("marker index must be within 1..=5"));
        }

        Ok(Self {
            near_far,
            left_right,
            index,
        })
    }

    #[inline]
    pub fn near_far(&self) -> NearFar {
        self.near_far
    }

    #[inline]
    pub fn left_right(&self) -> HashSide {
        self.left_right
    }

    #[inline]
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Expected field position of the marker's hash point.
    pub fn resolve(&self, mapping: &MarkerMapping, geometry: &FieldGeometry) -> ResolvedMarker {
        let yard_line = mapping.yard_line(self);

        ResolvedMarker {
            label: *self,
            yard_line,
            yard_number: geometry.painted_number(yard_line),
            field_point: FieldPoint::new(
                geometry.yard_line_x(yard_line),
                geometry.hash_y(self.left_right),
            ),
        }
    }
}

impl FromStr for YardMarkerLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        YardMarkerLabel::parse(s)
    }
}

impl fmt::Display for YardMarkerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.near_far.code(),
            self.left_right.code(),
            self.index
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMarker {
    pub label: YardMarkerLabel,
    pub yard_line: i32,
    pub yard_number: i32,
    pub field_point: FieldPoint,
}
