use super::ring::Ring;
use super::math::linear_ls;
use crate::bbox::BBox;
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MotionModel {
    ConstantVelocity,
    LastKnown,
}

impl Default for MotionModel {
    fn default() -> Self {
        MotionModel::ConstantVelocity
    }
}

/// Box motion estimate from the recent matched centers.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: MotionModel,
    samples: Ring<(u64, na::Point2<f32>)>,
    last: BBox,
    last_frame: u64,
    // px per frame
    velocity: na::Vector2<f32>,
}

impl Predictor {
    pub fn new(model: MotionModel, window: usize, frame_number: u64, bbox: BBox) -> Self {
        let mut p = Self {
            model,
            samples: Ring::new(window.max(2)),
            last: bbox,
            last_frame: frame_number,
            velocity: na::Vector2::zeros(),
        };

        p.samples.push((frame_number, center(&bbox)));
        p
    }

    pub fn update(&mut self, frame_number: u64, bbox: BBox) {
        self.samples.push((frame_number, center(&bbox)));
        self.last = bbox;
        self.last_frame = frame_number;

        self.velocity = match self.model {
            MotionModel::ConstantVelocity => self.fit_velocity(),
            MotionModel::LastKnown => na::Vector2::zeros(),
        };
    }

    #[inline]
    pub fn velocity(&self) -> na::Vector2<f32> {
        self.velocity
    }

    /// Expected box at `frame_number`.
    pub fn predict(&self, frame_number: u64) -> BBox {
        let dt = frame_number.saturating_sub(self.last_frame) as f32;
        let offset = self.velocity * dt;

        self.last.translate(offset.x, offset.y)
    }

    fn fit_velocity(&self) -> na::Vector2<f32> {
        if self.samples.len() < 2 {
            return na::Vector2::zeros();
        }

        // frames relative to the newest sample
        let t: Vec<f32> = self
            .samples
            .oldest_first()
            .map(|(f, _)| *f as f32 - self.last_frame as f32)
            .collect();
        let xs: Vec<f32> = self.samples.oldest_first().map(|(_, p)| p.x).collect();
        let ys: Vec<f32> = self.samples.oldest_first().map(|(_, p)| p.y).collect();

        let t = na::DVector::from_vec(t);
        let vx = linear_ls(t.clone(), na::DVector::from_vec(xs)).map(|m| m[0]);
        let vy = linear_ls(t, na::DVector::from_vec(ys)).map(|m| m[0]);

        match (vx, vy) {
            (Some(vx), Some(vy)) => na::Vector2::new(vx, vy),
            _ => na::Vector2::zeros(),
        }
    }
}

#[inline]
fn center(bbox: &BBox) -> na::Point2<f32> {
    na::Point2::new(bbox.center_x(), bbox.center_y())
}
