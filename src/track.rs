use super::ring::Ring;
use super::predictor::{MotionModel, Predictor};
use crate::bbox::BBox;
use crate::detection::Detection;
use crate::geometry::FieldPoint;
use crate::math::cosine_distance;
use crate::projector::FieldProjector;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

const PALETTE: [[u8; 3]; 20] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
    [210, 245, 60],
    [250, 190, 212],
    [0, 128, 128],
    [220, 190, 255],
    [170, 110, 40],
    [255, 250, 200],
    [128, 0, 0],
    [170, 255, 195],
    [128, 128, 0],
    [255, 215, 180],
    [0, 0, 128],
    [128, 128, 128],
];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn display_color(self) -> [u8; 3] {
        PALETTE[(self.0 % PALETTE.len() as u64) as usize]
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub frame_number: u64,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_coords: Option<FieldPoint>,
}

/// Per-track knobs fixed at creation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackParams {
    pub motion_model: MotionModel,
    pub velocity_window: usize,
    pub history_len: usize,
    pub nn_budget: usize,
}

#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    state: TrackState,
    // last matched box
    bbox: BBox,
    predicted: BBox,
    class: String,
    class_id: i32,
    display_color: [u8; 3],
    confidence: f32,
    field_coords: Option<FieldPoint>,
    hits: u32,
    // matches since the last miss
    hit_streak: u32,
    age: u32,
    time_since_update: u32,
    history: Ring<TrackSample>,
    predictor: Predictor,
    features: Ring<Vec<f32>>,
}

impl Track {
    pub(crate) fn new(id: TrackId, det: &Detection, params: TrackParams) -> Self {
        let bbox = *det.bbox();
        let mut history = Ring::new(params.history_len);
        history.push(TrackSample {
            frame_number: det.frame_number(),
            bbox,
            field_coords: det.field_coords(),
        });

        let mut features = Ring::new(params.nn_budget);
        if let Some(e) = det.embedding() {
            features.push(e.to_vec());
        }

        Self {
            id,
            state: TrackState::Tentative,
            bbox,
            predicted: bbox,
            class: det.class().to_string(),
            class_id: det.class_id(),
            display_color: id.display_color(),
            confidence: det.confidence(),
            field_coords: det.field_coords(),
            hits: 1,
            hit_streak: 1,
            age: 1,
            time_since_update: 0,
            history,
            predictor: Predictor::new(
                params.motion_model,
                params.velocity_window,
                det.frame_number(),
                bbox,
            ),
            features,
        }
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    #[inline]
    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    #[inline]
    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    /// Box expected for the frame being matched.
    #[inline]
    pub fn predicted_bbox(&self) -> &BBox {
        &self.predicted
    }

    /// Class at creation; later detections never change it.
    #[inline]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[inline]
    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    #[inline]
    pub fn display_color(&self) -> [u8; 3] {
        self.display_color
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Field position of the current box. A coasting track keeps the
    /// position of its last match until it is reprojected.
    #[inline]
    pub fn field_coords(&self) -> Option<FieldPoint> {
        self.field_coords
    }

    #[inline]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Consecutive matches up to the last frame.
    #[inline]
    pub fn hit_streak(&self) -> u32 {
        self.hit_streak
    }

    #[inline]
    pub fn age(&self) -> u32 {
        self.age
    }

    #[inline]
    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    /// Oldest sample first.
    pub fn history(&self) -> impl Iterator<Item = &TrackSample> {
        self.history.oldest_first()
    }

    #[inline]
    pub fn last_sample(&self) -> Option<&TrackSample> {
        self.history.latest()
    }

    /// Estimated box-center motion, px per frame.
    pub fn velocity(&self) -> (f32, f32) {
        let v = self.predictor.velocity();
        (v.x, v.y)
    }

    /// Last matched box, or the predicted one while coasting.
    #[inline]
    pub fn current_bbox(&self) -> &BBox {
        if self.time_since_update > 0 {
            &self.predicted
        } else {
            &self.bbox
        }
    }

    #[inline]
    pub fn has_features(&self) -> bool {
        !self.features.is_empty()
    }

    /// Smallest cosine distance between `embedding` and the gallery.
    pub fn appearance_distance(&self, embedding: &[f32]) -> Option<f32> {
        self.features
            .oldest_first()
            .map(|f| cosine_distance(f, embedding))
            .fold(None, |acc: Option<f32>, d| {
                Some(acc.map_or(d, |a| a.min(d)))
            })
    }

    /// Advances the track to `frame_number`: one more frame of age and
    /// of absence until a detection is matched.
    pub(crate) fn predict(&mut self, frame_number: u64) {
        self.predicted = self.predictor.predict(frame_number);
        self.age += 1;
        self.time_since_update += 1;
    }

    pub(crate) fn mark_hit(&mut self, det: &Detection, n_init: u32) {
        let bbox = *det.bbox();

        self.bbox = bbox;
        self.predicted = bbox;
        self.confidence = det.confidence();
        self.field_coords = det.field_coords();
        self.hits += 1;
        self.hit_streak += 1;
        self.time_since_update = 0;

        self.predictor.update(det.frame_number(), bbox);
        self.history.push(TrackSample {
            frame_number: det.frame_number(),
            bbox,
            field_coords: det.field_coords(),
        });

        if let Some(e) = det.embedding() {
            self.features.push(e.to_vec());
        }

        self.check_confirmed(n_init);
    }

    pub(crate) fn mark_missed(&mut self, max_age: u32) {
        self.hit_streak = 0;

        if self.time_since_update > max_age {
            self.state = TrackState::Deleted;
            log::info!(
                "track {} deleted after {} frames unmatched",
                self.id,
                self.time_since_update
            );
        }
    }

    /// Tentative to Confirmed after `n_init` consecutive matches.
    pub(crate) fn check_confirmed(&mut self, n_init: u32) {
        if self.is_tentative() && self.hit_streak >= n_init {
            self.state = TrackState::Confirmed;
            log::info!("track {} confirmed ({})", self.id, self.class);
        }
    }

    /// Projects the current box anchor; `None` when it is singular.
    pub(crate) fn project_current(&mut self, projector: &FieldProjector) -> Option<FieldPoint> {
        self.field_coords = projector.project_point(self.current_bbox().anchor()).ok();
        self.field_coords
    }

    /// Recomputes every field position the track holds, history included.
    pub(crate) fn reproject(&mut self, projector: &FieldProjector) -> Option<FieldPoint> {
        for s in self.history.iter_mut() {
            s.field_coords = projector.project_point(s.bbox.anchor()).ok();
        }

        self.project_current(projector)
    }

    pub fn report(&self) -> TrackReport {
        TrackReport {
            track_id: self.id,
            class: self.class.clone(),
            bbox: *self.current_bbox(),
            field_coords: self.field_coords,
            confidence: self.confidence,
            hits: self.hits,
            age: self.age,
            time_since_update: self.time_since_update,
            display_color: self.display_color,
        }
    }
}

/// One confirmed track as reported for a frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackReport {
    pub track_id: TrackId,
    pub class: String,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_coords: Option<FieldPoint>,
    pub confidence: f32,
    pub hits: u32,
    pub age: u32,
    pub time_since_update: u32,
    pub display_color: [u8; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TrackParams {
        TrackParams {
            motion_model: MotionModel::LastKnown,
            velocity_window: 5,
            history_len: 3,
            nn_budget: 2,
        }
    }

    fn det(frame: u64, class: &str, x: f32) -> Detection {
        Detection::new(frame, frame as f64 / 30.0, class, 0, 0.9, BBox::ltwh(x, 0.0, 30.0, 60.0))
            .unwrap()
    }

    #[test]
    fn lifecycle_counters() {
        let mut t = Track::new(TrackId(1), &det(0, "player", 0.0), params());
        assert!(t.is_tentative());
        assert_eq!((t.hits(), t.age(), t.time_since_update()), (1, 1, 0));

        t.predict(1);
        t.mark_hit(&det(1, "referee", 2.0), 2);
        assert!(t.is_confirmed());
        assert_eq!((t.hits(), t.age(), t.time_since_update()), (2, 2, 0));

        // class stays what it was at creation
        assert_eq!(t.class(), "player");

        t.predict(2);
        t.mark_missed(1);
        assert!(t.is_confirmed());
        t.predict(3);
        t.mark_missed(1);
        assert!(t.is_deleted());
    }

    #[test]
    fn history_is_bounded() {
        let mut t = Track::new(TrackId(4), &det(0, "player", 0.0), params());
        for f in 1..6 {
            t.predict(f);
            t.mark_hit(&det(f, "player", f as f32), 2);
        }

        let frames: Vec<u64> = t.history().map(|s| s.frame_number).collect();
        assert_eq!(frames, vec![3, 4, 5]);
        assert_eq!(t.last_sample().map(|s| s.frame_number), Some(5));
    }

    #[test]
    fn color_comes_from_id() {
        let a = Track::new(TrackId(3), &det(0, "player", 0.0), params());
        let b = Track::new(TrackId(23), &det(0, "player", 0.0), params());
        assert_eq!(a.display_color(), b.display_color());
        assert_eq!(a.display_color(), PALETTE[3]);
    }

    #[test]
    fn gallery_keeps_closest_embedding() {
        let first = det(0, "player", 0.0).with_embedding(vec![1.0, 0.0]);
        let mut t = Track::new(TrackId(1), &first, params());
        t.predict(1);
        t.mark_hit(&det(1, "player", 0.0).with_embedding(vec![0.0, 1.0]), 2);

        let d = t.appearance_distance(&[0.0, 1.0]).unwrap();
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn miss_breaks_the_streak() {
        let mut t = Track::new(TrackId(1), &det(0, "player", 0.0), params());
        t.predict(1);
        t.mark_missed(10);
        assert_eq!(t.hit_streak(), 0);

        t.predict(2);
        t.mark_hit(&det(2, "player", 0.0), 2);
        assert!(t.is_tentative());
        assert_eq!((t.hits(), t.hit_streak()), (2, 1));

        t.predict(3);
        t.mark_hit(&det(3, "player", 0.0), 2);
        assert!(t.is_confirmed());
    }

    #[test]
    fn reproject_follows_new_homography() {
        use crate::homography::Homography;
        use nalgebra::Matrix3;

        let half = Homography::new(Matrix3::new(0.5, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0)).unwrap();
        let quarter = Homography::new(Matrix3::new(0.25, 0.0, 0.0, 0.0, 0.25, 0.0, 0.0, 0.0, 1.0)).unwrap();

        let mut t = Track::new(TrackId(1), &det(0, "player", 0.0), params());
        t.reproject(&FieldProjector::new(half));
        assert_eq!(t.field_coords(), Some(FieldPoint::new(7.5, 30.0)));

        t.predict(1);
        t.reproject(&FieldProjector::new(quarter));
        assert_eq!(t.field_coords(), Some(FieldPoint::new(3.75, 15.0)));
        assert_eq!(
            t.last_sample().and_then(|s| s.field_coords),
            Some(FieldPoint::new(3.75, 15.0))
        );
    }

    #[test]
    fn coasting_report_uses_prediction() {
        let mut t = Track::new(TrackId(1), &det(0, "player", 0.0), params());
        t.predict(1);
        let r = t.report();
        assert_eq!(r.time_since_update, 1);
        assert_eq!(r.bbox, *t.predicted_bbox());
    }
}
