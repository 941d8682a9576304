use crate::assignment::{min_cost_matching, CostParams};
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;
use crate::predictor::MotionModel;
use crate::projector::{FieldProjector, ProjectionSummary};
use crate::track::{Track, TrackId, TrackParams, TrackReport};
use crate::Tracking;
use serde_derive::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames a track may go unmatched before it is deleted.
    pub max_age: u32,
    /// Hits needed to confirm a track.
    pub n_init: u32,
    /// Predicted-vs-detected IoU below which a pair is never matched.
    pub min_iou: f32,
    pub max_cosine_distance: f32,
    /// Embeddings kept per track.
    pub nn_budget: usize,
    /// Weight of the appearance term when both sides carry embeddings.
    pub appearance_weight: f32,
    pub min_confidence: f32,
    /// Minimum box width and height, px.
    pub min_box_size: f32,
    /// Per-frame cap, highest confidence kept.
    pub max_detections: usize,
    /// Tracked classes; empty tracks everything.
    pub classes: Vec<String>,
    pub motion_model: MotionModel,
    /// Matched centers used for the velocity fit.
    pub velocity_window: usize,
    pub history_len: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            n_init: 2,
            min_iou: 0.3,
            max_cosine_distance: 0.1,
            nn_budget: 50,
            appearance_weight: 0.5,
            min_confidence: 0.3,
            min_box_size: 20.0,
            max_detections: 30,
            classes: vec!["player".into(), "referee".into()],
            motion_model: MotionModel::ConstantVelocity,
            velocity_window: 5,
            history_len: 30,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.n_init == 0 {
            return invalid("tracker.n_init must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.min_iou) {
            return invalid(format!("tracker.min_iou {} outside [0, 1]", self.min_iou));
        }
        if !(0.0..=2.0).contains(&self.max_cosine_distance) {
            return invalid(format!(
                "tracker.max_cosine_distance {} outside [0, 2]",
                self.max_cosine_distance
            ));
        }
        if !(0.0..=1.0).contains(&self.appearance_weight) {
            return invalid(format!(
                "tracker.appearance_weight {} outside [0, 1]",
                self.appearance_weight
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return invalid(format!(
                "tracker.min_confidence {} outside [0, 1]",
                self.min_confidence
            ));
        }
        if !(self.min_box_size >= 0.0) {
            return invalid("tracker.min_box_size must be non-negative".into());
        }
        if self.max_detections == 0 {
            return invalid("tracker.max_detections must be at least 1".into());
        }

        Ok(())
    }

    fn cost_params(&self) -> CostParams {
        CostParams {
            min_iou: self.min_iou,
            max_cosine_distance: self.max_cosine_distance,
            appearance_weight: self.appearance_weight,
        }
    }

    fn track_params(&self) -> TrackParams {
        TrackParams {
            motion_model: self.motion_model,
            velocity_window: self.velocity_window,
            history_len: self.history_len,
            nn_budget: self.nn_budget,
        }
    }
}

/// Confirmed tracks after one frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_number: u64,
    pub timestamp: f64,
    pub tracks: Vec<TrackReport>,
}

/// Frame-to-frame identity assignment. Owns every live track.
pub struct TrackManager {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            tracks: Vec::with_capacity(64),
            next_id: 1,
        })
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live tracks of every state.
    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Indices of the detections worth matching, best first.
    pub fn prefilter(&self, dets: &[Detection]) -> Vec<usize> {
        let cfg = &self.config;

        let mut keep: Vec<usize> = dets
            .iter()
            .enumerate()
            .filter(|(_, d)| cfg.classes.is_empty() || cfg.classes.iter().any(|c| c == d.class()))
            .filter(|(_, d)| d.confidence() >= cfg.min_confidence)
            .filter(|(_, d)| {
                d.bbox().width() >= cfg.min_box_size && d.bbox().height() >= cfg.min_box_size
            })
            .map(|(i, _)| i)
            .collect();

        keep.sort_by(|&a, &b| {
            dets[b]
                .confidence()
                .partial_cmp(&dets[a].confidence())
                .unwrap_or(Ordering::Equal)
        });
        keep.truncate(cfg.max_detections);

        keep
    }

    pub fn update(&mut self, frame: &Frame) -> FrameReport {
        let dets = &frame.detections[..];
        let candidates = self.prefilter(dets);

        for t in self.tracks.iter_mut() {
            t.predict(frame.frame_number);
        }

        let params = self.config.cost_params();

        // confirmed tracks get first pick, then tentative ones
        let confirmed: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| self.tracks[i].is_confirmed())
            .collect();
        let tentative: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| self.tracks[i].is_tentative())
            .collect();

        let first = min_cost_matching(&self.tracks, &confirmed, dets, &candidates, &params);
        let second = min_cost_matching(
            &self.tracks,
            &tentative,
            dets,
            &first.unmatched_detections,
            &params,
        );

        let n_init = self.config.n_init;
        let max_age = self.config.max_age;

        for &(t, d) in first.matches.iter().chain(second.matches.iter()) {
            self.tracks[t].mark_hit(&dets[d], n_init);
        }

        for &t in first
            .unmatched_tracks
            .iter()
            .chain(second.unmatched_tracks.iter())
        {
            self.tracks[t].mark_missed(max_age);
        }

        self.tracks.retain(|t| !t.is_deleted());

        let track_params = self.config.track_params();
        for &d in second.unmatched_detections.iter() {
            let id = TrackId(self.next_id);
            self.next_id += 1;

            let mut track = Track::new(id, &dets[d], track_params);
            track.check_confirmed(n_init);
            log::debug!("track {} started ({})", id, track.class());

            self.tracks.push(track);
        }

        log::debug!(
            "frame {}: {} detections, {} candidates, {} matched, {} live tracks",
            frame.frame_number,
            dets.len(),
            candidates.len(),
            first.matches.len() + second.matches.len(),
            self.tracks.len()
        );

        FrameReport {
            frame_number: frame.frame_number,
            timestamp: frame.timestamp,
            tracks: self.reports(),
        }
    }

    /// Recomputes every field position held by the live tracks, history
    /// included. Needed whenever the homography changes.
    pub fn reproject(&mut self, projector: &FieldProjector) -> ProjectionSummary {
        let mut summary = ProjectionSummary::default();

        for t in self.tracks.iter_mut() {
            match t.reproject(projector) {
                Some(p) if !projector.field().contains(&p) => {
                    summary.projected += 1;
                    summary.off_field += 1;
                }
                Some(_) => summary.projected += 1,
                None => summary.singular += 1,
            }
        }

        summary
    }

    /// Moves the field position of every coasting track to the anchor of its
    /// predicted box. Returns how many tracks were coasting.
    pub fn project_coasting(&mut self, projector: &FieldProjector) -> usize {
        let mut coasting = 0;

        for t in self.tracks.iter_mut().filter(|t| t.time_since_update() > 0) {
            if t.project_current(projector).is_none() {
                log::debug!("track {}: predicted anchor is singular", t.id());
            }
            coasting += 1;
        }

        coasting
    }

    /// Reports of the confirmed tracks, by id.
    pub fn reports(&self) -> Vec<TrackReport> {
        let mut reports: Vec<TrackReport> = self
            .tracks
            .iter()
            .filter(|t| t.is_confirmed())
            .map(Track::report)
            .collect();

        reports.sort_by_key(|r| r.track_id);
        reports
    }
}

impl Tracking for TrackManager {
    #[inline]
    fn update(&mut self, frame: &Frame) -> FrameReport {
        TrackManager::update(self, frame)
    }

    #[inline]
    fn tracks(&self) -> Vec<TrackReport> {
        self.reports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;

    fn det(frame: u64, class: &str, conf: f32, bbox: BBox) -> Detection {
        Detection::new(frame, frame as f64 / 30.0, class, 0, conf, bbox).unwrap()
    }

    fn manager(cfg: TrackerConfig) -> TrackManager {
        TrackManager::new(cfg).unwrap()
    }

    #[test]
    fn prefilter_drops_noise_and_caps_volume() {
        let tm = manager(TrackerConfig {
            max_detections: 2,
            ..Default::default()
        });

        let dets = vec![
            det(0, "player", 0.5, BBox::ltwh(0.0, 0.0, 30.0, 60.0)),
            det(0, "player", 0.1, BBox::ltwh(100.0, 0.0, 30.0, 60.0)),
            det(0, "player", 0.9, BBox::ltwh(200.0, 0.0, 10.0, 60.0)),
            det(0, "ball", 0.9, BBox::ltwh(300.0, 0.0, 30.0, 30.0)),
            det(0, "referee", 0.8, BBox::ltwh(400.0, 0.0, 30.0, 60.0)),
            det(0, "player", 0.7, BBox::ltwh(500.0, 0.0, 30.0, 60.0)),
        ];

        assert_eq!(tm.prefilter(&dets), vec![4, 5]);
    }

    #[test]
    fn empty_frame_ages_tracks() {
        let mut tm = manager(TrackerConfig::default());
        let b = BBox::ltwh(10.0, 10.0, 30.0, 60.0);

        tm.update(&Frame::new(0, 0.0, vec![det(0, "player", 0.9, b)]));
        tm.update(&Frame::new(1, 0.03, vec![]));

        assert_eq!(tm.tracks().len(), 1);
        assert_eq!(tm.tracks()[0].time_since_update(), 1);
        assert_eq!(tm.tracks()[0].age(), 2);
    }

    #[test]
    fn n_init_one_confirms_on_creation() {
        let mut tm = manager(TrackerConfig {
            n_init: 1,
            ..Default::default()
        });

        let r = tm.update(&Frame::new(
            0,
            0.0,
            vec![det(0, "player", 0.9, BBox::ltwh(0.0, 0.0, 30.0, 60.0))],
        ));
        assert_eq!(r.tracks.len(), 1);
        assert_eq!(r.tracks[0].hits, 1);
    }

    #[test]
    fn rejects_bad_config() {
        assert!(TrackManager::new(TrackerConfig {
            n_init: 0,
            ..Default::default()
        })
        .is_err());
        assert!(TrackerConfig {
            min_iou: 1.5,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn config_reads_partial_json() {
        let cfg: TrackerConfig =
            serde_json::from_str(r#"{"max_age": 4, "motion_model": "last_known"}"#).unwrap();
        assert_eq!(cfg.max_age, 4);
        assert_eq!(cfg.n_init, 2);
        assert_eq!(cfg.motion_model, MotionModel::LastKnown);
    }
}
