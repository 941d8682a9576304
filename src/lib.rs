//! Football player tracking in field coordinates.
//!
//! Per-frame detections are projected onto the field through a
//! camera-to-field [`Homography`] estimated from yard-marker correspondences,
//! then stitched into persistent identities by the [`TrackManager`].

pub mod assignment;
pub mod bbox;
pub mod calibration;
pub mod config;
pub mod correspondence;
pub mod detection;
pub mod detector;
pub mod error;
pub mod field;
pub mod format;
pub mod frame;
pub mod geometry;
pub mod homography;
pub mod math;
pub mod pipeline;
pub mod projector;
pub mod track;
pub mod tracker;

mod predictor;
mod ring;

pub use bbox::BBox;
pub use calibration::{CalibrationConfig, CalibrationReport, Calibrator};
pub use config::Config;
pub use correspondence::{CorrespondencePoint, CorrespondenceStore, MarkerObservation};
pub use detection::Detection;
pub use error::{Degeneracy, Error};
pub use field::{FieldGeometry, MarkerMapping, YardMarkerLabel};
pub use frame::Frame;
pub use geometry::{FieldPoint, PixelPoint};
pub use homography::Homography;
pub use pipeline::{CancelToken, Pipeline, PipelineOutput};
pub use predictor::MotionModel;
pub use projector::FieldProjector;
pub use track::{Track, TrackId, TrackReport, TrackState};
pub use tracker::{FrameReport, TrackManager, TrackerConfig};

/// Frame-by-frame identity tracking.
pub trait Tracking {
    fn update(&mut self, frame: &Frame) -> FrameReport;

    /// Confirmed tracks after the last update.
    fn tracks(&self) -> Vec<TrackReport>;
}
