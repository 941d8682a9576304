//! Frame-sequential driver: projection, then tracking, one frame at a time.
//!
//! Tracker state is carried from frame to frame and mutated in place, so a
//! frame is always fully processed before the next one starts. Cancellation
//! is checked only between frames.

use crate::calibration::{CalibrationReport, Calibrator};
use crate::config::Config;
use crate::correspondence::CorrespondenceStore;
use crate::detector::{detect_frame, ObjectDetector};
use crate::error::Error;
use crate::format::{DetectionFile, FrameRecord, TrackFile};
use crate::frame::{Frame, FrameSource};
use crate::homography::Homography;
use crate::projector::{FieldProjector, ProjectionSummary};
use crate::tracker::{FrameReport, TrackManager};

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag asking a running pipeline to stop at the next frame boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Input frames with `field_coords` attached when calibrated.
    pub transformed: DetectionFile,
    pub tracks: TrackFile,
    pub frames_processed: usize,
    pub projection: ProjectionSummary,
    pub cancelled: bool,
}

impl PipelineOutput {
    fn new(video_info: Value) -> Self {
        Self {
            transformed: DetectionFile {
                video_info: video_info.clone(),
                frames: vec![],
            },
            tracks: TrackFile {
                video_info,
                frames: vec![],
            },
            ..Default::default()
        }
    }

    fn push(&mut self, frame: &Frame, report: FrameReport, summary: ProjectionSummary) {
        self.transformed.frames.push(FrameRecord::from(frame));
        self.tracks.frames.push(report);
        self.projection.projected += summary.projected;
        self.projection.singular += summary.singular;
        self.projection.off_field += summary.off_field;
        self.frames_processed += 1;
    }
}

pub struct Pipeline {
    config: Config,
    calibrator: Calibrator,
    projector: Option<FieldProjector>,
    tracker: TrackManager,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            calibrator: Calibrator::new(config.calibration.clone()),
            tracker: TrackManager::new(config.tracker.clone())?,
            projector: None,
            cancel: CancelToken::new(),
            config,
        })
    }

    pub fn with_homography(mut self, homography: Homography) -> Self {
        self.recalibrate(homography);
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn homography(&self) -> Option<&Homography> {
        self.projector.as_ref().map(FieldProjector::homography)
    }

    #[inline]
    pub fn tracker(&self) -> &TrackManager {
        &self.tracker
    }

    /// A handle that can stop `run`/`run_source` from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Calibrates from `store` and installs the result.
    pub fn calibrate(&mut self, store: &CorrespondenceStore) -> Result<CalibrationReport, Error> {
        let report = self.calibrator.calibrate(store)?;
        self.recalibrate(report.homography);

        Ok(report)
    }

    /// Frames processed from now on use `homography`, and live tracks are
    /// reprojected with it. Field coordinates already written out are stale;
    /// see [`Pipeline::reproject`].
    pub fn recalibrate(&mut self, homography: Homography) {
        if self.projector.is_some() {
            log::info!("homography replaced, earlier field coordinates are stale");
        }

        let projector = FieldProjector::new(homography).with_field(self.config.field.clone());
        let summary = self.tracker.reproject(&projector);
        if summary.singular > 0 {
            log::warn!(
                "{} live tracks have no field position under the new homography",
                summary.singular
            );
        }

        self.projector = Some(projector);
    }

    /// Drops every live track; the next frame starts from scratch.
    pub fn reset_tracks(&mut self) -> Result<(), Error> {
        self.tracker = TrackManager::new(self.config.tracker.clone())?;
        Ok(())
    }

    /// Recomputes `field_coords` of every detection in `input` with the
    /// current homography.
    pub fn reproject(
        &self,
        input: &DetectionFile,
    ) -> Result<(DetectionFile, ProjectionSummary), Error> {
        let projector = self.projector.as_ref().ok_or(Error::NotCalibrated)?;

        let mut frames = input.to_frames();
        let summary = projector.project_frames(&mut frames);

        Ok((
            DetectionFile::from_frames(input.video_info.clone(), &frames),
            summary,
        ))
    }

    /// Projects (when calibrated) and tracks a single frame. Reported field
    /// coordinates always belong to the reported box.
    pub fn process_frame(&mut self, frame: &mut Frame) -> (FrameReport, ProjectionSummary) {
        let projector = match &self.projector {
            Some(p) => p,
            None => return (self.tracker.update(frame), ProjectionSummary::default()),
        };

        let summary = projector.project_frame(frame);
        let mut report = self.tracker.update(frame);

        if self.tracker.project_coasting(projector) > 0 {
            report.tracks = self.tracker.reports();
        }

        (report, summary)
    }

    pub fn run(&mut self, input: &DetectionFile) -> PipelineOutput {
        let mut out = PipelineOutput::new(input.video_info.clone());

        for record in input.frames.iter() {
            if self.cancel.is_cancelled() {
                log::info!("cancelled after {} frames", out.frames_processed);
                out.cancelled = true;
                break;
            }

            let mut frame = record.to_frame();
            let (report, summary) = self.process_frame(&mut frame);
            out.push(&frame, report, summary);
        }

        self.log_summary(&out);
        out
    }

    /// Pulls frames from `source` through `detector` until the source ends
    /// or the run is cancelled.
    pub fn run_source<S, D>(&mut self, source: &mut S, detector: &mut D) -> Result<PipelineOutput, Error>
    where
        S: FrameSource + ?Sized,
        D: ObjectDetector + ?Sized,
    {
        let mut out = PipelineOutput::new(Value::Null);

        loop {
            if self.cancel.is_cancelled() {
                log::info!("cancelled after {} frames", out.frames_processed);
                out.cancelled = true;
                break;
            }

            let raster = match source.next_frame()? {
                Some(raster) => raster,
                None => break,
            };

            let mut frame = detect_frame(detector, &raster)?;
            let (report, summary) = self.process_frame(&mut frame);
            out.push(&frame, report, summary);
        }

        self.log_summary(&out);
        Ok(out)
    }

    fn log_summary(&self, out: &PipelineOutput) {
        log::info!(
            "{} frames processed, {} detections projected ({} off the field), {} singular, {} live tracks",
            out.frames_processed,
            out.projection.projected,
            out.projection.off_field,
            out.projection.singular,
            self.tracker.tracks().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detector::{DetectedObject, Keypoints};
    use crate::frame::RasterFrame;
    use ndarray::Array3;

    struct Counter {
        left: u64,
        next: u64,
    }

    impl FrameSource for Counter {
        fn next_frame(&mut self) -> Result<Option<RasterFrame>, Error> {
            if self.left == 0 {
                return Ok(None);
            }
            self.left -= 1;
            self.next += 1;

            Ok(Some(RasterFrame::new(
                self.next - 1,
                (self.next - 1) as f64 / 30.0,
                Array3::zeros((8, 8, 3)),
            )))
        }
    }

    struct Still;

    impl ObjectDetector for Still {
        fn detect(&mut self, _frame: &RasterFrame) -> Result<Vec<DetectedObject>, Error> {
            Ok(vec![DetectedObject {
                class: "player".into(),
                class_id: 0,
                confidence: 0.9,
                bbox: BBox::ltwh(100.0, 100.0, 40.0, 80.0),
                keypoints: Keypoints::NoKeypoints,
                embedding: None,
            }])
        }
    }

    #[test]
    fn runs_a_frame_source() {
        let mut pipeline = Pipeline::new(Config::default()).unwrap();
        let out = pipeline
            .run_source(&mut Counter { left: 3, next: 0 }, &mut Still)
            .unwrap();

        assert_eq!(out.frames_processed, 3);
        assert!(!out.cancelled);
        assert!(out.tracks.frames[0].tracks.is_empty());
        assert_eq!(out.tracks.frames[2].tracks.len(), 1);
        assert_eq!(out.tracks.frames[2].tracks[0].hits, 3);
    }

    #[test]
    fn cancelled_before_start_processes_nothing() {
        let mut pipeline = Pipeline::new(Config::default()).unwrap();
        pipeline.cancel_token().cancel();

        let out = pipeline
            .run_source(&mut Counter { left: 3, next: 0 }, &mut Still)
            .unwrap();
        assert!(out.cancelled);
        assert_eq!(out.frames_processed, 0);
        assert!(pipeline.tracker().tracks().is_empty());
    }

    #[test]
    fn reproject_requires_homography() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        assert!(matches!(
            pipeline.reproject(&DetectionFile::default()),
            Err(Error::NotCalibrated)
        ));
    }
}
