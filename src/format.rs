//! JSON file shapes read and written by the pipeline.
//!
//! Key order is irrelevant; unknown keys are ignored on read. `video_info`
//! and `metadata` are passed through untouched.

use crate::bbox::BBox;
use crate::calibration::CalibrationReport;
use crate::correspondence::{CorrespondencePoint, CorrespondenceStore, MarkerObservation};
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;
use crate::geometry::FieldPoint;
use crate::tracker::FrameReport;

use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub class: String,
    #[serde(default)]
    pub class_id: i32,
    pub confidence: f32,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_coords: Option<FieldPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        Self {
            class: d.class().to_string(),
            class_id: d.class_id(),
            confidence: d.confidence(),
            bbox: *d.bbox(),
            field_coords: d.field_coords(),
            embedding: d.embedding().map(<[f32]>::to_vec),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub frame_number: u64,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
}

impl FrameRecord {
    /// Builds the frame, dropping (with a warning) detections that fail
    /// validation.
    pub fn to_frame(&self) -> Frame {
        let detections = self
            .detections
            .iter()
            .filter_map(|r| {
                let det = Detection::new(
                    self.frame_number,
                    self.timestamp,
                    r.class.clone(),
                    r.class_id,
                    r.confidence,
                    r.bbox,
                );

                match det {
                    Ok(mut det) => {
                        if let Some(e) = &r.embedding {
                            det = det.with_embedding(e.clone());
                        }
                        det.set_field_coords(r.field_coords);
                        Some(det)
                    }
                    Err(err) => {
                        log::warn!("frame {}: skipping detection: {}", self.frame_number, err);
                        None
                    }
                }
            })
            .collect();

        Frame::new(self.frame_number, self.timestamp, detections)
    }
}

impl From<&Frame> for FrameRecord {
    fn from(f: &Frame) -> Self {
        Self {
            frame_number: f.frame_number,
            timestamp: f.timestamp,
            detections: f.iter().map(DetectionRecord::from).collect(),
        }
    }
}

/// Detection file and, with `field_coords` set, the transformed file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DetectionFile {
    #[serde(default)]
    pub video_info: Value,
    pub frames: Vec<FrameRecord>,
}

impl DetectionFile {
    pub fn to_frames(&self) -> Vec<Frame> {
        self.frames.iter().map(FrameRecord::to_frame).collect()
    }

    pub fn from_frames(video_info: Value, frames: &[Frame]) -> Self {
        Self {
            video_info,
            frames: frames.iter().map(FrameRecord::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceFile {
    pub correspondences: Vec<CorrespondencePoint>,
    #[serde(default)]
    pub metadata: Value,
}

impl CorrespondenceFile {
    pub fn store(&self) -> CorrespondenceStore {
        CorrespondenceStore::from_points(self.correspondences.clone())
    }
}

/// Yard markers detected in a calibration image.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MarkerFile {
    pub markers: Vec<MarkerObservation>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TrackFile {
    #[serde(default)]
    pub video_info: Value,
    pub frames: Vec<FrameReport>,
}

/// Output of the `calibrate` step; loadable wherever a homography is needed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CalibrationFile {
    #[serde(flatten)]
    pub report: CalibrationReport,
    #[serde(default)]
    pub metadata: Value,
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(Error::MissingInputFile(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };

    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn save_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reads_detection_file() {
        let json = r#"{
            "video_info": {"fps": 30, "width": 1280},
            "frames": [
              {"frame_number": 0, "timestamp": 0.0, "detections": [
                {"class": "player", "class_id": 0, "confidence": 0.87,
                 "bbox": {"x1": 592.0, "y1": 381.0, "x2": 618.0, "y2": 445.0,
                          "width": 999.0, "height": 64.0, "center_x": 605.0, "center_y": 413.0}},
                {"class": "player", "class_id": 0, "confidence": 1.7,
                 "bbox": {"x1": 0.0, "y1": 0.0, "x2": 10.0, "y2": 10.0}}
              ]},
              {"frame_number": 1, "timestamp": 0.033, "detections": []}
            ]
        }"#;

        let file: DetectionFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.video_info["fps"], 30);

        let frames = file.to_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 1);
        assert!(frames[1].is_empty());

        let det = &frames[0].detections[0];
        assert_eq!(det.frame_number(), 0);
        // derived fields are recomputed from the corners
        assert_relative_eq!(det.bbox().width(), 26.0);
        assert!(det.field_coords().is_none());
    }

    #[test]
    fn transformed_file_carries_field_coords() {
        let mut frame = Frame::new(
            4,
            0.5,
            vec![Detection::new(4, 0.5, "referee", 1, 0.6, BBox::ltrb(1.0, 2.0, 30.0, 60.0)).unwrap()],
        );
        frame.detections[0].set_field_coords(Some(FieldPoint::new(150.0, 80.0)));

        let file = DetectionFile::from_frames(Value::Null, &[frame]);
        let value = serde_json::to_value(&file).unwrap();
        let det = &value["frames"][0]["detections"][0];

        assert_eq!(det["field_coords"]["x"], 150.0);
        assert_eq!(det["bbox"]["center_x"], 15.5);
        assert!(det.get("embedding").is_none());

        let back: DetectionFile = serde_json::from_value(value).unwrap();
        let frames = back.to_frames();
        assert_eq!(
            frames[0].detections[0].field_coords(),
            Some(FieldPoint::new(150.0, 80.0))
        );
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let err = load_json::<DetectionFile>(Path::new("/nonexistent/detections.json")).unwrap_err();
        assert!(matches!(err, Error::MissingInputFile(_)));
    }
}
