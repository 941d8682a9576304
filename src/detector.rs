//! Boundary with the external object detector.
//!
//! Whatever the model emits is turned into [`DetectedObject`]s here, once.
//! Optional outputs such as pose keypoints are decided at this point and
//! carried as a tagged [`Keypoints`] value; nothing downstream inspects the
//! raw model output.

use crate::bbox::BBox;
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::{Frame, RasterFrame};
use crate::geometry::PixelPoint;

use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Keypoints {
    NoKeypoints,
    Keypoints(Vec<PixelPoint>),
}

impl Keypoints {
    pub fn len(&self) -> usize {
        match self {
            Keypoints::NoKeypoints => 0,
            Keypoints::Keypoints(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    pub class: String,
    pub class_id: i32,
    pub confidence: f32,
    pub bbox: BBox,
    pub keypoints: Keypoints,
    pub embedding: Option<Vec<f32>>,
}

impl DetectedObject {
    pub fn into_detection(self, frame_number: u64, timestamp: f64) -> Result<Detection, Error> {
        let det = Detection::new(
            frame_number,
            timestamp,
            self.class,
            self.class_id,
            self.confidence,
            self.bbox,
        )?;

        Ok(match self.embedding {
            Some(e) => det.with_embedding(e),
            None => det,
        })
    }
}

/// An object detector model, treated as a black box.
pub trait ObjectDetector {
    fn detect(&mut self, frame: &RasterFrame) -> Result<Vec<DetectedObject>, Error>;
}

/// Runs `detector` on `raster` and builds the frame's detections. Objects
/// the detector reports with impossible values are dropped with a warning.
pub fn detect_frame<D: ObjectDetector + ?Sized>(
    detector: &mut D,
    raster: &RasterFrame,
) -> Result<Frame, Error> {
    let objects = detector.detect(raster)?;
    let mut detections = Vec::with_capacity(objects.len());

    for obj in objects {
        match obj.into_detection(raster.frame_number, raster.timestamp) {
            Ok(det) => detections.push(det),
            Err(err) => log::warn!("frame {}: dropping detection: {}", raster.frame_number, err),
        }
    }

    Ok(Frame {
        frame_number: raster.frame_number,
        timestamp: raster.timestamp,
        detections,
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Class names, indexed by the model's class id.
    pub class_names: Vec<String>,
    /// Keypoints per row after the class scores, `(x, y, conf)` each.
    /// Zero for a plain detection model.
    pub num_keypoints: usize,
    /// Keypoints below this confidence are dropped.
    pub keypoint_threshold: f32,
    /// Model input size `(width, height)` the coordinates are relative to.
    pub input_size: (u32, u32),
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            iou_threshold: 0.45,
            class_names: vec!["player".into(), "referee".into()],
            num_keypoints: 0,
            keypoint_threshold: 0.5,
            input_size: (640, 640),
        }
    }
}

/// Decodes YOLO-style prediction rows:
/// `[cx, cy, w, h, class scores..., (kx, ky, kconf) * K]`
/// in model-input pixels.
pub struct YoloDecoder {
    config: DecoderConfig,
}

impl YoloDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    #[inline]
    fn num_classes(&self) -> usize {
        self.config.class_names.len()
    }

    /// `preds` has one row per candidate. Coordinates are rescaled from the
    /// model input to `frame_dims`.
    pub fn decode(
        &self,
        preds: ArrayView2<'_, f32>,
        frame_dims: (u32, u32),
    ) -> Result<Vec<DetectedObject>, Error> {
        let row_len = 4 + self.num_classes() + 3 * self.config.num_keypoints;
        if preds.ncols() != row_len {
            return Err(Error::Shape(ndarray::ShapeError::from_kind(
                ndarray::ErrorKind::IncompatibleShape,
            )));
        }

        let (in_w, in_h) = self.config.input_size;
        let sx = frame_dims.0 as f32 / in_w as f32;
        let sy = frame_dims.1 as f32 / in_h as f32;

        // Candidates grouped by class index for per-class suppression.
        let mut by_class: Vec<Vec<DetectedObject>> =
            (0..self.num_classes()).map(|_| vec![]).collect();

        for row in preds.outer_iter() {
            let (cx, cy, w, h) = (row[0] * sx, row[1] * sy, row[2] * sx, row[3] * sy);
            let scores = row.slice(s![4..4 + self.num_classes()]);

            let best = scores
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

            let (class_index, confidence) = match best {
                Some(best) => best,
                None => continue,
            };

            if confidence <= self.config.confidence_threshold {
                continue;
            }

            let bbox = BBox::ltrb(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0);
            if !bbox.is_valid() {
                continue;
            }

            let keypoints = self.decode_keypoints(row, sx, sy);

            by_class[class_index].push(DetectedObject {
                class: self.config.class_names[class_index].clone(),
                class_id: class_index as i32,
                confidence: confidence.min(1.0),
                bbox,
                keypoints,
                embedding: None,
            });
        }

        let mut results = Vec::new();
        for dets in by_class.into_iter() {
            results.extend(self.non_maximum_suppression(dets));
        }

        Ok(results)
    }

    fn decode_keypoints(&self, row: ArrayView1<'_, f32>, sx: f32, sy: f32) -> Keypoints {
        if self.config.num_keypoints == 0 {
            return Keypoints::NoKeypoints;
        }

        let offset = 4 + self.num_classes();
        let points = row
            .slice(s![offset..])
            .exact_chunks(3)
            .into_iter()
            .filter(|k| k[2] >= self.config.keypoint_threshold)
            .map(|k| PixelPoint::new((k[0] * sx) as f64, (k[1] * sy) as f64))
            .collect();

        Keypoints::Keypoints(points)
    }

    /// Greedy suppression, highest confidence first.
    fn non_maximum_suppression(&self, mut dets: Vec<DetectedObject>) -> Vec<DetectedObject> {
        dets.sort_unstable_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut kept: Vec<DetectedObject> = Vec::with_capacity(dets.len());
        for det in dets {
            if kept
                .iter()
                .all(|k| k.bbox.iou(&det.bbox) <= self.config.iou_threshold)
            {
                kept.push(det);
            }
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn decodes_and_suppresses_overlaps() {
        let decoder = YoloDecoder::new(DecoderConfig {
            input_size: (100, 100),
            ..Default::default()
        });

        let preds = array![
            [50.0, 50.0, 10.0, 20.0, 0.9, 0.1],
            [51.0, 50.0, 10.0, 20.0, 0.8, 0.1],
            [20.0, 20.0, 10.0, 20.0, 0.1, 0.7],
            [80.0, 80.0, 10.0, 20.0, 0.2, 0.1],
        ];

        let objs = decoder.decode(preds.view(), (200, 100)).unwrap();
        assert_eq!(objs.len(), 2);

        let player = objs.iter().find(|o| o.class == "player").unwrap();
        assert_eq!(player.class_id, 0);
        assert!((player.confidence - 0.9).abs() < 1e-6);
        assert!((player.bbox.center_x() - 100.0).abs() < 1e-4);
        assert!((player.bbox.width() - 20.0).abs() < 1e-4);
        assert_eq!(player.keypoints, Keypoints::NoKeypoints);

        assert!(objs.iter().any(|o| o.class == "referee"));
    }

    #[test]
    fn keypoints_are_decided_once() {
        let decoder = YoloDecoder::new(DecoderConfig {
            class_names: vec!["player".into()],
            num_keypoints: 2,
            input_size: (100, 100),
            ..Default::default()
        });

        let preds = array![[50.0, 50.0, 10.0, 20.0, 0.9, 48.0, 45.0, 0.9, 52.0, 58.0, 0.1]];
        let objs = decoder.decode(preds.view(), (100, 100)).unwrap();

        assert_eq!(
            objs[0].keypoints,
            Keypoints::Keypoints(vec![PixelPoint::new(48.0, 45.0)])
        );
    }

    #[test]
    fn rejects_wrong_row_length() {
        let decoder = YoloDecoder::new(DecoderConfig::default());
        let preds = array![[1.0f32, 2.0, 3.0]];
        assert!(matches!(
            decoder.decode(preds.view(), (10, 10)),
            Err(Error::Shape(_))
        ));
    }

    struct Fixed(Vec<DetectedObject>);

    impl ObjectDetector for Fixed {
        fn detect(&mut self, _frame: &RasterFrame) -> Result<Vec<DetectedObject>, Error> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn detect_frame_drops_invalid_objects() {
        let good = DetectedObject {
            class: "player".into(),
            class_id: 0,
            confidence: 0.8,
            bbox: BBox::ltrb(0.0, 0.0, 30.0, 60.0),
            keypoints: Keypoints::NoKeypoints,
            embedding: None,
        };
        let bad = DetectedObject {
            confidence: 3.0,
            ..good.clone()
        };

        let raster = RasterFrame::new(7, 0.25, Array3::zeros((4, 4, 3)));
        let frame = detect_frame(&mut Fixed(vec![good, bad]), &raster).unwrap();

        assert_eq!(frame.frame_number, 7);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.detections[0].class(), "player");
    }

    struct Canned {
        decoder: YoloDecoder,
        preds: ndarray::Array2<f32>,
    }

    impl ObjectDetector for Canned {
        fn detect(&mut self, frame: &RasterFrame) -> Result<Vec<DetectedObject>, Error> {
            self.decoder.decode(self.preds.view(), frame.dims())
        }
    }

    #[test]
    fn decoder_scales_to_frame_size() {
        let mut det = Canned {
            decoder: YoloDecoder::new(DecoderConfig {
                input_size: (100, 100),
                ..Default::default()
            }),
            preds: array![[50.0, 50.0, 10.0, 20.0, 0.9, 0.1]],
        };

        // 200 px wide, 100 px high
        let raster = RasterFrame::new(0, 0.0, Array3::zeros((100, 200, 3)));
        let frame = detect_frame(&mut det, &raster).unwrap();

        let bbox = frame.detections[0].bbox();
        assert!((bbox.center_x() - 100.0).abs() < 1e-4);
        assert!((bbox.height() - 20.0).abs() < 1e-4);
    }
}
