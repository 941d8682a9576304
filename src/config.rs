use crate::calibration::CalibrationConfig;
use crate::detector::DecoderConfig;
use crate::error::Error;
use crate::field::{FieldGeometry, MarkerMapping};
use crate::format::load_json;
use crate::tracker::TrackerConfig;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the whole pipeline. Keys missing from a config file keep
/// their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub calibration: CalibrationConfig,
    pub field: FieldGeometry,
    pub markers: MarkerMapping,
    pub decoder: DecoderConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let config: Config = load_json(path)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.tracker.validate()?;
        self.calibration.validate()?;
        self.field.validate()?;
        self.markers.validate(&self.field)?;

        if !(0.0..=1.0).contains(&self.decoder.confidence_threshold)
            || !(0.0..=1.0).contains(&self.decoder.iou_threshold)
        {
            return Err(Error::InvalidConfig(
                "decoder thresholds must be within [0, 1]".into(),
            ));
        }

        Ok(())
    }
}
