use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which geometric constraint a correspondence set failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Degeneracy {
    CollinearImagePoints,
    CollinearFieldPoints,
    SingleYardLine { yard_line: i64 },
    RankDeficient,
    SingularHomography,
    MismatchedLengths { image: usize, field: usize },
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degeneracy::CollinearImagePoints => write!(f, "image points are (nearly) collinear"),
            Degeneracy::CollinearFieldPoints => write!(f, "field points are (nearly) collinear"),
            Degeneracy::SingleYardLine { yard_line } => write!(
                f,
                "all points lie on yard line {}, need at least 2 distinct yard lines",
                yard_line
            ),
            Degeneracy::RankDeficient => {
                write!(f, "linear system is rank deficient (no unique solution)")
            }
            Degeneracy::SingularHomography => write!(f, "estimated homography is singular"),
            Degeneracy::MismatchedLengths { image, field } => write!(
                f,
                "{} image points but {} field points",
                image, field
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("insufficient correspondence points: need {needed}, got {got}")]
    InsufficientPoints { needed: usize, got: usize },

    #[error("degenerate correspondence configuration: {0}")]
    DegenerateConfiguration(Degeneracy),

    #[error("invalid yard marker label {label:?}: {reason}")]
    InvalidLabel { label: String, reason: &'static str },

    #[error("singular projection of ({x}, {y}): homogeneous scale {w:e}")]
    SingularProjection { x: f64, y: f64, w: f64 },

    #[error("missing input file: {}", .0.display())]
    MissingInputFile(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid detection: {0}")]
    InvalidDetection(String),

    #[error("no homography: calibrate first")]
    NotCalibrated,

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tensor shape Error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    pub(crate) fn degenerate(kind: Degeneracy) -> Self {
        Error::DegenerateConfiguration(kind)
    }
}
