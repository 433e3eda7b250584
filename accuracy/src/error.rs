use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use fingerprinting::FingerprintErr;
use machine_learning::MlErr;
use tokio::task::JoinError;

/// The result type used in the entire accuracy module.
pub type Result<T> = std::result::Result<T, AccuracyErr>;

/// The accuracy module's error type.
#[derive(Debug)]
pub enum AccuracyErr {
    InvalidArgument(String),
    NotReady,
    /// There's no persisted model in the given directory yet.
    ArtifactMissing(PathBuf),
    Io(io::Error),
    NumericInstability(String),
    Corrupt(String),
    Cancelled,
    Ml(MlErr),
    Fingerprint(FingerprintErr),
    Json(serde_json::Error),
    Join(JoinError),
}

impl Display for AccuracyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccuracyErr::InvalidArgument(detail) => format!("Invalid argument: {detail}"),
            AccuracyErr::NotReady => "The accuracy model hasn't been trained or loaded".to_string(),
            AccuracyErr::ArtifactMissing(dir) => {
                format!("There's no persisted model in {}", dir.display())
            }
            AccuracyErr::Io(e) => format!("io error: {e}"),
            AccuracyErr::NumericInstability(detail) => format!("Numeric instability: {detail}"),
            AccuracyErr::Corrupt(detail) => format!("Corrupt model artifact: {detail}"),
            AccuracyErr::Cancelled => "Training was cancelled".to_string(),
            AccuracyErr::Ml(e) => format!("machine learning error: {e}"),
            AccuracyErr::Fingerprint(e) => format!("fingerprinting error: {e}"),
            AccuracyErr::Json(e) => format!("json error: {e}"),
            AccuracyErr::Join(e) => format!("background task failed: {e}"),
        };

        write!(f, "{s}")
    }
}

impl Error for AccuracyErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AccuracyErr::Io(e) => Some(e),
            AccuracyErr::Ml(e) => Some(e),
            AccuracyErr::Fingerprint(e) => Some(e),
            AccuracyErr::Json(e) => Some(e),
            AccuracyErr::Join(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for AccuracyErr {
    fn from(value: MlErr) -> Self {
        match value {
            MlErr::Cancelled { .. } => Self::Cancelled,
            MlErr::Io(e) => Self::Io(e),
            MlErr::Corrupt(detail) => Self::Corrupt(detail),
            MlErr::Json(e) => Self::Corrupt(e.to_string()),
            MlErr::NonFiniteLoss { epoch } => {
                Self::NumericInstability(format!("the loss diverged at epoch {epoch}"))
            }
            e => Self::Ml(e),
        }
    }
}

impl From<FingerprintErr> for AccuracyErr {
    fn from(value: FingerprintErr) -> Self {
        match value {
            FingerprintErr::InvalidArgument(detail) => Self::InvalidArgument(detail),
            FingerprintErr::NumericInstability(detail) => Self::NumericInstability(detail),
            FingerprintErr::Io(e) => Self::Io(e),
            e => Self::Fingerprint(e),
        }
    }
}

impl From<io::Error> for AccuracyErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AccuracyErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<JoinError> for AccuracyErr {
    fn from(value: JoinError) -> Self {
        Self::Join(value)
    }
}
