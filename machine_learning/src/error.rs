use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    EmptyModel,
    EmptyDataset,
    FrozenModel,
    InvalidHyperparameter(String),
    NonFiniteLoss {
        epoch: usize,
    },
    Cancelled {
        epoch: usize,
    },
    Corrupt(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch in {what}, got {got} and expected {expected}")
            }
            MlErr::EmptyModel => "The model has no layers".to_string(),
            MlErr::EmptyDataset => "The dataset has no samples".to_string(),
            MlErr::FrozenModel => "Tried to update the parameters of a frozen model".to_string(),
            MlErr::InvalidHyperparameter(detail) => format!("Invalid hyperparameter: {detail}"),
            MlErr::NonFiniteLoss { epoch } => {
                format!("The loss stopped being finite at epoch {epoch}")
            }
            MlErr::Cancelled { epoch } => format!("Training was cancelled before epoch {epoch}"),
            MlErr::Corrupt(detail) => format!("Corrupt model artifact: {detail}"),
            MlErr::Io(e) => format!("io error: {e}"),
            MlErr::Json(e) => format!("json error: {e}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            MlErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
