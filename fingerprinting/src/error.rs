use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire fingerprinting module.
pub type Result<T> = std::result::Result<T, FingerprintErr>;

/// The fingerprinting module's error type.
#[derive(Debug)]
pub enum FingerprintErr {
    InvalidArgument(String),
    NumericInstability(String),
    Io(io::Error),
    Csv(csv::Error),
}

impl FingerprintErr {
    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidArgument(detail.into())
    }
}

impl Display for FingerprintErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FingerprintErr::InvalidArgument(detail) => format!("Invalid argument: {detail}"),
            FingerprintErr::NumericInstability(detail) => {
                format!("Numeric instability: {detail}")
            }
            FingerprintErr::Io(e) => format!("io error: {e}"),
            FingerprintErr::Csv(e) => format!("csv error: {e}"),
        };

        write!(f, "{s}")
    }
}

impl Error for FingerprintErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FingerprintErr::Io(e) => Some(e),
            FingerprintErr::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FingerprintErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for FingerprintErr {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}
