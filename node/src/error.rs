use std::{fmt, io};

/// All errors that can occur while setting up the node.
#[derive(Debug)]
pub enum NodeErr {
    /// Invalid configuration, caught before touching any data.
    InvalidConfig(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for NodeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for NodeErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NodeErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for NodeErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
