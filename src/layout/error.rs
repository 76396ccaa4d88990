use thiserror::Error;

/// Failures raised while laying out a flow graph or placing its labels.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("circular link")]
    CircularLink,
    #[error("missing: {0}")]
    MissingNode(String),
    #[error("link {index} has invalid value {value}; values must be finite and non-negative")]
    InvalidLinkValue { index: usize, value: f64 },
    #[error("node {index} has invalid fixed value {value}; values must be finite and non-negative")]
    InvalidNodeValue { index: usize, value: f64 },
    #[error("{offsets} label offsets given for {positions} label positions")]
    MismatchedOffsets { positions: usize, offsets: usize },
    #[error("invalid label canvas size {width}x{height}")]
    InvalidSize { width: f64, height: f64 },
    #[error("unknown label position: {0}")]
    UnknownPosition(String),
}

pub type Result<T> = std::result::Result<T, Error>;
