use burn::record::RecorderError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A parameter (or a pair of consecutive layers) disagree on their shape.
    #[error("shape mismatch for {name}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("layer count mismatch: expected {expected} hidden layers, found {found}")]
    LayerCountMismatch { expected: usize, found: usize },

    #[error("recorder error: {0}")]
    Recorder(#[from] RecorderError),
}
