//! Error types for cortexview

/// Result type alias using BrainError
pub type Result<T> = std::result::Result<T, BrainError>;

/// Errors raised while building LUTs, moving the camera, or configuring a brain
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    /// Colormap thresholds are out of order (or not numbers)
    #[error("Must have fmin ({fmin}) <= fmid ({fmid}) <= fmax ({fmax})")]
    InvalidLimits { fmin: f64, fmid: f64, fmax: f64 },

    /// Opacity outside 0..=1
    #[error("alpha must be a finite value in [0, 1], got {0}")]
    InvalidAlpha(f64),

    /// Colormap name not recognized
    #[error("Unknown colormap {name:?}, expected one of: {valid}")]
    UnknownColormap { name: String, valid: String },

    /// Named view not recognized
    #[error("Unknown view {name:?}, expected one of: {valid}")]
    UnknownView { name: String, valid: String },

    /// Hemisphere name not recognized
    #[error("Unknown hemisphere {0:?}, expected one of: lh, rh, both, split")]
    UnknownHemisphere(String),

    /// Camera pose from which no view can be derived
    #[error("Degenerate camera: {0}")]
    DegenerateCamera(String),

    /// Malformed or out-of-range view parameters
    #[error("Invalid view: {0}")]
    InvalidView(String),

    /// Alignment affine whose linear part cannot be inverted
    #[error("Alignment transform is singular (determinant {0})")]
    SingularAlignment(f64),

    /// Time index past the end of the loaded time axis
    #[error("Time index {index} out of range for {len} time points")]
    TimeIndex { index: usize, len: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrainError {
    /// Check if the error came from user-supplied parameters (as opposed to camera state)
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, BrainError::DegenerateCamera(_))
    }
}
