use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::error::ParseError;
use crate::core::models::ids::{LabelId, ModelId, ShapeId, SurfaceId};
use crate::core::models::model::ModelError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("The viewer holds no models")]
    NoModels,

    #[error("Model not found: {0}")]
    ModelNotFound(ModelId),

    #[error("Surface not found: {0}")]
    SurfaceNotFound(SurfaceId),

    #[error("Label not found: {0}")]
    LabelNotFound(LabelId),

    #[error("Shape not found: {0}")]
    ShapeNotFound(ShapeId),

    #[error("Invalid structure data: {0}")]
    InvalidFormat(#[from] ParseError),

    #[error("Model invariant violated, operation aborted: {0}")]
    InvariantViolation(#[from] ModelError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this is a lookup miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::NoModels
                | EngineError::ModelNotFound(_)
                | EngineError::SurfaceNotFound(_)
                | EngineError::LabelNotFound(_)
                | EngineError::ShapeNotFound(_)
        )
    }
}
