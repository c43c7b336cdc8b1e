//! Error taxonomy for the Argus adapter.
//!
//! Every failure the adapter can surface lives in [`EngineError`]. The
//! library never terminates the process: an unsupported-layer report comes
//! back as [`EngineError::UnsupportedLayers`] with the full layer list, and
//! the caller decides whether that is fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type EngineResult<T> = Result<T, EngineError>;

/// Everything that can go wrong while loading a model or running requests.
///
/// The enum is `Clone` on purpose: a failed request keeps its error stored
/// so that every later read of that request reports the same failure.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Invalid or incomplete configuration.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The model file does not exist on disk.
    #[error("model file not found: {}", .path.display())]
    ModelNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The device's execution provider cannot run one or more layers of the
    /// loaded graph. The message lists every offending layer.
    #[error("device {} cannot run the following layers: {}", .device, .layers.join(", "))]
    UnsupportedLayers {
        /// Device the model was compiled for.
        device: String,
        /// Layers (op type, and node name when known) without an implementation.
        layers: Vec<String>,
    },

    /// Any other failure reported by the wrapped inference engine.
    #[error("inference engine error: {message}")]
    Backend {
        /// The engine's own diagnostic, verbatim.
        message: String,
    },

    /// A submitted tensor names an input the model does not declare.
    #[error("model has no input named '{name}'")]
    UnknownInput {
        /// The offending input name.
        name: String,
    },

    /// A requested output name is not declared by the model.
    #[error("model has no output named '{name}'")]
    UnknownOutput {
        /// The offending output name.
        name: String,
    },

    /// A declared model input was not fed in a submission.
    #[error("model input '{name}' was not provided")]
    MissingInput {
        /// Name of the input the model still expects.
        name: String,
    },

    /// A submitted tensor's shape contradicts the model's static dimensions.
    #[error("input '{name}' has shape {got:?}, model expects {expected:?}")]
    ShapeMismatch {
        /// Input the tensor was submitted for.
        name: String,
        /// Dimensions declared by the model (`-1` = dynamic).
        expected: Vec<i64>,
        /// Shape that was actually submitted.
        got: Vec<usize>,
    },

    /// Tensor data length does not match the product of its shape.
    #[error("tensor data has {got} elements, shape requires {expected}")]
    ElementCount {
        /// Elements the shape calls for.
        expected: usize,
        /// Elements actually provided.
        got: usize,
    },

    /// Too many requests are already running.
    #[error("request limit reached ({max} in flight)")]
    RequestLimit {
        /// The configured `max_inflight`.
        max: usize,
    },

    /// No request with this id exists (never submitted, or already taken).
    #[error("no request with id {id}")]
    RequestNotFound {
        /// The unknown request id.
        id: u64,
    },

    /// The request exists but has not been resolved with `wait` yet.
    #[error("request {id} has not completed yet (call wait first)")]
    RequestPending {
        /// The still-pending request id.
        id: u64,
    },

    /// The engine produced an output this adapter cannot represent.
    #[error("output '{name}' is not an f32 tensor")]
    OutputType {
        /// Name of the unsupported output.
        name: String,
    },

    /// A blocking inference task was cancelled or panicked.
    #[error("inference worker failed: {reason}")]
    Worker {
        /// Join error description from the runtime.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_layers_message_lists_every_layer() {
        let err = EngineError::UnsupportedLayers {
            device: "cuda".to_string(),
            layers: vec!["FancyNms (nms_post)".to_string(), "GridSample".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("cuda"));
        assert!(msg.contains("FancyNms (nms_post)"));
        assert!(msg.contains("GridSample"));
    }

    #[test]
    fn model_not_found_shows_path() {
        let err = EngineError::ModelNotFound {
            path: PathBuf::from("/models/person-detect.onnx"),
        };
        assert!(err.to_string().contains("person-detect.onnx"));
    }

    #[test]
    fn errors_are_cloneable_for_stored_failures() {
        let err = EngineError::Backend {
            message: "boom".to_string(),
        };
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
