//! The seam between the adapter and the external inference engine.
//!
//! [`crate::engine::NeuralEngine`] is generic over a [`Backend`] so the
//! request machinery can be exercised against a scripted backend in tests
//! while production code runs the real engine
//! ([`crate::onnx::OnnxBackend`]). The backend is deliberately opaque: the
//! adapter never looks at model bytes, graph structure or kernels.
//! Everything it knows comes through this trait.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::tensor::{Tensor, TensorSpec};

/// An inference engine as the adapter sees it.
///
/// All three operations are blocking; the engine wraps them in
/// `spawn_blocking`. Implementations must tolerate concurrent `run` calls.
pub trait Backend: Send + Sync + Sized + 'static {
    /// Reads the model and compiles it for the configured device.
    ///
    /// Returns [`crate::error::EngineError::UnsupportedLayers`] when the
    /// device's provider cannot place one or more layers of the graph.
    fn load(config: &EngineConfig) -> EngineResult<Self>;

    /// Inputs the loaded graph declares, in declaration order.
    fn input_specs(&self) -> &[TensorSpec];

    /// Outputs the loaded graph declares, in declaration order.
    fn output_specs(&self) -> &[TensorSpec];

    /// Runs one inference, returning every output in declaration order.
    fn run(&self, inputs: Vec<(String, Tensor)>) -> EngineResult<Vec<(String, Tensor)>>;
}
