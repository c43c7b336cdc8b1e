//! The shipped [`Backend`] over ONNX Runtime (via the `ort` crate).
//!
//! Everything substantive (graph loading, optimization, device placement,
//! kernel execution) happens inside the engine. This module only converts
//! between the adapter's tensors and the engine's values, and turns the
//! engine's diagnostics into the crate's error taxonomy.
//!
//! Layer support is checked the way the engine itself checks it: during
//! session compilation. A node without an implementation makes
//! `commit_from_file` fail with a diagnostic naming the op; that failure is
//! classified into [`EngineError::UnsupportedLayers`] with the full list.

use std::borrow::Cow;

use regex::Regex;
use tracing::debug;

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    DirectMLExecutionProvider, ExecutionProviderDispatch, OpenVINOExecutionProvider,
    TensorRTExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};

use crate::backend::Backend;
use crate::config::{Device, EngineConfig, OptLevel};
use crate::error::{EngineError, EngineResult};
use crate::tensor::{Tensor, TensorSpec};

impl From<ort::Error> for EngineError {
    fn from(err: ort::Error) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

/// ONNX Runtime as an opaque [`Backend`].
pub struct OnnxBackend {
    session: Session,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
}

impl Backend for OnnxBackend {
    fn load(config: &EngineConfig) -> EngineResult<Self> {
        if !config.model_path.is_file() {
            return Err(EngineError::ModelNotFound {
                path: config.model_path.clone(),
            });
        }

        let mut builder = Session::builder()?
            .with_optimization_level(opt_level(config.graph_optimization))?;
        if let Some(threads) = config.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        let builder = builder
            .with_execution_providers(providers_for(config.device, config.cpu_fallback))?;

        let session = builder
            .commit_from_file(&config.model_path)
            .map_err(|e| classify_load_error(&e, config.device))?;

        let inputs = session
            .inputs
            .iter()
            .map(|i| spec_from(&i.name, i.input_type.tensor_shape()))
            .collect::<EngineResult<Vec<_>>>()?;
        let outputs = session
            .outputs
            .iter()
            .map(|o| spec_from(&o.name, o.output_type.tensor_shape()))
            .collect::<EngineResult<Vec<_>>>()?;

        debug!(
            "onnx session ready: {} on {} ({} inputs, {} outputs)",
            config.model_path.display(),
            config.device,
            inputs.len(),
            outputs.len()
        );

        Ok(Self {
            session,
            inputs,
            outputs,
        })
    }

    fn input_specs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    fn output_specs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn run(&self, inputs: Vec<(String, Tensor)>) -> EngineResult<Vec<(String, Tensor)>> {
        let mut feed: Vec<(Cow<'static, str>, SessionInputValue<'static>)> =
            Vec::with_capacity(inputs.len());
        for (name, tensor) in inputs {
            let (shape, data) = tensor.into_parts();
            let array = ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&shape), data).map_err(
                |e| EngineError::Backend {
                    message: format!("cannot shape input '{name}': {e}"),
                },
            )?;
            let value = ort::value::Tensor::from_array(array)?;
            feed.push((Cow::Owned(name), value.into()));
        }

        let session_outputs = self.session.run(feed)?;

        let mut outputs = Vec::with_capacity(self.outputs.len());
        for spec in &self.outputs {
            let value =
                session_outputs
                    .get(spec.name.as_str())
                    .ok_or_else(|| EngineError::UnknownOutput {
                        name: spec.name.clone(),
                    })?;
            let view = value
                .try_extract_array::<f32>()
                .map_err(|_| EngineError::OutputType {
                    name: spec.name.clone(),
                })?;
            let shape = view.shape().to_vec();
            let data = view.iter().copied().collect();
            outputs.push((spec.name.clone(), Tensor::new(shape, data)?));
        }
        Ok(outputs)
    }
}

/// Builds the execution-provider chain for a device.
///
/// The CPU provider rides at the end of the chain when `cpu_fallback` is
/// set, so layers the device provider cannot place still run. This replaces
/// the CPU extension libraries device plugins used to ship.
fn providers_for(device: Device, cpu_fallback: bool) -> Vec<ExecutionProviderDispatch> {
    let mut providers: Vec<ExecutionProviderDispatch> = Vec::new();
    match device {
        Device::Cpu => {}
        Device::Cuda => providers.push(CUDAExecutionProvider::default().build()),
        Device::TensorRt => providers.push(TensorRTExecutionProvider::default().build()),
        Device::DirectMl => providers.push(DirectMLExecutionProvider::default().build()),
        Device::CoreMl => providers.push(CoreMLExecutionProvider::default().build()),
        Device::OpenVino => providers.push(OpenVINOExecutionProvider::default().build()),
    }
    if device == Device::Cpu || cpu_fallback {
        providers.push(CPUExecutionProvider::default().build());
    }
    providers
}

const fn opt_level(level: OptLevel) -> GraphOptimizationLevel {
    match level {
        OptLevel::Disable => GraphOptimizationLevel::Disable,
        OptLevel::Basic => GraphOptimizationLevel::Level1,
        OptLevel::Full => GraphOptimizationLevel::Level3,
    }
}

fn spec_from(name: &str, dims: Option<&ort::tensor::Shape>) -> EngineResult<TensorSpec> {
    match dims {
        Some(d) => Ok(TensorSpec::new(name, d.to_vec())),
        None => Err(EngineError::Backend {
            message: format!("non-tensor model input/output '{name}' is not supported"),
        }),
    }
}

fn classify_load_error(err: &ort::Error, device: Device) -> EngineError {
    let message = err.to_string();
    let layers = unsupported_layers(&message);
    if layers.is_empty() {
        EngineError::Backend { message }
    } else {
        EngineError::UnsupportedLayers {
            device: device.to_string(),
            layers,
        }
    }
}

/// Extracts the layers named in an engine "no implementation" diagnostic.
///
/// ONNX Runtime reports an unplaceable node as
/// `Could not find an implementation for <Op>(<opset>) node with name '<node>'`;
/// each distinct match becomes one entry, `Op (node)` when the node name is
/// present.
#[must_use]
pub fn unsupported_layers(message: &str) -> Vec<String> {
    let mut layers = Vec::new();
    // If the pattern were ever invalid (our bug), report no matches rather
    // than panic.
    if let Ok(re) = Regex::new(
        r"Could not find an implementation for (?:the )?([A-Za-z0-9_.]+)(?:\([0-9]+\))?(?: node with name '([^']+)')?",
    ) {
        for caps in re.captures_iter(message) {
            let op = caps.get(1).map_or("", |m| m.as_str());
            let layer = match caps.get(2) {
                Some(node) => format!("{op} ({})", node.as_str()),
                None => op.to_string(),
            };
            if !layer.is_empty() && !layers.contains(&layer) {
                layers.push(layer);
            }
        }
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_layer_with_node_name() {
        let msg = "Could not find an implementation for ArgMax(13) node with name 'argmax_1'";
        assert_eq!(unsupported_layers(msg), vec!["ArgMax (argmax_1)"]);
    }

    #[test]
    fn parses_layer_without_node_name() {
        let msg = "NOT_IMPLEMENTED : Could not find an implementation for GridSample";
        assert_eq!(unsupported_layers(msg), vec!["GridSample"]);
    }

    #[test]
    fn parses_multiple_distinct_layers() {
        let msg = "Could not find an implementation for FancyNms(11) node with name 'nms_post'. \
                   Could not find an implementation for GridSample(16) node with name 'warp'. \
                   Could not find an implementation for GridSample(16) node with name 'warp'.";
        assert_eq!(
            unsupported_layers(msg),
            vec!["FancyNms (nms_post)", "GridSample (warp)"]
        );
    }

    #[test]
    fn unrelated_messages_yield_nothing() {
        assert!(unsupported_layers("Load model from m.onnx failed: invalid protobuf").is_empty());
    }

    #[test]
    fn cpu_device_gets_exactly_one_provider() {
        assert_eq!(providers_for(Device::Cpu, true).len(), 1);
        assert_eq!(providers_for(Device::Cpu, false).len(), 1);
    }

    #[test]
    fn accelerator_chain_appends_cpu_only_on_fallback() {
        assert_eq!(providers_for(Device::Cuda, true).len(), 2);
        assert_eq!(providers_for(Device::Cuda, false).len(), 1);
        assert_eq!(providers_for(Device::OpenVino, true).len(), 2);
    }
}
