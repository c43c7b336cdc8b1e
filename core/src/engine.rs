//! The inference engine adapter: load a model, start asynchronous requests,
//! wait on them, read their outputs.
//!
//! [`NeuralEngine`] is the async-native rendition of the classic device
//! wrapper: every substantive operation is delegated to the [`Backend`], and
//! the adapter only keeps track of in-flight requests. Blocking backend
//! calls ride `spawn_blocking`, so the surrounding runtime stays responsive
//! while the engine crunches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::{self, JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::config::{Device, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::observer::{MetaObserver, MetricsSnapshot};
use crate::tensor::{Tensor, TensorSpec};

/// Identifier of one asynchronous inference request.
///
/// Ids are assigned by the engine, monotonically, and never reused for the
/// engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    /// The raw id value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tracked request.
enum Request {
    /// Still running on the blocking pool.
    Running {
        handle: JoinHandle<EngineResult<Vec<(String, Tensor)>>>,
        started: Instant,
    },
    /// Resolved with outputs, readable until taken.
    Done { outputs: Vec<(String, Tensor)> },
    /// Resolved with an error; every later read reports it again.
    Failed { error: EngineError },
}

/// Asynchronous adapter around an opaque inference backend.
///
/// ```text
/// ┌──────────────────────────────┐
/// │         NeuralEngine         │
/// │  submit ─► spawn_blocking ─┐ │
/// │  wait   ◄── JoinHandle ◄───┘ │
/// │  output ◄── stored results   │
/// │            ┌───────────────┐ │
/// │            │   Backend     │ │  the external engine
/// │            └───────────────┘ │
/// └──────────────────────────────┘
/// ```
pub struct NeuralEngine<B: Backend> {
    id: Uuid,
    backend: Arc<B>,
    device: Device,
    max_inflight: usize,
    requests: HashMap<RequestId, Request>,
    next_id: u64,
    observer: MetaObserver,
}

impl<B: Backend> NeuralEngine<B> {
    /// Loads the model described by `config` and readies the adapter.
    ///
    /// When the device's provider cannot run some layers and
    /// `config.cpu_fallback` is set, the load is retried once on the CPU
    /// (the offending layers are logged at warn level). With fallback
    /// disabled, or when even the CPU lacks the layers, the layer list is
    /// logged at error level and the failure is returned; the library never
    /// exits the process on its own.
    pub async fn load(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let (backend, device) = match Self::load_backend(config.clone()).await {
            Ok(backend) => (backend, config.device),
            Err(EngineError::UnsupportedLayers { device, layers })
                if config.cpu_fallback && config.device != Device::Cpu =>
            {
                warn!(
                    "device {} cannot run [{}]; retrying on cpu",
                    device,
                    layers.join(", ")
                );
                let mut cpu_config = config.clone();
                cpu_config.device = Device::Cpu;
                match Self::load_backend(cpu_config).await {
                    Ok(backend) => (backend, Device::Cpu),
                    Err(err) => return Err(Self::log_load_failure(err)),
                }
            }
            Err(err) => return Err(Self::log_load_failure(err)),
        };

        let id = Uuid::new_v4();
        info!(
            "engine {id} — model {} on {device}",
            config.model_path.display()
        );

        Ok(Self {
            id,
            backend: Arc::new(backend),
            device,
            max_inflight: config.max_inflight,
            requests: HashMap::new(),
            next_id: 0,
            observer: MetaObserver::new(),
        })
    }

    async fn load_backend(config: EngineConfig) -> EngineResult<B> {
        task::spawn_blocking(move || B::load(&config))
            .await
            .map_err(|e| EngineError::Worker {
                reason: e.to_string(),
            })?
    }

    fn log_load_failure(err: EngineError) -> EngineError {
        if let EngineError::UnsupportedLayers { device, layers } = &err {
            error!(
                "the following layers are not supported on device {}: {}",
                device,
                layers.join(", ")
            );
        }
        err
    }

    /// This engine instance's id (appears in its log lines).
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The device the model actually ended up on (after any fallback).
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// Inputs the loaded model declares.
    #[must_use]
    pub fn input_specs(&self) -> &[TensorSpec] {
        self.backend.input_specs()
    }

    /// Outputs the loaded model declares.
    #[must_use]
    pub fn output_specs(&self) -> &[TensorSpec] {
        self.backend.output_specs()
    }

    /// Shape of every input, keyed by blob name (`-1` = dynamic).
    #[must_use]
    pub fn input_shapes(&self) -> HashMap<String, Vec<i64>> {
        self.backend
            .input_specs()
            .iter()
            .map(|s| (s.name.clone(), s.dims.clone()))
            .collect()
    }

    /// Number of requests currently running.
    #[must_use]
    pub fn inflight(&self) -> usize {
        self.requests
            .values()
            .filter(|r| matches!(r, Request::Running { .. }))
            .count()
    }

    /// Starts an asynchronous inference request and returns its id.
    ///
    /// Every declared input must be fed exactly once, with a shape the
    /// model's static dimensions accept. At most `max_inflight` requests may
    /// be running at a time.
    pub fn submit(&mut self, inputs: Vec<(String, Tensor)>) -> EngineResult<RequestId> {
        if self.inflight() >= self.max_inflight {
            return Err(EngineError::RequestLimit {
                max: self.max_inflight,
            });
        }
        self.validate_inputs(&inputs)?;

        let input_elements: u64 = inputs.iter().map(|(_, t)| t.element_count() as u64).sum();
        let id = RequestId(self.next_id);
        self.next_id += 1;

        let backend = Arc::clone(&self.backend);
        let handle = task::spawn_blocking(move || backend.run(inputs));
        self.requests.insert(
            id,
            Request::Running {
                handle,
                started: Instant::now(),
            },
        );
        self.observer.record_submitted(input_elements);
        Ok(id)
    }

    fn validate_inputs(&self, inputs: &[(String, Tensor)]) -> EngineResult<()> {
        let specs = self.backend.input_specs();

        let mut seen: HashSet<&str> = HashSet::new();
        for (name, tensor) in inputs {
            let spec = specs
                .iter()
                .find(|s| s.name == *name)
                .ok_or_else(|| EngineError::UnknownInput { name: name.clone() })?;
            if !seen.insert(name.as_str()) {
                return Err(EngineError::Config {
                    reason: format!("input '{name}' was provided twice"),
                });
            }
            if !spec.is_compatible(tensor.shape()) {
                return Err(EngineError::ShapeMismatch {
                    name: name.clone(),
                    expected: spec.dims.clone(),
                    got: tensor.shape().to_vec(),
                });
            }
        }
        for spec in specs {
            if !seen.contains(spec.name.as_str()) {
                return Err(EngineError::MissingInput {
                    name: spec.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Waits until the request has resolved.
    ///
    /// Returns `Ok(())` when it completed, or the request's failure.
    /// Idempotent: calling it again on a resolved request reports the same
    /// result, and the outputs stay readable until [`Self::take_outputs`].
    pub async fn wait(&mut self, id: RequestId) -> EngineResult<()> {
        let joined = match self.requests.get_mut(&id) {
            None => return Err(EngineError::RequestNotFound { id: id.value() }),
            Some(Request::Done { .. }) => return Ok(()),
            Some(Request::Failed { error }) => return Err(error.clone()),
            Some(Request::Running { handle, started }) => {
                let started = *started;
                let result = (&mut *handle).await;
                (result, started)
            }
        };

        let (result, started) = joined;
        let resolved = match result {
            Ok(Ok(outputs)) => {
                let produced: u64 = outputs.iter().map(|(_, t)| t.element_count() as u64).sum();
                self.observer.record_completed(started.elapsed(), produced);
                Request::Done { outputs }
            }
            Ok(Err(error)) => {
                self.observer.record_failed();
                Request::Failed { error }
            }
            Err(join_err) => {
                self.observer.record_failed();
                Request::Failed {
                    error: EngineError::Worker {
                        reason: join_err.to_string(),
                    },
                }
            }
        };

        let outcome = match &resolved {
            Request::Failed { error } => Err(error.clone()),
            _ => Ok(()),
        };
        self.requests.insert(id, resolved);
        outcome
    }

    /// Non-blocking poll: has the request finished its work?
    ///
    /// A `true` here only means [`Self::wait`] will resolve immediately;
    /// outputs still become readable through `wait`.
    pub fn is_ready(&self, id: RequestId) -> EngineResult<bool> {
        match self.requests.get(&id) {
            None => Err(EngineError::RequestNotFound { id: id.value() }),
            Some(Request::Running { handle, .. }) => Ok(handle.is_finished()),
            Some(_) => Ok(true),
        }
    }

    /// The first declared output of a resolved request, which is the whole
    /// story for single-output detection and classification models.
    pub fn output(&self, id: RequestId) -> EngineResult<Tensor> {
        let outputs = self.resolved_outputs(id)?;
        outputs
            .first()
            .map(|(_, t)| t.clone())
            .ok_or_else(|| EngineError::UnknownOutput {
                name: "<first>".to_string(),
            })
    }

    /// A specific named output of a resolved request.
    pub fn output_named(&self, id: RequestId, name: &str) -> EngineResult<Tensor> {
        let outputs = self.resolved_outputs(id)?;
        outputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| EngineError::UnknownOutput {
                name: name.to_string(),
            })
    }

    /// Removes a resolved request and hands over all of its outputs.
    pub fn take_outputs(&mut self, id: RequestId) -> EngineResult<Vec<(String, Tensor)>> {
        match self.requests.get(&id) {
            None => return Err(EngineError::RequestNotFound { id: id.value() }),
            Some(Request::Running { .. }) => {
                return Err(EngineError::RequestPending { id: id.value() })
            }
            Some(Request::Failed { error }) => return Err(error.clone()),
            Some(Request::Done { .. }) => {}
        }
        match self.requests.remove(&id) {
            Some(Request::Done { outputs }) => Ok(outputs),
            _ => Err(EngineError::RequestNotFound { id: id.value() }),
        }
    }

    fn resolved_outputs(&self, id: RequestId) -> EngineResult<&[(String, Tensor)]> {
        match self.requests.get(&id) {
            None => Err(EngineError::RequestNotFound { id: id.value() }),
            Some(Request::Running { .. }) => Err(EngineError::RequestPending { id: id.value() }),
            Some(Request::Failed { error }) => Err(error.clone()),
            Some(Request::Done { outputs }) => Ok(outputs),
        }
    }

    /// Snapshot of this engine's request metrics.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.observer.snapshot()
    }

    /// Resets the request metrics to zero.
    pub fn reset_metrics(&mut self) {
        self.observer.reset();
    }
}
