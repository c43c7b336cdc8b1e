//! Argus — asynchronous adapter around an external inference engine.
//!
//! This crate wraps a third-party neural-network engine (ONNX Runtime, via
//! `ort`) behind a small, async-friendly surface:
//!
//! - load a model and compile it for a device,
//! - learn which layers the device cannot run (and optionally fall back to
//!   the CPU),
//! - start asynchronous inference requests and poll or await them,
//! - read output tensors by position or by name.
//!
//! Argus deliberately contains **no** inference logic of its own: no model
//! parsing, no tensor math, no scheduling, no batching. Everything
//! substantive is delegated to the engine behind the [`Backend`] seam; the
//! adapter's only state is the set of in-flight requests and their metrics.
//!
//! # Overview
//!
//! ```text
//! ┌───────────────────────────┐
//! │       NeuralEngine        │
//! │ ┌───────────────────────┐ │
//! │ │  request tracking     │ │  submit / wait / output
//! │ └───────────────────────┘ │
//! │ ┌───────────────────────┐ │
//! │ │  MetaObserver         │ │  latency + traffic metrics
//! │ └───────────────────────┘ │
//! │ ┌───────────────────────┐ │
//! │ │  Backend (OnnxBackend)│ │  the external engine
//! │ └───────────────────────┘ │
//! └───────────────────────────┘
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

/// The seam between the adapter and the external inference engine.
pub mod backend;
/// Configuration (env vars and YAML).
pub mod config;
/// The async engine adapter: requests, waiting, outputs.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Request metrics.
pub mod observer;
/// The shipped backend over ONNX Runtime.
pub mod onnx;
/// Tensor containers and metadata.
pub mod tensor;

pub use crate::backend::Backend;
pub use crate::config::{Device, EngineConfig, OptLevel};
pub use crate::engine::{NeuralEngine, RequestId};
pub use crate::error::{EngineError, EngineResult};
pub use crate::observer::{LatencyStats, MetaObserver, MetricsSnapshot};
pub use crate::onnx::OnnxBackend;
pub use crate::tensor::{Tensor, TensorSpec};
