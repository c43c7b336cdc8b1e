#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Demo executable for the Argus inference adapter.
//!
//! Drives the whole flow end to end against a real ONNX model:
//! config → load (with layer-support check) → submit an async request →
//! wait → read the output tensor. Exits non-zero on any failure, including
//! unsupported layers with fallback disabled.
//!
//! ```text
//! argus-demo --model models/person-detect.onnx --device cpu
//! argus-demo --config argus.yaml
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use argus_core::{EngineConfig, NeuralEngine, OnnxBackend, Tensor};

const USAGE: &str = "\
argus-demo — run one inference through the Argus adapter

USAGE:
    argus-demo [--config <file.yaml>] [--model <file.onnx>] [--device <name>]

Without --config, settings come from ARGUS_* environment variables;
--model and --device override either source. Devices: cpu, cuda,
tensorrt, directml, coreml, openvino.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config_path = None;
    let mut model = None;
    let mut device = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(args.next().context("--config needs a path")?),
            "--model" => model = Some(args.next().context("--model needs a path")?),
            "--device" => device = Some(args.next().context("--device needs a name")?),
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            other => bail!("unknown argument '{other}'\n\n{USAGE}"),
        }
    }

    let mut config = match config_path {
        Some(path) => EngineConfig::from_yaml(Path::new(&path))?,
        None => EngineConfig::from_env()?,
    };
    if let Some(model) = model {
        config.model_path = model.into();
    }
    if let Some(device) = device {
        config.device = device.parse()?;
    }
    if config.model_path.as_os_str().is_empty() {
        bail!("no model given (use --model, --config or ARGUS_MODEL)\n\n{USAGE}");
    }

    let mut engine = NeuralEngine::<OnnxBackend>::load(&config).await?;

    println!("model:  {}", config.model_path.display());
    println!("device: {}", engine.device());
    for spec in engine.input_specs() {
        println!("input:  {} {:?}", spec.name, spec.dims);
    }
    for spec in engine.output_specs() {
        println!("output: {} {:?}", spec.name, spec.dims);
    }

    // One placeholder request: zero tensors, dynamic dims pinned to 1.
    let inputs: Vec<(String, Tensor)> = engine
        .input_specs()
        .iter()
        .map(|spec| (spec.name.clone(), Tensor::zeros(spec.concrete_dims())))
        .collect();

    let id = engine.submit(inputs)?;
    info!("request {id} submitted");

    engine.wait(id).await?;
    let out = engine.output(id)?;

    println!("first output: shape {:?}", out.shape());
    if let Some((index, value)) = out
        .data()
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
    {
        println!("top-1: index {index}, value {value}");
    }

    let snap = engine.metrics();
    println!(
        "requests: {} submitted, {} completed, {} failed — last latency {:.2} ms",
        snap.submitted, snap.completed, snap.failed, snap.latency.last_ms
    );

    Ok(())
}
