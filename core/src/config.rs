//! Configuration for the inference adapter.
//!
//! Two sources are supported, mirroring how the rest of the stack is
//! usually deployed:
//!
//! - environment variables (`ARGUS_*`) with loose boolean parsing and
//!   defaults for anything unset;
//! - a YAML file, for the demo's `--config` flag and for embedding in a
//!   larger service config.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Execution provider the model is compiled for.
///
/// This is only a *name* handed to the wrapped engine; Argus does not
/// abstract over devices beyond selecting the provider chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Plain CPU execution (always available).
    #[default]
    Cpu,
    /// NVIDIA CUDA.
    Cuda,
    /// NVIDIA TensorRT.
    TensorRt,
    /// Windows DirectML.
    DirectMl,
    /// Apple Core ML.
    CoreMl,
    /// Intel OpenVINO.
    OpenVino,
}

impl Device {
    /// Human-readable provider name, matching the config spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::TensorRt => "tensorrt",
            Self::DirectMl => "directml",
            Self::CoreMl => "coreml",
            Self::OpenVino => "openvino",
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Device {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            // "gpu" is what older device-plugin configs call CUDA.
            "cuda" | "gpu" => Ok(Self::Cuda),
            "tensorrt" => Ok(Self::TensorRt),
            "directml" => Ok(Self::DirectMl),
            "coreml" => Ok(Self::CoreMl),
            "openvino" => Ok(Self::OpenVino),
            other => Err(EngineError::Config {
                reason: format!("unknown device '{other}'"),
            }),
        }
    }
}

/// Graph-optimization level forwarded to the engine's optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    /// No graph rewrites.
    Disable,
    /// Conservative rewrites only.
    Basic,
    /// Everything the engine offers.
    #[default]
    Full,
}

impl FromStr for OptLevel {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "disable" | "off" => Ok(Self::Disable),
            "basic" => Ok(Self::Basic),
            "full" => Ok(Self::Full),
            other => Err(EngineError::Config {
                reason: format!("unknown graph optimization level '{other}'"),
            }),
        }
    }
}

/// Everything [`crate::engine::NeuralEngine::load`] needs to know.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Path to the ONNX model file.
    pub model_path: PathBuf,

    /// Device to compile the model for.
    #[serde(default)]
    pub device: Device,

    /// Keep the CPU provider at the end of the chain so layers the device
    /// provider cannot place still run. This replaces the CPU extension
    /// libraries older device plugins shipped.
    #[serde(default = "default_true")]
    pub cpu_fallback: bool,

    /// Intra-op thread count handed to the engine. `None` lets the engine
    /// pick.
    #[serde(default)]
    pub intra_threads: Option<usize>,

    /// Graph-optimization level.
    #[serde(default)]
    pub graph_optimization: OptLevel,

    /// Maximum number of concurrently running requests the adapter accepts.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

const fn default_true() -> bool {
    true
}

const fn default_max_inflight() -> usize {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            device: Device::Cpu,
            cpu_fallback: true,
            intra_threads: None,
            graph_optimization: OptLevel::Full,
            max_inflight: default_max_inflight(),
        }
    }
}

impl EngineConfig {
    /// Defaults plus a model path.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from environment variables, falling back to
    /// defaults.
    ///
    /// Recognised variables:
    ///
    /// - `ARGUS_MODEL` — model file path;
    /// - `ARGUS_DEVICE` — device name (`cpu`, `cuda`, `tensorrt`, ...);
    /// - `ARGUS_CPU_FALLBACK` — loose boolean (`1/true/yes/on`);
    /// - `ARGUS_INTRA_THREADS` — positive integer;
    /// - `ARGUS_GRAPH_OPT` — `disable`, `basic` or `full`;
    /// - `ARGUS_MAX_INFLIGHT` — positive integer.
    ///
    /// Unset variables keep their defaults; unparsable values are errors.
    pub fn from_env() -> EngineResult<Self> {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var("ARGUS_MODEL") {
            cfg.model_path = PathBuf::from(raw);
        }
        if let Ok(raw) = env::var("ARGUS_DEVICE") {
            cfg.device = raw.parse()?;
        }
        if let Ok(raw) = env::var("ARGUS_CPU_FALLBACK") {
            cfg.cpu_fallback = parse_bool(&raw);
        }
        if let Ok(raw) = env::var("ARGUS_INTRA_THREADS") {
            cfg.intra_threads = Some(parse_positive(&raw, "ARGUS_INTRA_THREADS")?);
        }
        if let Ok(raw) = env::var("ARGUS_GRAPH_OPT") {
            cfg.graph_optimization = raw.parse()?;
        }
        if let Ok(raw) = env::var("ARGUS_MAX_INFLIGHT") {
            cfg.max_inflight = parse_positive(&raw, "ARGUS_MAX_INFLIGHT")?;
        }

        Ok(cfg)
    }

    /// Parses a YAML document into a config. `model_path` is required,
    /// everything else defaults; unknown keys are rejected.
    pub fn from_yaml_str(raw: &str) -> EngineResult<Self> {
        serde_yaml::from_str(raw).map_err(|e| EngineError::Config {
            reason: format!("bad YAML config: {e}"),
        })
    }

    /// Reads and parses a YAML config file.
    pub fn from_yaml(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            reason: format!("cannot read config file {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Sanity checks that do not need the filesystem.
    pub fn validate(&self) -> EngineResult<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(EngineError::Config {
                reason: "model_path is empty".to_string(),
            });
        }
        if self.max_inflight == 0 {
            return Err(EngineError::Config {
                reason: "max_inflight must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses a loose boolean value from a string.
///
/// `"1"`, `"true"`, `"yes"`, `"on"` (case-insensitive) are `true`; anything
/// else is `false`.
fn parse_bool(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "yes" | "on")
}

/// Parses a strictly positive integer, naming the variable in the error.
fn parse_positive(raw: &str, what: &str) -> EngineResult<usize> {
    let value: usize = raw.trim().parse().map_err(|_| EngineError::Config {
        reason: format!("invalid value for {what}: {raw}"),
    })?;
    if value == 0 {
        return Err(EngineError::Config {
            reason: format!("{what} must be > 0"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-var tests share process state; serialise them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn reset_env() {
        for key in [
            "ARGUS_MODEL",
            "ARGUS_DEVICE",
            "ARGUS_CPU_FALLBACK",
            "ARGUS_INTRA_THREADS",
            "ARGUS_GRAPH_OPT",
            "ARGUS_MAX_INFLIGHT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn default_config_is_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.device, Device::Cpu);
        assert!(cfg.cpu_fallback);
        assert!(cfg.max_inflight > 0);
        assert_eq!(cfg.graph_optimization, OptLevel::Full);
    }

    #[test]
    fn env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        env::set_var("ARGUS_MODEL", "models/person-detect.onnx");
        env::set_var("ARGUS_DEVICE", "tensorrt");
        env::set_var("ARGUS_CPU_FALLBACK", "off");
        env::set_var("ARGUS_INTRA_THREADS", "8");
        env::set_var("ARGUS_MAX_INFLIGHT", "2");

        let cfg = EngineConfig::from_env().expect("config from env");
        reset_env();

        assert_eq!(cfg.model_path, PathBuf::from("models/person-detect.onnx"));
        assert_eq!(cfg.device, Device::TensorRt);
        assert!(!cfg.cpu_fallback);
        assert_eq!(cfg.intra_threads, Some(8));
        assert_eq!(cfg.max_inflight, 2);
    }

    #[test]
    fn invalid_numeric_env_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        env::set_var("ARGUS_MAX_INFLIGHT", "not-a-number");
        let result = EngineConfig::from_env();
        reset_env();
        assert!(result.is_err());
    }

    #[test]
    fn zero_max_inflight_env_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        env::set_var("ARGUS_MAX_INFLIGHT", "0");
        let result = EngineConfig::from_env();
        reset_env();
        assert!(result.is_err());
    }

    #[test]
    fn device_parsing_accepts_aliases() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("gpu".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!("OpenVINO".parse::<Device>().unwrap(), Device::OpenVino);
        assert!("quantum".parse::<Device>().is_err());
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(parse_bool("On"));

        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("maybe"));
    }

    #[test]
    fn yaml_round_trip() {
        let cfg = EngineConfig::from_yaml_str(
            "model_path: models/person-detect.onnx\n\
             device: cuda\n\
             cpu_fallback: false\n\
             intra_threads: 4\n\
             graph_optimization: basic\n\
             max_inflight: 8\n",
        )
        .expect("yaml config");

        assert_eq!(cfg.device, Device::Cuda);
        assert!(!cfg.cpu_fallback);
        assert_eq!(cfg.intra_threads, Some(4));
        assert_eq!(cfg.graph_optimization, OptLevel::Basic);
        assert_eq!(cfg.max_inflight, 8);
    }

    #[test]
    fn yaml_defaults_apply_when_keys_are_omitted() {
        let cfg = EngineConfig::from_yaml_str("model_path: m.onnx\n").expect("yaml config");
        assert_eq!(cfg.device, Device::Cpu);
        assert!(cfg.cpu_fallback);
        assert_eq!(cfg.max_inflight, 4);
    }

    #[test]
    fn yaml_rejects_unknown_fields() {
        let result = EngineConfig::from_yaml_str("model_path: m.onnx\nbatch_size: 16\n");
        assert!(result.is_err());
    }

    #[test]
    fn yaml_file_is_read_from_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "model_path: m.onnx").expect("write config");

        let cfg = EngineConfig::from_yaml(file.path()).expect("config from file");
        assert_eq!(cfg.model_path, PathBuf::from("m.onnx"));
    }

    #[test]
    fn validate_rejects_empty_model_path() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig::new("m.onnx");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_inflight() {
        let mut cfg = EngineConfig::new("m.onnx");
        cfg.max_inflight = 0;
        assert!(cfg.validate().is_err());
    }
}
