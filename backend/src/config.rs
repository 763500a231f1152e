use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "SNAP_GATEWAY_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_pending_results: usize,
    pub allowed_origins: Vec<String>,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Program followed by its leading arguments, e.g. an interpreter and a script.
    pub command: Vec<String>,
    pub weights: PathBuf,
    pub image_size: u32,
    pub confidence: f32,
    pub predictions_file: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2000,
            upload_dir: PathBuf::from("/data"),
            output_dir: PathBuf::from("/data/Output"),
            max_upload_bytes: 10 * 1024 * 1024,
            max_pending_results: 64,
            allowed_origins: Vec::new(),
            detector: DetectorConfig::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".to_string(), "/usr/src/app/detect.py".to_string()],
            weights: PathBuf::from("/app/src/weights/best.pt"),
            image_size: 416,
            confidence: 0.1,
            predictions_file: "predictions.csv".to_string(),
            timeout_secs: 120,
        }
    }
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GatewayConfig {
    /// Defaults, then the YAML file named by `SNAP_GATEWAY_CONFIG`, then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|var| env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { var: "PORT", value: port })?;
        }
        if let Some(dir) = lookup("SNAP_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("SNAP_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(weights) = lookup("SNAP_DETECTOR_WEIGHTS") {
            self.detector.weights = PathBuf::from(weights);
        }
        if let Some(secs) = lookup("SNAP_DETECTOR_TIMEOUT_SECS") {
            self.detector.timeout_secs = secs.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "SNAP_DETECTOR_TIMEOUT_SECS",
                value: secs,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let detector = &self.detector;
        if detector.command.is_empty() {
            return Err(ConfigError::Invalid("detector.command must not be empty".into()));
        }
        if !(detector.confidence > 0.0 && detector.confidence <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "detector.confidence must be in (0, 1], got {}",
                detector.confidence
            )));
        }
        if detector.image_size == 0 {
            return Err(ConfigError::Invalid("detector.image_size must be positive".into()));
        }
        if detector.timeout_secs == 0 {
            return Err(ConfigError::Invalid("detector.timeout_secs must be positive".into()));
        }
        if detector.predictions_file.is_empty() || detector.predictions_file.contains('/') {
            return Err(ConfigError::Invalid(
                "detector.predictions_file must be a plain file name".into(),
            ));
        }
        if self.max_pending_results == 0 {
            return Err(ConfigError::Invalid("max_pending_results must be positive".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
