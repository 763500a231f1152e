use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::DetectorConfig;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Failed to spawn detector `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Detector exited with {status}")]
    Failed {
        status: ExitStatus,
        stderr: String,
        stdout: String,
    },
    #[error("Detector did not finish within {0} seconds")]
    Timeout(u64),
    #[error("Failed while waiting for detector: {0}")]
    Wait(std::io::Error),
    #[error("Detector command is empty")]
    EmptyCommand,
    #[error("Staged file has no file name: {0}")]
    InvalidSource(PathBuf),
}

/// Where one detector invocation left its artifacts.
#[derive(Debug, Clone)]
pub struct DetectionRun {
    pub id: Uuid,
    pub source: PathBuf,
    pub annotated_image: PathBuf,
    pub predictions: PathBuf,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Detector {
    config: DetectorConfig,
    output_dir: PathBuf,
}

impl Detector {
    pub fn new(config: DetectorConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
        }
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.output_dir.join(run_id.to_string())
    }

    fn arguments(&self, run_id: Uuid, source: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.command.iter().skip(1).map(OsString::from).collect();
        args.extend([
            "--weights".into(),
            self.config.weights.clone().into_os_string(),
            "--img".into(),
            self.config.image_size.to_string().into(),
            "--conf".into(),
            self.config.confidence.to_string().into(),
            "--save-csv".into(),
            "--project".into(),
            self.output_dir.clone().into_os_string(),
            "--exist-ok".into(),
            "--name".into(),
            run_id.to_string().into(),
            "--source".into(),
            source.as_os_str().to_owned(),
        ]);
        args
    }

    /// Runs the detector on `source` and waits for it, bounded by the configured timeout.
    ///
    /// The child is killed if the returned future is dropped, so a cancelled
    /// request does not leave a detector running.
    pub async fn run(&self, run_id: Uuid, source: &Path) -> Result<DetectionRun, DetectorError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| DetectorError::InvalidSource(source.to_path_buf()))?;
        let program = self.config.command.first().ok_or(DetectorError::EmptyCommand)?;
        let args = self.arguments(run_id, source);
        debug!("Detector command for run {}: {} {:?}", run_id, program, args);

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DetectorError::Spawn {
                program: program.clone(),
                source,
            })?;

        info!("Detector started for run {} on {}", run_id, source.display());
        let output = match tokio::time::timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(result) => result.map_err(DetectorError::Wait)?,
            Err(_) => {
                warn!(
                    "Detector for run {} exceeded {}s and was killed",
                    run_id, self.config.timeout_secs
                );
                return Err(DetectorError::Timeout(self.config.timeout_secs));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            error!("Detector run {} failed with {}: {}", run_id, output.status, stderr.trim());
            return Err(DetectorError::Failed {
                status: output.status,
                stderr,
                stdout,
            });
        }

        let run_dir = self.run_dir(run_id);
        info!("Detector finished run {} into {}", run_id, run_dir.display());
        Ok(DetectionRun {
            id: run_id,
            source: source.to_path_buf(),
            annotated_image: run_dir.join(file_name),
            predictions: run_dir.join(&self.config.predictions_file),
            created_at: Utc::now(),
        })
    }
}
