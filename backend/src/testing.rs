//! Fixtures for handler and detector tests.

use actix_web::http::header::CONTENT_TYPE;
use actix_web::test::TestRequest;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{DetectorConfig, GatewayConfig};

pub const BOUNDARY: &str = "snapgatewayboundary";

/// Mimics the detector: copies the source into `<project>/<name>/` and writes two predictions.
pub const ANNOTATING_DETECTOR: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --project) project="$2"; shift 2 ;;
    --name) name="$2"; shift 2 ;;
    --source) source="$2"; shift 2 ;;
    *) shift ;;
  esac
done
out="$project/$name"
base="$(basename "$source")"
mkdir -p "$out"
cp "$source" "$out/$base"
printf '%s,carrot,0.92\n%s,tomato,0.81\n' "$base" "$base" > "$out/predictions.csv"
"#;

/// Writes `script` next to the test data and points a detector config at it via `sh`.
pub fn fake_detector(dir: &Path, script: &str, timeout_secs: u64) -> DetectorConfig {
    let script_path = dir.join("detect.sh");
    std::fs::write(&script_path, script).unwrap();
    DetectorConfig {
        command: vec!["sh".to_string(), script_path.display().to_string()],
        timeout_secs,
        ..DetectorConfig::default()
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub config: GatewayConfig,
}

impl TestEnv {
    pub fn new(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("Output"),
            detector: fake_detector(dir.path(), script, 10),
            ..GatewayConfig::default()
        };
        Self { dir, config }
    }

    /// Every file written under the upload directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(runs) = std::fs::read_dir(&self.config.upload_dir) else {
            return files;
        };
        for run in runs.flatten() {
            for entry in std::fs::read_dir(run.path()).unwrap().flatten() {
                files.push(entry.path());
            }
        }
        files
    }
}

pub fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let mut body = format!("--{BOUNDARY}\r\n").into_bytes();
    let disposition = match filename {
        Some(name) => format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        ),
        None => format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n"),
    };
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn snap_request(field: &str, filename: Option<&str>, content: &[u8]) -> TestRequest {
    TestRequest::post()
        .uri("/api/snap")
        .insert_header((
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(multipart_body(field, filename, content))
}
