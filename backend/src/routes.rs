use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use shared::{HealthResponse, ImageExtension};
use std::io::ErrorKind;
use std::path::Path;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::detector::predictions;
use crate::detector::registry::DetectionRegistry;
use crate::detector::runner::{DetectionRun, Detector};
use crate::error::GatewayError;
use crate::storage::staging::StagingArea;

pub const DETECTION_ID_HEADER: &str = "X-Detection-Id";
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Handles shared by every worker.
#[derive(Clone)]
pub struct Services {
    staging: web::Data<StagingArea>,
    detector: web::Data<Detector>,
    registry: web::Data<DetectionRegistry>,
}

impl Services {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            staging: web::Data::new(StagingArea::new(&config.upload_dir, config.max_upload_bytes)),
            detector: web::Data::new(Detector::new(config.detector.clone(), &config.output_dir)),
            registry: web::Data::new(DetectionRegistry::new(config.max_pending_results)),
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, services: &Services) {
    cfg.app_data(services.staging.clone())
        .app_data(services.detector.clone())
        .app_data(services.registry.clone())
        .service(web::resource("/api/snap").route(web::post().to(handle_snap)))
        .service(web::resource("/api/get_list").route(web::get().to(get_list)))
        .service(web::resource("/api/get_list/{detection_id}").route(web::get().to(get_list_by_id)))
        .service(web::resource("/api/health").route(web::get().to(health)));
}

/// Pulls the `file` field out of the form, enforcing name, extension and size rules.
async fn read_upload(mut payload: Multipart, max_size: usize) -> Result<(String, Vec<u8>), GatewayError> {
    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(GatewayError::NoFilePart),
            Err(e) => {
                warn!("Rejecting unreadable multipart body: {}", e);
                return Err(GatewayError::NoFilePart);
            }
        };

        if field.name() != Some("file") {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| GatewayError::MalformedUpload(e.to_string()))?;
            }
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();
        if filename.is_empty() {
            return Err(GatewayError::NoSelectedFile);
        }
        if ImageExtension::from_filename(&filename).is_none() {
            warn!("Rejecting upload with disallowed extension: {}", filename);
            return Err(GatewayError::InvalidFormat);
        }

        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| GatewayError::MalformedUpload(e.to_string()))?;
            if image_data.len() + data.len() > max_size {
                warn!("Rejecting upload {} larger than {} bytes", filename, max_size);
                return Err(GatewayError::PayloadTooLarge(max_size));
            }
            image_data.extend_from_slice(&data);
        }
        return Ok((filename, image_data));
    }
}

fn image_mime(path: &Path) -> &'static str {
    image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or(DEFAULT_IMAGE_MIME)
}

async fn discard_predictions(run: &DetectionRun) {
    if let Err(e) = tokio::fs::remove_file(&run.predictions).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove predictions for run {}: {}", run.id, e);
        }
    }
}

async fn handle_snap(
    staging: web::Data<StagingArea>,
    detector: web::Data<Detector>,
    registry: web::Data<DetectionRegistry>,
    payload: Multipart,
) -> Result<HttpResponse, GatewayError> {
    let (filename, image_data) = read_upload(payload, staging.max_size()).await?;

    let run_id = Uuid::new_v4();
    info!("Received {} ({} bytes) as run {}", filename, image_data.len(), run_id);
    let staged = staging.stage(run_id, &filename, &image_data).await?;
    let run = detector.run(run_id, &staged).await?;

    let annotated = match tokio::fs::read(&run.annotated_image).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            discard_predictions(&run).await;
            return Err(GatewayError::MissingOutput(run.annotated_image));
        }
        Err(e) => return Err(e.into()),
    };
    let mime = image_mime(&run.annotated_image);

    if let Some(evicted) = registry.register(run) {
        discard_predictions(&evicted).await;
    }

    Ok(HttpResponse::Ok()
        .content_type(mime)
        .insert_header((DETECTION_ID_HEADER, run_id.to_string()))
        .body(annotated))
}

async fn labels_response(run: DetectionRun) -> Result<HttpResponse, GatewayError> {
    let rows = predictions::consume(&run.predictions).await?;
    let labels = predictions::labels(&rows);
    info!("Returning {} labels for run {}", labels.len(), run.id);
    Ok(HttpResponse::Ok().json(labels))
}

async fn get_list(registry: web::Data<DetectionRegistry>) -> Result<HttpResponse, GatewayError> {
    let Some(run) = registry.take_latest() else {
        if !registry.is_empty() {
            info!("Latest run already collected; {} older runs remain by id", registry.len());
        }
        return Err(GatewayError::NoPendingResults);
    };
    labels_response(run).await
}

async fn get_list_by_id(
    registry: web::Data<DetectionRegistry>,
    path: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    let raw_id = path.into_inner();
    let detection_id =
        Uuid::parse_str(&raw_id).map_err(|_| GatewayError::InvalidDetectionId(raw_id.clone()))?;
    let run = registry
        .take(detection_id)
        .ok_or(GatewayError::UnknownDetection(detection_id))?;
    labels_response(run).await
}

async fn health(registry: web::Data<DetectionRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        pending_results: registry.len(),
    })
}
