mod config;
mod detector;
mod error;
mod routes;
mod storage;
#[cfg(test)]
mod testing;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use config::GatewayConfig;
use routes::{configure_routes, Services, DETECTION_ID_HEADER};
use std::env;

fn cors(allowed_origins: &[String]) -> Cors {
    let cors = if allowed_origins.is_empty() {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
        ])
        .expose_headers(vec![DETECTION_ID_HEADER])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = GatewayConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    for dir in [&config.upload_dir, &config.output_dir] {
        std::fs::create_dir_all(dir)?;
        log::info!("Using directory {}", dir.display());
    }
    log::info!(
        "Detector: {} (weights {}, img {}, conf {}, timeout {}s)",
        config.detector.command.join(" "),
        config.detector.weights.display(),
        config.detector.image_size,
        config.detector.confidence,
        config.detector.timeout_secs
    );
    if config.allowed_origins.is_empty() {
        log::warn!("No allowed_origins configured; accepting requests from any origin");
    }

    let services = Services::from_config(&config);
    let bind_address = config.bind_address();
    let allowed_origins = config.allowed_origins.clone();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&allowed_origins))
            .wrap(Logger::default())
            .configure(|cfg| configure_routes(cfg, &services))
    })
    .bind(&bind_address)?
    .run()
    .await
}
