use log::{error, info, warn};
use std::net::SocketAddr;

use school_registry::config::AppConfig;
use school_registry::handlers::routes;
use school_registry::state::AppState;

#[tokio::main]
async fn main() {
    // .env may set RUST_LOG, so it is read before the logger starts
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Refuse to start without a usable signing secret
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, uploads={}, tls={}",
        config.host,
        config.port,
        config.upload_dir.display(),
        config.enable_tls
    );

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let tls_paths = match (config.enable_tls, &config.tls_cert_path, &config.tls_key_path) {
        (true, Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
        _ => None,
    };

    let state = match AppState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    state.security.clone().start_cleanup_task();

    let routes = routes(state);

    match tls_paths {
        Some((cert, key)) => {
            info!("Starting school registry server on https://{}", addr);
            warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(addr)
                .await;
        }
        None => {
            info!("Starting school registry server on http://{}", addr);
            warp::serve(routes).run(addr).await;
        }
    }
}
