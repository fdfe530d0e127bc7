//! Request handlers for different server endpoints

pub mod accounts;
pub mod gate;
pub mod mail;
pub mod rejection;
pub mod students;
pub mod upload;

use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::constants::{JSON_BODY_LIMIT, UPLOADS_PATH};
use crate::security::with_api_security_headers;
use crate::state::AppState;

pub use gate::with_auth;
pub use rejection::handle_rejection;

/// Helper to include shared state in a request
pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn is_multipart(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Passes only `multipart/form-data` requests
pub fn multipart_request() -> impl Filter<Extract = (), Error = Rejection> + Copy {
    warp::header::optional::<String>("content-type")
        .and_then(|content_type: Option<String>| async move {
            if is_multipart(content_type.as_deref()) {
                Ok(())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .untuple_one()
}

/// Size-limited JSON body. Multipart requests are left to the form routes.
pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Copy
where
    T: DeserializeOwned + Send,
{
    warp::header::optional::<String>("content-type")
        .and_then(|content_type: Option<String>| async move {
            if is_multipart(content_type.as_deref()) {
                Err(warp::reject::not_found())
            } else {
                Ok(())
            }
        })
        .untuple_one()
        .and(warp::body::content_length_limit(JSON_BODY_LIMIT))
        .and(warp::body::json())
}

/// `{ "message": ... }` success body
pub fn message(text: &str) -> warp::reply::Json {
    warp::reply::json(&serde_json::json!({ "message": text }))
}

/// `OK` while the account store answers, 503 otherwise
async fn health(state: AppState) -> Result<impl Reply, Infallible> {
    match state.store.health_check().await {
        Ok(true) => Ok(warp::reply::with_status("OK", StatusCode::OK)),
        Ok(false) => Ok(warp::reply::with_status("UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE)),
        Err(e) => {
            log::error!("Storage health check failed: {}", e);
            Ok(warp::reply::with_status("UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE))
        }
    }
}

fn cors(origin: Option<&str>) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"])
        .allow_credentials(true);

    match origin {
        Some(origin) => builder.allow_origin(origin),
        None => builder,
    }
}

/// The complete HTTP surface
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health_route = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(health);

    let uploads = warp::path(UPLOADS_PATH)
        .and(warp::get())
        .and(warp::fs::dir(state.config.upload_dir.clone()));

    let cors = cors(state.config.cors_origin.as_deref());

    accounts::routes(state.clone())
        .or(students::routes(state.clone()))
        .or(mail::routes(state))
        .or(uploads)
        .or(health_route)
        .recover(handle_rejection)
        .with(with_api_security_headers())
        .with(cors)
        .with(warp::log("school_registry::http"))
}
