//! Turns rejections into `{ "error": ... }` JSON responses

use serde::Serialize;
use std::convert::Infallible;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{
    InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType,
};
use warp::{Rejection, Reply};

use crate::constants::LOGIN_LINK;
use crate::error::{FieldError, RegistryError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "loginLink", skip_serializing_if = "Option::is_none")]
    pub login_link: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            login_link: None,
            fields: None,
            details: None,
        }
    }
}

fn registry_error_body(err: &RegistryError) -> ErrorBody {
    let mut body = ErrorBody::new(err.public_message());
    match err {
        RegistryError::DuplicateAccount => body.login_link = Some(LOGIN_LINK),
        RegistryError::ValidationFailed(fields) => body.fields = Some(fields.clone()),
        RegistryError::MailError(details) => body.details = Some(details.clone()),
        _ => {}
    }
    body
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(e) = err.find::<RegistryError>() {
        let status = e.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", e);
        } else {
            log::debug!("Request rejected: {}", e);
        }
        (status, registry_error_body(e))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, ErrorBody::new("Not found"))
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        log::debug!("Bad request body: {}", e);
        (StatusCode::BAD_REQUEST, ErrorBody::new("Invalid request body"))
    } else if err.find::<InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, ErrorBody::new("Invalid query string"))
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, ErrorBody::new("Payload too large"))
    } else if err.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, ErrorBody::new("Content-Length required"))
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, ErrorBody::new("Unsupported media type"))
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, ErrorBody::new("Method not allowed"))
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new("Internal server error"))
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
