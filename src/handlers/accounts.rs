//! Registration, login and self-lookup endpoints

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use warp::http::header::SET_COOKIE;
use warp::multipart::FormData;
use warp::{Filter, Rejection, Reply};

use crate::auth::role::Role;
use crate::auth::token::Claims;
use crate::constants::TOKEN_COOKIE_NAME;
use crate::error::RegistryError;
use crate::handlers::gate::{audit, with_auth};
use crate::handlers::upload::read_registration_form;
use crate::handlers::{json_body, message, multipart_request, with_state};
use crate::registry::validation::normalize_email;
use crate::registry::RegistrationRequest;
use crate::security_logger::SecurityEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

/// `token=<jwt>` cookie with the same lifetime as the token itself
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
        TOKEN_COOKIE_NAME, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let max_form = state
        .config
        .max_upload_bytes
        .saturating_add(crate::constants::MULTIPART_FIELD_OVERHEAD);

    let register_form = warp::path!("register")
        .and(warp::post())
        .and(multipart_request())
        .and(warp::multipart::form().max_length(max_form))
        .and(warp::addr::remote())
        .and(with_state(state.clone()))
        .and_then(register_multipart);

    let register_body = warp::path!("register")
        .and(warp::post())
        .and(json_body::<RegistrationRequest>())
        .and(warp::addr::remote())
        .and(with_state(state.clone()))
        .and_then(register_json);

    let register_admin_route = warp::path!("register-admin")
        .and(warp::post())
        .and(json_body::<RegistrationRequest>())
        .and(warp::addr::remote())
        .and(with_state(state.clone()))
        .and_then(register_admin);

    let login_route = warp::path!("login")
        .and(warp::post())
        .and(json_body::<LoginRequest>())
        .and(warp::addr::remote())
        .and(with_state(state.clone()))
        .and_then(login);

    let student_data_route = warp::path!("student-data")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state))
        .and_then(student_data);

    register_form
        .or(register_body)
        .or(register_admin_route)
        .or(login_route)
        .or(student_data_route)
}

/// Logs duplicate attempts before rejecting
async fn registration_failed(
    state: &AppState,
    email: Option<&str>,
    remote: Option<SocketAddr>,
    err: RegistryError,
) -> Rejection {
    if let RegistryError::DuplicateAccount = err {
        state
            .security
            .log_event(SecurityEvent::DuplicateRegistration {
                email: email.map(normalize_email).unwrap_or_default(),
                ip: remote.map(|addr| addr.ip()),
            })
            .await;
    }
    warp::reject::custom(err)
}

async fn register_multipart(
    form: FormData,
    remote: Option<SocketAddr>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let form = read_registration_form(form, state.config.max_upload_bytes)
        .await
        .map_err(warp::reject::custom)?;

    let stored_image = match form.passport_image {
        Some(file) => Some(
            state
                .uploads
                .save(&file.file_name, &file.bytes)
                .await
                .map_err(warp::reject::custom)?,
        ),
        None => None,
    };

    let email = form.request.email.clone();
    match state.registrar.register(form.request, stored_image.clone()).await {
        Ok(_) => Ok(message("Registration successful")),
        Err(e) => {
            if let Some(ref name) = stored_image {
                state.uploads.remove(name).await;
            }
            Err(registration_failed(&state, email.as_deref(), remote, e).await)
        }
    }
}

async fn register_json(
    request: RegistrationRequest,
    remote: Option<SocketAddr>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let email = request.email.clone();
    match state.registrar.register(request, None).await {
        Ok(_) => Ok(message("Registration successful")),
        Err(e) => Err(registration_failed(&state, email.as_deref(), remote, e).await),
    }
}

async fn register_admin(
    request: RegistrationRequest,
    remote: Option<SocketAddr>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let email = request.email.clone();
    match state.registrar.register_admin(request).await {
        Ok(_) => Ok(message("Admin registered successfully")),
        Err(e) => Err(registration_failed(&state, email.as_deref(), remote, e).await),
    }
}

async fn login(
    request: LoginRequest,
    remote: Option<SocketAddr>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let ip = remote.map(|addr| addr.ip());

    match state.login.login(&request.email, &request.password).await {
        Ok(outcome) => {
            state
                .security
                .log_event(SecurityEvent::LoginSucceeded {
                    email: outcome.email.clone(),
                    ip,
                })
                .await;

            let cookie = session_cookie(
                &outcome.token,
                state.tokens.ttl().as_secs(),
                state.config.enable_tls,
            );
            let body = warp::reply::json(&LoginResponse {
                token: outcome.token,
                role: outcome.role,
            });
            Ok(warp::reply::with_header(body, SET_COOKIE, cookie))
        }
        Err(e) => {
            if let RegistryError::InvalidCredentials = e {
                state
                    .security
                    .log_event(SecurityEvent::LoginFailed {
                        email: normalize_email(&request.email),
                        ip,
                    })
                    .await;
            }
            Err(warp::reject::custom(e))
        }
    }
}

/// The caller's own record, or `null` once the account is gone
async fn student_data(claims: Claims, state: AppState) -> Result<impl Reply, Rejection> {
    match state.directory.student_data(&claims).await {
        Ok(record) => Ok(warp::reply::json(&record)),
        Err(e) => Err(audit(&state, &claims, "student-data", e).await),
    }
}
