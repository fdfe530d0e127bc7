//! Access Gate
//!
//! Only the `Authorization` header is consulted. The login cookie is set for
//! browser clients but never accepted here.

use std::net::SocketAddr;
use warp::{Filter, Rejection};

use crate::auth::role::Role;
use crate::auth::token::{extract_bearer_token, Claims};
use crate::error::RegistryError;
use crate::handlers::with_state;
use crate::security_logger::SecurityEvent;
use crate::state::AppState;

/// Extracts verified claims or rejects with `TokenMissing` (401) or
/// `TokenInvalid`/`TokenExpired` (403)
pub fn with_auth(state: AppState) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::addr::remote())
        .and(with_state(state))
        .and_then(authenticate)
}

async fn authenticate(
    header: Option<String>,
    remote: Option<SocketAddr>,
    state: AppState,
) -> Result<Claims, Rejection> {
    let token = header
        .as_deref()
        .and_then(extract_bearer_token)
        .ok_or_else(|| warp::reject::custom(RegistryError::TokenMissing))?;

    match state.tokens.verify(&token) {
        Ok(claims) => Ok(claims),
        Err(e) => {
            state
                .security
                .log_event(SecurityEvent::TokenRejected {
                    ip: remote.map(|addr| addr.ip()),
                    reason: e.to_string(),
                })
                .await;
            Err(warp::reject::custom(e))
        }
    }
}

/// Fails with `PermissionDenied` unless the caller holds `role`
pub async fn require_role(
    state: &AppState,
    claims: &Claims,
    role: Role,
    action: &str,
) -> Result<(), Rejection> {
    match claims.require_role(role) {
        Ok(()) => Ok(()),
        Err(e) => Err(audit(state, claims, action, e).await),
    }
}

/// Records a refused operation and turns the error into a rejection
pub async fn audit(state: &AppState, claims: &Claims, action: &str, err: RegistryError) -> Rejection {
    if let RegistryError::PermissionDenied = err {
        state
            .security
            .log_event(SecurityEvent::PermissionDenied {
                email: claims.email().to_string(),
                action: action.to_string(),
            })
            .await;
    }
    warp::reject::custom(err)
}
