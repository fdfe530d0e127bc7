use serde::Deserialize;
use warp::{Filter, Rejection, Reply};

use crate::auth::token::Claims;
use crate::error::{FieldError, RegistryError};
use crate::handlers::gate::with_auth;
use crate::handlers::{json_body, message, with_state};
use crate::mail::test_email;
use crate::registry::validation::{is_valid_email, normalize_email};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("send-test-email")
        .and(warp::post())
        .and(with_auth(state.clone()))
        .and(json_body::<TestEmailRequest>())
        .and(with_state(state))
        .and_then(send_test_email)
}

async fn send_test_email(
    claims: Claims,
    request: TestEmailRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let to = normalize_email(&request.email);
    if !is_valid_email(&to) {
        return Err(warp::reject::custom(RegistryError::ValidationFailed(vec![
            FieldError::new("email", "Invalid email address"),
        ])));
    }

    log::info!("{} requested a test email to {}", claims.email(), to);
    state
        .mailer
        .send(test_email(&to, request.name.trim()))
        .await
        .map_err(warp::reject::custom)?;
    Ok(message("Test email sent successfully"))
}
