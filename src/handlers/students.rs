//! Directory endpoints over student and admin records

use serde::Deserialize;
use warp::{Filter, Rejection, Reply};

use crate::auth::role::Role;
use crate::auth::token::Claims;
use crate::error::{FieldError, RegistryError};
use crate::handlers::gate::{audit, require_role, with_auth};
use crate::handlers::{json_body, message, with_state};
use crate::registry::{RegistrationRequest, StudentUpdateRequest};
use crate::security_logger::SecurityEvent;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "searchTerm")]
    pub search_term: Option<String>,
}

/// Path segments arrive percent-encoded
fn decode_segment(raw: &str) -> Result<String, Rejection> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| {
            warp::reject::custom(RegistryError::ValidationFailed(vec![FieldError::new(
                "className",
                "Class name is not valid UTF-8",
            )]))
        })
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let all_data_route = warp::path!("all-data")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(warp::query::<SearchQuery>())
        .and(with_state(state.clone()))
        .and_then(all_data);

    let search_route = warp::path!("search")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(warp::query::<SearchQuery>())
        .and(with_state(state.clone()))
        .and_then(search);

    let add_student_route = warp::path!("add-student")
        .and(warp::post())
        .and(with_auth(state.clone()))
        .and(json_body::<RegistrationRequest>())
        .and(with_state(state.clone()))
        .and_then(add_student);

    let update_student_route = warp::path!("update-student" / String)
        .and(warp::put())
        .and(with_auth(state.clone()))
        .and(json_body::<StudentUpdateRequest>())
        .and(with_state(state.clone()))
        .and_then(update_student);

    let remove_student_route = warp::path!("remove-student" / String)
        .and(warp::delete())
        .and(with_auth(state.clone()))
        .and(with_state(state.clone()))
        .and_then(remove_student);

    let add_admin_route = warp::path!("add-admin")
        .and(warp::post())
        .and(with_auth(state.clone()))
        .and(json_body::<RegistrationRequest>())
        .and(with_state(state.clone()))
        .and_then(add_admin);

    let all_classes_route = warp::path!("all-classes")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state.clone()))
        .and_then(all_classes);

    let students_of_class_route = warp::path!("students-of-class" / String)
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state))
        .and_then(students_of_class);

    all_data_route
        .or(search_route)
        .or(add_student_route)
        .or(update_student_route)
        .or(remove_student_route)
        .or(add_admin_route)
        .or(all_classes_route)
        .or(students_of_class_route)
}

async fn all_data(claims: Claims, query: SearchQuery, state: AppState) -> Result<impl Reply, Rejection> {
    match state.directory.all_data(&claims, query.search_term.as_deref()).await {
        Ok(records) => Ok(warp::reply::json(&records)),
        Err(e) => Err(audit(&state, &claims, "all-data", e).await),
    }
}

async fn search(_claims: Claims, query: SearchQuery, state: AppState) -> Result<impl Reply, Rejection> {
    let records = state
        .directory
        .search(query.search_term.as_deref())
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&records))
}

async fn add_student(
    claims: Claims,
    request: RegistrationRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    require_role(&state, &claims, Role::Admin, "add-student").await?;
    state
        .registrar
        .add_student(request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(message("Student added successfully"))
}

async fn update_student(
    id: String,
    claims: Claims,
    request: StudentUpdateRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    match state.directory.update_student(&claims, &id, request).await {
        Ok(_) => Ok(message("Student updated successfully")),
        Err(e) => Err(audit(&state, &claims, "update-student", e).await),
    }
}

async fn remove_student(id: String, claims: Claims, state: AppState) -> Result<impl Reply, Rejection> {
    match state.directory.remove_student(&claims, &id).await {
        Ok(removed) => {
            state
                .security
                .log_event(SecurityEvent::AccountRemoved {
                    id: removed.id,
                    by: claims.email().to_string(),
                })
                .await;
            Ok(message("Student removed successfully"))
        }
        Err(e) => Err(audit(&state, &claims, "remove-student", e).await),
    }
}

async fn add_admin(
    claims: Claims,
    request: RegistrationRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    require_role(&state, &claims, Role::Admin, "add-admin").await?;
    state
        .registrar
        .add_admin(request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(message("Admin added successfully"))
}

async fn all_classes(_claims: Claims, state: AppState) -> Result<impl Reply, Rejection> {
    let classes = state
        .directory
        .all_classes()
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&classes))
}

async fn students_of_class(
    class_name: String,
    _claims: Claims,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let class_name = decode_segment(&class_name)?;
    let records = state
        .directory
        .students_of_class(&class_name)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&records))
}
