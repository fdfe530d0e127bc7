//! End-to-end tests through the full warp filter tree

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;

use school_registry::auth::role::Role;
use school_registry::auth::token::Claims;
use school_registry::config::AppConfig;
use school_registry::handlers::routes;
use school_registry::mail::LogMailer;
use school_registry::state::AppState;
use school_registry::storage::{AccountStorage, MemoryAccountStore};

type Response = warp::http::Response<Bytes>;

struct TestApp {
    state: AppState,
    mailer: Arc<LogMailer>,
    _uploads: tempfile::TempDir,
}

fn app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = AppConfig::for_testing();
    config.upload_dir = uploads.path().to_path_buf();

    let mailer = Arc::new(LogMailer::new());
    let store: Arc<dyn AccountStorage> = Arc::new(MemoryAccountStore::new());
    let state = AppState::new(config, store, mailer.clone()).unwrap();

    TestApp {
        state,
        mailer,
        _uploads: uploads,
    }
}

fn body(response: &Response) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

impl TestApp {
    async fn post(&self, path: &str, payload: Value, token: Option<&str>) -> Response {
        let mut request = warp::test::request().method("POST").path(path).json(&payload);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        request.reply(&routes(self.state.clone())).await
    }

    async fn put(&self, path: &str, payload: Value, token: &str) -> Response {
        warp::test::request()
            .method("PUT")
            .path(path)
            .header("authorization", format!("Bearer {}", token))
            .json(&payload)
            .reply(&routes(self.state.clone()))
            .await
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = warp::test::request().method("GET").path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        request.reply(&routes(self.state.clone())).await
    }

    async fn delete(&self, path: &str, token: &str) -> Response {
        warp::test::request()
            .method("DELETE")
            .path(path)
            .header("authorization", format!("Bearer {}", token))
            .reply(&routes(self.state.clone()))
            .await
    }

    async fn register(&self, email: &str, password: &str, role: &str, extra: Value) -> Response {
        let mut payload = json!({ "email": email, "password": password, "role": role });
        if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), extra) {
            target.extend(extra);
        }
        self.post("/register", payload, None).await
    }

    async fn login(&self, email: &str, password: &str) -> Response {
        self.post("/login", json!({ "email": email, "password": password }), None)
            .await
    }

    async fn token_for(&self, email: &str, password: &str) -> String {
        let response = self.login(email, password).await;
        assert_eq!(response.status(), StatusCode::OK);
        body(&response)["token"].as_str().unwrap().to_string()
    }

    /// Registers an admin and returns its token
    async fn admin_token(&self) -> String {
        let response = self
            .post(
                "/register-admin",
                json!({ "email": "head@school.test", "password": "admin-pass-1", "name": "Head" }),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        self.token_for("head@school.test", "admin-pass-1").await
    }

    async fn student_id(&self, email: &str) -> String {
        self.state.store.find_by_email(email).await.unwrap().unwrap().id
    }
}

#[tokio::test]
async fn test_registration_login_and_self_lookup() {
    let app = app();

    let first = app.register("a@x.com", "secret1", "student", json!({})).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body(&first), json!({ "message": "Registration successful" }));

    let again = app.register("a@x.com", "secret1", "student", json!({})).await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    let again = body(&again);
    assert_eq!(again["error"], "User already exists. Please log in.");
    assert_eq!(again["loginLink"], "/login");

    let login = app.login("a@x.com", "secret1").await;
    assert_eq!(login.status(), StatusCode::OK);
    let login_body = body(&login);
    assert_eq!(login_body["role"], "student");
    let token = login_body["token"].as_str().unwrap().to_string();

    let me = app.get("/student-data", Some(&token)).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = body(&me);
    assert_eq!(me["email"], "a@x.com");
    assert_eq!(me["role"], "student");
    assert!(me.get("passwordHash").is_none());

    // A valid token for an email with no record sees nothing
    let ghost = app.state.tokens.issue("ghost@x.com", Role::Student).unwrap();
    let response = app.get("/student-data", Some(&ghost)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), Value::Null);
}

#[tokio::test]
async fn test_concurrent_registration_single_winner() {
    let app = app();

    let attempts = (0..8).map(|_| app.register("race@x.com", "secret1", "student", json!({})));
    let responses = futures_util::future::join_all(attempts).await;

    let ok = responses.iter().filter(|r| r.status() == StatusCode::OK).count();
    let duplicate = responses
        .iter()
        .filter(|r| r.status() == StatusCode::BAD_REQUEST)
        .count();
    assert_eq!(ok, 1);
    assert_eq!(duplicate, 7);

    let all = app
        .state
        .store
        .find(&school_registry::storage::AccountFilter::all())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_invalid_registration_reports_fields() {
    let app = app();

    let response = app.register("not-an-email", "123", "teacher", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body(&response);
    assert_eq!(json["error"], "Invalid registration data");
    let fields: Vec<&str> = json["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password", "role"]);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = app();
    let response = warp::test::request()
        .method("POST")
        .path("/login")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&routes(app.state.clone()))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&response)["error"], "Invalid request body");
}

#[tokio::test]
async fn test_invalid_credentials_are_indistinguishable() {
    let app = app();
    app.register("a@x.com", "secret1", "student", json!({})).await;

    let wrong_password = app.login("a@x.com", "secret2").await;
    let unknown_email = app.login("nobody@x.com", "secret1").await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body(), unknown_email.body());
    assert_eq!(body(&wrong_password), json!({ "error": "Invalid credentials" }));
    assert!(wrong_password.headers().get("set-cookie").is_none());

    assert_eq!(app.state.security.count("login_failed").await, 2);
}

#[tokio::test]
async fn test_login_cookie_matches_token_lifetime() {
    let app = app();
    app.register("a@x.com", "secret1", "student", json!({})).await;

    let response = app.login("a@x.com", "secret1").await;
    let cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
    let token = body(&response)["token"].as_str().unwrap().to_string();

    let ttl = app.state.config.token_ttl.as_secs();
    assert!(cookie.starts_with(&format!("token={};", token)));
    assert!(cookie.contains(&format!("Max-Age={}", ttl)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));

    let claims = app.state.tokens.verify(&token).unwrap();
    assert_eq!(claims.exp - claims.iat, ttl);
}

#[tokio::test]
async fn test_gate_ignores_cookie() {
    let app = app();
    app.register("a@x.com", "secret1", "student", json!({})).await;
    let token = app.token_for("a@x.com", "secret1").await;

    let response = warp::test::request()
        .method("GET")
        .path("/student-data")
        .header("cookie", format!("token={}", token))
        .reply(&routes(app.state.clone()))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&response)["error"], "Access denied. Token missing.");
}

#[tokio::test]
async fn test_token_failures() {
    let app = app();

    let missing = app.get("/all-classes", None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app.get("/all-classes", Some("not.a.token")).await;
    assert_eq!(garbage.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(&garbage)["error"], "Access denied. Invalid token.");

    let mut claims = Claims::new("a@x.com".to_string(), Role::Admin, Duration::from_secs(60));
    claims.iat -= 7200;
    claims.nbf -= 7200;
    claims.exp = claims.iat + 3600;
    let expired = app.state.tokens.sign(&claims).unwrap();

    let response = app.get("/all-data", Some(&expired)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(&response)["error"], "Access denied. Token expired.");

    // Bare tokens without the Bearer prefix are still accepted
    let fresh = app.state.tokens.issue("a@x.com", Role::Admin).unwrap();
    let bare = warp::test::request()
        .method("GET")
        .path("/all-classes")
        .header("authorization", fresh)
        .reply(&routes(app.state.clone()))
        .await;
    assert_eq!(bare.status(), StatusCode::OK);

    assert_eq!(app.state.security.count("token_rejected").await, 2);
}

#[tokio::test]
async fn test_student_token_rejected_by_admin_operations() {
    let app = app();
    app.register("a@x.com", "secret1", "student", json!({})).await;
    let student = app.token_for("a@x.com", "secret1").await;
    let id = app.student_id("a@x.com").await;

    let checks = vec![
        app.get("/all-data", Some(&student)).await,
        app.post(
            "/add-student",
            json!({ "email": "b@x.com", "password": "secret1" }),
            Some(&student),
        )
        .await,
        app.post(
            "/add-admin",
            json!({ "email": "evil@x.com", "password": "secret1" }),
            Some(&student),
        )
        .await,
        app.put(&format!("/update-student/{}", id), json!({ "name": "Hacked" }), &student)
            .await,
        app.delete(&format!("/remove-student/{}", id), &student).await,
    ];

    for response in &checks {
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body(response), json!({ "error": "Permission denied" }));
    }

    assert!(app.state.store.find_by_email("evil@x.com").await.unwrap().is_none());
    assert!(app.state.store.find_by_id(&id).await.unwrap().is_some());
    assert_eq!(app.state.security.count("permission_denied").await, checks.len());
}

#[tokio::test]
async fn test_admin_token_rejected_by_student_lookup() {
    let app = app();
    let admin = app.admin_token().await;

    let response = app.get("/student-data", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_directory_operations() {
    let app = app();
    let admin = app.admin_token().await;

    let added = app
        .post(
            "/add-student",
            json!({
                "email": "kiran@school.test",
                "password": "kiran-pass",
                "name": "Kiran Rao",
                "number": "9876543210",
                "class": "10 A",
                "address": "12 Hill Road"
            }),
            Some(&admin),
        )
        .await;
    assert_eq!(added.status(), StatusCode::OK);
    assert_eq!(body(&added), json!({ "message": "Student added successfully" }));

    app.register("meera@school.test", "meera-pass", "student", json!({ "name": "Meera", "class": "9B" }))
        .await;

    let all = body(&app.get("/all-data", Some(&admin)).await);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let filtered = body(&app.get("/all-data?searchTerm=hill", Some(&admin)).await);
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    assert_eq!(filtered[0]["email"], "kiran@school.test");

    let search = body(&app.get("/search?searchTerm=9b", Some(&admin)).await);
    assert_eq!(search.as_array().unwrap().len(), 1);
    assert_eq!(search[0]["name"], "Meera");

    let classes = body(&app.get("/all-classes", Some(&admin)).await);
    assert_eq!(classes, json!(["10 A", "9B"]));

    let members = body(&app.get("/students-of-class/10%20A", Some(&admin)).await);
    assert_eq!(members.as_array().unwrap().len(), 1);
    assert_eq!(members[0]["number"], "9876543210");

    let added_admin = app
        .post(
            "/add-admin",
            json!({ "email": "deputy@school.test", "password": "deputy-pass", "role": "student" }),
            Some(&admin),
        )
        .await;
    assert_eq!(added_admin.status(), StatusCode::OK);
    let deputy = app.state.store.find_by_email("deputy@school.test").await.unwrap().unwrap();
    assert_eq!(deputy.role, Role::Admin);
}

#[tokio::test]
async fn test_update_rehashes_password() {
    let app = app();
    let admin = app.admin_token().await;
    app.register("a@x.com", "secret1", "student", json!({})).await;
    let id = app.student_id("a@x.com").await;

    let response = app
        .put(
            &format!("/update-student/{}", id),
            json!({ "password": "fresh-pass-2", "class": "8C" }),
            &admin,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), json!({ "message": "Student updated successfully" }));

    let stored = app.state.store.find_by_id(&id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, "fresh-pass-2");
    assert_eq!(stored.profile.class_name.as_deref(), Some("8C"));

    assert_eq!(app.login("a@x.com", "secret1").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("a@x.com", "fresh-pass-2").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_to_taken_email_is_duplicate() {
    let app = app();
    let admin = app.admin_token().await;
    app.register("a@x.com", "secret1", "student", json!({})).await;
    app.register("b@x.com", "secret1", "student", json!({})).await;
    let id = app.student_id("b@x.com").await;

    let response = app
        .put(&format!("/update-student/{}", id), json!({ "email": "A@X.com" }), &admin)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&response)["loginLink"], "/login");
}

#[tokio::test]
async fn test_update_and_remove_unknown_id() {
    let app = app();
    let admin = app.admin_token().await;

    let update = app
        .put("/update-student/does-not-exist", json!({ "name": "Nobody" }), &admin)
        .await;
    assert_eq!(update.status(), StatusCode::NOT_FOUND);

    let remove = app.delete("/remove-student/does-not-exist", &admin).await;
    assert_eq!(remove.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&remove), json!({ "error": "Student not found" }));
}

#[tokio::test]
async fn test_remove_student() {
    let app = app();
    let admin = app.admin_token().await;
    app.register("a@x.com", "secret1", "student", json!({})).await;
    let student = app.token_for("a@x.com", "secret1").await;
    let id = app.student_id("a@x.com").await;

    let response = app.delete(&format!("/remove-student/{}", id), &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), json!({ "message": "Student removed successfully" }));

    // The token outlives the account, but the lookup comes back empty
    let me = app.get("/student-data", Some(&student)).await;
    assert_eq!(body(&me), Value::Null);

    let again = app.delete(&format!("/remove-student/{}", id), &admin).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.state.security.count("account_removed").await, 1);
}

#[tokio::test]
async fn test_send_test_email() {
    let app = app();
    let admin = app.admin_token().await;

    let unauthenticated = app
        .post("/send-test-email", json!({ "email": "a@x.com", "name": "Asha" }), None)
        .await;
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);
    assert!(app.mailer.sent().await.is_empty());

    let response = app
        .post("/send-test-email", json!({ "email": "a@x.com", "name": "Asha" }), Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), json!({ "message": "Test email sent successfully" }));

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@x.com");
    assert_eq!(sent[0].body, "Hello Asha,\nThis is a test email.");
}

#[tokio::test]
async fn test_health_headers_and_unknown_routes() {
    let app = app();

    let health = app.get("/health", None).await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.body().as_ref(), b"OK");
    assert_eq!(health.headers()["x-frame-options"], "DENY");
    assert_eq!(health.headers()["x-content-type-options"], "nosniff");

    let missing = app.get("/nowhere", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&missing), json!({ "error": "Not found" }));
    assert_eq!(missing.headers()["cache-control"], "no-cache, no-store, must-revalidate");

    let wrong_method = app.get("/login", None).await;
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
}
