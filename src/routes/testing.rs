//! Shared fixtures for handler tests.

use std::sync::Arc;

use actix_identity::Identity;
use actix_web::{post, web, HttpMessage, HttpRequest, HttpResponse};

use crate::auth::AdminPolicy;
use crate::payment::testing::FakeGateway;
use crate::storage::LocalImageStore;
use crate::AppState;

pub const ADMIN: &str = "user_admin";

pub struct TestContext {
    pub state: AppState,
    pub payments: Arc<FakeGateway>,
    _uploads: tempfile::TempDir,
}

pub async fn context() -> TestContext {
    let uploads = tempfile::tempdir().unwrap();
    let payments = Arc::new(FakeGateway::default());
    let state = AppState {
        db_pool: crate::db::testing::test_pool().await,
        admin: AdminPolicy::new([ADMIN.to_string()].into_iter().collect()),
        payments: payments.clone(),
        images: Arc::new(LocalImageStore::new(uploads.path().join("uploads"), "/uploads")),
    };
    TestContext {
        state,
        payments,
        _uploads: uploads,
    }
}

/// Signs the caller in as `subject` without going through an account.
#[post("/test/login/{subject}")]
pub async fn login_as(request: HttpRequest, subject: web::Path<String>) -> HttpResponse {
    match Identity::login(&request.extensions(), subject.into_inner()) {
        Ok(_) => HttpResponse::Ok().finish(),
        Err(_) => HttpResponse::InternalServerError().finish(),
    }
}

macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(actix_identity::IdentityMiddleware::default())
                .wrap(
                    actix_session::SessionMiddleware::builder(
                        actix_session::storage::CookieSessionStore::default(),
                        actix_web::cookie::Key::generate(),
                    )
                    .cookie_secure(false)
                    .build(),
                )
                .app_data(actix_web::web::Data::new($state.clone()))
                .service($crate::routes::testing::login_as)
                .configure($crate::routes::configure),
        )
        .await
    };
}
pub(crate) use test_app;

/// Session cookie for `subject`.
macro_rules! login {
    ($app:expr, $subject:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri(&format!("/test/login/{}", $subject))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert!(resp.status().is_success());
        resp.response()
            .cookies()
            .next()
            .expect("session cookie")
            .into_owned()
    }};
}
pub(crate) use login;

/// `multipart/form-data` body with text fields and an optional file.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let boundary = "----rentmember-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}
