use actix_identity::Identity;
use actix_web::{
    post,
    web::{self, Data},
    HttpMessage, HttpRequest, HttpResponse, Responder,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::{db, utils, AppState};

#[derive(Deserialize)]
pub struct Login {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct Register {
    email: String,
    password: String,
    password2: String,
}

fn sign_in(request: &HttpRequest, subject: String) -> Result<(), AppError> {
    Identity::login(&request.extensions(), subject).map_err(|e| {
        log::error!("Failed to attach identity: {}", e);
        AppError::Identity(e.to_string())
    })?;
    Ok(())
}

#[post("/auth/register")]
pub async fn register_handler(
    web::Form(form): web::Form<Register>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    if form.email.is_empty() || form.password.is_empty() || form.password2.is_empty() {
        return Err(AppError::Validation("All fields are required".to_string()));
    }
    if form.password != form.password2 {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    if !form.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    utils::check_password_strength(&form.password)?;

    let lc_email = form.email.trim().to_lowercase();
    let mut conn = state.db_pool.acquire().await?;
    if db::account::find_by_email(&mut conn, &lc_email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }
    let account = db::account::create_account(&mut conn, lc_email, &form.password).await?;
    sign_in(&request, account.id)?;

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/profile/create"))
        .body("User registered successfully"))
}

#[post("/auth/login")]
pub async fn login_handler(
    web::Form(form): web::Form<Login>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation("All fields are required".to_string()));
    }
    let lc_email = form.email.trim().to_lowercase();

    let mut conn = state.db_pool.acquire().await?;
    let account = db::account::find_by_email(&mut conn, &lc_email).await?;
    match account {
        Some(account) if utils::verify_password(&form.password, &account.pwd_hash) => {
            sign_in(&request, account.id)?;
            Ok(super::message("Login successful"))
        }
        _ => {
            log::warn!("Failed login for {}", lc_email);
            Ok(HttpResponse::Unauthorized().json(crate::errors::ActionMessage::new("Invalid credentials")))
        }
    }
}

#[post("/auth/logout")]
pub async fn logout_handler(user: Identity) -> impl Responder {
    user.logout();
    super::see_other("/")
}
