use actix_identity::Identity;
use actix_multipart::Multipart;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use validator::Validate;

use super::{message, store_image, UploadForm};
use crate::auth::current_user;
use crate::db::{self, profile::ProfileInput};
use crate::errors::AppError;
use crate::storage;
use crate::AppState;

#[post("/profile")]
pub async fn create_profile_handler(
    web::Form(form): web::Form<ProfileInput>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    form.validate()?;

    let mut conn = state.db_pool.acquire().await?;
    let account = db::account::find_by_id(&mut conn, &subject)
        .await?
        .ok_or(AppError::NotFound("Account"))?;
    db::profile::create_profile(&mut conn, &subject, &account.email, &form).await?;
    Ok(super::see_other("/"))
}

#[get("/profile")]
pub async fn fetch_profile_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let profile = db::profile::require_by_subject(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Image of the signed-in caller, `null` for guests and callers without a profile.
#[get("/profile/image")]
pub async fn fetch_profile_image_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let Ok(subject) = current_user(identity) else {
        return Ok(HttpResponse::Ok().json(serde_json::Value::Null));
    };
    let mut conn = state.db_pool.acquire().await?;
    let image = db::profile::find_by_subject(&mut conn, &subject)
        .await?
        .map(|p| p.profile_image)
        .filter(|img| !img.is_empty());
    Ok(HttpResponse::Ok().json(image))
}

#[post("/profile/update")]
pub async fn update_profile_handler(
    web::Form(form): web::Form<ProfileInput>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    form.validate()?;
    let mut conn = state.db_pool.acquire().await?;
    db::profile::update_profile(&mut conn, &subject, &form).await?;
    Ok(message("Profile updated successfully"))
}

#[post("/profile/image")]
pub async fn update_profile_image_handler(
    payload: Multipart,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut form = UploadForm::read(payload).await?;

    let mut conn = state.db_pool.acquire().await?;
    let previous = db::profile::require_by_subject(&mut conn, &subject).await?.profile_image;
    let path = store_image(&state, form.take_image()?).await?;
    db::profile::update_profile_image(&mut conn, &subject, &path).await?;
    storage::discard(state.images.as_ref(), &previous).await;
    Ok(message("Profile image updated successfully"))
}
