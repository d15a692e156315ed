use actix_identity::Identity;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};

use crate::auth::current_user;
use crate::db;
use crate::errors::AppError;
use crate::AppState;

#[post("/favorites/{property_id}")]
pub async fn toggle_favorite_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let property_id = path.into_inner();
    let mut conn = state.db_pool.acquire().await?;
    db::property::find_by_id(&mut conn, &property_id)
        .await?
        .ok_or(AppError::NotFound("Property"))?;
    let added = db::favorite::toggle(&mut conn, &subject, &property_id).await?;
    Ok(super::message(if added {
        "Added to Faves"
    } else {
        "Removed from Faves"
    }))
}

#[get("/favorites/{property_id}")]
pub async fn fetch_favorite_id_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let id = db::favorite::find_id(&mut conn, &subject, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(id))
}

#[get("/favorites")]
pub async fn fetch_favorites_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let favorites = db::favorite::list_properties(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(favorites))
}
