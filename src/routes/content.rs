use actix_web::{
    get,
    web::{self, Data},
    HttpResponse, Responder,
};

use crate::db;
use crate::errors::AppError;
use crate::AppState;

#[get("/galleries")]
pub async fn fetch_galleries_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let mut conn = state.db_pool.acquire().await?;
    let galleries = db::content::list_galleries(&mut conn).await?;
    Ok(HttpResponse::Ok().json(galleries))
}

#[get("/promotions")]
pub async fn fetch_promotions_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let mut conn = state.db_pool.acquire().await?;
    let promotions = db::content::list_promotions(&mut conn).await?;
    Ok(HttpResponse::Ok().json(promotions))
}

#[get("/promotions/{id}")]
pub async fn fetch_promotion_public_handler(
    path: web::Path<String>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let mut conn = state.db_pool.acquire().await?;
    let promotion = db::content::find_promotion(&mut conn, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Promotion"))?;
    Ok(HttpResponse::Ok().json(promotion))
}
