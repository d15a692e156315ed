//! Back office. Every handler here is restricted to the configured admins.

use actix_identity::Identity;
use actix_multipart::Multipart;
use actix_web::{
    delete, get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use chrono::Utc;
use validator::Validate;

use super::member::MemberForm;
use super::{message, store_image, UploadForm};
use crate::auth::require_admin;
use crate::db::{self, content::PromotionInput, variable::VariableInput};
use crate::errors::AppError;
use crate::membership::Balances;
use crate::storage;
use crate::structs::WithdrawalStatus;
use crate::AppState;

#[get("/admin/stats")]
pub async fn fetch_stats_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let stats = db::stats::admin_stats(&mut conn).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/admin/charts")]
pub async fn fetch_charts_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let chart = db::stats::booking_chart(&mut conn, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(chart))
}

#[get("/admin/members/requests")]
pub async fn fetch_member_requests_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let requests = db::commission::member_requests(&mut conn).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Corrects the personal and bank fields on a member's profile.
#[post("/admin/members/{member_id}")]
pub async fn update_member_handler(
    path: web::Path<String>,
    web::Form(form): web::Form<MemberForm>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let details = form.details()?;
    let mut conn = state.db_pool.acquire().await?;
    let member = db::member::require_by_id(&mut conn, &path.into_inner()).await?;
    db::profile::update_personal_details(&mut conn, &member.profile_id, Some(form.names()), &details).await?;
    Ok(message("Member updated successfully"))
}

#[get("/admin/variables/{name}")]
pub async fn get_variable_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let variable = db::variable::require_by_name(&mut conn, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(variable))
}

#[post("/admin/variables")]
pub async fn insert_variable_handler(
    web::Form(form): web::Form<VariableInput>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = require_admin(identity, &state.admin)?;
    form.validate()?;
    let mut conn = state.db_pool.acquire().await?;
    let variable = db::variable::upsert(&mut conn, &form).await?;
    log::info!("{} set {} = {}", subject, variable.variable_name, variable.variable_value);
    Ok(HttpResponse::Ok().json(variable))
}

#[post("/admin/galleries")]
pub async fn create_gallery_handler(
    payload: Multipart,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = require_admin(identity, &state.admin)?;
    let mut form = UploadForm::read(payload).await?;
    let title = form.text("title");
    if title.len() < 2 || title.len() > 100 {
        return Err(AppError::Validation("title must be between 2 and 100 characters".to_string()));
    }
    let media = store_image(&state, form.take_image()?).await?;
    let mut conn = state.db_pool.acquire().await?;
    let gallery = db::content::create_gallery(&mut conn, &title, &media, &subject).await?;
    Ok(HttpResponse::Ok().json(gallery))
}

#[delete("/admin/galleries/{id}")]
pub async fn delete_gallery_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let media = db::content::delete_gallery(&mut conn, &path.into_inner()).await?;
    storage::discard(state.images.as_ref(), &media).await;
    Ok(message("Gallery deleted successfully"))
}

fn promotion_input(form: &UploadForm) -> Result<PromotionInput, AppError> {
    let input = PromotionInput {
        title: form.text("title"),
        subtitle: form.text("subtitle"),
        category: form.text("category"),
        description: form.text("description"),
    };
    input.validate()?;
    Ok(input)
}

#[get("/admin/promotions/{id}")]
pub async fn fetch_promotion_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let promotion = db::content::find_promotion(&mut conn, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Promotion"))?;
    Ok(HttpResponse::Ok().json(promotion))
}

#[post("/admin/promotions")]
pub async fn create_promotion_handler(
    payload: Multipart,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = require_admin(identity, &state.admin)?;
    let mut form = UploadForm::read(payload).await?;
    let input = promotion_input(&form)?;
    let media = store_image(&state, form.take_image()?).await?;
    let mut conn = state.db_pool.acquire().await?;
    let promotion = db::content::create_promotion(&mut conn, &input, &media, &subject).await?;
    Ok(HttpResponse::Ok().json(promotion))
}

#[post("/admin/promotions/{id}")]
pub async fn update_promotion_handler(
    path: web::Path<String>,
    web::Form(form): web::Form<PromotionInput>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    form.validate()?;
    let mut conn = state.db_pool.acquire().await?;
    db::content::update_promotion(&mut conn, &path.into_inner(), &form).await?;
    Ok(message("Promotion updated successfully"))
}

#[post("/admin/promotions/{id}/image")]
pub async fn update_promotion_image_handler(
    path: web::Path<String>,
    payload: Multipart,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let id = path.into_inner();
    let mut form = UploadForm::read(payload).await?;
    {
        let mut conn = state.db_pool.acquire().await?;
        db::content::find_promotion(&mut conn, &id)
            .await?
            .ok_or(AppError::NotFound("Promotion"))?;
    }
    let media = store_image(&state, form.take_image()?).await?;
    let mut conn = state.db_pool.acquire().await?;
    let previous = db::content::update_promotion_media(&mut conn, &id, &media).await?;
    storage::discard(state.images.as_ref(), &previous).await;
    Ok(message("Promotion image updated successfully"))
}

#[delete("/admin/promotions/{id}")]
pub async fn delete_promotion_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let media = db::content::delete_promotion(&mut conn, &path.into_inner()).await?;
    storage::discard(state.images.as_ref(), &media).await;
    Ok(message("Promotion deleted successfully"))
}

#[get("/admin/withdrawals")]
pub async fn fetch_all_withdrawals_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_admin(identity, &state.admin)?;
    let mut conn = state.db_pool.acquire().await?;
    let requests = db::withdrawal::list_all(&mut conn).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Pays out a pending request by deducting it from the member's commission.
#[post("/admin/withdrawals/{id}/approve")]
pub async fn approve_withdrawal_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = require_admin(identity, &state.admin)?;
    let id = path.into_inner();

    let mut tx = state.db_pool.begin().await?;
    let request = db::withdrawal::find_by_id(&mut tx, &id)
        .await?
        .ok_or(AppError::NotFound("Withdrawal request"))?;
    if request.status != WithdrawalStatus::Pending {
        return Err(AppError::Validation("Withdrawal request is not pending".to_string()));
    }
    let member = db::member::require_by_id(&mut tx, &request.member_id).await?;
    if request.amount > member.commission {
        return Err(AppError::Validation("Insufficient commission balance".to_string()));
    }
    db::member::set_balances(
        &mut tx,
        &member.id,
        Balances {
            commission: member.commission - request.amount,
            point: member.point,
        },
    )
    .await?;
    db::withdrawal::settle(&mut tx, &request.id, WithdrawalStatus::Approved).await?;
    tx.commit().await?;

    log::info!("Withdrawal {} approved by {}", request.id, subject);
    Ok(message("Withdrawal approved"))
}

#[post("/admin/withdrawals/{id}/reject")]
pub async fn reject_withdrawal_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = require_admin(identity, &state.admin)?;
    let id = path.into_inner();
    let mut conn = state.db_pool.acquire().await?;
    db::withdrawal::find_by_id(&mut conn, &id)
        .await?
        .ok_or(AppError::NotFound("Withdrawal request"))?;
    db::withdrawal::settle(&mut conn, &id, WithdrawalStatus::Rejected).await?;
    log::info!("Withdrawal {} rejected by {}", id, subject);
    Ok(message("Withdrawal rejected"))
}
