use actix_identity::Identity;
use actix_web::{
    delete, get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::member::require_referrer;
use super::{message, see_other};
use crate::auth::current_user;
use crate::db;
use crate::errors::AppError;
use crate::membership::commission_for;
use crate::money::Money;
use crate::utils::calculate_totals;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    property_id: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    #[serde(default)]
    referal_code: Option<String>,
}

/// Creates an unpaid booking and its commission record, then sends the
/// caller to checkout. Earlier unpaid bookings of the caller are dropped.
#[post("/bookings")]
pub async fn create_booking_handler(
    web::Form(form): web::Form<BookingForm>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let referal_code = form
        .referal_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let mut tx = state.db_pool.begin().await?;
    db::booking::delete_unpaid_for(&mut tx, &subject).await?;
    let property = db::property::find_by_id(&mut tx, &form.property_id)
        .await?
        .ok_or(AppError::NotFound("Property"))?;
    let referrer = match referal_code {
        Some(code) => Some(require_referrer(&mut tx, code, &subject).await?),
        None => None,
    };

    let totals = calculate_totals(form.check_in, form.check_out, property.price)?;
    if db::booking::overlaps_paid(&mut tx, &property.id, form.check_in, form.check_out).await? {
        return Err(AppError::Conflict(
            "Property is already booked for the selected dates".to_string(),
        ));
    }
    let booking = db::booking::create_booking(
        &mut tx,
        &subject,
        &property.id,
        form.check_in,
        form.check_out,
        &totals,
    )
    .await?;

    let commission = match &referrer {
        Some(member) => {
            let tier = db::tier::require_by_id(&mut tx, &member.tier_id).await?;
            commission_for(totals.order_total, &tier)
        }
        None => Money::ZERO,
    };
    db::commission::create_booking_commission(
        &mut tx,
        &subject,
        &booking.id,
        referrer.as_ref().map(|m| m.member_id.as_str()),
        commission,
    )
    .await?;
    tx.commit().await?;

    log::info!("Booking {} created for {}", booking.id, subject);
    Ok(see_other(&format!("/checkout?bookingId={}", booking.id)))
}

#[get("/bookings")]
pub async fn fetch_bookings_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let bookings = db::booking::paid_for_profile(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

#[delete("/bookings/{id}")]
pub async fn delete_booking_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    db::booking::delete_booking(&mut conn, &path.into_inner(), &subject).await?;
    Ok(message("Booking deleted successfully"))
}

#[get("/reservations")]
pub async fn fetch_reservations_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let reservations = db::booking::reservations_for_owner(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(reservations))
}

#[get("/reservations/stats")]
pub async fn fetch_reservation_stats_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let stats = db::booking::reservation_stats(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(stats))
}
