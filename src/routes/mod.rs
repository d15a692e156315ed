//! HTTP handlers, one module per area of the site.

use std::collections::HashMap;
use std::str::FromStr;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::StreamExt;

use crate::errors::{ActionMessage, AppError, AppResult};
use crate::storage::{self, MAX_IMAGE_SIZE};
use crate::AppState;

mod admin;
mod auth;
mod booking;
mod checkout;
mod content;
mod favorite;
mod member;
mod profile;
mod property;
mod review;
mod reward;
mod withdrawal;

#[cfg(test)]
pub(crate) mod testing;

/// Text fields are small; anything larger is treated as abuse.
const MAX_FIELD_SIZE: usize = 16 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::register_handler)
        .service(auth::login_handler)
        .service(auth::logout_handler)
        .service(profile::fetch_profile_image_handler)
        .service(profile::create_profile_handler)
        .service(profile::fetch_profile_handler)
        .service(profile::update_profile_handler)
        .service(profile::update_profile_image_handler)
        .service(property::fetch_properties_handler)
        .service(property::create_property_handler)
        .service(property::fetch_property_rating_handler)
        .service(review::fetch_property_reviews_handler)
        .service(property::fetch_property_details_handler)
        .service(property::fetch_rentals_handler)
        .service(property::fetch_rental_details_handler)
        .service(property::update_property_handler)
        .service(property::update_property_image_handler)
        .service(property::delete_rental_handler)
        .service(favorite::fetch_favorites_handler)
        .service(favorite::fetch_favorite_id_handler)
        .service(favorite::toggle_favorite_handler)
        .service(review::fetch_five_star_reviews_handler)
        .service(review::create_review_handler)
        .service(review::fetch_reviews_by_user_handler)
        .service(review::delete_review_handler)
        .service(booking::create_booking_handler)
        .service(booking::fetch_bookings_handler)
        .service(booking::delete_booking_handler)
        .service(booking::fetch_reservation_stats_handler)
        .service(booking::fetch_reservations_handler)
        .service(checkout::create_booking_checkout_handler)
        .service(checkout::confirm_booking_handler)
        .service(checkout::create_membership_checkout_handler)
        .service(checkout::confirm_membership_handler)
        .service(member::create_member_handler)
        .service(member::fetch_member_handler)
        .service(member::validate_referral_code_handler)
        .service(member::fetch_downline_handler)
        .service(member::fetch_member_dashboard_handler)
        .service(member::fetch_booking_commissions_handler)
        .service(withdrawal::request_withdrawal_handler)
        .service(withdrawal::fetch_withdrawals_handler)
        .service(reward::fetch_rewards_handler)
        .service(reward::redeem_reward_handler)
        .service(content::fetch_galleries_handler)
        .service(content::fetch_promotions_handler)
        .service(content::fetch_promotion_public_handler)
        .service(admin::fetch_stats_handler)
        .service(admin::fetch_charts_handler)
        .service(admin::fetch_member_requests_handler)
        .service(admin::update_member_handler)
        .service(admin::get_variable_handler)
        .service(admin::insert_variable_handler)
        .service(admin::create_gallery_handler)
        .service(admin::delete_gallery_handler)
        .service(admin::fetch_promotion_handler)
        .service(admin::create_promotion_handler)
        .service(admin::update_promotion_handler)
        .service(admin::update_promotion_image_handler)
        .service(admin::delete_promotion_handler)
        .service(admin::fetch_all_withdrawals_handler)
        .service(admin::approve_withdrawal_handler)
        .service(admin::reject_withdrawal_handler);
}

/// `200 OK` with `{message}`.
pub(crate) fn message(text: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok().json(ActionMessage::new(text))
}

/// `303 See Other` to `location`.
pub(crate) fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", location))
        .finish()
}

pub(crate) struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// A `multipart/form-data` body: text fields plus at most one file.
#[derive(Default)]
pub(crate) struct UploadForm {
    fields: HashMap<String, String>,
    image: Option<Upload>,
}

impl UploadForm {
    pub async fn read(mut payload: Multipart) -> AppResult<Self> {
        let mut form = UploadForm::default();
        while let Some(item) = payload.next().await {
            let mut field = item?;
            let name = field.name().unwrap_or_default().to_string();
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);
            let limit = if filename.is_some() { MAX_IMAGE_SIZE + 1 } else { MAX_FIELD_SIZE };

            let mut data = Vec::new();
            while let Some(chunk) = field.next().await {
                data.extend_from_slice(&chunk?);
                if data.len() > limit {
                    return Err(AppError::Validation(format!("{} is too large", name)));
                }
            }

            match filename {
                Some(filename) => form.image = Some(Upload { filename, data }),
                None => {
                    let value = String::from_utf8(data)
                        .map_err(|_| AppError::Validation(format!("{} is not valid text", name)))?;
                    form.fields.insert(name, value.trim().to_string());
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn number<T: FromStr>(&self, name: &str) -> AppResult<T> {
        self.fields
            .get(name)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| AppError::Validation(format!("{} must be a number", name)))
    }

    pub fn take_image(&mut self) -> AppResult<Upload> {
        self.image
            .take()
            .ok_or_else(|| AppError::Validation("Image is required".to_string()))
    }
}

/// Validates the upload and stores it, returning its public path.
pub(crate) async fn store_image(state: &AppState, upload: Upload) -> AppResult<String> {
    let ext = storage::validate_image(&upload.filename, &upload.data)?;
    state.images.put(upload.data, &ext).await
}
