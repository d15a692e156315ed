use actix_identity::Identity;
use actix_multipart::Multipart;
use actix_web::{
    delete, get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::Deserialize;
use validator::Validate;

use super::{message, store_image, UploadForm};
use crate::auth::current_user;
use crate::db::{self, property::PropertyInput};
use crate::errors::AppError;
use crate::storage;
use crate::structs::PropertyDetails;
use crate::AppState;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    search: String,
    category: Option<String>,
}

fn property_input(form: &UploadForm) -> Result<PropertyInput, AppError> {
    let input = PropertyInput {
        name: form.text("name"),
        tagline: form.text("tagline"),
        category: form.text("category"),
        country: form.text("country"),
        city: form.text("city"),
        description: form.text("description"),
        price: form.number("price")?,
        guests: form.number("guests")?,
        bedrooms: form.number("bedrooms")?,
        beds: form.number("beds")?,
        baths: form.number("baths")?,
        amenities: form.text("amenities"),
    };
    input.validate()?;
    Ok(input)
}

#[post("/properties")]
pub async fn create_property_handler(
    payload: Multipart,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut form = UploadForm::read(payload).await?;
    let input = property_input(&form)?;
    let image = store_image(&state, form.take_image()?).await?;

    let mut conn = state.db_pool.acquire().await?;
    db::property::create_property(&mut conn, &subject, &input, &image).await?;
    Ok(super::see_other("/"))
}

#[get("/properties")]
pub async fn fetch_properties_handler(
    query: web::Query<SearchQuery>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let mut conn = state.db_pool.acquire().await?;
    let properties = db::property::search(&mut conn, query.search.trim(), category).await?;
    Ok(HttpResponse::Ok().json(properties))
}

#[get("/properties/{id}")]
pub async fn fetch_property_details_handler(
    path: web::Path<String>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let mut conn = state.db_pool.acquire().await?;
    let property = db::property::find_by_id(&mut conn, &id)
        .await?
        .ok_or(AppError::NotFound("Property"))?;
    let profile = db::profile::find_by_subject(&mut conn, &property.profile_id).await?;
    let bookings = db::property::booked_ranges(&mut conn, &id).await?;
    let rating = db::review::rating_summary(&mut conn, &id).await?;
    Ok(HttpResponse::Ok().json(PropertyDetails {
        property,
        profile,
        bookings,
        rating: rating.rating,
        count: rating.count,
    }))
}

#[get("/properties/{id}/rating")]
pub async fn fetch_property_rating_handler(
    path: web::Path<String>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let mut conn = state.db_pool.acquire().await?;
    let rating = db::review::rating_summary(&mut conn, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rating))
}

#[get("/rentals")]
pub async fn fetch_rentals_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let rentals = db::property::rentals_with_sums(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(rentals))
}

#[get("/rentals/{id}")]
pub async fn fetch_rental_details_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let rental = db::property::find_owned(&mut conn, &path.into_inner(), &subject)
        .await?
        .ok_or(AppError::NotFound("Property"))?;
    Ok(HttpResponse::Ok().json(rental))
}

#[post("/rentals/{id}")]
pub async fn update_property_handler(
    path: web::Path<String>,
    payload: Multipart,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let form = UploadForm::read(payload).await?;
    let input = property_input(&form)?;
    let mut conn = state.db_pool.acquire().await?;
    db::property::update_property(&mut conn, &path.into_inner(), &subject, &input).await?;
    Ok(message("Update Successful"))
}

#[post("/rentals/{id}/image")]
pub async fn update_property_image_handler(
    path: web::Path<String>,
    payload: Multipart,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let id = path.into_inner();
    let mut form = UploadForm::read(payload).await?;

    let mut conn = state.db_pool.acquire().await?;
    let previous = db::property::find_owned(&mut conn, &id, &subject)
        .await?
        .ok_or(AppError::NotFound("Property"))?
        .image;
    let image = store_image(&state, form.take_image()?).await?;
    db::property::update_property_image(&mut conn, &id, &subject, &image).await?;
    storage::discard(state.images.as_ref(), &previous).await;
    Ok(message("Property Image Updated Successful"))
}

#[delete("/rentals/{id}")]
pub async fn delete_rental_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    db::property::delete_property(&mut conn, &path.into_inner(), &subject).await?;
    Ok(message("Rental deleted successfully"))
}
