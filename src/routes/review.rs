use actix_identity::Identity;
use actix_web::{
    delete, get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use validator::Validate;

use super::message;
use crate::auth::current_user;
use crate::db::{self, review::ReviewInput};
use crate::errors::AppError;
use crate::AppState;

#[post("/reviews")]
pub async fn create_review_handler(
    web::Form(form): web::Form<ReviewInput>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    form.validate()?;

    let mut conn = state.db_pool.acquire().await?;
    let property = db::property::find_by_id(&mut conn, &form.property_id)
        .await?
        .ok_or(AppError::NotFound("Property"))?;
    if property.profile_id == subject {
        return Err(AppError::Validation("You cannot review your own property".to_string()));
    }
    db::review::create_review(&mut conn, &subject, &form).await?;
    Ok(message("Review submitted successfully"))
}

#[get("/properties/{id}/reviews")]
pub async fn fetch_property_reviews_handler(
    path: web::Path<String>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let mut conn = state.db_pool.acquire().await?;
    let reviews = db::review::for_property(&mut conn, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

#[get("/reviews")]
pub async fn fetch_reviews_by_user_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let reviews = db::review::by_author(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

#[get("/reviews/five-star")]
pub async fn fetch_five_star_reviews_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let mut conn = state.db_pool.acquire().await?;
    let reviews = db::review::five_star(&mut conn).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

#[delete("/reviews/{id}")]
pub async fn delete_review_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    db::review::delete_own(&mut conn, &path.into_inner(), &subject).await?;
    Ok(message("Review deleted successfully"))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use crate::db;
    use crate::routes::testing::{context, login, test_app};

    #[actix_web::test]
    async fn owners_cannot_review_and_guests_review_once() {
        let ctx = context().await;
        let property = {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            db::property::fixtures::property(&mut conn, "owner", "Villa", 100).await
        };
        let app = test_app!(ctx.state);
        let form = [
            ("propertyId", property.id.as_str()),
            ("rating", "5"),
            ("comment", "Spotless and quiet, loved it."),
        ];

        let owner = login!(app, "owner");
        let req = test::TestRequest::post().uri("/reviews").cookie(owner).set_form(form).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let guest = login!(app, "guest");
        let req = test::TestRequest::post()
            .uri("/reviews")
            .cookie(guest.clone())
            .set_form(form)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post().uri("/reviews").cookie(guest).set_form(form).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get().uri("/reviews/five-star").to_request();
        let reviews: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reviews.as_array().unwrap().len(), 1);
    }
}
