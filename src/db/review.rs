use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;
use validator::Validate;

use crate::errors::AppError;
use crate::structs::{PropertyReviewView, RatingSummary, Review, UserReviewView};
use crate::utils::round_rating;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub property_id: String,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: i64,
    #[validate(length(min = 10, max = 1000, message = "must be between 10 and 1000 characters"))]
    pub comment: String,
}

pub async fn exists_for(
    conn: &mut SqliteConnection,
    profile_id: &str,
    property_id: &str,
) -> Result<bool, sqlx::Error> {
    let hits: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reviews WHERE profile_id = $1 AND property_id = $2",
    )
    .bind(profile_id)
    .bind(property_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(hits > 0)
}

/// One review per (author, property).
pub async fn create_review(
    conn: &mut SqliteConnection,
    profile_id: &str,
    input: &ReviewInput,
) -> Result<Review, AppError> {
    if exists_for(conn, profile_id, &input.property_id).await? {
        return Err(already_reviewed());
    }
    insert_review(conn, profile_id, input).await
}

fn already_reviewed() -> AppError {
    AppError::Conflict("You have already reviewed this property".to_string())
}

// the unique index settles submissions that race past `exists_for`
async fn insert_review(
    conn: &mut SqliteConnection,
    profile_id: &str,
    input: &ReviewInput,
) -> Result<Review, AppError> {
    sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (id, profile_id, property_id, rating, comment, created_at)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(super::new_id())
    .bind(profile_id)
    .bind(&input.property_id)
    .bind(input.rating)
    .bind(&input.comment)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => already_reviewed(),
        e => AppError::SqlxError(e),
    })
}

pub async fn for_property(
    conn: &mut SqliteConnection,
    property_id: &str,
) -> Result<Vec<PropertyReviewView>, sqlx::Error> {
    sqlx::query_as::<_, PropertyReviewView>(
        "SELECT r.id, r.rating, r.comment,
                COALESCE(p.username, '') AS username, COALESCE(p.profile_image, '') AS profile_image
         FROM reviews r
         LEFT JOIN profiles p ON p.subject_id = r.profile_id
         WHERE r.property_id = $1
         ORDER BY r.created_at DESC",
    )
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn by_author(
    conn: &mut SqliteConnection,
    profile_id: &str,
) -> Result<Vec<UserReviewView>, sqlx::Error> {
    sqlx::query_as::<_, UserReviewView>(
        "SELECT r.id, r.rating, r.comment, p.name AS property_name, p.image AS property_image
         FROM reviews r
         JOIN properties p ON p.id = r.property_id
         WHERE r.profile_id = $1
         ORDER BY r.created_at DESC",
    )
    .bind(profile_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn delete_own(conn: &mut SqliteConnection, id: &str, profile_id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND profile_id = $2")
        .bind(id)
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Review")
}

pub async fn rating_summary(
    conn: &mut SqliteConnection,
    property_id: &str,
) -> Result<RatingSummary, sqlx::Error> {
    let (avg, count): (Option<f64>, i64) = sqlx::query_as(
        "SELECT AVG(rating), COUNT(id) FROM reviews WHERE property_id = $1",
    )
    .bind(property_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(RatingSummary {
        rating: avg.map(round_rating).unwrap_or(0.0),
        count,
    })
}

pub async fn five_star(conn: &mut SqliteConnection) -> Result<Vec<PropertyReviewView>, sqlx::Error> {
    sqlx::query_as::<_, PropertyReviewView>(
        "SELECT r.id, r.rating, r.comment,
                COALESCE(p.username, '') AS username, COALESCE(p.profile_image, '') AS profile_image
         FROM reviews r
         LEFT JOIN profiles p ON p.subject_id = r.profile_id
         WHERE r.rating = 5
         ORDER BY r.created_at DESC",
    )
    .fetch_all(&mut *conn)
    .await
}
