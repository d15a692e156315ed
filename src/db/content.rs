use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;
use validator::Validate;

use crate::errors::AppError;
use crate::structs::{Gallery, Promotion};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PromotionInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub title: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub subtitle: String,
    #[validate(length(min = 1, message = "is required"))]
    pub category: String,
    #[validate(length(min = 10, max = 1000, message = "must be between 10 and 1000 characters"))]
    pub description: String,
}

pub async fn list_galleries(conn: &mut SqliteConnection) -> Result<Vec<Gallery>, sqlx::Error> {
    sqlx::query_as::<_, Gallery>("SELECT * FROM galleries ORDER BY created_at DESC")
        .fetch_all(&mut *conn)
        .await
}

pub async fn create_gallery(
    conn: &mut SqliteConnection,
    title: &str,
    media: &str,
    profile_id: &str,
) -> Result<Gallery, sqlx::Error> {
    sqlx::query_as::<_, Gallery>(
        "INSERT INTO galleries (id, title, media, profile_id, created_at) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(super::new_id())
    .bind(title)
    .bind(media)
    .bind(profile_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

/// Deletes the gallery and hands back its media path for blob cleanup.
pub async fn delete_gallery(conn: &mut SqliteConnection, id: &str) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>("DELETE FROM galleries WHERE id = $1 RETURNING media")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Gallery"))
}

pub async fn list_promotions(conn: &mut SqliteConnection) -> Result<Vec<Promotion>, sqlx::Error> {
    sqlx::query_as::<_, Promotion>("SELECT * FROM promotions ORDER BY created_at DESC")
        .fetch_all(&mut *conn)
        .await
}

pub async fn find_promotion(conn: &mut SqliteConnection, id: &str) -> Result<Option<Promotion>, sqlx::Error> {
    sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn create_promotion(
    conn: &mut SqliteConnection,
    input: &PromotionInput,
    media: &str,
    profile_id: &str,
) -> Result<Promotion, sqlx::Error> {
    sqlx::query_as::<_, Promotion>(
        "INSERT INTO promotions (id, title, subtitle, category, description, media, profile_id, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(super::new_id())
    .bind(&input.title)
    .bind(&input.subtitle)
    .bind(&input.category)
    .bind(&input.description)
    .bind(media)
    .bind(profile_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

pub async fn update_promotion(
    conn: &mut SqliteConnection,
    id: &str,
    input: &PromotionInput,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE promotions SET title = $1, subtitle = $2, category = $3, description = $4 WHERE id = $5",
    )
    .bind(&input.title)
    .bind(&input.subtitle)
    .bind(&input.category)
    .bind(&input.description)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    super::expect_affected(result, "Promotion")
}

/// Replaces the promotion image and returns the previous path.
pub async fn update_promotion_media(
    conn: &mut SqliteConnection,
    id: &str,
    media: &str,
) -> Result<String, AppError> {
    let previous = find_promotion(conn, id)
        .await?
        .ok_or(AppError::NotFound("Promotion"))?
        .media;
    sqlx::query("UPDATE promotions SET media = $1 WHERE id = $2")
        .bind(media)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(previous)
}

pub async fn delete_promotion(conn: &mut SqliteConnection, id: &str) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>("DELETE FROM promotions WHERE id = $1 RETURNING media")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Promotion"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    fn promo(title: &str) -> PromotionInput {
        PromotionInput {
            title: title.to_string(),
            subtitle: "Members only".to_string(),
            category: "villa".to_string(),
            description: "Twenty percent off every weekend stay.".to_string(),
        }
    }

    #[tokio::test]
    async fn promotion_lifecycle() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let p = create_promotion(&mut conn, &promo("Weekend deal"), "/uploads/a.png", "admin")
            .await
            .unwrap();
        update_promotion(&mut conn, &p.id, &promo("Long weekend deal")).await.unwrap();
        let old = update_promotion_media(&mut conn, &p.id, "/uploads/b.png").await.unwrap();
        assert_eq!(old, "/uploads/a.png");

        let found = find_promotion(&mut conn, &p.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Long weekend deal");
        assert_eq!(found.media, "/uploads/b.png");

        assert_eq!(delete_promotion(&mut conn, &p.id).await.unwrap(), "/uploads/b.png");
        assert!(matches!(
            delete_promotion(&mut conn, &p.id).await,
            Err(AppError::NotFound("Promotion"))
        ));
    }

    #[tokio::test]
    async fn gallery_delete_returns_media() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let g = create_gallery(&mut conn, "Pool", "/uploads/pool.png", "admin").await.unwrap();
        assert_eq!(list_galleries(&mut conn).await.unwrap().len(), 1);
        assert_eq!(delete_gallery(&mut conn, &g.id).await.unwrap(), "/uploads/pool.png");
        assert!(list_galleries(&mut conn).await.unwrap().is_empty());
    }
}
