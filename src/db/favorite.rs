use chrono::Utc;
use sqlx::SqliteConnection;

use crate::structs::PropertyCard;

pub async fn find_id(
    conn: &mut SqliteConnection,
    profile_id: &str,
    property_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM favorites WHERE profile_id = $1 AND property_id = $2")
        .bind(profile_id)
        .bind(property_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Adds the favorite when absent, removes it when present. Returns whether
/// the property is a favorite afterwards.
pub async fn toggle(
    conn: &mut SqliteConnection,
    profile_id: &str,
    property_id: &str,
) -> Result<bool, sqlx::Error> {
    match find_id(conn, profile_id, property_id).await? {
        Some(id) => {
            sqlx::query("DELETE FROM favorites WHERE id = $1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            Ok(false)
        }
        None => {
            sqlx::query(
                "INSERT INTO favorites (id, profile_id, property_id, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(super::new_id())
            .bind(profile_id)
            .bind(property_id)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
            Ok(true)
        }
    }
}

pub async fn list_properties(
    conn: &mut SqliteConnection,
    profile_id: &str,
) -> Result<Vec<PropertyCard>, sqlx::Error> {
    let mut cards = sqlx::query_as::<_, PropertyCard>(
        "SELECT p.id, p.name, p.tagline, p.city, p.image, p.price, p.created_at,
                AVG(r.rating) AS rating, COUNT(r.id) AS count
         FROM favorites f
         JOIN properties p ON p.id = f.property_id
         LEFT JOIN reviews r ON r.property_id = p.id
         WHERE f.profile_id = $1
         GROUP BY p.id
         ORDER BY f.created_at DESC",
    )
    .bind(profile_id)
    .fetch_all(&mut *conn)
    .await?;
    for card in cards.iter_mut() {
        card.rating = card.rating.map(crate::utils::round_rating);
    }
    Ok(cards)
}
