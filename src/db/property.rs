use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;
use validator::Validate;

use crate::errors::AppError;
use crate::money::Money;
use crate::structs::{BookedRange, Property, PropertyCard, RentalSummary};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub tagline: String,
    #[validate(length(min = 1, message = "is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "is required"))]
    pub country: String,
    #[validate(length(min = 1, message = "is required"))]
    pub city: String,
    #[validate(length(min = 10, max = 1000, message = "must be between 10 and 1000 characters"))]
    pub description: String,
    #[validate(range(min = 0, max = 1000000000000, message = "must be between 0 and 1000000000000"))]
    pub price: i64,
    #[validate(range(min = 0, message = "must be a positive number"))]
    pub guests: i64,
    #[validate(range(min = 0, message = "must be a positive number"))]
    pub bedrooms: i64,
    #[validate(range(min = 0, message = "must be a positive number"))]
    pub beds: i64,
    #[validate(range(min = 0, message = "must be a positive number"))]
    pub baths: i64,
    #[serde(default)]
    pub amenities: String,
}

pub async fn create_property(
    conn: &mut SqliteConnection,
    owner: &str,
    input: &PropertyInput,
    image: &str,
) -> Result<Property, sqlx::Error> {
    let now = Utc::now();
    let property = sqlx::query_as::<_, Property>(
        "INSERT INTO properties (id, name, tagline, category, image, country, city, description, price,
            guests, bedrooms, beds, baths, amenities, profile_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
         RETURNING *",
    )
    .bind(super::new_id())
    .bind(&input.name)
    .bind(&input.tagline)
    .bind(&input.category)
    .bind(image)
    .bind(&input.country)
    .bind(&input.city)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.guests)
    .bind(input.bedrooms)
    .bind(input.beds)
    .bind(input.baths)
    .bind(&input.amenities)
    .bind(owner)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    log::info!("Property created: {} by {}", property.id, owner);
    Ok(property)
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Property>, sqlx::Error> {
    sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_owned(
    conn: &mut SqliteConnection,
    id: &str,
    owner: &str,
) -> Result<Option<Property>, sqlx::Error> {
    sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1 AND profile_id = $2")
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await
}

/// Search over name and tagline (case-insensitive) with an optional
/// category filter, newest first.
pub async fn search(
    conn: &mut SqliteConnection,
    search: &str,
    category: Option<&str>,
) -> Result<Vec<PropertyCard>, sqlx::Error> {
    let pattern = format!("%{}%", search.to_lowercase());
    let mut cards = sqlx::query_as::<_, PropertyCard>(
        "SELECT p.id, p.name, p.tagline, p.city, p.image, p.price, p.created_at,
                AVG(r.rating) AS rating, COUNT(r.id) AS count
         FROM properties p
         LEFT JOIN reviews r ON r.property_id = p.id
         WHERE (LOWER(p.name) LIKE $1 OR LOWER(p.tagline) LIKE $1)
           AND ($2 IS NULL OR p.category = $2)
         GROUP BY p.id
         ORDER BY p.created_at DESC",
    )
    .bind(pattern)
    .bind(category)
    .fetch_all(&mut *conn)
    .await?;
    for card in cards.iter_mut() {
        card.rating = card.rating.map(crate::utils::round_rating);
    }
    Ok(cards)
}

/// Paid stays, used to block dates on the property page.
pub async fn booked_ranges(
    conn: &mut SqliteConnection,
    property_id: &str,
) -> Result<Vec<BookedRange>, sqlx::Error> {
    sqlx::query_as::<_, BookedRange>(
        "SELECT check_in, check_out FROM bookings WHERE property_id = $1 AND payment_status = 1",
    )
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn rentals_with_sums(
    conn: &mut SqliteConnection,
    owner: &str,
) -> Result<Vec<RentalSummary>, sqlx::Error> {
    let rentals = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE profile_id = $1")
        .bind(owner)
        .fetch_all(&mut *conn)
        .await?;

    let mut summaries = Vec::with_capacity(rentals.len());
    for rental in rentals {
        let paid: Vec<(i64, Money)> = sqlx::query_as(
            "SELECT total_nights, order_total FROM bookings WHERE property_id = $1 AND payment_status = 1",
        )
        .bind(&rental.id)
        .fetch_all(&mut *conn)
        .await?;
        summaries.push(RentalSummary {
            id: rental.id,
            name: rental.name,
            price: rental.price,
            created_at: rental.created_at,
            total_nights_sum: paid.iter().map(|(nights, _)| nights).sum(),
            order_total_sum: paid.into_iter().map(|(_, total)| total).sum(),
        });
    }
    Ok(summaries)
}

pub async fn update_property(
    conn: &mut SqliteConnection,
    id: &str,
    owner: &str,
    input: &PropertyInput,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE properties SET name = $1, tagline = $2, category = $3, country = $4, city = $5,
            description = $6, price = $7, guests = $8, bedrooms = $9, beds = $10, baths = $11,
            amenities = $12, updated_at = $13
         WHERE id = $14 AND profile_id = $15",
    )
    .bind(&input.name)
    .bind(&input.tagline)
    .bind(&input.category)
    .bind(&input.country)
    .bind(&input.city)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.guests)
    .bind(input.bedrooms)
    .bind(input.beds)
    .bind(input.baths)
    .bind(&input.amenities)
    .bind(Utc::now())
    .bind(id)
    .bind(owner)
    .execute(&mut *conn)
    .await?;
    super::expect_affected(result, "Property")
}

pub async fn update_property_image(
    conn: &mut SqliteConnection,
    id: &str,
    owner: &str,
    image: &str,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE properties SET image = $1, updated_at = $2 WHERE id = $3 AND profile_id = $4",
    )
    .bind(image)
    .bind(Utc::now())
    .bind(id)
    .bind(owner)
    .execute(&mut *conn)
    .await?;
    super::expect_affected(result, "Property")
}

pub async fn delete_property(
    conn: &mut SqliteConnection,
    id: &str,
    owner: &str,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM properties WHERE id = $1 AND profile_id = $2")
        .bind(id)
        .bind(owner)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Property")?;
    log::info!("Property {} deleted by {}", id, owner);
    Ok(())
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM properties")
        .fetch_one(&mut *conn)
        .await
}

pub async fn count_owned(conn: &mut SqliteConnection, owner: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM properties WHERE profile_id = $1")
        .bind(owner)
        .fetch_one(&mut *conn)
        .await
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn input(name: &str, category: &str, price: i64) -> PropertyInput {
        PropertyInput {
            name: name.to_string(),
            tagline: format!("{} tagline", name),
            category: category.to_string(),
            country: "ID".to_string(),
            city: "Ubud".to_string(),
            description: "A quiet place surrounded by rice fields.".to_string(),
            price,
            guests: 4,
            bedrooms: 2,
            beds: 2,
            baths: 1,
            amenities: "[]".to_string(),
        }
    }

    pub async fn property(conn: &mut SqliteConnection, owner: &str, name: &str, price: i64) -> Property {
        create_property(conn, owner, &input(name, "villa", price), "/uploads/p.png")
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    #[test]
    fn nightly_price_is_bounded() {
        assert!(fixtures::input("Sunset Villa", "villa", 1_000_000_000_000).validate().is_ok());
        assert!(fixtures::input("Sunset Villa", "villa", 1_000_000_000_001).validate().is_err());
        assert!(fixtures::input("Sunset Villa", "villa", -1).validate().is_err());
    }

    #[tokio::test]
    async fn search_matches_name_or_tagline_and_category() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        create_property(&mut conn, "owner", &fixtures::input("Sunset Villa", "villa", 100), "/a.png")
            .await
            .unwrap();
        create_property(&mut conn, "owner", &fixtures::input("City Loft", "apartment", 80), "/b.png")
            .await
            .unwrap();

        let all = search(&mut conn, "", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let sunset = search(&mut conn, "SUNSET", None).await.unwrap();
        assert_eq!(sunset.len(), 1);
        assert_eq!(sunset[0].name, "Sunset Villa");
        assert_eq!(sunset[0].rating, None);
        assert_eq!(sunset[0].count, 0);

        let by_tagline = search(&mut conn, "loft tag", None).await.unwrap();
        assert_eq!(by_tagline.len(), 1);

        let apartments = search(&mut conn, "", Some("apartment")).await.unwrap();
        assert_eq!(apartments.len(), 1);
        assert_eq!(apartments[0].name, "City Loft");
    }

    #[tokio::test]
    async fn only_owner_can_update_or_delete() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let p = fixtures::property(&mut conn, "owner", "Sunset Villa", 100).await;

        let mut changed = fixtures::input("Sunrise Villa", "villa", 120);
        changed.guests = 6;
        let denied = update_property(&mut conn, &p.id, "intruder", &changed).await;
        assert!(matches!(denied, Err(AppError::NotFound("Property"))));

        update_property(&mut conn, &p.id, "owner", &changed).await.unwrap();
        let updated = find_by_id(&mut conn, &p.id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Sunrise Villa");
        assert_eq!(updated.price, 120);

        assert!(delete_property(&mut conn, &p.id, "intruder").await.is_err());
        delete_property(&mut conn, &p.id, "owner").await.unwrap();
        assert!(find_by_id(&mut conn, &p.id).await.unwrap().is_none());
    }
}
