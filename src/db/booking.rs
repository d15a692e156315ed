use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;

use crate::errors::AppError;
use crate::money::Money;
use crate::structs::{Booking, BookingView, ReservationStats, ReservationView};
use crate::utils::BookingTotals;

pub async fn delete_unpaid_for(conn: &mut SqliteConnection, profile_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM bookings WHERE profile_id = $1 AND payment_status = 0")
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// True when a paid booking of the property intersects `[check_in, check_out)`.
pub async fn overlaps_paid(
    conn: &mut SqliteConnection,
    property_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<bool, sqlx::Error> {
    let hits: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings
         WHERE property_id = $1 AND payment_status = 1 AND check_in < $3 AND $2 < check_out",
    )
    .bind(property_id)
    .bind(check_in)
    .bind(check_out)
    .fetch_one(&mut *conn)
    .await?;
    Ok(hits > 0)
}

pub async fn create_booking(
    conn: &mut SqliteConnection,
    profile_id: &str,
    property_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
    totals: &BookingTotals,
) -> Result<Booking, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings (id, profile_id, property_id, order_total, total_nights, check_in, check_out, payment_status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8) RETURNING *",
    )
    .bind(super::new_id())
    .bind(profile_id)
    .bind(property_id)
    .bind(totals.order_total)
    .bind(totals.total_nights)
    .bind(check_in)
    .bind(check_out)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_owned(
    conn: &mut SqliteConnection,
    id: &str,
    profile_id: &str,
) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 AND profile_id = $2")
        .bind(id)
        .bind(profile_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn mark_paid(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE bookings SET payment_status = 1 WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Booking")
}

pub async fn delete_booking(
    conn: &mut SqliteConnection,
    id: &str,
    profile_id: &str,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM bookings WHERE id = $1 AND profile_id = $2")
        .bind(id)
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Booking")
}

pub async fn paid_for_profile(
    conn: &mut SqliteConnection,
    profile_id: &str,
) -> Result<Vec<BookingView>, sqlx::Error> {
    sqlx::query_as::<_, BookingView>(
        "SELECT b.id, b.order_total, b.total_nights, b.check_in, b.check_out, b.created_at,
                p.id AS property_id, p.name AS property_name, p.city AS property_city
         FROM bookings b JOIN properties p ON p.id = b.property_id
         WHERE b.profile_id = $1 AND b.payment_status = 1
         ORDER BY b.created_at DESC",
    )
    .bind(profile_id)
    .fetch_all(&mut *conn)
    .await
}

/// Paid bookings made on properties owned by `owner`.
pub async fn reservations_for_owner(
    conn: &mut SqliteConnection,
    owner: &str,
) -> Result<Vec<ReservationView>, sqlx::Error> {
    sqlx::query_as::<_, ReservationView>(
        "SELECT b.id, b.order_total, b.total_nights, b.check_in, b.check_out, b.created_at,
                COALESCE(g.first_name, '') AS guest_first_name,
                COALESCE(g.last_name, '') AS guest_last_name,
                p.id AS property_id, p.name AS property_name, p.price AS property_price,
                p.city AS property_city
         FROM bookings b
         JOIN properties p ON p.id = b.property_id
         LEFT JOIN profiles g ON g.subject_id = b.profile_id
         WHERE b.payment_status = 1 AND p.profile_id = $1
         ORDER BY b.created_at DESC",
    )
    .bind(owner)
    .fetch_all(&mut *conn)
    .await
}

pub async fn reservation_stats(
    conn: &mut SqliteConnection,
    owner: &str,
) -> Result<ReservationStats, sqlx::Error> {
    let properties = super::property::count_owned(conn, owner).await?;
    let rows: Vec<(i64, Money)> = sqlx::query_as(
        "SELECT b.total_nights, b.order_total FROM bookings b
         JOIN properties p ON p.id = b.property_id
         WHERE p.profile_id = $1 AND b.payment_status = 1",
    )
    .bind(owner)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ReservationStats {
        properties,
        nights: rows.iter().map(|(nights, _)| nights).sum(),
        amount: rows.into_iter().map(|(_, total)| total).sum(),
    })
}

pub async fn count_paid(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE payment_status = 1")
        .fetch_one(&mut *conn)
        .await
}

pub async fn paid_created_since(
    conn: &mut SqliteConnection,
    since: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, sqlx::Error> {
    let created: Vec<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT created_at FROM bookings WHERE payment_status = 1 ORDER BY created_at ASC",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(created.into_iter().filter(|at| *at >= since).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::property::fixtures as property_fixtures;
    use crate::db::testing::test_pool;
    use crate::utils::calculate_totals;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn overlap_only_counts_paid_bookings() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let p = property_fixtures::property(&mut conn, "owner", "Villa", 500_000).await;
        let totals = calculate_totals(day(1), day(3), p.price).unwrap();
        let b = create_booking(&mut conn, "guest", &p.id, day(1), day(3), &totals).await.unwrap();

        assert!(!overlaps_paid(&mut conn, &p.id, day(2), day(4)).await.unwrap());
        mark_paid(&mut conn, &b.id).await.unwrap();
        assert!(overlaps_paid(&mut conn, &p.id, day(2), day(4)).await.unwrap());
        assert!(!overlaps_paid(&mut conn, &p.id, day(3), day(5)).await.unwrap());
    }

    #[tokio::test]
    async fn unpaid_bookings_are_cleared_and_stats_use_paid_ones() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let p = property_fixtures::property(&mut conn, "owner", "Villa", 500_000).await;
        let totals = calculate_totals(day(1), day(3), p.price).unwrap();
        let paid = create_booking(&mut conn, "guest", &p.id, day(1), day(3), &totals).await.unwrap();
        mark_paid(&mut conn, &paid.id).await.unwrap();
        create_booking(&mut conn, "guest", &p.id, day(10), day(12), &totals).await.unwrap();

        assert_eq!(delete_unpaid_for(&mut conn, "guest").await.unwrap(), 1);
        assert_eq!(paid_for_profile(&mut conn, "guest").await.unwrap().len(), 1);

        let stats = reservation_stats(&mut conn, "owner").await.unwrap();
        assert_eq!(stats.properties, 1);
        assert_eq!(stats.nights, 2);
        assert_eq!(stats.amount, Money::from_units(1_000_000));

        let reservations = reservations_for_owner(&mut conn, "owner").await.unwrap();
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0].property_name, "Villa");
        assert_eq!(count_paid(&mut conn).await.unwrap(), 1);
    }
}
