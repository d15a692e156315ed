use chrono::{DateTime, Months, Utc};
use sqlx::SqliteConnection;

use crate::structs::{AdminStats, MonthlyCount};
use crate::utils::month_label;

const CHART_MONTHS: u32 = 6;

pub async fn admin_stats(conn: &mut SqliteConnection) -> Result<AdminStats, sqlx::Error> {
    Ok(AdminStats {
        users_count: super::profile::count(conn).await?,
        properties_count: super::property::count(conn).await?,
        bookings_count: super::booking::count_paid(conn).await?,
    })
}

/// Paid bookings of the last six months, bucketed by creation month in
/// chronological order.
pub async fn booking_chart(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<Vec<MonthlyCount>, sqlx::Error> {
    let since = now.checked_sub_months(Months::new(CHART_MONTHS)).unwrap_or(now);
    let created = super::booking::paid_created_since(conn, since).await?;
    Ok(group_by_month(&created))
}

pub fn group_by_month(created: &[DateTime<Utc>]) -> Vec<MonthlyCount> {
    let mut buckets: Vec<MonthlyCount> = Vec::new();
    for at in created {
        let label = month_label(at);
        match buckets.iter_mut().find(|b| b.date == label) {
            Some(bucket) => bucket.count += 1,
            None => buckets.push(MonthlyCount { date: label, count: 1 }),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn buckets_follow_input_order() {
        let dates = [
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 28, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        ];
        assert_eq!(
            group_by_month(&dates),
            vec![
                MonthlyCount { date: "Jan 2024".to_string(), count: 2 },
                MonthlyCount { date: "Mar 2024".to_string(), count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn empty_database_has_zero_stats() {
        let pool = crate::db::testing::test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(
            admin_stats(&mut conn).await.unwrap(),
            AdminStats { users_count: 0, properties_count: 0, bookings_count: 0 }
        );
        assert!(booking_chart(&mut conn, Utc::now()).await.unwrap().is_empty());
    }
}
