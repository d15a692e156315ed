use sqlx::SqliteConnection;

use crate::errors::AppError;
use crate::structs::Tier;

pub async fn find_by_name(conn: &mut SqliteConnection, tier_name: &str) -> Result<Option<Tier>, sqlx::Error> {
    sqlx::query_as::<_, Tier>("SELECT * FROM tiers WHERE tier_name = $1")
        .bind(tier_name)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Tier>, sqlx::Error> {
    sqlx::query_as::<_, Tier>("SELECT * FROM tiers WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn require_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Tier, AppError> {
    find_by_id(conn, id).await?.ok_or(AppError::NotFound("Tier"))
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Tier>, sqlx::Error> {
    sqlx::query_as::<_, Tier>("SELECT * FROM tiers ORDER BY min_point ASC")
        .fetch_all(&mut *conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use crate::money::Money;

    #[tokio::test]
    async fn seeded_tiers_are_available() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let base = find_by_name(&mut conn, "Tier 1").await.unwrap().unwrap();
        assert_eq!(base.commission, Money::from_units(10));
        assert_eq!(base.min_point, 0);
        assert_eq!(list(&mut conn).await.unwrap().len(), 3);
        assert!(matches!(
            require_by_id(&mut conn, "missing").await,
            Err(AppError::NotFound("Tier"))
        ));
    }
}
