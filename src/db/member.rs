use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::errors::{AppError, AppResult};
use crate::membership::{Balances, CodeRegistry, DownlineRow};
use crate::structs::Member;

pub async fn find_by_subject(conn: &mut SqliteConnection, profile_id: &str) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE profile_id = $1")
        .bind(profile_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_by_code(conn: &mut SqliteConnection, member_code: &str) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE member_id = $1")
        .bind(member_code)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn require_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Member, AppError> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Member"))
}

pub async fn require_by_subject(conn: &mut SqliteConnection, profile_id: &str) -> Result<Member, AppError> {
    find_by_subject(conn, profile_id).await?.ok_or(AppError::NotFound("Member"))
}

pub async fn code_exists(conn: &mut SqliteConnection, member_code: &str) -> Result<bool, sqlx::Error> {
    let hits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE member_id = $1")
        .bind(member_code)
        .fetch_one(&mut *conn)
        .await?;
    Ok(hits > 0)
}

#[async_trait]
impl CodeRegistry for SqliteConnection {
    async fn is_taken(&mut self, code: &str) -> AppResult<bool> {
        Ok(code_exists(self, code).await?)
    }
}

pub async fn create_member(
    conn: &mut SqliteConnection,
    member_code: &str,
    profile_id: &str,
    parent_code: Option<&str>,
    tier_id: &str,
) -> Result<Member, sqlx::Error> {
    let member = sqlx::query_as::<_, Member>(
        "INSERT INTO members (id, member_id, profile_id, parent_id, tier_id, is_active, commission, point, created_at)
         VALUES ($1, $2, $3, $4, $5, 0, '0', 0, $6) RETURNING *",
    )
    .bind(super::new_id())
    .bind(member_code)
    .bind(profile_id)
    .bind(parent_code)
    .bind(tier_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    log::info!("Member {} registered for {}", member.member_id, profile_id);
    Ok(member)
}

/// Drops an unfinished (never activated) registration and its membership
/// transactions so the caller can register again.
pub async fn delete_incomplete(conn: &mut SqliteConnection, profile_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "DELETE FROM membership_commission_transactions
         WHERE profile_id = $1 AND payment_status = 0",
    )
    .bind(profile_id)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM members WHERE profile_id = $1 AND is_active = 0")
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_balances(conn: &mut SqliteConnection, id: &str, balances: Balances) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE members SET commission = $1, point = $2 WHERE id = $3")
        .bind(balances.commission)
        .bind(balances.point)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Member")
}

pub async fn set_tier(conn: &mut SqliteConnection, id: &str, tier_id: &str) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE members SET tier_id = $1 WHERE id = $2")
        .bind(tier_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Member")
}

pub async fn activate(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE members SET is_active = 1 WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Member")
}

pub async fn direct_downline(conn: &mut SqliteConnection, member_code: &str) -> Result<Vec<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE parent_id = $1 ORDER BY created_at ASC")
        .bind(member_code)
        .fetch_all(&mut *conn)
        .await
}

/// Flat rows of every member below `member_code`, at most `max_depth` levels deep.
pub async fn downline_rows(
    conn: &mut SqliteConnection,
    member_code: &str,
    max_depth: i64,
) -> Result<Vec<DownlineRow>, sqlx::Error> {
    sqlx::query_as::<_, DownlineRow>(
        "WITH RECURSIVE downline(id, member_id, parent_id, profile_id, depth) AS (
             SELECT id, member_id, parent_id, profile_id, 1 FROM members WHERE parent_id = $1
             UNION
             SELECT m.id, m.member_id, m.parent_id, m.profile_id, d.depth + 1
             FROM members m JOIN downline d ON m.parent_id = d.member_id
             WHERE d.depth < $2
         )
         SELECT d.id, d.member_id, d.parent_id,
                COALESCE(p.first_name, '') AS first_name,
                COALESCE(p.last_name, '') AS last_name
         FROM downline d LEFT JOIN profiles p ON p.subject_id = d.profile_id
         ORDER BY d.depth ASC",
    )
    .bind(member_code)
    .bind(max_depth)
    .fetch_all(&mut *conn)
    .await
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub async fn active_member(
        conn: &mut SqliteConnection,
        code: &str,
        subject: &str,
        parent: Option<&str>,
    ) -> Member {
        let m = create_member(conn, code, subject, parent, "tier-1").await.unwrap();
        activate(conn, &m.id).await.unwrap();
        find_by_code(conn, code).await.unwrap().unwrap()
    }
}
