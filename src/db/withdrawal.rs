use chrono::Utc;
use sqlx::SqliteConnection;

use crate::errors::AppError;
use crate::money::Money;
use crate::structs::{Member, Profile, WithdrawalRequest, WithdrawalStatus};

/// Files a pending request paying out to the bank account on the profile.
pub async fn create_request(
    conn: &mut SqliteConnection,
    profile: &Profile,
    member: &Member,
    amount: Money,
) -> Result<WithdrawalRequest, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, WithdrawalRequest>(
        "INSERT INTO withdrawal_requests
            (id, profile_id, member_id, amount, bank_name, bank_acc_number, bank_acc_name, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) RETURNING *",
    )
    .bind(super::new_id())
    .bind(&profile.subject_id)
    .bind(&member.id)
    .bind(amount)
    .bind(profile.bank_name.as_deref().unwrap_or_default())
    .bind(profile.bank_acc_num.as_deref().unwrap_or_default())
    .bind(profile.bank_acc_name.as_deref().unwrap_or_default())
    .bind(WithdrawalStatus::Pending)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
    sqlx::query_as::<_, WithdrawalRequest>("SELECT * FROM withdrawal_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn for_profile(conn: &mut SqliteConnection, profile_id: &str) -> Result<Vec<WithdrawalRequest>, sqlx::Error> {
    sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM withdrawal_requests WHERE profile_id = $1 ORDER BY created_at DESC",
    )
    .bind(profile_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<WithdrawalRequest>, sqlx::Error> {
    sqlx::query_as::<_, WithdrawalRequest>("SELECT * FROM withdrawal_requests ORDER BY created_at DESC")
        .fetch_all(&mut *conn)
        .await
}

/// Moves a pending request to its final status. Settled requests are left alone.
pub async fn settle(conn: &mut SqliteConnection, id: &str, status: WithdrawalStatus) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE withdrawal_requests SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(status)
    .bind(Utc::now())
    .bind(id)
    .bind(WithdrawalStatus::Pending)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::Validation("Withdrawal request is not pending".to_string()));
    }
    Ok(())
}
