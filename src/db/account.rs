use sqlx::SqliteConnection;

use crate::{errors::AppError, structs::Account, utils};

pub async fn find_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn create_account(
    conn: &mut SqliteConnection,
    email: String,
    password: &str,
) -> Result<Account, AppError> {
    let pwd_hash = utils::hash_password(password)?;
    let account = sqlx::query_as::<_, Account>(
        "INSERT INTO accounts (id, email, pwd_hash, created_at) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(super::new_id())
    .bind(email)
    .bind(pwd_hash)
    .bind(chrono::Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    log::info!("Account created: {}", account.id);
    Ok(account)
}
