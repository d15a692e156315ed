use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;
use validator::Validate;

use crate::errors::AppError;
use crate::structs::GeneralVariable;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariableInput {
    #[validate(length(min = 1, max = 100, message = "is required"))]
    pub variable_name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub variable_value: String,
    #[validate(length(min = 1, max = 20, message = "is required"))]
    pub variable_type: String,
}

pub async fn find_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<GeneralVariable>, sqlx::Error> {
    sqlx::query_as::<_, GeneralVariable>("SELECT * FROM general_variables WHERE variable_name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn require_by_name(conn: &mut SqliteConnection, name: &str) -> Result<GeneralVariable, AppError> {
    find_by_name(conn, name).await?.ok_or(AppError::NotFound("Variable"))
}

/// Inserts the variable, or replaces the value of an existing one with the same name.
pub async fn upsert(conn: &mut SqliteConnection, input: &VariableInput) -> Result<GeneralVariable, sqlx::Error> {
    sqlx::query_as::<_, GeneralVariable>(
        "INSERT INTO general_variables (id, variable_name, variable_value, variable_type, created_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (variable_name) DO UPDATE
            SET variable_value = excluded.variable_value, variable_type = excluded.variable_type
         RETURNING *",
    )
    .bind(super::new_id())
    .bind(&input.variable_name)
    .bind(&input.variable_value)
    .bind(&input.variable_type)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}
