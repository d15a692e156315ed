use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;
use validator::Validate;

use crate::{errors::AppError, structs::Profile};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub last_name: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub username: String,
}

/// Personal and bank fields captured at membership registration.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetails {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    pub citizen: Option<String>,
    #[serde(alias = "birthDate")]
    pub dob: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub bank_name: Option<String>,
    pub bank_acc_num: Option<String>,
    pub bank_acc_name: Option<String>,
}

pub async fn find_by_subject(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE subject_id = $1")
        .bind(subject_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn require_by_subject(
    conn: &mut SqliteConnection,
    subject_id: &str,
) -> Result<Profile, AppError> {
    find_by_subject(conn, subject_id)
        .await?
        .ok_or(AppError::NotFound("Profile"))
}

pub async fn create_profile(
    conn: &mut SqliteConnection,
    subject_id: &str,
    email: &str,
    input: &ProfileInput,
) -> Result<Profile, AppError> {
    if find_by_subject(conn, subject_id).await?.is_some() {
        return Err(AppError::Conflict("Profile already exists".to_string()));
    }
    let now = Utc::now();
    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (id, subject_id, first_name, last_name, username, email, profile_image, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, '', $7, $7) RETURNING *",
    )
    .bind(super::new_id())
    .bind(subject_id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.username)
    .bind(email)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    log::info!("Profile created for {}", subject_id);
    Ok(profile)
}

pub async fn update_profile(
    conn: &mut SqliteConnection,
    subject_id: &str,
    input: &ProfileInput,
) -> Result<Profile, AppError> {
    sqlx::query_as::<_, Profile>(
        "UPDATE profiles SET first_name = $1, last_name = $2, username = $3, updated_at = $4
         WHERE subject_id = $5 RETURNING *",
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.username)
    .bind(Utc::now())
    .bind(subject_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Profile"))
}

pub async fn update_profile_image(
    conn: &mut SqliteConnection,
    subject_id: &str,
    image_path: &str,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE profiles SET profile_image = $1, updated_at = $2 WHERE subject_id = $3")
        .bind(image_path)
        .bind(Utc::now())
        .bind(subject_id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Profile")
}

/// Overwrites names (when given) plus the personal and bank fields.
pub async fn update_personal_details(
    conn: &mut SqliteConnection,
    subject_id: &str,
    names: Option<(&str, &str)>,
    details: &PersonalDetails,
) -> Result<(), AppError> {
    let mut query = String::from("UPDATE profiles SET updated_at = $1");
    let mut param_index = 2;
    if names.is_some() {
        query.push_str(&format!(
            ", first_name = ${}, last_name = ${}",
            param_index,
            param_index + 1
        ));
        param_index += 2;
    }
    for column in [
        "email",
        "citizen",
        "dob",
        "phone",
        "address",
        "gender",
        "bank_name",
        "bank_acc_num",
        "bank_acc_name",
    ] {
        query.push_str(&format!(", {} = ${}", column, param_index));
        param_index += 1;
    }
    query.push_str(&format!(" WHERE subject_id = ${}", param_index));

    let mut q = sqlx::query(&query).bind(Utc::now());
    if let Some((first_name, last_name)) = names {
        q = q.bind(first_name).bind(last_name);
    }
    let dob = details.dob.as_deref().map(|d| d.chars().take(10).collect::<String>());
    let result = q
        .bind(&details.email)
        .bind(&details.citizen)
        .bind(dob)
        .bind(&details.phone)
        .bind(&details.address)
        .bind(&details.gender)
        .bind(&details.bank_name)
        .bind(&details.bank_acc_num)
        .bind(&details.bank_acc_name)
        .bind(subject_id)
        .execute(&mut *conn)
        .await?;
    super::expect_affected(result, "Profile")
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(&mut *conn)
        .await
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    #[tokio::test]
    async fn profiles_are_unique_per_subject() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        fixtures::profile(&mut conn, "user_1", "Ayu").await;
        let input = ProfileInput {
            first_name: "Ayu".to_string(),
            last_name: "Again".to_string(),
            username: "ayu".to_string(),
        };
        let again = create_profile(&mut conn, "user_1", "x@example.com", &input).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(count(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn personal_details_trim_birth_date() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        fixtures::profile(&mut conn, "user_1", "Ayu").await;
        let details = PersonalDetails {
            email: "ayu@example.com".to_string(),
            dob: Some("1990-05-17T00:00:00.000Z".to_string()),
            bank_name: Some("BCA".to_string()),
            ..Default::default()
        };
        update_personal_details(&mut conn, "user_1", Some(("Ayu", "Lestari")), &details)
            .await
            .unwrap();
        let profile = require_by_subject(&mut conn, "user_1").await.unwrap();
        assert_eq!(profile.last_name, "Lestari");
        assert_eq!(profile.dob.as_deref(), Some("1990-05-17"));
        assert_eq!(profile.bank_name.as_deref(), Some("BCA"));
    }

    #[tokio::test]
    async fn updating_missing_profile_is_not_found() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let result = update_profile_image(&mut conn, "ghost", "/uploads/x.png").await;
        assert!(matches!(result, Err(AppError::NotFound("Profile"))));
    }
}
