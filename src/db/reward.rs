use chrono::Utc;
use sqlx::SqliteConnection;

use crate::structs::{LoyaltyPointDetail, PointTransaction, Reward};
use crate::membership::MEMBERSHIP_REFERRAL_POINTS;

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Reward>, sqlx::Error> {
    sqlx::query_as::<_, Reward>("SELECT * FROM rewards ORDER BY point_req ASC")
        .fetch_all(&mut *conn)
        .await
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Reward>, sqlx::Error> {
    sqlx::query_as::<_, Reward>("SELECT * FROM rewards WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn record_redemption(
    conn: &mut SqliteConnection,
    profile_id: &str,
    reward: &Reward,
) -> Result<PointTransaction, sqlx::Error> {
    sqlx::query_as::<_, PointTransaction>(
        "INSERT INTO point_transactions (id, profile_id, reward_id, point, created_at)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(super::new_id())
    .bind(profile_id)
    .bind(&reward.id)
    .bind(reward.point_req)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

/// Point ledger of a member: points earned from paid membership referrals
/// and points spent on rewards (negative), newest first.
pub async fn loyalty_point_details(
    conn: &mut SqliteConnection,
    profile_id: &str,
    member_code: &str,
) -> Result<Vec<LoyaltyPointDetail>, sqlx::Error> {
    let earned: Vec<(String, chrono::DateTime<Utc>, String, String)> = sqlx::query_as(
        "SELECT t.id, t.created_at, COALESCE(p.first_name, ''), COALESCE(p.last_name, '')
         FROM membership_commission_transactions t
         LEFT JOIN profiles p ON p.subject_id = t.profile_id
         WHERE t.referal_code = $1 AND t.payment_status = 1",
    )
    .bind(member_code)
    .fetch_all(&mut *conn)
    .await?;

    let spent: Vec<(String, chrono::DateTime<Utc>, String, i64, String, String)> = sqlx::query_as(
        "SELECT pt.id, pt.created_at, r.reward_name, pt.point,
                COALESCE(p.first_name, ''), COALESCE(p.last_name, '')
         FROM point_transactions pt
         JOIN rewards r ON r.id = pt.reward_id
         LEFT JOIN profiles p ON p.subject_id = pt.profile_id
         WHERE pt.profile_id = $1",
    )
    .bind(profile_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut details: Vec<LoyaltyPointDetail> = earned
        .into_iter()
        .map(|(id, created_at, first_name, last_name)| LoyaltyPointDetail {
            id,
            created_at,
            first_name,
            last_name,
            kind: "Membership Referral".to_string(),
            point: MEMBERSHIP_REFERRAL_POINTS,
        })
        .chain(spent.into_iter().map(
            |(id, created_at, reward_name, point, first_name, last_name)| LoyaltyPointDetail {
                id,
                created_at,
                first_name,
                last_name,
                kind: format!("Redeem Reward: {}", reward_name),
                point: -point,
            },
        ))
        .collect();
    details.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(details)
}
