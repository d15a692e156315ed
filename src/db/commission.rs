use chrono::Utc;
use sqlx::SqliteConnection;

use crate::errors::AppError;
use crate::money::Money;
use crate::structs::{
    BookingCommissionDetails, BookingCommissionTransaction, MemberRequest,
    MembershipCommissionTransaction, ReferralDetail, ReferralKind,
};

pub async fn create_booking_commission(
    conn: &mut SqliteConnection,
    profile_id: &str,
    booking_id: &str,
    referal_code: Option<&str>,
    commission: Money,
) -> Result<BookingCommissionTransaction, sqlx::Error> {
    sqlx::query_as::<_, BookingCommissionTransaction>(
        "INSERT INTO booking_commission_transactions (id, profile_id, booking_id, referal_code, commission, created_at)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(super::new_id())
    .bind(profile_id)
    .bind(booking_id)
    .bind(referal_code)
    .bind(commission)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

pub async fn booking_commission_for(
    conn: &mut SqliteConnection,
    booking_id: &str,
) -> Result<Option<BookingCommissionTransaction>, sqlx::Error> {
    sqlx::query_as::<_, BookingCommissionTransaction>(
        "SELECT * FROM booking_commission_transactions WHERE booking_id = $1",
    )
    .bind(booking_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Booking commissions earned through `referal_code`, with the paying
/// guest's name and the booking's payment state.
pub async fn booking_commissions_by_code(
    conn: &mut SqliteConnection,
    referal_code: &str,
) -> Result<Vec<BookingCommissionDetails>, sqlx::Error> {
    sqlx::query_as::<_, BookingCommissionDetails>(
        "SELECT t.id, t.profile_id, t.booking_id, t.referal_code, t.commission, t.created_at,
                b.payment_status,
                COALESCE(p.first_name, '') AS first_name, COALESCE(p.last_name, '') AS last_name
         FROM booking_commission_transactions t
         JOIN bookings b ON b.id = t.booking_id
         LEFT JOIN profiles p ON p.subject_id = t.profile_id
         WHERE t.referal_code = $1
         ORDER BY t.created_at DESC",
    )
    .bind(referal_code)
    .fetch_all(&mut *conn)
    .await
}

pub struct NewMembershipCommission<'a> {
    pub profile_id: &'a str,
    pub member_row_id: &'a str,
    pub referal_code: Option<&'a str>,
    pub commission: Money,
    pub closer_code: Option<&'a str>,
    pub closer_commission: Money,
    pub total_price: Money,
}

pub async fn create_membership_commission(
    conn: &mut SqliteConnection,
    new: &NewMembershipCommission<'_>,
) -> Result<MembershipCommissionTransaction, sqlx::Error> {
    sqlx::query_as::<_, MembershipCommissionTransaction>(
        "INSERT INTO membership_commission_transactions
            (id, profile_id, member_id, referal_code, commission, closer_id, closer_commission,
             total_price, payment_method, payment_status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'stripe', 0, $9) RETURNING *",
    )
    .bind(super::new_id())
    .bind(new.profile_id)
    .bind(new.member_row_id)
    .bind(new.referal_code)
    .bind(new.commission)
    .bind(new.closer_code)
    .bind(new.closer_commission)
    .bind(new.total_price)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

pub async fn membership_commission_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<MembershipCommissionTransaction>, sqlx::Error> {
    sqlx::query_as::<_, MembershipCommissionTransaction>(
        "SELECT * FROM membership_commission_transactions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn pending_membership_commission(
    conn: &mut SqliteConnection,
    profile_id: &str,
) -> Result<Option<MembershipCommissionTransaction>, sqlx::Error> {
    sqlx::query_as::<_, MembershipCommissionTransaction>(
        "SELECT * FROM membership_commission_transactions
         WHERE profile_id = $1 AND payment_status = 0
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(profile_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn mark_membership_paid(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE membership_commission_transactions SET payment_status = 1 WHERE id = $1",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    super::expect_affected(result, "Membership transaction")
}

/// Booking and membership commissions credited to `member_code`, newest first.
pub async fn referral_details(
    conn: &mut SqliteConnection,
    member_code: &str,
) -> Result<Vec<ReferralDetail>, sqlx::Error> {
    let bookings = booking_commissions_by_code(conn, member_code).await?;

    let memberships: Vec<(String, Money, chrono::DateTime<Utc>, bool, String, String)> = sqlx::query_as(
        "SELECT t.id, t.commission, t.created_at, t.payment_status,
                COALESCE(p.first_name, ''), COALESCE(p.last_name, '')
         FROM membership_commission_transactions t
         LEFT JOIN profiles p ON p.subject_id = t.profile_id
         WHERE t.referal_code = $1",
    )
    .bind(member_code)
    .fetch_all(&mut *conn)
    .await?;

    let mut details: Vec<ReferralDetail> = bookings
        .into_iter()
        .map(|b| ReferralDetail {
            id: b.id,
            first_name: b.first_name,
            last_name: b.last_name,
            commission: b.commission,
            created_at: b.created_at,
            payment_status: b.payment_status,
            kind: ReferralKind::Booking,
        })
        .chain(memberships.into_iter().map(
            |(id, commission, created_at, payment_status, first_name, last_name)| ReferralDetail {
                id,
                first_name,
                last_name,
                commission,
                created_at,
                payment_status,
                kind: ReferralKind::Membership,
            },
        ))
        .collect();
    details.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(details)
}

/// Membership transactions for the admin overview.
pub async fn member_requests(conn: &mut SqliteConnection) -> Result<Vec<MemberRequest>, sqlx::Error> {
    sqlx::query_as::<_, MemberRequest>(
        "SELECT t.id, m.id AS member_id, m.member_id AS member_code,
                COALESCE(p.first_name, '') AS first_name, COALESCE(p.last_name, '') AS last_name,
                COALESCE(p.email, '') AS email, tr.tier_name,
                p.dob, p.citizen, p.phone, p.address, p.gender,
                p.bank_name, p.bank_acc_num, p.bank_acc_name,
                m.is_active, t.referal_code, t.closer_id, t.payment_method, t.payment_status,
                t.created_at
         FROM membership_commission_transactions t
         JOIN members m ON m.id = t.member_id
         JOIN tiers tr ON tr.id = m.tier_id
         LEFT JOIN profiles p ON p.subject_id = t.profile_id
         ORDER BY t.created_at DESC",
    )
    .fetch_all(&mut *conn)
    .await
}
