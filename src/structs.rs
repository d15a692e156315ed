use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::money::Money;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pwd_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub profile_image: String,
    pub citizen: Option<String>,
    pub dob: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub bank_name: Option<String>,
    pub bank_acc_num: Option<String>,
    pub bank_acc_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub name: String,
    pub tagline: String,
    pub category: String,
    pub image: String,
    pub country: String,
    pub city: String,
    pub description: String,
    pub price: i64,
    pub guests: i64,
    pub bedrooms: i64,
    pub beds: i64,
    pub baths: i64,
    pub amenities: String,
    pub profile_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub profile_id: String,
    pub property_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub profile_id: String,
    pub property_id: String,
    pub order_total: Money,
    pub total_nights: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub payment_status: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub id: String,
    pub tier_name: String,
    pub commission: Money,
    pub min_point: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub member_id: String,
    pub profile_id: String,
    pub parent_id: Option<String>,
    pub tier_id: String,
    pub is_active: bool,
    pub commission: Money,
    pub point: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingCommissionTransaction {
    pub id: String,
    pub profile_id: String,
    pub booking_id: String,
    pub referal_code: Option<String>,
    pub commission: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MembershipCommissionTransaction {
    pub id: String,
    pub profile_id: String,
    pub member_id: String,
    pub referal_code: Option<String>,
    pub commission: Money,
    pub closer_id: Option<String>,
    pub closer_commission: Money,
    pub total_price: Money,
    pub payment_method: String,
    pub payment_status: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub reward_name: String,
    pub point_req: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointTransaction {
    pub id: String,
    pub profile_id: String,
    pub reward_id: String,
    pub point: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    pub id: String,
    pub title: String,
    pub media: String,
    pub profile_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub category: String,
    pub description: String,
    pub media: String,
    pub profile_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GeneralVariable {
    pub id: String,
    pub variable_name: String,
    pub variable_value: String,
    pub variable_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: String,
    pub profile_id: String,
    pub member_id: String,
    pub amount: Money,
    pub bank_name: String,
    pub bank_acc_number: String,
    pub bank_acc_name: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---- read models returned by list/detail queries ----

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCard {
    pub id: String,
    pub name: String,
    pub tagline: String,
    pub city: String,
    pub image: String,
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub rating: Option<f64>,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RatingSummary {
    pub rating: f64,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookedRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetails {
    #[serde(flatten)]
    pub property: Property,
    pub profile: Option<Profile>,
    pub bookings: Vec<BookedRange>,
    pub rating: f64,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RentalSummary {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub total_nights_sum: i64,
    pub order_total_sum: Money,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PropertyReviewView {
    pub id: String,
    pub rating: i64,
    pub comment: String,
    pub username: String,
    pub profile_image: String,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserReviewView {
    pub id: String,
    pub rating: i64,
    pub comment: String,
    pub property_name: String,
    pub property_image: String,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: String,
    pub order_total: Money,
    pub total_nights: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub property_id: String,
    pub property_name: String,
    pub property_city: String,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub id: String,
    pub order_total: Money,
    pub total_nights: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub guest_first_name: String,
    pub guest_last_name: String,
    pub property_id: String,
    pub property_name: String,
    pub property_price: i64,
    pub property_city: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReservationStats {
    pub properties: i64,
    pub nights: i64,
    pub amount: Money,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub users_count: i64,
    pub properties_count: i64,
    pub bookings_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MonthlyCount {
    pub date: String,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingCommissionDetails {
    pub id: String,
    pub profile_id: String,
    pub booking_id: String,
    pub referal_code: Option<String>,
    pub commission: Money,
    pub created_at: DateTime<Utc>,
    pub payment_status: bool,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralKind {
    Membership,
    Booking,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReferralDetail {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub commission: Money,
    pub created_at: DateTime<Utc>,
    pub payment_status: bool,
    #[serde(rename = "type")]
    pub kind: ReferralKind,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyPointDetail {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub point: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberRequest {
    pub id: String,
    pub member_id: String,
    pub member_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub tier_name: String,
    pub dob: Option<String>,
    pub citizen: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub bank_name: Option<String>,
    pub bank_acc_num: Option<String>,
    pub bank_acc_name: Option<String>,
    pub is_active: bool,
    pub referal_code: Option<String>,
    pub closer_id: Option<String>,
    pub payment_method: String,
    pub payment_status: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Downline {
    pub member_id: String,
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub downlines: Vec<Downline>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MemberDashboard {
    pub profile: Profile,
    pub member: Member,
    pub tier: Tier,
    pub rewards: Vec<Reward>,
    pub referral_details: Vec<ReferralDetail>,
    pub loyalty_point_details: Vec<LoyaltyPointDetail>,
}
