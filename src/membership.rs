//! Referral, commission and loyalty point rules.
//!
//! Everything in here is storage-agnostic; the handlers load rows, ask these
//! functions what the new balances should be and write the result back
//! inside a single transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;

use crate::errors::{AppError, AppResult};
use crate::money::Money;
use crate::structs::{Downline, Member, Tier};

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LEN: usize = 6;
/// Total number of candidate codes checked before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 10;

pub const BASE_TIER_NAME: &str = "Tier 1";
pub const MEMBER_PRICE_VARIABLE: &str = "exclusiveMemberPrice";
/// Closers earn a flat percentage of the membership price.
pub const CLOSER_COMMISSION_PERCENT: i64 = 3;
/// Points credited to a referrer for each paid membership referral.
pub const MEMBERSHIP_REFERRAL_POINTS: i64 = 1;
pub const MAX_DOWNLINE_DEPTH: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionKind {
    Booking,
    Membership,
}

/// A referral or closer code is usable when it is non-empty, belongs to a
/// member and that member is not the caller.
pub fn is_valid_referral(code: &str, found: Option<&Member>, caller_subject: Option<&str>) -> bool {
    if code.is_empty() {
        return false;
    }
    match found {
        None => false,
        Some(member) => {
            member.member_id == code && Some(member.profile_id.as_str()) != caller_subject
        }
    }
}

/// `total × tier rate / 100`.
pub fn commission_for(total: Money, tier: &Tier) -> Money {
    total.percent(tier.commission.0)
}

pub fn closer_commission_for(total: Money) -> Money {
    total.percent(Decimal::from(CLOSER_COMMISSION_PERCENT))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balances {
    pub commission: Money,
    pub point: i64,
}

/// Balances after crediting `amount`. Membership referrals also earn a point.
pub fn credit(member: &Member, amount: Money, kind: CommissionKind) -> Balances {
    let point = match kind {
        CommissionKind::Booking => member.point,
        CommissionKind::Membership => member.point + MEMBERSHIP_REFERRAL_POINTS,
    };
    Balances {
        commission: member.commission + amount,
        point,
    }
}

/// Point balance after redeeming, or `None` when the balance is too low.
pub fn redeem(point_balance: i64, point_req: i64) -> Option<i64> {
    if point_req < 0 || point_balance < point_req {
        return None;
    }
    Some(point_balance - point_req)
}

/// Highest tier whose point threshold the member has reached. Members are
/// never moved to a tier below their current one.
pub fn promoted_tier<'a>(current: &'a Tier, tiers: &'a [Tier], point: i64) -> &'a Tier {
    tiers
        .iter()
        .filter(|t| t.min_point <= point && t.min_point > current.min_point)
        .max_by_key(|t| t.min_point)
        .unwrap_or(current)
}

pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Answers whether a member code is already in use.
#[async_trait]
pub trait CodeRegistry: Send {
    async fn is_taken(&mut self, code: &str) -> AppResult<bool>;
}

/// Draws codes until the registry reports a free one, at most
/// [`MAX_CODE_ATTEMPTS`] times.
pub async fn generate_unique_code<R, C>(rng: &mut R, registry: &mut C) -> AppResult<String>
where
    R: Rng,
    C: CodeRegistry + ?Sized,
{
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generate_code(rng);
        if !registry.is_taken(&code).await? {
            return Ok(code);
        }
        log::debug!("Member code collision on attempt {}", attempt);
    }
    Err(AppError::Conflict(
        "Failed to generate unique member ID, Please try again".to_string(),
    ))
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DownlineRow {
    pub id: String,
    pub member_id: String,
    pub parent_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

/// Nests flat downline rows under `root_code`, at most `max_depth` levels.
pub fn build_downline_tree(root_code: &str, rows: &[DownlineRow], max_depth: i64) -> Vec<Downline> {
    let mut children: HashMap<&str, Vec<&DownlineRow>> = HashMap::new();
    for row in rows {
        if let Some(parent) = row.parent_id.as_deref() {
            children.entry(parent).or_default().push(row);
        }
    }
    nest(root_code, &children, max_depth)
}

fn nest(parent: &str, children: &HashMap<&str, Vec<&DownlineRow>>, depth_left: i64) -> Vec<Downline> {
    if depth_left <= 0 {
        return Vec::new();
    }
    children
        .get(parent)
        .map(|rows| {
            rows.iter()
                .map(|row| Downline {
                    member_id: row.member_id.clone(),
                    id: row.id.clone(),
                    name: format!("{} {}", row.first_name, row.last_name),
                    downlines: nest(&row.member_id, children, depth_left - 1),
                })
                .collect()
        })
        .unwrap_or_default()
}
