use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::AppError;
use crate::money::Money;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            AppError::PasswordError(e.to_string())
        })
}

pub fn verify_password(provided: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(provided.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Rejects weak passwords with the same rules the register form uses.
pub fn check_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < 12 {
        return Err(AppError::Validation(
            "Password must be at least 12 characters long".to_string(),
        ));
    }
    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters long".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit())
        || !password.chars().any(|c| c.is_alphabetic())
        || !password
            .chars()
            .any(|c| "!@#$%^&*()_+-=[]{}|;':\",.<>?/".contains(c))
    {
        return Err(AppError::Validation(
            "Password must contain at least one number, one letter and one special character"
                .to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingTotals {
    pub total_nights: i64,
    pub order_total: Money,
}

/// Nights between the two dates times the nightly price. The stay covers
/// `[check_in, check_out)`.
pub fn calculate_totals(
    check_in: NaiveDate,
    check_out: NaiveDate,
    price: i64,
) -> Result<BookingTotals, AppError> {
    let total_nights = (check_out - check_in).num_days();
    if total_nights <= 0 {
        return Err(AppError::Validation(
            "Check-out must be after check-in".to_string(),
        ));
    }
    if price < 0 {
        return Err(AppError::Validation("Price must be positive".to_string()));
    }
    let order_total = price
        .checked_mul(total_nights)
        .ok_or_else(|| AppError::Validation("Booking total is too large".to_string()))?;
    Ok(BookingTotals {
        total_nights,
        order_total: Money::from_units(order_total),
    })
}

pub fn round_rating(avg: f64) -> f64 {
    (avg * 10.0).round() / 10.0
}

/// Month bucket label used by the admin booking chart, e.g. "Jan 2024".
pub fn month_label(date: &DateTime<Utc>) -> String {
    date.format("%b %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn totals_for_two_nights() {
        let totals = calculate_totals(day(2024, 1, 1), day(2024, 1, 3), 500_000).unwrap();
        assert_eq!(totals.total_nights, 2);
        assert_eq!(totals.order_total, Money::from_units(1_000_000));
    }

    #[test]
    fn totals_reject_empty_or_inverted_stays() {
        assert!(calculate_totals(day(2024, 1, 3), day(2024, 1, 3), 100).is_err());
        assert!(calculate_totals(day(2024, 1, 3), day(2024, 1, 1), 100).is_err());
    }

    #[test]
    fn totals_that_overflow_are_rejected() {
        assert!(matches!(
            calculate_totals(day(2024, 1, 1), day(2024, 1, 3), i64::MAX / 2 + 1),
            Err(AppError::Validation(_))
        ));
        assert!(calculate_totals(day(2024, 1, 1), day(2024, 1, 3), i64::MAX / 2).is_ok());
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse 1!").unwrap();
        assert!(verify_password("correct horse 1!", &hash));
        assert!(!verify_password("wrong horse 1!", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(check_password_strength("short1!").is_err());
        assert!(check_password_strength("nodigitsatall!!").is_err());
        assert!(check_password_strength("n0symbolsinhere").is_err());
        assert!(check_password_strength("g00d-enough-pass").is_ok());
    }

    #[test]
    fn labels_and_rounding() {
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(month_label(&date), "Mar 2024");
        assert_eq!(round_rating(4.25), 4.3);
        assert_eq!(round_rating(3.0), 3.0);
    }
}
