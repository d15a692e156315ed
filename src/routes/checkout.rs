use actix_identity::Identity;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::{Deserialize, Serialize};

use super::see_other;
use crate::auth::current_user;
use crate::db;
use crate::errors::AppError;
use crate::membership::{credit, promoted_tier, Balances, CommissionKind};
use crate::payment::{CheckoutRequest, CheckoutSession};
use crate::AppState;

const BOOKING_CONFIRM_PATH: &str = "/api/confirm";
const MEMBERSHIP_CONFIRM_PATH: &str = "/api/membershipPayment/confirm";

#[derive(Deserialize)]
pub struct ConfirmQuery {
    session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    session_id: String,
    url: Option<String>,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        CheckoutResponse {
            session_id: session.id,
            url: session.url,
        }
    }
}

/// Session that the provider reports as paid, or a validation error.
async fn completed_session(state: &AppState, session_id: &str) -> Result<CheckoutSession, AppError> {
    let session = state.payments.retrieve_session(session_id).await?;
    if !session.is_complete() {
        log::warn!("Checkout session {} is not complete", session.id);
        return Err(AppError::Validation("Payment is not complete".to_string()));
    }
    Ok(session)
}

fn required<'a>(session: &'a CheckoutSession, key: &str) -> Result<&'a str, AppError> {
    session
        .metadata_value(key)
        .ok_or_else(|| AppError::Validation(format!("Checkout session has no {}", key)))
}

#[post("/checkout/booking/{booking_id}")]
pub async fn create_booking_checkout_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let booking_id = path.into_inner();

    let (booking, property) = {
        let mut conn = state.db_pool.acquire().await?;
        let booking = db::booking::find_owned(&mut conn, &booking_id, &subject)
            .await?
            .ok_or(AppError::NotFound("Booking"))?;
        let property = db::property::find_by_id(&mut conn, &booking.property_id)
            .await?
            .ok_or(AppError::NotFound("Property"))?;
        (booking, property)
    };
    if booking.payment_status {
        return Err(AppError::Conflict("Booking is already paid".to_string()));
    }

    let session = state
        .payments
        .create_session(CheckoutRequest {
            product_name: format!("{} ({} nights)", property.name, booking.total_nights),
            amount: booking.order_total,
            metadata: vec![("bookingId".to_string(), booking.id.clone())],
            confirm_path: BOOKING_CONFIRM_PATH.to_string(),
            cancel_path: "/bookings".to_string(),
        })
        .await?;
    log::info!("Checkout session {} opened for booking {}", session.id, booking.id);
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(session)))
}

/// Marks the booking paid and credits its referrer. Repeated confirmations of
/// the same session only redirect.
#[get("/api/confirm")]
pub async fn confirm_booking_handler(
    query: web::Query<ConfirmQuery>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let session = completed_session(&state, &query.session_id).await?;
    let booking_id = required(&session, "bookingId")?;

    let mut tx = state.db_pool.begin().await?;
    let booking = db::booking::find_by_id(&mut tx, booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;
    if booking.payment_status {
        log::info!("Booking {} already confirmed", booking.id);
        return Ok(see_other("/bookings"));
    }
    // another guest may have paid for the same nights since this booking was made
    if db::booking::overlaps_paid(&mut tx, &booking.property_id, booking.check_in, booking.check_out).await? {
        log::warn!("Booking {} overlaps a paid booking, not confirming", booking.id);
        return Err(AppError::Conflict(
            "Property is already booked for the selected dates".to_string(),
        ));
    }
    db::booking::mark_paid(&mut tx, &booking.id).await?;

    let transaction = db::commission::booking_commission_for(&mut tx, &booking.id).await?;
    if let Some(transaction) = transaction {
        if let Some(code) = transaction.referal_code.as_deref() {
            if let Some(referrer) = db::member::find_by_code(&mut tx, code).await? {
                let balances = credit(&referrer, transaction.commission, CommissionKind::Booking);
                db::member::set_balances(&mut tx, &referrer.id, balances).await?;
                log::info!("Credited {} booking commission to {}", transaction.commission, code);
            }
        }
    }
    tx.commit().await?;

    Ok(see_other("/bookings"))
}

#[post("/checkout/membership")]
pub async fn create_membership_checkout_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let (member, transaction) = {
        let mut conn = state.db_pool.acquire().await?;
        let member = db::member::require_by_subject(&mut conn, &subject).await?;
        let transaction = db::commission::pending_membership_commission(&mut conn, &subject)
            .await?
            .ok_or(AppError::NotFound("Membership transaction"))?;
        (member, transaction)
    };

    let session = state
        .payments
        .create_session(CheckoutRequest {
            product_name: "Exclusive Membership".to_string(),
            amount: transaction.total_price,
            metadata: vec![
                ("memberId".to_string(), member.id.clone()),
                ("transactionId".to_string(), transaction.id.clone()),
            ],
            confirm_path: MEMBERSHIP_CONFIRM_PATH.to_string(),
            cancel_path: "/member".to_string(),
        })
        .await?;
    log::info!("Checkout session {} opened for member {}", session.id, member.member_id);
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(session)))
}

/// Activates the member, pays out referrer and closer and promotes the
/// referrer when their points reach the next tier.
#[get("/api/membershipPayment/confirm")]
pub async fn confirm_membership_handler(
    query: web::Query<ConfirmQuery>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let session = completed_session(&state, &query.session_id).await?;
    let member_id = required(&session, "memberId")?;
    let transaction_id = required(&session, "transactionId")?;

    let mut tx = state.db_pool.begin().await?;
    let transaction = db::commission::membership_commission_by_id(&mut tx, transaction_id)
        .await?
        .filter(|t| t.member_id == member_id)
        .ok_or(AppError::NotFound("Membership transaction"))?;
    if transaction.payment_status {
        log::info!("Membership transaction {} already confirmed", transaction.id);
        return Ok(see_other("/member/dashboard"));
    }

    db::member::activate(&mut tx, member_id).await?;

    if let Some(code) = transaction.referal_code.as_deref() {
        if let Some(referrer) = db::member::find_by_code(&mut tx, code).await? {
            let balances = credit(&referrer, transaction.commission, CommissionKind::Membership);
            db::member::set_balances(&mut tx, &referrer.id, balances).await?;

            let current = db::tier::require_by_id(&mut tx, &referrer.tier_id).await?;
            let tiers = db::tier::list(&mut tx).await?;
            let next = promoted_tier(&current, &tiers, balances.point);
            if next.id != current.id {
                db::member::set_tier(&mut tx, &referrer.id, &next.id).await?;
                log::info!("Member {} promoted to {}", referrer.member_id, next.tier_name);
            }
        }
    }

    if let Some(code) = transaction.closer_id.as_deref() {
        if let Some(closer) = db::member::find_by_code(&mut tx, code).await? {
            // closers earn commission only, never points
            let balances = Balances {
                commission: closer.commission + transaction.closer_commission,
                point: closer.point,
            };
            db::member::set_balances(&mut tx, &closer.id, balances).await?;
        }
    }

    db::commission::mark_membership_paid(&mut tx, &transaction.id).await?;
    tx.commit().await?;

    log::info!("Membership transaction {} confirmed", transaction.id);
    Ok(see_other("/member/dashboard"))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use crate::db::{self, commission::NewMembershipCommission};
    use crate::money::Money;
    use crate::payment::testing::FakeGateway;
    use crate::routes::testing::{context, login, test_app};

    #[actix_web::test]
    async fn booking_confirmation_credits_referrer_once() {
        let ctx = context().await;
        let booking = {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            db::member::fixtures::active_member(&mut conn, "REF001", "referrer", None).await;
            let p = db::property::fixtures::property(&mut conn, "owner", "Villa", 1000).await;
            let totals = crate::utils::calculate_totals(
                "2024-03-01".parse().unwrap(),
                "2024-03-03".parse().unwrap(),
                1000,
            )
            .unwrap();
            let b = db::booking::create_booking(
                &mut conn,
                "guest",
                &p.id,
                "2024-03-01".parse().unwrap(),
                "2024-03-03".parse().unwrap(),
                &totals,
            )
            .await
            .unwrap();
            db::commission::create_booking_commission(&mut conn, "guest", &b.id, Some("REF001"), Money::from_units(200))
                .await
                .unwrap();
            b
        };
        let app = test_app!(ctx.state);

        let req = test::TestRequest::post()
            .uri(&format!("/checkout/booking/{}", booking.id))
            .cookie(login!(app, "guest"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["url"].as_str().unwrap().starts_with("https://checkout.test/"));

        ctx.payments
            .insert(FakeGateway::completed("cs_paid", &[("bookingId", booking.id.as_str())]));
        for _ in 0..2 {
            let req = test::TestRequest::get().uri("/api/confirm?session_id=cs_paid").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
            assert_eq!(resp.headers().get("Location").unwrap(), "/bookings");
        }

        let mut conn = ctx.state.db_pool.acquire().await.unwrap();
        assert!(db::booking::find_by_id(&mut conn, &booking.id).await.unwrap().unwrap().payment_status);
        let referrer = db::member::find_by_code(&mut conn, "REF001").await.unwrap().unwrap();
        assert_eq!(referrer.commission, Money::from_units(200));
        assert_eq!(referrer.point, 0);
    }

    #[actix_web::test]
    async fn second_payment_for_same_nights_is_refused() {
        let ctx = context().await;
        let (first, second) = {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            let p = db::property::fixtures::property(&mut conn, "owner", "Villa", 100).await;
            let check_in: chrono::NaiveDate = "2024-03-01".parse().unwrap();
            let check_out: chrono::NaiveDate = "2024-03-04".parse().unwrap();
            let totals = crate::utils::calculate_totals(check_in, check_out, 100).unwrap();
            let a = db::booking::create_booking(&mut conn, "guest_a", &p.id, check_in, check_out, &totals)
                .await
                .unwrap();
            let b = db::booking::create_booking(&mut conn, "guest_b", &p.id, check_in, check_out, &totals)
                .await
                .unwrap();
            (a.id, b.id)
        };
        ctx.payments.insert(FakeGateway::completed("cs_a", &[("bookingId", first.as_str())]));
        ctx.payments.insert(FakeGateway::completed("cs_b", &[("bookingId", second.as_str())]));
        let app = test_app!(ctx.state);

        let req = test::TestRequest::get().uri("/api/confirm?session_id=cs_a").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SEE_OTHER);
        let req = test::TestRequest::get().uri("/api/confirm?session_id=cs_b").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let mut conn = ctx.state.db_pool.acquire().await.unwrap();
        assert!(db::booking::find_by_id(&mut conn, &first).await.unwrap().unwrap().payment_status);
        assert!(!db::booking::find_by_id(&mut conn, &second).await.unwrap().unwrap().payment_status);
    }

    #[actix_web::test]
    async fn open_session_changes_nothing() {
        let ctx = context().await;
        let booking_id = {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            let p = db::property::fixtures::property(&mut conn, "owner", "Villa", 100).await;
            let totals = crate::utils::calculate_totals(
                "2024-03-01".parse().unwrap(),
                "2024-03-02".parse().unwrap(),
                100,
            )
            .unwrap();
            db::booking::create_booking(
                &mut conn,
                "guest",
                &p.id,
                "2024-03-01".parse().unwrap(),
                "2024-03-02".parse().unwrap(),
                &totals,
            )
            .await
            .unwrap()
            .id
        };
        let mut open = FakeGateway::completed("cs_open", &[("bookingId", booking_id.as_str())]);
        open.status = Some("open".to_string());
        ctx.payments.insert(open);
        ctx.payments.insert(FakeGateway::completed("cs_no_meta", &[]));
        let app = test_app!(ctx.state);

        for session in ["cs_open", "cs_no_meta"] {
            let req = test::TestRequest::get()
                .uri(&format!("/api/confirm?session_id={}", session))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        }
        let mut conn = ctx.state.db_pool.acquire().await.unwrap();
        assert!(!db::booking::find_by_id(&mut conn, &booking_id).await.unwrap().unwrap().payment_status);
    }

    #[actix_web::test]
    async fn membership_confirmation_activates_and_promotes_referrer() {
        let ctx = context().await;
        let (member_id, transaction_id) = {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            let referrer = db::member::fixtures::active_member(&mut conn, "REF001", "referrer", None).await;
            // one point short of Tier 2
            db::member::set_balances(
                &mut conn,
                &referrer.id,
                crate::membership::Balances { commission: Money::ZERO, point: 9 },
            )
            .await
            .unwrap();
            db::member::fixtures::active_member(&mut conn, "CLS001", "closer", None).await;
            let member = db::member::create_member(&mut conn, "NEW001", "newbie", Some("REF001"), "tier-1")
                .await
                .unwrap();
            let transaction = db::commission::create_membership_commission(
                &mut conn,
                &NewMembershipCommission {
                    profile_id: "newbie",
                    member_row_id: &member.id,
                    referal_code: Some("REF001"),
                    commission: Money::from_units(1_500_000),
                    closer_code: Some("CLS001"),
                    closer_commission: Money::from_units(450_000),
                    total_price: Money::from_units(15_000_000),
                },
            )
            .await
            .unwrap();
            (member.id, transaction.id)
        };
        let app = test_app!(ctx.state);

        let req = test::TestRequest::post()
            .uri("/checkout/membership")
            .cookie(login!(app, "newbie"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        ctx.payments.insert(FakeGateway::completed(
            "cs_member",
            &[("memberId", member_id.as_str()), ("transactionId", transaction_id.as_str())],
        ));
        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri("/api/membershipPayment/confirm?session_id=cs_member")
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.headers().get("Location").unwrap(), "/member/dashboard");
        }

        let mut conn = ctx.state.db_pool.acquire().await.unwrap();
        assert!(db::member::find_by_code(&mut conn, "NEW001").await.unwrap().unwrap().is_active);
        let referrer = db::member::find_by_code(&mut conn, "REF001").await.unwrap().unwrap();
        assert_eq!(referrer.commission, Money::from_units(1_500_000));
        assert_eq!(referrer.point, 10);
        assert_eq!(referrer.tier_id, "tier-2");
        let closer = db::member::find_by_code(&mut conn, "CLS001").await.unwrap().unwrap();
        assert_eq!(closer.commission, Money::from_units(450_000));
        assert_eq!(closer.point, 0);
    }

    #[actix_web::test]
    async fn unknown_membership_transaction_is_not_found() {
        let ctx = context().await;
        ctx.payments.insert(FakeGateway::completed(
            "cs_ghost",
            &[("memberId", "m-1"), ("transactionId", "t-1")],
        ));
        let app = test_app!(ctx.state);
        let req = test::TestRequest::get()
            .uri("/api/membershipPayment/confirm?session_id=cs_ghost")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
