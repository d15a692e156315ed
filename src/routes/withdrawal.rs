use actix_identity::Identity;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::Deserialize;

use crate::auth::current_user;
use crate::db;
use crate::errors::AppError;
use crate::money::Money;
use crate::AppState;

#[derive(Deserialize)]
pub struct WithdrawalForm {
    amount: Money,
}

/// Files a payout of part of the caller's commission balance. The balance
/// itself is only reduced when an admin approves.
#[post("/member/withdrawals")]
pub async fn request_withdrawal_handler(
    web::Form(form): web::Form<WithdrawalForm>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    if form.amount <= Money::ZERO {
        return Err(AppError::Validation("amount must be greater than 0".to_string()));
    }

    let mut conn = state.db_pool.acquire().await?;
    let profile = db::profile::require_by_subject(&mut conn, &subject).await?;
    let member = db::member::require_by_subject(&mut conn, &subject).await?;
    if form.amount > member.commission {
        return Err(AppError::Validation("Insufficient commission balance".to_string()));
    }
    let request = db::withdrawal::create_request(&mut conn, &profile, &member, form.amount).await?;
    log::info!("Withdrawal {} of {} requested by {}", request.id, request.amount, member.member_id);
    Ok(HttpResponse::Ok().json(request))
}

#[get("/member/withdrawals")]
pub async fn fetch_withdrawals_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let requests = db::withdrawal::for_profile(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use crate::db;
    use crate::membership::Balances;
    use crate::money::Money;
    use crate::routes::testing::{context, login, test_app};

    #[actix_web::test]
    async fn requests_are_bounded_by_commission_balance() {
        let ctx = context().await;
        {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            db::profile::fixtures::profile(&mut conn, "user_1", "Sari").await;
            let m = db::member::fixtures::active_member(&mut conn, "AAA111", "user_1", None).await;
            db::member::set_balances(&mut conn, &m.id, Balances { commission: Money::from_units(500), point: 0 })
                .await
                .unwrap();
        }
        let app = test_app!(ctx.state);
        let cookie = login!(app, "user_1");

        for (amount, status) in [("0", StatusCode::BAD_REQUEST), ("500.01", StatusCode::BAD_REQUEST), ("200", StatusCode::OK)] {
            let req = test::TestRequest::post()
                .uri("/member/withdrawals")
                .cookie(cookie.clone())
                .set_form([("amount", amount)])
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), status, "amount {}", amount);
        }

        let req = test::TestRequest::get().uri("/member/withdrawals").cookie(cookie).to_request();
        let requests: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(requests.as_array().unwrap().len(), 1);
        assert_eq!(requests[0]["status"], "Pending");
    }
}
