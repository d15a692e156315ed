use actix_identity::Identity;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use validator::Validate;

use super::message;
use crate::auth::current_user;
use crate::db::{self, commission::NewMembershipCommission, profile::PersonalDetails};
use crate::errors::AppError;
use crate::membership::{
    build_downline_tree, closer_commission_for, commission_for, generate_unique_code,
    is_valid_referral, BASE_TIER_NAME, MAX_DOWNLINE_DEPTH, MEMBER_PRICE_VARIABLE,
};
use crate::money::Money;
use crate::structs::{Downline, Member, MemberDashboard};
use crate::AppState;

/// Registration form. The admin edit form posts the same personal and bank
/// fields without the two codes.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MemberForm {
    #[serde(default)]
    pub referal_code: String,
    #[serde(default)]
    pub closer_code: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub last_name: String,
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

impl MemberForm {
    /// Validated personal details.
    pub fn details(&self) -> Result<PersonalDetails, AppError> {
        self.validate()?;
        let details = PersonalDetails {
            email: self.email.trim().to_string(),
            citizen: self.citizen.clone(),
            dob: self.dob.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            gender: self.gender.clone(),
            bank_name: self.bank_name.clone(),
            bank_acc_num: self.bank_acc_num.clone(),
            bank_acc_name: self.bank_acc_name.clone(),
        };
        details.validate()?;
        Ok(details)
    }

    pub fn names(&self) -> (&str, &str) {
        (self.first_name.trim(), self.last_name.trim())
    }
}

#[derive(Serialize)]
struct DownlineResponse {
    downlines: Vec<Member>,
    tree: Vec<Downline>,
}

/// Member behind `code`, provided the code may be used by `caller`.
pub(super) async fn require_referrer(
    conn: &mut SqliteConnection,
    code: &str,
    caller: &str,
) -> Result<Member, AppError> {
    let found = db::member::find_by_code(conn, code).await?;
    if !is_valid_referral(code, found.as_ref(), Some(caller)) {
        return Err(AppError::Validation("Referal code not valid".to_string()));
    }
    found.ok_or(AppError::NotFound("Member"))
}

fn non_empty(code: &str) -> Option<&str> {
    Some(code.trim()).filter(|c| !c.is_empty())
}

/// Registers the caller as an inactive member and records the membership
/// transaction that payment confirmation settles.
#[post("/member")]
pub async fn create_member_handler(
    web::Form(form): web::Form<MemberForm>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let details = form.details()?;

    let mut tx = state.db_pool.begin().await?;
    db::profile::require_by_subject(&mut tx, &subject).await?;
    db::member::delete_incomplete(&mut tx, &subject).await?;

    let referrer = match non_empty(&form.referal_code) {
        Some(code) => Some(require_referrer(&mut tx, code, &subject).await?),
        None => None,
    };
    let closer = match non_empty(&form.closer_code) {
        Some(code) => Some(require_referrer(&mut tx, code, &subject).await.map_err(|e| match e {
            AppError::Validation(_) => AppError::Validation("Closer code not valid".to_string()),
            other => other,
        })?),
        None => None,
    };
    if db::member::find_by_subject(&mut tx, &subject).await?.is_some() {
        return Err(AppError::Conflict("Member already exist".to_string()));
    }

    let mut rng = StdRng::from_entropy();
    let code = generate_unique_code(&mut rng, &mut *tx).await?;
    let base_tier = db::tier::find_by_name(&mut tx, BASE_TIER_NAME)
        .await?
        .ok_or(AppError::NotFound("Tier"))?;
    let member = db::member::create_member(
        &mut tx,
        &code,
        &subject,
        referrer.as_ref().map(|m| m.member_id.as_str()),
        &base_tier.id,
    )
    .await?;
    db::profile::update_personal_details(
        &mut tx,
        &subject,
        Some(form.names()),
        &details,
    )
    .await?;

    let price_variable = db::variable::require_by_name(&mut tx, MEMBER_PRICE_VARIABLE).await?;
    let total_price: Money = price_variable.variable_value.parse().map_err(|_| {
        AppError::Config(format!("{} is not a number", MEMBER_PRICE_VARIABLE))
    })?;
    let commission = match &referrer {
        Some(referrer) => {
            let tier = db::tier::require_by_id(&mut tx, &referrer.tier_id).await?;
            commission_for(total_price, &tier)
        }
        None => Money::ZERO,
    };
    let closer_commission = closer
        .as_ref()
        .map(|_| closer_commission_for(total_price))
        .unwrap_or(Money::ZERO);
    db::commission::create_membership_commission(
        &mut tx,
        &NewMembershipCommission {
            profile_id: &subject,
            member_row_id: &member.id,
            referal_code: referrer.as_ref().map(|m| m.member_id.as_str()),
            commission,
            closer_code: closer.as_ref().map(|m| m.member_id.as_str()),
            closer_commission,
            total_price,
        },
    )
    .await?;
    tx.commit().await?;

    Ok(message("Membership registration success."))
}

#[get("/member")]
pub async fn fetch_member_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let member = db::member::find_by_subject(&mut conn, &subject).await?;
    Ok(HttpResponse::Ok().json(member))
}

#[get("/member/referral/{code}")]
pub async fn validate_referral_code_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let code = path.into_inner();
    let mut conn = state.db_pool.acquire().await?;
    let found = db::member::find_by_code(&mut conn, &code).await?;
    let valid = is_valid_referral(&code, found.as_ref(), Some(&subject));
    Ok(HttpResponse::Ok().json(serde_json::json!({ "valid": valid })))
}

#[get("/member/downline")]
pub async fn fetch_downline_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let member = db::member::require_by_subject(&mut conn, &subject).await?;
    let downlines = db::member::direct_downline(&mut conn, &member.member_id).await?;
    let rows = db::member::downline_rows(&mut conn, &member.member_id, MAX_DOWNLINE_DEPTH).await?;
    Ok(HttpResponse::Ok().json(DownlineResponse {
        downlines,
        tree: build_downline_tree(&member.member_id, &rows, MAX_DOWNLINE_DEPTH),
    }))
}

#[get("/member/dashboard")]
pub async fn fetch_member_dashboard_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let profile = db::profile::require_by_subject(&mut conn, &subject).await?;
    let member = db::member::require_by_subject(&mut conn, &subject).await?;
    let tier = db::tier::require_by_id(&mut conn, &member.tier_id).await?;
    let rewards = db::reward::list(&mut conn).await?;
    let referral_details = db::commission::referral_details(&mut conn, &member.member_id).await?;
    let loyalty_point_details =
        db::reward::loyalty_point_details(&mut conn, &subject, &member.member_id).await?;
    Ok(HttpResponse::Ok().json(MemberDashboard {
        profile,
        member,
        tier,
        rewards,
        referral_details,
        loyalty_point_details,
    }))
}

#[get("/member/booking-commissions")]
pub async fn fetch_booking_commissions_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;
    let mut conn = state.db_pool.acquire().await?;
    let member = db::member::require_by_subject(&mut conn, &subject).await?;
    let commissions = db::commission::booking_commissions_by_code(&mut conn, &member.member_id).await?;
    Ok(HttpResponse::Ok().json(commissions))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use crate::db;
    use crate::money::Money;
    use crate::routes::testing::{context, login, test_app};

    fn registration(referal_code: &str, closer_code: &str) -> Vec<(&'static str, String)> {
        vec![
            ("firstName", "Sari".to_string()),
            ("lastName", "Dewi".to_string()),
            ("email", "sari@example.com".to_string()),
            ("citizen", "ID".to_string()),
            ("birthDate", "1990-05-17T00:00:00.000Z".to_string()),
            ("phone", "0812".to_string()),
            ("address", "Jl. Raya Ubud".to_string()),
            ("gender", "F".to_string()),
            ("bankName", "BCA".to_string()),
            ("bankAccNum", "123456".to_string()),
            ("bankAccName", "Sari Dewi".to_string()),
            ("referalCode", referal_code.to_string()),
            ("closerCode", closer_code.to_string()),
        ]
    }

    #[actix_web::test]
    async fn registration_creates_inactive_member_and_pending_transaction() {
        let ctx = context().await;
        {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            db::profile::fixtures::profile(&mut conn, "user_new", "Sari").await;
            db::member::fixtures::active_member(&mut conn, "REF001", "user_ref", None).await;
            db::member::fixtures::active_member(&mut conn, "CLS001", "user_closer", None).await;
        }
        let app = test_app!(ctx.state);
        let cookie = login!(app, "user_new");

        let req = test::TestRequest::post()
            .uri("/member")
            .cookie(cookie.clone())
            .set_form(registration("REF001", "CLS001"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // a second registration replaces the unpaid one instead of conflicting
        let req = test::TestRequest::post()
            .uri("/member")
            .cookie(cookie)
            .set_form(registration("REF001", ""))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let mut conn = ctx.state.db_pool.acquire().await.unwrap();
        let member = db::member::require_by_subject(&mut conn, "user_new").await.unwrap();
        assert!(!member.is_active);
        assert_eq!(member.parent_id.as_deref(), Some("REF001"));
        assert_eq!(member.tier_id, "tier-1");
        assert_eq!(member.member_id.len(), crate::membership::CODE_LEN);

        let pending = db::commission::pending_membership_commission(&mut conn, "user_new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.total_price, Money::from_units(15_000_000));
        assert_eq!(pending.commission, Money::from_units(1_500_000));
        assert_eq!(pending.closer_id, None);
        assert_eq!(pending.closer_commission, Money::ZERO);

        let profile = db::profile::require_by_subject(&mut conn, "user_new").await.unwrap();
        assert_eq!(profile.last_name, "Dewi");
        assert_eq!(profile.dob.as_deref(), Some("1990-05-17"));
        assert_eq!(profile.bank_acc_num.as_deref(), Some("123456"));
    }

    #[actix_web::test]
    async fn active_members_cannot_register_again() {
        let ctx = context().await;
        {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            db::profile::fixtures::profile(&mut conn, "user_1", "Sari").await;
            db::member::fixtures::active_member(&mut conn, "AAA111", "user_1", None).await;
        }
        let app = test_app!(ctx.state);
        let cookie = login!(app, "user_1");
        let req = test::TestRequest::post()
            .uri("/member")
            .cookie(cookie.clone())
            .set_form(registration("", ""))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        // own code is never a valid referral
        let req = test::TestRequest::get()
            .uri("/member/referral/AAA111")
            .cookie(cookie)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["valid"], false);
    }

    #[actix_web::test]
    async fn downline_lists_direct_children_and_tree() {
        let ctx = context().await;
        {
            let mut conn = ctx.state.db_pool.acquire().await.unwrap();
            db::member::fixtures::active_member(&mut conn, "ROOT01", "user_root", None).await;
            db::member::fixtures::active_member(&mut conn, "CHILD1", "user_c1", Some("ROOT01")).await;
            db::member::fixtures::active_member(&mut conn, "GRAND1", "user_g1", Some("CHILD1")).await;
        }
        let app = test_app!(ctx.state);
        let cookie = login!(app, "user_root");
        let req = test::TestRequest::get().uri("/member/downline").cookie(cookie).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["downlines"].as_array().unwrap().len(), 1);
        assert_eq!(body["tree"][0]["memberId"], "CHILD1");
        assert_eq!(body["tree"][0]["downlines"][0]["memberId"], "GRAND1");
    }
}
