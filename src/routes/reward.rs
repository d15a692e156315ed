use actix_identity::Identity;
use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};

use super::message;
use crate::auth::current_user;
use crate::db;
use crate::errors::AppError;
use crate::membership::{redeem, Balances};
use crate::AppState;

#[get("/rewards")]
pub async fn fetch_rewards_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let mut conn = state.db_pool.acquire().await?;
    let rewards = db::reward::list(&mut conn).await?;
    Ok(HttpResponse::Ok().json(rewards))
}

/// Spends the reward's points and records the redemption.
#[post("/rewards/{id}/redeem")]
pub async fn redeem_reward_handler(
    path: web::Path<String>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let subject = current_user(identity)?;

    let mut tx = state.db_pool.begin().await?;
    db::profile::require_by_subject(&mut tx, &subject).await?;
    let member = db::member::require_by_subject(&mut tx, &subject).await?;
    let reward = db::reward::find_by_id(&mut tx, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Reward"))?;
    let point = redeem(member.point, reward.point_req)
        .ok_or_else(|| AppError::Validation("Insufficient points to redeem this reward".to_string()))?;

    db::reward::record_redemption(&mut tx, &subject, &reward).await?;
    db::member::set_balances(
        &mut tx,
        &member.id,
        Balances {
            commission: member.commission,
            point,
        },
    )
    .await?;
    tx.commit().await?;

    log::info!("{} redeemed {}", member.member_id, reward.reward_name);
    Ok(message("Reward redeemed successfully"))
}
