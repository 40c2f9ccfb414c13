use actix_web::{get, post, put, web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{require_manage, require_operate, Actor, PaginationQuery};
use crate::codes;
use crate::database::{Database, COUPON_CODE_KEY, SPIN_RESPONSE_KEY};
use crate::error::{unique_violation, ApiError};
use crate::models::{
    ApiResponse, CouponState, CouponStatus, RedeemCouponRequest, RouletteGameWithPrizes, SpinRequest,
    UpsertRouletteRequest,
};
use crate::plans::Feature;
use crate::roulette::{select_prize, validate_prize_table};

const MAX_SPIN_ATTEMPTS: u32 = 3;

#[derive(Debug, PartialEq, Eq)]
enum SpinConflict {
    AlreadySpun,
    CouponCodeTaken,
}

/// Classifies the unique constraint a failed spin ran into.
fn spin_conflict(constraint: Option<&str>) -> Option<SpinConflict> {
    match constraint? {
        SPIN_RESPONSE_KEY => Some(SpinConflict::AlreadySpun),
        COUPON_CODE_KEY => Some(SpinConflict::CouponCodeTaken),
        _ => None,
    }
}

async fn load_game(db: &Database, game_id: Uuid) -> Result<RouletteGameWithPrizes, ApiError> {
    db.get_roulette(game_id).await?.ok_or(ApiError::NotFound("Roulette"))
}

// ============================================================================
// GAMES
// ============================================================================

#[put("/roulette")]
pub async fn upsert_roulette(
    db: web::Data<Database>,
    actor: Actor,
    payload: web::Json<UpsertRouletteRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    validate_prize_table(&body.prize_table()).map_err(ApiError::BadRequest)?;

    let survey = db.get_survey(body.survey_id).await?.ok_or(ApiError::NotFound("Survey"))?;
    require_manage(&db, &actor, survey.owner_user_id).await?;

    db.get_plan(survey.owner_user_id)
        .await?
        .limits()
        .check_feature(Feature::Roulette)
        .map_err(ApiError::Forbidden)?;

    let game = db.upsert_roulette(survey.owner_user_id, &body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(game)))
}

/// Public: lets the survey page know whether to show the wheel.
#[get("/surveys/{survey_id}/roulette")]
pub async fn get_roulette_for_survey(
    db: web::Data<Database>,
    survey_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let game = db
        .get_roulette_for_survey(survey_id.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Roulette"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(game)))
}

#[get("/roulette/{game_id}")]
pub async fn get_roulette(db: web::Data<Database>, game_id: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    let game = load_game(&db, game_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(game)))
}

// ============================================================================
// SPINS
// ============================================================================

/// Public: a customer who just answered the survey spins once.
#[post("/roulette/{game_id}/spin")]
pub async fn spin(
    db: web::Data<Database>,
    game_id: web::Path<Uuid>,
    payload: web::Json<SpinRequest>,
) -> Result<HttpResponse, ApiError> {
    let game = load_game(&db, game_id.into_inner()).await?;
    if !game.game.is_active {
        return Err(ApiError::BadRequest("Roulette is not active".into()));
    }

    let response = db
        .get_response(payload.response_id)
        .await?
        .ok_or(ApiError::NotFound("Response"))?;
    if response.survey_id != game.game.survey_id {
        return Err(ApiError::BadRequest("Response does not belong to this roulette's survey".into()));
    }

    let mut attempt = 1;
    let outcome = loop {
        let result = db
            .record_spin(&game, response.id, codes::coupon_code(), |spin_number, prizes| {
                select_prize(spin_number, prizes, &mut rand::thread_rng()).cloned()
            })
            .await;

        match result {
            Ok(outcome) => break outcome,
            Err(err) => match spin_conflict(unique_violation(&err)) {
                Some(SpinConflict::AlreadySpun) => {
                    return Err(ApiError::Conflict("This response already used its spin".into()))
                }
                Some(SpinConflict::CouponCodeTaken) if attempt < MAX_SPIN_ATTEMPTS => {
                    log::warn!("Coupon code collision on roulette {}, retrying", game.game.id);
                    attempt += 1;
                }
                _ => return Err(ApiError::from(err)),
            },
        }
    };

    log::info!(
        "Spin #{} on roulette {}: {}",
        outcome.spin.spin_number,
        game.game.id,
        outcome.spin.prize_label.as_deref().unwrap_or("no prize")
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(outcome)))
}

#[get("/roulette/{game_id}/spins")]
pub async fn list_spins(
    db: web::Data<Database>,
    actor: Actor,
    game_id: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    let game = load_game(&db, game_id.into_inner()).await?;
    require_manage(&db, &actor, game.game.owner_user_id).await?;

    let spins = db.list_spins(game.game.id, query.limit(), query.offset()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(spins)))
}

// ============================================================================
// COUPONS
// ============================================================================

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[post("/coupons/redeem")]
pub async fn redeem_coupon(
    db: web::Data<Database>,
    actor: Actor,
    payload: web::Json<RedeemCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    require_operate(&db, &actor, body.owner_user_id).await?;

    let code = normalize_code(&body.code);
    let now = Utc::now();

    if let Some(coupon) = db.redeem_coupon(body.owner_user_id, &code, actor.id, now).await? {
        log::info!("Coupon {} redeemed by {}", coupon.code, actor.id);
        return Ok(HttpResponse::Ok().json(ApiResponse::success(coupon)));
    }

    // Nothing was updated: tell unknown codes apart from used ones.
    let coupon = db
        .get_coupon_by_code(&code)
        .await?
        .filter(|coupon| coupon.owner_user_id == body.owner_user_id)
        .ok_or(ApiError::NotFound("Coupon"))?;

    match coupon.state_at(now) {
        CouponState::Redeemed => Err(ApiError::Conflict("Coupon was already redeemed".into())),
        CouponState::Expired => Err(ApiError::Conflict("Coupon has expired".into())),
        CouponState::Valid => Err(ApiError::Conflict("Coupon could not be redeemed, try again".into())),
    }
}

/// Public status lookup, e.g. for the customer's coupon page.
#[get("/coupons/{code}")]
pub async fn get_coupon(db: web::Data<Database>, code: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let coupon = db
        .get_coupon_by_code(&normalize_code(&code))
        .await?
        .ok_or(ApiError::NotFound("Coupon"))?;

    let state = coupon.state_at(Utc::now());
    Ok(HttpResponse::Ok().json(ApiResponse::success(CouponStatus { coupon, state })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_conflicts_follow_the_violated_constraint() {
        assert_eq!(spin_conflict(Some(SPIN_RESPONSE_KEY)), Some(SpinConflict::AlreadySpun));
        assert_eq!(spin_conflict(Some(COUPON_CODE_KEY)), Some(SpinConflict::CouponCodeTaken));
        assert_eq!(spin_conflict(Some("roulette_games_survey_id_key")), None);
        assert_eq!(spin_conflict(None), None);
    }

    #[test]
    fn codes_are_matched_case_insensitively() {
        assert_eq!(normalize_code("  hm-ab12cd34 "), "HM-AB12CD34");
    }
}
