use actix_web::{get, post, put, web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{require_manage, require_operate, tenant_offset, Actor, PaginationQuery, TenantQuery};
use crate::codes;
use crate::config::Config;
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, EnrollCustomerRequest, LoyaltyCustomer, LoyaltyProgram, LoyaltyProgramRequest,
    RegisterVisitRequest,
};
use crate::operative_day::operative_day;
use crate::plans::Feature;

async fn load_program(db: &Database, program_id: Uuid) -> Result<LoyaltyProgram, ApiError> {
    db.get_loyalty_program(program_id)
        .await?
        .ok_or(ApiError::NotFound("Loyalty program"))
}

async fn load_customer(db: &Database, customer_id: Uuid) -> Result<LoyaltyCustomer, ApiError> {
    db.get_loyalty_customer(customer_id)
        .await?
        .ok_or(ApiError::NotFound("Loyalty customer"))
}

// ============================================================================
// PROGRAM
// ============================================================================

#[put("/loyalty/program")]
pub async fn upsert_program(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<TenantQuery>,
    payload: web::Json<LoyaltyProgramRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let tenant_id = query.tenant_for(&actor);
    require_manage(&db, &actor, tenant_id).await?;

    db.get_plan(tenant_id)
        .await?
        .limits()
        .check_feature(Feature::Loyalty)
        .map_err(ApiError::Forbidden)?;

    let program = db.upsert_loyalty_program(tenant_id, &body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(program)))
}

/// Public: shown on the enrollment page.
#[get("/loyalty/programs/{owner_user_id}")]
pub async fn get_program(
    db: web::Data<Database>,
    owner_user_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let program = db
        .get_loyalty_program_for_owner(owner_user_id.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Loyalty program"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(program)))
}

// ============================================================================
// CUSTOMERS
// ============================================================================

/// Public enrollment; returns the customer card with its QR code.
#[post("/loyalty/programs/{owner_user_id}/customers")]
pub async fn enroll_customer(
    db: web::Data<Database>,
    owner_user_id: web::Path<Uuid>,
    payload: web::Json<EnrollCustomerRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let program = db
        .get_loyalty_program_for_owner(owner_user_id.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Loyalty program"))?;
    if !program.is_active {
        return Err(ApiError::BadRequest("Loyalty program is not active".into()));
    }

    let customer = db
        .enroll_loyalty_customer(program.id, &body, &codes::loyalty_qr_code())
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(customer)))
}

#[get("/loyalty/customers")]
pub async fn list_customers(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<TenantQuery>,
    page: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    let tenant_id = query.tenant_for(&actor);
    require_manage(&db, &actor, tenant_id).await?;

    let program = db
        .get_loyalty_program_for_owner(tenant_id)
        .await?
        .ok_or(ApiError::NotFound("Loyalty program"))?;
    let customers = db
        .list_loyalty_customers(program.id, page.limit(), page.offset())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(customers)))
}

// ============================================================================
// VISITS & REWARDS
// ============================================================================

#[post("/loyalty/visits")]
pub async fn register_visit(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    payload: web::Json<RegisterVisitRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let customer = db
        .get_loyalty_customer_by_qr(body.qr_code.trim())
        .await?
        .ok_or(ApiError::NotFound("Loyalty customer"))?;
    let program = load_program(&db, customer.program_id).await?;
    require_operate(&db, &actor, program.owner_user_id).await?;

    if !program.is_active {
        return Err(ApiError::BadRequest("Loyalty program is not active".into()));
    }

    let offset = tenant_offset(&db, &config, program.owner_user_id).await?;
    let day = operative_day(Utc::now(), offset);

    let outcome = db
        .register_loyalty_visit(customer.id, &program, day, actor.id)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("Visit already registered for this customer today".into())
            }
            other => ApiError::from(other),
        })?;

    Ok(HttpResponse::Created().json(ApiResponse::success(outcome)))
}

#[post("/loyalty/customers/{customer_id}/redeem")]
pub async fn redeem_reward(
    db: web::Data<Database>,
    actor: Actor,
    customer_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let customer = load_customer(&db, customer_id.into_inner()).await?;
    let program = load_program(&db, customer.program_id).await?;
    require_operate(&db, &actor, program.owner_user_id).await?;

    if !customer.can_redeem(&program) {
        return Err(ApiError::BadRequest(format!(
            "Customer has {} of {} points needed",
            customer.points, program.reward_threshold
        )));
    }

    let outcome = db
        .redeem_loyalty_reward(customer.id, &program, actor.id)
        .await?
        .ok_or_else(|| ApiError::Conflict("Points changed while redeeming, try again".into()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}
