use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{require_manage, require_operate, tenant_offset, Actor, TenantQuery};
use crate::config::Config;
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, Checklist, ChecklistQuery, CompleteTaskRequest, CreateTaskRequest, CreateZoneRequest,
    TeamMember, TeamMemberRequest,
};
use crate::operative_day::operative_day;
use crate::plans::PlanLimits;

async fn load_member(db: &Database, member_id: Uuid) -> Result<TeamMember, ApiError> {
    db.get_team_member(member_id)
        .await?
        .ok_or(ApiError::NotFound("Team member"))
}

// ============================================================================
// TEAM MEMBERS
// ============================================================================

#[post("/team")]
pub async fn create_member(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<TenantQuery>,
    payload: web::Json<TeamMemberRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let tenant_id = query.tenant_for(&actor);
    require_manage(&db, &actor, tenant_id).await?;

    let limits = db.get_plan(tenant_id).await?.limits();
    let current = db.count_team_members(tenant_id).await?;
    PlanLimits::check_count(current, limits.max_team_members, "team members").map_err(ApiError::Forbidden)?;

    let member = db.create_team_member(tenant_id, &body).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(member)))
}

#[get("/team")]
pub async fn list_members(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<TenantQuery>,
) -> Result<HttpResponse, ApiError> {
    let tenant_id = query.tenant_for(&actor);
    require_manage(&db, &actor, tenant_id).await?;

    let members = db.list_team_members(tenant_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(members)))
}

#[put("/team/{member_id}")]
pub async fn update_member(
    db: web::Data<Database>,
    actor: Actor,
    member_id: web::Path<Uuid>,
    payload: web::Json<TeamMemberRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let mut member = load_member(&db, member_id.into_inner()).await?;
    require_manage(&db, &actor, member.owner_user_id).await?;

    body.apply_to_existing(&mut member);
    let member = db.save_team_member(&member).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(member)))
}

#[delete("/team/{member_id}")]
pub async fn delete_member(
    db: web::Data<Database>,
    actor: Actor,
    member_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let member = load_member(&db, member_id.into_inner()).await?;
    require_manage(&db, &actor, member.owner_user_id).await?;

    db.delete_team_member(member.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ============================================================================
// PROCESSES
// ============================================================================

#[post("/processes/zones")]
pub async fn create_zone(
    db: web::Data<Database>,
    actor: Actor,
    payload: web::Json<CreateZoneRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    require_manage(&db, &actor, body.owner_user_id).await?;

    let zone = db.create_zone(&body).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(zone)))
}

#[post("/processes/zones/{zone_id}/tasks")]
pub async fn create_task(
    db: web::Data<Database>,
    actor: Actor,
    zone_id: web::Path<Uuid>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let zone = db
        .get_zone(zone_id.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Zone"))?;
    require_manage(&db, &actor, zone.owner_user_id).await?;

    let task = db.create_task(zone.id, &body).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(task)))
}

#[post("/processes/tasks/{task_id}/complete")]
pub async fn complete_task(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    task_id: web::Path<Uuid>,
    payload: web::Json<CompleteTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let task = db
        .get_task(task_id.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    let zone = db.get_zone(task.zone_id).await?.ok_or(ApiError::NotFound("Zone"))?;
    require_operate(&db, &actor, zone.owner_user_id).await?;

    body.check_against(&task).map_err(ApiError::BadRequest)?;

    let offset = tenant_offset(&db, &config, zone.owner_user_id).await?;
    let day = operative_day(Utc::now(), offset);
    let member_id = db
        .find_team_member_for_user(zone.owner_user_id, actor.id)
        .await?
        .map(|member| member.id);

    let evidence = db
        .record_evidence(task.id, member_id, day, &body)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("Task already completed for this operative day".into())
            }
            other => ApiError::from(other),
        })?;

    Ok(HttpResponse::Created().json(ApiResponse::success(evidence)))
}

#[get("/processes/checklist")]
pub async fn get_checklist(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    query: web::Query<ChecklistQuery>,
) -> Result<HttpResponse, ApiError> {
    let owner = query.owner_user_id;
    require_operate(&db, &actor, owner).await?;

    let day = match query.day {
        Some(day) => day,
        None => operative_day(Utc::now(), tenant_offset(&db, &config, owner).await?),
    };

    let zones = db.list_zones(owner).await?;
    let tasks = db.list_tasks_for_owner(owner).await?;
    let evidence = db.list_evidence_for_day(owner, day).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(Checklist::build(day, zones, tasks, evidence))))
}
