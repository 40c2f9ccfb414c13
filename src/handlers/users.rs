use actix_web::{get, put, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{audit, require_admin, Actor};
use crate::config::Config;
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{AdminUpdateUserRequest, ApiResponse, NewAuditLog, UpdateUserSettingsRequest, UserSettings};

#[get("/me/settings")]
pub async fn get_my_settings(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
) -> Result<HttpResponse, ApiError> {
    let settings = db
        .get_user_settings(actor.id)
        .await?
        .unwrap_or_else(|| UserSettings::defaults_for(actor.id, config.default_utc_offset_minutes));

    Ok(HttpResponse::Ok().json(ApiResponse::success(settings)))
}

#[put("/me/settings")]
pub async fn update_my_settings(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    payload: web::Json<UpdateUserSettingsRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let settings = db
        .upsert_user_settings(actor.id, &body, config.default_utc_offset_minutes)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(settings)))
}

#[put("/admin/users/{user_id}")]
pub async fn admin_update_user(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    user_id: web::Path<Uuid>,
    payload: web::Json<AdminUpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = user_id.into_inner();
    let body = payload.into_inner();
    if body.role.is_none() && body.plan.is_none() {
        return Err(ApiError::BadRequest("Nothing to update: provide role and/or plan".into()));
    }

    require_admin(&db, &actor).await?;

    let settings = db
        .set_role_and_plan(user_id, body.role, body.plan, config.default_utc_offset_minutes)
        .await?;

    audit(
        &db,
        NewAuditLog {
            actor_id: actor.id,
            action: "user.updated",
            entity: "user_settings",
            entity_id: Some(user_id),
            metadata: json!({ "role": body.role, "plan": body.plan }),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(settings)))
}
