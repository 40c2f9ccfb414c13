use actix_web::{get, post, web, HttpResponse};
use uuid::Uuid;

use super::{require_admin, Actor, PaginationQuery};
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{ApiResponse, NotificationsQuery};

#[get("/notifications")]
pub async fn list_notifications(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<NotificationsQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let notifications = db.list_notifications(actor.id, query.unread_only, limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

#[post("/notifications/{notification_id}/read")]
pub async fn mark_notification_read(
    db: web::Data<Database>,
    actor: Actor,
    notification_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let notification = db
        .mark_notification_read(actor.id, notification_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notification)))
}

#[get("/admin/audit-logs")]
pub async fn list_audit_logs(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &actor).await?;

    let logs = db.list_audit_logs(query.limit(), query.offset()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(logs)))
}
