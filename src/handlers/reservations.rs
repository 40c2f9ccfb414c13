use actix_web::{get, post, put, web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{require_operate, tenant_offset, Actor};
use crate::config::Config;
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, CreateReservationRequest, ReservationsQuery, UpdateReservationStatusRequest,
};
use crate::operative_day::{operative_day, operative_window};

/// Public booking from a customer.
#[post("/reservations")]
pub async fn create_reservation(
    db: web::Data<Database>,
    payload: web::Json<CreateReservationRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    body.validate_business_rules(Utc::now()).map_err(ApiError::BadRequest)?;

    let reservation = db.create_reservation(&body).await?;
    log::info!(
        "Reservation {} for {} people at {}",
        reservation.id,
        reservation.party_size,
        reservation.reserved_for
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(reservation)))
}

#[get("/reservations")]
pub async fn list_reservations(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    query: web::Query<ReservationsQuery>,
) -> Result<HttpResponse, ApiError> {
    let owner = query.owner_user_id;
    require_operate(&db, &actor, owner).await?;

    let offset = tenant_offset(&db, &config, owner).await?;
    let day = query.day.unwrap_or_else(|| operative_day(Utc::now(), offset));
    let (start, end) = operative_window(day, offset);

    let reservations = db.list_reservations_between(owner, start, end).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(reservations)))
}

#[put("/reservations/{reservation_id}/status")]
pub async fn update_reservation_status(
    db: web::Data<Database>,
    actor: Actor,
    reservation_id: web::Path<Uuid>,
    payload: web::Json<UpdateReservationStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let next = payload.into_inner().status;
    let reservation = db
        .get_reservation(reservation_id.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Reservation"))?;
    require_operate(&db, &actor, reservation.owner_user_id).await?;

    if !reservation.status.can_transition_to(next) {
        return Err(ApiError::Conflict(format!(
            "Reservation cannot move from {:?} to {:?}",
            reservation.status, next
        )));
    }

    let updated = db
        .transition_reservation(reservation.id, reservation.status, next)
        .await?
        .ok_or_else(|| ApiError::Conflict("Reservation changed while updating, try again".into()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}
