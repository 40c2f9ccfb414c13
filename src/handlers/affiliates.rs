use actix_web::{get, post, put, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{audit, require_admin, Actor};
use crate::codes;
use crate::config::Config;
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{
    compute_commission, default_commission_rate, minimum_payout, AffiliateBalance, AffiliateDashboard,
    AffiliateProfile, AffiliateStatus, AffiliateStatusRequest, ApiResponse, CommissionDecisionRequest,
    CommissionStatus, CreateLeadRequest, CreateRepresentativeRequest, NewAuditLog, PayoutDecisionRequest,
    PayoutStatus, PublicAffiliate, RecordCommissionRequest, RegisterAffiliateRequest, RepresentativeProfile,
    UpdateLeadRequest,
};

async fn load_own_affiliate(db: &Database, actor: &Actor) -> Result<AffiliateProfile, ApiError> {
    db.get_affiliate_by_user(actor.id)
        .await?
        .ok_or(ApiError::NotFound("Affiliate profile"))
}

// ============================================================================
// AFFILIATES
// ============================================================================

#[post("/affiliates")]
pub async fn register_affiliate(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    payload: web::Json<RegisterAffiliateRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    if db.get_affiliate_by_user(actor.id).await?.is_some() {
        return Err(ApiError::Conflict("You are already registered as an affiliate".into()));
    }

    let profile = db
        .register_affiliate(
            actor.id,
            &codes::referral_code(),
            body.payout_email.trim(),
            default_commission_rate(),
            config.default_utc_offset_minutes,
        )
        .await?;
    log::info!("Affiliate {} registered with code {}", actor.id, profile.referral_code);

    audit(
        &db,
        NewAuditLog {
            actor_id: actor.id,
            action: "affiliate.registered",
            entity: "affiliate",
            entity_id: Some(profile.id),
            metadata: json!({ "referral_code": profile.referral_code }),
        },
    )
    .await;

    Ok(HttpResponse::Created().json(ApiResponse::success(profile)))
}

#[get("/affiliates/me")]
pub async fn get_my_affiliate(db: web::Data<Database>, actor: Actor) -> Result<HttpResponse, ApiError> {
    let profile = load_own_affiliate(&db, &actor).await?;
    let commissions = db.list_commissions(profile.id).await?;
    let payouts = db.list_payouts(profile.id).await?;

    let dashboard = AffiliateDashboard {
        balance: AffiliateBalance::from_commissions(&commissions),
        profile,
        commissions,
        payouts,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(dashboard)))
}

/// Public lookup used by the referral landing page.
#[get("/affiliates/code/{code}")]
pub async fn get_affiliate_by_code(db: web::Data<Database>, code: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let profile = db
        .get_affiliate_by_code(code.trim().to_uppercase().as_str())
        .await?
        .filter(|profile| profile.status == AffiliateStatus::Active)
        .ok_or(ApiError::NotFound("Affiliate"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PublicAffiliate {
        referral_code: profile.referral_code,
        status: profile.status,
    })))
}

#[post("/affiliates/payouts")]
pub async fn request_payout(db: web::Data<Database>, actor: Actor) -> Result<HttpResponse, ApiError> {
    let profile = load_own_affiliate(&db, &actor).await?;
    if profile.status != AffiliateStatus::Active {
        return Err(ApiError::Forbidden("Affiliate account is not active".into()));
    }

    let minimum = minimum_payout();
    match db.request_payout(profile.id, minimum).await? {
        Ok(payout) => {
            log::info!("Payout {} of {} requested by affiliate {}", payout.id, payout.amount, profile.id);
            Ok(HttpResponse::Created().json(ApiResponse::success(payout)))
        }
        Err(available) => Err(ApiError::BadRequest(format!(
            "Minimum payout is {minimum}, available balance is {available}"
        ))),
    }
}

// ============================================================================
// ADMIN: COMMISSIONS, PAYOUTS, AFFILIATE STATUS
// ============================================================================

#[post("/admin/commissions")]
pub async fn admin_record_commission(
    db: web::Data<Database>,
    actor: Actor,
    payload: web::Json<RecordCommissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    require_admin(&db, &actor).await?;

    let affiliate = db
        .get_affiliate_by_code(body.referral_code.trim().to_uppercase().as_str())
        .await?
        .ok_or(ApiError::NotFound("Affiliate"))?;
    if affiliate.user_id == body.referred_user_id {
        return Err(ApiError::BadRequest("Affiliates cannot earn commissions on themselves".into()));
    }

    let amount = compute_commission(body.payment_amount, affiliate.commission_rate);
    let (commission, created) = db
        .record_commission(
            affiliate.id,
            body.referred_user_id,
            body.payment_amount,
            amount,
            body.source_payment_ref.trim(),
        )
        .await?;

    if !created {
        return Ok(HttpResponse::Ok().json(ApiResponse::success(commission)));
    }

    audit(
        &db,
        NewAuditLog {
            actor_id: actor.id,
            action: "commission.recorded",
            entity: "commission",
            entity_id: Some(commission.id),
            metadata: json!({
                "affiliate_id": affiliate.id,
                "amount": commission.amount,
                "source_payment_ref": commission.source_payment_ref,
            }),
        },
    )
    .await;

    Ok(HttpResponse::Created().json(ApiResponse::success(commission)))
}

#[put("/admin/commissions/{commission_id}")]
pub async fn admin_decide_commission(
    db: web::Data<Database>,
    actor: Actor,
    commission_id: web::Path<Uuid>,
    payload: web::Json<CommissionDecisionRequest>,
) -> Result<HttpResponse, ApiError> {
    let commission_id = commission_id.into_inner();
    let status = payload.into_inner().status;
    if !matches!(status, CommissionStatus::Approved | CommissionStatus::Cancelled) {
        return Err(ApiError::BadRequest("Commissions can only be approved or cancelled".into()));
    }
    require_admin(&db, &actor).await?;

    let commission = db
        .decide_commission(commission_id, status)
        .await?
        .ok_or_else(|| ApiError::Conflict("Commission is no longer pending".into()))?;

    audit(
        &db,
        NewAuditLog {
            actor_id: actor.id,
            action: match status {
                CommissionStatus::Approved => "commission.approved",
                _ => "commission.cancelled",
            },
            entity: "commission",
            entity_id: Some(commission.id),
            metadata: json!({ "amount": commission.amount }),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(commission)))
}

#[put("/admin/payouts/{payout_id}")]
pub async fn admin_decide_payout(
    db: web::Data<Database>,
    actor: Actor,
    payout_id: web::Path<Uuid>,
    payload: web::Json<PayoutDecisionRequest>,
) -> Result<HttpResponse, ApiError> {
    let payout_id = payout_id.into_inner();
    let status = payload.into_inner().status;
    if status == PayoutStatus::Requested {
        return Err(ApiError::BadRequest("Payouts can only be marked paid or rejected".into()));
    }
    require_admin(&db, &actor).await?;

    let payout = db
        .decide_payout(payout_id, status)
        .await?
        .ok_or_else(|| ApiError::Conflict("Payout not found or already processed".into()))?;

    audit(
        &db,
        NewAuditLog {
            actor_id: actor.id,
            action: match status {
                PayoutStatus::Paid => "payout.paid",
                _ => "payout.rejected",
            },
            entity: "payout",
            entity_id: Some(payout.id),
            metadata: json!({ "affiliate_id": payout.affiliate_id, "amount": payout.amount }),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(payout)))
}

#[put("/admin/affiliates/{affiliate_id}/status")]
pub async fn admin_set_affiliate_status(
    db: web::Data<Database>,
    actor: Actor,
    affiliate_id: web::Path<Uuid>,
    payload: web::Json<AffiliateStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let affiliate_id = affiliate_id.into_inner();
    let status = payload.into_inner().status;
    require_admin(&db, &actor).await?;

    let profile = db.set_affiliate_status(affiliate_id, status).await?;

    audit(
        &db,
        NewAuditLog {
            actor_id: actor.id,
            action: "affiliate.status_changed",
            entity: "affiliate",
            entity_id: Some(profile.id),
            metadata: json!({ "status": profile.status }),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(profile)))
}

// ============================================================================
// REPRESENTATIVES & LEADS
// ============================================================================

#[post("/admin/representatives")]
pub async fn admin_create_representative(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    payload: web::Json<CreateRepresentativeRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    require_admin(&db, &actor).await?;

    let profile = db
        .create_representative(&body, config.default_utc_offset_minutes)
        .await?;

    audit(
        &db,
        NewAuditLog {
            actor_id: actor.id,
            action: "representative.created",
            entity: "representative",
            entity_id: Some(profile.user_id),
            metadata: json!({ "region": profile.region }),
        },
    )
    .await;

    Ok(HttpResponse::Created().json(ApiResponse::success(profile)))
}

async fn require_representative(db: &Database, actor: &Actor) -> Result<RepresentativeProfile, ApiError> {
    db.get_representative(actor.id)
        .await?
        .filter(|profile| profile.is_active)
        .ok_or_else(|| ApiError::Forbidden("Active representative profile required".into()))
}

#[post("/leads")]
pub async fn create_lead(
    db: web::Data<Database>,
    actor: Actor,
    payload: web::Json<CreateLeadRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    let representative = require_representative(&db, &actor).await?;

    let lead = db.create_lead(representative.user_id, &body).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(lead)))
}

#[get("/leads")]
pub async fn list_leads(db: web::Data<Database>, actor: Actor) -> Result<HttpResponse, ApiError> {
    let representative = require_representative(&db, &actor).await?;
    let leads = db.list_leads(representative.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(leads)))
}

#[put("/leads/{lead_id}")]
pub async fn update_lead(
    db: web::Data<Database>,
    actor: Actor,
    lead_id: web::Path<Uuid>,
    payload: web::Json<UpdateLeadRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;
    let representative = require_representative(&db, &actor).await?;

    let lead = db
        .get_lead(lead_id.into_inner())
        .await?
        .filter(|lead| lead.representative_user_id == representative.user_id)
        .ok_or(ApiError::NotFound("Lead"))?;

    if !lead.status.can_transition_to(body.status) {
        return Err(ApiError::Conflict(format!(
            "Lead cannot move from {:?} to {:?}",
            lead.status, body.status
        )));
    }

    let lead = db.update_lead(lead.id, &body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(lead)))
}
