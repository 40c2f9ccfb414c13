mod affiliates;
mod chains;
mod loyalty;
mod notifications;
mod reports;
mod reservations;
mod roulette;
mod surveys;
mod team;
mod users;

use actix_web::{dev::Payload, get, web, FromRequest, HttpRequest, HttpResponse, Responder};
use chrono::FixedOffset;
use futures_util::future::{ready, Ready};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Config;
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{AccessLevel, NewAuditLog, UserRole};
use crate::operative_day::offset_from_minutes;

/// Registers every route; mounted under `/api/v1` by the binary and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Health
        .service(health_check)
        // Accounts
        .service(users::get_my_settings)
        .service(users::update_my_settings)
        .service(users::admin_update_user)
        // Surveys
        .service(surveys::create_survey)
        .service(surveys::list_surveys)
        .service(surveys::get_survey)
        .service(surveys::update_survey)
        .service(surveys::delete_survey)
        .service(surveys::submit_response)
        .service(surveys::list_responses)
        .service(surveys::get_analytics)
        .service(surveys::dedupe_responses)
        // Roulette & coupons
        .service(roulette::upsert_roulette)
        .service(roulette::get_roulette_for_survey)
        .service(roulette::get_roulette)
        .service(roulette::spin)
        .service(roulette::list_spins)
        .service(roulette::redeem_coupon)
        .service(roulette::get_coupon)
        // Loyalty
        .service(loyalty::upsert_program)
        .service(loyalty::get_program)
        .service(loyalty::enroll_customer)
        .service(loyalty::list_customers)
        .service(loyalty::register_visit)
        .service(loyalty::redeem_reward)
        // Affiliates & representatives
        .service(affiliates::register_affiliate)
        .service(affiliates::get_my_affiliate)
        .service(affiliates::get_affiliate_by_code)
        .service(affiliates::request_payout)
        .service(affiliates::admin_record_commission)
        .service(affiliates::admin_decide_commission)
        .service(affiliates::admin_decide_payout)
        .service(affiliates::admin_set_affiliate_status)
        .service(affiliates::admin_create_representative)
        .service(affiliates::create_lead)
        .service(affiliates::list_leads)
        .service(affiliates::update_lead)
        // Chains
        .service(chains::create_chain)
        .service(chains::list_chains)
        .service(chains::list_invitations)
        .service(chains::get_chain)
        .service(chains::add_branch)
        .service(chains::accept_branch)
        .service(chains::remove_branch)
        .service(chains::get_chain_summary)
        // Team & processes
        .service(team::create_member)
        .service(team::list_members)
        .service(team::update_member)
        .service(team::delete_member)
        .service(team::create_zone)
        .service(team::create_task)
        .service(team::complete_task)
        .service(team::get_checklist)
        // Reservations
        .service(reservations::create_reservation)
        .service(reservations::list_reservations)
        .service(reservations::update_reservation_status)
        // Notifications & audit
        .service(notifications::list_notifications)
        .service(notifications::mark_notification_read)
        .service(notifications::list_audit_logs)
        // Cron
        .service(reports::send_biweekly_report);
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "happymeter-service",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// ACTOR
// ============================================================================

/// Authenticated caller, as forwarded by the gateway.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: Option<String>,
}

fn extract_actor_headers(req: &HttpRequest) -> Result<Actor, ApiError> {
    let id = req
        .headers()
        .get("X-Actor-Id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing or invalid X-Actor-Id header".into()))?;

    let name = req
        .headers()
        .get("X-Actor-Name")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(Actor { id, name })
}

impl FromRequest for Actor {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(extract_actor_headers(req))
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Tenant a listing refers to; defaults to the caller's own account.
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub owner_user_id: Option<Uuid>,
}

impl TenantQuery {
    pub fn tenant_for(&self, actor: &Actor) -> Uuid {
        self.owner_user_id.unwrap_or(actor.id)
    }
}

pub(crate) async fn require_admin(db: &Database, actor: &Actor) -> Result<(), ApiError> {
    match db.get_user_role(actor.id).await? {
        Some(UserRole::Admin) => Ok(()),
        _ => Err(ApiError::Forbidden("Admin role required".into())),
    }
}

pub(crate) async fn require_manage(db: &Database, actor: &Actor, tenant_id: Uuid) -> Result<AccessLevel, ApiError> {
    let level = db.resolve_access(actor.id, tenant_id).await?;
    if level.can_manage() {
        Ok(level)
    } else {
        Err(ApiError::Forbidden("You cannot manage this business".into()))
    }
}

pub(crate) async fn require_operate(db: &Database, actor: &Actor, tenant_id: Uuid) -> Result<AccessLevel, ApiError> {
    let level = db.resolve_access(actor.id, tenant_id).await?;
    if level.can_operate() {
        Ok(level)
    } else {
        Err(ApiError::Forbidden("You do not work for this business".into()))
    }
}

/// Fixed offset of a tenant, falling back to the configured default.
pub(crate) async fn tenant_offset(db: &Database, config: &Config, tenant_id: Uuid) -> Result<FixedOffset, ApiError> {
    let minutes = db
        .get_utc_offset(tenant_id)
        .await?
        .unwrap_or(config.default_utc_offset_minutes);
    Ok(offset_from_minutes(minutes))
}

/// Appends an audit entry. Failures are logged and do not fail the request.
pub(crate) async fn audit(db: &Database, entry: NewAuditLog) {
    if let Err(err) = db.append_audit_log(&entry).await {
        log::warn!("Failed to append audit log {}: {err:?}", entry.action);
    }
}

/// Compares secrets in time independent of where they differ.
pub(crate) fn secrets_match(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

pub(crate) fn check_cron_secret(config: &Config, provided: Option<&str>) -> Result<(), ApiError> {
    match (config.cron_secret.as_deref(), provided) {
        (Some(expected), Some(provided)) if secrets_match(provided, expected) => Ok(()),
        _ => Err(ApiError::Unauthorized("Invalid cron secret".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn secrets_compare_whole_value() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cres"));
        assert!(!secrets_match("s3cret", "s3cret-longer"));
        assert!(!secrets_match("", "s3cret"));
    }

    #[test]
    fn actor_requires_a_valid_uuid() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(extract_actor_headers(&req), Err(ApiError::Unauthorized(_))));

        let req = TestRequest::default()
            .insert_header(("X-Actor-Id", "not-a-uuid"))
            .to_http_request();
        assert!(extract_actor_headers(&req).is_err());

        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header(("X-Actor-Id", id.to_string()))
            .insert_header(("X-Actor-Name", "  Ana  "))
            .to_http_request();
        let actor = extract_actor_headers(&req).unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.name.as_deref(), Some("Ana"));
    }

    #[test]
    fn pagination_is_clamped() {
        let query = PaginationQuery { limit: Some(1000), offset: Some(-5) };
        assert_eq!(query.limit(), 100);
        assert_eq!(query.offset(), 0);
        let query = PaginationQuery { limit: None, offset: None };
        assert_eq!(query.limit(), 50);
    }
}
