use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{audit, require_admin, require_manage, tenant_offset, Actor, PaginationQuery, TenantQuery};
use crate::analytics::{is_alert_score, AnalyticsCache, SurveyAnalytics};
use crate::clients::MessagingClient;
use crate::config::Config;
use crate::database::Database;
use crate::dedupe;
use crate::error::ApiError;
use crate::models::{
    AnalyticsQuery, ApiResponse, CheckedAnswer, NewAuditLog, NewNotification, Survey, SubmitResponseRequest,
    SurveyRequest,
};
use crate::operative_day::trailing_window;
use crate::plans::PlanLimits;

async fn load_survey(db: &Database, survey_id: Uuid) -> Result<Survey, ApiError> {
    db.get_survey(survey_id).await?.ok_or(ApiError::NotFound("Survey"))
}

// ============================================================================
// SURVEY CRUD
// ============================================================================

#[post("/surveys")]
pub async fn create_survey(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<TenantQuery>,
    payload: web::Json<SurveyRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let tenant_id = query.tenant_for(&actor);
    require_manage(&db, &actor, tenant_id).await?;

    let limits = db.get_plan(tenant_id).await?.limits();
    let current = db.count_surveys_for_owner(tenant_id).await?;
    PlanLimits::check_count(current, limits.max_surveys, "surveys").map_err(ApiError::Forbidden)?;

    let survey = db.create_survey(body.into_new_survey(Uuid::new_v4(), tenant_id)).await?;
    log::info!("Survey {} created for {}", survey.survey.id, tenant_id);

    Ok(HttpResponse::Created().json(ApiResponse::success(survey)))
}

#[get("/surveys")]
pub async fn list_surveys(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<TenantQuery>,
) -> Result<HttpResponse, ApiError> {
    let tenant_id = query.tenant_for(&actor);
    require_manage(&db, &actor, tenant_id).await?;

    let surveys = db.list_surveys_for_owner(tenant_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(surveys)))
}

/// Public: used to render the survey to customers.
#[get("/surveys/{survey_id}")]
pub async fn get_survey(db: web::Data<Database>, survey_id: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    let survey = db
        .get_survey_with_questions(survey_id.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Survey"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(survey)))
}

#[put("/surveys/{survey_id}")]
pub async fn update_survey(
    db: web::Data<Database>,
    analytics_cache: web::Data<AnalyticsCache>,
    actor: Actor,
    survey_id: web::Path<Uuid>,
    payload: web::Json<SurveyRequest>,
) -> Result<HttpResponse, ApiError> {
    let survey_id = survey_id.into_inner();
    let body = payload.into_inner();
    body.validate()?;

    let existing = load_survey(&db, survey_id).await?;
    require_manage(&db, &actor, existing.owner_user_id).await?;

    let updated = body.into_new_survey(survey_id, existing.owner_user_id);
    let current_questions = db.list_questions(survey_id).await?;
    let replace_questions = !updated.same_questions_as(&current_questions);

    // Answers reference questions, so answered surveys keep their questions.
    if replace_questions && db.count_responses(survey_id).await? > 0 {
        return Err(ApiError::Conflict(
            "Survey already has responses; create a new survey to change its questions".into(),
        ));
    }

    let survey = db.update_survey(updated, replace_questions).await?;
    analytics_cache.invalidate_survey(survey_id).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(survey)))
}

#[delete("/surveys/{survey_id}")]
pub async fn delete_survey(
    db: web::Data<Database>,
    analytics_cache: web::Data<AnalyticsCache>,
    actor: Actor,
    survey_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let survey_id = survey_id.into_inner();
    let existing = load_survey(&db, survey_id).await?;
    require_manage(&db, &actor, existing.owner_user_id).await?;

    db.delete_survey(survey_id).await?;
    analytics_cache.invalidate_survey(survey_id).await;

    Ok(HttpResponse::NoContent().finish())
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Public submission from a customer.
#[post("/surveys/{survey_id}/responses")]
pub async fn submit_response(
    db: web::Data<Database>,
    analytics_cache: web::Data<AnalyticsCache>,
    messaging: web::Data<MessagingClient>,
    survey_id: web::Path<Uuid>,
    payload: web::Json<SubmitResponseRequest>,
) -> Result<HttpResponse, ApiError> {
    let survey_id = survey_id.into_inner();
    let body = payload.into_inner();
    body.validate()?;

    let survey = load_survey(&db, survey_id).await?;
    if !survey.is_active {
        return Err(ApiError::BadRequest("Survey is not accepting responses".into()));
    }

    let questions = db.list_questions(survey_id).await?;
    let answers = body.check_answers(&questions).map_err(ApiError::BadRequest)?;

    let response = db.create_response(survey_id, &body, &answers).await?;
    analytics_cache.invalidate_survey(survey_id).await;

    if answers.iter().any(is_alert_answer) {
        alert_owner(&db, &messaging, &survey, &body).await;
    }

    Ok(HttpResponse::Created().json(ApiResponse::success(response)))
}

fn is_alert_answer(answer: &CheckedAnswer) -> bool {
    answer
        .score
        .is_some_and(|score| is_alert_score(answer.question_type, score))
}

/// Notifies the owner of a detractor response. Never fails the submission.
async fn alert_owner(db: &Database, messaging: &MessagingClient, survey: &Survey, response: &SubmitResponseRequest) {
    let customer = response.customer_name.as_deref().unwrap_or("Un cliente");
    let contact = response
        .customer_phone
        .as_deref()
        .or(response.customer_email.as_deref())
        .map(|contact| format!(" ({contact})"))
        .unwrap_or_default();
    let body = format!("{customer}{contact} dejó una calificación baja en \"{}\".", survey.title);

    let notification = NewNotification {
        user_id: survey.owner_user_id,
        kind: "detractor",
        title: "Cliente insatisfecho".into(),
        body: body.clone(),
    };
    if let Err(err) = db.create_notification(&notification).await {
        log::warn!("Failed to store detractor notification for survey {}: {err:?}", survey.id);
    }

    let phone = match db.get_user_settings(survey.owner_user_id).await {
        Ok(settings) => settings.and_then(|settings| settings.phone),
        Err(err) => {
            log::warn!("Failed to load owner settings for detractor alert: {err:?}");
            None
        }
    };

    if let Some(phone) = phone {
        let message = format!("HappyMeter: {body}");
        if let Err(err) = messaging.send_whatsapp(&phone, &message).await {
            log::warn!("Failed to send WhatsApp detractor alert for survey {}: {err}", survey.id);
        }
    }
}

#[get("/surveys/{survey_id}/responses")]
pub async fn list_responses(
    db: web::Data<Database>,
    actor: Actor,
    survey_id: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    let survey_id = survey_id.into_inner();
    let survey = load_survey(&db, survey_id).await?;
    require_manage(&db, &actor, survey.owner_user_id).await?;

    let responses = db
        .list_responses_with_answers(survey_id, query.limit(), query.offset())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(responses)))
}

// ============================================================================
// ANALYTICS
// ============================================================================

#[get("/surveys/{survey_id}/analytics")]
pub async fn get_analytics(
    db: web::Data<Database>,
    config: web::Data<Config>,
    analytics_cache: web::Data<AnalyticsCache>,
    actor: Actor,
    survey_id: web::Path<Uuid>,
    query: web::Query<AnalyticsQuery>,
) -> Result<HttpResponse, ApiError> {
    let survey_id = survey_id.into_inner();
    let days = query.days();

    let survey = load_survey(&db, survey_id).await?;
    require_manage(&db, &actor, survey.owner_user_id).await?;

    if let Some(cached) = analytics_cache.get(survey_id, days).await {
        return Ok(HttpResponse::Ok().json(ApiResponse::success(cached)));
    }

    let offset = tenant_offset(&db, &config, survey.owner_user_id).await?;
    let (start, end) = trailing_window(Utc::now(), days, offset);
    let summary = db.score_summary(&[survey_id], start, end, offset).await?;

    let analytics = SurveyAnalytics {
        survey_id,
        days,
        summary,
    };
    analytics_cache.put(analytics.clone()).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(analytics)))
}

// ============================================================================
// DUPLICATE DETECTION
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DedupeQuery {
    pub days: Option<u32>,
    #[serde(default)]
    pub apply: bool,
}

#[post("/admin/responses/dedupe")]
pub async fn dedupe_responses(
    db: web::Data<Database>,
    actor: Actor,
    query: web::Query<DedupeQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &actor).await?;

    let days = query.days.unwrap_or(7).clamp(1, 365);
    let report = dedupe::run(&db, days, query.apply).await?;

    if report.applied {
        audit(
            &db,
            NewAuditLog {
                actor_id: actor.id,
                action: "responses.deduplicated",
                entity: "responses",
                entity_id: None,
                metadata: json!({ "days": days, "flagged": report.duplicates.len() }),
            },
        )
        .await;
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}
