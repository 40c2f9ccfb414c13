use actix_web::{post, web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::check_cron_secret;
use crate::clients::{Delivery, MessagingClient};
use crate::config::Config;
use crate::database::Database;
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::operative_day::{offset_from_minutes, operative_day, trailing_window};
use crate::reports::{BiweeklyReport, ReportRecipient, ReportRun, REPORT_DAYS};

#[derive(Debug, Deserialize)]
pub struct CronQuery {
    pub secret: Option<String>,
}

#[post("/cron/biweekly-report")]
pub async fn send_biweekly_report(
    db: web::Data<Database>,
    config: web::Data<Config>,
    messaging: web::Data<MessagingClient>,
    query: web::Query<CronQuery>,
) -> Result<HttpResponse, ApiError> {
    check_cron_secret(&config, query.secret.as_deref())?;

    if !messaging.email_enabled() {
        log::warn!("Email is not configured, biweekly reports will not be delivered");
    }

    let recipients = db.list_report_recipients().await?;
    let mut run = ReportRun {
        recipients: recipients.len(),
        ..ReportRun::default()
    };

    for recipient in &recipients {
        match send_one(&db, &messaging, recipient).await {
            Ok(Delivery::Sent) => run.sent += 1,
            Ok(Delivery::Skipped) => run.failed += 1,
            Err(err) => {
                log::warn!("Biweekly report for {} failed: {err}", recipient.user_id);
                run.failed += 1;
            }
        }
    }

    log::info!(
        "Biweekly report run: {} recipients, {} sent, {} failed",
        run.recipients,
        run.sent,
        run.failed
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(run)))
}

async fn send_one(
    db: &Database,
    messaging: &MessagingClient,
    recipient: &ReportRecipient,
) -> Result<Delivery, ApiError> {
    let offset = offset_from_minutes(recipient.utc_offset_minutes);
    let now = Utc::now();
    let (start, end) = trailing_window(now, REPORT_DAYS, offset);

    let survey_ids = db.list_active_survey_ids(recipient.user_id).await?;
    let summary = db.score_summary(&survey_ids, start, end, offset).await?;

    let period_end = operative_day(now, offset);
    let report = BiweeklyReport {
        business_name: recipient.business_name.as_deref().unwrap_or("Tu negocio"),
        period_start: period_end - Duration::days(i64::from(REPORT_DAYS) - 1),
        period_end,
        summary: &summary,
    };
    let email = report.render();

    Ok(messaging
        .send_email(&recipient.email, &email.subject, &email.text, &email.html)
        .await?)
}
