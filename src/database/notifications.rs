use uuid::Uuid;

use super::Database;
use crate::models::{AuditLog, NewAuditLog, NewNotification, Notification};
use crate::reports::ReportRecipient;

impl Database {
    pub async fn create_notification(&self, notification: &NewNotification) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, kind, title, body, read_at, created_at
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, kind, title, body, read_at, created_at
            FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)
            ORDER BY (read_at IS NULL) DESC, created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Marks one of the user's notifications read; reading twice keeps the first timestamp.
    pub async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, kind, title, body, read_at, created_at
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    // ========================================================================
    // AUDIT
    // ========================================================================

    pub async fn append_audit_log(&self, entry: &NewAuditLog) -> Result<AuditLog, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity, entity_id, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, actor_id, action, entity, entity_id, metadata, created_at
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(entry.entity)
        .bind(entry.entity_id)
        .bind(&entry.metadata)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_audit_logs(&self, limit: i64, offset: i64) -> Result<Vec<AuditLog>, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, actor_id, action, entity, entity_id, metadata, created_at
            FROM audit_logs
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    // ========================================================================
    // REPORTS
    // ========================================================================

    /// Tenants with an email address and at least one active survey.
    pub async fn list_report_recipients(&self) -> Result<Vec<ReportRecipient>, sqlx::Error> {
        sqlx::query_as::<_, ReportRecipient>(
            r#"
            SELECT us.user_id, us.email, us.business_name, us.utc_offset_minutes
            FROM user_settings us
            WHERE us.email IS NOT NULL
              AND EXISTS (
                  SELECT 1 FROM surveys s WHERE s.owner_user_id = us.user_id AND s.is_active = TRUE
              )
            ORDER BY us.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}
