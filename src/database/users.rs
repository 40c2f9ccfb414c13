use sqlx::PgConnection;
use uuid::Uuid;

use super::Database;
use crate::models::{
    AccessLevel, TeamRole, UpdateUserSettingsRequest, UserRole, UserSettings,
};
use crate::plans::Plan;

impl Database {
    pub async fn get_user_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>, sqlx::Error> {
        sqlx::query_as::<_, UserSettings>(
            r#"
            SELECT user_id, email, business_name, phone, role, plan, utc_offset_minutes, created_at, updated_at
            FROM user_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn upsert_user_settings(
        &self,
        user_id: Uuid,
        request: &UpdateUserSettingsRequest,
        default_offset_minutes: i32,
    ) -> Result<UserSettings, sqlx::Error> {
        sqlx::query_as::<_, UserSettings>(
            r#"
            INSERT INTO user_settings (user_id, email, business_name, phone, utc_offset_minutes)
            VALUES ($1, $2, $3, $4, COALESCE($5, $6))
            ON CONFLICT (user_id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, user_settings.email),
                business_name = COALESCE(EXCLUDED.business_name, user_settings.business_name),
                phone = COALESCE(EXCLUDED.phone, user_settings.phone),
                utc_offset_minutes = COALESCE($5, user_settings.utc_offset_minutes),
                updated_at = NOW()
            RETURNING user_id, email, business_name, phone, role, plan, utc_offset_minutes, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(request.email.as_deref())
        .bind(request.business_name.as_deref())
        .bind(request.phone.as_deref())
        .bind(request.utc_offset_minutes)
        .bind(default_offset_minutes)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn set_role_and_plan(
        &self,
        user_id: Uuid,
        role: Option<UserRole>,
        plan: Option<Plan>,
        default_offset_minutes: i32,
    ) -> Result<UserSettings, sqlx::Error> {
        sqlx::query_as::<_, UserSettings>(
            r#"
            INSERT INTO user_settings (user_id, role, plan, utc_offset_minutes)
            VALUES ($1, COALESCE($2, 'user'::user_role), COALESCE($3, 'free'::subscription_plan), $4)
            ON CONFLICT (user_id) DO UPDATE SET
                role = COALESCE($2, user_settings.role),
                plan = COALESCE($3, user_settings.plan),
                updated_at = NOW()
            RETURNING user_id, email, business_name, phone, role, plan, utc_offset_minutes, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(role)
        .bind(plan)
        .bind(default_offset_minutes)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_user_role(&self, user_id: Uuid) -> Result<Option<UserRole>, sqlx::Error> {
        sqlx::query_scalar::<_, UserRole>(r#"SELECT role FROM user_settings WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Plan of a tenant; accounts without settings are on the free plan.
    pub async fn get_plan(&self, user_id: Uuid) -> Result<Plan, sqlx::Error> {
        let plan = sqlx::query_scalar::<_, Plan>(r#"SELECT plan FROM user_settings WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan.unwrap_or_default())
    }

    pub async fn get_utc_offset(&self, user_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(r#"SELECT utc_offset_minutes FROM user_settings WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn resolve_access(&self, actor_id: Uuid, tenant_id: Uuid) -> Result<AccessLevel, sqlx::Error> {
        if actor_id == tenant_id {
            return Ok(AccessLevel::Owner);
        }

        let role = self.get_user_role(actor_id).await?;

        let owns_chain = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM chain_branches cb
                INNER JOIN chains c ON c.id = cb.chain_id
                WHERE c.owner_user_id = $1 AND cb.branch_user_id = $2 AND cb.accepted_at IS NOT NULL
            )
            "#,
        )
        .bind(actor_id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let staff_role = sqlx::query_scalar::<_, TeamRole>(
            r#"
            SELECT role
            FROM team_members
            WHERE owner_user_id = $1 AND user_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(tenant_id)
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(AccessLevel::resolve(actor_id, tenant_id, role, owns_chain, staff_role))
    }
}

/// Gives a plain `user` the role that comes with a new profile. Admins and
/// users who already hold another role keep it.
pub(super) async fn promote_user_role(
    conn: &mut PgConnection,
    user_id: Uuid,
    role: UserRole,
    default_offset_minutes: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO user_settings (user_id, role, utc_offset_minutes)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET
            role = CASE WHEN user_settings.role = 'user' THEN EXCLUDED.role ELSE user_settings.role END,
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(role)
    .bind(default_offset_minutes)
    .execute(conn)
    .await?;
    Ok(())
}
