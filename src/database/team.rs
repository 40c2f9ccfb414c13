use chrono::NaiveDate;
use uuid::Uuid;

use super::Database;
use crate::models::{
    CompleteTaskRequest, CreateTaskRequest, CreateZoneRequest, ProcessEvidence, ProcessTask, ProcessZone,
    TeamMember, TeamMemberRequest,
};

const MEMBER_COLUMNS: &str = "id, owner_user_id, user_id, name, email, role, is_active, created_at, updated_at";
const TASK_COLUMNS: &str = "id, zone_id, title, description, requires_evidence, position, created_at";
const EVIDENCE_COLUMNS: &str = "id, task_id, team_member_id, operative_day, photo_url, notes, completed_at";

impl Database {
    // ========================================================================
    // TEAM
    // ========================================================================

    pub async fn count_team_members(&self, owner_user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM team_members WHERE owner_user_id = $1"#)
            .bind(owner_user_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn create_team_member(
        &self,
        owner_user_id: Uuid,
        request: &TeamMemberRequest,
    ) -> Result<TeamMember, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO team_members (owner_user_id, user_id, name, email, role, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEMBER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(owner_user_id)
            .bind(request.user_id)
            .bind(&request.name)
            .bind(request.email.as_deref())
            .bind(request.role)
            .bind(request.is_active)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_team_member(&self, member_id: Uuid) -> Result<Option<TeamMember>, sqlx::Error> {
        let query = format!("SELECT {MEMBER_COLUMNS} FROM team_members WHERE id = $1");
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_team_member_for_user(
        &self,
        owner_user_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, sqlx::Error> {
        let query = format!("SELECT {MEMBER_COLUMNS} FROM team_members WHERE owner_user_id = $1 AND user_id = $2");
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(owner_user_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_team_members(&self, owner_user_id: Uuid) -> Result<Vec<TeamMember>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE owner_user_id = $1 ORDER BY is_active DESC, name ASC"
        );
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(owner_user_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn save_team_member(&self, member: &TeamMember) -> Result<TeamMember, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE team_members
            SET user_id = $2, name = $3, email = $4, role = $5, is_active = $6, updated_at = $7
            WHERE id = $1
            RETURNING {MEMBER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(member.id)
            .bind(member.user_id)
            .bind(&member.name)
            .bind(member.email.as_deref())
            .bind(member.role)
            .bind(member.is_active)
            .bind(member.updated_at)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn delete_team_member(&self, member_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM team_members WHERE id = $1"#)
            .bind(member_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    // ========================================================================
    // PROCESS ZONES & TASKS
    // ========================================================================

    pub async fn create_zone(&self, request: &CreateZoneRequest) -> Result<ProcessZone, sqlx::Error> {
        sqlx::query_as::<_, ProcessZone>(
            r#"
            INSERT INTO process_zones (owner_user_id, name, position)
            VALUES ($1, $2, $3)
            RETURNING id, owner_user_id, name, position, created_at
            "#,
        )
        .bind(request.owner_user_id)
        .bind(&request.name)
        .bind(request.position)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_zone(&self, zone_id: Uuid) -> Result<Option<ProcessZone>, sqlx::Error> {
        sqlx::query_as::<_, ProcessZone>(
            r#"SELECT id, owner_user_id, name, position, created_at FROM process_zones WHERE id = $1"#,
        )
        .bind(zone_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_zones(&self, owner_user_id: Uuid) -> Result<Vec<ProcessZone>, sqlx::Error> {
        sqlx::query_as::<_, ProcessZone>(
            r#"
            SELECT id, owner_user_id, name, position, created_at
            FROM process_zones
            WHERE owner_user_id = $1
            ORDER BY position ASC, created_at ASC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn create_task(&self, zone_id: Uuid, request: &CreateTaskRequest) -> Result<ProcessTask, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO process_tasks (zone_id, title, description, requires_evidence, position)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TASK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ProcessTask>(&query)
            .bind(zone_id)
            .bind(&request.title)
            .bind(request.description.as_deref())
            .bind(request.requires_evidence)
            .bind(request.position)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_task(&self, task_id: Uuid) -> Result<Option<ProcessTask>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM process_tasks WHERE id = $1");
        sqlx::query_as::<_, ProcessTask>(&query)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_tasks_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<ProcessTask>, sqlx::Error> {
        sqlx::query_as::<_, ProcessTask>(
            r#"
            SELECT t.id, t.zone_id, t.title, t.description, t.requires_evidence, t.position, t.created_at
            FROM process_tasks t
            INNER JOIN process_zones z ON z.id = t.zone_id
            WHERE z.owner_user_id = $1
            ORDER BY t.position ASC, t.created_at ASC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await
    }

    // ========================================================================
    // EVIDENCE
    // ========================================================================

    /// Fails with a unique violation if the task was already completed that day.
    pub async fn record_evidence(
        &self,
        task_id: Uuid,
        team_member_id: Option<Uuid>,
        operative_day: NaiveDate,
        request: &CompleteTaskRequest,
    ) -> Result<ProcessEvidence, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO process_evidence (task_id, team_member_id, operative_day, photo_url, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {EVIDENCE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ProcessEvidence>(&query)
            .bind(task_id)
            .bind(team_member_id)
            .bind(operative_day)
            .bind(request.photo_url.as_deref())
            .bind(request.notes.as_deref())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn list_evidence_for_day(
        &self,
        owner_user_id: Uuid,
        operative_day: NaiveDate,
    ) -> Result<Vec<ProcessEvidence>, sqlx::Error> {
        sqlx::query_as::<_, ProcessEvidence>(
            r#"
            SELECT e.id, e.task_id, e.team_member_id, e.operative_day, e.photo_url, e.notes, e.completed_at
            FROM process_evidence e
            INNER JOIN process_tasks t ON t.id = e.task_id
            INNER JOIN process_zones z ON z.id = t.zone_id
            WHERE z.owner_user_id = $1 AND e.operative_day = $2
            "#,
        )
        .bind(owner_user_id)
        .bind(operative_day)
        .fetch_all(&self.pool)
        .await
    }
}
