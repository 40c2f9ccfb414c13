use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Staff role inside a business (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Manager,
    Staff,
    /// Only scans loyalty QR codes and coupons
    Scanner,
}

// ============================================================================
// TEAM MEMBERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub role: TeamRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TeamMemberRequest {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub role: TeamRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TeamMemberRequest {
    pub fn apply_to_existing(&self, existing: &mut TeamMember) {
        existing.user_id = self.user_id;
        existing.name = self.name.clone();
        existing.email = self.email.clone();
        existing.role = self.role;
        existing.is_active = self.is_active;
        existing.updated_at = Utc::now();
    }
}

// ============================================================================
// PROCESSES (zones, tasks and daily evidence)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessZone {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessTask {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub requires_evidence: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessEvidence {
    pub id: Uuid,
    pub task_id: Uuid,
    pub team_member_id: Option<Uuid>,
    pub operative_day: NaiveDate,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateZoneRequest {
    pub owner_user_id: Uuid,
    #[validate(length(min = 2, max = 80))]
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 2, max = 160))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    pub requires_evidence: bool,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteTaskRequest {
    #[validate(url, length(max = 1024))]
    pub photo_url: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl CompleteTaskRequest {
    pub fn check_against(&self, task: &ProcessTask) -> Result<(), String> {
        if task.requires_evidence && self.photo_url.is_none() {
            return Err(format!("Task '{}' requires a photo as evidence", task.title));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistTask {
    #[serde(flatten)]
    pub task: ProcessTask,
    pub evidence: Option<ProcessEvidence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistZone {
    #[serde(flatten)]
    pub zone: ProcessZone,
    pub tasks: Vec<ChecklistTask>,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Checklist {
    pub operative_day: NaiveDate,
    pub zones: Vec<ChecklistZone>,
    pub completed: usize,
    pub total: usize,
}

impl Checklist {
    /// Groups tasks under their zones and attaches the day's evidence.
    pub fn build(
        operative_day: NaiveDate,
        zones: Vec<ProcessZone>,
        tasks: Vec<ProcessTask>,
        evidence: Vec<ProcessEvidence>,
    ) -> Self {
        let mut built_zones: Vec<ChecklistZone> = zones
            .into_iter()
            .map(|zone| ChecklistZone {
                zone,
                tasks: Vec::new(),
                completed: 0,
            })
            .collect();

        for task in tasks {
            let Some(zone) = built_zones.iter_mut().find(|z| z.zone.id == task.zone_id) else {
                continue;
            };
            let done = evidence.iter().find(|e| e.task_id == task.id).cloned();
            if done.is_some() {
                zone.completed += 1;
            }
            zone.tasks.push(ChecklistTask {
                task,
                evidence: done,
            });
        }

        let completed = built_zones.iter().map(|z| z.completed).sum();
        let total = built_zones.iter().map(|z| z.tasks.len()).sum();

        Self {
            operative_day,
            zones: built_zones,
            completed,
            total,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChecklistQuery {
    pub owner_user_id: Uuid,
    pub day: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str) -> ProcessZone {
        ProcessZone {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::nil(),
            name: name.into(),
            position: 0,
            created_at: Utc::now(),
        }
    }

    fn task(zone_id: Uuid, title: &str, requires_evidence: bool) -> ProcessTask {
        ProcessTask {
            id: Uuid::new_v4(),
            zone_id,
            title: title.into(),
            description: None,
            requires_evidence,
            position: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn checklist_groups_and_counts() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let kitchen = zone("Cocina");
        let bar = zone("Barra");
        let t1 = task(kitchen.id, "Limpiar plancha", false);
        let t2 = task(kitchen.id, "Revisar refrigerador", true);
        let t3 = task(bar.id, "Cortar limones", false);
        let evidence = vec![ProcessEvidence {
            id: Uuid::new_v4(),
            task_id: t2.id,
            team_member_id: None,
            operative_day: day,
            photo_url: Some("https://cdn.example.com/f.jpg".into()),
            notes: None,
            completed_at: Utc::now(),
        }];

        let checklist = Checklist::build(day, vec![kitchen, bar], vec![t1, t2, t3], evidence);
        assert_eq!(checklist.total, 3);
        assert_eq!(checklist.completed, 1);
        assert_eq!(checklist.zones[0].tasks.len(), 2);
        assert_eq!(checklist.zones[0].completed, 1);
        assert_eq!(checklist.zones[1].completed, 0);
    }

    #[test]
    fn evidence_required_tasks_need_a_photo() {
        let t = task(Uuid::new_v4(), "Baños", true);
        let without_photo = CompleteTaskRequest {
            photo_url: None,
            notes: Some("listo".into()),
        };
        assert!(without_photo.check_against(&t).is_err());

        let with_photo = CompleteTaskRequest {
            photo_url: Some("https://cdn.example.com/b.jpg".into()),
            notes: None,
        };
        assert!(with_photo.check_against(&t).is_ok());
        assert!(with_photo.validate().is_ok());
    }
}
