use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::TeamRole;
use crate::operative_day::{MAX_UTC_OFFSET_MINUTES, MIN_UTC_OFFSET_MINUTES};
use crate::plans::Plan;

/// Platform-wide role of an account (also a Postgres enum)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    /// Affiliate promoting the product for referral commissions
    Creator,
    /// Regional sales representative
    Seller,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub plan: Plan,
    pub utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// Settings reported for accounts that never saved any.
    pub fn defaults_for(user_id: Uuid, utc_offset_minutes: i32) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email: None,
            business_name: None,
            phone: None,
            role: UserRole::User,
            plan: Plan::Free,
            utc_offset_minutes,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserSettingsRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 120))]
    pub business_name: Option<String>,
    #[validate(length(min = 8, max = 20))]
    pub phone: Option<String>,
    #[validate(range(min = MIN_UTC_OFFSET_MINUTES, max = MAX_UTC_OFFSET_MINUTES))]
    pub utc_offset_minutes: Option<i32>,
}

/// Admin change of role and/or plan
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<UserRole>,
    pub plan: Option<Plan>,
}

/// What an actor may do on a tenant's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Owner,
    ChainOwner,
    Admin,
    Staff(TeamRole),
    None,
}

impl AccessLevel {
    pub fn resolve(
        actor_id: Uuid,
        tenant_id: Uuid,
        actor_role: Option<UserRole>,
        owns_chain_of_tenant: bool,
        staff_role: Option<TeamRole>,
    ) -> Self {
        if actor_id == tenant_id {
            AccessLevel::Owner
        } else if owns_chain_of_tenant {
            AccessLevel::ChainOwner
        } else if actor_role == Some(UserRole::Admin) {
            AccessLevel::Admin
        } else if let Some(role) = staff_role {
            AccessLevel::Staff(role)
        } else {
            AccessLevel::None
        }
    }

    /// Configuration and reporting.
    pub fn can_manage(self) -> bool {
        matches!(
            self,
            AccessLevel::Owner | AccessLevel::ChainOwner | AccessLevel::Admin
        ) || self == AccessLevel::Staff(TeamRole::Manager)
    }

    /// Day to day operations: scanning QR codes, redeeming coupons,
    /// completing checklists, handling reservations.
    pub fn can_operate(self) -> bool {
        !matches!(self, AccessLevel::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_always_wins() {
        let id = Uuid::new_v4();
        let level = AccessLevel::resolve(id, id, Some(UserRole::User), false, None);
        assert_eq!(level, AccessLevel::Owner);
        assert!(level.can_manage());
    }

    #[test]
    fn chain_owner_and_admin_can_manage() {
        let (actor, tenant) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            AccessLevel::resolve(actor, tenant, None, true, None),
            AccessLevel::ChainOwner
        );
        assert!(AccessLevel::resolve(actor, tenant, Some(UserRole::Admin), false, None).can_manage());
    }

    #[test]
    fn staff_operate_but_only_managers_manage() {
        let (actor, tenant) = (Uuid::new_v4(), Uuid::new_v4());
        let scanner = AccessLevel::resolve(actor, tenant, None, false, Some(TeamRole::Scanner));
        assert!(scanner.can_operate());
        assert!(!scanner.can_manage());

        let manager = AccessLevel::resolve(actor, tenant, None, false, Some(TeamRole::Manager));
        assert!(manager.can_manage());
    }

    #[test]
    fn strangers_get_nothing() {
        let level = AccessLevel::resolve(Uuid::new_v4(), Uuid::new_v4(), Some(UserRole::Creator), false, None);
        assert_eq!(level, AccessLevel::None);
        assert!(!level.can_operate());
    }

    #[test]
    fn settings_validation_rejects_bad_offset() {
        let request = UpdateUserSettingsRequest {
            email: Some("owner@restaurante.mx".into()),
            business_name: Some("La Cantina".into()),
            phone: None,
            utc_offset_minutes: Some(900),
        };
        assert!(request.validate().is_err());
    }
}
