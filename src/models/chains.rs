use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::analytics::ScoreSummary;

/// Multi-location business: one owner account, several branch accounts
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chain {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link between a chain and a branch tenant. Until `accepted_at` is set it
/// is only an invitation and grants the chain owner nothing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChainBranch {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub branch_user_id: Uuid,
    pub label: String,
    pub invited_by: Uuid,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChainBranch {
    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}

/// Pending invitation as seen by the invited tenant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChainInvitation {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub chain_name: String,
    pub chain_owner_user_id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// A tenant attaching itself, or an admin, skips the invitation step.
pub fn joins_without_invitation(actor_id: Uuid, branch_user_id: Uuid, actor_is_admin: bool) -> bool {
    actor_is_admin || actor_id == branch_user_id
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainWithBranches {
    #[serde(flatten)]
    pub chain: Chain,
    pub branches: Vec<ChainBranch>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChainRequest {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddBranchRequest {
    pub branch_user_id: Uuid,
    #[validate(length(min = 2, max = 120))]
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchSummary {
    pub branch: ChainBranch,
    #[serde(flatten)]
    pub summary: ScoreSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainSummary {
    pub chain: Chain,
    pub days: u32,
    pub total: ScoreSummary,
    pub branches: Vec<BranchSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strangers_only_send_invitations() {
        let owner = Uuid::new_v4();
        let other_business = Uuid::new_v4();

        assert!(!joins_without_invitation(owner, other_business, false));
        assert!(joins_without_invitation(owner, owner, false));
        assert!(joins_without_invitation(owner, other_business, true));
    }

    #[test]
    fn pending_branch_is_not_accepted() {
        let branch = ChainBranch {
            id: Uuid::new_v4(),
            chain_id: Uuid::new_v4(),
            branch_user_id: Uuid::new_v4(),
            label: "Sucursal Centro".into(),
            invited_by: Uuid::new_v4(),
            accepted_at: None,
            created_at: Utc::now(),
        };
        assert!(!branch.is_accepted());
        assert!(ChainBranch { accepted_at: Some(Utc::now()), ..branch }.is_accepted());
    }
}
