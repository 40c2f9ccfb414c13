use uuid::Uuid;

use super::Database;
use crate::models::{AddBranchRequest, Chain, ChainBranch, ChainInvitation, ChainWithBranches};

const BRANCH_COLUMNS: &str = "id, chain_id, branch_user_id, label, invited_by, accepted_at, created_at";

/// Violated when the same tenant is invited twice to one chain.
pub const CHAIN_BRANCH_KEY: &str = "chain_branches_chain_branch_key";
/// Violated when a tenant that already belongs to a chain joins another.
pub const ACCEPTED_BRANCH_KEY: &str = "chain_branches_accepted_branch_key";

impl Database {
    pub async fn create_chain(&self, owner_user_id: Uuid, name: &str) -> Result<Chain, sqlx::Error> {
        sqlx::query_as::<_, Chain>(
            r#"
            INSERT INTO chains (owner_user_id, name)
            VALUES ($1, $2)
            RETURNING id, owner_user_id, name, created_at, updated_at
            "#,
        )
        .bind(owner_user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_chain(&self, chain_id: Uuid) -> Result<Option<ChainWithBranches>, sqlx::Error> {
        let chain = sqlx::query_as::<_, Chain>(
            r#"SELECT id, owner_user_id, name, created_at, updated_at FROM chains WHERE id = $1"#,
        )
        .bind(chain_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(chain) = chain else {
            return Ok(None);
        };

        let branches = self.list_branches(chain.id).await?;
        Ok(Some(ChainWithBranches { chain, branches }))
    }

    pub async fn list_chains_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<ChainWithBranches>, sqlx::Error> {
        let chains = sqlx::query_as::<_, Chain>(
            r#"
            SELECT id, owner_user_id, name, created_at, updated_at
            FROM chains
            WHERE owner_user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(chains.len());
        for chain in chains {
            let branches = self.list_branches(chain.id).await?;
            result.push(ChainWithBranches { chain, branches });
        }
        Ok(result)
    }

    /// Accepted branches and pending invitations alike.
    async fn list_branches(&self, chain_id: Uuid) -> Result<Vec<ChainBranch>, sqlx::Error> {
        let query = format!(
            "SELECT {BRANCH_COLUMNS} FROM chain_branches WHERE chain_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, ChainBranch>(&query)
            .bind(chain_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Branches and open invitations across every chain of the owner; the
    /// plan limit applies to this total.
    pub async fn count_branches_for_owner(&self, owner_user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM chain_branches cb
            INNER JOIN chains c ON c.id = cb.chain_id
            WHERE c.owner_user_id = $1
            "#,
        )
        .bind(owner_user_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Inserts the link, already accepted when `accepted` is set. Fails with a
    /// unique violation on [`CHAIN_BRANCH_KEY`] or [`ACCEPTED_BRANCH_KEY`].
    pub async fn add_branch(
        &self,
        chain_id: Uuid,
        request: &AddBranchRequest,
        invited_by: Uuid,
        accepted: bool,
    ) -> Result<ChainBranch, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO chain_branches (chain_id, branch_user_id, label, invited_by, accepted_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $5 THEN NOW() END)
            RETURNING {BRANCH_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ChainBranch>(&query)
            .bind(chain_id)
            .bind(request.branch_user_id)
            .bind(&request.label)
            .bind(invited_by)
            .bind(accepted)
            .fetch_one(&self.pool)
            .await
    }

    /// Accepts a pending invitation on behalf of the invited tenant. Returns
    /// `None` when there is no pending invitation for that tenant.
    pub async fn accept_branch(&self, chain_id: Uuid, branch_user_id: Uuid) -> Result<Option<ChainBranch>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE chain_branches
            SET accepted_at = NOW()
            WHERE chain_id = $1 AND branch_user_id = $2 AND accepted_at IS NULL
            RETURNING {BRANCH_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ChainBranch>(&query)
            .bind(chain_id)
            .bind(branch_user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_chain_invitations(&self, branch_user_id: Uuid) -> Result<Vec<ChainInvitation>, sqlx::Error> {
        sqlx::query_as::<_, ChainInvitation>(
            r#"
            SELECT cb.id, cb.chain_id, c.name AS chain_name, c.owner_user_id AS chain_owner_user_id,
                   cb.label, cb.created_at
            FROM chain_branches cb
            INNER JOIN chains c ON c.id = cb.chain_id
            WHERE cb.branch_user_id = $1 AND cb.accepted_at IS NULL
            ORDER BY cb.created_at DESC
            "#,
        )
        .bind(branch_user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn remove_branch(&self, chain_id: Uuid, branch_user_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM chain_branches WHERE chain_id = $1 AND branch_user_id = $2"#)
            .bind(chain_id)
            .bind(branch_user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
