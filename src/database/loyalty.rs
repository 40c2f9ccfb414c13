use chrono::NaiveDate;
use uuid::Uuid;

use super::Database;
use crate::models::{
    EnrollCustomerRequest, LoyaltyCustomer, LoyaltyProgram, LoyaltyProgramRequest, LoyaltyRedemption,
    LoyaltyVisit, RedemptionOutcome, VisitOutcome,
};

const PROGRAM_COLUMNS: &str = "id, owner_user_id, name, points_per_visit, reward_threshold, reward_description, is_active, created_at, updated_at";
const CUSTOMER_COLUMNS: &str = "id, program_id, name, phone, qr_code, points, visits, created_at, updated_at";

impl Database {
    pub async fn upsert_loyalty_program(
        &self,
        owner_user_id: Uuid,
        request: &LoyaltyProgramRequest,
    ) -> Result<LoyaltyProgram, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO loyalty_programs (owner_user_id, name, points_per_visit, reward_threshold, reward_description, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_user_id) DO UPDATE SET
                name = EXCLUDED.name,
                points_per_visit = EXCLUDED.points_per_visit,
                reward_threshold = EXCLUDED.reward_threshold,
                reward_description = EXCLUDED.reward_description,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING {PROGRAM_COLUMNS}
            "#
        );

        sqlx::query_as::<_, LoyaltyProgram>(&query)
            .bind(owner_user_id)
            .bind(&request.name)
            .bind(request.points_per_visit)
            .bind(request.reward_threshold)
            .bind(&request.reward_description)
            .bind(request.is_active)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_loyalty_program_for_owner(
        &self,
        owner_user_id: Uuid,
    ) -> Result<Option<LoyaltyProgram>, sqlx::Error> {
        let query = format!("SELECT {PROGRAM_COLUMNS} FROM loyalty_programs WHERE owner_user_id = $1");
        sqlx::query_as::<_, LoyaltyProgram>(&query)
            .bind(owner_user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_loyalty_program(&self, program_id: Uuid) -> Result<Option<LoyaltyProgram>, sqlx::Error> {
        let query = format!("SELECT {PROGRAM_COLUMNS} FROM loyalty_programs WHERE id = $1");
        sqlx::query_as::<_, LoyaltyProgram>(&query)
            .bind(program_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Enrolls a customer. A phone already in the program gets its existing
    /// card back with the name refreshed.
    pub async fn enroll_loyalty_customer(
        &self,
        program_id: Uuid,
        request: &EnrollCustomerRequest,
        qr_code: &str,
    ) -> Result<LoyaltyCustomer, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO loyalty_customers (program_id, name, phone, qr_code)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (program_id, phone) DO UPDATE SET
                name = EXCLUDED.name,
                updated_at = NOW()
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, LoyaltyCustomer>(&query)
            .bind(program_id)
            .bind(&request.name)
            .bind(&request.phone)
            .bind(qr_code)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_loyalty_customer(&self, customer_id: Uuid) -> Result<Option<LoyaltyCustomer>, sqlx::Error> {
        let query = format!("SELECT {CUSTOMER_COLUMNS} FROM loyalty_customers WHERE id = $1");
        sqlx::query_as::<_, LoyaltyCustomer>(&query)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_loyalty_customer_by_qr(&self, qr_code: &str) -> Result<Option<LoyaltyCustomer>, sqlx::Error> {
        let query = format!("SELECT {CUSTOMER_COLUMNS} FROM loyalty_customers WHERE qr_code = $1");
        sqlx::query_as::<_, LoyaltyCustomer>(&query)
            .bind(qr_code)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_loyalty_customers(
        &self,
        program_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LoyaltyCustomer>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM loyalty_customers
            WHERE program_id = $1
            ORDER BY points DESC, name ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        );
        sqlx::query_as::<_, LoyaltyCustomer>(&query)
            .bind(program_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    /// Stores the visit and credits the points. A second visit on the same
    /// operative day fails with a unique violation.
    pub async fn register_loyalty_visit(
        &self,
        customer_id: Uuid,
        program: &LoyaltyProgram,
        operative_day: NaiveDate,
        registered_by: Uuid,
    ) -> Result<VisitOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let visit = sqlx::query_as::<_, LoyaltyVisit>(
            r#"
            INSERT INTO loyalty_visits (customer_id, operative_day, points_awarded, registered_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, customer_id, operative_day, points_awarded, registered_by, created_at
            "#,
        )
        .bind(customer_id)
        .bind(operative_day)
        .bind(program.points_per_visit)
        .bind(registered_by)
        .fetch_one(tx.as_mut())
        .await?;

        let query = format!(
            r#"
            UPDATE loyalty_customers
            SET points = points + $2, visits = visits + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );
        let customer = sqlx::query_as::<_, LoyaltyCustomer>(&query)
            .bind(customer_id)
            .bind(program.points_per_visit)
            .fetch_one(tx.as_mut())
            .await?;

        tx.commit().await?;

        Ok(VisitOutcome {
            reward_available: customer.can_redeem(program),
            customer,
            visit,
        })
    }

    /// Spends one reward worth of points. Returns `None` if the balance no
    /// longer covers the threshold.
    pub async fn redeem_loyalty_reward(
        &self,
        customer_id: Uuid,
        program: &LoyaltyProgram,
        redeemed_by: Uuid,
    ) -> Result<Option<RedemptionOutcome>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            UPDATE loyalty_customers
            SET points = points - $2, updated_at = NOW()
            WHERE id = $1 AND points >= $2
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );
        let customer = sqlx::query_as::<_, LoyaltyCustomer>(&query)
            .bind(customer_id)
            .bind(program.reward_threshold)
            .fetch_optional(tx.as_mut())
            .await?;

        let Some(customer) = customer else {
            tx.rollback().await?;
            return Ok(None);
        };

        let redemption = sqlx::query_as::<_, LoyaltyRedemption>(
            r#"
            INSERT INTO loyalty_redemptions (customer_id, points_spent, reward_description, redeemed_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, customer_id, points_spent, reward_description, redeemed_by, created_at
            "#,
        )
        .bind(customer_id)
        .bind(program.reward_threshold)
        .bind(&program.reward_description)
        .bind(redeemed_by)
        .fetch_one(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(Some(RedemptionOutcome { customer, redemption }))
    }
}
