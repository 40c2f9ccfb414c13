use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoyaltyProgram {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub points_per_visit: i32,
    pub reward_threshold: i32,
    pub reward_description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoyaltyCustomer {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    pub phone: String,
    pub qr_code: String,
    pub points: i32,
    pub visits: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyCustomer {
    pub fn can_redeem(&self, program: &LoyaltyProgram) -> bool {
        program.is_active && self.points >= program.reward_threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoyaltyVisit {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub operative_day: NaiveDate,
    pub points_awarded: i32,
    pub registered_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoyaltyRedemption {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub points_spent: i32,
    pub reward_description: String,
    pub redeemed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitOutcome {
    pub customer: LoyaltyCustomer,
    pub visit: LoyaltyVisit,
    pub reward_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedemptionOutcome {
    pub customer: LoyaltyCustomer,
    pub redemption: LoyaltyRedemption,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoyaltyProgramRequest {
    #[validate(length(min = 3, max = 120))]
    pub name: String,
    #[validate(range(min = 1, max = 1000))]
    pub points_per_visit: i32,
    #[validate(range(min = 1, max = 100000))]
    pub reward_threshold: i32,
    #[validate(length(min = 3, max = 300))]
    pub reward_description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Public enrollment of a customer in a business's program
#[derive(Debug, Deserialize, Validate)]
pub struct EnrollCustomerRequest {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterVisitRequest {
    #[validate(length(min = 4, max = 32))]
    pub qr_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(threshold: i32, active: bool) -> LoyaltyProgram {
        LoyaltyProgram {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            name: "Club Tacos".into(),
            points_per_visit: 10,
            reward_threshold: threshold,
            reward_description: "Orden gratis".into(),
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn customer(points: i32) -> LoyaltyCustomer {
        LoyaltyCustomer {
            id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            name: "Pepe".into(),
            phone: "5512345678".into(),
            qr_code: "LC-ABCDEFGHIJ".into(),
            points,
            visits: points / 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn redeem_needs_threshold_and_active_program() {
        assert!(customer(100).can_redeem(&program(100, true)));
        assert!(!customer(90).can_redeem(&program(100, true)));
        assert!(!customer(500).can_redeem(&program(100, false)));
    }

    #[test]
    fn program_request_bounds() {
        let request = LoyaltyProgramRequest {
            name: "Club".into(),
            points_per_visit: 0,
            reward_threshold: 100,
            reward_description: "Café".into(),
            is_active: true,
        };
        assert!(request.validate().is_err());
    }
}
