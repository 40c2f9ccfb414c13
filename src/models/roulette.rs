use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// ROULETTE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RouletteGame {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub owner_user_id: Uuid,
    pub is_active: bool,
    pub spin_count: i64,
    pub coupon_valid_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoulettePrize {
    pub id: Uuid,
    pub game_id: Uuid,
    pub label: String,
    /// Relative probability; zero means the prize is only won when guaranteed
    pub weight: f64,
    /// Every n-th spin wins this prize
    pub guaranteed_every: Option<i32>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouletteGameWithPrizes {
    #[serde(flatten)]
    pub game: RouletteGame,
    pub prizes: Vec<RoulettePrize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RouletteSpin {
    pub id: Uuid,
    pub game_id: Uuid,
    pub response_id: Uuid,
    pub prize_id: Option<Uuid>,
    pub prize_label: Option<String>,
    pub spin_number: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrizeInput {
    #[validate(length(min = 2, max = 120))]
    pub label: String,
    #[validate(range(min = 0.0, max = 1000000.0))]
    pub weight: f64,
    #[validate(range(min = 1, max = 100000))]
    pub guaranteed_every: Option<i32>,
}

/// Creates or replaces the roulette of a survey
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertRouletteRequest {
    pub survey_id: Uuid,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[validate(range(min = 1, max = 365))]
    pub coupon_valid_days: Option<i32>,
    #[validate(length(min = 1, max = 20), nested)]
    pub prizes: Vec<PrizeInput>,
}

fn default_active() -> bool {
    true
}

pub const DEFAULT_COUPON_VALID_DAYS: i32 = 30;

impl UpsertRouletteRequest {
    pub fn prize_table(&self) -> Vec<(f64, Option<i32>)> {
        self.prizes
            .iter()
            .map(|prize| (prize.weight, prize.guaranteed_every))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SpinRequest {
    pub response_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpinOutcome {
    pub spin: RouletteSpin,
    pub won: bool,
    pub coupon: Option<Coupon>,
}

// ============================================================================
// COUPONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub code: String,
    pub description: String,
    pub spin_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CouponState {
    Valid,
    Redeemed,
    Expired,
}

impl Coupon {
    pub fn state_at(&self, now: DateTime<Utc>) -> CouponState {
        if self.redeemed_at.is_some() {
            CouponState::Redeemed
        } else if self.expires_at.is_some_and(|expires| expires <= now) {
            CouponState::Expired
        } else {
            CouponState::Valid
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub owner_user_id: Uuid,
    pub code: String,
    pub description: String,
    pub spin_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewCoupon {
    pub fn for_prize(owner_user_id: Uuid, spin_id: Uuid, label: &str, valid_days: i32, code: String) -> Self {
        Self {
            owner_user_id,
            code,
            description: label.to_string(),
            spin_id: Some(spin_id),
            expires_at: Some(Utc::now() + Duration::days(i64::from(valid_days.max(1)))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponStatus {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub state: CouponState,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemCouponRequest {
    pub owner_user_id: Uuid,
    #[validate(length(min = 4, max = 32))]
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(expires_at: Option<DateTime<Utc>>, redeemed_at: Option<DateTime<Utc>>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            code: "HM-ABCDEFGH".into(),
            description: "Postre gratis".into(),
            spin_id: None,
            expires_at,
            redeemed_at,
            redeemed_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn coupon_states() {
        let now = Utc::now();
        assert_eq!(coupon(None, None).state_at(now), CouponState::Valid);
        assert_eq!(
            coupon(Some(now + Duration::days(1)), None).state_at(now),
            CouponState::Valid
        );
        assert_eq!(
            coupon(Some(now - Duration::seconds(1)), None).state_at(now),
            CouponState::Expired
        );
        assert_eq!(
            coupon(Some(now - Duration::days(3)), Some(now - Duration::days(4))).state_at(now),
            CouponState::Redeemed
        );
    }

    #[test]
    fn prize_coupon_expires_after_valid_days() {
        let coupon = NewCoupon::for_prize(Uuid::new_v4(), Uuid::new_v4(), "Café", 7, "HM-TEST0001".into());
        let expires = coupon.expires_at.unwrap();
        let days = (expires - Utc::now()).num_hours();
        assert!((167..=168).contains(&days));
        assert_eq!(coupon.description, "Café");
    }

    #[test]
    fn roulette_request_validation() {
        let request = UpsertRouletteRequest {
            survey_id: Uuid::new_v4(),
            is_active: true,
            coupon_valid_days: Some(0),
            prizes: vec![PrizeInput {
                label: "Refresco".into(),
                weight: 1.0,
                guaranteed_every: None,
            }],
        };
        assert!(request.validate().is_err());
    }
}
