use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "affiliate_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AffiliateStatus {
    Pending,
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "commission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payout_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Requested,
    Paid,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Demo,
    Won,
    Lost,
}

impl LeadStatus {
    fn rank(self) -> u8 {
        match self {
            LeadStatus::New => 0,
            LeadStatus::Contacted => 1,
            LeadStatus::Demo => 2,
            LeadStatus::Won | LeadStatus::Lost => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }

    /// Leads only move forward; won and lost are final.
    pub fn can_transition_to(self, next: LeadStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// Smallest payout an affiliate can request, in MXN.
pub fn minimum_payout() -> Decimal {
    Decimal::new(50000, 2)
}

pub fn default_commission_rate() -> Decimal {
    Decimal::new(20, 2)
}

/// Commission earned on a payment, rounded half-up to cents.
pub fn compute_commission(payment_amount: Decimal, rate: Decimal) -> Decimal {
    (payment_amount * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// AFFILIATES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AffiliateProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub referral_code: String,
    pub commission_rate: Decimal,
    pub status: AffiliateStatus,
    pub payout_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the public referral landing page gets to see
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublicAffiliate {
    pub referral_code: String,
    pub status: AffiliateStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Commission {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub referred_user_id: Uuid,
    pub payment_amount: Decimal,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub source_payment_ref: String,
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AffiliateBalance {
    pub pending: Decimal,
    pub available: Decimal,
    pub paid: Decimal,
}

impl AffiliateBalance {
    pub fn from_commissions(commissions: &[Commission]) -> Self {
        commissions
            .iter()
            .fold(AffiliateBalance::default(), |mut balance, commission| {
                match commission.status {
                    CommissionStatus::Pending => balance.pending += commission.amount,
                    CommissionStatus::Approved if commission.payout_id.is_none() => {
                        balance.available += commission.amount
                    }
                    CommissionStatus::Paid => balance.paid += commission.amount,
                    CommissionStatus::Approved | CommissionStatus::Cancelled => {}
                }
                balance
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AffiliateDashboard {
    pub profile: AffiliateProfile,
    pub balance: AffiliateBalance,
    pub commissions: Vec<Commission>,
    pub payouts: Vec<Payout>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAffiliateRequest {
    #[validate(email)]
    pub payout_email: String,
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("amount_must_be_positive"))
    }
}

/// Recorded by an admin (or the billing integration) when a referred
/// business pays.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordCommissionRequest {
    #[validate(length(min = 4, max = 16))]
    pub referral_code: String,
    pub referred_user_id: Uuid,
    #[validate(custom(function = "validate_positive_amount"))]
    pub payment_amount: Decimal,
    #[validate(length(min = 3, max = 120))]
    pub source_payment_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct CommissionDecisionRequest {
    pub status: CommissionStatus,
}

#[derive(Debug, Deserialize)]
pub struct PayoutDecisionRequest {
    pub status: PayoutStatus,
}

#[derive(Debug, Deserialize)]
pub struct AffiliateStatusRequest {
    pub status: AffiliateStatus,
}

// ============================================================================
// REPRESENTATIVES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RepresentativeProfile {
    pub user_id: Uuid,
    pub region: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SellerLead {
    pub id: Uuid,
    pub representative_user_id: Uuid,
    pub business_name: String,
    pub contact_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRepresentativeRequest {
    pub user_id: Uuid,
    #[validate(length(min = 2, max = 80))]
    pub region: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLeadRequest {
    #[validate(length(min = 2, max = 120))]
    pub business_name: String,
    #[validate(length(min = 2, max = 120))]
    pub contact_name: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 80))]
    pub city: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLeadRequest {
    pub status: LeadStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commission(amount: i64, status: CommissionStatus, payout_id: Option<Uuid>) -> Commission {
        Commission {
            id: Uuid::new_v4(),
            affiliate_id: Uuid::nil(),
            referred_user_id: Uuid::new_v4(),
            payment_amount: Decimal::new(amount * 5, 2),
            amount: Decimal::new(amount, 2),
            status,
            source_payment_ref: "pi_123".into(),
            payout_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn commission_rounds_to_cents() {
        assert_eq!(
            compute_commission(Decimal::new(49900, 2), default_commission_rate()),
            Decimal::new(9980, 2)
        );
        assert_eq!(
            compute_commission(Decimal::new(1005, 2), Decimal::new(15, 2)),
            Decimal::new(151, 2)
        );
    }

    #[test]
    fn balance_buckets() {
        let balance = AffiliateBalance::from_commissions(&[
            commission(10000, CommissionStatus::Pending, None),
            commission(20000, CommissionStatus::Approved, None),
            commission(5000, CommissionStatus::Approved, Some(Uuid::new_v4())),
            commission(30000, CommissionStatus::Paid, Some(Uuid::new_v4())),
            commission(99900, CommissionStatus::Cancelled, None),
        ]);
        assert_eq!(balance.pending, Decimal::new(10000, 2));
        assert_eq!(balance.available, Decimal::new(20000, 2));
        assert_eq!(balance.paid, Decimal::new(30000, 2));
    }

    #[test]
    fn leads_only_move_forward() {
        assert!(LeadStatus::New.can_transition_to(LeadStatus::Contacted));
        assert!(LeadStatus::Contacted.can_transition_to(LeadStatus::Won));
        assert!(!LeadStatus::Demo.can_transition_to(LeadStatus::New));
        assert!(!LeadStatus::Won.can_transition_to(LeadStatus::Lost));
        assert!(!LeadStatus::New.can_transition_to(LeadStatus::New));
    }

    #[test]
    fn commission_request_rejects_non_positive_amounts() {
        let request = RecordCommissionRequest {
            referral_code: "ABCD1234".into(),
            referred_user_id: Uuid::new_v4(),
            payment_amount: Decimal::ZERO,
            source_payment_ref: "pi_001".into(),
        };
        assert!(request.validate().is_err());
    }
}
