use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Reservation lifecycle status (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Seated,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Seated)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub party_size: i32,
    pub reserved_for: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public booking request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReservationRequest {
    pub owner_user_id: Uuid,
    #[validate(length(min = 2, max = 120))]
    pub customer_name: String,
    #[validate(length(min = 7, max = 20))]
    pub customer_phone: String,
    #[validate(range(min = 1, max = 50))]
    pub party_size: i32,
    pub reserved_for: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl CreateReservationRequest {
    pub fn validate_business_rules(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.reserved_for <= now {
            return Err("La reservación debe ser en el futuro".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateReservationStatusRequest {
    pub status: ReservationStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReservationsQuery {
    pub owner_user_id: Uuid,
    pub day: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ReservationStatus::*;

    #[test]
    fn status_machine() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Seated));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!Seated.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!NoShow.can_transition_to(Seated));
    }

    #[test]
    fn reservations_must_be_in_the_future() {
        let now = Utc::now();
        let mut request = CreateReservationRequest {
            owner_user_id: Uuid::new_v4(),
            customer_name: "Mariana".into(),
            customer_phone: "5598765432".into(),
            party_size: 4,
            reserved_for: now - Duration::minutes(1),
            notes: None,
        };
        assert!(request.validate_business_rules(now).is_err());

        request.reserved_for = now + Duration::hours(2);
        assert!(request.validate_business_rules(now).is_ok());
        assert!(request.validate().is_ok());
    }
}
