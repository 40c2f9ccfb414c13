use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Database;
use crate::models::{CreateReservationRequest, Reservation, ReservationStatus};

const RESERVATION_COLUMNS: &str = "id, owner_user_id, customer_name, customer_phone, party_size, reserved_for, status, notes, created_at, updated_at";

impl Database {
    pub async fn create_reservation(&self, request: &CreateReservationRequest) -> Result<Reservation, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO reservations (owner_user_id, customer_name, customer_phone, party_size, reserved_for, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RESERVATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Reservation>(&query)
            .bind(request.owner_user_id)
            .bind(&request.customer_name)
            .bind(&request.customer_phone)
            .bind(request.party_size)
            .bind(request.reserved_for)
            .bind(request.notes.as_deref())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>, sqlx::Error> {
        let query = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
        sqlx::query_as::<_, Reservation>(&query)
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Moves a reservation from `from` to `to`. Returns `None` if another
    /// request changed the status first.
    pub async fn transition_reservation(
        &self,
        reservation_id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE reservations
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {RESERVATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Reservation>(&query)
            .bind(reservation_id)
            .bind(from)
            .bind(to)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_reservations_between(
        &self,
        owner_user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE owner_user_id = $1 AND reserved_for >= $2 AND reserved_for < $3
            ORDER BY reserved_for ASC
            "#
        );
        sqlx::query_as::<_, Reservation>(&query)
            .bind(owner_user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
    }
}
