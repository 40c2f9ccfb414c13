use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Database;
use crate::models::{
    Coupon, NewCoupon, RouletteGame, RouletteGameWithPrizes, RoulettePrize, RouletteSpin,
    SpinOutcome, UpsertRouletteRequest, DEFAULT_COUPON_VALID_DAYS,
};

/// Violated by a second spin for the same response.
pub const SPIN_RESPONSE_KEY: &str = "roulette_spins_response_key";
/// Violated when a freshly generated coupon code is already taken.
pub const COUPON_CODE_KEY: &str = "coupons_code_key";

impl Database {
    /// Creates the roulette of a survey or replaces its settings and prize table.
    /// The spin counter survives a replacement.
    pub async fn upsert_roulette(
        &self,
        owner_user_id: Uuid,
        request: &UpsertRouletteRequest,
    ) -> Result<RouletteGameWithPrizes, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let game = sqlx::query_as::<_, RouletteGame>(
            r#"
            INSERT INTO roulette_games (survey_id, owner_user_id, is_active, coupon_valid_days)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (survey_id) DO UPDATE SET
                is_active = EXCLUDED.is_active,
                coupon_valid_days = EXCLUDED.coupon_valid_days,
                updated_at = NOW()
            RETURNING id, survey_id, owner_user_id, is_active, spin_count, coupon_valid_days, created_at, updated_at
            "#,
        )
        .bind(request.survey_id)
        .bind(owner_user_id)
        .bind(request.is_active)
        .bind(request.coupon_valid_days.unwrap_or(DEFAULT_COUPON_VALID_DAYS))
        .fetch_one(tx.as_mut())
        .await?;

        sqlx::query(r#"DELETE FROM roulette_prizes WHERE game_id = $1"#)
            .bind(game.id)
            .execute(tx.as_mut())
            .await?;

        let mut prizes = Vec::with_capacity(request.prizes.len());
        for (position, prize) in request.prizes.iter().enumerate() {
            let inserted = sqlx::query_as::<_, RoulettePrize>(
                r#"
                INSERT INTO roulette_prizes (game_id, label, weight, guaranteed_every, position)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, game_id, label, weight, guaranteed_every, position
                "#,
            )
            .bind(game.id)
            .bind(&prize.label)
            .bind(prize.weight)
            .bind(prize.guaranteed_every)
            .bind(position as i32)
            .fetch_one(tx.as_mut())
            .await?;
            prizes.push(inserted);
        }

        tx.commit().await?;

        Ok(RouletteGameWithPrizes { game, prizes })
    }

    pub async fn get_roulette(&self, game_id: Uuid) -> Result<Option<RouletteGameWithPrizes>, sqlx::Error> {
        let game = sqlx::query_as::<_, RouletteGame>(
            r#"
            SELECT id, survey_id, owner_user_id, is_active, spin_count, coupon_valid_days, created_at, updated_at
            FROM roulette_games
            WHERE id = $1
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(game) = game else {
            return Ok(None);
        };

        let prizes = self.list_prizes(game.id).await?;
        Ok(Some(RouletteGameWithPrizes { game, prizes }))
    }

    pub async fn get_roulette_for_survey(
        &self,
        survey_id: Uuid,
    ) -> Result<Option<RouletteGameWithPrizes>, sqlx::Error> {
        let game_id = sqlx::query_scalar::<_, Uuid>(r#"SELECT id FROM roulette_games WHERE survey_id = $1"#)
            .bind(survey_id)
            .fetch_optional(&self.pool)
            .await?;

        match game_id {
            Some(game_id) => self.get_roulette(game_id).await,
            None => Ok(None),
        }
    }

    async fn list_prizes(&self, game_id: Uuid) -> Result<Vec<RoulettePrize>, sqlx::Error> {
        sqlx::query_as::<_, RoulettePrize>(
            r#"
            SELECT id, game_id, label, weight, guaranteed_every, position
            FROM roulette_prizes
            WHERE game_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Records one spin for a response.
    ///
    /// The game counter is incremented inside the transaction so concurrent
    /// spins each see a distinct spin number. `pick` chooses the prize for
    /// that number. A second spin for the same response fails with a unique
    /// violation and rolls the counter back.
    pub async fn record_spin<F>(
        &self,
        game: &RouletteGameWithPrizes,
        response_id: Uuid,
        coupon_code: String,
        pick: F,
    ) -> Result<SpinOutcome, sqlx::Error>
    where
        F: FnOnce(i64, &[RoulettePrize]) -> Option<RoulettePrize>,
    {
        let mut tx = self.pool.begin().await?;

        let spin_number = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE roulette_games
            SET spin_count = spin_count + 1, updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING spin_count
            "#,
        )
        .bind(game.game.id)
        .fetch_one(tx.as_mut())
        .await?;

        let prize = pick(spin_number, &game.prizes);

        let spin = sqlx::query_as::<_, RouletteSpin>(
            r#"
            INSERT INTO roulette_spins (game_id, response_id, prize_id, prize_label, spin_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, game_id, response_id, prize_id, prize_label, spin_number, created_at
            "#,
        )
        .bind(game.game.id)
        .bind(response_id)
        .bind(prize.as_ref().map(|prize| prize.id))
        .bind(prize.as_ref().map(|prize| prize.label.as_str()))
        .bind(spin_number)
        .fetch_one(tx.as_mut())
        .await?;

        let coupon = match &prize {
            Some(prize) => {
                let new_coupon = NewCoupon::for_prize(
                    game.game.owner_user_id,
                    spin.id,
                    &prize.label,
                    game.game.coupon_valid_days,
                    coupon_code,
                );
                let coupon = sqlx::query_as::<_, Coupon>(
                    r#"
                    INSERT INTO coupons (owner_user_id, code, description, spin_id, expires_at)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, owner_user_id, code, description, spin_id, expires_at, redeemed_at, redeemed_by, created_at
                    "#,
                )
                .bind(new_coupon.owner_user_id)
                .bind(&new_coupon.code)
                .bind(&new_coupon.description)
                .bind(new_coupon.spin_id)
                .bind(new_coupon.expires_at)
                .fetch_one(tx.as_mut())
                .await?;
                Some(coupon)
            }
            None => None,
        };

        tx.commit().await?;

        Ok(SpinOutcome {
            won: coupon.is_some(),
            spin,
            coupon,
        })
    }

    pub async fn list_spins(&self, game_id: Uuid, limit: i64, offset: i64) -> Result<Vec<RouletteSpin>, sqlx::Error> {
        sqlx::query_as::<_, RouletteSpin>(
            r#"
            SELECT id, game_id, response_id, prize_id, prize_label, spin_number, created_at
            FROM roulette_spins
            WHERE game_id = $1
            ORDER BY spin_number DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(game_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    // ========================================================================
    // COUPONS
    // ========================================================================

    pub async fn get_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, sqlx::Error> {
        sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, owner_user_id, code, description, spin_id, expires_at, redeemed_at, redeemed_by, created_at
            FROM coupons
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
    }

    /// Marks a coupon redeemed if it belongs to the tenant, is unredeemed and
    /// has not expired. Returns `None` when no coupon qualified.
    pub async fn redeem_coupon(
        &self,
        owner_user_id: Uuid,
        code: &str,
        redeemed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, sqlx::Error> {
        sqlx::query_as::<_, Coupon>(
            r#"
            UPDATE coupons
            SET redeemed_at = $4, redeemed_by = $3
            WHERE owner_user_id = $1
              AND code = $2
              AND redeemed_at IS NULL
              AND (expires_at IS NULL OR expires_at > $4)
            RETURNING id, owner_user_id, code, description, spin_id, expires_at, redeemed_at, redeemed_by, created_at
            "#,
        )
        .bind(owner_user_id)
        .bind(code)
        .bind(redeemed_by)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }
}
