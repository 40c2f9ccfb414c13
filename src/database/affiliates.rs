use rust_decimal::Decimal;
use uuid::Uuid;

use super::users::promote_user_role;
use super::Database;
use crate::models::{
    AffiliateProfile, AffiliateStatus, Commission, CommissionStatus, CreateLeadRequest,
    CreateRepresentativeRequest, Payout, PayoutStatus, RepresentativeProfile, SellerLead,
    UpdateLeadRequest, UserRole,
};

const AFFILIATE_COLUMNS: &str =
    "id, user_id, referral_code, commission_rate, status, payout_email, created_at, updated_at";
const COMMISSION_COLUMNS: &str = "id, affiliate_id, referred_user_id, payment_amount, amount, status, source_payment_ref, payout_id, created_at, updated_at";
const LEAD_COLUMNS: &str =
    "id, representative_user_id, business_name, contact_name, phone, city, status, notes, created_at, updated_at";

impl Database {
    // ========================================================================
    // AFFILIATES
    // ========================================================================

    /// Creates the affiliate profile and promotes a plain user to `creator`.
    pub async fn register_affiliate(
        &self,
        user_id: Uuid,
        referral_code: &str,
        payout_email: &str,
        commission_rate: Decimal,
        default_offset_minutes: i32,
    ) -> Result<AffiliateProfile, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            INSERT INTO affiliate_profiles (user_id, referral_code, commission_rate, status, payout_email)
            VALUES ($1, $2, $3, 'active', $4)
            RETURNING {AFFILIATE_COLUMNS}
            "#
        );
        let profile = sqlx::query_as::<_, AffiliateProfile>(&query)
            .bind(user_id)
            .bind(referral_code)
            .bind(commission_rate)
            .bind(payout_email)
            .fetch_one(tx.as_mut())
            .await?;

        promote_user_role(tx.as_mut(), user_id, UserRole::Creator, default_offset_minutes).await?;

        tx.commit().await?;
        Ok(profile)
    }

    pub async fn get_affiliate_by_user(&self, user_id: Uuid) -> Result<Option<AffiliateProfile>, sqlx::Error> {
        let query = format!("SELECT {AFFILIATE_COLUMNS} FROM affiliate_profiles WHERE user_id = $1");
        sqlx::query_as::<_, AffiliateProfile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_affiliate_by_code(&self, referral_code: &str) -> Result<Option<AffiliateProfile>, sqlx::Error> {
        let query = format!("SELECT {AFFILIATE_COLUMNS} FROM affiliate_profiles WHERE referral_code = $1");
        sqlx::query_as::<_, AffiliateProfile>(&query)
            .bind(referral_code)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn set_affiliate_status(
        &self,
        affiliate_id: Uuid,
        status: AffiliateStatus,
    ) -> Result<AffiliateProfile, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE affiliate_profiles
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {AFFILIATE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, AffiliateProfile>(&query)
            .bind(affiliate_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
    }

    // ========================================================================
    // COMMISSIONS
    // ========================================================================

    /// Records a commission once per payment reference. Returns the stored
    /// row and whether it was created by this call.
    pub async fn record_commission(
        &self,
        affiliate_id: Uuid,
        referred_user_id: Uuid,
        payment_amount: Decimal,
        amount: Decimal,
        source_payment_ref: &str,
    ) -> Result<(Commission, bool), sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO commissions (affiliate_id, referred_user_id, payment_amount, amount, source_payment_ref)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_payment_ref) DO NOTHING
            RETURNING {COMMISSION_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, Commission>(&query)
            .bind(affiliate_id)
            .bind(referred_user_id)
            .bind(payment_amount)
            .bind(amount)
            .bind(source_payment_ref)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(commission) = inserted {
            return Ok((commission, true));
        }

        let query = format!("SELECT {COMMISSION_COLUMNS} FROM commissions WHERE source_payment_ref = $1");
        let existing = sqlx::query_as::<_, Commission>(&query)
            .bind(source_payment_ref)
            .fetch_one(&self.pool)
            .await?;
        Ok((existing, false))
    }

    /// Approves or cancels a pending commission. Returns `None` when the
    /// commission exists but is no longer pending.
    pub async fn decide_commission(
        &self,
        commission_id: Uuid,
        status: CommissionStatus,
    ) -> Result<Option<Commission>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE commissions
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {COMMISSION_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Commission>(&query)
            .bind(commission_id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;

        if updated.is_none() {
            let exists = sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS (SELECT 1 FROM commissions WHERE id = $1)"#)
                .bind(commission_id)
                .fetch_one(&self.pool)
                .await?;
            if !exists {
                return Err(sqlx::Error::RowNotFound);
            }
        }

        Ok(updated)
    }

    pub async fn list_commissions(&self, affiliate_id: Uuid) -> Result<Vec<Commission>, sqlx::Error> {
        let query = format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE affiliate_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Commission>(&query)
            .bind(affiliate_id)
            .fetch_all(&self.pool)
            .await
    }

    // ========================================================================
    // PAYOUTS
    // ========================================================================

    pub async fn list_payouts(&self, affiliate_id: Uuid) -> Result<Vec<Payout>, sqlx::Error> {
        sqlx::query_as::<_, Payout>(
            r#"
            SELECT id, affiliate_id, amount, status, requested_at, processed_at
            FROM payouts
            WHERE affiliate_id = $1
            ORDER BY requested_at DESC
            "#,
        )
        .bind(affiliate_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Bundles every approved, unassigned commission into a new payout when
    /// their sum reaches `minimum`. Returns `Ok(Err(available))` otherwise.
    pub async fn request_payout(
        &self,
        affiliate_id: Uuid,
        minimum: Decimal,
    ) -> Result<Result<Payout, Decimal>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let available_ids = sqlx::query_as::<_, (Uuid, Decimal)>(
            r#"
            SELECT id, amount
            FROM commissions
            WHERE affiliate_id = $1 AND status = 'approved' AND payout_id IS NULL
            FOR UPDATE
            "#,
        )
        .bind(affiliate_id)
        .fetch_all(tx.as_mut())
        .await?;

        let available: Decimal = available_ids.iter().map(|(_, amount)| *amount).sum();
        if available < minimum {
            tx.rollback().await?;
            return Ok(Err(available));
        }

        let payout = sqlx::query_as::<_, Payout>(
            r#"
            INSERT INTO payouts (affiliate_id, amount)
            VALUES ($1, $2)
            RETURNING id, affiliate_id, amount, status, requested_at, processed_at
            "#,
        )
        .bind(affiliate_id)
        .bind(available)
        .fetch_one(tx.as_mut())
        .await?;

        let ids: Vec<Uuid> = available_ids.into_iter().map(|(id, _)| id).collect();
        sqlx::query(r#"UPDATE commissions SET payout_id = $1, updated_at = NOW() WHERE id = ANY($2)"#)
            .bind(payout.id)
            .bind(&ids)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(Ok(payout))
    }

    /// Settles a requested payout. Paid payouts mark their commissions paid;
    /// rejected ones release them back to the available balance.
    pub async fn decide_payout(&self, payout_id: Uuid, status: PayoutStatus) -> Result<Option<Payout>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let payout = sqlx::query_as::<_, Payout>(
            r#"
            UPDATE payouts
            SET status = $2, processed_at = NOW()
            WHERE id = $1 AND status = 'requested'
            RETURNING id, affiliate_id, amount, status, requested_at, processed_at
            "#,
        )
        .bind(payout_id)
        .bind(status)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(payout) = payout else {
            tx.rollback().await?;
            return Ok(None);
        };

        match status {
            PayoutStatus::Paid => {
                sqlx::query(r#"UPDATE commissions SET status = 'paid', updated_at = NOW() WHERE payout_id = $1"#)
                    .bind(payout.id)
                    .execute(tx.as_mut())
                    .await?;
            }
            PayoutStatus::Rejected => {
                sqlx::query(r#"UPDATE commissions SET payout_id = NULL, updated_at = NOW() WHERE payout_id = $1"#)
                    .bind(payout.id)
                    .execute(tx.as_mut())
                    .await?;
            }
            PayoutStatus::Requested => {}
        }

        tx.commit().await?;
        Ok(Some(payout))
    }

    // ========================================================================
    // REPRESENTATIVES
    // ========================================================================

    pub async fn create_representative(
        &self,
        request: &CreateRepresentativeRequest,
        default_offset_minutes: i32,
    ) -> Result<RepresentativeProfile, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let profile = sqlx::query_as::<_, RepresentativeProfile>(
            r#"
            INSERT INTO representative_profiles (user_id, region, phone)
            VALUES ($1, $2, $3)
            RETURNING user_id, region, phone, is_active, created_at
            "#,
        )
        .bind(request.user_id)
        .bind(&request.region)
        .bind(request.phone.as_deref())
        .fetch_one(tx.as_mut())
        .await?;

        promote_user_role(tx.as_mut(), request.user_id, UserRole::Seller, default_offset_minutes).await?;

        tx.commit().await?;
        Ok(profile)
    }

    pub async fn get_representative(&self, user_id: Uuid) -> Result<Option<RepresentativeProfile>, sqlx::Error> {
        sqlx::query_as::<_, RepresentativeProfile>(
            r#"
            SELECT user_id, region, phone, is_active, created_at
            FROM representative_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create_lead(
        &self,
        representative_user_id: Uuid,
        request: &CreateLeadRequest,
    ) -> Result<SellerLead, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO seller_leads (representative_user_id, business_name, contact_name, phone, city, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {LEAD_COLUMNS}
            "#
        );
        sqlx::query_as::<_, SellerLead>(&query)
            .bind(representative_user_id)
            .bind(&request.business_name)
            .bind(&request.contact_name)
            .bind(request.phone.as_deref())
            .bind(request.city.as_deref())
            .bind(request.notes.as_deref())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn list_leads(&self, representative_user_id: Uuid) -> Result<Vec<SellerLead>, sqlx::Error> {
        let query = format!(
            "SELECT {LEAD_COLUMNS} FROM seller_leads WHERE representative_user_id = $1 ORDER BY updated_at DESC"
        );
        sqlx::query_as::<_, SellerLead>(&query)
            .bind(representative_user_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn get_lead(&self, lead_id: Uuid) -> Result<Option<SellerLead>, sqlx::Error> {
        let query = format!("SELECT {LEAD_COLUMNS} FROM seller_leads WHERE id = $1");
        sqlx::query_as::<_, SellerLead>(&query)
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn update_lead(&self, lead_id: Uuid, request: &UpdateLeadRequest) -> Result<SellerLead, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE seller_leads
            SET status = $2, notes = COALESCE($3, notes), updated_at = NOW()
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        );
        sqlx::query_as::<_, SellerLead>(&query)
            .bind(lead_id)
            .bind(request.status)
            .bind(request.notes.as_deref())
            .fetch_one(&self.pool)
            .await
    }
}
