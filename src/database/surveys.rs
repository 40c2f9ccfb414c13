use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::Database;
use crate::analytics::{summarize, ScoreSummary, ScoredAnswer};
use crate::dedupe::ResponseFingerprint;
use crate::models::{
    Answer, CheckedAnswer, NewSurvey, Question, ResponseWithAnswers, SubmitResponseRequest, Survey,
    SurveyResponse, SurveyWithQuestions,
};

impl Database {
    pub async fn count_surveys_for_owner(&self, owner_user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM surveys WHERE owner_user_id = $1"#)
            .bind(owner_user_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn create_survey(&self, survey: NewSurvey) -> Result<SurveyWithQuestions, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, Survey>(
            r#"
            INSERT INTO surveys (id, owner_user_id, title, description, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, owner_user_id, title, description, is_active, created_at, updated_at
            "#,
        )
        .bind(survey.id)
        .bind(survey.owner_user_id)
        .bind(&survey.title)
        .bind(survey.description.as_deref())
        .bind(survey.is_active)
        .fetch_one(tx.as_mut())
        .await?;

        let questions = Self::insert_questions_with_tx(&mut tx, survey.questions).await?;

        tx.commit().await?;

        Ok(SurveyWithQuestions {
            survey: record,
            questions,
        })
    }

    async fn insert_questions_with_tx(
        tx: &mut Transaction<'_, Postgres>,
        questions: Vec<Question>,
    ) -> Result<Vec<Question>, sqlx::Error> {
        let mut stored = Vec::with_capacity(questions.len());
        for question in questions {
            let inserted = sqlx::query_as::<_, Question>(
                r#"
                INSERT INTO questions (id, survey_id, text, question_type, options, position, required)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, survey_id, text, question_type, options, position, required
                "#,
            )
            .bind(question.id)
            .bind(question.survey_id)
            .bind(question.text)
            .bind(question.question_type)
            .bind(question.options)
            .bind(question.position)
            .bind(question.required)
            .fetch_one(tx.as_mut())
            .await?;
            stored.push(inserted);
        }
        Ok(stored)
    }

    pub async fn get_survey(&self, survey_id: Uuid) -> Result<Option<Survey>, sqlx::Error> {
        sqlx::query_as::<_, Survey>(
            r#"
            SELECT id, owner_user_id, title, description, is_active, created_at, updated_at
            FROM surveys
            WHERE id = $1
            "#,
        )
        .bind(survey_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_questions(&self, survey_id: Uuid) -> Result<Vec<Question>, sqlx::Error> {
        sqlx::query_as::<_, Question>(
            r#"
            SELECT id, survey_id, text, question_type, options, position, required
            FROM questions
            WHERE survey_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_survey_with_questions(
        &self,
        survey_id: Uuid,
    ) -> Result<Option<SurveyWithQuestions>, sqlx::Error> {
        let Some(survey) = self.get_survey(survey_id).await? else {
            return Ok(None);
        };
        let questions = self.list_questions(survey_id).await?;
        Ok(Some(SurveyWithQuestions { survey, questions }))
    }

    pub async fn list_surveys_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<Survey>, sqlx::Error> {
        sqlx::query_as::<_, Survey>(
            r#"
            SELECT id, owner_user_id, title, description, is_active, created_at, updated_at
            FROM surveys
            WHERE owner_user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_active_survey_ids(&self, owner_user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM surveys WHERE owner_user_id = $1 AND is_active = TRUE"#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Updates title, description and status; questions are replaced only
    /// when `questions` is given.
    pub async fn update_survey(
        &self,
        survey: NewSurvey,
        replace_questions: bool,
    ) -> Result<SurveyWithQuestions, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, Survey>(
            r#"
            UPDATE surveys
            SET title = $2, description = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_user_id, title, description, is_active, created_at, updated_at
            "#,
        )
        .bind(survey.id)
        .bind(&survey.title)
        .bind(survey.description.as_deref())
        .bind(survey.is_active)
        .fetch_one(tx.as_mut())
        .await?;

        if replace_questions {
            sqlx::query(r#"DELETE FROM questions WHERE survey_id = $1"#)
                .bind(survey.id)
                .execute(tx.as_mut())
                .await?;
            Self::insert_questions_with_tx(&mut tx, survey.questions).await?;
        }

        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, survey_id, text, question_type, options, position, required
            FROM questions
            WHERE survey_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(survey.id)
        .fetch_all(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(SurveyWithQuestions {
            survey: record,
            questions,
        })
    }

    pub async fn delete_survey(&self, survey_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM surveys WHERE id = $1"#)
            .bind(survey_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    // ========================================================================
    // RESPONSES
    // ========================================================================

    pub async fn create_response(
        &self,
        survey_id: Uuid,
        request: &SubmitResponseRequest,
        answers: &[CheckedAnswer],
    ) -> Result<ResponseWithAnswers, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let response = sqlx::query_as::<_, SurveyResponse>(
            r#"
            INSERT INTO responses (id, survey_id, customer_name, customer_phone, customer_email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, survey_id, customer_name, customer_phone, customer_email, is_duplicate, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(survey_id)
        .bind(request.customer_name.as_deref())
        .bind(request.customer_phone.as_deref())
        .bind(request.customer_email.as_deref())
        .fetch_one(tx.as_mut())
        .await?;

        let mut stored = Vec::with_capacity(answers.len());
        for answer in answers {
            let inserted = sqlx::query_as::<_, Answer>(
                r#"
                INSERT INTO answers (response_id, question_id, score, text_value)
                VALUES ($1, $2, $3, $4)
                RETURNING id, response_id, question_id, score, text_value
                "#,
            )
            .bind(response.id)
            .bind(answer.question_id)
            .bind(answer.score)
            .bind(answer.text_value.as_deref())
            .fetch_one(tx.as_mut())
            .await?;
            stored.push(inserted);
        }

        tx.commit().await?;

        Ok(ResponseWithAnswers {
            response,
            answers: stored,
        })
    }

    pub async fn get_response(&self, response_id: Uuid) -> Result<Option<SurveyResponse>, sqlx::Error> {
        sqlx::query_as::<_, SurveyResponse>(
            r#"
            SELECT id, survey_id, customer_name, customer_phone, customer_email, is_duplicate, created_at
            FROM responses
            WHERE id = $1
            "#,
        )
        .bind(response_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_responses_with_answers(
        &self,
        survey_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ResponseWithAnswers>, sqlx::Error> {
        let responses = sqlx::query_as::<_, SurveyResponse>(
            r#"
            SELECT id, survey_id, customer_name, customer_phone, customer_email, is_duplicate, created_at
            FROM responses
            WHERE survey_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(survey_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        if responses.is_empty() {
            return Ok(Vec::new());
        }

        let response_ids: Vec<Uuid> = responses.iter().map(|response| response.id).collect();
        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT a.id, a.response_id, a.question_id, a.score, a.text_value
            FROM answers a
            INNER JOIN questions q ON q.id = a.question_id
            WHERE a.response_id = ANY($1)
            ORDER BY a.response_id, q.position ASC
            "#,
        )
        .bind(&response_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Answer>> = HashMap::new();
        for answer in answers {
            grouped.entry(answer.response_id).or_default().push(answer);
        }

        Ok(responses
            .into_iter()
            .map(|response| {
                let answers = grouped.remove(&response.id).unwrap_or_default();
                ResponseWithAnswers { response, answers }
            })
            .collect())
    }

    pub async fn count_responses(&self, survey_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM responses WHERE survey_id = $1"#)
            .bind(survey_id)
            .fetch_one(&self.pool)
            .await
    }

    // ========================================================================
    // ANALYTICS READS
    // ========================================================================

    pub async fn scored_answers(
        &self,
        survey_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScoredAnswer>, sqlx::Error> {
        if survey_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, ScoredAnswer>(
            r#"
            SELECT r.id AS response_id, q.question_type, a.score, r.created_at
            FROM answers a
            INNER JOIN responses r ON r.id = a.response_id
            INNER JOIN questions q ON q.id = a.question_id
            WHERE r.survey_id = ANY($1)
              AND r.is_duplicate = FALSE
              AND r.created_at >= $2 AND r.created_at < $3
              AND q.question_type IN ('nps', 'rating')
              AND a.score IS NOT NULL
            "#,
        )
        .bind(survey_ids)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn response_times(
        &self,
        survey_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, DateTime<Utc>)>, sqlx::Error> {
        if survey_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            r#"
            SELECT id, created_at
            FROM responses
            WHERE survey_id = ANY($1)
              AND is_duplicate = FALSE
              AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(survey_ids)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
    }

    /// Score summary of the given surveys over `[start, end)`.
    pub async fn score_summary(
        &self,
        survey_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<ScoreSummary, sqlx::Error> {
        let answers = self.scored_answers(survey_ids, start, end).await?;
        let times = self.response_times(survey_ids, start, end).await?;
        Ok(summarize(&answers, &times, offset))
    }

    // ========================================================================
    // DUPLICATE DETECTION
    // ========================================================================

    pub async fn response_fingerprints_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ResponseFingerprint>, sqlx::Error> {
        sqlx::query_as::<_, ResponseFingerprint>(
            r#"
            SELECT id, survey_id, customer_phone, customer_email, created_at
            FROM responses
            WHERE created_at >= $1
              AND (customer_phone IS NOT NULL OR customer_email IS NOT NULL)
            ORDER BY created_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn mark_duplicates(&self, response_ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        if response_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"UPDATE responses SET is_duplicate = TRUE WHERE id = ANY($1) AND is_duplicate = FALSE"#,
        )
        .bind(response_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
