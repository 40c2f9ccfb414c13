use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::QuestionType;
use crate::operative_day::operative_day;

/// A scored answer as read for analytics: one row per rating/NPS answer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoredAnswer {
    pub response_id: Uuid,
    pub question_type: QuestionType,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpsBucket {
    Promoter,
    Passive,
    Detractor,
}

/// Buckets a score according to the scale of its question. Unscored
/// question types return `None`.
pub fn classify(question_type: QuestionType, score: i32) -> Option<NpsBucket> {
    match question_type {
        QuestionType::Nps => Some(match score {
            s if s >= 9 => NpsBucket::Promoter,
            s if s <= 6 => NpsBucket::Detractor,
            _ => NpsBucket::Passive,
        }),
        QuestionType::Rating => Some(match score {
            s if s >= 5 => NpsBucket::Promoter,
            s if s <= 3 => NpsBucket::Detractor,
            _ => NpsBucket::Passive,
        }),
        QuestionType::Text | QuestionType::SingleChoice | QuestionType::YesNo => None,
    }
}

/// Whether an answer should trigger a detractor alert for the owner.
pub fn is_alert_score(question_type: QuestionType, score: i32) -> bool {
    match question_type {
        QuestionType::Nps => score <= 6,
        QuestionType::Rating => score <= 2,
        _ => false,
    }
}

/// `(promoters - detractors) / total * 100`, one decimal. `None` without data.
pub fn net_promoter_score(promoters: i64, detractors: i64, total: i64) -> Option<f64> {
    if total <= 0 {
        return None;
    }
    let raw = (promoters - detractors) as f64 / total as f64 * 100.0;
    Some((raw * 10.0).round() / 10.0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub responses: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreSummary {
    pub total_responses: i64,
    pub promoters: i64,
    pub passives: i64,
    pub detractors: i64,
    pub nps: Option<f64>,
    pub average_rating: Option<f64>,
    pub daily: Vec<DailyCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyAnalytics {
    pub survey_id: Uuid,
    pub days: u32,
    #[serde(flatten)]
    pub summary: ScoreSummary,
}

/// Aggregates scored answers. `total_responses` comes from the caller because
/// responses without any scored answer still count as responses.
pub fn summarize(
    answers: &[ScoredAnswer],
    response_times: &[(Uuid, DateTime<Utc>)],
    offset: FixedOffset,
) -> ScoreSummary {
    let mut summary = ScoreSummary {
        total_responses: response_times.len() as i64,
        ..ScoreSummary::default()
    };

    let mut rating_sum = 0i64;
    let mut rating_count = 0i64;

    for answer in answers {
        if let Some(bucket) = classify(answer.question_type, answer.score) {
            match bucket {
                NpsBucket::Promoter => summary.promoters += 1,
                NpsBucket::Passive => summary.passives += 1,
                NpsBucket::Detractor => summary.detractors += 1,
            }
        }
        if answer.question_type == QuestionType::Rating {
            rating_sum += i64::from(answer.score);
            rating_count += 1;
        }
    }

    let classified = summary.promoters + summary.passives + summary.detractors;
    summary.nps = net_promoter_score(summary.promoters, summary.detractors, classified);
    if rating_count > 0 {
        let avg = rating_sum as f64 / rating_count as f64;
        summary.average_rating = Some((avg * 100.0).round() / 100.0);
    }

    let mut seen = HashSet::new();
    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for (response_id, created_at) in response_times {
        if seen.insert(*response_id) {
            *per_day.entry(operative_day(*created_at, offset)).or_default() += 1;
        }
    }
    summary.daily = per_day
        .into_iter()
        .map(|(day, responses)| DailyCount { day, responses })
        .collect();

    summary
}

/// In-process memo for the survey analytics endpoint.
pub struct AnalyticsCache {
    ttl: Duration,
    entries: RwLock<HashMap<(Uuid, u32), (Instant, SurveyAnalytics)>>,
}

impl AnalyticsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, survey_id: Uuid, days: u32) -> Option<SurveyAnalytics> {
        let entries = self.entries.read().await;
        entries
            .get(&(survey_id, days))
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, analytics)| analytics.clone())
    }

    pub async fn put(&self, analytics: SurveyAnalytics) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert((analytics.survey_id, analytics.days), (Instant::now(), analytics));
    }

    pub async fn invalidate_survey(&self, survey_id: Uuid) {
        let mut entries = self.entries.write().await;
        entries.retain(|(cached_survey, _), _| *cached_survey != survey_id);
    }
}
