use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::Database;

/// Re-submissions closer than this to the previous one are duplicates.
pub const DUPLICATE_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResponseFingerprint {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupeReport {
    pub scanned: usize,
    pub duplicates: Vec<Uuid>,
    pub applied: bool,
}

/// Key identifying a customer: the last 10 phone digits (national number in
/// Mexico), else the normalized email.
pub fn contact_key(phone: Option<&str>, email: Option<&str>) -> Option<String> {
    if let Some(phone) = phone {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.len() >= 7 {
            let start = digits.len().saturating_sub(10);
            return Some(format!("tel:{}", &digits[start..]));
        }
    }

    email
        .map(|value| value.trim().to_lowercase())
        .filter(|value| value.contains('@'))
        .map(|value| format!("mail:{value}"))
}

/// Returns the ids of responses submitted within the duplicate window of the
/// previous response from the same customer to the same survey.
pub fn find_duplicates(records: &[ResponseFingerprint]) -> Vec<Uuid> {
    let window = Duration::minutes(DUPLICATE_WINDOW_MINUTES);
    let mut groups: HashMap<(Uuid, String), Vec<&ResponseFingerprint>> = HashMap::new();

    for record in records {
        let Some(key) = contact_key(
            record.customer_phone.as_deref(),
            record.customer_email.as_deref(),
        ) else {
            continue;
        };
        groups.entry((record.survey_id, key)).or_default().push(record);
    }

    let mut duplicates = Vec::new();
    for group in groups.values_mut() {
        group.sort_by_key(|record| (record.created_at, record.id));
        for pair in group.windows(2) {
            if pair[1].created_at - pair[0].created_at < window {
                duplicates.push(pair[1].id);
            }
        }
    }

    duplicates.sort();
    duplicates
}

/// Duplicates created at or after `since`. Records older than `since` only
/// serve as the previous submission of a pair.
pub fn duplicates_since(records: &[ResponseFingerprint], since: DateTime<Utc>) -> Vec<Uuid> {
    let created: HashMap<Uuid, DateTime<Utc>> =
        records.iter().map(|record| (record.id, record.created_at)).collect();
    find_duplicates(records)
        .into_iter()
        .filter(|id| created.get(id).is_some_and(|at| *at >= since))
        .collect()
}

/// Scans responses of the last `days` days and, when `apply` is set, flags
/// the duplicates found.
pub async fn run(db: &Database, days: u32, apply: bool) -> Result<DedupeReport, sqlx::Error> {
    let since = Utc::now() - Duration::days(i64::from(days.max(1)));
    let records = db
        .response_fingerprints_since(since - Duration::minutes(DUPLICATE_WINDOW_MINUTES))
        .await?;
    let scanned = records.iter().filter(|record| record.created_at >= since).count();
    let duplicates = duplicates_since(&records, since);

    if apply && !duplicates.is_empty() {
        let flagged = db.mark_duplicates(&duplicates).await?;
        log::info!("Flagged {flagged} duplicate responses out of {scanned}");
    }

    Ok(DedupeReport {
        scanned,
        duplicates,
        applied: apply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(survey_id: Uuid, phone: Option<&str>, email: Option<&str>, minute: i64) -> ResponseFingerprint {
        let base = DateTime::parse_from_rfc3339("2025-05-01T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        ResponseFingerprint {
            id: Uuid::new_v4(),
            survey_id,
            customer_phone: phone.map(str::to_string),
            customer_email: email.map(str::to_string),
            created_at: base + Duration::minutes(minute),
        }
    }

    #[test]
    fn phone_numbers_normalize_to_national_digits() {
        assert_eq!(
            contact_key(Some("+52 (55) 1234-5678"), None),
            Some("tel:5512345678".to_string())
        );
        assert_eq!(contact_key(Some("55 1234 5678"), None), contact_key(Some("+525512345678"), None));
        assert_eq!(
            contact_key(Some("n/a"), Some(" Ana@Example.com ")),
            Some("mail:ana@example.com".to_string())
        );
        assert_eq!(contact_key(None, Some("no-email")), None);
    }

    #[test]
    fn resubmission_within_five_minutes_is_flagged() {
        let survey = Uuid::new_v4();
        let first = record(survey, Some("5512345678"), None, 0);
        let second = record(survey, Some("+52 55 1234 5678"), None, 3);
        let later = record(survey, Some("5512345678"), None, 30);

        let flagged = find_duplicates(&[later.clone(), first.clone(), second.clone()]);
        assert_eq!(flagged, vec![second.id]);
    }

    #[test]
    fn different_surveys_and_anonymous_responses_are_ignored() {
        let first = record(Uuid::new_v4(), None, Some("a@b.mx"), 0);
        let other_survey = record(Uuid::new_v4(), None, Some("a@b.mx"), 1);
        let anon_a = record(first.survey_id, None, None, 0);
        let anon_b = record(first.survey_id, None, None, 1);

        assert!(find_duplicates(&[first, other_survey, anon_a, anon_b]).is_empty());
    }

    #[test]
    fn exactly_five_minutes_apart_is_not_a_duplicate() {
        let survey = Uuid::new_v4();
        let first = record(survey, None, Some("x@y.com"), 0);
        let second = record(survey, None, Some("x@y.com"), 5);
        assert!(find_duplicates(&[first, second]).is_empty());
    }

    #[test]
    fn earlier_submission_before_the_scan_start_still_counts() {
        let survey = Uuid::new_v4();
        let before = record(survey, Some("5512345678"), None, 0);
        let after = record(survey, Some("5512345678"), None, 2);
        let since = before.created_at + Duration::minutes(1);

        assert_eq!(duplicates_since(&[before.clone(), after.clone()], since), vec![after.id]);
        assert!(duplicates_since(&[before, after], Utc::now()).is_empty());
    }
}
