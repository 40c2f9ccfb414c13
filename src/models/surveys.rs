use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ============================================================================
// ENUMS
// ============================================================================

/// Kind of question (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// 1 to 5 stars
    Rating,
    /// 0 to 10 "would you recommend us"
    Nps,
    Text,
    SingleChoice,
    /// Stored as score 1 (yes) or 0 (no)
    YesNo,
}

impl QuestionType {
    /// Inclusive score range accepted for this type, if it is scored.
    pub fn score_range(self) -> Option<(i32, i32)> {
        match self {
            QuestionType::Rating => Some((1, 5)),
            QuestionType::Nps => Some((0, 10)),
            QuestionType::YesNo => Some((0, 1)),
            QuestionType::Text | QuestionType::SingleChoice => None,
        }
    }
}

pub const MAX_TEXT_ANSWER_LEN: usize = 2000;

// ============================================================================
// SURVEYS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Survey {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub position: i32,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyWithQuestions {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<Question>,
}

/// Helper struct used when inserting a survey and its questions
#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_question_options"))]
pub struct QuestionInput {
    #[validate(length(min = 3, max = 300))]
    pub text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

fn validate_question_options(question: &QuestionInput) -> Result<(), ValidationError> {
    match question.question_type {
        QuestionType::SingleChoice => {
            let distinct: HashSet<&str> = question
                .options
                .iter()
                .map(|option| option.trim())
                .filter(|option| !option.is_empty())
                .collect();
            if distinct.len() < 2 {
                return Err(ValidationError::new("single_choice_needs_two_options"));
            }
        }
        _ if !question.options.is_empty() => {
            return Err(ValidationError::new("options_only_for_single_choice"));
        }
        _ => {}
    }
    Ok(())
}

/// Payload used to create or fully replace a survey
#[derive(Debug, Deserialize, Validate)]
pub struct SurveyRequest {
    #[validate(length(min = 3, max = 120))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[validate(length(min = 1, max = 30), nested)]
    pub questions: Vec<QuestionInput>,
}

fn default_active() -> bool {
    true
}

impl SurveyRequest {
    pub fn into_new_survey(self, survey_id: Uuid, owner_user_id: Uuid) -> NewSurvey {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(position, input)| Question {
                id: Uuid::new_v4(),
                survey_id,
                text: input.text,
                question_type: input.question_type,
                options: input
                    .options
                    .into_iter()
                    .map(|option| option.trim().to_string())
                    .filter(|option| !option.is_empty())
                    .collect(),
                position: position as i32,
                required: input.required,
            })
            .collect();

        NewSurvey {
            id: survey_id,
            owner_user_id,
            title: self.title,
            description: self.description,
            is_active: self.is_active,
            questions,
        }
    }
}

impl NewSurvey {
    /// Whether the question list matches `existing` in order, wording, type,
    /// options and requiredness. Ids are ignored.
    pub fn same_questions_as(&self, existing: &[Question]) -> bool {
        self.questions.len() == existing.len()
            && self.questions.iter().zip(existing).all(|(new, old)| {
                new.text == old.text
                    && new.question_type == old.question_type
                    && new.options == old.options
                    && new.required == old.required
            })
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub is_duplicate: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Answer {
    pub id: Uuid,
    pub response_id: Uuid,
    pub question_id: Uuid,
    pub score: Option<i32>,
    pub text_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseWithAnswers {
    #[serde(flatten)]
    pub response: SurveyResponse,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: Uuid,
    pub score: Option<i32>,
    pub text_value: Option<String>,
}

/// Public payload sent by a customer filling a survey
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResponseRequest {
    #[validate(length(max = 120))]
    pub customer_name: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub customer_phone: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub answers: Vec<AnswerInput>,
}

/// A validated answer ready to be stored, with the type of its question.
#[derive(Debug, Clone)]
pub struct CheckedAnswer {
    pub question_id: Uuid,
    pub question_type: QuestionType,
    pub score: Option<i32>,
    pub text_value: Option<String>,
}

impl SubmitResponseRequest {
    /// Checks answers against the survey's questions.
    pub fn check_answers(&self, questions: &[Question]) -> Result<Vec<CheckedAnswer>, String> {
        let by_id: HashMap<Uuid, &Question> = questions.iter().map(|q| (q.id, q)).collect();
        let mut answered = HashSet::new();
        let mut checked = Vec::with_capacity(self.answers.len());

        for answer in &self.answers {
            let question = by_id
                .get(&answer.question_id)
                .ok_or_else(|| format!("Question {} does not belong to this survey", answer.question_id))?;

            if !answered.insert(answer.question_id) {
                return Err(format!("Question {} answered more than once", answer.question_id));
            }

            let text_value = answer
                .text_value
                .as_ref()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());

            match question.question_type.score_range() {
                Some((min, max)) => {
                    let score = answer
                        .score
                        .ok_or_else(|| format!("Question '{}' needs a score", question.text))?;
                    if !(min..=max).contains(&score) {
                        return Err(format!(
                            "Score for '{}' must be between {min} and {max}",
                            question.text
                        ));
                    }
                }
                None => {
                    if answer.score.is_some() {
                        return Err(format!("Question '{}' does not take a score", question.text));
                    }
                }
            }

            // An empty choice is left to the required check below.
            if let (QuestionType::SingleChoice, Some(choice)) = (question.question_type, text_value.as_deref()) {
                if !question.options.iter().any(|option| option == choice) {
                    return Err(format!("Invalid option for '{}'", question.text));
                }
            }

            if let Some(text) = &text_value {
                if text.chars().count() > MAX_TEXT_ANSWER_LEN {
                    return Err(format!("Answer to '{}' is too long", question.text));
                }
            }

            checked.push(CheckedAnswer {
                question_id: question.id,
                question_type: question.question_type,
                score: answer.score,
                text_value,
            });
        }

        let is_answered = |question: &Question| {
            checked
                .iter()
                .any(|answer| answer.question_id == question.id && (answer.score.is_some() || answer.text_value.is_some()))
        };
        if let Some(missing) = questions.iter().find(|q| q.required && !is_answered(q)) {
            return Err(format!("Question '{}' is required", missing.text));
        }

        Ok(checked)
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<u32>,
}

pub const DEFAULT_ANALYTICS_DAYS: u32 = 30;
pub const MAX_ANALYTICS_DAYS: u32 = 365;

impl AnalyticsQuery {
    pub fn days(&self) -> u32 {
        self.days
            .unwrap_or(DEFAULT_ANALYTICS_DAYS)
            .clamp(1, MAX_ANALYTICS_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionType, required: bool, options: &[&str]) -> Question {
        Question {
            id: Uuid::new_v4(),
            survey_id: Uuid::nil(),
            text: format!("{kind:?}?"),
            question_type: kind,
            options: options.iter().map(|o| o.to_string()).collect(),
            position: 0,
            required,
        }
    }

    fn submit(answers: Vec<AnswerInput>) -> SubmitResponseRequest {
        SubmitResponseRequest {
            customer_name: Some("Lupita".into()),
            customer_phone: None,
            customer_email: None,
            answers,
        }
    }

    #[test]
    fn single_choice_requires_two_options() {
        let input = QuestionInput {
            text: "¿Cómo nos conociste?".into(),
            question_type: QuestionType::SingleChoice,
            options: vec!["Instagram".into(), " ".into()],
            required: true,
        };
        assert!(input.validate().is_err());

        let rating_with_options = QuestionInput {
            text: "Califica la comida".into(),
            question_type: QuestionType::Rating,
            options: vec!["a".into()],
            required: true,
        };
        assert!(rating_with_options.validate().is_err());
    }

    #[test]
    fn survey_request_assigns_positions() {
        let request = SurveyRequest {
            title: "Visita".into(),
            description: None,
            is_active: true,
            questions: vec![
                QuestionInput {
                    text: "¿Nos recomendarías?".into(),
                    question_type: QuestionType::Nps,
                    options: vec![],
                    required: true,
                },
                QuestionInput {
                    text: "Comentarios".into(),
                    question_type: QuestionType::Text,
                    options: vec![],
                    required: false,
                },
            ],
        };
        assert!(request.validate().is_ok());

        let survey_id = Uuid::new_v4();
        let new_survey = request.into_new_survey(survey_id, Uuid::new_v4());
        assert_eq!(new_survey.questions.len(), 2);
        assert_eq!(new_survey.questions[1].position, 1);
        assert!(new_survey.questions.iter().all(|q| q.survey_id == survey_id));
    }

    #[test]
    fn survey_request_needs_questions() {
        let request = SurveyRequest {
            title: "Vacía".into(),
            description: None,
            is_active: true,
            questions: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn answers_must_be_in_range() {
        let nps = question(QuestionType::Nps, true, &[]);
        let request = submit(vec![AnswerInput {
            question_id: nps.id,
            score: Some(11),
            text_value: None,
        }]);
        assert!(request.check_answers(&[nps.clone()]).is_err());

        let ok = submit(vec![AnswerInput {
            question_id: nps.id,
            score: Some(10),
            text_value: None,
        }]);
        let checked = ok.check_answers(&[nps]).unwrap();
        assert_eq!(checked[0].question_type, QuestionType::Nps);
    }

    #[test]
    fn required_questions_must_be_answered() {
        let rating = question(QuestionType::Rating, true, &[]);
        let comment = question(QuestionType::Text, false, &[]);
        let request = submit(vec![AnswerInput {
            question_id: comment.id,
            score: None,
            text_value: Some("Todo bien".into()),
        }]);
        let err = request.check_answers(&[rating, comment]).unwrap_err();
        assert!(err.contains("required"));
    }

    #[test]
    fn foreign_and_repeated_questions_are_rejected() {
        let rating = question(QuestionType::Rating, true, &[]);
        let foreign = submit(vec![AnswerInput {
            question_id: Uuid::new_v4(),
            score: Some(3),
            text_value: None,
        }]);
        assert!(foreign.check_answers(&[rating.clone()]).is_err());

        let twice = submit(vec![
            AnswerInput { question_id: rating.id, score: Some(3), text_value: None },
            AnswerInput { question_id: rating.id, score: Some(4), text_value: None },
        ]);
        assert!(twice.check_answers(&[rating]).is_err());
    }

    #[test]
    fn single_choice_answer_must_match_an_option() {
        let choice = question(QuestionType::SingleChoice, true, &["Mesa", "Barra"]);
        let bad = submit(vec![AnswerInput {
            question_id: choice.id,
            score: None,
            text_value: Some("Terraza".into()),
        }]);
        assert!(bad.check_answers(&[choice.clone()]).is_err());

        let good = submit(vec![AnswerInput {
            question_id: choice.id,
            score: None,
            text_value: Some(" Barra ".into()),
        }]);
        let checked = good.check_answers(&[choice]).unwrap();
        assert_eq!(checked[0].text_value.as_deref(), Some("Barra"));
    }

    #[test]
    fn optional_single_choice_may_be_left_blank() {
        let rating = question(QuestionType::Rating, true, &[]);
        let seat = question(QuestionType::SingleChoice, false, &["Mesa", "Barra"]);
        let request = submit(vec![
            AnswerInput { question_id: rating.id, score: Some(5), text_value: None },
            AnswerInput { question_id: seat.id, score: None, text_value: None },
        ]);
        let checked = request.check_answers(&[rating.clone(), seat.clone()]).unwrap();
        assert_eq!(checked[1].text_value, None);

        let required_seat = Question { required: true, ..seat };
        let err = request.check_answers(&[rating, required_seat]).unwrap_err();
        assert!(err.contains("required"));
    }

    #[test]
    fn invalid_nested_question_fails_the_survey() {
        let request = SurveyRequest {
            title: "Visita".into(),
            description: None,
            is_active: true,
            questions: vec![QuestionInput {
                text: "¿Dónde te sentaste?".into(),
                question_type: QuestionType::SingleChoice,
                options: vec!["Mesa".into()],
                required: true,
            }],
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.errors().contains_key("questions"));
    }

    #[test]
    fn question_comparison_ignores_ids() {
        let request = SurveyRequest {
            title: "Visita".into(),
            description: None,
            is_active: true,
            questions: vec![QuestionInput {
                text: "¿Qué tan probable es que nos recomiendes?".into(),
                question_type: QuestionType::Nps,
                options: Vec::new(),
                required: true,
            }],
        };
        let survey = request.into_new_survey(Uuid::new_v4(), Uuid::new_v4());

        let mut stored = survey.questions.clone();
        stored[0].id = Uuid::new_v4();
        assert!(survey.same_questions_as(&stored));

        stored[0].required = false;
        assert!(!survey.same_questions_as(&stored));
        assert!(!survey.same_questions_as(&[]));
    }
}
