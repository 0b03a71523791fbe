use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::delivery::DeliveryConfig;

/// Identifier wrapper for surveys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurveyId(pub String);

/// Lifecycle states a survey moves through; unknown wire values are rejected at
/// deserialization rather than carried as free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Active,
    Archived,
}

impl SurveyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SurveyStatus::Draft => "draft",
            SurveyStatus::Active => "active",
            SurveyStatus::Archived => "archived",
        }
    }
}

/// Closed vocabulary of question kinds. The kind decides how an answer value is
/// validated and how it lands in the frequency tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    ShortText,
    LongText,
    SingleChoice,
    MultiChoice,
    Rating,
}

impl QuestionType {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionType::ShortText => "short-text",
            QuestionType::LongText => "long-text",
            QuestionType::SingleChoice => "single-choice",
            QuestionType::MultiChoice => "multi-choice",
            QuestionType::Rating => "rating",
        }
    }

    /// True for kinds whose answers must come from the question's option list.
    pub const fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }

    /// True when an answer may carry several selections at once.
    pub const fn accepts_many(self) -> bool {
        matches!(self, QuestionType::MultiChoice)
    }
}

/// Numeric bounds honored by rating questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub required: bool,
    /// Present and non-empty only for choice-type questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<QuestionSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<SurveyQuestion>,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SurveyStatus>,
    /// Cached read-optimizations; the statistics aggregator stays the source of truth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_config: Option<DeliveryConfig>,
}

impl Survey {
    pub fn question(&self, question_id: &str) -> Option<&SurveyQuestion> {
        self.questions
            .iter()
            .find(|question| question.id == question_id)
    }

    pub fn required_questions(&self) -> impl Iterator<Item = &SurveyQuestion> {
        self.questions.iter().filter(|question| question.required)
    }
}

/// Raw answer payload: a single value, or several selections for multi-choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AnswerValue {
    /// Blank answers count as unanswered everywhere in the core.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Single(value) => value.trim().is_empty(),
            AnswerValue::Multiple(values) => {
                values.iter().all(|value| value.trim().is_empty())
            }
        }
    }
}

/// One stored answer. Title and kind are frozen copies taken at submission time;
/// they must never be recomputed from the live question definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question_id: String,
    pub question_title: String,
    pub question_type: QuestionType,
    pub value: AnswerValue,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub survey_id: SurveyId,
    pub respondent_name: String,
    pub respondent_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent_company: Option<String>,
    pub submitted_at: NaiveDateTime,
    /// Ordered per the survey's question order at submission time.
    pub answers: Vec<QuestionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_existing_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_client_id: Option<String>,
    /// Seconds the respondent spent, when the front-end captured it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<u32>,
}

impl SurveyResponse {
    pub fn answer(&self, question_id: &str) -> Option<&QuestionResponse> {
        self.answers
            .iter()
            .find(|answer| answer.question_id == question_id)
    }

    /// A response is complete when every required question carries a valid,
    /// non-blank answer.
    pub fn satisfies_required(&self, survey: &Survey) -> bool {
        survey.required_questions().all(|question| {
            self.answer(&question.id)
                .is_some_and(|answer| answer.is_valid && !answer.value.is_blank())
        })
    }
}

/// Write-side shape: unvalidated answers keyed by question id. Must pass
/// submission validation before it becomes a stored [`SurveyResponse`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SurveyResponseSubmission {
    pub survey_id: SurveyId,
    pub respondent_name: String,
    pub respondent_email: String,
    #[serde(default)]
    pub respondent_phone: Option<String>,
    #[serde(default)]
    pub respondent_company: Option<String>,
    pub answers: BTreeMap<String, AnswerValue>,
    #[serde(default)]
    pub is_existing_client: Option<bool>,
    #[serde(default)]
    pub existing_client_id: Option<String>,
    #[serde(default)]
    pub completion_time: Option<u32>,
    #[serde(default)]
    pub submitted_at: Option<NaiveDateTime>,
}
