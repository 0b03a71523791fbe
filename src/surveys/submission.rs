//! All-or-nothing acceptance of a raw submission into a stored response.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::domain::{
    AnswerValue, QuestionResponse, QuestionType, Survey, SurveyQuestion, SurveyResponse,
    SurveyResponseSubmission,
};

/// One rejected field, carrying the offending question id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("question {question_id}: {kind}")]
pub struct FieldError {
    pub question_id: String,
    #[serde(flatten)]
    pub kind: FieldErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldErrorKind {
    #[error("an answer is required")]
    MissingRequired,
    #[error("a single value was expected, not a list of selections")]
    ExpectedSingleValue,
    #[error("'{value}' is not one of the configured options")]
    NotAnOption { value: String },
    #[error("rating '{value}' is not a whole number")]
    NotANumber { value: String },
    #[error("rating {value} is below the minimum of {min}")]
    BelowMinimum { value: i64, min: i64 },
    #[error("rating {value} is above the maximum of {max}")]
    AboveMaximum { value: i64, max: i64 },
    #[error("no question with this id exists on the survey")]
    UnknownQuestion,
}

/// Validate `submission` against `survey` and freeze it into a
/// [`SurveyResponse`].
///
/// Acceptance is wholesale: any missing required answer, constraint violation,
/// or unknown question id rejects the submission with the full error list and
/// nothing is persisted. Accepted answers are stored in survey question order
/// with `is_valid` set and the question title/type denormalized.
pub fn validate_submission(
    survey: &Survey,
    submission: SurveyResponseSubmission,
    now: NaiveDateTime,
) -> Result<SurveyResponse, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut answers = Vec::new();

    for question in &survey.questions {
        let value = submission
            .answers
            .get(&question.id)
            .filter(|value| !value.is_blank());

        let Some(value) = value else {
            if question.required {
                errors.push(FieldError {
                    question_id: question.id.clone(),
                    kind: FieldErrorKind::MissingRequired,
                });
            }
            continue;
        };

        match check_value(question, value) {
            Ok(()) => answers.push(QuestionResponse {
                question_id: question.id.clone(),
                question_title: question.title.clone(),
                question_type: question.question_type,
                value: value.clone(),
                is_valid: true,
            }),
            Err(kind) => errors.push(FieldError {
                question_id: question.id.clone(),
                kind,
            }),
        }
    }

    // Answers for question ids the survey does not define are rejected rather
    // than silently dropped.
    for question_id in submission.answers.keys() {
        if survey.question(question_id).is_none() {
            errors.push(FieldError {
                question_id: question_id.clone(),
                kind: FieldErrorKind::UnknownQuestion,
            });
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(SurveyResponse {
        id: None,
        survey_id: submission.survey_id,
        respondent_name: submission.respondent_name,
        respondent_email: submission.respondent_email,
        respondent_phone: submission.respondent_phone,
        respondent_company: submission.respondent_company,
        submitted_at: submission.submitted_at.unwrap_or(now),
        answers,
        is_existing_client: submission.is_existing_client,
        existing_client_id: submission.existing_client_id,
        completion_time: submission.completion_time,
    })
}

/// Check a non-blank value against one question's constraints.
pub(crate) fn check_value(
    question: &SurveyQuestion,
    value: &AnswerValue,
) -> Result<(), FieldErrorKind> {
    match question.question_type {
        QuestionType::ShortText | QuestionType::LongText => match value {
            AnswerValue::Single(_) => Ok(()),
            AnswerValue::Multiple(_) => Err(FieldErrorKind::ExpectedSingleValue),
        },
        QuestionType::SingleChoice => match value {
            AnswerValue::Single(choice) => check_option(question, choice),
            AnswerValue::Multiple(_) => Err(FieldErrorKind::ExpectedSingleValue),
        },
        QuestionType::MultiChoice => match value {
            // A lone selection is an acceptable degenerate multi-choice answer.
            AnswerValue::Single(choice) => check_option(question, choice),
            AnswerValue::Multiple(choices) => choices
                .iter()
                .filter(|choice| !choice.trim().is_empty())
                .try_for_each(|choice| check_option(question, choice)),
        },
        QuestionType::Rating => match value {
            AnswerValue::Single(raw) => check_rating(question, raw),
            AnswerValue::Multiple(_) => Err(FieldErrorKind::ExpectedSingleValue),
        },
    }
}

fn check_option(question: &SurveyQuestion, choice: &str) -> Result<(), FieldErrorKind> {
    let trimmed = choice.trim();
    if question.options.iter().any(|option| option == trimmed) {
        Ok(())
    } else {
        Err(FieldErrorKind::NotAnOption {
            value: trimmed.to_string(),
        })
    }
}

fn check_rating(question: &SurveyQuestion, raw: &str) -> Result<(), FieldErrorKind> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| FieldErrorKind::NotANumber {
            value: raw.trim().to_string(),
        })?;

    let settings = question.settings.unwrap_or_default();
    if let Some(min) = settings.min {
        if value < min {
            return Err(FieldErrorKind::BelowMinimum { value, min });
        }
    }
    if let Some(max) = settings.max {
        if value > max {
            return Err(FieldErrorKind::AboveMaximum { value, max });
        }
    }
    Ok(())
}
