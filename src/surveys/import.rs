//! Ingestion of historical response exports (CSV) from previous survey tools.
//!
//! Fixed respondent columns followed by one column per question, keyed by
//! question id or title. Multi-selection cells separate options with `;`.
//! Answers are kept even when they fail the question's constraints; the
//! per-answer `is_valid` flag records the verdict so statistics stay honest.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::domain::{
    AnswerValue, QuestionResponse, Survey, SurveyQuestion, SurveyResponse,
};
use super::submission::check_value;

const NAME_COLUMN: &str = "Respondent Name";
const EMAIL_COLUMN: &str = "Respondent Email";
const PHONE_COLUMN: &str = "Respondent Phone";
const COMPANY_COLUMN: &str = "Respondent Company";
const SUBMITTED_COLUMN: &str = "Submitted At";
const COMPLETION_COLUMN: &str = "Completion Time";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read response export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid response CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("column '{0}' is missing from the export")]
    MissingColumn(&'static str),
    #[error("row {row}: could not parse '{value}' as a submission timestamp")]
    Timestamp { row: usize, value: String },
}

pub struct ResponseCsvImporter;

impl ResponseCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        survey: &Survey,
    ) -> Result<Vec<SurveyResponse>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, survey)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        survey: &Survey,
    ) -> Result<Vec<SurveyResponse>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let name_idx = require_column(&headers, NAME_COLUMN)?;
        let email_idx = require_column(&headers, EMAIL_COLUMN)?;
        let submitted_idx = require_column(&headers, SUBMITTED_COLUMN)?;
        let phone_idx = find_column(&headers, PHONE_COLUMN);
        let company_idx = find_column(&headers, COMPANY_COLUMN);
        let completion_idx = find_column(&headers, COMPLETION_COLUMN);

        // Remaining columns are matched against the survey's questions by id
        // first, then by title; columns matching neither are ignored.
        let question_columns: Vec<(usize, &SurveyQuestion)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, header)| {
                let question = survey
                    .question(header)
                    .or_else(|| survey.questions.iter().find(|q| q.title == header))?;
                Some((idx, question))
            })
            .collect();

        let mut responses = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let submitted_raw = record.get(submitted_idx).unwrap_or_default();
            let submitted_at =
                parse_datetime(submitted_raw).ok_or_else(|| ImportError::Timestamp {
                    row: row + 1,
                    value: submitted_raw.to_string(),
                })?;

            let answers = question_columns
                .iter()
                .filter_map(|&(idx, question)| {
                    let cell = record.get(idx).unwrap_or_default().trim();
                    if cell.is_empty() {
                        return None;
                    }
                    Some(question_response(question, cell))
                })
                .collect();

            responses.push(SurveyResponse {
                id: None,
                survey_id: survey.id.clone(),
                respondent_name: cell_value(&record, Some(name_idx)).unwrap_or_default(),
                respondent_email: cell_value(&record, Some(email_idx)).unwrap_or_default(),
                respondent_phone: cell_value(&record, phone_idx),
                respondent_company: cell_value(&record, company_idx),
                submitted_at,
                answers,
                is_existing_client: None,
                existing_client_id: None,
                completion_time: completion_idx
                    .and_then(|idx| record.get(idx))
                    .and_then(|raw| raw.trim().parse().ok()),
            });
        }

        Ok(responses)
    }
}

fn question_response(question: &SurveyQuestion, cell: &str) -> QuestionResponse {
    let value = if question.question_type.accepts_many() && cell.contains(';') {
        AnswerValue::Multiple(
            cell.split(';')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
        )
    } else {
        AnswerValue::Single(cell.to_string())
    };

    let is_valid = check_value(question, &value).is_ok();
    QuestionResponse {
        question_id: question.id.clone(),
        question_title: question.title.clone(),
        question_type: question.question_type,
        value,
        is_valid,
    }
}

fn require_column(headers: &csv::StringRecord, name: &'static str) -> Result<usize, ImportError> {
    find_column(headers, name).ok_or(ImportError::MissingColumn(name))
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

fn cell_value(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surveys::domain::{QuestionType, SurveyId, SurveyStatus};
    use std::io::Cursor;

    fn survey() -> Survey {
        Survey {
            id: SurveyId("sv-legacy".to_string()),
            title: "Onboarding feedback".to_string(),
            description: None,
            questions: vec![
                SurveyQuestion {
                    id: "q-channel".to_string(),
                    title: "How did you hear about us?".to_string(),
                    description: None,
                    question_type: QuestionType::MultiChoice,
                    required: false,
                    options: vec![
                        "Search".to_string(),
                        "Referral".to_string(),
                        "Event".to_string(),
                    ],
                    settings: None,
                },
                SurveyQuestion {
                    id: "q-score".to_string(),
                    title: "Overall score".to_string(),
                    description: None,
                    question_type: QuestionType::Rating,
                    required: true,
                    options: Vec::new(),
                    settings: Some(crate::surveys::domain::QuestionSettings {
                        min: Some(1),
                        max: Some(5),
                    }),
                },
            ],
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .expect("valid date")
                .and_hms_opt(0, 0, 0)
                .expect("valid time"),
            updated_at: None,
            status: Some(SurveyStatus::Active),
            response_count: None,
            completion_rate: None,
            delivery_config: None,
        }
    }

    const EXPORT: &str = "\
Respondent Name,Respondent Email,Submitted At,Completion Time,q-channel,Overall score
Ada Fox,ada@example.com,2024-02-01T10:30:00,95,Search; Referral,4
Sam Hale,sam@example.com,2024-02-02 09:15:00,,Event,9
";

    #[test]
    fn imports_rows_with_multi_choice_and_validity_flags() {
        let responses = ResponseCsvImporter::from_reader(Cursor::new(EXPORT), &survey())
            .expect("export parses");
        assert_eq!(responses.len(), 2);

        let ada = &responses[0];
        assert_eq!(ada.respondent_name, "Ada Fox");
        assert_eq!(ada.completion_time, Some(95));
        let channel = ada.answer("q-channel").expect("channel answer present");
        assert_eq!(
            channel.value,
            AnswerValue::Multiple(vec!["Search".to_string(), "Referral".to_string()])
        );
        assert!(channel.is_valid);

        // A score of 9 violates the 1..=5 bounds: kept, but flagged invalid.
        let sam_score = responses[1].answer("q-score").expect("score answer present");
        assert!(!sam_score.is_valid);
    }

    #[test]
    fn missing_submitted_at_column_is_an_error() {
        let export = "Respondent Name,Respondent Email\nAda,ada@example.com\n";
        let result = ResponseCsvImporter::from_reader(Cursor::new(export), &survey());
        assert!(matches!(
            result,
            Err(ImportError::MissingColumn(SUBMITTED_COLUMN))
        ));
    }
}
