//! Reduction of raw responses into a survey statistics summary.
//!
//! A single linear pass over the response set: no I/O, no hidden state, and the
//! same input always produces the same output. Structurally malformed answers
//! are collected as diagnostics instead of aborting the computation.

use std::collections::HashMap;

use serde::Serialize;

use super::domain::{AnswerValue, QuestionType, Survey, SurveyResponse};

/// One bucket of a question's frequency table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerFrequency {
    pub answer: String,
    pub count: usize,
    /// Share of responses that answered this question, in [0, 100].
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionStats {
    pub question_id: String,
    /// Current survey labeling, not the per-response denormalized copy.
    pub question_title: String,
    pub responses: Vec<AnswerFrequency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyStatistics {
    pub total_responses: usize,
    /// Mean of the completion times that were captured, in seconds.
    pub average_completion_time: f64,
    /// Share of responses satisfying every required question, in [0, 100].
    pub completion_rate: f64,
    /// One entry per survey question, in survey order.
    pub question_stats: Vec<QuestionStats>,
}

/// A stored answer whose shape does not fit its question's kind, e.g. a list of
/// selections against a single-valued question. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error(
    "response {response_ref} carries a multi-value answer for single-valued \
     question {question_id} ({question_type:?})"
)]
pub struct ShapeIssue {
    /// Response id when stored, respondent email otherwise.
    pub response_ref: String,
    pub question_id: String,
    pub question_type: QuestionType,
}

/// Best-effort statistics plus the data-quality issues met along the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub statistics: SurveyStatistics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<ShapeIssue>,
}

/// Reduce `responses` into a [`StatisticsReport`] for `survey`.
///
/// Answers referencing question ids no longer on the survey are ignored;
/// questions nobody answered keep an entry with an empty frequency table.
pub fn compute_statistics(survey: &Survey, responses: &[SurveyResponse]) -> StatisticsReport {
    let total_responses = responses.len();

    let complete = responses
        .iter()
        .filter(|response| response.satisfies_required(survey))
        .count();
    let completion_rate = percentage(complete, total_responses);

    let timed: Vec<u32> = responses
        .iter()
        .filter_map(|response| response.completion_time)
        .collect();
    let average_completion_time = if timed.is_empty() {
        0.0
    } else {
        timed.iter().map(|&seconds| f64::from(seconds)).sum::<f64>() / timed.len() as f64
    };

    let mut diagnostics = Vec::new();
    let question_stats = survey
        .questions
        .iter()
        .map(|question| {
            tally_question(
                &question.id,
                &question.title,
                question.question_type,
                responses,
                &mut diagnostics,
            )
        })
        .collect();

    StatisticsReport {
        statistics: SurveyStatistics {
            total_responses,
            average_completion_time,
            completion_rate,
            question_stats,
        },
        diagnostics,
    }
}

fn tally_question(
    question_id: &str,
    question_title: &str,
    question_type: QuestionType,
    responses: &[SurveyResponse],
    diagnostics: &mut Vec<ShapeIssue>,
) -> QuestionStats {
    // First-seen order is the tie-break for equal counts, so track insertion
    // order separately from the counts.
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut answered = 0usize;

    for response in responses {
        let Some(answer) = response.answer(question_id) else {
            continue;
        };
        if answer.value.is_blank() {
            continue;
        }

        match &answer.value {
            AnswerValue::Single(value) => {
                answered += 1;
                bump(&mut order, &mut counts, value);
            }
            AnswerValue::Multiple(values) if question_type.accepts_many() => {
                answered += 1;
                for value in values.iter().filter(|value| !value.trim().is_empty()) {
                    bump(&mut order, &mut counts, value);
                }
            }
            AnswerValue::Multiple(_) => {
                diagnostics.push(ShapeIssue {
                    response_ref: response
                        .id
                        .clone()
                        .unwrap_or_else(|| response.respondent_email.clone()),
                    question_id: question_id.to_string(),
                    question_type,
                });
            }
        }
    }

    let mut table: Vec<AnswerFrequency> = order
        .into_iter()
        .map(|answer| {
            let count = counts.get(&answer).copied().unwrap_or(0);
            AnswerFrequency {
                percentage: percentage(count, answered),
                answer,
                count,
            }
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts.
    table.sort_by(|a, b| b.count.cmp(&a.count));

    QuestionStats {
        question_id: question_id.to_string(),
        question_title: question_title.to_string(),
        responses: table,
    }
}

fn bump(order: &mut Vec<String>, counts: &mut HashMap<String, usize>, value: &str) {
    let trimmed = value.trim();
    if !counts.contains_key(trimmed) {
        order.push(trimmed.to_string());
    }
    *counts.entry(trimmed.to_string()).or_insert(0) += 1;
}

fn percentage(count: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        count as f64 / denominator as f64 * 100.0
    }
}
