//! Submission validation through the public facade and the HTTP router.

mod common {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, NaiveDateTime};
    use survey_pulse::surveys::{
        AnswerValue, DeliveryDispatcher, DispatchError, QuestionSettings, QuestionType,
        StoreError, Survey, SurveyId, SurveyQuestion, SurveyResponse, SurveyResponseSubmission,
        SurveyStatus, SurveyStore,
    };

    pub(super) fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .expect("valid date")
            .and_hms_opt(14, 0, 0)
            .expect("valid time")
    }

    pub(super) fn survey() -> Survey {
        Survey {
            id: SurveyId("sv-onboarding".to_string()),
            title: "Onboarding feedback".to_string(),
            description: Some("Sent after the first month".to_string()),
            questions: vec![
                SurveyQuestion {
                    id: "q-score".to_string(),
                    title: "Overall score".to_string(),
                    description: None,
                    question_type: QuestionType::Rating,
                    required: true,
                    options: Vec::new(),
                    settings: Some(QuestionSettings {
                        min: Some(1),
                        max: Some(5),
                    }),
                },
                SurveyQuestion {
                    id: "q-team".to_string(),
                    title: "Which teams did you work with?".to_string(),
                    description: None,
                    question_type: QuestionType::MultiChoice,
                    required: false,
                    options: vec!["Sales".to_string(), "Support".to_string()],
                    settings: None,
                },
                SurveyQuestion {
                    id: "q-notes".to_string(),
                    title: "Anything else?".to_string(),
                    description: None,
                    question_type: QuestionType::ShortText,
                    required: false,
                    options: Vec::new(),
                    settings: None,
                },
            ],
            created_at: now(),
            updated_at: None,
            status: Some(SurveyStatus::Active),
            response_count: None,
            completion_rate: None,
            delivery_config: None,
        }
    }

    pub(super) fn submission(answers: BTreeMap<String, AnswerValue>) -> SurveyResponseSubmission {
        SurveyResponseSubmission {
            survey_id: SurveyId("sv-onboarding".to_string()),
            respondent_name: "Ada Fox".to_string(),
            respondent_email: "ada@example.com".to_string(),
            respondent_phone: None,
            respondent_company: Some("Fox & Co".to_string()),
            answers,
            is_existing_client: Some(true),
            existing_client_id: Some("client-042".to_string()),
            completion_time: Some(120),
            submitted_at: None,
        }
    }

    pub(super) fn single(value: &str) -> AnswerValue {
        AnswerValue::Single(value.to_string())
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryStore {
        surveys: Arc<Mutex<HashMap<String, Survey>>>,
        responses: Arc<Mutex<HashMap<String, Vec<SurveyResponse>>>>,
        last_sent: Arc<Mutex<HashMap<String, NaiveDateTime>>>,
        pending: Arc<Mutex<HashMap<String, NaiveDateTime>>>,
    }

    impl MemoryStore {
        pub(super) fn with_survey(survey: Survey) -> Self {
            let store = Self::default();
            store
                .surveys
                .lock()
                .expect("store mutex poisoned")
                .insert(survey.id.0.clone(), survey);
            store
        }

        pub(super) fn stored_responses(&self, survey_id: &str) -> Vec<SurveyResponse> {
            self.responses
                .lock()
                .expect("store mutex poisoned")
                .get(survey_id)
                .cloned()
                .unwrap_or_default()
        }
    }

    impl SurveyStore for MemoryStore {
        fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
            Ok(self
                .surveys
                .lock()
                .expect("store mutex poisoned")
                .get(&id.0)
                .cloned())
        }

        fn list_surveys(
            &self,
            status: Option<SurveyStatus>,
        ) -> Result<Vec<Survey>, StoreError> {
            Ok(self
                .surveys
                .lock()
                .expect("store mutex poisoned")
                .values()
                .filter(|survey| status.is_none() || survey.status == status)
                .cloned()
                .collect())
        }

        fn list_responses(&self, id: &SurveyId) -> Result<Vec<SurveyResponse>, StoreError> {
            Ok(self.stored_responses(&id.0))
        }

        fn insert_response(
            &self,
            response: SurveyResponse,
        ) -> Result<SurveyResponse, StoreError> {
            self.responses
                .lock()
                .expect("store mutex poisoned")
                .entry(response.survey_id.0.clone())
                .or_default()
                .push(response.clone());
            Ok(response)
        }

        fn last_sent(&self, id: &SurveyId) -> Result<Option<NaiveDateTime>, StoreError> {
            Ok(self
                .last_sent
                .lock()
                .expect("store mutex poisoned")
                .get(&id.0)
                .copied())
        }

        fn record_sent(&self, id: &SurveyId, sent_at: NaiveDateTime) -> Result<(), StoreError> {
            self.last_sent
                .lock()
                .expect("store mutex poisoned")
                .insert(id.0.clone(), sent_at);
            Ok(())
        }

        fn pending_send(&self, id: &SurveyId) -> Result<Option<NaiveDateTime>, StoreError> {
            Ok(self
                .pending
                .lock()
                .expect("store mutex poisoned")
                .get(&id.0)
                .copied())
        }

        fn set_pending_send(
            &self,
            id: &SurveyId,
            send_at: Option<NaiveDateTime>,
        ) -> Result<(), StoreError> {
            let mut guard = self.pending.lock().expect("store mutex poisoned");
            match send_at {
                Some(send_at) => {
                    guard.insert(id.0.clone(), send_at);
                }
                None => {
                    guard.remove(&id.0);
                }
            }
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    pub(super) struct NullDispatcher;

    impl DeliveryDispatcher for NullDispatcher {
        fn send(&self, _survey: &Survey, _recipients: &[String]) -> Result<(), DispatchError> {
            Ok(())
        }
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{now, single, submission, survey, MemoryStore, NullDispatcher};
use survey_pulse::surveys::{
    survey_router, validate_submission, AnswerValue, FieldErrorKind, SurveyService,
    SurveyServiceError,
};
use tower::util::ServiceExt;

fn answers(entries: &[(&str, AnswerValue)]) -> BTreeMap<String, AnswerValue> {
    entries
        .iter()
        .map(|(id, value)| (id.to_string(), value.clone()))
        .collect()
}

#[test]
fn conforming_submission_freezes_into_an_ordered_response() {
    let survey = survey();
    let submission = submission(answers(&[
        ("q-notes", single("smooth rollout")),
        (
            "q-team",
            AnswerValue::Multiple(vec!["Sales".to_string(), "Support".to_string()]),
        ),
        ("q-score", single("4")),
    ]));

    let response = validate_submission(&survey, submission, now()).expect("submission accepted");

    // Answers land in survey question order regardless of map order.
    let order: Vec<&str> = response
        .answers
        .iter()
        .map(|answer| answer.question_id.as_str())
        .collect();
    assert_eq!(order, vec!["q-score", "q-team", "q-notes"]);
    assert!(response.answers.iter().all(|answer| answer.is_valid));

    // Denormalized copies freeze the current labeling.
    assert_eq!(response.answers[0].question_title, "Overall score");
    assert_eq!(response.submitted_at, now());
    assert_eq!(response.completion_time, Some(120));
}

#[test]
fn missing_required_answer_rejects_the_whole_submission() {
    let survey = survey();
    let submission = submission(answers(&[("q-notes", single("fine"))]));

    let errors = validate_submission(&survey, submission, now()).expect_err("rejected");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].question_id, "q-score");
    assert_eq!(errors[0].kind, FieldErrorKind::MissingRequired);
}

#[test]
fn constraint_violations_and_unknown_questions_are_all_reported() {
    let survey = survey();
    let submission = submission(answers(&[
        ("q-score", single("9")),
        ("q-team", single("Engineering")),
        ("q-legacy", single("orphan")),
    ]));

    let errors = validate_submission(&survey, submission, now()).expect_err("rejected");
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().any(|error| error.question_id == "q-score"
        && error.kind == FieldErrorKind::AboveMaximum { value: 9, max: 5 }));
    assert!(errors.iter().any(|error| error.question_id == "q-team"
        && error.kind
            == FieldErrorKind::NotAnOption {
                value: "Engineering".to_string(),
            }));
    assert!(errors.iter().any(|error| error.question_id == "q-legacy"
        && error.kind == FieldErrorKind::UnknownQuestion));
}

#[test]
fn blank_answers_count_as_missing() {
    let survey = survey();
    let submission = submission(answers(&[("q-score", single("   "))]));

    let errors = validate_submission(&survey, submission, now()).expect_err("rejected");
    assert_eq!(errors[0].kind, FieldErrorKind::MissingRequired);
}

#[test]
fn service_persists_accepted_submissions_all_or_nothing() {
    let store = MemoryStore::with_survey(survey());
    let service = SurveyService::new(Arc::new(store.clone()), Arc::new(NullDispatcher));

    let rejected = service.submit(submission(answers(&[])), now());
    assert!(matches!(rejected, Err(SurveyServiceError::Rejected(_))));
    assert!(store.stored_responses("sv-onboarding").is_empty());

    let accepted = service
        .submit(submission(answers(&[("q-score", single("5"))])), now())
        .expect("submission accepted");
    assert_eq!(accepted.survey_id.0, "sv-onboarding");
    assert_eq!(store.stored_responses("sv-onboarding").len(), 1);
}

#[tokio::test]
async fn router_round_trip_submit_then_statistics() {
    let store = MemoryStore::with_survey(survey());
    let service = Arc::new(SurveyService::new(
        Arc::new(store),
        Arc::new(NullDispatcher),
    ));
    let app = survey_router(service);

    let body = serde_json::json!({
        "survey_id": "sv-onboarding",
        "respondent_name": "Ada Fox",
        "respondent_email": "ada@example.com",
        "answers": { "q-score": "5", "q-team": ["Sales"] },
        "completion_time": 95,
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/surveys/sv-onboarding/responses")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds");
    let response = app.clone().oneshot(request).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);

    let request = Request::builder()
        .uri("/api/v1/surveys/sv-onboarding/statistics")
        .body(Body::empty())
        .expect("request builds");
    let response = app.clone().oneshot(request).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
    assert_eq!(payload["statistics"]["total_responses"], 1);
    assert_eq!(payload["statistics"]["completion_rate"], 100.0);
}

#[tokio::test]
async fn router_rejects_invalid_submissions_with_field_errors() {
    let store = MemoryStore::with_survey(survey());
    let service = Arc::new(SurveyService::new(
        Arc::new(store),
        Arc::new(NullDispatcher),
    ));
    let app = survey_router(service);

    let body = serde_json::json!({
        "survey_id": "sv-onboarding",
        "respondent_name": "Sam Hale",
        "respondent_email": "sam@example.com",
        "answers": { "q-team": ["Sales"] },
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/surveys/sv-onboarding/responses")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds");
    let response = app.oneshot(request).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
    assert_eq!(payload["field_errors"][0]["question_id"], "q-score");
    assert_eq!(payload["field_errors"][0]["kind"], "missing_required");
}
