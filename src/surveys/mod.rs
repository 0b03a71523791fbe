//! Survey statistics aggregation and delivery scheduling.
//!
//! Everything underneath is pure computation over records handed in by the
//! store; persistence and the outbound e-mail transport stay behind the
//! [`repository`] traits.

pub mod delivery;
pub mod domain;
pub mod import;
pub mod repository;
pub mod router;
pub mod service;
pub mod statistics;
pub mod submission;

pub use delivery::{
    is_due, next_due_instant, on_event, DeliveryConfig, DeliveryConfigError, DeliverySchedule,
    DeliveryTrigger, ScheduleCadence, TriggerEvent,
};
pub use domain::{
    AnswerValue, QuestionResponse, QuestionSettings, QuestionType, Survey, SurveyId,
    SurveyQuestion, SurveyResponse, SurveyResponseSubmission, SurveyStatus,
};
pub use import::{ImportError, ResponseCsvImporter};
pub use repository::{DeliveryDispatcher, DispatchError, StoreError, SurveyStore};
pub use router::survey_router;
pub use service::{DeliveryOutcome, SurveyOverview, SurveyService, SurveyServiceError};
pub use statistics::{
    compute_statistics, AnswerFrequency, QuestionStats, ShapeIssue, StatisticsReport,
    SurveyStatistics,
};
pub use submission::{validate_submission, FieldError, FieldErrorKind};
