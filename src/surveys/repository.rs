use chrono::NaiveDateTime;

use super::domain::{Survey, SurveyId, SurveyResponse, SurveyStatus};

/// Storage abstraction so the service can be exercised against in-memory
/// doubles. Read calls must return a consistent snapshot; the aggregator is
/// handed the full response set in one piece and never re-enters the store.
///
/// Besides surveys and responses, the store keeps the two per-survey delivery
/// facts the scheduler cannot hold itself: the last sent instant and an armed
/// pending send.
pub trait SurveyStore: Send + Sync {
    fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError>;
    fn list_surveys(&self, status: Option<SurveyStatus>) -> Result<Vec<Survey>, StoreError>;
    fn list_responses(&self, id: &SurveyId) -> Result<Vec<SurveyResponse>, StoreError>;
    fn insert_response(&self, response: SurveyResponse) -> Result<SurveyResponse, StoreError>;
    fn last_sent(&self, id: &SurveyId) -> Result<Option<NaiveDateTime>, StoreError>;
    fn record_sent(&self, id: &SurveyId, sent_at: NaiveDateTime) -> Result<(), StoreError>;
    fn pending_send(&self, id: &SurveyId) -> Result<Option<NaiveDateTime>, StoreError>;
    fn set_pending_send(
        &self,
        id: &SurveyId,
        send_at: Option<NaiveDateTime>,
    ) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery hook (an e-mail adapter in production). The scheduler
/// decides, this trait acts; it never retries on its own.
pub trait DeliveryDispatcher: Send + Sync {
    fn send(&self, survey: &Survey, recipients: &[String]) -> Result<(), DispatchError>;
}

/// Delivery transport error.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("delivery transport unavailable: {0}")]
    Transport(String),
}
