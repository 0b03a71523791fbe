use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use super::delivery::{scheduler, DeliveryConfigError, TriggerEvent};
use super::domain::{Survey, SurveyId, SurveyResponse, SurveyResponseSubmission, SurveyStatus};
use super::repository::{DeliveryDispatcher, DispatchError, StoreError, SurveyStore};
use super::statistics::{compute_statistics, StatisticsReport};
use super::submission::{validate_submission, FieldError};

/// Service composing the store, the statistics aggregator, the delivery
/// scheduler, and the outbound dispatcher.
///
/// All decision logic underneath is pure; the service contributes the
/// orchestration and the two pieces of store-held delivery state. Reference
/// instants come from the caller so tests control the clock.
pub struct SurveyService<S, D> {
    store: Arc<S>,
    dispatcher: Arc<D>,
}

/// What a delivery check concluded for one survey.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The survey has no delivery config (or a manual one with nothing armed).
    NotConfigured,
    /// Nothing to do yet; `next_due` is absent for manual and triggered configs.
    Idle {
        #[serde(skip_serializing_if = "Option::is_none")]
        next_due: Option<NaiveDateTime>,
    },
    /// A triggered send is armed but its instant has not arrived.
    Pending { send_at: NaiveDateTime },
    /// A send was dispatched during this check.
    Sent { sent_at: NaiveDateTime },
}

/// Summary row for survey listings, with the cached counters refreshed from
/// the aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyOverview {
    pub id: SurveyId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SurveyStatus>,
    pub response_count: usize,
    pub completion_rate: f64,
}

impl<S, D> SurveyService<S, D>
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<D>) -> Self {
        Self { store, dispatcher }
    }

    fn survey(&self, id: &SurveyId) -> Result<Survey, SurveyServiceError> {
        self.store
            .get_survey(id)?
            .ok_or(SurveyServiceError::SurveyNotFound)
    }

    /// Recompute statistics from the survey's current response set.
    pub fn statistics(&self, id: &SurveyId) -> Result<StatisticsReport, SurveyServiceError> {
        let survey = self.survey(id)?;
        let responses = self.store.list_responses(id)?;
        Ok(compute_statistics(&survey, &responses))
    }

    /// Validate and persist a submission, all-or-nothing.
    pub fn submit(
        &self,
        submission: SurveyResponseSubmission,
        now: NaiveDateTime,
    ) -> Result<SurveyResponse, SurveyServiceError> {
        let survey = self.survey(&submission.survey_id)?;
        let response = validate_submission(&survey, submission, now)
            .map_err(SurveyServiceError::Rejected)?;
        Ok(self.store.insert_response(response)?)
    }

    /// Advance the delivery cycle for one survey: release an armed triggered
    /// send whose instant has arrived, otherwise dispatch a due scheduled
    /// send, otherwise report when the next one lands.
    pub fn process_due(
        &self,
        id: &SurveyId,
        now: NaiveDateTime,
    ) -> Result<DeliveryOutcome, SurveyServiceError> {
        let survey = self.survey(id)?;
        let Some(config) = survey.delivery_config.clone() else {
            return Ok(DeliveryOutcome::NotConfigured);
        };
        config.validate()?;

        if let Some(send_at) = self.store.pending_send(id)? {
            if send_at > now {
                return Ok(DeliveryOutcome::Pending { send_at });
            }
            self.dispatcher.send(&survey, config.recipients())?;
            self.store.set_pending_send(id, None)?;
            self.store.record_sent(id, now)?;
            info!(survey = %id.0, %send_at, "triggered delivery dispatched");
            return Ok(DeliveryOutcome::Sent { sent_at: now });
        }

        let last_sent = self.store.last_sent(id)?;
        if scheduler::is_due(&config, now, last_sent) {
            self.dispatcher.send(&survey, config.recipients())?;
            self.store.record_sent(id, now)?;
            info!(survey = %id.0, "scheduled delivery dispatched");
            return Ok(DeliveryOutcome::Sent { sent_at: now });
        }

        Ok(DeliveryOutcome::Idle {
            next_due: scheduler::next_due_instant(&config, now, last_sent),
        })
    }

    /// Feed a business event to the survey's trigger, arming a delayed send
    /// when it matches. Unmatched events are ignored without error.
    pub fn handle_event(
        &self,
        id: &SurveyId,
        event: TriggerEvent,
        occurred_at: NaiveDateTime,
    ) -> Result<Option<NaiveDateTime>, SurveyServiceError> {
        let survey = self.survey(id)?;
        let Some(config) = survey.delivery_config else {
            return Ok(None);
        };
        config.validate()?;

        match scheduler::on_event(&config, event, occurred_at) {
            Some(send_at) => {
                self.store.set_pending_send(id, Some(send_at))?;
                info!(survey = %id.0, event = event.label(), %send_at, "delayed send armed");
                Ok(Some(send_at))
            }
            None => Ok(None),
        }
    }

    /// Dispatch immediately, the explicit path manual configs require.
    pub fn send_now(&self, id: &SurveyId, now: NaiveDateTime) -> Result<(), SurveyServiceError> {
        let survey = self.survey(id)?;
        let Some(config) = survey.delivery_config.clone() else {
            return Err(SurveyServiceError::NoDeliveryConfig);
        };
        self.dispatcher.send(&survey, config.recipients())?;
        self.store.record_sent(id, now)?;
        info!(survey = %id.0, "manual delivery dispatched");
        Ok(())
    }

    /// Listing rows with counters recomputed from the responses on record;
    /// any cached values on the survey itself are ignored here.
    pub fn survey_overviews(
        &self,
        status: Option<SurveyStatus>,
    ) -> Result<Vec<SurveyOverview>, SurveyServiceError> {
        let surveys = self.store.list_surveys(status)?;
        surveys
            .into_iter()
            .map(|survey| {
                let responses = self.store.list_responses(&survey.id)?;
                let report = compute_statistics(&survey, &responses);
                Ok(SurveyOverview {
                    id: survey.id,
                    title: survey.title,
                    status: survey.status,
                    response_count: report.statistics.total_responses,
                    completion_rate: report.statistics.completion_rate,
                })
            })
            .collect()
    }
}

/// Error raised by the survey service.
#[derive(Debug, thiserror::Error)]
pub enum SurveyServiceError {
    #[error("survey not found")]
    SurveyNotFound,
    #[error("survey has no delivery configuration")]
    NoDeliveryConfig,
    #[error("submission failed validation on {} field(s)", .0.len())]
    Rejected(Vec<FieldError>),
    #[error(transparent)]
    Config(#[from] DeliveryConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
