use thiserror::Error;

use crate::events::{EventRecord, StoreError};
use crate::storage::config::ConfigError;
use crate::sync::event_mapping::EventMapper;
use crate::sync::google_api::{ApiError, CalendarApi, GoogleCalendarClient, InsertedEvent};
use crate::sync::google_auth::{AuthError, GoogleAuthenticator};

pub const PRIMARY_CALENDAR: &str = "primary";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),
    #[error("API error: {0}")]
    ApiError(#[from] ApiError),
    #[error("Event store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Inserting event {record_id} failed after {inserted} inserts: {source}")]
    InsertFailed {
        record_id: i64,
        inserted: usize,
        source: ApiError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    /// `calendars.clear` succeeded; the count isn't reported.
    Cleared,
    Deleted(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertFailure {
    pub record_id: i64,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub wiped: WipeOutcome,
    pub inserted: usize,
    pub failures: Vec<InsertFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Full wipe-and-reinsert of one calendar.
pub struct SyncEngine<A: CalendarApi> {
    api: A,
    mapper: EventMapper,
    calendar_id: String,
}

impl SyncEngine<GoogleCalendarClient> {
    pub async fn connect(
        auth: &GoogleAuthenticator,
        mapper: EventMapper,
        calendar_id: String,
    ) -> Result<Self, SyncError> {
        let token = auth.obtain_token().await?;
        let client = GoogleCalendarClient::new(token.access_token);
        Ok(Self::new(client, mapper, calendar_id))
    }
}

impl<A: CalendarApi> SyncEngine<A> {
    pub fn new(api: A, mapper: EventMapper, calendar_id: String) -> Self {
        Self {
            api,
            mapper,
            calendar_id,
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    pub async fn wipe(&self) -> Result<WipeOutcome, SyncError> {
        if self.calendar_id == PRIMARY_CALENDAR {
            self.api.clear_calendar(&self.calendar_id).await?;
            tracing::info!("Cleared calendar {}", self.calendar_id);
            return Ok(WipeOutcome::Cleared);
        }

        let ids = self.api.list_event_ids(&self.calendar_id).await?;
        for id in &ids {
            match self.api.delete_event(&self.calendar_id, id).await {
                Ok(()) => {}
                // already gone, e.g. a cancelled instance
                Err(ApiError::NotFound(_)) => {
                    tracing::debug!("Event {} vanished before delete", id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!("Deleted {} events from {}", ids.len(), self.calendar_id);
        Ok(WipeOutcome::Deleted(ids.len()))
    }

    pub async fn push_all(
        &self,
        records: &[EventRecord],
        policy: FailurePolicy,
    ) -> Result<(usize, Vec<InsertFailure>), SyncError> {
        let mut inserted = 0;
        let mut failures = Vec::new();

        for record in records {
            let body = self.mapper.to_body(record);

            match self.api.insert_event(&self.calendar_id, &body).await {
                Ok(InsertedEvent { id, .. }) => {
                    tracing::debug!("Record {} inserted as {}", record.id, id);
                    inserted += 1;
                }
                Err(source) if policy == FailurePolicy::Abort => {
                    return Err(SyncError::InsertFailed {
                        record_id: record.id,
                        inserted,
                        source,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping record {} ({}): {}", record.id, record.name, e);
                    failures.push(InsertFailure {
                        record_id: record.id,
                        name: record.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((inserted, failures))
    }

    pub async fn run(
        &self,
        records: &[EventRecord],
        policy: FailurePolicy,
    ) -> Result<SyncReport, SyncError> {
        tracing::info!(
            "Syncing {} records into calendar {}",
            records.len(),
            self.calendar_id
        );

        let wiped = self.wipe().await?;
        let (inserted, failures) = self.push_all(records, policy).await?;

        tracing::info!(
            "Sync finished: {} inserted, {} failed",
            inserted,
            failures.len()
        );

        Ok(SyncReport {
            wiped,
            inserted,
            failures,
        })
    }
}
