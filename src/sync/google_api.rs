use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::sync::event_mapping::EventBody;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Authentication failed")]
    AuthenticationFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertedEvent {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventIdList {
    #[serde(default)]
    items: Vec<EventId>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventId {
    id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// `calendars.clear`; Google only accepts this for primary calendars.
    async fn clear_calendar(&self, calendar_id: &str) -> Result<(), ApiError>;

    async fn list_event_ids(&self, calendar_id: &str) -> Result<Vec<String>, ApiError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ApiError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<InsertedEvent, ApiError>;
}

pub struct GoogleCalendarClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl GoogleCalendarClient {
    pub fn new(access_token: String) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn calendar_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}", self.base_url, urlencoding::encode(calendar_id))
    }

    /// Maps non-success statuses onto `ApiError`.
    async fn check(response: Response, what: &str) -> Result<Response, ApiError> {
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::error!("Authentication failed for {}", what);
                Err(ApiError::AuthenticationFailed)
            }
            StatusCode::NOT_FOUND => {
                tracing::error!("Not found: {}", what);
                Err(ApiError::NotFound(what.to_string()))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Rate limit exceeded during {}", what);
                Err(ApiError::RateLimited)
            }
            s if !s.is_success() => {
                let body = response.text().await?;
                tracing::error!("{} failed. Status: {}, Body: {}", what, status, body);
                Err(ApiError::RequestError(format!("Status {}: {}", status, body)))
            }
            _ => Ok(response),
        }
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn clear_calendar(&self, calendar_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/clear", self.calendar_url(calendar_id));

        tracing::info!("Clearing calendar {}", calendar_id);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.access_token)
            .body("")
            .send()
            .await?;

        Self::check(response, &format!("calendar {}", calendar_id)).await?;
        Ok(())
    }

    async fn list_event_ids(&self, calendar_id: &str) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/events", self.calendar_url(calendar_id));
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("fields", "items(id),nextPageToken".to_string()),
                ("maxResults", "2500".to_string()),
                ("showDeleted", "false".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self.client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await?;

            let response = Self::check(response, &format!("calendar {}", calendar_id)).await?;
            let page: EventIdList = response.json().await?;
            ids.extend(page.items.into_iter().map(|item| item.id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!("Listed {} events in {}", ids.len(), calendar_id);
        Ok(ids)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}/events/{}",
            self.calendar_url(calendar_id),
            urlencoding::encode(event_id)
        );

        let response = self.client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Self::check(response, &format!("event {}", event_id)).await?;
        tracing::debug!("Deleted event {}", event_id);
        Ok(())
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<InsertedEvent, ApiError> {
        let url = format!("{}/events", self.calendar_url(calendar_id));

        tracing::info!("Creating event: {} on {}", body.summary, body.start.date_time);
        tracing::debug!("POST {} with payload: {:?}", url, body);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let response = Self::check(response, &format!("calendar {}", calendar_id)).await?;
        let created: InsertResponse = response.json().await?;
        let id = created.id.unwrap_or_default();
        tracing::info!("Event created successfully with ID: {:?}", id);

        Ok(InsertedEvent { id })
    }
}
