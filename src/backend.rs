use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::auth::Session;
use crate::models::{
    EntryDraft, EntryId, NewPeriod, Period, PeriodId, TimetableEntry, TimetableFilter,
};

const PERIODS: &str = "academic/periods/";
const TIMETABLE: &str = "academic/timetable/";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Backend responded {status}: {detail}")]
    Status {
        status: StatusCode,
        detail: String,
        non_field_error: Option<String>,
    },
}

impl BackendError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Http(err) => err.status(),
            BackendError::Url(_) => None,
        }
    }

    /// Backend-provided explanation, if the response carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Status { detail, .. } if !detail.is_empty() => Some(detail),
            _ => None,
        }
    }

    /// Cross-field validation message first, then the general detail.
    pub fn validation_message(&self) -> Option<&str> {
        match self {
            BackendError::Status {
                non_field_error: Some(message),
                ..
            } => Some(message),
            _ => self.detail(),
        }
    }
}

/// Lists come back either bare or wrapped in a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Plain(Vec<T>),
    Paged {
        #[serde(default = "Vec::new")]
        results: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Plain(items) => items,
            Listing::Paged { results } => results,
        }
    }
}

fn non_field_error(map: &Map<String, Value>) -> Option<&str> {
    map.get("non_field_errors")
        .and_then(|v| v.get(0))
        .and_then(Value::as_str)
}

/// Picks the most specific message out of an error body:
/// `detail`, `message`, `error`, `non_field_errors[0]`, then the first field error.
pub fn error_detail(body: &str) -> String {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return String::new();
    };
    for key in ["detail", "message", "error"] {
        if let Some(Value::String(text)) = map.get(key) {
            return text.clone();
        }
    }
    if let Some(text) = non_field_error(&map) {
        return text.to_string();
    }
    map.iter()
        .find_map(|(field, value)| {
            let text = match value {
                Value::Array(items) => items.first()?.as_str()?,
                Value::String(text) => text.as_str(),
                _ => return None,
            };
            Some(format!("{field}: {text}"))
        })
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct SchoolApiClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
}

impl SchoolApiClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
        }
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Arc::new(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    fn item(&self, collection: &str, id: i64) -> Result<Url, BackendError> {
        self.endpoint(&format!("{collection}{id}/"))
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let non_field_error = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => non_field_error(&map).map(str::to_string),
            _ => None,
        };
        Err(BackendError::Status {
            status,
            detail: error_detail(&body),
            non_field_error,
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        session: &Session,
    ) -> Result<T, BackendError> {
        let response = request.bearer_auth(session.access_token()).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn execute(&self, request: RequestBuilder, session: &Session) -> Result<(), BackendError> {
        let response = request.bearer_auth(session.access_token()).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn list_periods(&self, session: &Session) -> Result<Vec<Period>, BackendError> {
        let url = self.endpoint(PERIODS)?;
        let listing: Listing<Period> = self.fetch(self.client.get(url), session).await?;
        Ok(listing.into_vec())
    }

    pub async fn create_period(
        &self,
        session: &Session,
        period: &NewPeriod,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(PERIODS)?;
        self.execute(self.client.post(url).json(period), session).await
    }

    pub async fn update_period(
        &self,
        session: &Session,
        id: PeriodId,
        period: &NewPeriod,
    ) -> Result<(), BackendError> {
        let url = self.item(PERIODS, id)?;
        self.execute(self.client.patch(url).json(period), session).await
    }

    pub async fn delete_period(&self, session: &Session, id: PeriodId) -> Result<(), BackendError> {
        let url = self.item(PERIODS, id)?;
        self.execute(self.client.delete(url), session).await
    }

    pub async fn list_entries(
        &self,
        session: &Session,
        filter: &TimetableFilter,
    ) -> Result<Vec<TimetableEntry>, BackendError> {
        let mut url = self.endpoint(TIMETABLE)?;
        let pairs = filter.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        let listing: Listing<TimetableEntry> = self.fetch(self.client.get(url), session).await?;
        Ok(listing.into_vec())
    }

    pub async fn create_entry(
        &self,
        session: &Session,
        entry: &EntryDraft,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(TIMETABLE)?;
        self.execute(self.client.post(url).json(entry), session).await
    }

    pub async fn update_entry(
        &self,
        session: &Session,
        id: EntryId,
        entry: &EntryDraft,
    ) -> Result<(), BackendError> {
        let url = self.item(TIMETABLE, id)?;
        self.execute(self.client.patch(url).json(entry), session).await
    }

    pub async fn delete_entry(&self, session: &Session, id: EntryId) -> Result<(), BackendError> {
        let url = self.item(TIMETABLE, id)?;
        self.execute(self.client.delete(url), session).await
    }
}
