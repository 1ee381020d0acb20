use tracing::{error, info};

use crate::auth::Session;
use crate::backend::SchoolApiClient;
use crate::error::ActionError;
use crate::models::{Notice, Period, PeriodDraft, PeriodId};
use crate::validation::validate_period_draft;

pub const DELETE_PERIOD_PROMPT: &str =
    "Are you sure you want to delete this period? This might affect existing timetables.";

/// Interactive confirmation for destructive actions.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

impl Confirm for bool {
    fn confirm(&mut self, _prompt: &str) -> bool {
        *self
    }
}

/// One caller's view of the school's periods.
///
/// Mutations never patch the local list: every successful create, update or
/// delete (and every delete attempt) is followed by a full re-fetch.
pub struct PeriodRegistry<'a> {
    client: &'a SchoolApiClient,
    session: &'a Session,
    periods: Vec<Period>,
}

impl<'a> PeriodRegistry<'a> {
    pub fn new(client: &'a SchoolApiClient, session: &'a Session) -> Self {
        Self {
            client,
            session,
            periods: Vec::new(),
        }
    }

    /// Replaces the local list with the backend's, sorted by `order`.
    /// On failure the previous list is kept.
    pub async fn refresh(&mut self) -> Result<&[Period], ActionError> {
        match self.client.list_periods(self.session).await {
            Ok(mut periods) => {
                periods.sort_by_key(|p| p.order);
                self.periods = periods;
                Ok(&self.periods)
            }
            Err(err) => {
                error!(error = %err, "failed to load periods");
                Err(ActionError::backend("Failed to load periods", err))
            }
        }
    }

    pub fn list(&self) -> &[Period] {
        &self.periods
    }

    pub fn get(&self, id: PeriodId) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    /// Suggested order for a new period. Uniqueness is left to the backend.
    pub fn next_order(&self) -> i32 {
        i32::try_from(self.periods.len()).map_or(i32::MAX, |n| n.saturating_add(1))
    }

    pub fn draft(&self) -> PeriodDraft {
        PeriodDraft {
            order: Some(self.next_order()),
            ..PeriodDraft::default()
        }
    }

    pub fn edit_draft(&self, id: PeriodId) -> Option<PeriodDraft> {
        self.get(id).map(PeriodDraft::from)
    }

    pub async fn create(&mut self, draft: &PeriodDraft) -> Result<Notice, ActionError> {
        let period = validate_period_draft(draft)?;
        if let Err(err) = self.client.create_period(self.session, &period).await {
            error!(error = %err, name = %period.name, "failed to create period");
            let message = err.detail().unwrap_or("Operation failed").to_string();
            return Err(ActionError::backend(message, err));
        }
        info!(name = %period.name, order = period.order, "period created");
        self.resync().await;
        Ok(Notice::PeriodCreated)
    }

    pub async fn update(&mut self, id: PeriodId, draft: &PeriodDraft) -> Result<Notice, ActionError> {
        let period = validate_period_draft(draft)?;
        if let Err(err) = self.client.update_period(self.session, id, &period).await {
            error!(error = %err, id, "failed to update period");
            let message = err.detail().unwrap_or("Operation failed").to_string();
            return Err(ActionError::backend(message, err));
        }
        info!(id, "period updated");
        self.resync().await;
        Ok(Notice::PeriodUpdated)
    }

    /// Deletes after confirmation. The list is re-fetched whether or not the
    /// backend accepted the delete.
    pub async fn delete<C: Confirm>(&mut self, id: PeriodId, mut confirm: C) -> Result<Notice, ActionError> {
        if !confirm.confirm(DELETE_PERIOD_PROMPT) {
            return Err(ActionError::Cancelled);
        }
        let result = self.client.delete_period(self.session, id).await;
        self.resync().await;
        match result {
            Ok(()) => {
                info!(id, "period deleted");
                Ok(Notice::PeriodDeleted)
            }
            Err(err) => {
                error!(error = %err, id, "failed to delete period");
                Err(ActionError::backend("Failed to delete period", err))
            }
        }
    }

    async fn resync(&mut self) {
        // refresh already logged the failure; the mutation outcome stands
        let _ = self.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;
    use url::Url;

    use super::*;

    fn periods_json() -> serde_json::Value {
        json!([
            {"id": 2, "name": "Period 2", "start_time": "09:00:00", "end_time": "09:45:00", "is_break": false, "order": 2},
            {"id": 1, "name": "Period 1", "start_time": "08:00:00", "end_time": "08:45:00", "is_break": false, "order": 1}
        ])
    }

    fn client(server: &MockServer) -> SchoolApiClient {
        SchoolApiClient::new(Url::parse(&server.base_url()).unwrap())
    }

    #[tokio::test]
    async fn test_refresh_sorts_and_suggests_order() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/academic/periods/");
            then.status(200).json_body(periods_json());
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);
        assert_eq!(registry.next_order(), 1);

        registry.refresh().await.unwrap();
        let names: Vec<&str> = registry.list().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Period 1", "Period 2"]);
        assert_eq!(registry.next_order(), 3);
        assert_eq!(registry.draft().order, Some(3));
        assert_eq!(registry.edit_draft(2).unwrap().start_time, "09:00:00");
        assert!(registry.edit_draft(42).is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_list() {
        let server = MockServer::start();
        let mut ok = server.mock(|when, then| {
            when.method(GET).path("/academic/periods/");
            then.status(200).json_body(periods_json());
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);
        registry.refresh().await.unwrap();

        ok.delete();
        server.mock(|when, then| {
            when.method(GET).path("/academic/periods/");
            then.status(500);
        });
        let err = registry.refresh().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to load periods");
        assert_eq!(registry.list().len(), 2);
    }

    #[tokio::test]
    async fn test_create_posts_then_refetches() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/academic/periods/")
                .json_body(json!({
                    "name": "Lunch", "start_time": "12:00:00", "end_time": "12:30:00",
                    "is_break": true, "order": 3
                }));
            then.status(201).json_body(json!({
                "id": 3, "name": "Lunch", "start_time": "12:00:00",
                "end_time": "12:30:00", "is_break": true, "order": 3
            }));
        });
        let list = server.mock(|when, then| {
            when.method(GET).path("/academic/periods/");
            then.status(200).json_body(periods_json());
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);

        let draft = PeriodDraft {
            name: "Lunch".into(),
            start_time: "12:00".into(),
            end_time: "12:30".into(),
            is_break: true,
            order: Some(3),
        };
        let notice = registry.create(&draft).await.unwrap();
        assert_eq!(notice, Notice::PeriodCreated);
        post.assert();
        list.assert();
    }

    #[tokio::test]
    async fn test_create_resyncs_when_response_body_is_odd() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/academic/periods/");
            then.status(201).json_body(json!({
                "id": 3, "name": "Lunch", "start_time": "12:00:00.000001",
                "end_time": "12:30:00.000001", "is_break": true, "order": 3
            }));
        });
        let list = server.mock(|when, then| {
            when.method(GET).path("/academic/periods/");
            then.status(200).json_body(periods_json());
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);

        let draft = PeriodDraft {
            name: "Lunch".into(),
            start_time: "12:00".into(),
            end_time: "12:30".into(),
            is_break: true,
            order: Some(3),
        };
        assert_eq!(registry.create(&draft).await.unwrap(), Notice::PeriodCreated);
        list.assert();
        assert_eq!(registry.list().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_draft_sends_nothing() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST).path("/academic/periods/");
            then.status(201);
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);

        let err = registry.create(&PeriodDraft::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::Invalid(_)));
        assert_eq!(post.hits(), 0);
    }

    #[tokio::test]
    async fn test_update_surfaces_backend_detail() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/academic/periods/1/");
            then.status(400)
                .json_body(json!({"detail": "Order already used"}));
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);
        let draft = PeriodDraft {
            name: "Period 1".into(),
            start_time: "08:00".into(),
            end_time: "08:45".into(),
            is_break: false,
            order: Some(2),
        };
        let err = registry.update(1, &draft).await.unwrap_err();
        assert_eq!(err.to_string(), "Order already used");
    }

    #[tokio::test]
    async fn test_delete_declined_sends_nothing() {
        let server = MockServer::start();
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/academic/periods/1/");
            then.status(204);
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);

        let mut prompts = Vec::new();
        let err = registry
            .delete(1, |prompt: &str| {
                prompts.push(prompt.to_string());
                false
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Cancelled));
        assert_eq!(prompts, vec![DELETE_PERIOD_PROMPT.to_string()]);
        assert_eq!(delete.hits(), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_still_refetches() {
        let server = MockServer::start();
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/academic/periods/1/");
            then.status(500);
        });
        let list = server.mock(|when, then| {
            when.method(GET).path("/academic/periods/");
            then.status(200).json_body(periods_json());
        });
        let client = client(&server);
        let session = Session::new("t");
        let mut registry = PeriodRegistry::new(&client, &session);

        let err = registry.delete(1, true).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete period");
        delete.assert();
        list.assert();
        assert_eq!(registry.list().len(), 2);
    }
}
