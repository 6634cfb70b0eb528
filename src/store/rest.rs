use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::core::clock;
use crate::core::task::{OwnerId, Task, TaskId, TaskPatch};

use super::{StoreError, TaskStore, TaskWatch};

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize)]
struct CreatedDoc {
    id: TaskId,
}

/// JSON client for the remote document store's `tasks` collection. Change
/// notification is interval polling: each watch re-runs its query and pushes
/// a snapshot whenever the result differs from the last one delivered.
#[derive(Clone)]
pub struct RestStore {
    base_url: String,
    http: Client,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(base_url: &str, poll_interval: Duration) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            poll_interval,
        })
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn doc_url(&self, id: TaskId) -> String {
        format!("{}/tasks/{}", self.base_url, id)
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Vec<Task>, StoreError> {
        let resp = self
            .http
            .get(self.tasks_url())
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for(status, &body));
        }

        Ok(resp.json().await?)
    }

    fn day_params(owner: &OwnerId, day: NaiveDate) -> Vec<(&'static str, String)> {
        let (start, end) = clock::day_bounds(day);
        vec![
            ("owner", owner.0.clone()),
            ("from", format_wire(start)),
            ("to", format_wire(end)),
            ("order", "due".to_string()),
        ]
    }

    fn spawn_poll(&self, params: Vec<(&'static str, String)>, first: Vec<Task>) -> TaskWatch {
        let store = self.clone();
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            let mut last = first.clone();
            if tx.send(first).await.is_err() {
                return;
            }
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                match store.query(&params).await {
                    Ok(tasks) => {
                        if tasks != last {
                            last = tasks.clone();
                            if tx.send(tasks).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        // Transient poll failures keep the last snapshot alive
                        log::warn!("task watch poll failed: {e}");
                    }
                }
            }
        });

        TaskWatch::new(rx, handle)
    }
}

fn format_wire(at: NaiveDateTime) -> String {
    at.format(WIRE_FORMAT).to_string()
}

fn error_for(status: StatusCode, body: &str) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied,
        StatusCode::BAD_REQUEST => StoreError::BadQuery(body.to_string()),
        _ => StoreError::Transport(format!("store returned {status}: {body}")),
    }
}

impl TaskStore for RestStore {
    async fn create(&self, task: &Task) -> Result<TaskId, StoreError> {
        let resp = self.http.post(self.tasks_url()).json(task).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for(status, &body));
        }
        let created: CreatedDoc = resp.json().await?;
        Ok(created.id)
    }

    async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        let resp = self.http.patch(self.doc_url(id)).json(patch).send().await?;
        let status = resp.status();
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id)),
            s => {
                let body = resp.text().await.unwrap_or_default();
                Err(error_for(s, &body))
            }
        }
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        let resp = self.http.delete(self.doc_url(id)).send().await?;
        let status = resp.status();
        match status {
            s if s.is_success() => Ok(()),
            // Deleting what's already gone is fine
            StatusCode::NOT_FOUND => Ok(()),
            s => {
                let body = resp.text().await.unwrap_or_default();
                Err(error_for(s, &body))
            }
        }
    }

    async fn tasks_for_day(
        &self,
        owner: &OwnerId,
        day: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        self.query(&Self::day_params(owner, day)).await
    }

    async fn tasks_for_owner(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        self.query(&[("owner", owner.0.clone())]).await
    }

    async fn completed_tasks(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        self.query(&[
            ("owner", owner.0.clone()),
            ("status", "completed".to_string()),
            ("order", "-due".to_string()),
        ])
        .await
    }

    async fn find_by_text(&self, owner: &OwnerId, text: &str) -> Result<Vec<Task>, StoreError> {
        self.query(&[("owner", owner.0.clone()), ("text", text.to_string())])
            .await
    }

    async fn watch_day(&self, owner: &OwnerId, day: NaiveDate) -> Result<TaskWatch, StoreError> {
        let params = Self::day_params(owner, day);
        // Validate the query up front so index/permission errors surface to
        // the caller instead of dying inside the poll loop.
        let first = self.query(&params).await?;
        Ok(self.spawn_poll(params, first))
    }

    async fn watch_owner(&self, owner: &OwnerId) -> Result<TaskWatch, StoreError> {
        let params = vec![("owner", owner.0.clone())];
        let first = self.query(&params).await?;
        Ok(self.spawn_poll(params, first))
    }
}
