//! HTTP client for the task-tracker REST API.
//!
//! Authenticates lazily: login happens on the first request and again
//! whenever the tracker rejects the bearer token.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::agent::RunResult;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::tracker::{TaskSource, Ticket, TicketContext};

/// Authenticated session state.
#[derive(Debug, Clone)]
struct Session {
    token: String,
    user_id: String,
}

/// Task source backed by the tracker's REST API.
pub struct HttpTaskSource {
    client: Client,
    config: TrackerConfig,
    session: Mutex<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    stack_trace: Option<String>,
    #[serde(default)]
    file_hints: Vec<String>,
}

fn id_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl HttpTaskSource {
    /// Create a new tracker client. No network call until first use.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            session: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Log in and resolve the agent's user id.
    async fn authenticate(&self) -> Result<Session, TrackerError> {
        tracing::info!("authenticating with task tracker");

        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password.expose_secret(),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::AuthFailed(format!(
                "login returned {}",
                status
            )));
        }

        let login: LoginResponse = response.json().await?;
        let token = login
            .token
            .ok_or_else(|| TrackerError::AuthFailed("login response had no token".to_string()))?;

        let response = self
            .client
            .get(self.url("/api/auth/me"))
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TrackerError::AuthFailed(
                "could not resolve agent identity".to_string(),
            ));
        }

        let me: MeResponse = response.json().await?;
        let user_id = me
            .id
            .map(|v| id_to_string(&v))
            .ok_or_else(|| TrackerError::AuthFailed("/api/auth/me had no id".to_string()))?;

        tracing::info!(user_id = %user_id, "tracker authentication successful");
        Ok(Session { token, user_id })
    }

    async fn session(&self) -> Result<Session, TrackerError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = self.authenticate().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached session so the next call re-authenticates.
    async fn invalidate_session(&self) {
        *self.session.lock().await = None;
    }

    /// Post a progress comment to a ticket. Best-effort.
    pub async fn post_comment(&self, ticket_id: &str, text: &str) -> Result<(), TrackerError> {
        let session = self.session().await?;
        let response = self
            .client
            .post(self.url(&format!("/api/tasks/{}/comments", ticket_id)))
            .bearer_auth(&session.token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            self.invalidate_session().await;
        }
        if !status.is_success() {
            return Err(TrackerError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Move a ticket to a new status.
    pub async fn update_status(&self, ticket_id: &str, status: &str) -> Result<(), TrackerError> {
        let session = self.session().await?;
        let response = self
            .client
            .patch(self.url(&format!("/api/tasks/{}", ticket_id)))
            .bearer_auth(&session.token)
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;

        let code = response.status();
        if code.as_u16() == 401 {
            self.invalidate_session().await;
        }
        if !code.is_success() {
            return Err(TrackerError::Api {
                status: code.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn fetch_next_ticket(&self) -> Result<Option<Ticket>, TrackerError> {
        let session = self.session().await?;

        let response = self
            .client
            .get(self.url(&format!(
                "/api/projects/{}/tasks?assignedToUserId={}",
                self.config.project_id, session.user_id
            )))
            .bearer_auth(&session.token)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            self.invalidate_session().await;
            return Err(TrackerError::AuthFailed("token rejected".to_string()));
        }
        if !status.is_success() {
            return Err(TrackerError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let tasks: Vec<RawTask> = response
            .json()
            .await
            .map_err(|e| TrackerError::MalformedResponse(e.to_string()))?;

        // The tracker has no server-side status filter; filter here.
        let next = tasks.into_iter().find(|t| {
            t.status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("open"))
        });

        Ok(next.map(|raw| {
            let stack_trace = raw.stack_trace.filter(|s| !s.trim().is_empty());
            let context = if stack_trace.is_some() || !raw.file_hints.is_empty() {
                Some(TicketContext {
                    stack_trace,
                    file_hints: raw.file_hints,
                })
            } else {
                None
            };
            Ticket {
                id: id_to_string(&raw.id),
                title: raw.title.unwrap_or_default(),
                body: raw.description.unwrap_or_default(),
                context,
            }
        }))
    }

    async fn report_outcome(
        &self,
        ticket_id: &str,
        result: &RunResult,
    ) -> Result<(), TrackerError> {
        let comment = match (&result.summary, &result.abort_reason) {
            (Some(summary), _) => format!("Job done.\n\nSummary:\n{}", summary),
            (None, Some(reason)) => format!("Run aborted: {}.", reason),
            (None, None) => "Run finished without a summary.".to_string(),
        };
        self.post_comment(ticket_id, &comment).await?;

        let status = if result.success {
            &self.config.review_status
        } else {
            &self.config.failed_status
        };
        self.update_status(ticket_id, status).await
    }
}
