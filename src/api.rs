use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Request};
use reqwest::header::USER_AGENT;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;
use crate::game::EndedReport;
use crate::keylog::ANONYMOUS;
use crate::keystroke::KeystrokeStats;
use crate::session::WritingSession;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives session lifecycle notifications
pub trait SessionNotifier: Send {
    fn session_started(&self, session: &WritingSession) -> Result<(), ApiError>;
    fn session_ended(&self, report: &EndedReport) -> Result<(), ApiError>;
}

/// Supplies the current access token; empty for anonymous use
pub trait TokenProvider: Send {
    fn access_token(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn access_token(&self) -> String {
        self.0.clone()
    }
}

/// Reads `ANKY_ACCESS_TOKEN` every time a token is needed
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvToken;

impl TokenProvider for EnvToken {
    fn access_token(&self) -> String {
        std::env::var("ANKY_ACCESS_TOKEN").unwrap_or_default()
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StartedPayload<'a> {
    pub session_id: &'a str,
    pub user_id: &'a str,
    pub starting_timestamp: Option<DateTime<Utc>>,
    pub prompt: &'a str,
    pub status: &'static str,
}

impl<'a> StartedPayload<'a> {
    pub fn new(session: &'a WritingSession) -> Self {
        Self {
            session_id: session.session_id(),
            user_id: session.owner_id().unwrap_or(ANONYMOUS),
            starting_timestamp: session.started_at(),
            prompt: session.prompt(),
            status: "starting",
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct EndedPayload<'a> {
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anky_id: Option<&'a str>,
    pub user_id: &'a str,
    pub prompt: &'a str,
    pub content: &'a str,
    pub words_written: usize,
    /// whole seconds
    pub time_spent: u64,
    pub wpm: f64,
    pub is_anky: bool,
    pub status: &'static str,
    pub starting_timestamp: Option<DateTime<Utc>>,
    pub ending_timestamp: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
    pub keystrokes: &'a KeystrokeStats,
}

impl<'a> EndedPayload<'a> {
    pub fn new(report: &'a EndedReport) -> Self {
        let session = &report.session;
        Self {
            session_id: session.session_id(),
            anky_id: session.anky_id(),
            user_id: session.owner_id().unwrap_or(ANONYMOUS),
            prompt: session.prompt(),
            content: session.content(),
            words_written: report.summary.word_count,
            time_spent: report.summary.duration_secs.floor() as u64,
            wpm: report.summary.wpm,
            is_anky: session.is_anky(),
            status: if session.is_anky() { "completed" } else { "draft" },
            starting_timestamp: session.started_at(),
            ending_timestamp: session.ended_at(),
            timestamp: session.ended_at().unwrap_or_else(Utc::now),
            keystrokes: &report.summary.keystrokes,
        }
    }
}

/// HTTP client for the Anky backend
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    user_agent: String,
    tokens: Box<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        environment: &str,
        tokens: Box<dyn TokenProvider>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            user_agent: format!("anky-cli-{environment}"),
            tokens,
        })
    }

    pub fn build_request<T: Serialize>(&self, path: &str, body: &T) -> Result<Request, ApiError> {
        let mut builder = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header(USER_AGENT, &self.user_agent)
            .header("token", self.tokens.access_token())
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        Ok(builder.build()?)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), ApiError> {
        let request = self.build_request(path, body)?;
        let endpoint = request.url().to_string();
        debug!(%endpoint, "posting to backend");

        let response = self.client.execute(request)?;
        let status = response.status();
        debug!(%endpoint, status = status.as_u16(), "backend responded");
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

impl SessionNotifier for ApiClient {
    fn session_started(&self, session: &WritingSession) -> Result<(), ApiError> {
        self.post("writing-session-started", &StartedPayload::new(session))
    }

    fn session_ended(&self, report: &EndedReport) -> Result<(), ApiError> {
        self.post("writing-session-ended", &EndedPayload::new(report))
    }
}

/// Used when no backend is configured; sessions stay local
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNotifier;

impl SessionNotifier for OfflineNotifier {
    fn session_started(&self, session: &WritingSession) -> Result<(), ApiError> {
        debug!(session_id = %session.session_id(), "offline: not announcing session start");
        Ok(())
    }

    fn session_ended(&self, report: &EndedReport) -> Result<(), ApiError> {
        debug!(session_id = %report.session.session_id(), "offline: not submitting session");
        Ok(())
    }
}
