//! Sync API transport
//!
//! The engine talks to the server through the [`Transport`] trait so that
//! tests can swap in an in-memory server. [`HttpTransport`] is the real one:
//! a form-encoded POST to the sync endpoint.

use std::collections::HashMap;

use reqwest::blocking::Client as HttpClient;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::context::SyncContext;
use super::state::SyncToken;
use crate::command::Command;
use crate::config::Config;
use crate::id::IdMap;
use crate::models::{Filter, Item, Label, Note, Project, Reminder};

/// Failures below the command level; nothing was applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("No API token configured. Set api_token in the config file or TODOIST_API_TOKEN.")]
    MissingToken,

    #[error("Server rejected the API token")]
    Unauthorized,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_decode() {
            TransportError::Decode(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

/// Outcome of one command as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStatus", into = "RawStatus")]
pub enum CommandStatus {
    Ok,
    Error { code: Option<i64>, reason: String },
}

impl CommandStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, CommandStatus::Ok)
    }
}

/// `"ok"` or `{"error_code": .., "error": ..}`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawStatus {
    Text(String),
    Detail {
        #[serde(default)]
        error_code: Option<i64>,
        #[serde(default)]
        error: String,
    },
}

impl From<RawStatus> for CommandStatus {
    fn from(raw: RawStatus) -> Self {
        match raw {
            RawStatus::Text(text) if text.eq_ignore_ascii_case("ok") => CommandStatus::Ok,
            RawStatus::Text(text) => CommandStatus::Error {
                code: None,
                reason: text,
            },
            RawStatus::Detail { error_code, error } => CommandStatus::Error {
                code: error_code,
                reason: error,
            },
        }
    }
}

impl From<CommandStatus> for RawStatus {
    fn from(status: CommandStatus) -> Self {
        match status {
            CommandStatus::Ok => RawStatus::Text("ok".to_string()),
            CommandStatus::Error { code, reason } => RawStatus::Detail {
                error_code: code,
                error: reason,
            },
        }
    }
}

/// Response to a commands-only request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub temp_id_mapping: IdMap,
    #[serde(default)]
    pub sync_status: HashMap<Uuid, CommandStatus>,
}

/// Response to a sync request
///
/// A kind that is absent (`None`) carries no changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub sync_token: SyncToken,
    #[serde(default)]
    pub full_sync: bool,
    #[serde(default)]
    pub items: Option<Vec<Item>>,
    #[serde(default)]
    pub projects: Option<Vec<Project>>,
    #[serde(default)]
    pub labels: Option<Vec<Label>>,
    #[serde(default)]
    pub notes: Option<Vec<Note>>,
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub reminders: Option<Vec<Reminder>>,
    #[serde(default)]
    pub temp_id_mapping: IdMap,
    #[serde(default)]
    pub sync_status: HashMap<Uuid, CommandStatus>,
}

/// Connection to a sync server
pub trait Transport {
    /// Send commands without requesting resources
    fn commit(
        &self,
        ctx: &SyncContext,
        token: &SyncToken,
        commands: &[Command],
    ) -> Result<CommitResponse, TransportError>;

    /// Send commands and request every resource changed since `token`
    fn sync(
        &self,
        ctx: &SyncContext,
        token: &SyncToken,
        commands: &[Command],
    ) -> Result<SyncResponse, TransportError>;
}

/// Sync API over HTTPS
pub struct HttpTransport {
    client: HttpClient,
    url: String,
    api_token: Option<String>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, api_token: Option<String>) -> Result<Self, TransportError> {
        let client = HttpClient::builder()
            .user_agent(concat!("todoist-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_token,
        })
    }

    /// Transport for the configured endpoint and token.
    ///
    /// A missing token is only reported when a request is made, so
    /// offline reads keep working.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::new(config.api_url.clone(), config.api_token.clone())
    }

    fn post<R: DeserializeOwned>(
        &self,
        ctx: &SyncContext,
        token: &SyncToken,
        resource_types: &str,
        commands: &[Command],
    ) -> Result<R, TransportError> {
        let api_token = self.api_token.as_deref().ok_or(TransportError::MissingToken)?;

        let wire: Vec<_> = commands.iter().map(Command::to_wire).collect();
        let commands_json =
            serde_json::to_string(&wire).map_err(|e| TransportError::Decode(e.to_string()))?;

        let mut request = self.client.post(&self.url).bearer_auth(api_token).form(&[
            ("sync_token", token.as_wire()),
            ("resource_types", resource_types),
            ("commands", commands_json.as_str()),
        ]);
        if let Some(timeout) = ctx.timeout {
            request = request.timeout(timeout);
        }

        debug!(url = %self.url, commands = commands.len(), resource_types, "POST sync");
        let response = request.send()?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text()?;
        debug!(status = status.as_u16(), bytes = body.len(), "sync response");
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl Transport for HttpTransport {
    fn commit(
        &self,
        ctx: &SyncContext,
        token: &SyncToken,
        commands: &[Command],
    ) -> Result<CommitResponse, TransportError> {
        self.post(ctx, token, "[]", commands)
    }

    fn sync(
        &self,
        ctx: &SyncContext,
        token: &SyncToken,
        commands: &[Command],
    ) -> Result<SyncResponse, TransportError> {
        self.post(ctx, token, r#"["all"]"#, commands)
    }
}
