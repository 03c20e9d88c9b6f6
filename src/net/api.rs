//! REST helpers for the chat backend.
//!
//! History is a plain `GET <backend>/message` returning a JSON array of
//! messages; the health probe is `GET <backend>/health`. Items in the history
//! array that don't look like messages are skipped rather than failing the
//! whole load.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::models::{ChatMessage, Room};

/// Source of persisted chat history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch the history shown when `room` is opened. Order is unspecified.
    async fn fetch_messages(&self, room: Room) -> Result<Vec<ChatMessage>, ChatError>;
}

/// History over the backend's REST endpoint.
#[derive(Clone, Debug)]
pub struct RestHistory {
    client: reqwest::Client,
    url: String,
}

impl RestHistory {
    /// # Errors
    ///
    /// `Fetch` if the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        Ok(Self { client: http_client(config.http_timeout)?, url: config.messages_url() })
    }
}

#[async_trait]
impl HistorySource for RestHistory {
    async fn fetch_messages(&self, room: Room) -> Result<Vec<ChatMessage>, ChatError> {
        debug!(url = %self.url, room = %room, "fetching history");
        let body = get_json(&self.client, &self.url).await?;
        parse_history(body)
    }
}

/// Backend health report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub database: Option<String>,
    pub service: Option<String>,
    pub timestamp: Option<String>,
}

/// Probe `GET <backend>/health`.
///
/// # Errors
///
/// `Fetch` on transport or decode failure, `FetchStatus` on non-success.
pub async fn fetch_health(config: &ChatConfig) -> Result<HealthStatus, ChatError> {
    let client = http_client(config.http_timeout)?;
    let body = get_json(&client, &config.health_url()).await?;
    serde_json::from_value(body).map_err(|e| ChatError::Fetch(e.to_string()))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, ChatError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ChatError::Fetch(e.to_string()))
}

async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value, ChatError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ChatError::Fetch(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ChatError::FetchStatus { status: status.as_u16() });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ChatError::Fetch(e.to_string()))
}

/// Decode a history body, skipping items that are not messages.
///
/// # Errors
///
/// `Fetch` when the body is not a JSON array.
pub fn parse_history(body: Value) -> Result<Vec<ChatMessage>, ChatError> {
    let Value::Array(items) = body else {
        return Err(ChatError::Fetch("history response is not an array".to_owned()));
    };
    let total = items.len();
    let messages: Vec<ChatMessage> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ChatMessage>(item) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(error = %e, "skipping malformed history item");
                None
            }
        })
        .collect();
    debug!(total, kept = messages.len(), "history parsed");
    Ok(messages)
}

/// One-line summary of a health report.
#[must_use]
pub fn health_summary(health: &HealthStatus) -> String {
    let mut line = health.status.clone();
    if let Some(service) = &health.service {
        line.push_str(&format!(" service={service}"));
    }
    if let Some(database) = &health.database {
        line.push_str(&format!(" database={database}"));
    }
    line
}
