// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use roster_app::{User, UserPayload, decode_users};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const API_PREFIX: &str = "api";

/// Blocking client for the user-management API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    base: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty -- set it in the config file or ROSTER_API_URL");
        }
        let base = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!(
                "api.base_url {base_url:?} must use http or https -- e.g. http://localhost:8000"
            );
        }
        if base.cannot_be_a_base() {
            bail!("api.base_url {base_url:?} cannot carry request paths");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            base,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let response = self.send(Method::GET, &["all_users"], |request| request)?;
        let records: Vec<Value> = response.json().context("decode user list")?;
        let users = decode_users(records);
        debug!(count = users.len(), "fetched users");
        Ok(users)
    }

    pub fn create_user(&self, payload: &UserPayload) -> Result<()> {
        self.send(Method::POST, &["users"], |request| request.json(payload))?;
        info!(username = %payload.username, "created user");
        Ok(())
    }

    /// Updates the user currently stored as `username`; the payload may
    /// carry a new username.
    pub fn update_user(&self, username: &str, payload: &UserPayload) -> Result<()> {
        self.send(Method::PATCH, &["users", username], |request| {
            request.json(payload)
        })?;
        info!(username, renamed_to = %payload.username, "updated user");
        Ok(())
    }

    pub fn delete_user(&self, username: &str) -> Result<()> {
        self.send(Method::DELETE, &["users", username], |request| request)?;
        info!(username, "deleted user");
        Ok(())
    }

    /// Builds `<base>/api/<segments...>`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("api.base_url {:?} cannot carry request paths", self.base_url))?
            .pop_if_empty()
            .push(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn send<F>(&self, method: Method, segments: &[&str], build: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "sending request");
        let response = build(self.http.request(method, url))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check api.base_url in the config or ROSTER_API_URL ({})",
        base_url,
        error
    )
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    detail: Option<Value>,
}

/// Flattens a `detail` payload: plain text, or the messages of a
/// validation-error list.
fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => {
            let messages = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Object(fields) => fields
                        .get("msg")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    _ => None,
                })
                .collect::<Vec<_>>();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<DetailEnvelope>(body)
        && let Some(detail) = parsed.detail
        && let Some(message) = detail_text(&detail)
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}
