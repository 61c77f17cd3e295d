//! Remote session validation against the identity authority.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::PresetConfig;
use crate::error::{RemoteValidationError, SsoError, SsoResult};
use crate::timestamp::parse_utc;

/// Answer from the session-check endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteCheck {
    pub valid: bool,
    /// When the session must next be checked.
    pub recheck: DateTime<Utc>,
}

impl RemoteCheck {
    /// Parse the endpoint's JSON body.
    pub fn from_json(body: &str) -> Result<Self, RemoteValidationError> {
        let body: CheckBody = serde_json::from_str(body)
            .map_err(|e| RemoteValidationError::Body(e.to_string()))?;

        let valid = match body.valid {
            Flag::Bool(b) => b,
            Flag::Text(ref s) if s.eq_ignore_ascii_case("true") => true,
            Flag::Text(ref s) if s.eq_ignore_ascii_case("false") => false,
            Flag::Text(s) => {
                return Err(RemoteValidationError::Body(format!(
                    "invalid 'valid' value: {}",
                    s
                )))
            }
        };

        let recheck = parse_utc(&body.recheck).ok_or_else(|| {
            RemoteValidationError::Body(format!("invalid 'recheck' value: {}", body.recheck))
        })?;

        Ok(Self { valid, recheck })
    }
}

#[derive(Debug, Deserialize)]
struct CheckBody {
    valid: Flag,
    recheck: String,
}

/// `valid` arrives either as a JSON boolean or as "true"/"false".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

/// Asks the identity authority whether a session token is still valid.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn check(&self, uid: &str, session_token: &str) -> SsoResult<RemoteCheck>;
}

/// Session validator backed by the HTTP session-check endpoint.
pub struct HttpSessionValidator {
    http_client: reqwest::Client,
    /// Base URL; the uid is appended as a path segment.
    check_url: String,
    credentials: Option<(String, String)>,
}

impl HttpSessionValidator {
    /// Create a validator for a resolved preset.
    pub fn new(config: &PresetConfig) -> SsoResult<Self> {
        if config.session_check_url.is_empty() {
            return Err(SsoError::Configuration(format!(
                "preset '{}': session_check_url is required",
                config.preset
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.check_timeout_secs))
            .build()
            .map_err(|e| SsoError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            check_url: config.session_check_url.trim_end_matches('/').to_string(),
            credentials: config
                .api_credentials()
                .map(|(id, key)| (id.to_string(), key.to_string())),
        })
    }

    fn url_for(&self, uid: &str) -> String {
        format!("{}/{}", self.check_url, urlencoding::encode(uid))
    }
}

#[async_trait]
impl SessionValidator for HttpSessionValidator {
    async fn check(&self, uid: &str, session_token: &str) -> SsoResult<RemoteCheck> {
        let url = self.url_for(uid);
        debug!(url = %url, uid = %uid, "Checking session with identity authority");

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("session", session_token)]);

        if let Some((ref id, ref key)) = self.credentials {
            request = request.basic_auth(id, Some(key));
        }

        let response = request.send().await.map_err(RemoteValidationError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteValidationError::Status(status.as_u16()).into());
        }

        let body = response.text().await.map_err(RemoteValidationError::from)?;
        let check = RemoteCheck::from_json(&body)?;

        debug!(uid = %uid, valid = check.valid, "Session check answered");
        Ok(check)
    }
}
