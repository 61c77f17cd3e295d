//! Per-tenant SSO preset configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SsoError, SsoResult};

/// Settings for one tenant preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    /// Preset name; also the key the session is stored under.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Enable SAML single sign-on.
    #[serde(default = "default_true")]
    pub sso_enabled: bool,

    /// Enforce remote session rechecks (single logout).
    #[serde(default = "default_true")]
    pub slo_enabled: bool,

    /// IdP SSO endpoint the AuthnRequest is redirected to.
    #[serde(default)]
    pub idp_sso_url: String,

    /// Assertion Consumer Service URL (where the IdP posts its response).
    #[serde(default)]
    pub acs_url: String,

    /// SP issuer URI.
    #[serde(default)]
    pub issuer: String,

    /// NameID format to request.
    #[serde(default = "default_name_id_format")]
    pub name_id_format: String,

    /// Session-check endpoint; the user uid is appended as a path segment.
    #[serde(default)]
    pub session_check_url: String,

    /// API identifier used as basic-auth user for session checks.
    #[serde(default)]
    pub api_id: Option<String>,

    /// API key used as basic-auth password for session checks.
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP timeout for the session check.
    #[serde(default = "default_check_timeout")]
    pub check_timeout_secs: u64,

    /// Clock skew tolerance when consuming assertions.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: i64,
}

/// Largest accepted assertion clock skew (one day).
pub const MAX_CLOCK_SKEW_SECS: i64 = 86_400;

/// Preset used when the caller does not name one.
pub const DEFAULT_PRESET: &str = "maestrano";

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}

fn default_true() -> bool {
    true
}

fn default_name_id_format() -> String {
    "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified".to_string()
}

fn default_check_timeout() -> u64 {
    10
}

fn default_clock_skew() -> i64 {
    300 // 5 minutes
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            sso_enabled: true,
            slo_enabled: true,
            idp_sso_url: String::new(),
            acs_url: String::new(),
            issuer: String::new(),
            name_id_format: default_name_id_format(),
            session_check_url: String::new(),
            api_id: None,
            api_key: None,
            check_timeout_secs: default_check_timeout(),
            clock_skew_secs: default_clock_skew(),
        }
    }
}

impl PresetConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> SsoResult<()> {
        if self.preset.is_empty() {
            return Err(SsoError::Configuration("preset name is required".to_string()));
        }

        if self.sso_enabled {
            self.require_sso_urls()?;
        }

        if self.slo_enabled && self.session_check_url.is_empty() {
            return Err(SsoError::Configuration(format!(
                "preset '{}': session_check_url is required when SLO is enabled",
                self.preset
            )));
        }

        if !(0..=MAX_CLOCK_SKEW_SECS).contains(&self.clock_skew_secs) {
            return Err(SsoError::Configuration(format!(
                "preset '{}': clock_skew_secs must be between 0 and {}",
                self.preset, MAX_CLOCK_SKEW_SECS
            )));
        }

        if self.check_timeout_secs == 0 {
            return Err(SsoError::Configuration(format!(
                "preset '{}': check_timeout_secs must be positive",
                self.preset
            )));
        }

        Ok(())
    }

    /// Check the settings an AuthnRequest cannot be built without.
    pub fn require_sso_urls(&self) -> SsoResult<()> {
        let missing = [
            ("idp_sso_url", &self.idp_sso_url),
            ("acs_url", &self.acs_url),
            ("issuer", &self.issuer),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());

        match missing {
            Some((name, _)) => Err(SsoError::Configuration(format!(
                "preset '{}': {} is required",
                self.preset, name
            ))),
            None => Ok(()),
        }
    }

    /// Basic-auth credentials for the session check, if both halves are set.
    pub fn api_credentials(&self) -> Option<(&str, &str)> {
        match (self.api_id.as_deref(), self.api_key.as_deref()) {
            (Some(id), Some(key)) => Some((id, key)),
            _ => None,
        }
    }
}

/// JSON form of a preset, merged over defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PresetConfigJson {
    pub sso_enabled: Option<bool>,
    pub slo_enabled: Option<bool>,
    pub idp_sso_url: Option<String>,
    pub acs_url: Option<String>,
    pub issuer: Option<String>,
    pub name_id_format: Option<String>,
    pub session_check_url: Option<String>,
    pub api_id: Option<String>,
    pub api_key: Option<String>,
    pub check_timeout_secs: Option<u64>,
    pub clock_skew_secs: Option<i64>,
}

impl PresetConfigJson {
    /// Merge JSON config into existing config.
    pub fn apply_to(&self, config: &mut PresetConfig) {
        if let Some(enabled) = self.sso_enabled {
            config.sso_enabled = enabled;
        }
        if let Some(enabled) = self.slo_enabled {
            config.slo_enabled = enabled;
        }
        if let Some(ref url) = self.idp_sso_url {
            config.idp_sso_url = url.clone();
        }
        if let Some(ref url) = self.acs_url {
            config.acs_url = url.clone();
        }
        if let Some(ref issuer) = self.issuer {
            config.issuer = issuer.clone();
        }
        if let Some(ref format) = self.name_id_format {
            config.name_id_format = format.clone();
        }
        if let Some(ref url) = self.session_check_url {
            config.session_check_url = url.clone();
        }
        if let Some(ref id) = self.api_id {
            config.api_id = Some(id.clone());
        }
        if let Some(ref key) = self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(timeout) = self.check_timeout_secs {
            config.check_timeout_secs = timeout;
        }
        if let Some(skew) = self.clock_skew_secs {
            config.clock_skew_secs = skew;
        }
    }

    /// Build a full preset config from this JSON.
    pub fn into_config(&self, preset: &str) -> PresetConfig {
        let mut config = PresetConfig {
            preset: preset.to_string(),
            ..Default::default()
        };
        self.apply_to(&mut config);
        config
    }
}
