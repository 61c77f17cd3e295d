//! SSO session lifecycle.
//!
//! A [`Session`] is rebuilt from the host store on every request and decides
//! whether the cached login can still be trusted. Once `recheck` has passed,
//! trust is renewed only by a positive answer from the remote authority; a
//! negative or missing answer leaves `recheck` untouched so the next request
//! asks again.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::identity::Identity;
use super::validator::SessionValidator;
use crate::config::{ConfigRegistry, PresetConfig};
use crate::error::{SsoError, SsoResult};
use crate::store::SessionStore;
use crate::timestamp::{format_utc, parse_utc};

/// Blob layout persisted in the host store.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    uid: String,
    group_uid: String,
    session: String,
    session_recheck: String,
}

/// Outcome of asking the remote authority about a session.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// Session confirmed; `recheck` was moved forward.
    Valid,
    /// The authority answered that the session is no longer valid.
    Invalid,
    /// The authority could not be reached or understood.
    Unavailable(SsoError),
}

impl RemoteOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, RemoteOutcome::Valid)
    }
}

/// Locally cached SSO session for one visitor and preset.
pub struct Session {
    config: Arc<PresetConfig>,
    store: Arc<dyn SessionStore>,
    present: bool,

    pub uid: String,
    pub group_uid: String,
    pub session_token: String,
    /// Do not trust the session past this instant without revalidation.
    pub recheck: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("preset", &self.config.preset)
            .field("present", &self.present)
            .field("uid", &self.uid)
            .field("group_uid", &self.group_uid)
            .field("recheck", &self.recheck)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Rehydrate the session stored under `preset`.
    ///
    /// A missing or undecodable blob yields a session without login data.
    pub fn load(
        registry: &ConfigRegistry,
        preset: &str,
        store: Arc<dyn SessionStore>,
    ) -> SsoResult<Self> {
        let config = registry.get(preset)?;
        let mut session = Self::empty(config, store);

        match session.store.get(preset).map_err(SsoError::Store)? {
            Some(blob) => match decode_blob(&blob) {
                Ok(record) => session.apply(record),
                Err(e) => {
                    warn!(preset = %preset, error = %e, "Ignoring malformed persisted session");
                }
            },
            None => {
                debug!(preset = %preset, "No persisted session");
            }
        }

        Ok(session)
    }

    /// Start a session right after a successful SAML login.
    ///
    /// The store is not read; call [`Session::save`] to persist.
    pub fn from_identity(
        registry: &ConfigRegistry,
        preset: &str,
        store: Arc<dyn SessionStore>,
        identity: &Identity,
    ) -> SsoResult<Self> {
        let config = registry.get(preset)?;
        let mut session = Self::empty(config, store);

        session.uid = identity.uid.clone();
        session.group_uid = identity.group_uid.clone();
        session.session_token = identity.session_token.clone();
        session.recheck = identity.session_recheck;
        session.present = true;

        Ok(session)
    }

    fn empty(config: Arc<PresetConfig>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            store,
            present: false,
            uid: String::new(),
            group_uid: String::new(),
            session_token: String::new(),
            recheck: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn apply(&mut self, record: Recorded) {
        self.uid = record.uid;
        self.group_uid = record.group_uid;
        self.session_token = record.session_token;
        self.recheck = record.recheck;
        self.present = true;
    }

    pub fn preset(&self) -> &str {
        &self.config.preset
    }

    /// Whether login data was loaded from the store or an identity.
    pub fn has_session(&self) -> bool {
        self.present
    }

    /// True once `recheck` has been reached.
    pub fn is_remote_check_required(&self) -> bool {
        self.is_remote_check_required_at(Utc::now())
    }

    pub fn is_remote_check_required_at(&self, now: DateTime<Utc>) -> bool {
        self.recheck <= now
    }

    /// Ask the remote authority about this session.
    ///
    /// Only a positive answer updates `recheck`; nothing is persisted here.
    pub async fn check_remote<V>(&mut self, validator: &V) -> RemoteOutcome
    where
        V: SessionValidator + ?Sized,
    {
        match validator.check(&self.uid, &self.session_token).await {
            Ok(check) if check.valid => {
                info!(
                    preset = %self.config.preset,
                    uid = %self.uid,
                    recheck = %format_utc(&check.recheck),
                    "Session revalidated"
                );
                self.recheck = check.recheck;
                RemoteOutcome::Valid
            }
            Ok(_) => {
                info!(preset = %self.config.preset, uid = %self.uid, "Session invalidated by identity authority");
                RemoteOutcome::Invalid
            }
            Err(e) => {
                warn!(
                    preset = %self.config.preset,
                    uid = %self.uid,
                    error = %e,
                    "Session check unavailable, treating session as not valid"
                );
                RemoteOutcome::Unavailable(e)
            }
        }
    }

    /// Ask the remote authority about this session; true when confirmed.
    pub async fn perform_remote_check<V>(&mut self, validator: &V) -> bool
    where
        V: SessionValidator + ?Sized,
    {
        self.check_remote(validator).await.is_valid()
    }

    /// Decide whether the session can be trusted for this request.
    ///
    /// With `if_session`, a visitor without a stored session is accepted.
    pub async fn is_valid<V>(&mut self, validator: &V, if_session: bool) -> bool
    where
        V: SessionValidator + ?Sized,
    {
        if !self.config.slo_enabled {
            return true;
        }

        if !self.present {
            debug!(preset = %self.config.preset, if_session, "No session to validate");
            return if_session;
        }

        if !self.is_remote_check_required() {
            return true;
        }

        if !self.perform_remote_check(validator).await {
            return false;
        }

        if let Err(e) = self.save() {
            warn!(preset = %self.config.preset, error = %e, "Failed to persist revalidated session");
        }
        true
    }

    /// Persist the session under its preset key.
    pub fn save(&self) -> SsoResult<()> {
        let blob = encode_blob(self)?;
        self.store
            .set(&self.config.preset, &blob)
            .map_err(SsoError::Store)?;

        debug!(preset = %self.config.preset, uid = %self.uid, "Saved session");
        Ok(())
    }

    /// Remove the session from the store (logout).
    pub fn destroy(&mut self) -> SsoResult<bool> {
        let removed = self
            .store
            .remove(&self.config.preset)
            .map_err(SsoError::Store)?;

        *self = Self::empty(Arc::clone(&self.config), Arc::clone(&self.store));
        info!(preset = %self.config.preset, removed, "Session destroyed");
        Ok(removed)
    }
}

/// Decoded blob contents.
struct Recorded {
    uid: String,
    group_uid: String,
    session_token: String,
    recheck: DateTime<Utc>,
}

fn encode_blob(session: &Session) -> SsoResult<String> {
    let record = PersistedSession {
        uid: session.uid.clone(),
        group_uid: session.group_uid.clone(),
        session: session.session_token.clone(),
        session_recheck: format_utc(&session.recheck),
    };
    let json = serde_json::to_string(&record)
        .map_err(|e| SsoError::MalformedSession(format!("failed to serialize: {}", e)))?;
    Ok(BASE64.encode(json.as_bytes()))
}

fn decode_blob(blob: &str) -> SsoResult<Recorded> {
    let bytes = BASE64
        .decode(blob.trim())
        .map_err(|e| SsoError::MalformedSession(format!("not valid base64: {}", e)))?;
    let json = String::from_utf8(bytes)
        .map_err(|_| SsoError::MalformedSession("not valid UTF-8".to_string()))?;
    let record: PersistedSession = serde_json::from_str(&json)
        .map_err(|e| SsoError::MalformedSession(format!("not valid JSON: {}", e)))?;
    let recheck = parse_utc(&record.session_recheck).ok_or_else(|| {
        SsoError::MalformedSession(format!("invalid recheck: {}", record.session_recheck))
    })?;

    Ok(Recorded {
        uid: record.uid,
        group_uid: record.group_uid,
        session_token: record.session,
        recheck,
    })
}
