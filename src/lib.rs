//! SAML single sign-on with a locally cached, remotely revalidated session.
//!
//! Builds the HTTP-Redirect AuthnRequest, reads identity and membership from
//! a verified assertion, and keeps a compact session record in the host's
//! session store that is revalidated against the identity authority once its
//! recheck instant has passed.

pub mod config;
pub mod error;
pub mod saml;
pub mod sso;
pub mod store;
pub mod timestamp;

pub use config::{ConfigRegistry, PresetConfig, PresetConfigJson, DEFAULT_PRESET};
pub use error::{RemoteValidationError, SsoError, SsoResult};
pub use saml::{AttributeSet, AttributeSource, AuthnRequest, ConsumedResponse};
pub use sso::{
    HttpSessionValidator, Identity, Membership, RemoteCheck, RemoteOutcome, Session,
    SessionValidator,
};
pub use store::{MemoryStore, RedbSessionStore, SessionStore, VisitorStore};
