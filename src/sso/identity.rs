//! Identity and membership projections over an assertion's attributes.
//!
//! Both are pure functions of an [`AttributeSet`]. Absent attributes become
//! empty strings; an absent or unparsable `mno_session_recheck` becomes the
//! Unix epoch, so the first validity check goes to the remote authority.

use chrono::{DateTime, Utc};

use crate::saml::AttributeSet;
use crate::timestamp::parse_utc;

/// Attribute names sent by the IdP.
pub mod attr {
    pub const UID: &str = "uid";
    pub const VIRTUAL_UID: &str = "virtual_uid";
    pub const EMAIL: &str = "email";
    pub const VIRTUAL_EMAIL: &str = "virtual_email";
    pub const NAME: &str = "name";
    pub const SURNAME: &str = "surname";
    pub const COUNTRY: &str = "country";
    pub const COMPANY_NAME: &str = "company_name";
    pub const GROUP_UID: &str = "group_uid";
    pub const GROUP_ROLE: &str = "group_role";
    pub const SESSION: &str = "mno_session";
    pub const SESSION_RECHECK: &str = "mno_session_recheck";
}

/// The authenticated user as described by the assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub virtual_uid: String,
    pub email: String,
    pub virtual_email: String,
    pub name: String,
    pub surname: String,
    pub country: String,
    pub company_name: String,
    pub group_uid: String,
    pub session_token: String,
    pub session_recheck: DateTime<Utc>,
}

impl Identity {
    pub fn from_attributes(attrs: &AttributeSet) -> Self {
        let session_recheck = attrs
            .get(attr::SESSION_RECHECK)
            .and_then(parse_utc)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Self {
            uid: attrs.value(attr::UID).to_string(),
            virtual_uid: attrs.value(attr::VIRTUAL_UID).to_string(),
            email: attrs.value(attr::EMAIL).to_string(),
            virtual_email: attrs.value(attr::VIRTUAL_EMAIL).to_string(),
            name: attrs.value(attr::NAME).to_string(),
            surname: attrs.value(attr::SURNAME).to_string(),
            country: attrs.value(attr::COUNTRY).to_string(),
            company_name: attrs.value(attr::COMPANY_NAME).to_string(),
            group_uid: attrs.value(attr::GROUP_UID).to_string(),
            session_token: attrs.value(attr::SESSION).to_string(),
            session_recheck,
        }
    }
}

/// The (user, group, role) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub user_uid: String,
    pub group_uid: String,
    pub role: String,
}

impl Membership {
    pub fn from_attributes(attrs: &AttributeSet) -> Self {
        Self {
            user_uid: attrs.value(attr::UID).to_string(),
            group_uid: attrs.value(attr::GROUP_UID).to_string(),
            role: attrs.value(attr::GROUP_ROLE).to_string(),
        }
    }
}
