//! SAML messages: the outgoing AuthnRequest and the consumed response.
//!
//! Only the HTTP-Redirect AuthnRequest and the POSTed response are handled.

pub mod attributes;
pub mod request;
pub mod response;

pub use attributes::{AttributeSet, AttributeSource};
pub use request::AuthnRequest;
pub use response::ConsumedResponse;
