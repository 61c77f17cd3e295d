//! Single sign-on identity and session lifecycle.

pub mod identity;
pub mod session;
pub mod validator;

pub use identity::{Identity, Membership};
pub use session::{RemoteOutcome, Session};
pub use validator::{HttpSessionValidator, RemoteCheck, SessionValidator};
