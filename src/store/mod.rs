//! Host session store.
//!
//! The SSO layer treats the host's per-visitor session as an opaque string
//! key-value store and only ever touches the key named after its preset.

pub mod memory;
pub mod persistent;

pub use memory::MemoryStore;
pub use persistent::{RedbSessionStore, VisitorStore};

use anyhow::Result;

/// Per-visitor key-value session storage provided by the host.
pub trait SessionStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool>;
}
