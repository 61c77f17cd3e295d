//! Tenant preset configuration.

pub mod preset;
pub mod registry;

pub use preset::{PresetConfig, PresetConfigJson, DEFAULT_PRESET};
pub use registry::ConfigRegistry;
