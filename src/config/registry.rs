//! Registry of tenant presets with lazy, cached resolution.

use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::preset::{PresetConfig, PresetConfigJson};
use crate::error::{SsoError, SsoResult};

/// Maps preset names to their configuration.
///
/// Raw sources are registered up front; each preset is built and validated
/// the first time it is requested and cached afterwards.
#[derive(Default)]
pub struct ConfigRegistry {
    /// Registered, not yet resolved sources.
    sources: RwLock<HashMap<String, PresetConfigJson>>,
    /// Resolved presets.
    resolved: RwLock<HashMap<String, Arc<PresetConfig>>>,
}

impl ConfigRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object mapping preset names to preset configs.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let presets: HashMap<String, PresetConfigJson> =
            serde_json::from_str(json).context("Failed to parse presets JSON")?;

        let registry = Self::new();
        for (name, source) in presets {
            registry.register(&name, source)?;
        }
        Ok(registry)
    }

    /// Load presets from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read presets file: {:?}", path))?;
        Self::from_json_str(&json)
    }

    /// Register (or replace) the source for a preset.
    pub fn register(&self, preset: &str, source: PresetConfigJson) -> SsoResult<()> {
        {
            let mut sources = self
                .sources
                .write()
                .map_err(|_| SsoError::Configuration("Preset sources lock poisoned".to_string()))?;
            sources.insert(preset.to_string(), source);
        }

        // A replaced source must not keep serving the old resolution.
        let mut resolved = self
            .resolved
            .write()
            .map_err(|_| SsoError::Configuration("Preset cache lock poisoned".to_string()))?;
        resolved.remove(preset);

        Ok(())
    }

    /// Resolve a preset, building and caching it on first use.
    pub fn get(&self, preset: &str) -> SsoResult<Arc<PresetConfig>> {
        {
            let resolved = self
                .resolved
                .read()
                .map_err(|_| SsoError::Configuration("Preset cache lock poisoned".to_string()))?;
            if let Some(config) = resolved.get(preset) {
                return Ok(Arc::clone(config));
            }
        }

        let mut resolved = self
            .resolved
            .write()
            .map_err(|_| SsoError::Configuration("Preset cache lock poisoned".to_string()))?;

        // Another caller may have resolved it while we waited for the lock.
        if let Some(config) = resolved.get(preset) {
            return Ok(Arc::clone(config));
        }

        let config = {
            let sources = self
                .sources
                .read()
                .map_err(|_| SsoError::Configuration("Preset sources lock poisoned".to_string()))?;
            let source = sources
                .get(preset)
                .ok_or_else(|| SsoError::UnknownPreset(preset.to_string()))?;
            source.into_config(preset)
        };

        config.validate()?;

        debug!(preset = %preset, slo_enabled = config.slo_enabled, "Resolved preset configuration");

        let config = Arc::new(config);
        resolved.insert(preset.to_string(), Arc::clone(&config));
        Ok(config)
    }

    /// Names of all registered presets.
    pub fn presets(&self) -> Vec<String> {
        self.sources
            .read()
            .map(|sources| {
                let mut names: Vec<String> = sources.keys().cloned().collect();
                names.sort();
                names
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const PRESETS: &str = r#"{
        "maestrano": {
            "idp-sso-url": "https://idp.example.com/sso",
            "acs-url": "https://app.example.com/saml/acs",
            "issuer": "app.example.com",
            "session-check-url": "https://idp.example.com/api/v1/auth/saml"
        },
        "partner": {
            "idp-sso-url": "https://idp.partner.com/sso",
            "acs-url": "https://app.example.com/partner/acs",
            "issuer": "app.example.com/partner",
            "slo-enabled": false
        },
        "broken": {
            "idp-sso-url": "https://idp.example.com/sso"
        }
    }"#;

    #[test]
    fn test_resolve_and_cache() {
        let registry = ConfigRegistry::from_json_str(PRESETS).unwrap();
        assert_eq!(registry.presets(), vec!["broken", "maestrano", "partner"]);

        let first = registry.get("maestrano").unwrap();
        let second = registry.get("maestrano").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.preset, "maestrano");

        let partner = registry.get("partner").unwrap();
        assert!(!partner.slo_enabled);
    }

    #[test]
    fn test_unknown_and_invalid_presets() {
        let registry = ConfigRegistry::from_json_str(PRESETS).unwrap();

        assert!(matches!(
            registry.get("nope"),
            Err(SsoError::UnknownPreset(name)) if name == "nope"
        ));
        assert!(matches!(
            registry.get("broken"),
            Err(SsoError::Configuration(_))
        ));
    }

    #[test]
    fn test_out_of_range_skew_is_rejected_on_resolve() {
        let registry = ConfigRegistry::from_json_str(
            r#"{"skewed": {
                "idp-sso-url": "https://idp.example.com/sso",
                "acs-url": "https://app.example.com/saml/acs",
                "issuer": "app.example.com",
                "slo-enabled": false,
                "clock-skew-secs": 9223372036854775807
            }}"#,
        )
        .unwrap();

        assert!(matches!(
            registry.get("skewed"),
            Err(SsoError::Configuration(msg)) if msg.contains("clock_skew_secs")
        ));
    }

    #[test]
    fn test_register_replaces_cached_preset() {
        let registry = ConfigRegistry::from_json_str(PRESETS).unwrap();
        assert!(!registry.get("partner").unwrap().name_id_format.contains("email"));

        let mut source = PresetConfigJson {
            idp_sso_url: Some("https://idp.partner.com/sso".to_string()),
            acs_url: Some("https://app.example.com/partner/acs".to_string()),
            issuer: Some("app.example.com/partner".to_string()),
            slo_enabled: Some(false),
            ..Default::default()
        };
        source.name_id_format =
            Some("urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress".to_string());
        registry.register("partner", source).unwrap();

        assert!(registry.get("partner").unwrap().name_id_format.contains("email"));
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let registry = Arc::new(ConfigRegistry::from_json_str(PRESETS).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get("maestrano").unwrap())
            })
            .collect();

        let configs: Vec<Arc<PresetConfig>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for config in &configs[1..] {
            assert!(Arc::ptr_eq(&configs[0], config));
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        std::fs::write(&path, PRESETS).unwrap();

        let registry = ConfigRegistry::load(&path).unwrap();
        assert!(registry.get("maestrano").is_ok());

        assert!(ConfigRegistry::load(&dir.path().join("missing.json")).is_err());
    }
}
