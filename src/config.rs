//! Fleet configuration loaded from the process environment.
//!
//! Two layouts are supported:
//!
//! - **Multi mode**: numbered slots `SCHEMA_REGISTRY_NAME_i` /
//!   `SCHEMA_REGISTRY_URL_i` / `SCHEMA_REGISTRY_USER_i` /
//!   `SCHEMA_REGISTRY_PASSWORD_i` / `READONLY_i` for `i` in `1..=8`.
//! - **Single mode** (fallback): the unnumbered `SCHEMA_REGISTRY_URL` set
//!   becomes one client named `default`.
//!
//! Any valid numbered `(NAME_i, URL_i)` pair selects multi mode and
//! suppresses single-mode loading entirely.

use serde::Serialize;

/// Maximum number of numbered registry slots scanned.
pub const MAX_REGISTRIES: usize = 8;

/// Immutable configuration for one Schema Registry endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryConfig {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing)]
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub readonly: bool,
    pub description: String,
}

impl RegistryConfig {
    /// Public view: everything except credentials.
    pub fn to_public_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "url": self.url,
            "readonly": self.readonly,
            "description": self.description,
            "has_credentials": self.user.is_some(),
        })
    }
}

/// Parsed fleet configuration.
#[derive(Debug, Clone, Default)]
pub struct FleetConfig {
    pub registries: Vec<RegistryConfig>,
    /// Name of the default registry (first valid slot), if any.
    pub default_registry: Option<String>,
    /// Process-wide readonly flag (single-mode `READONLY`).
    pub global_readonly: bool,
}

/// Parse the truthy forms accepted for readonly flags: `true|1|yes|on`.
pub fn parse_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl FleetConfig {
    /// Load the fleet from the process environment.
    pub fn from_env() -> Self {
        let mut registries = Vec::new();
        let mut default_registry = None;

        for i in 1..=MAX_REGISTRIES {
            let name = env_var(&format!("SCHEMA_REGISTRY_NAME_{i}"));
            let url = env_var(&format!("SCHEMA_REGISTRY_URL_{i}"));
            let (Some(name), Some(url)) = (name, url) else {
                continue;
            };

            let readonly = env_var(&format!("READONLY_{i}"))
                .map(|v| parse_truthy(&v))
                .unwrap_or(false);

            tracing::info!(slot = i, %name, %url, readonly, "loaded registry");

            if default_registry.is_none() {
                default_registry = Some(name.clone());
            }
            registries.push(RegistryConfig {
                description: format!("{name} Schema Registry (instance {i})"),
                user: env_var(&format!("SCHEMA_REGISTRY_USER_{i}")),
                password: env_var(&format!("SCHEMA_REGISTRY_PASSWORD_{i}")),
                name,
                url,
                readonly,
            });
        }

        let global_readonly = env_var("READONLY")
            .map(|v| parse_truthy(&v))
            .unwrap_or(false);

        // Single mode only when no numbered slot matched.
        if registries.is_empty() {
            if let Some(url) = env_var("SCHEMA_REGISTRY_URL") {
                tracing::info!(%url, readonly = global_readonly, "loaded single registry");
                registries.push(RegistryConfig {
                    name: "default".to_string(),
                    url,
                    user: env_var("SCHEMA_REGISTRY_USER"),
                    password: env_var("SCHEMA_REGISTRY_PASSWORD"),
                    readonly: global_readonly,
                    description: "Default Schema Registry".to_string(),
                });
                default_registry = Some("default".to_string());
            }
        }

        if registries.is_empty() {
            tracing::warn!(
                "no Schema Registry instances configured; set SCHEMA_REGISTRY_URL for single \
                 mode or SCHEMA_REGISTRY_NAME_1/SCHEMA_REGISTRY_URL_1 for multi mode"
            );
        }

        FleetConfig {
            registries,
            default_registry,
            global_readonly,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_registry_env() {
        for key in [
            "SCHEMA_REGISTRY_URL",
            "SCHEMA_REGISTRY_USER",
            "SCHEMA_REGISTRY_PASSWORD",
            "READONLY",
        ] {
            std::env::remove_var(key);
        }
        for i in 1..=MAX_REGISTRIES {
            for prefix in [
                "SCHEMA_REGISTRY_NAME_",
                "SCHEMA_REGISTRY_URL_",
                "SCHEMA_REGISTRY_USER_",
                "SCHEMA_REGISTRY_PASSWORD_",
                "READONLY_",
            ] {
                std::env::remove_var(format!("{prefix}{i}"));
            }
        }
    }

    #[test]
    fn test_parse_truthy_forms() {
        for v in ["true", "TRUE", "1", "yes", "Yes", "on", " on "] {
            assert!(parse_truthy(v), "{v} should be truthy");
        }
        for v in ["false", "0", "no", "off", "", "2"] {
            assert!(!parse_truthy(v), "{v} should be falsy");
        }
    }

    #[test]
    #[serial]
    fn test_single_mode_fallback() {
        clear_registry_env();
        std::env::set_var("SCHEMA_REGISTRY_URL", "http://localhost:8081");
        std::env::set_var("READONLY", "yes");

        let fleet = FleetConfig::from_env();
        assert_eq!(fleet.registries.len(), 1);
        assert_eq!(fleet.registries[0].name, "default");
        assert!(fleet.registries[0].readonly);
        assert!(fleet.global_readonly);
        assert_eq!(fleet.default_registry.as_deref(), Some("default"));

        clear_registry_env();
    }

    #[test]
    #[serial]
    fn test_multi_mode_wins_over_single() {
        clear_registry_env();
        std::env::set_var("SCHEMA_REGISTRY_URL", "http://ignored:8081");
        std::env::set_var("SCHEMA_REGISTRY_NAME_1", "dev");
        std::env::set_var("SCHEMA_REGISTRY_URL_1", "http://localhost:38081");
        std::env::set_var("SCHEMA_REGISTRY_NAME_2", "prod");
        std::env::set_var("SCHEMA_REGISTRY_URL_2", "http://localhost:38082");
        std::env::set_var("READONLY_2", "true");

        let fleet = FleetConfig::from_env();
        assert_eq!(fleet.registries.len(), 2);
        assert_eq!(fleet.default_registry.as_deref(), Some("dev"));
        assert!(!fleet.registries[0].readonly);
        assert!(fleet.registries[1].readonly);
        // Single-mode URL suppressed entirely.
        assert!(fleet.registries.iter().all(|r| r.name != "default"));

        clear_registry_env();
    }

    #[test]
    #[serial]
    fn test_gap_in_slots_is_skipped() {
        clear_registry_env();
        std::env::set_var("SCHEMA_REGISTRY_NAME_2", "staging");
        std::env::set_var("SCHEMA_REGISTRY_URL_2", "http://localhost:38083");
        // Slot 1 absent; slot 3 has name but no URL.
        std::env::set_var("SCHEMA_REGISTRY_NAME_3", "broken");

        let fleet = FleetConfig::from_env();
        assert_eq!(fleet.registries.len(), 1);
        assert_eq!(fleet.registries[0].name, "staging");
        assert_eq!(fleet.default_registry.as_deref(), Some("staging"));

        clear_registry_env();
    }

    #[test]
    #[serial]
    fn test_empty_env_yields_empty_fleet() {
        clear_registry_env();
        let fleet = FleetConfig::from_env();
        assert!(fleet.is_empty());
        assert!(fleet.default_registry.is_none());
    }
}
