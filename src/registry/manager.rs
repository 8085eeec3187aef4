//! Fleet manager: owns the registry clients, resolves names, and is the
//! single place write-blocking policy is consulted.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::FleetConfig;
use crate::error::{Result, WardenError};
use crate::registry::client::RegistryClient;
use crate::registry::types::{ConnectionStatus, ConnectionTest};

/// Static config merged with a live probe, as returned by `getRegistryInfo`.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct RegistryInfo {
    pub name: String,
    pub url: String,
    pub readonly: bool,
    pub description: String,
    pub has_credentials: bool,
    pub is_default: bool,
    pub connection_status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_error: Option<String>,
}

/// Aggregate of probing every configured registry.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct FleetTest {
    pub registry_tests: HashMap<String, ConnectionTest>,
    pub total_registries: usize,
    pub connected: usize,
    pub failed: usize,
}

/// Per-registry aggregate statistics.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct RegistryStatistics {
    pub registry: String,
    pub total_contexts: usize,
    pub total_subjects: usize,
    pub total_versions: usize,
    /// Subject counts keyed by context ("." for the default context).
    pub subjects_by_context: HashMap<String, usize>,
}

pub struct RegistryManager {
    clients: HashMap<String, RegistryClient>,
    default_registry: RwLock<Option<String>>,
    global_readonly: bool,
}

impl RegistryManager {
    pub fn new(fleet: FleetConfig) -> Result<Self> {
        let mut clients = HashMap::new();
        for config in &fleet.registries {
            if clients.contains_key(&config.name) {
                return Err(WardenError::Config {
                    message: format!("duplicate registry name '{}'", config.name),
                });
            }
            clients.insert(config.name.clone(), RegistryClient::new(config.clone())?);
        }
        Ok(Self {
            clients,
            default_registry: RwLock::new(fleet.default_registry),
            global_readonly: fleet.global_readonly,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(FleetConfig::from_env())
    }

    /// Resolve a client by name, falling back to the default registry.
    pub fn get(&self, name: Option<&str>) -> Result<RegistryClient> {
        let resolved = match name {
            Some(name) => name.to_string(),
            None => self
                .default_registry
                .read()
                .clone()
                .ok_or_else(|| WardenError::Config {
                    message: "no registry configured".to_string(),
                })?,
        };
        self.clients
            .get(&resolved)
            .cloned()
            .ok_or(WardenError::RegistryNotFound { name: resolved })
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn default_registry(&self) -> Option<String> {
        self.default_registry.read().clone()
    }

    pub fn set_default(&self, name: &str) -> Result<()> {
        if !self.clients.contains_key(name) {
            return Err(WardenError::RegistryNotFound {
                name: name.to_string(),
            });
        }
        *self.default_registry.write() = Some(name.to_string());
        Ok(())
    }

    /// The readonly gate. Every mutating tool calls this before side effects.
    ///
    /// Checks the named registry's flag first, then the process-wide flag.
    pub fn check_readonly(&self, name: Option<&str>) -> Result<()> {
        if let Ok(client) = self.get(name) {
            if client.config().readonly {
                let registry = client.name().to_string();
                return Err(WardenError::ReadonlyBlocked {
                    message: format!(
                        "Registry '{registry}' is running in READONLY mode. Unset its \
                         READONLY_<n> environment variable to enable modifications."
                    ),
                    registry: Some(registry),
                    global: false,
                });
            }
        }
        if self.global_readonly {
            return Err(WardenError::ReadonlyBlocked {
                message: "Server is running in global READONLY mode. Set READONLY=false to \
                          enable modification operations."
                    .to_string(),
                registry: None,
                global: true,
            });
        }
        Ok(())
    }

    pub fn global_readonly(&self) -> bool {
        self.global_readonly
    }

    /// Merge static config with a live connection probe.
    pub async fn info(&self, name: &str) -> Result<RegistryInfo> {
        let client = self.get(Some(name))?;
        let config = client.config();
        let probe = client.test_connection().await;
        Ok(RegistryInfo {
            name: config.name.clone(),
            url: config.url.clone(),
            readonly: config.readonly,
            description: config.description.clone(),
            has_credentials: config.user.is_some(),
            is_default: self.default_registry().as_deref() == Some(name),
            connection_status: probe.status,
            response_time_ms: probe.response_time_ms,
            connection_error: probe.error,
        })
    }

    /// Probe every registry concurrently.
    pub async fn test_all(&self) -> FleetTest {
        let probes = self
            .clients
            .values()
            .map(|client| async move { (client.name().to_string(), client.test_connection().await) });
        let results: HashMap<String, ConnectionTest> =
            futures::future::join_all(probes).await.into_iter().collect();

        let connected = results
            .values()
            .filter(|t| t.status == ConnectionStatus::Connected)
            .count();
        FleetTest {
            total_registries: results.len(),
            connected,
            failed: results.len() - connected,
            registry_tests: results,
        }
    }

    pub async fn count_contexts(&self, name: Option<&str>) -> Result<usize> {
        let client = self.get(name)?;
        Ok(client.list_contexts().await?.len())
    }

    pub async fn count_schemas(&self, name: Option<&str>, context: Option<&str>) -> Result<usize> {
        let client = self.get(name)?;
        Ok(client.list_subjects(context).await?.len())
    }

    pub async fn count_schema_versions(
        &self,
        name: Option<&str>,
        subject: &str,
        context: Option<&str>,
    ) -> Result<usize> {
        let client = self.get(name)?;
        Ok(client.list_versions(subject, context).await?.len())
    }

    /// Walk contexts and subjects to build aggregate statistics.
    pub async fn statistics(&self, name: Option<&str>) -> Result<RegistryStatistics> {
        let client = self.get(name)?;
        let mut contexts = client.list_contexts().await?;
        if !contexts.iter().any(|c| c == ".") {
            contexts.push(".".to_string());
        }

        let mut subjects_by_context = HashMap::new();
        let mut total_subjects = 0;
        let mut total_versions = 0;
        for context in &contexts {
            let subjects = client.list_subjects(Some(context)).await?;
            for subject in &subjects {
                total_versions += client
                    .list_versions(subject, Some(context))
                    .await?
                    .len();
            }
            total_subjects += subjects.len();
            subjects_by_context.insert(context.clone(), subjects.len());
        }

        Ok(RegistryStatistics {
            registry: client.name().to_string(),
            total_contexts: contexts.len(),
            total_subjects,
            total_versions,
            subjects_by_context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;

    fn fleet(readonly_second: bool, global: bool) -> FleetConfig {
        FleetConfig {
            registries: vec![
                RegistryConfig {
                    name: "dev".to_string(),
                    url: "http://localhost:38081".to_string(),
                    user: None,
                    password: None,
                    readonly: false,
                    description: String::new(),
                },
                RegistryConfig {
                    name: "prod".to_string(),
                    url: "http://localhost:38082".to_string(),
                    user: None,
                    password: None,
                    readonly: readonly_second,
                    description: String::new(),
                },
            ],
            default_registry: Some("dev".to_string()),
            global_readonly: global,
        }
    }

    #[test]
    fn test_get_resolves_default_and_named() {
        let manager = RegistryManager::new(fleet(false, false)).unwrap();
        assert_eq!(manager.get(None).unwrap().name(), "dev");
        assert_eq!(manager.get(Some("prod")).unwrap().name(), "prod");
        assert!(matches!(
            manager.get(Some("nope")),
            Err(WardenError::RegistryNotFound { .. })
        ));
    }

    #[test]
    fn test_readonly_gate_blocks_flagged_registry() {
        let manager = RegistryManager::new(fleet(true, false)).unwrap();
        assert!(manager.check_readonly(Some("dev")).is_ok());
        let err = manager.check_readonly(Some("prod")).unwrap_err();
        match err {
            WardenError::ReadonlyBlocked {
                registry, global, ..
            } => {
                assert_eq!(registry.as_deref(), Some("prod"));
                assert!(!global);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_readonly_gate_global_flag() {
        let manager = RegistryManager::new(fleet(false, true)).unwrap();
        let err = manager.check_readonly(Some("dev")).unwrap_err();
        assert!(matches!(
            err,
            WardenError::ReadonlyBlocked { global: true, .. }
        ));
    }

    #[test]
    fn test_set_default_switches_resolution() {
        let manager = RegistryManager::new(fleet(false, false)).unwrap();
        manager.set_default("prod").unwrap();
        assert_eq!(manager.get(None).unwrap().name(), "prod");
        assert!(manager.set_default("ghost").is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = fleet(false, false);
        config.registries[1].name = "dev".to_string();
        assert!(RegistryManager::new(config).is_err());
    }

    #[test]
    fn test_list_is_sorted() {
        let manager = RegistryManager::new(fleet(false, false)).unwrap();
        assert_eq!(manager.list(), vec!["dev", "prod"]);
    }
}
