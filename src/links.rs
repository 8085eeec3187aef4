//! `registry://` resource URI generation.
//!
//! Tool responses carry a `_links` map so callers can navigate between
//! related resources without reconstructing paths.

use std::collections::HashMap;

use crate::registry::is_default_context;

/// Builds URIs for one registry's resources.
///
/// Registry names are sanitized to `[A-Za-z0-9._-]`; path components are
/// percent-encoded.
pub struct RegistryUriBuilder {
    registry: String,
}

impl RegistryUriBuilder {
    pub fn new(registry: &str) -> Self {
        Self {
            registry: sanitize_name(registry),
        }
    }

    fn base(&self, path: &str) -> String {
        format!("registry://{}{}", self.registry, path)
    }

    fn context_prefix(&self, context: Option<&str>) -> String {
        match context {
            Some(ctx) if !is_default_context(Some(ctx)) => {
                format!("/contexts/{}", encode(ctx))
            }
            _ => String::new(),
        }
    }

    pub fn registry_uri(&self) -> String {
        self.base("")
    }

    pub fn contexts_uri(&self) -> String {
        self.base("/contexts")
    }

    pub fn context_uri(&self, context: &str) -> String {
        self.base(&format!("/contexts/{}", encode(context)))
    }

    pub fn subjects_uri(&self, context: Option<&str>) -> String {
        self.base(&format!("{}/subjects", self.context_prefix(context)))
    }

    pub fn subject_uri(&self, subject: &str, context: Option<&str>) -> String {
        self.base(&format!(
            "{}/subjects/{}",
            self.context_prefix(context),
            encode(subject)
        ))
    }

    pub fn versions_uri(&self, subject: &str, context: Option<&str>) -> String {
        format!("{}/versions", self.subject_uri(subject, context))
    }

    pub fn version_uri(&self, subject: &str, version: i32, context: Option<&str>) -> String {
        format!("{}/versions/{version}", self.subject_uri(subject, context))
    }

    pub fn subject_config_uri(&self, subject: &str, context: Option<&str>) -> String {
        format!("{}/config", self.subject_uri(subject, context))
    }

    pub fn subject_mode_uri(&self, subject: &str, context: Option<&str>) -> String {
        format!("{}/mode", self.subject_uri(subject, context))
    }

    pub fn compatibility_uri(&self, subject: &str, context: Option<&str>) -> String {
        format!("{}/compatibility", self.subject_uri(subject, context))
    }

    pub fn config_uri(&self, context: Option<&str>) -> String {
        self.base(&format!("{}/config", self.context_prefix(context)))
    }

    pub fn mode_uri(&self, context: Option<&str>) -> String {
        self.base(&format!("{}/mode", self.context_prefix(context)))
    }

    pub fn migration_uri(&self, migration_id: &str) -> String {
        self.base(&format!("/migrations/{}", encode(migration_id)))
    }

    pub fn migrations_uri(&self) -> String {
        self.base("/migrations")
    }

    pub fn task_uri(&self, task_id: &str) -> String {
        self.base(&format!("/tasks/{}", encode(task_id)))
    }

    pub fn tasks_uri(&self) -> String {
        self.base("/tasks")
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn encode(component: &str) -> String {
    urlencoding::encode(component).into_owned()
}

/// `_links` for a schema version response.
pub fn schema_links(
    registry: &str,
    subject: &str,
    version: i32,
    context: Option<&str>,
) -> HashMap<String, String> {
    let uris = RegistryUriBuilder::new(registry);
    HashMap::from([
        ("self".to_string(), uris.version_uri(subject, version, context)),
        ("subject".to_string(), uris.subject_uri(subject, context)),
        ("versions".to_string(), uris.versions_uri(subject, context)),
        ("config".to_string(), uris.subject_config_uri(subject, context)),
        (
            "compatibility".to_string(),
            uris.compatibility_uri(subject, context),
        ),
    ])
}

/// `_links` for a subject-level response.
pub fn subject_links(
    registry: &str,
    subject: &str,
    context: Option<&str>,
) -> HashMap<String, String> {
    let uris = RegistryUriBuilder::new(registry);
    HashMap::from([
        ("self".to_string(), uris.subject_uri(subject, context)),
        ("versions".to_string(), uris.versions_uri(subject, context)),
        ("config".to_string(), uris.subject_config_uri(subject, context)),
        ("mode".to_string(), uris.subject_mode_uri(subject, context)),
    ])
}

/// `_links` for a migration result.
pub fn migration_links(registry: &str, migration_id: &str) -> HashMap<String, String> {
    let uris = RegistryUriBuilder::new(registry);
    HashMap::from([
        ("self".to_string(), uris.migration_uri(migration_id)),
        ("migrations".to_string(), uris.migrations_uri()),
    ])
}

/// `_links` for an async task response.
pub fn task_links(registry: &str, task_id: &str) -> HashMap<String, String> {
    let uris = RegistryUriBuilder::new(registry);
    HashMap::from([
        ("self".to_string(), uris.task_uri(task_id)),
        ("tasks".to_string(), uris.tasks_uri()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_uri_shape() {
        let uris = RegistryUriBuilder::new("prod");
        assert_eq!(
            uris.version_uri("user-events", 3, Some("team-a")),
            "registry://prod/contexts/team-a/subjects/user-events/versions/3"
        );
    }

    #[test]
    fn test_default_context_elided() {
        let uris = RegistryUriBuilder::new("dev");
        assert_eq!(
            uris.subject_uri("orders", None),
            "registry://dev/subjects/orders"
        );
        assert_eq!(
            uris.subject_uri("orders", Some(".")),
            uris.subject_uri("orders", None)
        );
    }

    #[test]
    fn test_registry_name_sanitized() {
        let uris = RegistryUriBuilder::new("prod registry/eu");
        assert_eq!(uris.registry_uri(), "registry://prod_registry_eu");
    }

    #[test]
    fn test_subject_percent_encoding() {
        let uris = RegistryUriBuilder::new("dev");
        assert_eq!(
            uris.subject_uri("com.example/User value", None),
            "registry://dev/subjects/com.example%2FUser%20value"
        );
    }

    #[test]
    fn test_task_and_migration_links() {
        let links = task_links("dev", "abc-123");
        assert_eq!(links["self"], "registry://dev/tasks/abc-123");
        let links = migration_links("dev", "m-9");
        assert_eq!(links["self"], "registry://dev/migrations/m-9");
    }
}
