//! Ancillary migration utilities: registry comparison, missing-schema
//! detection, and batch context cleanup.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{Result, WardenError};
use crate::registry::RegistryManager;
use crate::tasks::{TaskContext, WORKER_POOL_SIZE};

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SubjectComparison {
    pub source_only: Vec<String>,
    pub target_only: Vec<String>,
    pub common: Vec<String>,
    pub source_total: usize,
    pub target_total: usize,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct RegistryComparison {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub compared_at: DateTime<Utc>,
    pub subjects: SubjectComparison,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct MissingSchemas {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub missing: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ClearContextResult {
    pub registry: String,
    pub context: String,
    pub dry_run: bool,
    pub subjects_found: usize,
    pub subjects_deleted: usize,
    pub subjects_failed: usize,
    pub context_deleted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub duration_seconds: f64,
    /// Deleted / found, 1.0 for an empty context.
    pub success_rate: f64,
    /// Subjects per second over the deletion phase.
    pub performance: f64,
}

pub struct MigrationUtilities {
    registries: Arc<RegistryManager>,
}

impl MigrationUtilities {
    pub fn new(registries: Arc<RegistryManager>) -> Self {
        Self { registries }
    }

    /// Subject-level diff between two registries, optionally scoped to one
    /// context on both sides.
    pub async fn compare_registries(
        &self,
        source: &str,
        target: &str,
        context: Option<&str>,
    ) -> Result<RegistryComparison> {
        let source_client = self.registries.get(Some(source))?;
        let target_client = self.registries.get(Some(target))?;

        let (source_subjects, target_subjects) = tokio::join!(
            source_client.list_subjects(context),
            target_client.list_subjects(context),
        );
        let source_subjects = source_subjects?;
        let target_subjects = target_subjects?;

        let source_set: HashSet<&String> = source_subjects.iter().collect();
        let target_set: HashSet<&String> = target_subjects.iter().collect();

        let mut source_only: Vec<String> = source_set
            .difference(&target_set)
            .map(|s| s.to_string())
            .collect();
        let mut target_only: Vec<String> = target_set
            .difference(&source_set)
            .map(|s| s.to_string())
            .collect();
        let mut common: Vec<String> = source_set
            .intersection(&target_set)
            .map(|s| s.to_string())
            .collect();
        source_only.sort();
        target_only.sort();
        common.sort();

        Ok(RegistryComparison {
            source: source.to_string(),
            target: target.to_string(),
            context: context.map(str::to_string),
            compared_at: Utc::now(),
            subjects: SubjectComparison {
                source_total: source_subjects.len(),
                target_total: target_subjects.len(),
                source_only,
                target_only,
                common,
            },
        })
    }

    /// Subjects present in the source but absent from the target.
    pub async fn find_missing_schemas(
        &self,
        source: &str,
        target: &str,
        context: Option<&str>,
    ) -> Result<MissingSchemas> {
        let comparison = self.compare_registries(source, target, context).await?;
        Ok(MissingSchemas {
            source: comparison.source,
            target: comparison.target,
            context: comparison.context,
            count: comparison.subjects.source_only.len(),
            missing: comparison.subjects.source_only,
        })
    }

    /// Delete every subject in a context, bounded by the worker-pool width,
    /// optionally removing the context itself afterwards.
    pub async fn clear_context(
        &self,
        registry: &str,
        context: &str,
        delete_context_after: bool,
        dry_run: bool,
        task: Option<&TaskContext>,
    ) -> Result<ClearContextResult> {
        self.registries.check_readonly(Some(registry))?;
        let client = self.registries.get(Some(registry))?;
        let started = Instant::now();

        let subjects = client.list_subjects(Some(context)).await?;
        let subjects_found = subjects.len();

        if dry_run {
            return Ok(ClearContextResult {
                registry: registry.to_string(),
                context: context.to_string(),
                dry_run: true,
                subjects_found,
                subjects_deleted: 0,
                subjects_failed: 0,
                context_deleted: false,
                failures: Vec::new(),
                warnings: vec![format!(
                    "dry run: {subjects_found} subjects would be deleted"
                )],
                duration_seconds: started.elapsed().as_secs_f64(),
                success_rate: 1.0,
                performance: 0.0,
            });
        }

        let deletions = stream::iter(subjects.into_iter().map(|subject| {
            let client = client.clone();
            let context = context.to_string();
            async move {
                let result = client.delete_subject(&subject, Some(&context)).await;
                (subject, result)
            }
        }))
        .buffer_unordered(WORKER_POOL_SIZE)
        .collect::<Vec<_>>()
        .await;

        if let Some(task) = task {
            task.check_cancelled()?;
            task.update_progress(90.0);
        }

        let mut subjects_deleted = 0usize;
        let mut failures = Vec::new();
        for (subject, result) in deletions {
            match result {
                Ok(_) => subjects_deleted += 1,
                Err(e) => failures.push(format!("{subject}: {e}")),
            }
        }
        let subjects_failed = failures.len();

        // Context deletion is best effort; not all upstreams support it.
        let mut warnings = Vec::new();
        let mut context_deleted = false;
        if delete_context_after && subjects_failed == 0 {
            match client.delete_context(context).await {
                Ok(()) => context_deleted = true,
                Err(WardenError::ImportModeUnsupported { .. })
                | Err(WardenError::Upstream { .. }) => {
                    warnings.push(format!(
                        "registry '{registry}' does not support context deletion; context \
                         '{context}' left in place"
                    ));
                }
                Err(e) => warnings.push(format!("context deletion failed: {e}")),
            }
        }

        let duration_seconds = started.elapsed().as_secs_f64();
        Ok(ClearContextResult {
            registry: registry.to_string(),
            context: context.to_string(),
            dry_run: false,
            subjects_found,
            subjects_deleted,
            subjects_failed,
            context_deleted,
            failures,
            warnings,
            duration_seconds,
            success_rate: if subjects_found == 0 {
                1.0
            } else {
                subjects_deleted as f64 / subjects_found as f64
            },
            performance: if duration_seconds > 0.0 {
                subjects_deleted as f64 / duration_seconds
            } else {
                0.0
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FleetConfig, RegistryConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn utilities(urls: &[(&str, &str)], readonly: &[&str]) -> MigrationUtilities {
        let fleet = FleetConfig {
            registries: urls
                .iter()
                .map(|(name, url)| RegistryConfig {
                    name: name.to_string(),
                    url: url.to_string(),
                    user: None,
                    password: None,
                    readonly: readonly.contains(name),
                    description: String::new(),
                })
                .collect(),
            default_registry: urls.first().map(|(name, _)| name.to_string()),
            global_readonly: false,
        };
        MigrationUtilities::new(Arc::new(RegistryManager::new(fleet).unwrap()))
    }

    #[tokio::test]
    async fn test_compare_registries_partitions_subjects() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["a", "b", "c"]))
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["b", "c", "d"]))
            .mount(&target)
            .await;

        let utils = utilities(&[("dev", &source.uri()), ("prod", &target.uri())], &[]);
        let comparison = utils.compare_registries("dev", "prod", None).await.unwrap();

        assert_eq!(comparison.subjects.source_only, vec!["a"]);
        assert_eq!(comparison.subjects.target_only, vec!["d"]);
        assert_eq!(comparison.subjects.common, vec!["b", "c"]);
        assert_eq!(comparison.subjects.source_total, 3);
        assert_eq!(comparison.subjects.target_total, 3);
    }

    #[tokio::test]
    async fn test_find_missing_schemas() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["x", "y"]))
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["y"]))
            .mount(&target)
            .await;

        let utils = utilities(&[("dev", &source.uri()), ("prod", &target.uri())], &[]);
        let missing = utils.find_missing_schemas("dev", "prod", None).await.unwrap();
        assert_eq!(missing.missing, vec!["x"]);
        assert_eq!(missing.count, 1);
    }

    #[tokio::test]
    async fn test_clear_context_dry_run_reports_plan_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contexts/team-a/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["a", "b"]))
            .mount(&server)
            .await;

        let utils = utilities(&[("dev", &server.uri())], &[]);
        let result = utils
            .clear_context("dev", "team-a", false, true, None)
            .await
            .unwrap();
        assert!(result.dry_run);
        assert_eq!(result.subjects_found, 2);
        assert_eq!(result.subjects_deleted, 0);
        // DELETE was never called.
        let deletes = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method == wiremock::http::Method::DELETE)
            .count();
        assert_eq!(deletes, 0);
    }

    #[tokio::test]
    async fn test_clear_context_deletes_and_aggregates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contexts/team-a/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["good", "bad"]))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/contexts/team-a/subjects/good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![1, 2]))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/contexts/team-a/subjects/bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let utils = utilities(&[("dev", &server.uri())], &[]);
        let result = utils
            .clear_context("dev", "team-a", false, false, None)
            .await
            .unwrap();
        assert_eq!(result.subjects_deleted, 1);
        assert_eq!(result.subjects_failed, 1);
        assert!((result.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_clear_context_refused_on_readonly_registry() {
        let server = MockServer::start().await;
        let utils = utilities(&[("prod", &server.uri())], &["prod"]);
        let err = utils
            .clear_context("prod", "team-a", false, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::ReadonlyBlocked { .. }));
        // Refused before any side effect.
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
