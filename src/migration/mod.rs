//! Cross-registry migration engine.
//!
//! Moves schemas and whole contexts between registries, preserving version
//! order and (when the target cooperates) schema ids via an IMPORT-mode
//! window that is restored on every exit path.

pub mod compare;
pub mod handoff;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{Result, WardenError};
use crate::registry::client::is_default_context;
use crate::registry::types::Mode;
use crate::registry::{RegistryClient, RegistryManager};
use crate::tasks::TaskContext;

pub use handoff::HandoffBundle;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    #[default]
    Skip,
    Overwrite,
}

/// Inputs for a single-schema migration.
#[derive(Debug, Clone)]
pub struct SchemaMigrationOptions {
    pub subject: String,
    pub source_registry: String,
    pub target_registry: String,
    pub source_context: Option<String>,
    /// Defaults to the source context.
    pub target_context: Option<String>,
    pub preserve_ids: bool,
    pub migrate_all_versions: bool,
    pub dry_run: bool,
    /// Explicit version subset; `None` means all (or latest only).
    pub versions: Option<Vec<i32>>,
    pub conflict_resolution: ConflictResolution,
}

impl SchemaMigrationOptions {
    pub fn new(subject: &str, source_registry: &str, target_registry: &str) -> Self {
        Self {
            subject: subject.to_string(),
            source_registry: source_registry.to_string(),
            target_registry: target_registry.to_string(),
            source_context: None,
            target_context: None,
            preserve_ids: true,
            migrate_all_versions: true,
            dry_run: false,
            versions: None,
            conflict_resolution: ConflictResolution::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Migrated,
    Planned,
    Failed,
}

/// Per-version outcome inside a schema migration.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct VersionOutcome {
    pub version: i32,
    pub source_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_id: Option<i64>,
    pub status: VersionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SchemaMigrationResult {
    pub subject: String,
    pub source_registry: String,
    pub target_registry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_context: Option<String>,
    pub migrated_versions: Vec<VersionOutcome>,
    /// Effective value: false when the target rejected IMPORT mode.
    pub preserve_ids: bool,
    pub dry_run: bool,
    pub versions_migrated: usize,
    pub versions_failed: usize,
    pub total_versions: usize,
    pub context_existed: bool,
    pub subject_existed: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Either a performed (or planned) migration, or an advisory handoff bundle
/// when source and target are the same physical registry.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum SchemaMigrationOutcome {
    Migrated(SchemaMigrationResult),
    Handoff(HandoffBundle),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContextMigrationStatus {
    Completed,
    Partial,
    Failed,
    Empty,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SubjectSuccess {
    pub subject: String,
    pub result: SchemaMigrationResult,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SubjectFailure {
    pub subject: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SubjectSkip {
    pub subject: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ContextMigrationResult {
    pub context: String,
    pub target_context: String,
    pub source_registry: String,
    pub target_registry: String,
    /// Explicitly zero for an empty source context; never conflated with
    /// failure.
    pub subjects_found: usize,
    pub total_subjects: usize,
    pub successful: Vec<SubjectSuccess>,
    pub failed: Vec<SubjectFailure>,
    pub skipped: Vec<SubjectSkip>,
    pub status: ContextMigrationStatus,
    pub dry_run: bool,
    pub migrated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum ContextMigrationOutcome {
    Migrated(ContextMigrationResult),
    Handoff(HandoffBundle),
}

/// Scope (and prior value) of an opened IMPORT-mode window.
enum ModeWindow {
    Subject { subject: String, prior: Mode },
    Context { prior: Mode },
    Global { prior: Mode },
}

pub struct MigrationEngine {
    registries: Arc<RegistryManager>,
}

impl MigrationEngine {
    pub fn new(registries: Arc<RegistryManager>) -> Self {
        Self { registries }
    }

    /// Strip a pre-qualified `:.ctx:name` subject down to the bare name.
    pub fn normalize_subject(subject: &str) -> String {
        if subject.starts_with(':') {
            if let Some(idx) = subject.rfind(':') {
                if idx > 0 {
                    return subject[idx + 1..].to_string();
                }
            }
        }
        subject.to_string()
    }

    /// Two clients address the same physical registry when their URLs parse
    /// to the same endpoint (trailing slashes and default ports ignored).
    fn same_endpoint(source: &RegistryClient, target: &RegistryClient) -> bool {
        match (url::Url::parse(source.url()), url::Url::parse(target.url())) {
            (Ok(a), Ok(b)) => {
                a.scheme() == b.scheme()
                    && a.host_str() == b.host_str()
                    && a.port_or_known_default() == b.port_or_known_default()
                    && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
            }
            _ => source.url().trim_end_matches('/') == target.url().trim_end_matches('/'),
        }
    }

    /// Migrate one subject between registries.
    pub async fn migrate_schema(
        &self,
        options: &SchemaMigrationOptions,
        task: Option<&TaskContext>,
    ) -> Result<SchemaMigrationOutcome> {
        let source = self.registries.get(Some(&options.source_registry))?;
        let target = self.registries.get(Some(&options.target_registry))?;

        if Self::same_endpoint(&source, &target) {
            tracing::warn!(
                source = %options.source_registry,
                target = %options.target_registry,
                "source and target share one endpoint; emitting handoff bundle"
            );
            return Ok(SchemaMigrationOutcome::Handoff(handoff::build_bundle(
                source.config(),
                options.source_context.as_deref(),
                options.target_context.as_deref(),
                Some(&options.subject),
            )));
        }

        let subject = Self::normalize_subject(&options.subject);
        let source_ctx = options.source_context.as_deref();
        let target_ctx = options
            .target_context
            .as_deref()
            .or(options.source_context.as_deref());

        let source_versions = source.list_versions(&subject, source_ctx).await?;
        if source_versions.is_empty() {
            return Err(WardenError::SubjectNotFound {
                subject,
                registry: options.source_registry.clone(),
            });
        }
        let total_versions = source_versions.len();

        // Ascending order so target version numbers track the source's.
        let mut chosen: Vec<i32> = match &options.versions {
            Some(explicit) => explicit
                .iter()
                .copied()
                .filter(|v| source_versions.contains(v))
                .collect(),
            None if options.migrate_all_versions => source_versions.clone(),
            None => source_versions.iter().copied().max().into_iter().collect(),
        };
        chosen.sort_unstable();

        let mut warnings = Vec::new();
        let context_existed = self
            .ensure_target_context(&target, target_ctx, options.dry_run, &mut warnings)
            .await?;

        let target_versions = target.list_versions(&subject, target_ctx).await?;
        let subject_existed = !target_versions.is_empty();

        if subject_existed && !options.preserve_ids
            && options.conflict_resolution == ConflictResolution::Skip
        {
            return Ok(SchemaMigrationOutcome::Migrated(SchemaMigrationResult {
                subject,
                source_registry: options.source_registry.clone(),
                target_registry: options.target_registry.clone(),
                source_context: source_ctx.map(str::to_string),
                target_context: target_ctx.map(str::to_string),
                migrated_versions: Vec::new(),
                preserve_ids: false,
                dry_run: options.dry_run,
                versions_migrated: 0,
                versions_failed: 0,
                total_versions,
                context_existed,
                subject_existed,
                skipped: true,
                warnings,
            }));
        }

        // ID preservation needs a fresh id space in the target.
        if subject_existed && options.preserve_ids && !options.dry_run {
            target.delete_subject(&subject, target_ctx).await?;
        }

        let mut preserve_ids = options.preserve_ids;
        let mut window = None;
        if preserve_ids && !options.dry_run {
            match self.open_import_window(&target, target_ctx, &subject).await {
                Ok(opened) => window = Some(opened),
                Err(WardenError::ImportModeUnsupported { registry }) => {
                    warnings.push(format!(
                        "registry '{registry}' rejected IMPORT mode; falling back to \
                         auto-assigned ids"
                    ));
                    tracing::warn!(%registry, "IMPORT mode unsupported, dropping preserve_ids");
                    preserve_ids = false;
                }
                Err(other) => return Err(other),
            }
        }

        let copy_result = self
            .copy_versions(
                &source, &target, &subject, source_ctx, target_ctx, &chosen, preserve_ids,
                options.dry_run, task,
            )
            .await;

        // The IMPORT window closes on every exit path, including failure.
        if let Some(window) = window {
            if let Err(e) = self.close_import_window(&target, target_ctx, window).await {
                warnings.push(format!("failed to restore target mode: {e}"));
                tracing::error!(error = %e, "failed to restore target mode");
            }
        }

        let migrated_versions = copy_result?;
        let versions_migrated = migrated_versions
            .iter()
            .filter(|v| v.status != VersionStatus::Failed)
            .count();
        let versions_failed = migrated_versions.len() - versions_migrated;

        Ok(SchemaMigrationOutcome::Migrated(SchemaMigrationResult {
            subject,
            source_registry: options.source_registry.clone(),
            target_registry: options.target_registry.clone(),
            source_context: source_ctx.map(str::to_string),
            target_context: target_ctx.map(str::to_string),
            migrated_versions,
            preserve_ids,
            dry_run: options.dry_run,
            versions_migrated,
            versions_failed,
            total_versions,
            context_existed,
            subject_existed,
            skipped: false,
            warnings,
        }))
    }

    /// Copy the chosen versions in ascending order. Per-version failures are
    /// recorded and the loop continues; only cancellation aborts.
    #[allow(clippy::too_many_arguments)]
    async fn copy_versions(
        &self,
        source: &RegistryClient,
        target: &RegistryClient,
        subject: &str,
        source_ctx: Option<&str>,
        target_ctx: Option<&str>,
        versions: &[i32],
        preserve_ids: bool,
        dry_run: bool,
        task: Option<&TaskContext>,
    ) -> Result<Vec<VersionOutcome>> {
        let mut outcomes = Vec::with_capacity(versions.len());

        for (index, &version) in versions.iter().enumerate() {
            if let Some(task) = task {
                task.check_cancelled()?;
            }

            let record = match source.get_schema(subject, Some(version), source_ctx).await {
                Ok(record) => record,
                Err(e) => {
                    outcomes.push(VersionOutcome {
                        version,
                        source_id: 0,
                        assigned_id: None,
                        status: VersionStatus::Failed,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            if dry_run {
                outcomes.push(VersionOutcome {
                    version,
                    source_id: record.id,
                    assigned_id: preserve_ids.then_some(record.id),
                    status: VersionStatus::Planned,
                    error: None,
                });
            } else {
                let registered = target
                    .register_schema(
                        subject,
                        &record.schema,
                        record.schema_type,
                        target_ctx,
                        preserve_ids.then_some(record.id),
                        preserve_ids.then_some(record.version),
                    )
                    .await;
                match registered {
                    Ok(assigned_id) => outcomes.push(VersionOutcome {
                        version,
                        source_id: record.id,
                        assigned_id: Some(assigned_id),
                        status: VersionStatus::Migrated,
                        error: None,
                    }),
                    Err(e) => outcomes.push(VersionOutcome {
                        version,
                        source_id: record.id,
                        assigned_id: None,
                        status: VersionStatus::Failed,
                        error: Some(e.to_string()),
                    }),
                }
            }

            if let Some(task) = task {
                task.update_progress(((index + 1) as f64 / versions.len() as f64) * 100.0);
            }
        }

        Ok(outcomes)
    }

    /// Make sure the target context exists; returns whether it already did.
    ///
    /// Named contexts are force-created by registering and deleting a
    /// throwaway schema, which is the only portable way to create one.
    async fn ensure_target_context(
        &self,
        target: &RegistryClient,
        context: Option<&str>,
        dry_run: bool,
        _warnings: &mut [String],
    ) -> Result<bool> {
        let Some(ctx) = context.filter(|c| !is_default_context(Some(c))) else {
            return Ok(true);
        };

        let contexts = target.list_contexts().await?;
        let qualified = format!(":.{ctx}:");
        let exists = contexts.iter().any(|c| c == ctx || *c == qualified);
        if exists || dry_run {
            return Ok(exists);
        }

        tracing::info!(context = ctx, registry = target.name(), "creating target context");
        target.create_context(ctx).await?;
        Ok(false)
    }

    /// Put the target into IMPORT mode, most specific scope first.
    async fn open_import_window(
        &self,
        target: &RegistryClient,
        context: Option<&str>,
        subject: &str,
    ) -> Result<ModeWindow> {
        let prior = match target.get_mode(context, None).await {
            Ok(mode) => mode,
            Err(_) => Mode::ReadWrite,
        };

        match target.set_mode(context, Some(subject), Mode::Import).await {
            Ok(_) => {
                return Ok(ModeWindow::Subject {
                    subject: subject.to_string(),
                    prior,
                })
            }
            Err(WardenError::ImportModeUnsupported { .. }) | Err(WardenError::Upstream { .. }) => {}
            Err(other) => return Err(other),
        }

        match target.set_mode(context, None, Mode::Import).await {
            Ok(_) => return Ok(ModeWindow::Context { prior }),
            Err(WardenError::ImportModeUnsupported { .. }) | Err(WardenError::Upstream { .. }) => {}
            Err(other) => return Err(other),
        }

        match target.set_mode(None, None, Mode::Import).await {
            Ok(_) => Ok(ModeWindow::Global { prior }),
            Err(WardenError::Upstream { registry, .. }) => {
                Err(WardenError::ImportModeUnsupported { registry })
            }
            Err(other) => Err(other),
        }
    }

    async fn close_import_window(
        &self,
        target: &RegistryClient,
        context: Option<&str>,
        window: ModeWindow,
    ) -> Result<()> {
        match window {
            ModeWindow::Subject { subject, prior } => {
                target.set_mode(context, Some(&subject), prior).await?;
            }
            ModeWindow::Context { prior } => {
                target.set_mode(context, None, prior).await?;
            }
            ModeWindow::Global { prior } => {
                target.set_mode(None, None, prior).await?;
            }
        }
        Ok(())
    }

    /// Migrate every subject of one context.
    pub async fn migrate_context(
        &self,
        context: &str,
        source_registry: &str,
        target_registry: &str,
        target_context: Option<&str>,
        preserve_ids: bool,
        dry_run: bool,
        migrate_all_versions: bool,
        allow_same_registry_copy: bool,
        task: Option<&TaskContext>,
    ) -> Result<ContextMigrationOutcome> {
        let source = self.registries.get(Some(source_registry))?;
        let target = self.registries.get(Some(target_registry))?;
        let target_context = target_context.unwrap_or(context);

        if Self::same_endpoint(&source, &target) && !allow_same_registry_copy {
            // Migrating a registry onto itself would destroy data; hand the
            // caller a runnable package instead.
            return Ok(ContextMigrationOutcome::Handoff(handoff::build_bundle(
                source.config(),
                Some(context),
                Some(target_context),
                None,
            )));
        }

        let subjects = source.list_subjects(Some(context)).await?;
        let subjects_found = subjects.len();
        if subjects.is_empty() {
            // A source context with nothing in it is a zero-count success.
            return Ok(ContextMigrationOutcome::Migrated(ContextMigrationResult {
                context: context.to_string(),
                target_context: target_context.to_string(),
                source_registry: source_registry.to_string(),
                target_registry: target_registry.to_string(),
                subjects_found: 0,
                total_subjects: 0,
                successful: Vec::new(),
                failed: Vec::new(),
                skipped: Vec::new(),
                status: ContextMigrationStatus::Empty,
                dry_run,
                migrated_at: Utc::now(),
            }));
        }

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();

        for (index, subject) in subjects.iter().enumerate() {
            if let Some(task) = task {
                task.check_cancelled()?;
            }

            let options = SchemaMigrationOptions {
                subject: subject.clone(),
                source_registry: source_registry.to_string(),
                target_registry: target_registry.to_string(),
                source_context: Some(context.to_string()),
                target_context: Some(target_context.to_string()),
                preserve_ids,
                migrate_all_versions,
                dry_run,
                versions: None,
                conflict_resolution: ConflictResolution::Skip,
            };

            match self.migrate_schema(&options, None).await {
                Ok(SchemaMigrationOutcome::Migrated(result)) if result.skipped => {
                    skipped.push(SubjectSkip {
                        subject: subject.clone(),
                        reason: "subject already exists in target".to_string(),
                    });
                }
                Ok(SchemaMigrationOutcome::Migrated(result)) => {
                    if result.versions_failed > 0 && result.versions_migrated == 0 {
                        failed.push(SubjectFailure {
                            subject: subject.clone(),
                            error: result
                                .migrated_versions
                                .iter()
                                .find_map(|v| v.error.clone())
                                .unwrap_or_else(|| "all versions failed".to_string()),
                        });
                    } else {
                        successful.push(SubjectSuccess {
                            subject: subject.clone(),
                            result,
                        });
                    }
                }
                // Same-endpoint was already ruled out above.
                Ok(SchemaMigrationOutcome::Handoff(_)) => {
                    failed.push(SubjectFailure {
                        subject: subject.clone(),
                        error: "unexpected same-registry handoff".to_string(),
                    });
                }
                Err(WardenError::TaskCancelled { task_id }) => {
                    return Err(WardenError::TaskCancelled { task_id });
                }
                Err(e) => {
                    failed.push(SubjectFailure {
                        subject: subject.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if let Some(task) = task {
                task.update_progress(((index + 1) as f64 / subjects.len() as f64) * 100.0);
            }
        }

        let status = if failed.is_empty() {
            ContextMigrationStatus::Completed
        } else if successful.is_empty() && skipped.is_empty() {
            ContextMigrationStatus::Failed
        } else {
            ContextMigrationStatus::Partial
        };

        Ok(ContextMigrationOutcome::Migrated(ContextMigrationResult {
            context: context.to_string(),
            target_context: target_context.to_string(),
            source_registry: source_registry.to_string(),
            target_registry: target_registry.to_string(),
            subjects_found,
            total_subjects: subjects_found,
            successful,
            failed,
            skipped,
            status,
            dry_run,
            migrated_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FleetConfig, RegistryConfig};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine_for(source_url: &str, target_url: &str) -> MigrationEngine {
        let fleet = FleetConfig {
            registries: vec![
                RegistryConfig {
                    name: "dev".to_string(),
                    url: source_url.to_string(),
                    user: None,
                    password: None,
                    readonly: false,
                    description: String::new(),
                },
                RegistryConfig {
                    name: "prod".to_string(),
                    url: target_url.to_string(),
                    user: None,
                    password: None,
                    readonly: false,
                    description: String::new(),
                },
            ],
            default_registry: Some("dev".to_string()),
            global_readonly: false,
        };
        MigrationEngine::new(Arc::new(RegistryManager::new(fleet).unwrap()))
    }

    fn schema_version_body(subject: &str, id: i64, version: i32) -> serde_json::Value {
        serde_json::json!({
            "subject": subject,
            "id": id,
            "version": version,
            "schema": "{\"type\":\"record\",\"name\":\"A\",\"fields\":[]}",
        })
    }

    async fn mock_source_subject(server: &MockServer, subject: &str, versions: &[(i64, i32)]) {
        let version_list: Vec<i32> = versions.iter().map(|(_, v)| *v).collect();
        Mock::given(method("GET"))
            .and(path(format!("/subjects/{subject}/versions")))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_list))
            .mount(server)
            .await;
        for (id, version) in versions {
            Mock::given(method("GET"))
                .and(path(format!("/subjects/{subject}/versions/{version}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(schema_version_body(subject, *id, *version)),
                )
                .mount(server)
                .await;
        }
    }

    #[test]
    fn test_normalize_subject() {
        assert_eq!(MigrationEngine::normalize_subject("orders"), "orders");
        assert_eq!(MigrationEngine::normalize_subject(":.ctx:orders"), "orders");
        assert_eq!(
            MigrationEngine::normalize_subject(":.team-a:user-events"),
            "user-events"
        );
    }

    #[tokio::test]
    async fn test_id_preserving_migration_restores_mode() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        mock_source_subject(&source, "user-events", &[(10, 1), (11, 2), (12, 3)]).await;

        // Target: subject absent, mode READWRITE, accepts IMPORT at subject scope.
        Mock::given(method("GET"))
            .and(path("/subjects/user-events/versions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&target)
            .await;
        Mock::given(method("GET"))
            .and(path("/mode"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"mode": "READWRITE"})),
            )
            .mount(&target)
            .await;
        let import_mode = Mock::given(method("PUT"))
            .and(path("/mode/user-events"))
            .and(body_partial_json(serde_json::json!({"mode": "IMPORT"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"mode": "IMPORT"})),
            )
            .expect(1)
            .named("open import window");
        import_mode.mount(&target).await;
        let restore_mode = Mock::given(method("PUT"))
            .and(path("/mode/user-events"))
            .and(body_partial_json(serde_json::json!({"mode": "READWRITE"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"mode": "READWRITE"})),
            )
            .expect(1)
            .named("close import window");
        restore_mode.mount(&target).await;
        Mock::given(method("POST"))
            .and(path("/subjects/user-events/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 10})))
            .expect(3)
            .mount(&target)
            .await;

        let engine = engine_for(&source.uri(), &target.uri());
        let outcome = engine
            .migrate_schema(
                &SchemaMigrationOptions::new("user-events", "dev", "prod"),
                None,
            )
            .await
            .unwrap();

        let SchemaMigrationOutcome::Migrated(result) = outcome else {
            panic!("expected migration result");
        };
        assert_eq!(result.versions_migrated, 3);
        assert_eq!(result.versions_failed, 0);
        assert!(result.preserve_ids);
        assert!(!result.subject_existed);
        // Ascending version order.
        let versions: Vec<i32> = result.migrated_versions.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_import_rejected_falls_back_to_auto_ids() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        mock_source_subject(&source, "orders", &[(5, 1)]).await;

        Mock::given(method("GET"))
            .and(path("/subjects/orders/versions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&target)
            .await;
        Mock::given(method("GET"))
            .and(path("/mode"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"mode": "READWRITE"})),
            )
            .mount(&target)
            .await;
        // Every IMPORT attempt is rejected with 405.
        Mock::given(method("PUT"))
            .and(path("/mode/orders"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&target)
            .await;
        Mock::given(method("PUT"))
            .and(path("/mode"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&target)
            .await;
        // Registration must NOT carry an id after the fallback.
        Mock::given(method("POST"))
            .and(path("/subjects/orders/versions"))
            .and(body_partial_json(serde_json::json!({"schemaType": "AVRO"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 99})))
            .expect(1)
            .mount(&target)
            .await;

        let engine = engine_for(&source.uri(), &target.uri());
        let outcome = engine
            .migrate_schema(&SchemaMigrationOptions::new("orders", "dev", "prod"), None)
            .await
            .unwrap();

        let SchemaMigrationOutcome::Migrated(result) = outcome else {
            panic!("expected migration result");
        };
        assert!(!result.preserve_ids);
        assert_eq!(result.versions_migrated, 1);
        assert!(result.warnings.iter().any(|w| w.contains("IMPORT")));
        assert_eq!(result.migrated_versions[0].assigned_id, Some(99));

        // The registration body carried no explicit id after the fallback.
        let register_bodies: Vec<serde_json::Value> = target
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| {
                r.method == wiremock::http::Method::POST
                    && r.url.path() == "/subjects/orders/versions"
            })
            .map(|r| r.body_json().unwrap())
            .collect();
        assert_eq!(register_bodies.len(), 1);
        assert!(register_bodies[0].get("id").is_none());
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_writes() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        mock_source_subject(&source, "orders", &[(5, 1), (6, 2)]).await;

        Mock::given(method("GET"))
            .and(path("/subjects/orders/versions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&target)
            .await;
        // No POST/PUT/DELETE mocks on the target: any write would 404 and
        // fail the migration, so a clean pass proves zero mutations.

        let engine = engine_for(&source.uri(), &target.uri());
        let mut options = SchemaMigrationOptions::new("orders", "dev", "prod");
        options.dry_run = true;
        let outcome = engine.migrate_schema(&options, None).await.unwrap();

        let SchemaMigrationOutcome::Migrated(result) = outcome else {
            panic!("expected migration result");
        };
        assert!(result.dry_run);
        assert_eq!(result.versions_migrated, 2);
        assert!(result
            .migrated_versions
            .iter()
            .all(|v| v.status == VersionStatus::Planned));
    }

    #[tokio::test]
    async fn test_missing_source_subject() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subjects/ghost/versions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&source)
            .await;

        let engine = engine_for(&source.uri(), &target.uri());
        let err = engine
            .migrate_schema(&SchemaMigrationOptions::new("ghost", "dev", "prod"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::SubjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_existing_subject_skipped_without_preserve_ids() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        mock_source_subject(&source, "orders", &[(5, 1)]).await;
        Mock::given(method("GET"))
            .and(path("/subjects/orders/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![1]))
            .mount(&target)
            .await;

        let engine = engine_for(&source.uri(), &target.uri());
        let mut options = SchemaMigrationOptions::new("orders", "dev", "prod");
        options.preserve_ids = false;
        let outcome = engine.migrate_schema(&options, None).await.unwrap();

        let SchemaMigrationOutcome::Migrated(result) = outcome else {
            panic!("expected migration result");
        };
        assert!(result.skipped);
        assert!(result.subject_existed);
        assert_eq!(result.versions_migrated, 0);
    }

    #[tokio::test]
    async fn test_same_url_yields_handoff_bundle() {
        let server = MockServer::start().await;
        let engine = engine_for(&server.uri(), &server.uri());

        let outcome = engine
            .migrate_context(".", "dev", "prod", Some("backup"), true, false, true, false, None)
            .await
            .unwrap();
        let ContextMigrationOutcome::Handoff(bundle) = outcome else {
            panic!("expected handoff bundle");
        };
        assert!(bundle.compose_file.contains("schema-registry"));
        assert!(bundle.env_file.contains("SOURCE_CONTEXT"));
        // Zero HTTP calls were made.
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_migration_empty_is_explicit_zero() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<String>::new()))
            .mount(&source)
            .await;

        let engine = engine_for(&source.uri(), &target.uri());
        let outcome = engine
            .migrate_context(".", "dev", "prod", None, true, false, true, false, None)
            .await
            .unwrap();
        let ContextMigrationOutcome::Migrated(result) = outcome else {
            panic!("expected migration result");
        };
        assert_eq!(result.subjects_found, 0);
        assert_eq!(result.status, ContextMigrationStatus::Empty);
    }

    #[tokio::test]
    async fn test_context_migration_default_context_dot() {
        let source = MockServer::start().await;
        let target = MockServer::start().await;

        // Subjects listed at the bare /subjects path for context ".".
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["a", "b", "c"]))
            .mount(&source)
            .await;
        for subject in ["a", "b", "c"] {
            mock_source_subject(&source, subject, &[(1, 1)]).await;
            Mock::given(method("GET"))
                .and(path(format!("/subjects/{subject}/versions")))
                .respond_with(ResponseTemplate::new(404))
                .mount(&target)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("/subjects/{subject}/versions")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})),
                )
                .mount(&target)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/mode"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"mode": "READWRITE"})),
            )
            .mount(&target)
            .await;
        Mock::given(method("PUT"))
            .and(wiremock::matchers::path_regex(r"^/mode(/.+)?$"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = req.body_json().unwrap();
                ResponseTemplate::new(200).set_body_json(body)
            })
            .mount(&target)
            .await;

        let engine = engine_for(&source.uri(), &target.uri());
        let outcome = engine
            .migrate_context(".", "dev", "prod", None, true, false, true, false, None)
            .await
            .unwrap();

        let ContextMigrationOutcome::Migrated(result) = outcome else {
            panic!("expected migration result");
        };
        // The "." context is the default context, not a named one: three
        // subjects must be found, not zero.
        assert_eq!(result.total_subjects, 3);
        assert_eq!(result.successful.len(), 3);
        assert_eq!(result.status, ContextMigrationStatus::Completed);
        assert_eq!(
            result.successful.len() + result.failed.len() + result.skipped.len(),
            result.total_subjects
        );
    }
}
