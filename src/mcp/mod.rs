//! The MCP tool surface.
//!
//! One rmcp tool router exposes every operation of the control plane. Tool
//! wrappers stay thin: each delegates to a free async function over
//! [`WardenState`], and every domain error is returned in-band as an
//! [`ErrorPayload`], never raised through the protocol.

pub mod interactive;
pub mod params;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rmcp::{
    handler::server::tool::{ToolCallContext, ToolRouter},
    handler::server::wrapper::Parameters,
    handler::server::ServerHandler,
    model::{Implementation, InitializeRequestParam, InitializeResult, ServerCapabilities},
    service::{RequestContext, RoleServer},
    tool, Json, ServiceExt,
};
use serde_json::{json, Value};

use crate::defaults::enhancer::ElicitationEnhancer;
use crate::defaults::SmartDefaultsEngine;
use crate::elicitation::{ElicitationManager, ElicitationResponse};
use crate::error::{ErrorPayload, Result, WardenError};
use crate::links;
use crate::migration::compare::MigrationUtilities;
use crate::migration::{
    ConflictResolution, MigrationEngine, SchemaMigrationOptions, SchemaMigrationOutcome,
};
use crate::registry::types::SchemaType;
use crate::registry::RegistryManager;
use crate::tasks::{TaskManager, TaskType};
use crate::workflow::{definitions, executor, WorkflowAdvance, WorkflowRuntime};
use interactive::Collected;
use params::*;

/// Shared state behind every tool.
pub struct WardenState {
    pub registries: Arc<RegistryManager>,
    pub tasks: Arc<TaskManager>,
    pub elicitation: Arc<ElicitationManager>,
    pub workflows: Arc<WorkflowRuntime>,
    pub defaults: Arc<SmartDefaultsEngine>,
    pub enhancer: ElicitationEnhancer,
    pub migration: MigrationEngine,
    pub utilities: MigrationUtilities,
    /// Migration history, keyed by migration id.
    pub migrations: DashMap<String, Value>,
}

impl WardenState {
    pub fn from_env() -> Result<Arc<Self>> {
        let registries = Arc::new(RegistryManager::from_env()?);
        let elicitation = Arc::new(ElicitationManager::new());
        let defaults = Arc::new(SmartDefaultsEngine::with_default_storage()?);
        let workflows = Arc::new(WorkflowRuntime::with_builtin_workflows(Arc::clone(
            &elicitation,
        ))?);
        Ok(Arc::new(Self {
            enhancer: ElicitationEnhancer::new(Arc::clone(&defaults)),
            migration: MigrationEngine::new(Arc::clone(&registries)),
            utilities: MigrationUtilities::new(Arc::clone(&registries)),
            tasks: Arc::new(TaskManager::new()),
            elicitation,
            workflows,
            defaults,
            registries,
            migrations: DashMap::new(),
        }))
    }

    fn record_migration(&self, kind: &str, detail: Value) -> String {
        let migration_id = uuid::Uuid::new_v4().to_string();
        self.migrations.insert(
            migration_id.clone(),
            json!({
                "migration_id": migration_id.clone(),
                "kind": kind,
                "recorded_at": chrono::Utc::now(),
                "detail": detail,
            }),
        );
        migration_id
    }
}

/// Output schema for tools returning an arbitrary JSON object payload.
///
/// `rmcp`'s derived schema for `serde_json::Value` has no root `type`, which
/// the MCP spec (and rmcp's own runtime check) rejects; every tool here
/// always serializes to a JSON object via [`respond`], so we declare that
/// shape explicitly.
fn value_output_schema() -> std::sync::Arc<rmcp::model::JsonObject> {
    std::sync::Arc::new(
        json!({
            "type": "object",
            "additionalProperties": true
        })
        .as_object()
        .cloned()
        .expect("literal is an object"),
    )
}

/// Serialize a domain result into the tool payload; errors become in-band
/// [`ErrorPayload`] values.
fn respond<T: serde::Serialize>(result: Result<T>) -> std::result::Result<Json<Value>, String> {
    let value = match result {
        Ok(value) => serde_json::to_value(value),
        Err(err) => serde_json::to_value(ErrorPayload::from(&err)),
    };
    value.map(Json).map_err(|e| e.to_string())
}

fn schema_body_to_string(schema: &Value) -> String {
    match schema {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ===== registry management =====

async fn list_registries(state: &WardenState) -> Result<Value> {
    let names = state.registries.list();
    Ok(json!({
        "registries": names,
        "default_registry": state.registries.default_registry(),
        "total": state.registries.list().len(),
        "global_readonly": state.registries.global_readonly(),
    }))
}

async fn check_readonly(state: &WardenState, registry: Option<&str>) -> Result<Value> {
    match state.registries.check_readonly(registry) {
        Ok(()) => Ok(json!({
            "readonly_mode": false,
            "registry": registry.map(str::to_string)
                .or_else(|| state.registries.default_registry()),
        })),
        Err(err) => Ok(serde_json::to_value(ErrorPayload::from(&err)).unwrap_or_default()),
    }
}

// ===== schema operations =====

async fn register_schema(state: &WardenState, params: RegisterSchemaParams) -> Result<Value> {
    state
        .registries
        .check_readonly(params.registry.as_deref())?;
    let client = state.registries.get(params.registry.as_deref())?;
    let context = params.context.as_deref();
    let schema_type = params.schema_type.unwrap_or(SchemaType::Avro);

    // No body supplied: guide the caller through field definition.
    let (schema, elicited) = match &params.schema {
        Some(schema) => (schema_body_to_string(schema), None),
        None => {
            match interactive::collect_schema_definition(&state.elicitation, &state.enhancer, context)
                .await?
            {
                Collected::Pending(request) => {
                    return Ok(interactive::pending_payload(&request))
                }
                Collected::Values(values) => {
                    let body = interactive::build_record_schema(&params.subject, &values);
                    (body.to_string(), Some(values))
                }
            }
        }
    };

    let id = client
        .register_schema(&params.subject, &schema, schema_type, context, None, None)
        .await?;

    let mut result = json!({
        "subject": params.subject.clone(),
        "id": id,
        "registry": client.name(),
        "context": context,
        "schema_type": schema_type,
        "_links": links::subject_links(client.name(), &params.subject, context),
    });
    if let Some(values) = elicited {
        result["elicitation_used"] = true.into();
        result["elicited_values"] = serde_json::to_value(values).unwrap_or_default();
        result["schema"] = schema.into();
    }
    Ok(result)
}

async fn get_schema(state: &WardenState, params: GetSchemaParams) -> Result<Value> {
    let client = state.registries.get(params.registry.as_deref())?;
    let context = params.context.as_deref();
    let record = client
        .get_schema(&params.subject, params.version, context)
        .await?;
    let mut value = serde_json::to_value(&record).map_err(|e| WardenError::Config {
        message: e.to_string(),
    })?;
    value["registry"] = client.name().into();
    value["_links"] = serde_json::to_value(links::schema_links(
        client.name(),
        &record.subject,
        record.version,
        context,
    ))
    .unwrap_or_default();
    Ok(value)
}

async fn delete_subject(state: &WardenState, params: SubjectParams) -> Result<Value> {
    state
        .registries
        .check_readonly(params.registry.as_deref())?;
    let client = state.registries.get(params.registry.as_deref())?;
    let versions = client
        .delete_subject(&params.subject, params.context.as_deref())
        .await?;
    Ok(json!({
        "subject": params.subject,
        "registry": client.name(),
        "deleted_versions": versions,
    }))
}

// ===== migration =====

async fn migrate_schema(state: &WardenState, params: MigrateSchemaParams) -> Result<Value> {
    state
        .registries
        .check_readonly(Some(&params.target_registry))?;

    // All preference flags omitted: collect them interactively.
    let mut preferences: Option<HashMap<String, Value>> = None;
    if params.preserve_ids.is_none()
        && params.migrate_all_versions.is_none()
        && params.dry_run.is_none()
    {
        match interactive::collect_migration_preferences(
            &state.elicitation,
            &state.enhancer,
            &params.source_registry,
            &params.target_registry,
            params.source_context.as_deref(),
        )
        .await?
        {
            Collected::Pending(request) => return Ok(interactive::pending_payload(&request)),
            Collected::Values(values) => preferences = Some(values),
        }
    }

    let prefs = preferences.clone().unwrap_or_default();
    let options = SchemaMigrationOptions {
        subject: params.subject.clone(),
        source_registry: params.source_registry.clone(),
        target_registry: params.target_registry.clone(),
        source_context: params.source_context.clone(),
        target_context: params.target_context.clone(),
        preserve_ids: params
            .preserve_ids
            .unwrap_or_else(|| interactive::pref_bool(&prefs, "preserve_ids", true)),
        migrate_all_versions: params
            .migrate_all_versions
            .unwrap_or_else(|| interactive::pref_bool(&prefs, "migrate_all_versions", true)),
        dry_run: params
            .dry_run
            .unwrap_or_else(|| interactive::pref_bool(&prefs, "dry_run", false)),
        versions: params.versions.clone(),
        conflict_resolution: match prefs.get("conflict_resolution").and_then(Value::as_str) {
            Some("overwrite") => ConflictResolution::Overwrite,
            _ => ConflictResolution::Skip,
        },
    };

    let outcome = state.migration.migrate_schema(&options, None).await?;
    let mut value = serde_json::to_value(&outcome).map_err(|e| WardenError::Config {
        message: e.to_string(),
    })?;

    if let SchemaMigrationOutcome::Migrated(_) = &outcome {
        let migration_id = state.record_migration("schema", value.clone());
        value["migration_id"] = migration_id.clone().into();
        value["_links"] = serde_json::to_value(links::migration_links(
            &params.target_registry,
            &migration_id,
        ))
        .unwrap_or_default();
    }
    if let Some(values) = preferences {
        value["elicitation_used"] = true.into();
        value["elicited_values"] = serde_json::to_value(values).unwrap_or_default();
    }
    Ok(value)
}

/// Long-running: runs as an async task and returns the task id immediately.
async fn migrate_context(state: &Arc<WardenState>, params: MigrateContextParams) -> Result<Value> {
    state
        .registries
        .check_readonly(Some(&params.target_registry))?;

    let task = state.tasks.create(
        TaskType::Migration,
        json!({
            "operation": "migrate_context",
            "context": params.context.clone(),
            "source_registry": params.source_registry.clone(),
            "target_registry": params.target_registry.clone(),
        }),
    )?;

    let task_id = task.id.clone();
    let target_registry = params.target_registry.clone();
    let run_state = Arc::clone(state);
    let run_task_id = task_id.clone();
    tokio::spawn(async move {
        let body_state = Arc::clone(&run_state);
        let body_params = params;
        run_state
            .tasks
            .execute(&run_task_id, move |ctx| async move {
                let outcome = body_state
                    .migration
                    .migrate_context(
                        &body_params.context,
                        &body_params.source_registry,
                        &body_params.target_registry,
                        body_params.target_context.as_deref(),
                        body_params.preserve_ids.unwrap_or(true),
                        body_params.dry_run.unwrap_or(false),
                        body_params.migrate_all_versions.unwrap_or(true),
                        body_params.allow_same_registry_copy.unwrap_or(false),
                        Some(&ctx),
                    )
                    .await?;
                let value = serde_json::to_value(&outcome).map_err(|e| WardenError::Config {
                    message: e.to_string(),
                })?;
                body_state.record_migration("context", value.clone());
                Ok(value)
            })
            .await;
    });

    Ok(json!({
        "task_id": task_id.clone(),
        "task": state.tasks.get(&task_id),
        "_links": links::task_links(&target_registry, &task_id),
    }))
}

async fn list_migrations(state: &WardenState) -> Result<Value> {
    let mut entries: Vec<Value> = state
        .migrations
        .iter()
        .map(|entry| {
            json!({
                "migration_id": entry.key(),
                "kind": entry.value()["kind"],
                "recorded_at": entry.value()["recorded_at"],
            })
        })
        .collect();
    entries.sort_by_key(|e| e["recorded_at"].as_str().map(str::to_string));
    Ok(json!({"total": entries.len(), "migrations": entries}))
}

async fn get_migration_status(state: &WardenState, migration_id: &str) -> Result<Value> {
    state
        .migrations
        .get(migration_id)
        .map(|entry| entry.clone())
        .ok_or_else(|| WardenError::Config {
            message: format!("migration '{migration_id}' not found"),
        })
}

fn clear_context_task(
    state: &Arc<WardenState>,
    contexts: Vec<(String, String)>,
    delete_context_after: bool,
    dry_run: bool,
) -> Result<Value> {
    // The readonly gate runs before the task is created.
    for (registry, _) in &contexts {
        state.registries.check_readonly(Some(registry))?;
    }

    let task = state.tasks.create(
        TaskType::Cleanup,
        json!({
            "operation": "clear_context_batch",
            "targets": contexts.iter()
                .map(|(r, c)| format!("{r}:{c}"))
                .collect::<Vec<_>>(),
            "dry_run": dry_run,
        }),
    )?;

    let task_id = task.id.clone();
    let run_state = Arc::clone(state);
    let run_task_id = task_id.clone();
    tokio::spawn(async move {
        let body_state = Arc::clone(&run_state);
        run_state
            .tasks
            .execute(&run_task_id, move |ctx| async move {
                let mut results = Vec::new();
                let total = contexts.len();
                for (index, (registry, context)) in contexts.iter().enumerate() {
                    ctx.check_cancelled()?;
                    let result = body_state
                        .utilities
                        .clear_context(registry, context, delete_context_after, dry_run, Some(&ctx))
                        .await;
                    match result {
                        Ok(cleared) => results.push(serde_json::to_value(cleared).unwrap_or_default()),
                        Err(e) => results.push(json!({
                            "registry": registry,
                            "context": context,
                            "error": e.to_string(),
                        })),
                    }
                    ctx.update_progress(((index + 1) as f64 / total as f64) * 100.0);
                }
                Ok(json!({"results": results, "total": total}))
            })
            .await;
    });

    Ok(json!({
        "task_id": task_id,
        "task": state.tasks.get(&task_id),
    }))
}

// ===== workflows & elicitation =====

async fn start_workflow(
    state: &WardenState,
    workflow_id: &str,
    initial_context: Option<HashMap<String, Value>>,
) -> Result<Value> {
    let request = state.workflows.start(workflow_id, initial_context)?;
    Ok(json!({
        "workflow_id": workflow_id,
        "instance_id": request.context.get("workflow_instance_id"),
        "request": request,
    }))
}

async fn workflow_status(state: &WardenState, instance_id: Option<&str>) -> Result<Value> {
    match instance_id {
        None => Ok(json!({"active_workflows": state.workflows.active_workflows()})),
        Some(instance_id) => {
            let workflow_state =
                state
                    .workflows
                    .get_state(instance_id)
                    .ok_or_else(|| WardenError::WorkflowUnknown {
                        workflow_id: instance_id.to_string(),
                    })?;
            let active = state
                .workflows
                .active_workflows()
                .iter()
                .any(|info| info.instance_id == instance_id);
            Ok(json!({
                "instance_id": instance_id,
                "workflow_id": workflow_state.workflow_id,
                "current_step": workflow_state.current_step_id,
                "steps_completed": workflow_state.step_history.len().saturating_sub(1),
                "status": if active { "in_progress" } else { "completed" },
                "aborted": workflow_state.metadata.get("aborted").cloned().unwrap_or(false.into()),
                "created_at": workflow_state.created_at,
                "updated_at": workflow_state.updated_at,
            }))
        }
    }
}

async fn submit_elicitation_response(
    state: &WardenState,
    params: SubmitElicitationParams,
) -> Result<Value> {
    let request = state.elicitation.get_request(&params.request_id);
    let mut response = ElicitationResponse::new(&params.request_id, params.values);
    response.metadata = params.metadata;

    // Workflow-bound requests advance their instance; everything else lands
    // in the plain elicitation table.
    let workflow_bound = request
        .as_ref()
        .map(|r| r.context.contains_key("workflow_instance_id"))
        .unwrap_or(false);

    if workflow_bound {
        match state.workflows.handle_response(response)? {
            WorkflowAdvance::NextStep(next) => Ok(json!({
                "accepted": true,
                "workflow_advanced": true,
                "next_request": next,
            })),
            WorkflowAdvance::Completed(completion) => {
                let plan = executor::build_plan(&completion);
                Ok(json!({
                    "accepted": true,
                    "workflow_completed": true,
                    "completion": completion,
                    "execution_plan": plan,
                }))
            }
        }
    } else {
        state.elicitation.submit(response.clone())?;
        if let Some(request) = request {
            let operation = request
                .context
                .get("operation")
                .and_then(Value::as_str)
                .unwrap_or("elicitation")
                .to_string();
            let op_context = request
                .context
                .get("operation_context")
                .and_then(Value::as_str)
                .map(str::to_string);
            state
                .enhancer
                .record_feedback(&request, &response, &operation, op_context.as_deref());
        }
        Ok(json!({"accepted": true, "request_id": response.request_id}))
    }
}

async fn guided_schema_evolution(
    state: &WardenState,
    params: GuidedEvolutionParams,
) -> Result<Value> {
    let mut initial_context: HashMap<String, Value> = HashMap::new();
    if let Some(subject) = &params.subject {
        initial_context.insert("subject".to_string(), subject.clone().into());

        // With a proposed body in hand, seed the workflow with a structural
        // diff against the current version.
        if let Some(proposed) = &params.proposed_schema {
            let client = state.registries.get(params.registry.as_deref())?;
            match client
                .get_schema(subject, None, params.context.as_deref())
                .await
            {
                Ok(current) => {
                    let analysis = crate::evolution::analyze_change_strings(
                        &current.schema,
                        &schema_body_to_string(proposed),
                    );
                    initial_context.insert(
                        "change_analysis".to_string(),
                        serde_json::to_value(&analysis).unwrap_or_default(),
                    );
                    initial_context.insert(
                        "has_breaking_changes".to_string(),
                        analysis.has_breaking_changes.into(),
                    );
                }
                Err(WardenError::SubjectNotFound { .. }) => {
                    initial_context.insert("subject_is_new".to_string(), true.into());
                }
                Err(other) => return Err(other),
            }
        }
    }

    start_workflow(
        state,
        definitions::SCHEMA_EVOLUTION_ASSISTANT,
        Some(initial_context),
    )
    .await
}

// ===== server =====

#[derive(Clone)]
pub struct SchemaWardenServer {
    state: Arc<WardenState>,
    tool_router: ToolRouter<Self>,
}

#[rmcp::tool_router(router = tool_router)]
impl SchemaWardenServer {
    pub fn bootstrap() -> std::result::Result<Self, String> {
        let state = WardenState::from_env().map_err(|e| e.to_string())?;
        Ok(Self::with_state(state))
    }

    pub fn with_state(state: Arc<WardenState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }

    pub fn state(&self) -> &Arc<WardenState> {
        &self.state
    }

    // --- registry management ---

    #[tool(output_schema = value_output_schema(), name = "listRegistries",
        description = "List all configured Schema Registry instances with the current default."
    )]
    pub async fn list_registries_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(list_registries(&self.state).await)
    }

    #[tool(output_schema = value_output_schema(), name = "getRegistryInfo",
        description = "Get configuration plus live connection health for one registry."
    )]
    pub async fn get_registry_info_tool(
        &self,
        params: Parameters<NamedRegistryParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(self.state.registries.info(&params.0.registry).await)
    }

    #[tool(output_schema = value_output_schema(), name = "testRegistryConnection",
        description = "Probe one registry endpoint and report status and round-trip time."
    )]
    pub async fn test_registry_connection_tool(
        &self,
        params: Parameters<RegistryParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let result = match self.state.registries.get(params.0.registry.as_deref()) {
            Ok(client) => Ok(client.test_connection().await),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "testAllRegistries",
        description = "Probe every configured registry concurrently and aggregate the results."
    )]
    pub async fn test_all_registries_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        if self.state.registries.is_empty() {
            return respond::<Value>(Err(WardenError::Config {
                message: "no registry configured".to_string(),
            }));
        }
        respond(Ok(self.state.registries.test_all().await))
    }

    #[tool(output_schema = value_output_schema(), name = "setDefaultRegistry", description = "Set the default registry by name.")]
    pub async fn set_default_registry_tool(
        &self,
        params: Parameters<NamedRegistryParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let result = self
            .state
            .registries
            .set_default(&params.0.registry)
            .map(|()| json!({"default_registry": params.0.registry}));
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "getDefaultRegistry", description = "Get the current default registry name.")]
    pub async fn get_default_registry_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(Ok(
            json!({"default_registry": self.state.registries.default_registry()}),
        ))
    }

    #[tool(output_schema = value_output_schema(), name = "checkReadonlyMode",
        description = "Check whether a registry (or the whole server) blocks write operations."
    )]
    pub async fn check_readonly_mode_tool(
        &self,
        params: Parameters<RegistryParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(check_readonly(&self.state, params.0.registry.as_deref()).await)
    }

    // --- schemas ---

    #[tool(output_schema = value_output_schema(), name = "registerSchema",
        description = "Register a schema version under a subject. Call without a schema body to \
                       be guided through field-by-field definition."
    )]
    pub async fn register_schema_tool(
        &self,
        params: Parameters<RegisterSchemaParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(register_schema(&self.state, params.0).await)
    }

    #[tool(output_schema = value_output_schema(), name = "getSchema", description = "Fetch one schema version (latest by default).")]
    pub async fn get_schema_tool(
        &self,
        params: Parameters<GetSchemaParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(get_schema(&self.state, params.0).await)
    }

    #[tool(output_schema = value_output_schema(), name = "getSchemaVersions", description = "List the version numbers of a subject.")]
    pub async fn get_schema_versions_tool(
        &self,
        params: Parameters<SubjectParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.get(p.registry.as_deref()) {
            Ok(client) => client
                .list_versions(&p.subject, p.context.as_deref())
                .await
                .map(|versions| {
                    json!({
                        "subject": p.subject,
                        "registry": client.name(),
                        "versions": versions,
                    })
                }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "checkCompatibility",
        description = "Check a candidate schema against the latest version of a subject."
    )]
    pub async fn check_compatibility_tool(
        &self,
        params: Parameters<CheckCompatibilityParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.get(p.registry.as_deref()) {
            Ok(client) => client
                .check_compatibility(
                    &p.subject,
                    &schema_body_to_string(&p.schema),
                    p.schema_type.unwrap_or(SchemaType::Avro),
                    p.context.as_deref(),
                )
                .await
                .map(|is_compatible| {
                    json!({
                        "subject": p.subject,
                        "registry": client.name(),
                        "is_compatible": is_compatible,
                    })
                }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "listSubjects",
        description = "List subjects in a registry, optionally scoped to a context ('.' is the \
                       default context)."
    )]
    pub async fn list_subjects_tool(
        &self,
        params: Parameters<ListSubjectsParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.get(p.registry.as_deref()) {
            Ok(client) => client.list_subjects(p.context.as_deref()).await.map(|subjects| {
                json!({
                    "registry": client.name(),
                    "context": p.context,
                    "total": subjects.len(),
                    "subjects": subjects,
                })
            }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "deleteSubject", description = "Delete a subject and all its versions.")]
    pub async fn delete_subject_tool(
        &self,
        params: Parameters<SubjectParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(delete_subject(&self.state, params.0).await)
    }

    // --- contexts ---

    #[tool(output_schema = value_output_schema(), name = "listContexts", description = "List the contexts of a registry.")]
    pub async fn list_contexts_tool(
        &self,
        params: Parameters<RegistryParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let result = match self.state.registries.get(params.0.registry.as_deref()) {
            Ok(client) => client.list_contexts().await.map(|contexts| {
                json!({"registry": client.name(), "contexts": contexts})
            }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "createContext",
        description = "Create a context by registering and removing a probe schema in it."
    )]
    pub async fn create_context_tool(
        &self,
        params: Parameters<ContextParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.check_readonly(p.registry.as_deref()) {
            Ok(()) => match self.state.registries.get(p.registry.as_deref()) {
                Ok(client) => client
                    .create_context(&p.context)
                    .await
                    .map(|()| json!({"registry": client.name(), "context": p.context, "created": true})),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "deleteContext",
        description = "Delete a context (best effort; not every registry supports it)."
    )]
    pub async fn delete_context_tool(
        &self,
        params: Parameters<ContextParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.check_readonly(p.registry.as_deref()) {
            Ok(()) => match self.state.registries.get(p.registry.as_deref()) {
                Ok(client) => match client.delete_context(&p.context).await {
                    Ok(()) => Ok(json!({
                        "registry": client.name(),
                        "context": p.context,
                        "deleted": true,
                    })),
                    // Unsupported upstream is a warning, not a failure.
                    Err(WardenError::ImportModeUnsupported { .. })
                    | Err(WardenError::Upstream { status: 405, .. }) => Ok(json!({
                        "registry": client.name(),
                        "context": p.context,
                        "deleted": false,
                        "warning": "registry does not support context deletion",
                    })),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        respond(result)
    }

    // --- config ---

    #[tool(output_schema = value_output_schema(), name = "getGlobalConfig", description = "Get the global compatibility level.")]
    pub async fn get_global_config_tool(
        &self,
        params: Parameters<GlobalConfigParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.get(p.registry.as_deref()) {
            Ok(client) => client.get_global_config(p.context.as_deref()).await.map(|c| {
                json!({"registry": client.name(), "context": p.context, "compatibility": c})
            }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "updateGlobalConfig", description = "Set the global compatibility level.")]
    pub async fn update_global_config_tool(
        &self,
        params: Parameters<UpdateGlobalConfigParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.check_readonly(p.registry.as_deref()) {
            Ok(()) => match self.state.registries.get(p.registry.as_deref()) {
                Ok(client) => client
                    .set_global_config(p.context.as_deref(), &p.compatibility)
                    .await
                    .map(|c| {
                        json!({"registry": client.name(), "context": p.context, "compatibility": c})
                    }),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "getSubjectConfig", description = "Get a subject's compatibility level.")]
    pub async fn get_subject_config_tool(
        &self,
        params: Parameters<SubjectParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.get(p.registry.as_deref()) {
            Ok(client) => client
                .get_subject_config(&p.subject, p.context.as_deref())
                .await
                .map(|c| {
                    json!({
                        "registry": client.name(),
                        "subject": p.subject,
                        "compatibility": c,
                    })
                }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "updateSubjectConfig", description = "Set a subject's compatibility level.")]
    pub async fn update_subject_config_tool(
        &self,
        params: Parameters<UpdateSubjectConfigParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.check_readonly(p.registry.as_deref()) {
            Ok(()) => match self.state.registries.get(p.registry.as_deref()) {
                Ok(client) => client
                    .set_subject_config(&p.subject, p.context.as_deref(), &p.compatibility)
                    .await
                    .map(|c| {
                        json!({
                            "registry": client.name(),
                            "subject": p.subject,
                            "compatibility": c,
                        })
                    }),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        respond(result)
    }

    // --- modes ---

    #[tool(output_schema = value_output_schema(), name = "getMode", description = "Get the registry (or context) operating mode.")]
    pub async fn get_mode_tool(
        &self,
        params: Parameters<GetModeParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.get(p.registry.as_deref()) {
            Ok(client) => client.get_mode(p.context.as_deref(), None).await.map(|mode| {
                json!({"registry": client.name(), "context": p.context, "mode": mode})
            }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "updateMode", description = "Set the registry (or context) operating mode.")]
    pub async fn update_mode_tool(
        &self,
        params: Parameters<UpdateModeParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.check_readonly(p.registry.as_deref()) {
            Ok(()) => match self.state.registries.get(p.registry.as_deref()) {
                Ok(client) => client
                    .set_mode(p.context.as_deref(), None, p.mode)
                    .await
                    .map(|mode| {
                        json!({"registry": client.name(), "context": p.context, "mode": mode})
                    }),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "getSubjectMode", description = "Get a subject's operating mode.")]
    pub async fn get_subject_mode_tool(
        &self,
        params: Parameters<SubjectModeParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.get(p.registry.as_deref()) {
            Ok(client) => client
                .get_mode(p.context.as_deref(), Some(&p.subject))
                .await
                .map(|mode| {
                    json!({"registry": client.name(), "subject": p.subject, "mode": mode})
                }),
            Err(e) => Err(e),
        };
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "updateSubjectMode", description = "Set a subject's operating mode.")]
    pub async fn update_subject_mode_tool(
        &self,
        params: Parameters<UpdateSubjectModeParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let result = match self.state.registries.check_readonly(p.registry.as_deref()) {
            Ok(()) => match self.state.registries.get(p.registry.as_deref()) {
                Ok(client) => client
                    .set_mode(p.context.as_deref(), Some(&p.subject), p.mode)
                    .await
                    .map(|mode| {
                        json!({"registry": client.name(), "subject": p.subject, "mode": mode})
                    }),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        respond(result)
    }

    // --- migration ---

    #[tool(output_schema = value_output_schema(), name = "migrateSchema",
        description = "Migrate one subject between registries, optionally preserving schema ids \
                       via an IMPORT-mode window. Omit the preference flags to be asked \
                       interactively."
    )]
    pub async fn migrate_schema_tool(
        &self,
        params: Parameters<MigrateSchemaParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(migrate_schema(&self.state, params.0).await)
    }

    #[tool(output_schema = value_output_schema(), name = "migrateContext",
        description = "Migrate every subject of a context between registries as a background \
                       task. Returns the task id immediately."
    )]
    pub async fn migrate_context_tool(
        &self,
        params: Parameters<MigrateContextParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(migrate_context(&self.state, params.0).await)
    }

    #[tool(output_schema = value_output_schema(), name = "listMigrations", description = "List recorded migrations.")]
    pub async fn list_migrations_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(list_migrations(&self.state).await)
    }

    #[tool(output_schema = value_output_schema(), name = "getMigrationStatus", description = "Get one recorded migration by id.")]
    pub async fn get_migration_status_tool(
        &self,
        params: Parameters<MigrationStatusParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(get_migration_status(&self.state, &params.0.migration_id).await)
    }

    #[tool(output_schema = value_output_schema(), name = "compareRegistries",
        description = "Diff the subjects of two registries (default context scope)."
    )]
    pub async fn compare_registries_tool(
        &self,
        params: Parameters<CompareRegistriesParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(
            self.state
                .utilities
                .compare_registries(&p.source_registry, &p.target_registry, None)
                .await,
        )
    }

    #[tool(output_schema = value_output_schema(), name = "compareContextsAcrossRegistries",
        description = "Diff one context's subjects between two registries."
    )]
    pub async fn compare_contexts_tool(
        &self,
        params: Parameters<CompareContextsParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(
            self.state
                .utilities
                .compare_registries(&p.source_registry, &p.target_registry, Some(&p.context))
                .await,
        )
    }

    #[tool(output_schema = value_output_schema(), name = "findMissingSchemas",
        description = "List subjects present in the source registry but absent from the target."
    )]
    pub async fn find_missing_schemas_tool(
        &self,
        params: Parameters<FindMissingParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(
            self.state
                .utilities
                .find_missing_schemas(&p.source_registry, &p.target_registry, p.context.as_deref())
                .await,
        )
    }

    #[tool(output_schema = value_output_schema(), name = "clearContextBatch",
        description = "Delete every subject in a context (parallel, bounded) as a background \
                       task; optionally delete the context afterwards."
    )]
    pub async fn clear_context_batch_tool(
        &self,
        params: Parameters<ClearContextParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(clear_context_task(
            &self.state,
            vec![(p.registry.clone(), p.context.clone())],
            p.delete_context_after.unwrap_or(false),
            p.dry_run.unwrap_or(false),
        ))
    }

    #[tool(output_schema = value_output_schema(), name = "clearMultipleContextsBatch",
        description = "Delete every subject in several contexts of one registry as a background \
                       task."
    )]
    pub async fn clear_multiple_contexts_tool(
        &self,
        params: Parameters<ClearMultipleContextsParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let targets = p
            .contexts
            .iter()
            .map(|context| (p.registry.clone(), context.clone()))
            .collect();
        respond(clear_context_task(
            &self.state,
            targets,
            p.delete_contexts_after.unwrap_or(false),
            p.dry_run.unwrap_or(false),
        ))
    }

    #[tool(output_schema = value_output_schema(), name = "clearContextAcrossRegistriesBatch",
        description = "Delete one context's subjects in several registries (default: the whole \
                       fleet) as a background task."
    )]
    pub async fn clear_context_across_registries_tool(
        &self,
        params: Parameters<ClearContextAcrossRegistriesParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let registries = p
            .registries
            .unwrap_or_else(|| self.state.registries.list());
        let targets = registries
            .into_iter()
            .map(|registry| (registry, p.context.clone()))
            .collect();
        respond(clear_context_task(
            &self.state,
            targets,
            false,
            p.dry_run.unwrap_or(false),
        ))
    }

    // --- tasks ---

    #[tool(output_schema = value_output_schema(), name = "createAsyncTask",
        description = "Create a tracked task in pending state for external orchestration."
    )]
    pub async fn create_async_task_tool(
        &self,
        params: Parameters<CreateTaskParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(
            self.state
                .tasks
                .create(p.task_type, p.metadata.unwrap_or(Value::Null)),
        )
    }

    #[tool(output_schema = value_output_schema(), name = "getTaskStatus", description = "Get one task's status, progress, and result.")]
    pub async fn get_task_status_tool(
        &self,
        params: Parameters<TaskIdParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let task_id = params.0.task_id;
        let result = self.state.tasks.get(&task_id).ok_or(WardenError::Config {
            message: format!("task '{task_id}' not found"),
        });
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "listTasks", description = "List tasks, filterable by type and status.")]
    pub async fn list_tasks_tool(
        &self,
        params: Parameters<ListTasksParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        let tasks = self.state.tasks.list(p.task_type, p.status);
        respond(Ok(json!({"total": tasks.len(), "tasks": tasks})))
    }

    #[tool(output_schema = value_output_schema(), name = "cancelTask", description = "Cancel a running task by id.")]
    pub async fn cancel_task_tool(
        &self,
        params: Parameters<TaskIdParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let task_id = params.0.task_id;
        let cancelled = self.state.tasks.cancel(&task_id);
        respond(Ok(json!({"task_id": task_id, "cancelled": cancelled})))
    }

    #[tool(output_schema = value_output_schema(), name = "cancelAllTasks", description = "Cancel every running task.")]
    pub async fn cancel_all_tasks_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(Ok(json!({"cancelled": self.state.tasks.cancel_all()})))
    }

    #[tool(output_schema = value_output_schema(), name = "resetTaskQueue",
        description = "Drop all finished and pending tasks; running tasks are kept."
    )]
    pub async fn reset_task_queue_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        self.state.tasks.reset_queue();
        respond(Ok(json!({"reset": true})))
    }

    // --- workflows ---

    #[tool(output_schema = value_output_schema(), name = "startWorkflow",
        description = "Start a multi-step workflow instance; returns the first step's \
                       elicitation request."
    )]
    pub async fn start_workflow_tool(
        &self,
        params: Parameters<StartWorkflowParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(start_workflow(&self.state, &p.workflow_id, p.initial_context).await)
    }

    #[tool(output_schema = value_output_schema(), name = "listWorkflows",
        description = "List registered workflow definitions and active instances."
    )]
    pub async fn list_workflows_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        let definitions: Vec<Value> = self
            .state
            .workflows
            .list_definitions()
            .iter()
            .map(|w| {
                json!({
                    "id": w.id,
                    "name": w.name,
                    "description": w.description,
                    "steps": w.steps.len(),
                    "metadata": w.metadata,
                })
            })
            .collect();
        respond(Ok(json!({
            "workflows": definitions,
            "active_instances": self.state.workflows.active_workflows(),
        })))
    }

    #[tool(output_schema = value_output_schema(), name = "workflowStatus",
        description = "Get one workflow instance's progress, or all active instances."
    )]
    pub async fn workflow_status_tool(
        &self,
        params: Parameters<WorkflowStatusParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(workflow_status(&self.state, params.0.instance_id.as_deref()).await)
    }

    #[tool(output_schema = value_output_schema(), name = "abortWorkflow", description = "Abort an active workflow instance.")]
    pub async fn abort_workflow_tool(
        &self,
        params: Parameters<WorkflowInstanceParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(self.state.workflows.abort(&params.0.instance_id))
    }

    #[tool(output_schema = value_output_schema(), name = "describeWorkflow",
        description = "Describe a workflow definition: steps, fields, and transitions."
    )]
    pub async fn describe_workflow_tool(
        &self,
        params: Parameters<DescribeWorkflowParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let workflow_id = params.0.workflow_id;
        let result = self
            .state
            .workflows
            .get_definition(&workflow_id)
            .map(|w| serde_json::to_value(&*w).unwrap_or_default())
            .ok_or(WardenError::WorkflowUnknown { workflow_id });
        respond(result)
    }

    #[tool(output_schema = value_output_schema(), name = "guidedSchemaMigration",
        description = "Start the Schema Migration Wizard workflow."
    )]
    pub async fn guided_schema_migration_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(start_workflow(&self.state, definitions::SCHEMA_MIGRATION_WIZARD, None).await)
    }

    #[tool(output_schema = value_output_schema(), name = "guidedContextReorganization",
        description = "Start the Context Reorganization workflow."
    )]
    pub async fn guided_context_reorganization_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(start_workflow(&self.state, definitions::CONTEXT_REORGANIZATION, None).await)
    }

    #[tool(output_schema = value_output_schema(), name = "guidedDisasterRecovery",
        description = "Start the Disaster Recovery Setup workflow."
    )]
    pub async fn guided_disaster_recovery_tool(
        &self,
        _params: Parameters<()>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(start_workflow(&self.state, definitions::DISASTER_RECOVERY_SETUP, None).await)
    }

    #[tool(output_schema = value_output_schema(), name = "guidedSchemaEvolution",
        description = "Start the Schema Evolution Assistant; with subject and proposed_schema \
                       set, the current version is diffed to seed the workflow."
    )]
    pub async fn guided_schema_evolution_tool(
        &self,
        params: Parameters<GuidedEvolutionParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(guided_schema_evolution(&self.state, params.0).await)
    }

    #[tool(output_schema = value_output_schema(), name = "submitElicitationResponse",
        description = "Answer a pending elicitation request. Workflow-bound requests advance \
                       their workflow; the final step returns an execution plan."
    )]
    pub async fn submit_elicitation_response_tool(
        &self,
        params: Parameters<SubmitElicitationParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(submit_elicitation_response(&self.state, params.0).await)
    }

    // --- counting / statistics ---

    #[tool(output_schema = value_output_schema(), name = "countContexts", description = "Count the contexts of a registry.")]
    pub async fn count_contexts_tool(
        &self,
        params: Parameters<RegistryParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let registry = params.0.registry;
        respond(
            self.state
                .registries
                .count_contexts(registry.as_deref())
                .await
                .map(|count| json!({"registry": registry, "contexts": count})),
        )
    }

    #[tool(output_schema = value_output_schema(), name = "countSchemas", description = "Count the subjects of a registry or context.")]
    pub async fn count_schemas_tool(
        &self,
        params: Parameters<CountSchemasParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(
            self.state
                .registries
                .count_schemas(p.registry.as_deref(), p.context.as_deref())
                .await
                .map(|count| json!({"registry": p.registry, "context": p.context, "schemas": count})),
        )
    }

    #[tool(output_schema = value_output_schema(), name = "countSchemaVersions", description = "Count the versions of one subject.")]
    pub async fn count_schema_versions_tool(
        &self,
        params: Parameters<CountVersionsParams>,
    ) -> std::result::Result<Json<Value>, String> {
        let p = params.0;
        respond(
            self.state
                .registries
                .count_schema_versions(p.registry.as_deref(), &p.subject, p.context.as_deref())
                .await
                .map(|count| json!({"subject": p.subject, "versions": count})),
        )
    }

    #[tool(output_schema = value_output_schema(), name = "getRegistryStatistics",
        description = "Aggregate statistics for a registry: contexts, subjects per context, and \
                       total versions."
    )]
    pub async fn get_registry_statistics_tool(
        &self,
        params: Parameters<RegistryParams>,
    ) -> std::result::Result<Json<Value>, String> {
        respond(
            self.state
                .registries
                .statistics(params.0.registry.as_deref())
                .await,
        )
    }

    /// Serve the tool surface over stdio until the client disconnects.
    pub async fn run(self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        tracing::info!("schema-warden MCP server ready (stdio transport)");
        let state = Arc::clone(&self.state);
        let transport = (tokio::io::stdin(), tokio::io::stdout());
        self.serve(transport).await?.waiting().await?;
        state.tasks.shutdown();
        Ok(())
    }
}

impl ServerHandler for SchemaWardenServer {
    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<rmcp::model::ListToolsResult, rmcp::ErrorData> {
        Ok(rmcp::model::ListToolsResult {
            meta: None,
            tools: self.tool_router.list_all(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<rmcp::model::CallToolResult, rmcp::ErrorData> {
        if self.tool_router.has_route(&request.name) {
            let tool_context = ToolCallContext::new(self, request, context);
            return self.tool_router.call(tool_context).await;
        }
        Err(rmcp::ErrorData::method_not_found::<
            rmcp::model::CallToolRequestMethod,
        >())
    }

    async fn initialize(
        &self,
        request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<InitializeResult, rmcp::ErrorData> {
        tracing::info!(
            client = %request.client_info.name,
            version = %request.client_info.version,
            "MCP client connected"
        );
        Ok(InitializeResult {
            protocol_version: request.protocol_version,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "schema-warden".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Schema Warden MCP Server".to_string()),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Multi-registry Schema Registry control plane: schema lifecycle, cross-registry \
                 migration, async tasks, and guided workflows."
                    .to_string(),
            ),
        })
    }
}
