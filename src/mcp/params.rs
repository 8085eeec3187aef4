//! Parameter structs for the MCP tool surface.
//!
//! Every struct derives `JsonSchema` so rmcp can publish tool input
//! schemas. `registry` is optional almost everywhere; omitting it targets
//! the default registry.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::registry::types::SchemaType;
use crate::tasks::{TaskStatus, TaskType};

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct RegistryParams {
    /// Registry name; defaults to the default registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct NamedRegistryParams {
    /// Registry name.
    pub registry: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ListSubjectsParams {
    /// Registry name; defaults to the default registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Schema context; "." or absent selects the default context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct RegisterSchemaParams {
    /// Registry name; defaults to the default registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Subject to register under.
    pub subject: String,
    /// Schema body; an object is serialized verbatim, a string is sent as-is.
    /// Omit to be guided through field-by-field schema definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// AVRO (default), JSON, or PROTOBUF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    /// Schema context; "." or absent selects the default context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct GetSchemaParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub subject: String,
    /// Version number; omitted means latest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct SubjectParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CheckCompatibilityParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub subject: String,
    /// Candidate schema body.
    pub schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ContextParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Context name.
    pub context: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct GlobalConfigParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct UpdateGlobalConfigParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// BACKWARD, BACKWARD_TRANSITIVE, FORWARD, FORWARD_TRANSITIVE, FULL,
    /// FULL_TRANSITIVE, or NONE.
    pub compatibility: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct UpdateSubjectConfigParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub compatibility: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct GetModeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct UpdateModeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// IMPORT, READONLY, or READWRITE.
    pub mode: crate::registry::types::Mode,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct SubjectModeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct UpdateSubjectModeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub mode: crate::registry::types::Mode,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct MigrateSchemaParams {
    /// Subject to migrate.
    pub subject: String,
    pub source_registry: String,
    pub target_registry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
    /// Defaults to the source context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_context: Option<String>,
    /// Keep source schema ids (needs IMPORT mode on the target). Omit
    /// together with dry_run and migrate_all_versions to be asked
    /// interactively.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_ids: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrate_all_versions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    /// Explicit subset of source versions to migrate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<i32>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct MigrateContextParams {
    /// Source context ("." for the default context).
    pub context: String,
    pub source_registry: String,
    pub target_registry: String,
    /// Defaults to the source context name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_ids: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrate_all_versions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    /// Allow a direct copy when source and target are the same registry;
    /// without it that case returns a Docker handoff bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_same_registry_copy: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct MigrationStatusParams {
    pub migration_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CompareRegistriesParams {
    pub source_registry: String,
    pub target_registry: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CompareContextsParams {
    pub source_registry: String,
    pub target_registry: String,
    /// Context compared on both sides.
    pub context: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct FindMissingParams {
    pub source_registry: String,
    pub target_registry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ClearContextParams {
    pub registry: String,
    pub context: String,
    /// Also delete the context itself after emptying it (best effort).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_context_after: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ClearMultipleContextsParams {
    pub registry: String,
    pub contexts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_contexts_after: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ClearContextAcrossRegistriesParams {
    pub context: String,
    /// Registries to clear the context in; omitted means the whole fleet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CreateTaskParams {
    /// migration, sync, cleanup, export, or import.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct TaskIdParams {
    pub task_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct ListTasksParams {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct StartWorkflowParams {
    /// Workflow definition id, e.g. schema_migration_wizard.
    pub workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_context: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct WorkflowStatusParams {
    /// Instance to inspect; omitted lists all active instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct WorkflowInstanceParams {
    pub instance_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct DescribeWorkflowParams {
    pub workflow_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct GuidedEvolutionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Proposed schema body; with `subject` set, the current version is
    /// fetched and diffed against this to seed the workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_schema: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct SubmitElicitationParams {
    /// Request id being answered.
    pub request_id: String,
    /// Field name to value map.
    pub values: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CountSchemasParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CountVersionsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}
