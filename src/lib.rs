//! Schema-Warden Library
//!
//! Multi-registry Schema Registry control plane: typed registry clients, a
//! version/id-preserving migration engine, an async task queue, guided
//! multi-step workflows, and a smart-defaults learning core, exposed as an
//! MCP tool server.

pub mod config;
pub mod defaults;
pub mod elicitation;
pub mod error;
pub mod evolution;
pub mod links;
pub mod mcp;
pub mod migration;
pub mod registry;
pub mod tasks;
pub mod utils;
pub mod workflow;

// Re-export commonly used types for convenience
pub use config::{FleetConfig, RegistryConfig, MAX_REGISTRIES};
pub use error::{ErrorPayload, WardenError};
pub use mcp::{SchemaWardenServer, WardenState};
pub use migration::{
    ContextMigrationOutcome, MigrationEngine, SchemaMigrationOptions, SchemaMigrationOutcome,
};
pub use registry::{RegistryClient, RegistryManager};
pub use tasks::{AsyncTask, TaskManager, TaskStatus, TaskType};
pub use workflow::{MultiStepWorkflow, WorkflowRuntime, WorkflowState};
