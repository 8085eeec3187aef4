//! Predefined workflows. These are data: every step references the next by
//! id string, and the runtime validates the graph at registration.

use std::collections::HashMap;

use crate::elicitation::{ElicitationField, ElicitationType, FieldType};
use crate::workflow::{
    Condition, ConditionOperator, MultiStepWorkflow, WorkflowStep, FINISH_STEP,
};

pub const SCHEMA_MIGRATION_WIZARD: &str = "schema_migration_wizard";
pub const CONTEXT_REORGANIZATION: &str = "context_reorganization";
pub const DISASTER_RECOVERY_SETUP: &str = "disaster_recovery_setup";
pub const SCHEMA_EVOLUTION_ASSISTANT: &str = "schema_evolution_assistant";

pub fn all_workflows() -> Vec<MultiStepWorkflow> {
    vec![
        schema_migration_wizard(),
        context_reorganization(),
        disaster_recovery_setup(),
        schema_evolution_assistant(),
    ]
}

fn metadata(entries: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Guides a caller through migrating a schema, a set of schemas, or a context.
pub fn schema_migration_wizard() -> MultiStepWorkflow {
    let mut steps = HashMap::new();

    steps.insert(
        "migration_type".to_string(),
        WorkflowStep::new("migration_type", "Schema Migration Wizard - Migration Type")
            .description("What type of migration would you like to perform?")
            .elicitation_type(ElicitationType::Choice)
            .fields(vec![ElicitationField::new("migration_type", FieldType::Choice)
                .description("Select the type of migration")
                .options(&["single_schema", "bulk_migration", "context_migration"])])
            .next_by_value(
                "migration_type",
                &[
                    ("single_schema", "single_schema_selection"),
                    ("bulk_migration", "bulk_selection"),
                    ("context_migration", "context_selection"),
                ],
            ),
    );

    steps.insert(
        "single_schema_selection".to_string(),
        WorkflowStep::new("single_schema_selection", "Select Schema")
            .description("Enter the schema details for migration")
            .fields(vec![
                ElicitationField::new("source_registry", FieldType::Text)
                    .description("Source registry name")
                    .placeholder("e.g., development"),
                ElicitationField::new("schema_name", FieldType::Text)
                    .description("Schema name (subject)")
                    .placeholder("e.g., com.example.User-value"),
                ElicitationField::new("version", FieldType::Text)
                    .description("Version to migrate (leave empty for latest)")
                    .placeholder("e.g., 1, 2, latest")
                    .optional()
                    .default_value("latest".into()),
            ])
            .next_direct("default", "migration_options"),
    );

    steps.insert(
        "bulk_selection".to_string(),
        WorkflowStep::new("bulk_selection", "Bulk Schema Selection")
            .description("Select schemas for bulk migration")
            .fields(vec![
                ElicitationField::new("source_registry", FieldType::Text)
                    .description("Source registry name"),
                ElicitationField::new("schema_pattern", FieldType::Text)
                    .description("Schema name pattern (regex supported)")
                    .placeholder("e.g., com.example.*, *-value"),
                ElicitationField::new("include_all_versions", FieldType::Confirmation)
                    .description("Include all versions of matching schemas?")
                    .default_value("false".into()),
                ElicitationField::new("context_filter", FieldType::Text)
                    .description("Filter by context (optional)")
                    .optional()
                    .placeholder("e.g., production, staging"),
            ])
            .next_direct("default", "migration_options"),
    );

    steps.insert(
        "context_selection".to_string(),
        WorkflowStep::new("context_selection", "Context Selection")
            .description("Select context for migration")
            .fields(vec![
                ElicitationField::new("source_registry", FieldType::Text)
                    .description("Source registry name"),
                ElicitationField::new("source_context", FieldType::Text)
                    .description("Source context name")
                    .placeholder("e.g., production, staging"),
                ElicitationField::new("include_dependencies", FieldType::Confirmation)
                    .description("Include schema dependencies?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "migration_options"),
    );

    steps.insert(
        "migration_options".to_string(),
        WorkflowStep::new("migration_options", "Migration Options")
            .description("Configure migration options")
            .fields(vec![
                ElicitationField::new("target_registry", FieldType::Text)
                    .description("Target registry name"),
                ElicitationField::new("target_context", FieldType::Text)
                    .description("Target context (leave empty to keep same)")
                    .optional()
                    .placeholder("e.g., production-backup"),
                ElicitationField::new("preserve_ids", FieldType::Confirmation)
                    .description("Preserve schema IDs? (Requires IMPORT mode on the target)")
                    .default_value("false".into()),
                ElicitationField::new("conflict_resolution", FieldType::Choice)
                    .description("How to handle existing schemas?")
                    .options(&["skip", "overwrite", "version"])
                    .default_value("skip".into()),
                ElicitationField::new("create_backup", FieldType::Confirmation)
                    .description("Create backup before migration?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "review_confirm"),
    );

    steps.insert(
        "review_confirm".to_string(),
        WorkflowStep::new("review_confirm", "Review Migration Plan")
            .description("Review your migration settings before proceeding")
            .elicitation_type(ElicitationType::Confirmation)
            .fields(vec![
                ElicitationField::new("dry_run", FieldType::Confirmation)
                    .description("Perform dry run first?")
                    .default_value("true".into()),
                ElicitationField::new("confirm_migration", FieldType::Confirmation)
                    .description("Proceed with migration? This may modify schemas in the target registry"),
            ])
            // "false" starts over.
            .next_by_value(
                "confirm_migration",
                &[("true", FINISH_STEP), ("false", "migration_type")],
            ),
    );

    MultiStepWorkflow {
        id: SCHEMA_MIGRATION_WIZARD.to_string(),
        name: "Schema Migration Wizard".to_string(),
        description: "Guide users through schema migration process".to_string(),
        steps,
        initial_step_id: "migration_type".to_string(),
        metadata: metadata(&[
            ("estimated_duration", "2-5 minutes".into()),
            ("difficulty", "intermediate".into()),
            ("requires_auth", true.into()),
        ]),
    }
}

/// Merge, split, rename, or restructure contexts.
pub fn context_reorganization() -> MultiStepWorkflow {
    let mut steps = HashMap::new();

    steps.insert(
        "reorg_strategy".to_string(),
        WorkflowStep::new("reorg_strategy", "Context Reorganization - Strategy")
            .description("How would you like to reorganize your contexts?")
            .elicitation_type(ElicitationType::Choice)
            .fields(vec![ElicitationField::new("strategy", FieldType::Choice)
                .description("Select reorganization strategy")
                .options(&["merge", "split", "rename", "restructure"])])
            .next_by_value(
                "strategy",
                &[
                    ("merge", "merge_contexts"),
                    ("split", "split_context"),
                    ("rename", "rename_context"),
                    ("restructure", "restructure_plan"),
                ],
            ),
    );

    steps.insert(
        "merge_contexts".to_string(),
        WorkflowStep::new("merge_contexts", "Select Contexts to Merge")
            .description("Select the contexts you want to merge")
            .fields(vec![
                ElicitationField::new("source_contexts", FieldType::Text)
                    .description("Source contexts (comma-separated)")
                    .placeholder("e.g., dev-team-a, dev-team-b"),
                ElicitationField::new("target_context", FieldType::Text)
                    .description("Target context name")
                    .placeholder("e.g., development"),
                ElicitationField::new("handle_duplicates", FieldType::Choice)
                    .description("How to handle duplicate schemas?")
                    .options(&["keep_newest", "keep_oldest", "prompt"])
                    .default_value("prompt".into()),
            ])
            .next_direct("default", "mapping_review"),
    );

    steps.insert(
        "split_context".to_string(),
        WorkflowStep::new("split_context", "Define Context Split")
            .description("Define how to split the context")
            .fields(vec![
                ElicitationField::new("source_context", FieldType::Text)
                    .description("Context to split"),
                ElicitationField::new("split_criteria", FieldType::Choice)
                    .description("Split based on")
                    .options(&["namespace", "prefix", "custom_rules"]),
                ElicitationField::new("target_contexts", FieldType::Text)
                    .description("Target context names (comma-separated)")
                    .placeholder("e.g., context-a, context-b, context-c"),
            ])
            .next_direct("default", "split_rules"),
    );

    steps.insert(
        "rename_context".to_string(),
        WorkflowStep::new("rename_context", "Rename Context")
            .description("Specify context rename mapping")
            .fields(vec![
                ElicitationField::new("rename_mappings", FieldType::Text)
                    .description("Rename mappings (old:new, comma-separated)")
                    .placeholder("e.g., dev:development, prod:production"),
                ElicitationField::new("update_references", FieldType::Confirmation)
                    .description("Update all schema references?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "review_changes"),
    );

    steps.insert(
        "split_rules".to_string(),
        WorkflowStep::new("split_rules", "Define Split Rules")
            .description("Define rules for splitting schemas")
            .fields(vec![
                ElicitationField::new("split_rules", FieldType::Text)
                    .description("Split rules (pattern:context, one per line)")
                    .placeholder("com.example.user.*:user-context"),
                ElicitationField::new("default_context", FieldType::Text)
                    .description("Default context for unmatched schemas"),
            ])
            .next_direct("default", "mapping_review"),
    );

    steps.insert(
        "mapping_review".to_string(),
        WorkflowStep::new("mapping_review", "Review Schema Mappings")
            .description("Review how schemas will be reorganized")
            .fields(vec![
                ElicitationField::new("generate_report", FieldType::Confirmation)
                    .description("Generate detailed mapping report?")
                    .default_value("true".into()),
                ElicitationField::new("test_mode", FieldType::Confirmation)
                    .description("Run in test mode first?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "execute_reorg"),
    );

    steps.insert(
        "execute_reorg".to_string(),
        WorkflowStep::new("execute_reorg", "Execute Reorganization")
            .description("Final confirmation before reorganization")
            .elicitation_type(ElicitationType::Confirmation)
            .fields(vec![
                ElicitationField::new("backup_first", FieldType::Confirmation)
                    .description("Create full backup before reorganization?")
                    .default_value("true".into()),
                ElicitationField::new("proceed", FieldType::Confirmation)
                    .description("Proceed with context reorganization? This will modify context structure across registries"),
            ])
            .next_by_value("proceed", &[("true", FINISH_STEP), ("false", "reorg_strategy")]),
    );

    steps.insert(
        "restructure_plan".to_string(),
        WorkflowStep::new("restructure_plan", "Define New Structure")
            .description("Define your new context structure")
            .fields(vec![
                ElicitationField::new("structure_definition", FieldType::Text)
                    .description("New context structure (YAML or JSON)"),
                ElicitationField::new("migration_strategy", FieldType::Choice)
                    .description("Migration approach")
                    .options(&["gradual", "immediate", "parallel"])
                    .default_value("gradual".into()),
            ])
            .next_direct("default", "mapping_review"),
    );

    steps.insert(
        "review_changes".to_string(),
        WorkflowStep::new("review_changes", "Review Changes")
            .description("Review the planned changes")
            .elicitation_type(ElicitationType::Confirmation)
            .fields(vec![ElicitationField::new("confirm_changes", FieldType::Confirmation)
                .description("Apply these changes?")])
            .next_by_value(
                "confirm_changes",
                &[("true", FINISH_STEP), ("false", "reorg_strategy")],
            ),
    );

    MultiStepWorkflow {
        id: CONTEXT_REORGANIZATION.to_string(),
        name: "Context Reorganization".to_string(),
        description: "Reorganize schemas across contexts".to_string(),
        steps,
        initial_step_id: "reorg_strategy".to_string(),
        metadata: metadata(&[
            ("estimated_duration", "5-10 minutes".into()),
            ("difficulty", "advanced".into()),
            ("requires_auth", true.into()),
        ]),
    }
}

/// Configure an active/passive, active/active, backup, or multi-region setup.
pub fn disaster_recovery_setup() -> MultiStepWorkflow {
    let mut steps = HashMap::new();

    steps.insert(
        "dr_strategy".to_string(),
        WorkflowStep::new("dr_strategy", "Disaster Recovery Setup - Strategy")
            .description("Choose your disaster recovery strategy")
            .elicitation_type(ElicitationType::Choice)
            .fields(vec![ElicitationField::new("dr_strategy", FieldType::Choice)
                .description("Select DR strategy")
                .options(&["active_passive", "active_active", "backup_restore", "multi_region"])])
            .next_by_value(
                "dr_strategy",
                &[
                    ("active_passive", "active_passive_config"),
                    ("active_active", "active_active_config"),
                    ("backup_restore", "backup_config"),
                    ("multi_region", "multi_region_config"),
                ],
            ),
    );

    steps.insert(
        "active_passive_config".to_string(),
        WorkflowStep::new("active_passive_config", "Active-Passive Configuration")
            .description("Configure active-passive disaster recovery")
            .fields(vec![
                ElicitationField::new("primary_registry", FieldType::Text)
                    .description("Primary registry"),
                ElicitationField::new("standby_registry", FieldType::Text)
                    .description("Standby registry"),
                ElicitationField::new("replication_interval", FieldType::Choice)
                    .description("Replication interval")
                    .options(&["realtime", "1min", "5min", "15min", "hourly"])
                    .default_value("5min".into()),
                ElicitationField::new("failover_mode", FieldType::Choice)
                    .description("Failover mode")
                    .options(&["manual", "automatic"])
                    .default_value("manual".into()),
            ])
            .next_direct("default", "sync_options"),
    );

    steps.insert(
        "active_active_config".to_string(),
        WorkflowStep::new("active_active_config", "Active-Active Configuration")
            .description("Configure active-active disaster recovery")
            .fields(vec![
                ElicitationField::new("active_registries", FieldType::Text)
                    .description("Active registries (comma-separated)")
                    .placeholder("e.g., us-east-1, us-west-2, eu-west-1"),
                ElicitationField::new("conflict_resolution", FieldType::Choice)
                    .description("Conflict resolution strategy")
                    .options(&["last_write_wins", "version_vector", "manual"])
                    .default_value("last_write_wins".into()),
                ElicitationField::new("sync_topology", FieldType::Choice)
                    .description("Synchronization topology")
                    .options(&["mesh", "hub_spoke", "ring"])
                    .default_value("mesh".into()),
            ])
            .next_direct("default", "sync_options"),
    );

    steps.insert(
        "backup_config".to_string(),
        WorkflowStep::new("backup_config", "Backup Configuration")
            .description("Configure backup and restore settings")
            .fields(vec![
                ElicitationField::new("backup_schedule", FieldType::Choice)
                    .description("Backup schedule")
                    .options(&["hourly", "daily", "weekly", "custom"])
                    .default_value("daily".into()),
                ElicitationField::new("backup_location", FieldType::Text)
                    .description("Backup storage location")
                    .placeholder("e.g., s3://my-bucket/schema-backups"),
                ElicitationField::new("retention_policy", FieldType::Choice)
                    .description("Backup retention")
                    .options(&["7days", "30days", "90days", "1year", "indefinite"])
                    .default_value("30days".into()),
                ElicitationField::new("encryption", FieldType::Confirmation)
                    .description("Encrypt backups?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "restore_testing"),
    );

    steps.insert(
        "multi_region_config".to_string(),
        WorkflowStep::new("multi_region_config", "Multi-Region Configuration")
            .description("Configure multi-region disaster recovery")
            .fields(vec![
                ElicitationField::new("regions", FieldType::Text)
                    .description("Regions (comma-separated)"),
                ElicitationField::new("primary_region", FieldType::Text)
                    .description("Primary region"),
                ElicitationField::new("data_residency", FieldType::Confirmation)
                    .description("Enforce data residency rules?")
                    .default_value("false".into()),
                ElicitationField::new("cross_region_replication", FieldType::Choice)
                    .description("Cross-region replication")
                    .options(&["all_regions", "adjacent_only", "custom"])
                    .default_value("all_regions".into()),
            ])
            .next_direct("default", "sync_options"),
    );

    steps.insert(
        "sync_options".to_string(),
        WorkflowStep::new("sync_options", "Synchronization Options")
            .description("Configure synchronization settings")
            .fields(vec![
                ElicitationField::new("sync_scope", FieldType::Choice)
                    .description("What to synchronize?")
                    .options(&["schemas_only", "schemas_and_metadata", "full_mirror"])
                    .default_value("schemas_and_metadata".into()),
                ElicitationField::new("initial_sync", FieldType::Confirmation)
                    .description("Perform initial full sync?")
                    .default_value("true".into()),
                ElicitationField::new("monitor_lag", FieldType::Confirmation)
                    .description("Enable replication lag monitoring?")
                    .default_value("true".into()),
                ElicitationField::new("alert_threshold", FieldType::Text)
                    .description("Alert threshold (seconds)")
                    .optional()
                    .default_value("300".into()),
            ])
            .next_direct("default", "test_validate"),
    );

    steps.insert(
        "restore_testing".to_string(),
        WorkflowStep::new("restore_testing", "Restore Testing")
            .description("Configure restore testing")
            .fields(vec![
                ElicitationField::new("test_restore_schedule", FieldType::Choice)
                    .description("Test restore frequency")
                    .options(&["weekly", "monthly", "quarterly"])
                    .default_value("monthly".into()),
                ElicitationField::new("test_environment", FieldType::Text)
                    .description("Test restore environment")
                    .placeholder("e.g., dr-test"),
                ElicitationField::new("auto_validate", FieldType::Confirmation)
                    .description("Automatically validate restored schemas?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "test_validate"),
    );

    steps.insert(
        "test_validate".to_string(),
        WorkflowStep::new("test_validate", "Test and Validate")
            .description("Test your disaster recovery configuration")
            .fields(vec![
                ElicitationField::new("run_dr_drill", FieldType::Confirmation)
                    .description("Run disaster recovery drill?")
                    .default_value("true".into()),
                ElicitationField::new("validation_scope", FieldType::Choice)
                    .description("Validation scope")
                    .options(&["connectivity", "replication", "failover", "full"])
                    .default_value("full".into()),
                ElicitationField::new("generate_runbook", FieldType::Confirmation)
                    .description("Generate DR runbook?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "finalize_dr"),
    );

    steps.insert(
        "finalize_dr".to_string(),
        WorkflowStep::new("finalize_dr", "Finalize DR Setup")
            .description("Review and activate your disaster recovery configuration")
            .elicitation_type(ElicitationType::Confirmation)
            .fields(vec![
                ElicitationField::new("enable_monitoring", FieldType::Confirmation)
                    .description("Enable DR monitoring and alerts?")
                    .default_value("true".into()),
                ElicitationField::new("activate_dr", FieldType::Confirmation)
                    .description("Activate disaster recovery configuration across your registries?"),
            ])
            .next_by_value("activate_dr", &[("true", FINISH_STEP), ("false", "dr_strategy")]),
    );

    MultiStepWorkflow {
        id: DISASTER_RECOVERY_SETUP.to_string(),
        name: "Disaster Recovery Setup".to_string(),
        description: "Configure disaster recovery for Schema Registry".to_string(),
        steps,
        initial_step_id: "dr_strategy".to_string(),
        metadata: metadata(&[
            ("estimated_duration", "10-15 minutes".into()),
            ("difficulty", "expert".into()),
            ("requires_auth", true.into()),
            ("requires_admin", true.into()),
            ("compliance_relevant", true.into()),
        ]),
    }
}

/// Breaking-change analysis and evolution strategy planning.
pub fn schema_evolution_assistant() -> MultiStepWorkflow {
    let mut steps = HashMap::new();

    steps.insert(
        "change_analysis".to_string(),
        WorkflowStep::new("change_analysis", "Schema Evolution Assistant - Change Analysis")
            .description("Analyze your schema changes to understand their impact")
            .fields(vec![
                ElicitationField::new("subject", FieldType::Text)
                    .description("Schema subject name")
                    .placeholder("e.g., com.example.User-value"),
                ElicitationField::new("change_type", FieldType::Choice)
                    .description("What type of change are you making?")
                    .options(&[
                        "add_fields",
                        "remove_fields",
                        "modify_fields",
                        "restructure_schema",
                        "multiple_changes",
                    ]),
                ElicitationField::new("change_description", FieldType::Text)
                    .description("Describe your changes")
                    .placeholder("e.g., Adding email field, changing userId from int to string"),
                ElicitationField::new("current_consumers", FieldType::Text)
                    .description("Number of active consumers (approximate)")
                    .placeholder("e.g., 10-50"),
                ElicitationField::new("production_impact", FieldType::Choice)
                    .description("Is this a production system?")
                    .options(&["yes_critical", "yes_non_critical", "no_staging", "no_development"]),
            ])
            .next_direct("default", "breaking_changes_check"),
    );

    steps.insert(
        "breaking_changes_check".to_string(),
        WorkflowStep::new("breaking_changes_check", "Breaking Changes Detection")
            .description("Analyzing your changes for compatibility issues")
            .fields(vec![
                ElicitationField::new("has_breaking_changes", FieldType::Choice)
                    .description("Potential breaking changes were detected. How should we proceed?")
                    .options(&["true", "false", "unsure"]),
                ElicitationField::new("current_compatibility", FieldType::Choice)
                    .description("Current compatibility mode")
                    .options(&["BACKWARD", "FORWARD", "FULL", "NONE"])
                    .default_value("BACKWARD".into()),
                ElicitationField::new("risk_tolerance", FieldType::Choice)
                    .description("Risk tolerance for this change")
                    .options(&["very_low", "low", "medium", "high"])
                    .default_value("low".into()),
            ])
            // Breaking changes take the resolution detour; everything else
            // goes straight to strategy selection.
            .condition(Condition::new(
                "has_breaking_changes",
                ConditionOperator::Equals,
                "true".into(),
                "compatibility_resolution",
            ))
            .next_direct("default", "evolution_strategy"),
    );

    steps.insert(
        "compatibility_resolution".to_string(),
        WorkflowStep::new("compatibility_resolution", "Compatibility Resolution")
            .description("Your changes break compatibility. Resolve this safely.")
            .fields(vec![
                ElicitationField::new("resolution_approach", FieldType::Choice)
                    .description("How would you like to handle the breaking changes?")
                    .options(&[
                        "make_backward_compatible",
                        "use_union_types",
                        "add_defaults",
                        "create_new_subject",
                        "force_with_coordination",
                    ]),
                ElicitationField::new("compatibility_override", FieldType::Confirmation)
                    .description("Temporarily change compatibility mode for this operation?")
                    .default_value("false".into()),
                ElicitationField::new("compatibility_notes", FieldType::Text)
                    .description("Notes about compatibility decisions")
                    .optional(),
            ])
            .next_direct("default", "evolution_strategy"),
    );

    steps.insert(
        "evolution_strategy".to_string(),
        WorkflowStep::new("evolution_strategy", "Evolution Strategy")
            .description("Choose your schema evolution strategy")
            .elicitation_type(ElicitationType::Choice)
            .fields(vec![ElicitationField::new("evolution_strategy", FieldType::Choice)
                .description("Select the evolution approach that best fits your needs")
                .options(&[
                    "direct_update",
                    "multi_version_migration",
                    "dual_support",
                    "gradual_migration",
                    "blue_green_deployment",
                ])])
            .next_by_value(
                "evolution_strategy",
                &[
                    ("multi_version_migration", "version_planning"),
                    ("dual_support", "dual_support_config"),
                    ("gradual_migration", "migration_phases"),
                ],
            )
            .next_direct("default", "implementation_details"),
    );

    steps.insert(
        "version_planning".to_string(),
        WorkflowStep::new("version_planning", "Multi-Version Migration Plan")
            .description("Plan your multi-version migration path")
            .fields(vec![
                ElicitationField::new("intermediate_versions", FieldType::Text)
                    .description("Number of intermediate versions needed")
                    .default_value("1".into()),
                ElicitationField::new("version_timeline", FieldType::Text)
                    .description("Timeline for each version (days)")
                    .placeholder("e.g., 7,14,30"),
                ElicitationField::new("deprecation_strategy", FieldType::Choice)
                    .description("How to handle deprecated fields?")
                    .options(&["mark_deprecated", "log_warnings", "dual_write", "ignore"])
                    .default_value("mark_deprecated".into()),
            ])
            .next_direct("default", "consumer_coordination"),
    );

    steps.insert(
        "dual_support_config".to_string(),
        WorkflowStep::new("dual_support_config", "Dual Support Configuration")
            .description("Configure dual schema support")
            .fields(vec![
                ElicitationField::new("support_duration", FieldType::Choice)
                    .description("How long to support both schemas?")
                    .options(&["1_week", "2_weeks", "1_month", "3_months", "custom"])
                    .default_value("1_month".into()),
                ElicitationField::new("field_mapping", FieldType::Text)
                    .description("Field mapping rules (old:new)")
                    .placeholder("e.g., userId:user_id, userName:user_name"),
                ElicitationField::new("conversion_logic", FieldType::Choice)
                    .description("Conversion handling")
                    .options(&["automatic", "custom_code", "consumer_side"])
                    .default_value("automatic".into()),
            ])
            .next_direct("default", "consumer_coordination"),
    );

    steps.insert(
        "migration_phases".to_string(),
        WorkflowStep::new("migration_phases", "Gradual Migration Phases")
            .description("Define migration phases")
            .fields(vec![
                ElicitationField::new("phase_count", FieldType::Choice)
                    .description("Number of migration phases")
                    .options(&["2", "3", "4", "5+"])
                    .default_value("3".into()),
                ElicitationField::new("phase_criteria", FieldType::Choice)
                    .description("Phase progression criteria")
                    .options(&[
                        "percentage_based",
                        "time_based",
                        "manual_approval",
                        "metric_based",
                    ])
                    .default_value("percentage_based".into()),
                ElicitationField::new("rollback_checkpoints", FieldType::Confirmation)
                    .description("Create rollback checkpoints at each phase?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "consumer_coordination"),
    );

    steps.insert(
        "implementation_details".to_string(),
        WorkflowStep::new("implementation_details", "Implementation Details")
            .description("Configure implementation specifics")
            .fields(vec![
                ElicitationField::new("deployment_window", FieldType::Text)
                    .description("Preferred deployment window")
                    .placeholder("e.g., 2024-01-15 02:00 UTC"),
                ElicitationField::new("validation_approach", FieldType::Choice)
                    .description("Schema validation approach")
                    .options(&["strict_validation", "lenient_validation", "custom_validators"])
                    .default_value("strict_validation".into()),
            ])
            .next_direct("default", "consumer_coordination"),
    );

    steps.insert(
        "consumer_coordination".to_string(),
        WorkflowStep::new("consumer_coordination", "Consumer Coordination")
            .description("Plan consumer coordination and communication")
            .fields(vec![
                ElicitationField::new("notification_method", FieldType::Choice)
                    .description("How to notify consumers?")
                    .options(&[
                        "automatic_alerts",
                        "email_notification",
                        "api_deprecation_headers",
                        "documentation_only",
                        "multi_channel",
                    ])
                    .default_value("multi_channel".into()),
                ElicitationField::new("consumer_testing", FieldType::Choice)
                    .description("Consumer testing approach")
                    .options(&[
                        "sandbox_environment",
                        "canary_consumers",
                        "parallel_testing",
                        "consumer_managed",
                    ])
                    .default_value("sandbox_environment".into()),
                ElicitationField::new("support_period", FieldType::Choice)
                    .description("Support period for old schema")
                    .options(&["1_week", "2_weeks", "1_month", "3_months", "6_months"])
                    .default_value("1_month".into()),
            ])
            .next_direct("default", "rollback_planning"),
    );

    steps.insert(
        "rollback_planning".to_string(),
        WorkflowStep::new("rollback_planning", "Rollback Strategy")
            .description("Plan your rollback strategy in case issues arise")
            .fields(vec![
                ElicitationField::new("rollback_trigger", FieldType::Choice)
                    .description("When to trigger rollback?")
                    .options(&[
                        "error_rate_threshold",
                        "consumer_reports",
                        "manual_decision",
                        "automated_monitoring",
                    ])
                    .default_value("automated_monitoring".into()),
                ElicitationField::new("rollback_time", FieldType::Choice)
                    .description("Maximum rollback time")
                    .options(&["5_minutes", "15_minutes", "1_hour", "4_hours"])
                    .default_value("15_minutes".into()),
                ElicitationField::new("data_handling", FieldType::Choice)
                    .description("How to handle data during rollback?")
                    .options(&[
                        "preserve_all",
                        "transform_backward",
                        "quarantine_incompatible",
                        "custom_handler",
                    ])
                    .default_value("preserve_all".into()),
                ElicitationField::new("rollback_testing", FieldType::Confirmation)
                    .description("Test rollback procedure before deployment?")
                    .default_value("true".into()),
            ])
            .next_direct("default", "final_review"),
    );

    steps.insert(
        "final_review".to_string(),
        WorkflowStep::new("final_review", "Final Review")
            .description("Review your schema evolution plan")
            .fields(vec![
                ElicitationField::new("generate_migration_guide", FieldType::Confirmation)
                    .description("Generate migration guide for consumers?")
                    .default_value("true".into()),
                ElicitationField::new("create_runbook", FieldType::Confirmation)
                    .description("Create operational runbook?")
                    .default_value("true".into()),
                ElicitationField::new("schedule_dry_run", FieldType::Confirmation)
                    .description("Schedule a dry run first?")
                    .default_value("true".into()),
                ElicitationField::new("evolution_notes", FieldType::Text)
                    .description("Additional notes for the evolution")
                    .optional(),
            ])
            .next_direct("default", "execute_evolution"),
    );

    steps.insert(
        "execute_evolution".to_string(),
        WorkflowStep::new("execute_evolution", "Execute Schema Evolution")
            .description("Ready to execute your schema evolution plan")
            .elicitation_type(ElicitationType::Confirmation)
            .fields(vec![
                ElicitationField::new("final_confirmation", FieldType::Confirmation)
                    .description("Execute schema evolution according to the selected strategy?"),
                ElicitationField::new("monitor_execution", FieldType::Confirmation)
                    .description("Enable real-time monitoring during execution?")
                    .default_value("true".into()),
            ])
            .next_by_value(
                "final_confirmation",
                &[("true", FINISH_STEP), ("false", "change_analysis")],
            ),
    );

    MultiStepWorkflow {
        id: SCHEMA_EVOLUTION_ASSISTANT.to_string(),
        name: "Schema Evolution Assistant".to_string(),
        description:
            "Guide for safe schema evolution with breaking change analysis and migration strategies"
                .to_string(),
        steps,
        initial_step_id: "change_analysis".to_string(),
        metadata: metadata(&[
            ("estimated_duration", "10-20 minutes".into()),
            ("difficulty", "intermediate".into()),
            ("requires_auth", true.into()),
            ("supports_rollback", true.into()),
        ]),
    }
}
