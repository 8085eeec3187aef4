//! Turns a completed workflow's responses into an execution plan.
//!
//! Plans are returned to the caller, never auto-executed; the caller decides
//! whether to feed them into the migration tools.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::workflow::definitions::{
    CONTEXT_REORGANIZATION, DISASTER_RECOVERY_SETUP, SCHEMA_EVOLUTION_ASSISTANT,
    SCHEMA_MIGRATION_WIZARD,
};
use crate::workflow::WorkflowCompletion;

fn text(responses: &HashMap<String, Value>, key: &str) -> Option<String> {
    responses.get(key).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn truthy(responses: &HashMap<String, Value>, key: &str) -> bool {
    match responses.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

fn comma_list(responses: &HashMap<String, Value>, key: &str) -> Vec<String> {
    text(responses, key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the plan for a completed workflow, dispatching on its definition.
pub fn build_plan(completion: &WorkflowCompletion) -> Value {
    let responses = &completion.responses;
    let workflow_id = completion
        .metadata
        .get("workflow_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    // Older states carry only the display name; accept both.
    let plan = match (workflow_id, completion.workflow_name.as_str()) {
        (SCHEMA_MIGRATION_WIZARD, _) | (_, "Schema Migration Wizard") => {
            migration_plan(responses)
        }
        (CONTEXT_REORGANIZATION, _) | (_, "Context Reorganization") => {
            reorganization_plan(responses)
        }
        (DISASTER_RECOVERY_SETUP, _) | (_, "Disaster Recovery Setup") => {
            disaster_recovery_plan(responses)
        }
        (SCHEMA_EVOLUTION_ASSISTANT, _) | (_, "Schema Evolution Assistant") => {
            evolution_plan(responses)
        }
        _ => json!({"error": format!("Unknown workflow: {}", completion.workflow_name)}),
    };
    plan
}

fn migration_plan(responses: &HashMap<String, Value>) -> Value {
    let migration_type = text(responses, "migration_type").unwrap_or_default();
    let mut plan = json!({
        "operation": "schema_migration",
        "migration_type": migration_type,
        "source": text(responses, "source_registry"),
        "target": text(responses, "target_registry"),
        "target_context": text(responses, "target_context"),
        "status": "pending",
        "options": {
            "preserve_ids": truthy(responses, "preserve_ids"),
            "conflict_resolution": text(responses, "conflict_resolution"),
            "create_backup": truthy(responses, "create_backup"),
            "dry_run": truthy(responses, "dry_run"),
        },
    });

    match migration_type.as_str() {
        "single_schema" => {
            plan["schema_name"] = text(responses, "schema_name").into();
            plan["version"] = text(responses, "version").unwrap_or_else(|| "latest".into()).into();
        }
        "bulk_migration" => {
            plan["pattern"] = text(responses, "schema_pattern").into();
            plan["include_all_versions"] = truthy(responses, "include_all_versions").into();
            plan["context_filter"] = text(responses, "context_filter").into();
        }
        "context_migration" => {
            plan["source_context"] = text(responses, "source_context").into();
            plan["include_dependencies"] = truthy(responses, "include_dependencies").into();
        }
        _ => {}
    }
    plan
}

fn reorganization_plan(responses: &HashMap<String, Value>) -> Value {
    let strategy = text(responses, "strategy").unwrap_or_default();
    let mut plan = json!({
        "operation": "context_reorganization",
        "strategy": strategy,
        "status": "pending",
        "options": {
            "backup_first": truthy(responses, "backup_first"),
            "test_mode": truthy(responses, "test_mode"),
            "generate_report": truthy(responses, "generate_report"),
        },
    });

    match strategy.as_str() {
        "merge" => {
            plan["source_contexts"] = comma_list(responses, "source_contexts").into();
            plan["target_context"] = text(responses, "target_context").into();
            plan["handle_duplicates"] = text(responses, "handle_duplicates").into();
        }
        "split" => {
            plan["source_context"] = text(responses, "source_context").into();
            plan["split_criteria"] = text(responses, "split_criteria").into();
            plan["target_contexts"] = comma_list(responses, "target_contexts").into();
            plan["split_rules"] = text(responses, "split_rules").into();
        }
        "rename" => {
            let mut mappings = serde_json::Map::new();
            for mapping in comma_list(responses, "rename_mappings") {
                if let Some((old, new)) = mapping.split_once(':') {
                    let (old, new) = (old.trim(), new.trim());
                    if !old.is_empty() && !new.is_empty() {
                        mappings.insert(old.to_string(), new.into());
                    }
                }
            }
            plan["rename_mappings"] = Value::Object(mappings);
            plan["update_references"] = truthy(responses, "update_references").into();
        }
        "restructure" => {
            plan["structure_definition"] = text(responses, "structure_definition").into();
            plan["migration_strategy"] = text(responses, "migration_strategy").into();
        }
        _ => {}
    }
    plan
}

fn disaster_recovery_plan(responses: &HashMap<String, Value>) -> Value {
    let strategy = text(responses, "dr_strategy").unwrap_or_default();
    let config = match strategy.as_str() {
        "active_passive" => json!({
            "primary_registry": text(responses, "primary_registry"),
            "standby_registry": text(responses, "standby_registry"),
            "replication_interval": text(responses, "replication_interval"),
            "failover_mode": text(responses, "failover_mode"),
        }),
        "active_active" => json!({
            "active_registries": comma_list(responses, "active_registries"),
            "conflict_resolution": text(responses, "conflict_resolution"),
            "sync_topology": text(responses, "sync_topology"),
        }),
        "backup_restore" => json!({
            "backup_schedule": text(responses, "backup_schedule"),
            "backup_location": text(responses, "backup_location"),
            "retention_policy": text(responses, "retention_policy"),
            "encryption": truthy(responses, "encryption"),
        }),
        "multi_region" => json!({
            "regions": comma_list(responses, "regions"),
            "primary_region": text(responses, "primary_region"),
            "data_residency": truthy(responses, "data_residency"),
            "cross_region_replication": text(responses, "cross_region_replication"),
        }),
        _ => Value::Null,
    };

    json!({
        "operation": "disaster_recovery_setup",
        "strategy": strategy,
        "status": "pending",
        "config": config,
        "options": {
            "enable_monitoring": truthy(responses, "enable_monitoring"),
            "run_dr_drill": truthy(responses, "run_dr_drill"),
            "generate_runbook": truthy(responses, "generate_runbook"),
            "initial_sync": truthy(responses, "initial_sync"),
        },
    })
}

fn evolution_plan(responses: &HashMap<String, Value>) -> Value {
    let has_breaking = truthy(responses, "has_breaking_changes");
    let strategy = text(responses, "evolution_strategy").unwrap_or_default();

    let mut plan = json!({
        "operation": "schema_evolution",
        "subject": text(responses, "subject"),
        "status": "pending",
        "change_info": {
            "change_type": text(responses, "change_type"),
            "description": text(responses, "change_description"),
            "current_consumers": text(responses, "current_consumers"),
            "production_impact": text(responses, "production_impact"),
            "has_breaking_changes": has_breaking,
        },
        "evolution_strategy": strategy,
        "consumer_coordination": {
            "notification_method": text(responses, "notification_method"),
            "testing_approach": text(responses, "consumer_testing"),
            "support_period": text(responses, "support_period"),
        },
        "rollback_plan": {
            "trigger": text(responses, "rollback_trigger"),
            "max_time": text(responses, "rollback_time"),
            "data_handling": text(responses, "data_handling"),
            "test_rollback": truthy(responses, "rollback_testing"),
        },
        "documentation": {
            "generate_migration_guide": truthy(responses, "generate_migration_guide"),
            "create_runbook": truthy(responses, "create_runbook"),
            "schedule_dry_run": truthy(responses, "schedule_dry_run"),
            "evolution_notes": text(responses, "evolution_notes"),
        },
        "execution": {
            "confirmed": truthy(responses, "final_confirmation"),
            "enable_monitoring": truthy(responses, "monitor_execution"),
        },
    });

    match strategy.as_str() {
        "multi_version_migration" => {
            plan["migration_config"] = json!({
                "intermediate_versions": text(responses, "intermediate_versions")
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(1),
                "version_timeline": text(responses, "version_timeline"),
                "deprecation_strategy": text(responses, "deprecation_strategy"),
            });
        }
        "dual_support" => {
            plan["dual_support_config"] = json!({
                "support_duration": text(responses, "support_duration"),
                "field_mapping": text(responses, "field_mapping"),
                "conversion_logic": text(responses, "conversion_logic"),
            });
        }
        "gradual_migration" => {
            plan["migration_phases"] = json!({
                "phase_count": text(responses, "phase_count"),
                "phase_criteria": text(responses, "phase_criteria"),
                "rollback_checkpoints": truthy(responses, "rollback_checkpoints"),
            });
        }
        _ => {
            plan["implementation"] = json!({
                "deployment_window": text(responses, "deployment_window"),
                "validation_approach": text(responses, "validation_approach"),
            });
        }
    }

    if has_breaking {
        plan["compatibility_resolution"] = json!({
            "approach": text(responses, "resolution_approach"),
            "override_compatibility": truthy(responses, "compatibility_override"),
            "notes": text(responses, "compatibility_notes"),
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn completion(
        name: &str,
        id: &str,
        responses: &[(&str, Value)],
    ) -> WorkflowCompletion {
        WorkflowCompletion {
            instance_id: "i-1".to_string(),
            workflow_name: name.to_string(),
            completed_at: Utc::now(),
            steps_completed: 3,
            responses: responses
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            metadata: [("workflow_id".to_string(), Value::from(id))]
                .into_iter()
                .collect(),
            aborted: false,
        }
    }

    #[test]
    fn test_single_schema_migration_plan() {
        let done = completion(
            "Schema Migration Wizard",
            SCHEMA_MIGRATION_WIZARD,
            &[
                ("migration_type", "single_schema".into()),
                ("source_registry", "dev".into()),
                ("target_registry", "prod".into()),
                ("schema_name", "user-events".into()),
                ("preserve_ids", "true".into()),
                ("dry_run", "true".into()),
            ],
        );
        let plan = build_plan(&done);
        assert_eq!(plan["operation"], "schema_migration");
        assert_eq!(plan["schema_name"], "user-events");
        assert_eq!(plan["version"], "latest");
        assert_eq!(plan["options"]["preserve_ids"], true);
        assert_eq!(plan["options"]["dry_run"], true);
    }

    #[test]
    fn test_rename_mappings_parsed() {
        let done = completion(
            "Context Reorganization",
            CONTEXT_REORGANIZATION,
            &[
                ("strategy", "rename".into()),
                ("rename_mappings", "dev:development, prod:production, bad".into()),
            ],
        );
        let plan = build_plan(&done);
        assert_eq!(plan["rename_mappings"]["dev"], "development");
        assert_eq!(plan["rename_mappings"]["prod"], "production");
        assert!(plan["rename_mappings"].get("bad").is_none());
    }

    #[test]
    fn test_evolution_breaking_changes_include_resolution() {
        let done = completion(
            "Schema Evolution Assistant",
            SCHEMA_EVOLUTION_ASSISTANT,
            &[
                ("subject", "orders-value".into()),
                ("has_breaking_changes", "true".into()),
                ("evolution_strategy", "dual_support".into()),
                ("resolution_approach", "add_defaults".into()),
                ("final_confirmation", "true".into()),
            ],
        );
        let plan = build_plan(&done);
        assert_eq!(plan["compatibility_resolution"]["approach"], "add_defaults");
        assert_eq!(plan["dual_support_config"]["support_duration"], Value::Null);
        assert_eq!(plan["execution"]["confirmed"], true);
    }

    #[test]
    fn test_unknown_workflow_is_error_value() {
        let done = completion("Mystery", "mystery", &[]);
        let plan = build_plan(&done);
        assert!(plan["error"].as_str().unwrap().contains("Mystery"));
    }
}
