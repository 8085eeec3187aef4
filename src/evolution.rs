//! Structural schema change analysis for the evolution assistant.
//!
//! Bodies are compared as plain JSON records (`fields` arrays with `name`
//! and `type`); no format semantics beyond that. The output feeds the
//! guided evolution workflow's initial context, not compatibility
//! enforcement, which stays delegated to the upstream registry.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeImpact {
    Compatible,
    Uncertain,
    Breaking,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    FieldAdded,
    FieldRemoved,
    TypeChanged,
    NullabilityChanged,
    DefaultChanged,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SchemaChange {
    pub kind: ChangeKind,
    pub field: String,
    pub impact: ChangeImpact,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ChangeAnalysis {
    pub changes: Vec<SchemaChange>,
    pub has_breaking_changes: bool,
    pub compatible_count: usize,
    pub uncertain_count: usize,
    pub breaking_count: usize,
}

struct FieldInfo {
    type_repr: String,
    nullable: bool,
    has_default: bool,
    default: Option<Value>,
}

fn index_fields(schema: &Value) -> HashMap<String, FieldInfo> {
    let mut fields = HashMap::new();
    let Some(list) = schema.get("fields").and_then(Value::as_array) else {
        return fields;
    };
    for field in list {
        let Some(name) = field.get("name").and_then(Value::as_str) else {
            continue;
        };
        let field_type = field.get("type").cloned().unwrap_or(Value::Null);
        fields.insert(
            name.to_string(),
            FieldInfo {
                type_repr: normalize_type(&field_type),
                nullable: is_nullable(&field_type),
                has_default: field.get("default").is_some(),
                default: field.get("default").cloned(),
            },
        );
    }
    fields
}

/// Union types are represented as a sorted member list; `null` members make
/// the field nullable.
fn normalize_type(field_type: &Value) -> String {
    match field_type {
        Value::String(name) => name.clone(),
        Value::Array(members) => {
            let mut names: Vec<String> = members
                .iter()
                .map(normalize_type)
                .filter(|n| n != "null")
                .collect();
            names.sort();
            format!("union[{}]", names.join(","))
        }
        Value::Object(obj) => obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("complex")
            .to_string(),
        _ => "unknown".to_string(),
    }
}

fn is_nullable(field_type: &Value) -> bool {
    match field_type {
        Value::Array(members) => members.iter().any(|m| m.as_str() == Some("null")),
        Value::String(name) => name == "null",
        _ => false,
    }
}

/// Numeric widenings that existing readers handle.
fn is_widening(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("int", "long") | ("int", "float") | ("int", "double") | ("long", "float")
            | ("long", "double") | ("float", "double") | ("string", "bytes") | ("bytes", "string")
    )
}

/// Compare two schema bodies field by field.
pub fn analyze_changes(current: &Value, proposed: &Value) -> ChangeAnalysis {
    let current_fields = index_fields(current);
    let proposed_fields = index_fields(proposed);
    let mut changes = Vec::new();

    for (name, new_field) in &proposed_fields {
        match current_fields.get(name) {
            None => {
                let impact = if new_field.has_default || new_field.nullable {
                    ChangeImpact::Compatible
                } else {
                    // Old writers never produce this field; readers of old
                    // data cannot fill it in.
                    ChangeImpact::Breaking
                };
                changes.push(SchemaChange {
                    kind: ChangeKind::FieldAdded,
                    field: name.clone(),
                    impact,
                    detail: if new_field.has_default {
                        format!("added with default {:?}", new_field.default)
                    } else if new_field.nullable {
                        "added as nullable".to_string()
                    } else {
                        "added without default".to_string()
                    },
                });
            }
            Some(old_field) => {
                if old_field.type_repr != new_field.type_repr {
                    let impact = if is_widening(&old_field.type_repr, &new_field.type_repr) {
                        ChangeImpact::Compatible
                    } else if new_field.type_repr.starts_with("union[")
                        && new_field.type_repr.contains(&old_field.type_repr)
                    {
                        ChangeImpact::Uncertain
                    } else {
                        ChangeImpact::Breaking
                    };
                    changes.push(SchemaChange {
                        kind: ChangeKind::TypeChanged,
                        field: name.clone(),
                        impact,
                        detail: format!("{} -> {}", old_field.type_repr, new_field.type_repr),
                    });
                }
                if old_field.nullable != new_field.nullable {
                    changes.push(SchemaChange {
                        kind: ChangeKind::NullabilityChanged,
                        field: name.clone(),
                        impact: if new_field.nullable {
                            ChangeImpact::Compatible
                        } else {
                            ChangeImpact::Breaking
                        },
                        detail: format!(
                            "nullable {} -> {}",
                            old_field.nullable, new_field.nullable
                        ),
                    });
                }
                if old_field.has_default && !new_field.has_default {
                    changes.push(SchemaChange {
                        kind: ChangeKind::DefaultChanged,
                        field: name.clone(),
                        impact: ChangeImpact::Uncertain,
                        detail: "default removed".to_string(),
                    });
                }
            }
        }
    }

    for (name, old_field) in &current_fields {
        if !proposed_fields.contains_key(name) {
            let impact = if old_field.has_default || old_field.nullable {
                ChangeImpact::Uncertain
            } else {
                ChangeImpact::Breaking
            };
            changes.push(SchemaChange {
                kind: ChangeKind::FieldRemoved,
                field: name.clone(),
                impact,
                detail: "field removed".to_string(),
            });
        }
    }

    changes.sort_by(|a, b| a.field.cmp(&b.field));
    let compatible_count = changes
        .iter()
        .filter(|c| c.impact == ChangeImpact::Compatible)
        .count();
    let uncertain_count = changes
        .iter()
        .filter(|c| c.impact == ChangeImpact::Uncertain)
        .count();
    let breaking_count = changes
        .iter()
        .filter(|c| c.impact == ChangeImpact::Breaking)
        .count();

    ChangeAnalysis {
        has_breaking_changes: breaking_count > 0,
        compatible_count,
        uncertain_count,
        breaking_count,
        changes,
    }
}

/// Parse two schema body strings and analyze; unparseable bodies yield an
/// empty analysis rather than an error.
pub fn analyze_change_strings(current: &str, proposed: &str) -> ChangeAnalysis {
    let current: Value = serde_json::from_str(current).unwrap_or(Value::Null);
    let proposed: Value = serde_json::from_str(proposed).unwrap_or(Value::Null);
    analyze_changes(&current, &proposed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> Value {
        json!({"type": "record", "name": "T", "fields": fields})
    }

    #[test]
    fn test_added_field_with_default_is_compatible() {
        let current = record(json!([{"name": "id", "type": "string"}]));
        let proposed = record(json!([
            {"name": "id", "type": "string"},
            {"name": "email", "type": "string", "default": ""},
        ]));
        let analysis = analyze_changes(&current, &proposed);
        assert_eq!(analysis.changes.len(), 1);
        assert_eq!(analysis.changes[0].kind, ChangeKind::FieldAdded);
        assert_eq!(analysis.changes[0].impact, ChangeImpact::Compatible);
        assert!(!analysis.has_breaking_changes);
    }

    #[test]
    fn test_added_required_field_is_breaking() {
        let current = record(json!([{"name": "id", "type": "string"}]));
        let proposed = record(json!([
            {"name": "id", "type": "string"},
            {"name": "email", "type": "string"},
        ]));
        let analysis = analyze_changes(&current, &proposed);
        assert!(analysis.has_breaking_changes);
    }

    #[test]
    fn test_type_widening_is_compatible() {
        let current = record(json!([{"name": "count", "type": "int"}]));
        let proposed = record(json!([{"name": "count", "type": "long"}]));
        let analysis = analyze_changes(&current, &proposed);
        assert_eq!(analysis.changes[0].kind, ChangeKind::TypeChanged);
        assert_eq!(analysis.changes[0].impact, ChangeImpact::Compatible);
    }

    #[test]
    fn test_type_narrowing_is_breaking() {
        let current = record(json!([{"name": "count", "type": "long"}]));
        let proposed = record(json!([{"name": "count", "type": "int"}]));
        let analysis = analyze_changes(&current, &proposed);
        assert!(analysis.has_breaking_changes);
    }

    #[test]
    fn test_union_with_null_marks_nullable() {
        let current = record(json!([{"name": "note", "type": "string"}]));
        let proposed = record(json!([{"name": "note", "type": ["null", "string"]}]));
        let analysis = analyze_changes(&current, &proposed);
        // Becoming nullable is fine for readers.
        let nullability: Vec<_> = analysis
            .changes
            .iter()
            .filter(|c| c.kind == ChangeKind::NullabilityChanged)
            .collect();
        assert_eq!(nullability.len(), 1);
        assert_eq!(nullability[0].impact, ChangeImpact::Compatible);
    }

    #[test]
    fn test_removed_required_field_is_breaking() {
        let current = record(json!([
            {"name": "id", "type": "string"},
            {"name": "legacy", "type": "string"},
        ]));
        let proposed = record(json!([{"name": "id", "type": "string"}]));
        let analysis = analyze_changes(&current, &proposed);
        assert_eq!(analysis.breaking_count, 1);
        assert_eq!(analysis.changes[0].kind, ChangeKind::FieldRemoved);
    }

    #[test]
    fn test_unparseable_bodies_yield_empty_analysis() {
        let analysis = analyze_change_strings("not json", "{}");
        assert!(analysis.changes.is_empty());
        assert!(!analysis.has_breaking_changes);
    }
}
