//! Interactive tool wrappers.
//!
//! When a tool is called with incomplete inputs, these helpers open a
//! smart-defaults-enhanced elicitation, wait for the answer, and assemble
//! the inputs for the base operation. The combined result flags
//! `elicitation_used` so callers can tell the two paths apart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::defaults::enhancer::ElicitationEnhancer;
use crate::elicitation::{
    migration_preferences_request, schema_field_request, ElicitationManager, ElicitationRequest,
};
use crate::error::Result;

/// How long an interactive wrapper waits for the caller's answer before
/// returning the pending request instead.
const INTERACTIVE_WAIT: Duration = Duration::from_secs(120);

/// Outcome of an elicitation round: either the collected values, or the
/// still-pending request for the caller to answer later.
pub enum Collected {
    Values(HashMap<String, Value>),
    Pending(ElicitationRequest),
}

async fn collect(
    elicitation: &Arc<ElicitationManager>,
    request: ElicitationRequest,
) -> Result<Collected> {
    let request_id = elicitation.create(request.clone());
    match elicitation
        .wait_for(&request_id, Some(INTERACTIVE_WAIT))
        .await
    {
        Some(response) => Ok(Collected::Values(response.values)),
        None => Ok(Collected::Pending(request)),
    }
}

/// Ask for a schema field definition when `registerSchema` got no body.
pub async fn collect_schema_definition(
    elicitation: &Arc<ElicitationManager>,
    enhancer: &ElicitationEnhancer,
    context: Option<&str>,
) -> Result<Collected> {
    let request = enhancer.enhance(
        schema_field_request(context),
        "create_schema_field",
        context,
        None,
    );
    collect(elicitation, request).await
}

/// Ask for migration preferences when `migrateSchema`/`migrateContext` got
/// none.
pub async fn collect_migration_preferences(
    elicitation: &Arc<ElicitationManager>,
    enhancer: &ElicitationEnhancer,
    source_registry: &str,
    target_registry: &str,
    context: Option<&str>,
) -> Result<Collected> {
    let request = enhancer.enhance(
        migration_preferences_request(source_registry, target_registry, context),
        "migrate_schema",
        context,
        None,
    );
    collect(elicitation, request).await
}

/// Derive an Avro record name from a subject: strip the key/value suffix,
/// take the last dotted segment, and force an identifier shape.
pub fn record_name_for_subject(subject: &str) -> String {
    let base = subject
        .trim_end_matches("-value")
        .trim_end_matches("-key")
        .rsplit('.')
        .next()
        .unwrap_or(subject);
    let mut name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Build a one-field Avro record body from schema-field elicitation values.
pub fn build_record_schema(subject: &str, values: &HashMap<String, Value>) -> Value {
    let field_name = values
        .get("field_name")
        .and_then(Value::as_str)
        .unwrap_or("value");
    let field_type = values
        .get("field_type")
        .and_then(Value::as_str)
        .unwrap_or("string");
    let nullable = values
        .get("nullable")
        .map(|v| v == "true" || v == &Value::Bool(true))
        .unwrap_or(false);

    let mut field = serde_json::Map::new();
    field.insert("name".to_string(), field_name.into());
    if nullable {
        field.insert("type".to_string(), json!(["null", field_type]));
        field.insert("default".to_string(), Value::Null);
    } else {
        field.insert("type".to_string(), field_type.into());
        if let Some(default) = values.get("default_value").filter(|v| {
            !matches!(v, Value::Null) && v.as_str().map(|s| !s.is_empty()).unwrap_or(true)
        }) {
            field.insert("default".to_string(), default.clone());
        }
    }
    if let Some(doc) = values
        .get("documentation")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
    {
        field.insert("doc".to_string(), doc.into());
    }

    json!({
        "type": "record",
        "name": record_name_for_subject(subject),
        "fields": [Value::Object(field)],
    })
}

pub fn pref_bool(values: &HashMap<String, Value>, key: &str, default: bool) -> bool {
    match values.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => default,
    }
}

/// The "elicitation still pending" result returned when the caller did not
/// answer within the interactive window.
pub fn pending_payload(request: &ElicitationRequest) -> Value {
    json!({
        "elicitation_used": true,
        "elicitation_pending": true,
        "request": request,
        "hint": "answer with submitElicitationResponse, then call the tool again",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_name_from_subject() {
        assert_eq!(record_name_for_subject("user-events"), "user_events");
        assert_eq!(record_name_for_subject("com.example.User-value"), "User");
        assert_eq!(record_name_for_subject("9lives"), "_9lives");
    }

    #[test]
    fn test_build_record_schema_nullable() {
        let values: HashMap<String, Value> = [
            ("field_name".to_string(), "email".into()),
            ("field_type".to_string(), "string".into()),
            ("nullable".to_string(), "true".into()),
        ]
        .into_iter()
        .collect();

        let schema = build_record_schema("user-value", &values);
        assert_eq!(schema["type"], "record");
        assert_eq!(schema["fields"][0]["name"], "email");
        assert_eq!(schema["fields"][0]["type"], json!(["null", "string"]));
        assert_eq!(schema["fields"][0]["default"], Value::Null);
    }

    #[test]
    fn test_build_record_schema_with_default_and_doc() {
        let values: HashMap<String, Value> = [
            ("field_name".to_string(), "count".into()),
            ("field_type".to_string(), "int".into()),
            ("nullable".to_string(), "false".into()),
            ("default_value".to_string(), "0".into()),
            ("documentation".to_string(), "event count".into()),
        ]
        .into_iter()
        .collect();

        let schema = build_record_schema("counts", &values);
        assert_eq!(schema["fields"][0]["type"], "int");
        assert_eq!(schema["fields"][0]["default"], "0");
        assert_eq!(schema["fields"][0]["doc"], "event count");
    }

    #[tokio::test]
    async fn test_collect_returns_values_on_answer() {
        let elicitation = Arc::new(ElicitationManager::new());
        let dir = tempfile::tempdir().unwrap();
        let enhancer = ElicitationEnhancer::new(Arc::new(
            crate::defaults::SmartDefaultsEngine::new(dir.path()).unwrap(),
        ));

        let manager = Arc::clone(&elicitation);
        let answerer = tokio::spawn(async move {
            // Wait for the request to appear, then answer it.
            for _ in 0..50 {
                if let Some(request) = manager.list_pending().first().cloned() {
                    let values = [
                        ("field_name".to_string(), Value::from("id")),
                        ("field_type".to_string(), Value::from("string")),
                        ("nullable".to_string(), Value::from("false")),
                    ]
                    .into_iter()
                    .collect();
                    manager
                        .submit(crate::elicitation::ElicitationResponse::new(
                            &request.id,
                            values,
                        ))
                        .unwrap();
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("request never appeared");
        });

        let collected = collect_schema_definition(&elicitation, &enhancer, None)
            .await
            .unwrap();
        answerer.await.unwrap();
        match collected {
            Collected::Values(values) => assert_eq!(values["field_name"], "id"),
            Collected::Pending(_) => panic!("expected values"),
        }
    }
}
