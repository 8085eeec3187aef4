//! Enriches elicitation requests with smart-default suggestions and records
//! acceptance feedback when responses come back.

use std::collections::HashMap;
use std::sync::Arc;

use crate::defaults::{SmartDefault, SmartDefaultsEngine, APPLY_CONFIDENCE_THRESHOLD};
use crate::elicitation::{ElicitationRequest, ElicitationResponse};

pub struct ElicitationEnhancer {
    engine: Arc<SmartDefaultsEngine>,
}

impl ElicitationEnhancer {
    pub fn new(engine: Arc<SmartDefaultsEngine>) -> Self {
        Self { engine }
    }

    /// Apply suggestions to a request's fields.
    ///
    /// High-confidence suggestions replace field defaults; every suggestion
    /// annotates the field description with its value and provenance.
    pub fn enhance(
        &self,
        mut request: ElicitationRequest,
        operation: &str,
        context: Option<&str>,
        existing_data: Option<&HashMap<String, serde_json::Value>>,
    ) -> ElicitationRequest {
        let defaults = self.engine.suggest_defaults(operation, context, existing_data);
        let mut applied = 0usize;

        for field in &mut request.fields {
            let Some(suggestion) = defaults.get(&field.name) else {
                continue;
            };
            applied += 1;
            if suggestion.confidence >= APPLY_CONFIDENCE_THRESHOLD {
                field.default = Some(suggestion.value.clone());
            }
            let annotation = format!(
                "Suggested: {} - {}% confidence",
                display_value(&suggestion.value),
                (suggestion.confidence * 100.0).round() as u32
            );
            field.description = Some(match &field.description {
                Some(existing) => format!("{existing} ({annotation})"),
                None => annotation,
            });
        }

        request.context.insert("smart_defaults_enabled".to_string(), true.into());
        request
            .context
            .insert("operation".to_string(), operation.into());
        if let Some(ctx) = context {
            request
                .context
                .insert("operation_context".to_string(), ctx.into());
        }
        request
            .context
            .insert("suggestion_count".to_string(), applied.into());
        request.context.insert(
            "suggestions".to_string(),
            serde_json::to_value(
                defaults
                    .iter()
                    .map(|(name, d)| (name.clone(), suggestion_summary(d)))
                    .collect::<HashMap<String, serde_json::Value>>(),
            )
            .unwrap_or_default(),
        );

        request
    }

    /// Record accept/reject feedback for a submitted response.
    ///
    /// Each answered field records the user's value as accepted; when a
    /// suggestion existed and was overridden, the suggested value records a
    /// rejection so its score decays.
    pub fn record_feedback(
        &self,
        request: &ElicitationRequest,
        response: &ElicitationResponse,
        operation: &str,
        context: Option<&str>,
    ) {
        if request
            .context
            .get("smart_defaults_enabled")
            .and_then(|v| v.as_bool())
            != Some(true)
        {
            return;
        }

        let suggestions = request
            .context
            .get("suggestions")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        for field in &request.fields {
            let Some(value) = response.values.get(&field.name) else {
                continue;
            };
            self.engine
                .record_choice(operation, context, &field.name, value.clone(), true);

            if let Some(suggested) = suggestions
                .get(&field.name)
                .and_then(|s| s.get("value"))
            {
                if suggested != value {
                    self.engine.record_choice(
                        operation,
                        context,
                        &field.name,
                        suggested.clone(),
                        false,
                    );
                }
            }
        }
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn suggestion_summary(default: &SmartDefault) -> serde_json::Value {
    serde_json::json!({
        "value": default.value,
        "confidence": default.confidence,
        "source": default.source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elicitation::{ElicitationField, ElicitationType, FieldType};

    fn enhancer(dir: &std::path::Path) -> ElicitationEnhancer {
        ElicitationEnhancer::new(Arc::new(SmartDefaultsEngine::new(dir).unwrap()))
    }

    fn form() -> ElicitationRequest {
        ElicitationRequest::new(ElicitationType::Form, "Test Form").fields(vec![
            ElicitationField::new("compatibility", FieldType::Choice)
                .options(&["BACKWARD", "FORWARD", "FULL", "NONE"]),
            ElicitationField::new("schema_type", FieldType::Choice)
                .options(&["AVRO", "JSON", "PROTOBUF"]),
            ElicitationField::new("unrelated", FieldType::Text).optional(),
        ])
    }

    #[test]
    fn test_enhance_replaces_defaults_and_annotates() {
        let dir = tempfile::tempdir().unwrap();
        let enhanced = enhancer(dir.path()).enhance(form(), "create_schema", Some("production"), None);

        assert_eq!(
            enhanced.context["smart_defaults_enabled"],
            serde_json::json!(true)
        );
        let schema_type = enhanced
            .fields
            .iter()
            .find(|f| f.name == "schema_type")
            .unwrap();
        // Template confidence clears the apply threshold.
        assert_eq!(schema_type.default, Some("AVRO".into()));
        assert!(schema_type
            .description
            .as_deref()
            .unwrap()
            .contains("Suggested: AVRO"));

        let unrelated = enhanced.fields.iter().find(|f| f.name == "unrelated").unwrap();
        assert!(unrelated.default.is_none());
    }

    #[test]
    fn test_feedback_records_acceptance_and_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SmartDefaultsEngine::new(dir.path()).unwrap());
        let enhancer = ElicitationEnhancer::new(Arc::clone(&engine));

        let enhanced = enhancer.enhance(form(), "create_schema", Some("production"), None);
        // User overrides the suggested FULL with BACKWARD.
        let response = ElicitationResponse::new(
            &enhanced.id,
            [("compatibility".to_string(), serde_json::json!("BACKWARD"))]
                .into_iter()
                .collect(),
        );
        enhancer.record_feedback(&enhanced, &response, "create_schema", Some("production"));

        let preference = engine
            .historical_preference("create_schema", Some("production"), "compatibility")
            .unwrap();
        assert_eq!(preference.value, serde_json::json!("BACKWARD"));
    }

    #[test]
    fn test_feedback_noop_without_enhancement() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SmartDefaultsEngine::new(dir.path()).unwrap());
        let enhancer = ElicitationEnhancer::new(Arc::clone(&engine));

        let plain = form();
        let response = ElicitationResponse::new(
            &plain.id,
            [("compatibility".to_string(), serde_json::json!("FULL"))]
                .into_iter()
                .collect(),
        );
        enhancer.record_feedback(&plain, &response, "create_schema", None);
        assert!(engine
            .historical_preference("create_schema", None, "compatibility")
            .is_none());
    }
}
