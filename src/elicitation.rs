//! Single-shot information requests with timeouts and validation.
//!
//! A tool that needs more input creates an [`ElicitationRequest`]; the
//! caller answers it through the `submitElicitationResponse` tool. Exactly
//! one response may be stored per request, and only while unexpired.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{Result, WardenError};

#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ElicitationType {
    Text,
    Choice,
    Confirmation,
    #[default]
    Form,
    MultiField,
}

#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ElicitationPriority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Choice,
    Confirmation,
    Email,
    Url,
    Integer,
    Number,
    Boolean,
}

/// Extra constraints a field may declare beyond its type.
#[derive(Debug, Default, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ValidationRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ElicitationField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl ElicitationField {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            label: None,
            description: None,
            required: true,
            default: None,
            options: None,
            validation: None,
            placeholder: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn validation(mut self, rules: ValidationRules) -> Self {
        self.validation = Some(rules);
        self
    }
}

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ElicitationRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub request_type: ElicitationType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<ElicitationField>,
    pub priority: ElicitationPriority,
    pub timeout_seconds: u64,
    pub allow_multiple: bool,
    pub context: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ElicitationRequest {
    pub fn new(request_type: ElicitationType, title: &str) -> Self {
        let created_at = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_type,
            title: title.to_string(),
            description: None,
            fields: Vec::new(),
            priority: ElicitationPriority::Medium,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            allow_multiple: false,
            context: HashMap::new(),
            created_at,
            expires_at: created_at + chrono::Duration::seconds(DEFAULT_TIMEOUT_SECONDS as i64),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn fields(mut self, fields: Vec<ElicitationField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self.expires_at = self.created_at + chrono::Duration::seconds(seconds as i64);
        self
    }

    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    pub fn context_entry(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ElicitationResponse {
    pub request_id: String,
    pub values: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ElicitationResponse {
    pub fn new(request_id: &str, values: HashMap<String, serde_json::Value>) -> Self {
        Self {
            request_id: request_id.to_string(),
            values,
            timestamp: Utc::now(),
            complete: true,
            metadata: None,
        }
    }
}

fn value_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn value_as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Validate one response against its request's field declarations.
pub fn validate_response(
    request: &ElicitationRequest,
    response: &ElicitationResponse,
) -> Result<()> {
    let invalid = |message: String| {
        Err(WardenError::ElicitationInvalid {
            request_id: request.id.clone(),
            message,
        })
    };

    for field in &request.fields {
        let value = response.values.get(&field.name);

        let Some(value) = value else {
            if field.required {
                return invalid(format!("missing required field '{}'", field.name));
            }
            continue;
        };

        // Optional empty values skip every check below.
        if value_is_empty(value) {
            if field.required {
                return invalid(format!("required field '{}' is empty", field.name));
            }
            continue;
        }

        let text = value_as_string(value);

        if let Some(options) = &field.options {
            if !options.contains(&text) {
                return invalid(format!(
                    "'{}' is not a valid option for field '{}'",
                    text, field.name
                ));
            }
        }

        if field.field_type == FieldType::Email {
            let mut parts = text.splitn(2, '@');
            let local = parts.next().unwrap_or_default();
            let domain = parts.next().unwrap_or_default();
            if local.is_empty() || domain.is_empty() {
                return invalid(format!("invalid email for field '{}': {text}", field.name));
            }
        }

        if let Some(rules) = &field.validation {
            if let Some(pattern) = &rules.pattern {
                match regex::Regex::new(pattern) {
                    Ok(re) if !re.is_match(&text) => {
                        return invalid(format!(
                            "field '{}' does not match pattern {pattern}",
                            field.name
                        ));
                    }
                    // An unparseable pattern in the field declaration is the
                    // tool author's bug; don't fail the user's response on it.
                    _ => {}
                }
            }
            if let Some(min) = rules.min_length {
                if text.chars().count() < min {
                    return invalid(format!("field '{}' shorter than {min}", field.name));
                }
            }
            if let Some(max) = rules.max_length {
                if text.chars().count() > max {
                    return invalid(format!("field '{}' longer than {max}", field.name));
                }
            }
            if rules.min_value.is_some() || rules.max_value.is_some() {
                let numeric = value.as_f64().or_else(|| text.parse::<f64>().ok());
                let Some(numeric) = numeric else {
                    return invalid(format!("field '{}' is not numeric", field.name));
                };
                if let Some(min) = rules.min_value {
                    if numeric < min {
                        return invalid(format!("field '{}' below minimum {min}", field.name));
                    }
                }
                if let Some(max) = rules.max_value {
                    if numeric > max {
                        return invalid(format!("field '{}' above maximum {max}", field.name));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Tracks pending requests, stored responses, and per-request timers.
pub struct ElicitationManager {
    pending: DashMap<String, ElicitationRequest>,
    responses: DashMap<String, ElicitationResponse>,
    timers: DashMap<String, JoinHandle<()>>,
}

impl Default for ElicitationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ElicitationManager {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            responses: DashMap::new(),
            timers: DashMap::new(),
        }
    }

    /// Store a request and arm its expiry timer.
    pub fn create(self: &std::sync::Arc<Self>, request: ElicitationRequest) -> String {
        let id = request.id.clone();
        let timeout = request.timeout_seconds;
        self.pending.insert(id.clone(), request);

        if timeout > 0 {
            let manager = std::sync::Arc::clone(self);
            let timer_id = id.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(timeout)).await;
                if manager.pending.remove(&timer_id).is_some() {
                    tracing::warn!(request_id = %timer_id, "elicitation request timed out");
                }
                manager.timers.remove(&timer_id);
            });
            self.timers.insert(id.clone(), handle);
        }

        tracing::info!(request_id = %id, "created elicitation request");
        id
    }

    /// Submit a response. At most one response is ever stored per request.
    pub fn submit(&self, response: ElicitationResponse) -> Result<()> {
        let request_id = response.request_id.clone();

        if self.responses.contains_key(&request_id) {
            return Err(WardenError::ElicitationDuplicate { request_id });
        }
        let Some(request) = self.pending.get(&request_id).map(|r| r.clone()) else {
            return Err(WardenError::ElicitationExpired { request_id });
        };
        if request.is_expired() {
            self.drop_request(&request_id);
            return Err(WardenError::ElicitationExpired { request_id });
        }

        validate_response(&request, &response)?;

        self.responses.insert(request_id.clone(), response);
        self.drop_request(&request_id);
        tracing::info!(request_id = %request_id, "stored elicitation response");
        Ok(())
    }

    /// Poll until a response arrives or the request expires.
    pub async fn wait_for(
        &self,
        request_id: &str,
        timeout: Option<Duration>,
    ) -> Option<ElicitationResponse> {
        let effective = timeout.unwrap_or_else(|| {
            self.pending
                .get(request_id)
                .map(|r| Duration::from_secs(r.timeout_seconds))
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
        });
        let deadline = tokio::time::Instant::now() + effective;

        loop {
            if let Some(response) = self.responses.get(request_id) {
                return Some(response.clone());
            }
            if !self.pending.contains_key(request_id) || tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn get_request(&self, request_id: &str) -> Option<ElicitationRequest> {
        self.pending.get(request_id).map(|r| r.clone())
    }

    pub fn get_response(&self, request_id: &str) -> Option<ElicitationResponse> {
        self.responses.get(request_id).map(|r| r.clone())
    }

    pub fn list_pending(&self) -> Vec<ElicitationRequest> {
        let mut requests: Vec<ElicitationRequest> =
            self.pending.iter().map(|r| r.clone()).collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    pub fn cancel(&self, request_id: &str) -> bool {
        let existed = self.pending.contains_key(request_id);
        self.drop_request(request_id);
        existed
    }

    /// Drop expired pending requests and responses older than the cutoff.
    pub fn cleanup_expired(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|r| r.is_expired())
            .map(|r| r.id.clone())
            .collect();
        for id in &expired {
            self.drop_request(id);
        }
        let before = self.responses.len();
        self.responses.retain(|_, r| r.timestamp >= cutoff);
        expired.len() + before - self.responses.len()
    }

    fn drop_request(&self, request_id: &str) {
        self.pending.remove(request_id);
        if let Some((_, timer)) = self.timers.remove(request_id) {
            timer.abort();
        }
    }
}

// Builders for the standard request shapes used by interactive tools.

pub fn schema_field_request(context: Option<&str>) -> ElicitationRequest {
    let mut request = ElicitationRequest::new(ElicitationType::Form, "Define Schema Field")
        .description("Provide details for the new schema field")
        .fields(vec![
            ElicitationField::new("field_name", FieldType::Text)
                .label("Field Name")
                .placeholder("e.g., user_id, email, timestamp"),
            ElicitationField::new("field_type", FieldType::Choice)
                .label("Field Type")
                .options(&[
                    "string", "int", "long", "float", "double", "boolean", "bytes", "array",
                    "record",
                ])
                .default_value("string".into()),
            ElicitationField::new("nullable", FieldType::Choice)
                .label("Nullable")
                .options(&["true", "false"])
                .default_value("false".into()),
            ElicitationField::new("default_value", FieldType::Text)
                .label("Default Value")
                .optional()
                .placeholder("Leave empty for no default"),
            ElicitationField::new("documentation", FieldType::Text)
                .label("Documentation")
                .optional()
                .placeholder("Brief description of the field purpose"),
        ])
        .allow_multiple(true)
        .timeout_seconds(600);
    if let Some(ctx) = context {
        request = request.context_entry("schema_context", ctx.into());
    }
    request
}

pub fn migration_preferences_request(
    source_registry: &str,
    target_registry: &str,
    context: Option<&str>,
) -> ElicitationRequest {
    ElicitationRequest::new(ElicitationType::Form, "Migration Preferences")
        .description(&format!(
            "Configure migration from {source_registry} to {target_registry}"
        ))
        .fields(vec![
            ElicitationField::new("preserve_ids", FieldType::Choice)
                .label("Preserve Schema IDs")
                .description("Requires IMPORT mode on the target registry")
                .options(&["true", "false"])
                .default_value("true".into()),
            ElicitationField::new("migrate_all_versions", FieldType::Choice)
                .label("Migrate All Versions")
                .options(&["true", "false"])
                .default_value("false".into()),
            ElicitationField::new("conflict_resolution", FieldType::Choice)
                .label("Conflict Resolution")
                .options(&["skip", "overwrite", "prompt"])
                .default_value("skip".into()),
            ElicitationField::new("dry_run", FieldType::Choice)
                .label("Dry Run")
                .options(&["true", "false"])
                .default_value("true".into()),
        ])
        .context_entry("source_registry", source_registry.into())
        .context_entry("target_registry", target_registry.into())
        .context_entry("context", context.map(Into::into).unwrap_or(serde_json::Value::Null))
}

pub fn compatibility_resolution_request(
    subject: &str,
    errors: &[String],
) -> ElicitationRequest {
    ElicitationRequest::new(ElicitationType::Form, "Resolve Compatibility Issues")
        .description(&format!(
            "Schema for subject '{subject}' has compatibility issues that need resolution"
        ))
        .fields(vec![
            ElicitationField::new("resolution_strategy", FieldType::Choice)
                .label("Resolution Strategy")
                .options(&[
                    "modify_schema",
                    "change_compatibility_level",
                    "add_default_values",
                    "make_fields_optional",
                    "skip_registration",
                ]),
            ElicitationField::new("compatibility_level", FieldType::Choice)
                .label("New Compatibility Level")
                .optional()
                .options(&["BACKWARD", "FORWARD", "FULL", "NONE"])
                .default_value("BACKWARD".into()),
            ElicitationField::new("notes", FieldType::Text)
                .label("Notes")
                .optional(),
        ])
        .context_entry("subject", subject.into())
        .context_entry(
            "compatibility_errors",
            serde_json::to_value(errors).unwrap_or_default(),
        )
}

pub fn context_metadata_request(context_name: &str) -> ElicitationRequest {
    ElicitationRequest::new(ElicitationType::Form, "Context Metadata")
        .description(&format!(
            "Provide metadata for the new context '{context_name}'"
        ))
        .fields(vec![
            ElicitationField::new("description", FieldType::Text)
                .label("Context Description")
                .optional(),
            ElicitationField::new("owner", FieldType::Text)
                .label("Owner")
                .optional()
                .placeholder("e.g., data-platform-team"),
            ElicitationField::new("environment", FieldType::Choice)
                .label("Environment")
                .optional()
                .options(&["development", "staging", "production", "testing"])
                .default_value("development".into()),
            ElicitationField::new("tags", FieldType::Text)
                .label("Tags")
                .optional()
                .placeholder("Comma-separated tags"),
        ])
        .context_entry("context_name", context_name.into())
}

pub fn export_preferences_request(operation: &str) -> ElicitationRequest {
    ElicitationRequest::new(ElicitationType::Form, "Export Preferences")
        .description(&format!("Configure {operation} export settings"))
        .fields(vec![
            ElicitationField::new("format", FieldType::Choice)
                .label("Export Format")
                .options(&["json", "avro_idl", "yaml", "csv"])
                .default_value("json".into()),
            ElicitationField::new("include_metadata", FieldType::Choice)
                .label("Include Metadata")
                .options(&["true", "false"])
                .default_value("true".into()),
            ElicitationField::new("include_versions", FieldType::Choice)
                .label("Version Inclusion")
                .options(&["latest", "all", "specific"])
                .default_value("latest".into()),
        ])
        .context_entry("operation", operation.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request_with(fields: Vec<ElicitationField>) -> ElicitationRequest {
        ElicitationRequest::new(ElicitationType::Form, "test").fields(fields)
    }

    fn response_for(
        request: &ElicitationRequest,
        values: &[(&str, serde_json::Value)],
    ) -> ElicitationResponse {
        ElicitationResponse::new(
            &request.id,
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let request = request_with(vec![ElicitationField::new("name", FieldType::Text)]);
        let response = response_for(&request, &[]);
        assert!(matches!(
            validate_response(&request, &response),
            Err(WardenError::ElicitationInvalid { .. })
        ));
    }

    #[test]
    fn test_choice_must_be_in_options() {
        let request = request_with(vec![
            ElicitationField::new("env", FieldType::Choice).options(&["dev", "prod"])
        ]);
        let bad = response_for(&request, &[("env", "staging".into())]);
        assert!(validate_response(&request, &bad).is_err());
        let good = response_for(&request, &[("env", "prod".into())]);
        assert!(validate_response(&request, &good).is_ok());
    }

    #[test]
    fn test_email_shape() {
        let request = request_with(vec![ElicitationField::new("owner", FieldType::Email)]);
        for bad in ["plainaddress", "@nodomain", "nolocal@"] {
            let response = response_for(&request, &[("owner", bad.into())]);
            assert!(validate_response(&request, &response).is_err(), "{bad}");
        }
        let response = response_for(&request, &[("owner", "team@example.com".into())]);
        assert!(validate_response(&request, &response).is_ok());
    }

    #[test]
    fn test_optional_empty_skips_type_checks() {
        let request = request_with(vec![
            ElicitationField::new("owner", FieldType::Email).optional()
        ]);
        let response = response_for(&request, &[("owner", "".into())]);
        assert!(validate_response(&request, &response).is_ok());
    }

    #[test]
    fn test_validation_rules() {
        let request = request_with(vec![
            ElicitationField::new("batch", FieldType::Integer).validation(ValidationRules {
                min_value: Some(1.0),
                max_value: Some(100.0),
                ..Default::default()
            }),
            ElicitationField::new("tag", FieldType::Text)
                .optional()
                .validation(ValidationRules {
                    pattern: Some("^[a-z-]+$".to_string()),
                    min_length: Some(2),
                    ..Default::default()
                }),
        ]);

        let too_big = response_for(&request, &[("batch", 500.into())]);
        assert!(validate_response(&request, &too_big).is_err());

        let bad_pattern =
            response_for(&request, &[("batch", 10.into()), ("tag", "UPPER".into())]);
        assert!(validate_response(&request, &bad_pattern).is_err());

        let ok = response_for(&request, &[("batch", "10".into()), ("tag", "events".into())]);
        assert!(validate_response(&request, &ok).is_ok());
    }

    #[tokio::test]
    async fn test_single_response_per_request() {
        let manager = Arc::new(ElicitationManager::new());
        let request = request_with(vec![ElicitationField::new("name", FieldType::Text)]);
        let id = manager.create(request.clone());

        let first = ElicitationResponse::new(
            &id,
            [("name".to_string(), "first".into())].into_iter().collect(),
        );
        manager.submit(first).unwrap();

        let second = ElicitationResponse::new(
            &id,
            [("name".to_string(), "second".into())].into_iter().collect(),
        );
        let err = manager.submit(second).unwrap_err();
        assert!(matches!(err, WardenError::ElicitationDuplicate { .. }));

        // The stored response is untouched.
        let stored = manager.get_response(&id).unwrap();
        assert_eq!(stored.values["name"], "first");
    }

    #[tokio::test]
    async fn test_timeout_expires_request() {
        let manager = Arc::new(ElicitationManager::new());
        let request = request_with(vec![ElicitationField::new("name", FieldType::Text)])
            .timeout_seconds(1);
        let id = manager.create(request);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(manager.list_pending().is_empty());

        let late = ElicitationResponse::new(
            &id,
            [("name".to_string(), "late".into())].into_iter().collect(),
        );
        assert!(matches!(
            manager.submit(late),
            Err(WardenError::ElicitationExpired { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_for_returns_submitted_response() {
        let manager = Arc::new(ElicitationManager::new());
        let request = request_with(vec![ElicitationField::new("name", FieldType::Text)]);
        let id = manager.create(request);

        let waiter = {
            let manager = Arc::clone(&manager);
            let id = id.clone();
            tokio::spawn(async move {
                manager
                    .wait_for(&id, Some(Duration::from_secs(5)))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(150)).await;
        manager
            .submit(ElicitationResponse::new(
                &id,
                [("name".to_string(), "hi".into())].into_iter().collect(),
            ))
            .unwrap();

        let response = waiter.await.unwrap().unwrap();
        assert_eq!(response.values["name"], "hi");
    }

    #[tokio::test]
    async fn test_cancel_removes_pending() {
        let manager = Arc::new(ElicitationManager::new());
        let id = manager.create(request_with(vec![]));
        assert!(manager.cancel(&id));
        assert!(!manager.cancel(&id));
        assert!(manager.list_pending().is_empty());
    }
}
