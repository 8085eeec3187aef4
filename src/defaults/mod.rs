//! Smart defaults: naming-pattern analysis, a feedback-weighted learning
//! store, and a static template table, combined into per-field suggestions.

pub mod enhancer;

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

/// Reinforcement step for feedback scores.
const FEEDBACK_DELTA: f64 = 0.2;
/// Minimum samples before a historical preference reaches full weight.
const FULL_CONFIDENCE_SAMPLES: f64 = 3.0;
/// Historical preferences below this confidence are ignored.
pub const HISTORY_CONFIDENCE_THRESHOLD: f64 = 0.4;
/// Suggestions at or above this confidence replace field defaults.
pub const APPLY_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Minimum occurrences for a prefix/suffix to count as a convention.
const MIN_AFFIX_OCCURRENCES: usize = 3;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Template,
    History,
    Pattern,
    Provided,
}

/// One suggested value for a field.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SmartDefault {
    pub value: serde_json::Value,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub source: SuggestionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// A naming convention detected over a set of subject names.
#[derive(Debug, Clone, Serialize)]
pub struct NamingPattern {
    pub pattern: String,
    pub confidence: f64,
    pub occurrences: usize,
}

/// A field commonly seen across existing schemas.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct FieldSuggestion {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

/// Stateless analysis over subject names and schema bodies.
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    /// Detect naming conventions with their frequency-based confidence.
    pub fn analyze_naming_convention(subjects: &[String]) -> HashMap<String, NamingPattern> {
        let mut patterns = HashMap::new();
        if subjects.is_empty() {
            return patterns;
        }
        let total = subjects.len() as f64;
        let camel = regex::Regex::new(r"^[a-z]+[A-Z]").expect("static regex");

        let mut add_convention = |name: &str, occurrences: usize| {
            if occurrences == 0 {
                return;
            }
            let confidence = occurrences as f64 / total;
            if confidence >= 0.5 {
                patterns.insert(
                    name.to_string(),
                    NamingPattern {
                        pattern: name.to_string(),
                        confidence,
                        occurrences,
                    },
                );
            }
        };

        add_convention(
            "hyphenated",
            subjects.iter().filter(|s| s.contains('-')).count(),
        );
        add_convention(
            "underscored",
            subjects.iter().filter(|s| s.contains('_')).count(),
        );
        add_convention(
            "camel_case",
            subjects.iter().filter(|s| camel.is_match(s)).count(),
        );
        add_convention(
            "event_suffixed",
            subjects
                .iter()
                .filter(|s| s.ends_with("-events") || s.ends_with("_events") || s.ends_with("-event"))
                .count(),
        );

        // Common prefixes and suffixes on the first separator.
        let mut prefixes: HashMap<String, usize> = HashMap::new();
        let mut suffixes: HashMap<String, usize> = HashMap::new();
        for subject in subjects {
            if let Some(idx) = subject.find(['-', '_', '.']) {
                let prefix = &subject[..=idx];
                *prefixes.entry(prefix.to_string()).or_default() += 1;
            }
            if let Some(idx) = subject.rfind(['-', '_', '.']) {
                let suffix = &subject[idx..];
                *suffixes.entry(suffix.to_string()).or_default() += 1;
            }
        }
        for (prefix, occurrences) in prefixes {
            if occurrences >= MIN_AFFIX_OCCURRENCES {
                patterns.insert(
                    format!("prefix:{prefix}"),
                    NamingPattern {
                        pattern: prefix,
                        confidence: occurrences as f64 / total,
                        occurrences,
                    },
                );
            }
        }
        for (suffix, occurrences) in suffixes {
            if occurrences >= MIN_AFFIX_OCCURRENCES {
                patterns.insert(
                    format!("suffix:{suffix}"),
                    NamingPattern {
                        pattern: suffix,
                        confidence: occurrences as f64 / total,
                        occurrences,
                    },
                );
            }
        }

        patterns
    }

    /// Report common field names with their modal type across schema bodies.
    ///
    /// Bodies are treated as plain JSON records; no Avro semantics.
    pub fn analyze_field_patterns(
        schemas: &[serde_json::Value],
    ) -> HashMap<String, FieldSuggestion> {
        let mut counts: HashMap<String, HashMap<String, usize>> = HashMap::new();
        let mut seen = 0usize;

        for schema in schemas {
            let Some(fields) = schema.get("fields").and_then(|f| f.as_array()) else {
                continue;
            };
            seen += 1;
            for field in fields {
                let Some(name) = field.get("name").and_then(|n| n.as_str()) else {
                    continue;
                };
                let field_type = match field.get("type") {
                    Some(serde_json::Value::String(t)) => t.clone(),
                    Some(other) => other.to_string(),
                    None => continue,
                };
                *counts
                    .entry(name.to_string())
                    .or_default()
                    .entry(field_type)
                    .or_default() += 1;
            }
        }

        if seen == 0 {
            return HashMap::new();
        }

        counts
            .into_iter()
            .map(|(name, by_type)| {
                let total: usize = by_type.values().sum();
                let (modal_type, _) = by_type
                    .into_iter()
                    .max_by_key(|(_, count)| *count)
                    .expect("non-empty type counts");
                let suggestion = FieldSuggestion {
                    name: name.clone(),
                    field_type: modal_type,
                    confidence: total as f64 / seen as f64,
                    default_value: None,
                };
                (name, suggestion)
            })
            .collect()
    }
}

/// One persisted user decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub operation: String,
    pub context: String,
    pub field: String,
    pub value: serde_json::Value,
    pub accepted: bool,
    pub timestamp: DateTime<Utc>,
}

fn choice_key(operation: &str, context: &str, field: &str) -> String {
    format!("{operation}:{context}:{field}")
}

/// Durable store of user choices with exponential feedback scores.
pub struct LearningEngine {
    storage_path: PathBuf,
    pub user_choices: HashMap<String, Vec<ChoiceRecord>>,
    pub feedback_scores: HashMap<String, f64>,
}

impl LearningEngine {
    pub fn new(storage_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(storage_dir).map_err(|e| WardenError::Storage {
            message: format!("cannot create {}", storage_dir.display()),
            source: Some(e),
        })?;
        let storage_path = storage_dir.join("choices.jsonl");
        let mut engine = Self {
            storage_path,
            user_choices: HashMap::new(),
            feedback_scores: HashMap::new(),
        };
        engine.load()?;
        Ok(engine)
    }

    /// Resolve the storage dir: `SCHEMA_WARDEN_DATA_DIR`, else the platform
    /// data dir, else a dot-directory in cwd.
    pub fn default_storage_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("SCHEMA_WARDEN_DATA_DIR") {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        dirs::data_dir()
            .map(|d| d.join("schema-warden"))
            .unwrap_or_else(|| PathBuf::from(".schema-warden"))
    }

    fn load(&mut self) -> Result<()> {
        let file = match std::fs::File::open(&self.storage_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(WardenError::Storage {
                    message: format!("cannot open {}", self.storage_path.display()),
                    source: Some(e),
                })
            }
        };
        for line in std::io::BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            // Corrupt lines are skipped, never fatal.
            let Ok(record) = serde_json::from_str::<ChoiceRecord>(&line) else {
                continue;
            };
            self.apply(record);
        }
        Ok(())
    }

    fn apply(&mut self, record: ChoiceRecord) {
        let key = choice_key(&record.operation, &record.context, &record.field);
        let score = self.feedback_scores.entry(key.clone()).or_insert(0.5);
        let target = if record.accepted { 1.0 } else { 0.0 };
        *score = (*score * (1.0 - FEEDBACK_DELTA) + FEEDBACK_DELTA * target).clamp(0.0, 1.0);
        self.user_choices.entry(key).or_default().push(record);
    }

    /// Record a decision and append it to the store.
    pub fn record_choice(
        &mut self,
        operation: &str,
        context: &str,
        field: &str,
        value: serde_json::Value,
        accepted: bool,
    ) {
        let record = ChoiceRecord {
            operation: operation.to_string(),
            context: context.to_string(),
            field: field.to_string(),
            value,
            accepted,
            timestamp: Utc::now(),
        };
        if let Ok(line) = serde_json::to_string(&record) {
            let appended = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.storage_path)
                .and_then(|mut f| writeln!(f, "{line}"));
            if let Err(e) = appended {
                tracing::warn!(error = %e, "failed to persist learning record");
            }
        }
        self.apply(record);
    }

    /// The most-accepted recent value for this slot, with confidence derived
    /// from sample size, acceptance ratio, and the feedback score.
    pub fn get_historical_preference(
        &self,
        operation: &str,
        context: &str,
        field: &str,
    ) -> Option<SmartDefault> {
        let key = choice_key(operation, context, field);
        let records = self.user_choices.get(&key)?;
        if records.is_empty() {
            return None;
        }

        let mut accepted_counts: HashMap<String, (usize, serde_json::Value)> = HashMap::new();
        for record in records.iter().filter(|r| r.accepted) {
            let entry = accepted_counts
                .entry(record.value.to_string())
                .or_insert((0, record.value.clone()));
            entry.0 += 1;
        }
        let (accepted_count, value) = accepted_counts.into_values().max_by_key(|(n, _)| *n)?;

        let score = self.feedback_scores.get(&key).copied().unwrap_or(0.5);
        let acceptance_ratio = accepted_count as f64 / records.len() as f64;
        let sample_factor = (records.len() as f64 / FULL_CONFIDENCE_SAMPLES).min(1.0);
        let confidence = (0.5 * acceptance_ratio + 0.5 * score) * sample_factor;

        Some(SmartDefault {
            value,
            confidence,
            source: SuggestionSource::History,
            reasoning: Some(format!(
                "accepted {accepted_count} of {} recent choices",
                records.len()
            )),
        })
    }
}

/// The static template table: operation -> context -> field -> value.
fn template_defaults(operation: &str, context: Option<&str>) -> HashMap<String, SmartDefault> {
    let mut defaults = HashMap::new();
    let mut template = |field: &str, value: serde_json::Value, reasoning: &str| {
        defaults.insert(
            field.to_string(),
            SmartDefault {
                value,
                confidence: 0.75,
                source: SuggestionSource::Template,
                reasoning: Some(reasoning.to_string()),
            },
        );
    };

    let environment = context.unwrap_or("");
    match operation {
        "create_schema" | "register_schema" | "create_schema_field" => {
            template("schema_type", "AVRO".into(), "most common schema format");
            let compatibility = match environment {
                e if e.contains("prod") => "FULL",
                e if e.contains("stag") => "BACKWARD",
                e if e.contains("dev") => "NONE",
                _ => "BACKWARD",
            };
            template(
                "compatibility",
                compatibility.into(),
                "environment-appropriate compatibility",
            );
        }
        "migrate_schema" | "migrate_context" => {
            template("preserve_ids", "true".into(), "keeps consumer references stable");
            template("dry_run", "true".into(), "preview before mutating");
            template(
                "migrate_all_versions",
                "false".into(),
                "latest version is usually enough",
            );
            template("conflict_resolution", "skip".into(), "safest conflict policy");
        }
        "create_context" => {
            let environment_default = if environment.is_empty() {
                "development"
            } else {
                environment
            };
            template("environment", environment_default.into(), "context environment");
        }
        _ => {}
    }
    defaults
}

/// Canned field suggestions by record archetype.
pub fn field_suggestions_for(record_type: &str) -> Vec<FieldSuggestion> {
    let named = |name: &str, field_type: &str, confidence: f64| FieldSuggestion {
        name: name.to_string(),
        field_type: field_type.to_string(),
        confidence,
        default_value: None,
    };
    match record_type {
        "event" => vec![
            named("id", "string", 0.9),
            named("timestamp", "long", 0.9),
            named("eventType", "string", 0.8),
            named("source", "string", 0.6),
        ],
        "entity" => vec![
            named("id", "string", 0.9),
            named("createdAt", "long", 0.8),
            named("updatedAt", "long", 0.8),
            named("version", "int", 0.5),
        ],
        _ => vec![named("id", "string", 0.7)],
    }
}

/// Combines provided data, learned history, and templates.
pub struct SmartDefaultsEngine {
    learning: Mutex<LearningEngine>,
}

impl SmartDefaultsEngine {
    pub fn new(storage_dir: &Path) -> Result<Self> {
        Ok(Self {
            learning: Mutex::new(LearningEngine::new(storage_dir)?),
        })
    }

    pub fn with_default_storage() -> Result<Self> {
        Self::new(&LearningEngine::default_storage_dir())
    }

    /// Suggest values for an operation. Precedence: provided data wins,
    /// then confident history, then templates.
    pub fn suggest_defaults(
        &self,
        operation: &str,
        context: Option<&str>,
        existing_data: Option<&HashMap<String, serde_json::Value>>,
    ) -> HashMap<String, SmartDefault> {
        let mut defaults = template_defaults(operation, context);

        {
            let learning = self.learning.lock();
            let context_key = context.unwrap_or("");
            let fields: Vec<String> = learning
                .user_choices
                .keys()
                .filter_map(|key| {
                    let mut parts = key.splitn(3, ':');
                    let (op, ctx, field) = (parts.next()?, parts.next()?, parts.next()?);
                    (op == operation && ctx == context_key).then(|| field.to_string())
                })
                .collect();
            for field in fields {
                if let Some(preference) =
                    learning.get_historical_preference(operation, context_key, &field)
                {
                    if preference.confidence > HISTORY_CONFIDENCE_THRESHOLD {
                        defaults.insert(field, preference);
                    }
                }
            }
        }

        if let Some(existing) = existing_data {
            for (field, value) in existing {
                defaults.insert(
                    field.clone(),
                    SmartDefault {
                        value: value.clone(),
                        confidence: 1.0,
                        source: SuggestionSource::Provided,
                        reasoning: Some("value supplied by caller".to_string()),
                    },
                );
            }
        }

        defaults
    }

    pub fn record_choice(
        &self,
        operation: &str,
        context: Option<&str>,
        field: &str,
        value: serde_json::Value,
        accepted: bool,
    ) {
        self.learning.lock().record_choice(
            operation,
            context.unwrap_or(""),
            field,
            value,
            accepted,
        );
    }

    pub fn historical_preference(
        &self,
        operation: &str,
        context: Option<&str>,
        field: &str,
    ) -> Option<SmartDefault> {
        self.learning
            .lock()
            .get_historical_preference(operation, context.unwrap_or(""), field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_convention_detection() {
        let subjects: Vec<String> = [
            "user-events",
            "order-events",
            "payment-events",
            "inventory-updates",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let patterns = PatternAnalyzer::analyze_naming_convention(&subjects);
        assert_eq!(patterns["hyphenated"].occurrences, 4);
        assert!(patterns["hyphenated"].confidence >= 0.99);
        assert!(patterns["event_suffixed"].confidence >= 0.75);
    }

    #[test]
    fn test_prefix_suffix_detection() {
        let subjects: Vec<String> = [
            "prod-user-service",
            "prod-order-service",
            "prod-payment-service",
            "dev-test-service",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let patterns = PatternAnalyzer::analyze_naming_convention(&subjects);
        assert!(patterns.keys().any(|p| p.starts_with("prefix:prod-")));
        assert!(patterns.keys().any(|p| p.starts_with("suffix:-service")));
    }

    #[test]
    fn test_field_pattern_analysis() {
        let schemas = vec![
            serde_json::json!({"type": "record", "fields": [
                {"name": "id", "type": "string"},
                {"name": "timestamp", "type": "long"},
                {"name": "userId", "type": "string"},
            ]}),
            serde_json::json!({"type": "record", "fields": [
                {"name": "id", "type": "string"},
                {"name": "timestamp", "type": "long"},
                {"name": "amount", "type": "double"},
            ]}),
        ];

        let suggestions = PatternAnalyzer::analyze_field_patterns(&schemas);
        assert_eq!(suggestions["id"].field_type, "string");
        assert_eq!(suggestions["id"].confidence, 1.0);
        assert_eq!(suggestions["timestamp"].field_type, "long");
        assert_eq!(suggestions["userId"].confidence, 0.5);
    }

    #[test]
    fn test_record_and_retrieve_choice() {
        let dir = tempfile::tempdir().unwrap();
        let mut learning = LearningEngine::new(dir.path()).unwrap();

        learning.record_choice("create_schema", "production", "compatibility", "BACKWARD".into(), true);
        learning.record_choice("create_schema", "production", "compatibility", "BACKWARD".into(), true);
        learning.record_choice("create_schema", "production", "compatibility", "FULL".into(), false);

        let preference = learning
            .get_historical_preference("create_schema", "production", "compatibility")
            .unwrap();
        assert_eq!(preference.value, serde_json::json!("BACKWARD"));
        assert!(preference.confidence > 0.5);
        assert_eq!(preference.source, SuggestionSource::History);
    }

    #[test]
    fn test_feedback_score_adjustment() {
        let dir = tempfile::tempdir().unwrap();
        let mut learning = LearningEngine::new(dir.path()).unwrap();

        for _ in 0..5 {
            learning.record_choice("migrate_schema", "dev", "dry_run", true.into(), true);
        }
        let key = "migrate_schema:dev:dry_run";
        assert!(learning.feedback_scores[key] > 0.5);

        for _ in 0..3 {
            learning.record_choice("migrate_schema", "dev", "dry_run", true.into(), false);
        }
        assert!(learning.feedback_scores[key] < 0.5);
    }

    #[test]
    fn test_persistence_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut learning = LearningEngine::new(dir.path()).unwrap();
            learning.record_choice("create_context", "test", "environment", "development".into(), true);
        }

        let reloaded = LearningEngine::new(dir.path()).unwrap();
        let preference = reloaded
            .get_historical_preference("create_context", "test", "environment")
            .unwrap();
        assert_eq!(preference.value, serde_json::json!("development"));
    }

    #[test]
    fn test_corrupt_lines_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("choices.jsonl"), "not json\n{\"broken\": 1}\n").unwrap();
        let learning = LearningEngine::new(dir.path()).unwrap();
        assert!(learning.user_choices.is_empty());
    }

    #[test]
    fn test_template_defaults_by_context() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SmartDefaultsEngine::new(dir.path()).unwrap();

        let prod = engine.suggest_defaults("create_schema", Some("production"), None);
        assert_eq!(prod["compatibility"].value, serde_json::json!("FULL"));
        assert_eq!(prod["schema_type"].value, serde_json::json!("AVRO"));
        assert_eq!(prod["schema_type"].source, SuggestionSource::Template);

        let dev = engine.suggest_defaults("create_schema", Some("development"), None);
        assert_eq!(dev["compatibility"].value, serde_json::json!("NONE"));
    }

    #[test]
    fn test_existing_data_overrides_everything() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SmartDefaultsEngine::new(dir.path()).unwrap();

        let existing: HashMap<String, serde_json::Value> =
            [("compatibility".to_string(), "BACKWARD".into())]
                .into_iter()
                .collect();
        let defaults = engine.suggest_defaults("create_schema", Some("production"), Some(&existing));
        assert_eq!(defaults["compatibility"].value, serde_json::json!("BACKWARD"));
        assert_eq!(defaults["compatibility"].source, SuggestionSource::Provided);
        assert_eq!(defaults["compatibility"].confidence, 1.0);
    }

    #[test]
    fn test_history_beats_template_when_confident() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SmartDefaultsEngine::new(dir.path()).unwrap();

        for _ in 0..5 {
            engine.record_choice(
                "create_schema",
                Some("production"),
                "compatibility",
                "FORWARD".into(),
                true,
            );
        }

        let defaults = engine.suggest_defaults("create_schema", Some("production"), None);
        assert_eq!(defaults["compatibility"].value, serde_json::json!("FORWARD"));
        assert_eq!(defaults["compatibility"].source, SuggestionSource::History);
    }

    #[test]
    fn test_field_suggestions_by_record_type() {
        let event_fields: Vec<String> = field_suggestions_for("event")
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert!(event_fields.contains(&"id".to_string()));
        assert!(event_fields.contains(&"timestamp".to_string()));
        assert!(event_fields.contains(&"eventType".to_string()));

        let entity_fields: Vec<String> = field_suggestions_for("entity")
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert!(entity_fields.contains(&"createdAt".to_string()));
        assert!(entity_fields.contains(&"updatedAt".to_string()));
    }
}
