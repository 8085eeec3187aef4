//! Multi-step elicitation workflows.
//!
//! A workflow is a declared graph of elicitation steps with conditional
//! branching and back-navigation. Steps reference each other by id string;
//! the reference graph is validated at registration. The terminal sentinel
//! is `"finish"`.

pub mod definitions;
pub mod executor;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::elicitation::{
    ElicitationField, ElicitationManager, ElicitationRequest, ElicitationResponse,
    ElicitationType, FieldType,
};
use crate::error::{Result, WardenError};

pub const FINISH_STEP: &str = "finish";
const NAV_FIELD: &str = "_workflow_action";
const NAV_PREFIX: &str = "_workflow_";

/// Where a field's answer sends the workflow next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextStep {
    /// Unconditional target.
    Direct(String),
    /// Target keyed by the field's answer value.
    ValueMap(HashMap<String, String>),
}

impl NextStep {
    fn referenced_steps(&self) -> Vec<&str> {
        match self {
            NextStep::Direct(id) => vec![id.as_str()],
            NextStep::ValueMap(map) => map.values().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Exists,
}

/// A data-driven transition predicate, evaluated against the merged
/// response state. The first condition producing a target wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
    pub next_step_id: String,
}

impl Condition {
    pub fn new(
        field: &str,
        operator: ConditionOperator,
        value: serde_json::Value,
        next_step_id: &str,
    ) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
            next_step_id: next_step_id.to_string(),
        }
    }

    pub fn evaluate(&self, state: &HashMap<String, serde_json::Value>) -> Option<String> {
        let current = state.get(&self.field);
        let matched = match self.operator {
            ConditionOperator::Exists => current.is_some(),
            ConditionOperator::Equals => current == Some(&self.value),
            ConditionOperator::NotEquals => current.is_some() && current != Some(&self.value),
            ConditionOperator::GreaterThan => compare_numeric(current, &self.value, |a, b| a > b),
            ConditionOperator::LessThan => compare_numeric(current, &self.value, |a, b| a < b),
            ConditionOperator::Contains => current
                .map(value_text)
                .map(|text| text.contains(&value_text(&self.value)))
                .unwrap_or(false),
        };
        matched.then(|| self.next_step_id.clone())
    }
}

fn compare_numeric(
    current: Option<&serde_json::Value>,
    expected: &serde_json::Value,
    cmp: fn(f64, f64) -> bool,
) -> bool {
    let parse = |v: &serde_json::Value| v.as_f64().or_else(|| value_text(v).parse().ok());
    match (current.and_then(parse), parse(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keep the documented map shape on the wire; JSON objects retain the
/// declaration order of the underlying list.
fn serialize_next_steps<S>(
    next_steps: &[(String, NextStep)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_map(next_steps.iter().map(|(field, transition)| (field, transition)))
}

/// One step in a workflow definition.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<ElicitationField>,
    pub elicitation_type: ElicitationType,
    /// Field name -> transition, in declaration order: resolution walks
    /// this list and the first entry whose field matched the response
    /// wins. `"default"` is the fallback key.
    #[serde(serialize_with = "serialize_next_steps")]
    pub next_steps: Vec<(String, NextStep)>,
    pub conditions: Vec<Condition>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkflowStep {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            fields: Vec::new(),
            elicitation_type: ElicitationType::Form,
            next_steps: Vec::new(),
            conditions: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn elicitation_type(mut self, kind: ElicitationType) -> Self {
        self.elicitation_type = kind;
        self
    }

    pub fn fields(mut self, fields: Vec<ElicitationField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn next_direct(mut self, field: &str, target: &str) -> Self {
        self.next_steps
            .push((field.to_string(), NextStep::Direct(target.to_string())));
        self
    }

    pub fn next_by_value(mut self, field: &str, mapping: &[(&str, &str)]) -> Self {
        self.next_steps.push((
            field.to_string(),
            NextStep::ValueMap(
                mapping
                    .iter()
                    .map(|(value, target)| (value.to_string(), target.to_string()))
                    .collect(),
            ),
        ));
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Resolve the next step id from a step response plus the merged state.
    ///
    /// Order: conditions first, then field-keyed transitions in declaration
    /// order (first match wins), then `default`.
    pub fn next_step(
        &self,
        response_values: &HashMap<String, serde_json::Value>,
        merged_state: &HashMap<String, serde_json::Value>,
    ) -> Option<String> {
        for condition in &self.conditions {
            if let Some(target) = condition.evaluate(merged_state) {
                return Some(target);
            }
        }

        for (field, transition) in &self.next_steps {
            if field == "default" {
                continue;
            }
            let Some(value) = response_values.get(field) else {
                continue;
            };
            match transition {
                NextStep::Direct(target) => return Some(target.clone()),
                NextStep::ValueMap(map) => {
                    if let Some(target) = map.get(&value_text(value)) {
                        return Some(target.clone());
                    }
                }
            }
        }

        self.next_steps.iter().find_map(|(field, transition)| {
            match (field.as_str(), transition) {
                ("default", NextStep::Direct(target)) => Some(target.clone()),
                _ => None,
            }
        })
    }
}

/// A complete workflow definition. Immutable after registration.
#[derive(Debug, Clone, Serialize)]
pub struct MultiStepWorkflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: HashMap<String, WorkflowStep>,
    pub initial_step_id: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MultiStepWorkflow {
    /// Validate the step reference graph.
    pub fn validate(&self) -> Result<()> {
        if !self.steps.contains_key(&self.initial_step_id) {
            return Err(WardenError::WorkflowStepMissing {
                workflow_id: self.id.clone(),
                step_id: self.initial_step_id.clone(),
            });
        }
        for step in self.steps.values() {
            let referenced = step
                .next_steps
                .iter()
                .flat_map(|(_, transition)| transition.referenced_steps())
                .chain(step.conditions.iter().map(|c| c.next_step_id.as_str()));
            for target in referenced {
                if target != FINISH_STEP && !self.steps.contains_key(target) {
                    return Err(WardenError::WorkflowStepMissing {
                        workflow_id: self.id.clone(),
                        step_id: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get_step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.get(step_id)
    }
}

/// Live state of one workflow instance.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub instance_id: String,
    pub workflow_id: String,
    pub current_step_id: String,
    pub step_history: Vec<String>,
    pub responses: HashMap<String, HashMap<String, serde_json::Value>>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    fn new(workflow_id: &str, initial_step_id: &str) -> Self {
        let now = Utc::now();
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            current_step_id: initial_step_id.to_string(),
            step_history: vec![initial_step_id.to_string()],
            responses: HashMap::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.step_history.len() > 1
    }

    fn go_back(&mut self) -> Option<String> {
        if !self.can_go_back() {
            return None;
        }
        self.step_history.pop();
        let previous = self.step_history.last().cloned()?;
        self.current_step_id = previous.clone();
        self.updated_at = Utc::now();
        Some(previous)
    }

    fn add_response(&mut self, step_id: &str, values: HashMap<String, serde_json::Value>) {
        self.responses.insert(step_id.to_string(), values);
        self.updated_at = Utc::now();
    }

    /// Flatten all step responses. Keys appear both `step.field`-prefixed
    /// and bare; for bare keys the most recent step wins.
    pub fn all_responses(&self) -> HashMap<String, serde_json::Value> {
        let mut merged = HashMap::new();
        for step_id in &self.step_history {
            if let Some(values) = self.responses.get(step_id) {
                for (key, value) in values {
                    merged.insert(format!("{step_id}.{key}"), value.clone());
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        // Responses for steps no longer on the history path still count.
        for (step_id, values) in &self.responses {
            if !self.step_history.contains(step_id) {
                for (key, value) in values {
                    merged.entry(format!("{step_id}.{key}")).or_insert_with(|| value.clone());
                    merged.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        merged
    }
}

/// What a submitted step response produced.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WorkflowAdvance {
    /// The next step's elicitation request.
    NextStep(ElicitationRequest),
    /// The workflow finished.
    Completed(WorkflowCompletion),
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct WorkflowCompletion {
    pub instance_id: String,
    pub workflow_name: String,
    pub completed_at: DateTime<Utc>,
    pub steps_completed: usize,
    pub responses: HashMap<String, serde_json::Value>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub aborted: bool,
}

/// Summary row for `workflowStatus` / `listWorkflows`.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ActiveWorkflowInfo {
    pub instance_id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub current_step: String,
    pub steps_completed: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Drives workflow instances over the elicitation manager.
pub struct WorkflowRuntime {
    elicitation: std::sync::Arc<ElicitationManager>,
    workflows: DashMap<String, std::sync::Arc<MultiStepWorkflow>>,
    active: DashMap<String, WorkflowState>,
    completed: DashMap<String, WorkflowState>,
}

impl WorkflowRuntime {
    pub fn new(elicitation: std::sync::Arc<ElicitationManager>) -> Self {
        Self {
            elicitation,
            workflows: DashMap::new(),
            active: DashMap::new(),
            completed: DashMap::new(),
        }
    }

    /// Create a runtime preloaded with the predefined workflows.
    pub fn with_builtin_workflows(elicitation: std::sync::Arc<ElicitationManager>) -> Result<Self> {
        let runtime = Self::new(elicitation);
        for workflow in definitions::all_workflows() {
            runtime.register(workflow)?;
        }
        Ok(runtime)
    }

    pub fn register(&self, workflow: MultiStepWorkflow) -> Result<()> {
        workflow.validate()?;
        tracing::info!(
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            "registered workflow"
        );
        self.workflows
            .insert(workflow.id.clone(), std::sync::Arc::new(workflow));
        Ok(())
    }

    pub fn list_definitions(&self) -> Vec<std::sync::Arc<MultiStepWorkflow>> {
        let mut defs: Vec<_> = self.workflows.iter().map(|w| w.clone()).collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }

    pub fn get_definition(&self, workflow_id: &str) -> Option<std::sync::Arc<MultiStepWorkflow>> {
        self.workflows.get(workflow_id).map(|w| w.clone())
    }

    /// Start a new instance; returns the first step's elicitation request.
    pub fn start(
        &self,
        workflow_id: &str,
        initial_context: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<ElicitationRequest> {
        let workflow = self
            .get_definition(workflow_id)
            .ok_or_else(|| WardenError::WorkflowUnknown {
                workflow_id: workflow_id.to_string(),
            })?;

        let mut state = WorkflowState::new(&workflow.id, &workflow.initial_step_id);
        state
            .metadata
            .insert("workflow_id".to_string(), workflow.id.clone().into());
        state
            .metadata
            .insert("workflow_name".to_string(), workflow.name.clone().into());
        if let Some(context) = initial_context {
            state.metadata.insert(
                "initial_context".to_string(),
                serde_json::to_value(context).unwrap_or_default(),
            );
        }

        let first_step =
            workflow
                .get_step(&workflow.initial_step_id)
                .ok_or_else(|| WardenError::WorkflowStepMissing {
                    workflow_id: workflow.id.clone(),
                    step_id: workflow.initial_step_id.clone(),
                })?;

        let request = self.issue_step_request(&workflow, first_step, &state);
        self.active.insert(state.instance_id.clone(), state);
        Ok(request)
    }

    fn issue_step_request(
        &self,
        workflow: &MultiStepWorkflow,
        step: &WorkflowStep,
        state: &WorkflowState,
    ) -> ElicitationRequest {
        let mut fields = step.fields.clone();
        if state.can_go_back() {
            fields.push(
                ElicitationField::new(NAV_FIELD, FieldType::Choice)
                    .description("Navigation options")
                    .options(&["continue", "back"])
                    .default_value("continue".into())
                    .optional(),
            );
        }

        let mut request = ElicitationRequest::new(step.elicitation_type, &step.title)
            .fields(fields)
            .context_entry("workflow_instance_id", state.instance_id.clone().into())
            .context_entry("step_id", step.id.clone().into())
            .context_entry("step_number", state.step_history.len().into())
            .context_entry("total_steps_estimate", workflow.steps.len().into());
        if let Some(description) = &step.description {
            request = request.description(description);
        }
        for (key, value) in &step.metadata {
            request = request.context_entry(key, value.clone());
        }

        self.elicitation.create(request.clone());
        request
    }

    /// Instance id a pending request belongs to, if any.
    pub fn instance_for_request(&self, request_id: &str) -> Option<String> {
        self.elicitation
            .get_request(request_id)?
            .context
            .get("workflow_instance_id")?
            .as_str()
            .map(str::to_string)
    }

    /// Feed one step response into its workflow instance.
    pub fn handle_response(&self, response: ElicitationResponse) -> Result<WorkflowAdvance> {
        let request = self
            .elicitation
            .get_request(&response.request_id)
            .ok_or_else(|| WardenError::ElicitationExpired {
                request_id: response.request_id.clone(),
            })?;
        let instance_id = request
            .context
            .get("workflow_instance_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WardenError::ElicitationInvalid {
                request_id: response.request_id.clone(),
                message: "response is not associated with a workflow".to_string(),
            })?
            .to_string();

        let workflow = {
            let state = self
                .active
                .get(&instance_id)
                .ok_or_else(|| WardenError::WorkflowUnknown {
                    workflow_id: instance_id.clone(),
                })?;
            self.get_definition(&state.workflow_id)
                .ok_or_else(|| WardenError::WorkflowUnknown {
                    workflow_id: state.workflow_id.clone(),
                })?
        };

        // Back-navigation bypasses validation and response storage.
        let wants_back = response
            .values
            .get(NAV_FIELD)
            .map(|v| value_text(v) == "back")
            .unwrap_or(false);
        if wants_back {
            let mut state = self.active.get_mut(&instance_id).ok_or_else(|| {
                WardenError::WorkflowUnknown {
                    workflow_id: instance_id.clone(),
                }
            })?;
            // Valid only with history behind us; otherwise fall through and
            // treat this as a plain response so the step is not swallowed.
            if let Some(previous_id) = state.go_back() {
                let step = workflow.get_step(&previous_id).ok_or_else(|| {
                    WardenError::WorkflowStepMissing {
                        workflow_id: workflow.id.clone(),
                        step_id: previous_id.clone(),
                    }
                })?;
                self.elicitation.cancel(&response.request_id);
                let request = self.issue_step_request(&workflow, step, &state);
                return Ok(WorkflowAdvance::NextStep(request));
            }
        }

        // Enforce single-response + validation through the elicitation table.
        self.elicitation.submit(response.clone())?;

        let step_values: HashMap<String, serde_json::Value> = response
            .values
            .iter()
            .filter(|(key, _)| !key.starts_with(NAV_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let next_step_id = {
            let mut state = self.active.get_mut(&instance_id).ok_or_else(|| {
                WardenError::WorkflowUnknown {
                    workflow_id: instance_id.clone(),
                }
            })?;
            let current_step_id = state.current_step_id.clone();
            let current_step = workflow.get_step(&current_step_id).ok_or_else(|| {
                WardenError::WorkflowStepMissing {
                    workflow_id: workflow.id.clone(),
                    step_id: current_step_id.clone(),
                }
            })?;
            state.add_response(&current_step_id, step_values.clone());
            let merged = state.all_responses();
            current_step.next_step(&step_values, &merged)
        };

        let Some(next_step_id) = next_step_id.filter(|id| id != FINISH_STEP) else {
            return Ok(WorkflowAdvance::Completed(self.complete(&instance_id, false)?));
        };

        let step = workflow
            .get_step(&next_step_id)
            .ok_or_else(|| WardenError::WorkflowStepMissing {
                workflow_id: workflow.id.clone(),
                step_id: next_step_id.clone(),
            })?;

        let request = {
            let mut state = self.active.get_mut(&instance_id).ok_or_else(|| {
                WardenError::WorkflowUnknown {
                    workflow_id: instance_id.clone(),
                }
            })?;
            state.current_step_id = next_step_id.clone();
            state.step_history.push(next_step_id);
            state.updated_at = Utc::now();
            self.issue_step_request(&workflow, step, &state)
        };

        Ok(WorkflowAdvance::NextStep(request))
    }

    fn complete(&self, instance_id: &str, aborted: bool) -> Result<WorkflowCompletion> {
        let (_, mut state) =
            self.active
                .remove(instance_id)
                .ok_or_else(|| WardenError::WorkflowUnknown {
                    workflow_id: instance_id.to_string(),
                })?;
        if aborted {
            state.metadata.insert("aborted".to_string(), true.into());
            state
                .metadata
                .insert("aborted_at".to_string(), Utc::now().to_rfc3339().into());
        }

        let completion = WorkflowCompletion {
            instance_id: state.instance_id.clone(),
            workflow_name: state
                .metadata
                .get("workflow_name")
                .and_then(|v| v.as_str())
                .unwrap_or(&state.workflow_id)
                .to_string(),
            completed_at: Utc::now(),
            steps_completed: state.step_history.len(),
            responses: state.all_responses(),
            metadata: state.metadata.clone(),
            aborted,
        };
        self.completed.insert(state.instance_id.clone(), state);
        Ok(completion)
    }

    pub fn abort(&self, instance_id: &str) -> Result<WorkflowCompletion> {
        self.complete(instance_id, true)
    }

    pub fn get_state(&self, instance_id: &str) -> Option<WorkflowState> {
        self.active
            .get(instance_id)
            .map(|s| s.clone())
            .or_else(|| self.completed.get(instance_id).map(|s| s.clone()))
    }

    pub fn active_workflows(&self) -> Vec<ActiveWorkflowInfo> {
        let mut infos: Vec<ActiveWorkflowInfo> = self
            .active
            .iter()
            .map(|state| ActiveWorkflowInfo {
                instance_id: state.instance_id.clone(),
                workflow_id: state.workflow_id.clone(),
                workflow_name: state
                    .metadata
                    .get("workflow_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&state.workflow_id)
                    .to_string(),
                current_step: state.current_step_id.clone(),
                steps_completed: state.step_history.len() - 1,
                created_at: state.created_at,
                updated_at: state.updated_at,
            })
            .collect();
        infos.sort_by_key(|i| i.created_at);
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn two_branch_workflow() -> MultiStepWorkflow {
        let mut steps = HashMap::new();
        steps.insert(
            "pick".to_string(),
            WorkflowStep::new("pick", "Pick a path")
                .fields(vec![ElicitationField::new("path", FieldType::Choice)
                    .options(&["left", "right"])])
                .next_by_value("path", &[("left", "left_step"), ("right", "right_step")]),
        );
        steps.insert(
            "left_step".to_string(),
            WorkflowStep::new("left_step", "Left")
                .fields(vec![ElicitationField::new("note", FieldType::Text).optional()])
                .next_direct("default", FINISH_STEP),
        );
        steps.insert(
            "right_step".to_string(),
            WorkflowStep::new("right_step", "Right")
                .fields(vec![ElicitationField::new("note", FieldType::Text).optional()])
                .next_direct("default", FINISH_STEP),
        );
        MultiStepWorkflow {
            id: "branching".to_string(),
            name: "Branching".to_string(),
            description: String::new(),
            steps,
            initial_step_id: "pick".to_string(),
            metadata: HashMap::new(),
        }
    }

    fn runtime() -> WorkflowRuntime {
        WorkflowRuntime::new(Arc::new(ElicitationManager::new()))
    }

    fn answer(request_id: &str, values: &[(&str, &str)]) -> ElicitationResponse {
        ElicitationResponse::new(
            request_id,
            values
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
                .collect(),
        )
    }

    #[test]
    fn test_registration_rejects_dangling_reference() {
        let mut workflow = two_branch_workflow();
        workflow
            .steps
            .get_mut("pick")
            .unwrap()
            .next_steps
            .push(("oops".to_string(), NextStep::Direct("ghost".to_string())));
        let rt = runtime();
        assert!(matches!(
            rt.register(workflow),
            Err(WardenError::WorkflowStepMissing { .. })
        ));
    }

    #[test]
    fn test_registration_rejects_missing_initial_step() {
        let mut workflow = two_branch_workflow();
        workflow.initial_step_id = "nowhere".to_string();
        assert!(runtime().register(workflow).is_err());
    }

    #[tokio::test]
    async fn test_value_keyed_branching() {
        let rt = runtime();
        rt.register(two_branch_workflow()).unwrap();

        let first = rt.start("branching", None).unwrap();
        assert_eq!(first.context["step_id"], "pick");
        // First step has no back option.
        assert!(first.fields.iter().all(|f| f.name != NAV_FIELD));

        let advance = rt.handle_response(answer(&first.id, &[("path", "right")])).unwrap();
        let WorkflowAdvance::NextStep(second) = advance else {
            panic!("expected next step");
        };
        assert_eq!(second.context["step_id"], "right_step");
        // Second step can go back, so the nav field is injected.
        assert!(second.fields.iter().any(|f| f.name == NAV_FIELD));

        let advance = rt.handle_response(answer(&second.id, &[("note", "done")])).unwrap();
        let WorkflowAdvance::Completed(done) = advance else {
            panic!("expected completion");
        };
        assert_eq!(done.steps_completed, 2);
        assert_eq!(done.responses["path"], "right");
        assert_eq!(done.responses["right_step.note"], "done");
        assert!(!done.aborted);
    }

    #[tokio::test]
    async fn test_back_navigation_restores_previous_step() {
        let rt = runtime();
        rt.register(two_branch_workflow()).unwrap();

        let first = rt.start("branching", None).unwrap();
        let instance_id = first.context["workflow_instance_id"]
            .as_str()
            .unwrap()
            .to_string();
        let WorkflowAdvance::NextStep(second) =
            rt.handle_response(answer(&first.id, &[("path", "left")])).unwrap()
        else {
            panic!("expected next step");
        };

        let history_before = rt.get_state(&instance_id).unwrap().step_history.len();
        let WorkflowAdvance::NextStep(again) = rt
            .handle_response(answer(&second.id, &[(NAV_FIELD, "back")]))
            .unwrap()
        else {
            panic!("expected reissued step");
        };
        assert_eq!(again.context["step_id"], "pick");

        let state = rt.get_state(&instance_id).unwrap();
        assert_eq!(state.step_history.len(), history_before - 1);
        assert_eq!(state.current_step_id, "pick");
        assert_eq!(*state.step_history.last().unwrap(), state.current_step_id);
    }

    #[test]
    fn test_first_declared_transition_wins_with_multiple_keyed_fields() {
        // One step routes on two independent fields; a response answering
        // both must follow the transition declared first.
        let step = WorkflowStep::new("pick", "Pick")
            .fields(vec![
                ElicitationField::new("mode", FieldType::Choice).options(&["fast", "slow"]),
                ElicitationField::new("scope", FieldType::Choice).options(&["one", "all"]),
            ])
            .next_by_value("mode", &[("fast", "left_step")])
            .next_direct("scope", "right_step");

        let both: HashMap<String, serde_json::Value> = [
            ("mode".to_string(), serde_json::Value::from("fast")),
            ("scope".to_string(), serde_json::Value::from("all")),
        ]
        .into_iter()
        .collect();
        assert_eq!(step.next_step(&both, &both).as_deref(), Some("left_step"));

        // When the first-declared entry has no match for the answer, the
        // next declared entry is consulted.
        let miss: HashMap<String, serde_json::Value> = [
            ("mode".to_string(), serde_json::Value::from("slow")),
            ("scope".to_string(), serde_json::Value::from("all")),
        ]
        .into_iter()
        .collect();
        assert_eq!(step.next_step(&miss, &miss).as_deref(), Some("right_step"));
    }

    #[tokio::test]
    async fn test_conditions_win_over_next_steps() {
        let mut workflow = two_branch_workflow();
        workflow.steps.get_mut("pick").unwrap().conditions.push(Condition::new(
            "path",
            ConditionOperator::Equals,
            "left".into(),
            "right_step",
        ));
        let rt = runtime();
        rt.register(workflow).unwrap();

        let first = rt.start("branching", None).unwrap();
        // Condition redirects "left" to right_step despite the value map.
        let WorkflowAdvance::NextStep(next) =
            rt.handle_response(answer(&first.id, &[("path", "left")])).unwrap()
        else {
            panic!("expected next step");
        };
        assert_eq!(next.context["step_id"], "right_step");
    }

    #[tokio::test]
    async fn test_abort_moves_instance_to_completed() {
        let rt = runtime();
        rt.register(two_branch_workflow()).unwrap();
        let first = rt.start("branching", None).unwrap();
        let instance_id = first.context["workflow_instance_id"]
            .as_str()
            .unwrap()
            .to_string();

        let completion = rt.abort(&instance_id).unwrap();
        assert!(completion.aborted);
        assert!(rt.active_workflows().is_empty());
        assert!(rt.get_state(&instance_id).is_some());
        // Double abort fails: the instance is no longer active.
        assert!(rt.abort(&instance_id).is_err());
    }

    #[tokio::test]
    async fn test_parallel_instances_are_isolated() {
        let rt = runtime();
        rt.register(two_branch_workflow()).unwrap();

        let a = rt.start("branching", None).unwrap();
        let b = rt.start("branching", None).unwrap();
        assert_ne!(
            a.context["workflow_instance_id"],
            b.context["workflow_instance_id"]
        );

        rt.handle_response(answer(&a.id, &[("path", "left")])).unwrap();
        let state_b = rt
            .get_state(b.context["workflow_instance_id"].as_str().unwrap())
            .unwrap();
        assert_eq!(state_b.current_step_id, "pick");
        assert_eq!(rt.active_workflows().len(), 2);
    }

    #[tokio::test]
    async fn test_nav_keys_stripped_from_stored_responses() {
        let rt = runtime();
        rt.register(two_branch_workflow()).unwrap();
        let first = rt.start("branching", None).unwrap();
        let instance_id = first.context["workflow_instance_id"]
            .as_str()
            .unwrap()
            .to_string();

        rt.handle_response(answer(
            &first.id,
            &[("path", "left"), (NAV_FIELD, "continue")],
        ))
        .unwrap();

        let state = rt.get_state(&instance_id).unwrap();
        let stored = &state.responses["pick"];
        assert!(stored.contains_key("path"));
        assert!(!stored.contains_key(NAV_FIELD));
    }
}
