//! Dispatch-target validation
//!
//! Each declared dispatch target is checked independently:
//! self-references are rejected, the target's compiled artifact must
//! exist in the workflow directory (compiled-lock form preferred over
//! plain form), and the artifact must declare a dispatch-style
//! trigger. Outcomes are collected across all targets and reported as
//! one aggregated error, unless fail-fast mode short-circuits on the
//! first failure.

use crate::error::CompileError;
use serde_yaml::Value;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Terminal state of one declared target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    SelfReference,
    NotFound,
    Uncompiled,
    MissingTrigger,
    Valid,
}

/// Outcome of validating one target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOutcome {
    pub target: String,
    pub state: TargetState,
}

impl TargetOutcome {
    pub fn is_valid(&self) -> bool {
        self.state == TargetState::Valid
    }

    /// User-actionable message with a remediation hint
    pub fn message(&self) -> String {
        match self.state {
            TargetState::SelfReference => format!(
                "'{}' refers to this workflow itself; a workflow cannot dispatch itself",
                self.target
            ),
            TargetState::NotFound => format!(
                "workflow '{}' was not found in the workflow directory",
                self.target
            ),
            TargetState::Uncompiled => format!(
                "workflow '{}' exists but is not compiled; compile it first",
                self.target
            ),
            TargetState::MissingTrigger => format!(
                "workflow '{}' has no workflow_dispatch trigger; add one to its trigger section",
                self.target
            ),
            TargetState::Valid => format!("workflow '{}' is a valid dispatch target", self.target),
        }
    }
}

/// Aggregated invalid outcomes, formatted one per line
#[derive(Debug)]
pub struct DispatchReport {
    pub outcomes: Vec<TargetOutcome>,
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, outcome) in self.outcomes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", outcome.message())?;
        }
        Ok(())
    }
}

/// Validates the dispatch targets of one workflow
pub struct DispatchValidator<'a> {
    workflow_name: &'a str,
    workflows_dir: &'a Path,
    fail_fast: bool,
}

impl<'a> DispatchValidator<'a> {
    pub fn new(workflow_name: &'a str, workflows_dir: &'a Path) -> Self {
        DispatchValidator {
            workflow_name,
            workflows_dir,
            fail_fast: false,
        }
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Validate every declared target. All outcomes are collected
    /// (not short-circuited) unless fail-fast mode is active.
    pub fn validate(&self, targets: &[String]) -> Result<(), CompileError> {
        let mut invalid = Vec::new();
        for target in targets {
            let outcome = self.check_target(target);
            debug!(target = %outcome.target, state = ?outcome.state, "dispatch target checked");
            if !outcome.is_valid() {
                invalid.push(outcome);
                if self.fail_fast {
                    break;
                }
            }
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(CompileError::DispatchValidation(DispatchReport {
                outcomes: invalid,
            }))
        }
    }

    /// Evaluate one target through the state machine
    pub fn check_target(&self, target: &str) -> TargetOutcome {
        let state = self.target_state(target);
        TargetOutcome {
            target: target.to_string(),
            state,
        }
    }

    fn target_state(&self, target: &str) -> TargetState {
        if target == self.workflow_name {
            return TargetState::SelfReference;
        }

        // compiled-lock form takes priority over the plain form
        let artifact = ["lock.yml", "yml"]
            .iter()
            .map(|ext| self.workflows_dir.join(format!("{}.{}", target, ext)))
            .find(|p| p.is_file());

        let Some(artifact) = artifact else {
            let source = self.workflows_dir.join(format!("{}.flow.md", target));
            return if source.is_file() {
                TargetState::Uncompiled
            } else {
                TargetState::NotFound
            };
        };

        let Ok(text) = std::fs::read_to_string(&artifact) else {
            return TargetState::NotFound;
        };
        let Ok(doc) = serde_yaml::from_str::<Value>(&text) else {
            return TargetState::NotFound;
        };

        match trigger_section(&doc) {
            Some(trigger) if has_dispatch_trigger(trigger) => TargetState::Valid,
            _ => TargetState::MissingTrigger,
        }
    }
}

/// The artifact's trigger section. A bare `on` key is resolved as the
/// boolean `true` by YAML 1.1 parsers, so both spellings are accepted.
pub fn trigger_section(doc: &Value) -> Option<&Value> {
    let map = doc.as_mapping()?;
    map.iter()
        .find(|(k, _)| k.as_str() == Some("on") || matches!(k, Value::Bool(true)))
        .map(|(_, v)| v)
}

/// Dispatch-style trigger present, accepting string, list, or map
/// trigger-section shapes.
fn has_dispatch_trigger(trigger: &Value) -> bool {
    match trigger {
        Value::String(s) => s == "workflow_dispatch",
        Value::Sequence(seq) => seq
            .iter()
            .any(|v| v.as_str() == Some("workflow_dispatch")),
        Value::Mapping(map) => map
            .iter()
            .any(|(k, _)| k.as_str() == Some("workflow_dispatch")),
        _ => false,
    }
}
