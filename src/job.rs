//! Generated job and step structures
//!
//! These are the terminal output types of the compiler: serialized into
//! the emitted workflow document and never mutated afterwards.

use crate::permissions::Permissions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every generated capability job gets the same hard timeout.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 10;

/// Default execution pool when the workflow does not override it.
pub const DEFAULT_RUNS_ON: &str = "ubuntu-latest";

/// Execution pool - handles string OR array form
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RunsOn {
    Single(String),
    Multiple(Vec<String>),
}

impl Default for RunsOn {
    fn default() -> Self {
        RunsOn::Single(DEFAULT_RUNS_ON.to_string())
    }
}

/// One step of a generated job. Deserialize support exists so
/// user-declared custom-job steps can be carried into the output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_cond: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(
        rename = "continue-on-error",
        skip_serializing_if = "Option::is_none"
    )]
    pub continue_on_error: Option<bool>,
}

impl Step {
    /// Step invoking a packaged action
    pub fn uses(name: impl Into<String>, action: impl Into<String>) -> Self {
        Step {
            name: Some(name.into()),
            uses: Some(action.into()),
            ..Default::default()
        }
    }

    /// Step running a shell script
    pub fn run(name: impl Into<String>, script: impl Into<String>) -> Self {
        Step {
            name: Some(name.into()),
            run: Some(script.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn when(mut self, cond: impl Into<String>) -> Self {
        self.if_cond = Some(cond.into());
        self
    }
}

/// One unit of execution in the generated automation graph
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Job {
    /// Job key in the output document (not serialized inside the body)
    #[serde(skip)]
    pub name: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,

    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_cond: Option<String>,

    #[serde(rename = "runs-on")]
    pub runs_on: RunsOn,

    #[serde(skip_serializing_if = "Permissions::is_empty")]
    pub permissions: Permissions,

    #[serde(rename = "timeout-minutes")]
    pub timeout_minutes: u32,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    pub steps: Vec<Step>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Job {
            name: name.into(),
            needs: Vec::new(),
            if_cond: None,
            runs_on: RunsOn::default(),
            permissions: Permissions::empty(),
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            outputs: BTreeMap::new(),
            env: BTreeMap::new(),
            steps: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Level, Scope};

    #[test]
    fn test_step_serialization_skips_empty() {
        let step = Step::run("Report", "echo done");
        let yaml = serde_yaml::to_string(&step).unwrap();
        assert!(yaml.contains("name: Report"));
        assert!(yaml.contains("run: echo done"));
        assert!(!yaml.contains("with:"));
        assert!(!yaml.contains("env:"));
    }

    #[test]
    fn test_step_if_renders_as_if() {
        let step = Step::run("Cleanup", "echo bye").when("always()");
        let yaml = serde_yaml::to_string(&step).unwrap();
        assert!(yaml.contains("if: always()"));
        assert!(!yaml.contains("if_cond"));
    }

    #[test]
    fn test_job_serialization() {
        let mut job = Job::new("create_issue");
        job.needs.push("agent".to_string());
        job.if_cond = Some("always()".to_string());
        job.permissions = Permissions::of([
            (Scope::Contents, Level::Read),
            (Scope::Issues, Level::Write),
        ]);
        job.steps.push(Step::run("Create issue", "echo create"));

        let yaml = serde_yaml::to_string(&job).unwrap();
        assert!(yaml.contains("runs-on: ubuntu-latest"));
        assert!(yaml.contains("timeout-minutes: 10"));
        assert!(yaml.contains("needs:\n- agent"));
        assert!(yaml.contains("issues: write"));
        // the job key itself is not part of the body
        assert!(!yaml.contains("create_issue"));
    }

    #[test]
    fn test_runs_on_forms() {
        let single: RunsOn = serde_yaml::from_str("ubuntu-latest").unwrap();
        assert_eq!(single, RunsOn::Single("ubuntu-latest".to_string()));

        let multi: RunsOn = serde_yaml::from_str("[self-hosted, linux]").unwrap();
        assert_eq!(
            multi,
            RunsOn::Multiple(vec!["self-hosted".to_string(), "linux".to_string()])
        );
    }
}
