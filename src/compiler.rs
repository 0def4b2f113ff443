//! Single-pass compilation pipeline
//!
//! One compilation of one workflow document is a pure, synchronous
//! transformation: frontmatter → merged safe-outputs configuration →
//! permissions → job graph → tool catalog → output document. A
//! compile either completes or returns an error; it never emits a
//! partial job graph.

use crate::error::CompileError;
use crate::frontmatter::{self, Document};
use crate::job::{Job, Step};
use crate::safe_outputs::dispatch::DispatchValidator;
use crate::safe_outputs::jobs::{detection_job, JobGraphBuilder};
use crate::safe_outputs::merge::merge_safe_outputs;
use crate::safe_outputs::tools::{generate_tools, to_catalog_json, ToolDefinition};
use crate::safe_outputs::SafeOutputsConfig;
use crate::workflow_data::{WorkflowData, HOSTING_JOB};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Stop dispatch-target validation at the first failure
    pub fail_fast: bool,
    /// Override the directory scanned for sibling workflows
    pub workflows_dir: Option<PathBuf>,
}

/// Result of one compilation
#[derive(Debug)]
pub struct CompiledWorkflow {
    pub data: WorkflowData,
    pub safe_outputs: Option<SafeOutputsConfig>,
    /// Hosting job first, then detection, then one job per enabled
    /// capability and custom job
    pub jobs: Vec<Job>,
    pub tools: Vec<ToolDefinition>,
    /// Trigger section carried verbatim from the frontmatter
    trigger: Value,
}

pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<CompiledWorkflow, CompileError> {
    let doc = frontmatter::load_document(path)?;
    compile_document(&doc, options)
}

pub fn compile_document(
    doc: &Document,
    options: &CompileOptions,
) -> Result<CompiledWorkflow, CompileError> {
    let mut data = WorkflowData::from_document(doc);
    if let Some(dir) = &options.workflows_dir {
        data.workflows_dir = dir.clone();
    }
    info!(workflow = %data.name, "compiling workflow");

    // main configuration plus inherited fragments, in inheritance order
    let main = doc
        .config()
        .value("safe-outputs")
        .map(SafeOutputsConfig::parse);
    let inherited = frontmatter::resolve_inherited(doc)?;
    let fragments: Vec<SafeOutputsConfig> = inherited
        .iter()
        .filter_map(|d| d.config().value("safe-outputs"))
        .map(SafeOutputsConfig::parse)
        .collect();

    let mut safe_outputs = merge_safe_outputs(main, &fragments);
    if let Some(config) = &mut safe_outputs {
        config.apply_threat_detection_default();
    }

    // dispatch targets are validated before any job is emitted
    if let Some(config) = &safe_outputs {
        if let Some(dispatch) = &config.dispatch_workflow {
            DispatchValidator::new(&data.name, &data.workflows_dir)
                .fail_fast(options.fail_fast)
                .validate(&dispatch.workflows)?;
        }
    }

    let tools = match &safe_outputs {
        Some(config) => generate_tools(config, &data.workflows_dir),
        None => Vec::new(),
    };

    let mut jobs = vec![hosting_job(doc, &data, &tools)];
    if let Some(config) = &safe_outputs {
        if let Some(detection) = detection_job(&data, config, HOSTING_JOB) {
            jobs.push(detection);
        }
        let builder = JobGraphBuilder::new(&data, Some(config));
        jobs.extend(builder.build_enabled()?);
    }
    info!(workflow = %data.name, jobs = jobs.len(), tools = tools.len(), "compiled");

    Ok(CompiledWorkflow {
        data,
        safe_outputs,
        jobs,
        tools,
        trigger: trigger_from_frontmatter(doc),
    })
}

/// The hosting job runs the agent itself: checkout, then the engine
/// execution step with the tool catalog in its environment.
fn hosting_job(doc: &Document, data: &WorkflowData, tools: &[ToolDefinition]) -> Job {
    let mut job = Job::new(HOSTING_JOB);
    job.runs_on = data.runs_on.clone();
    job.permissions = data.permissions.clone();
    if let Some(timeout) = doc.config().uint("timeout-minutes") {
        if let Ok(timeout) = u32::try_from(timeout) {
            job.timeout_minutes = timeout;
        }
    }

    job.steps.push(Step::uses("Checkout", "actions/checkout@v5"));

    let mut agent = Step::uses("Execute Agent", "flowforge-actions/agent-runner@v1")
        .with_id(HOSTING_JOB)
        .with_input("engine", &data.engine)
        .with_input("prompt", doc.markdown.trim());
    if !tools.is_empty() {
        agent = agent.with_env("FLOWFORGE_TOOLS", to_catalog_json(tools));
    }
    job.steps.push(agent);

    job.outputs.insert(
        "output".to_string(),
        format!("${{{{ steps.{}.outputs.output }}}}", HOSTING_JOB),
    );
    job.outputs.insert(
        "output_types".to_string(),
        format!("${{{{ steps.{}.outputs.output_types }}}}", HOSTING_JOB),
    );
    job
}

/// The `on:` value from the frontmatter (a YAML 1.1 parser may have
/// resolved the bare key as boolean true); a plain dispatch trigger
/// when the frontmatter declares none.
fn trigger_from_frontmatter(doc: &Document) -> Value {
    doc.frontmatter
        .iter()
        .find(|(k, _)| k.as_str() == Some("on") || matches!(k, Value::Bool(true)))
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| {
            let mut dispatch = Mapping::new();
            dispatch.insert(
                Value::String("workflow_dispatch".to_string()),
                Value::Null,
            );
            Value::Mapping(dispatch)
        })
}

impl CompiledWorkflow {
    /// Serialize into the output workflow document
    pub fn to_yaml(&self) -> Result<String, CompileError> {
        let mut doc = Mapping::new();
        doc.insert(
            Value::String("name".to_string()),
            Value::String(self.data.name.clone()),
        );
        doc.insert(Value::String("on".to_string()), self.trigger.clone());

        let mut jobs = Mapping::new();
        for job in &self.jobs {
            jobs.insert(
                Value::String(job.name.clone()),
                serde_yaml::to_value(job)?,
            );
        }
        doc.insert(Value::String("jobs".to_string()), Value::Mapping(jobs));

        let rendered = serde_yaml::to_string(&Value::Mapping(doc))?;
        Ok(format!(
            "# Generated by flowforge. Do not edit directly.\n{}",
            rendered
        ))
    }

    /// Tool catalog in its JSON wire form
    pub fn tool_catalog_json(&self) -> String {
        to_catalog_json(&self.tools)
    }
}

/// Conventional output path: the source stem with a `.lock.yml` suffix
pub fn lock_path(source: &Path) -> PathBuf {
    let name = crate::workflow_data::derive_name(&source.display().to_string());
    source.with_file_name(format!("{}.lock.yml", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe_outputs::CapabilityKind;
    use std::fs;
    use tempfile::TempDir;

    fn write_workflow(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_compile_minimal_workflow() {
        let dir = TempDir::new().unwrap();
        let path = write_workflow(
            dir.path(),
            "triage.flow.md",
            "---\nname: triage\nsafe-outputs:\n  create-issue:\n---\n# Triage\n",
        );
        let compiled = compile_file(&path, &CompileOptions::default()).unwrap();

        assert_eq!(compiled.data.name, "triage");
        let names: Vec<&str> = compiled.jobs.iter().map(|j| j.name.as_str()).collect();
        // hosting job, auto-populated detection, capability jobs
        assert_eq!(
            names,
            vec!["agent", "detection", "create_issue", "missing_tool"]
        );
    }

    #[test]
    fn test_compile_without_safe_outputs() {
        let dir = TempDir::new().unwrap();
        let path = write_workflow(dir.path(), "plain.flow.md", "---\nname: plain\n---\nbody\n");
        let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
        assert!(compiled.safe_outputs.is_none());
        assert_eq!(compiled.jobs.len(), 1);
        assert!(compiled.tools.is_empty());
    }

    #[test]
    fn test_imports_fill_gaps() {
        let dir = TempDir::new().unwrap();
        write_workflow(
            dir.path(),
            "shared.flow.md",
            "---\nsafe-outputs:\n  add-comment:\n    max: 7\n---\n",
        );
        let path = write_workflow(
            dir.path(),
            "main.flow.md",
            "---\nname: main\nimports: [shared.flow.md]\nsafe-outputs:\n  create-issue:\n---\nbody\n",
        );
        let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
        let config = compiled.safe_outputs.unwrap();
        assert!(config.is_enabled(CapabilityKind::CreateIssue));
        assert_eq!(config.add_comment.unwrap().max, 7);
    }

    #[test]
    fn test_dispatch_validation_aborts_compile() {
        let dir = TempDir::new().unwrap();
        let path = write_workflow(
            dir.path(),
            "main.flow.md",
            "---\nname: main\nsafe-outputs:\n  dispatch-workflow:\n    workflows: [ghost]\n---\nbody\n",
        );
        let err = compile_file(&path, &CompileOptions::default()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_emitted_document_shape() {
        let dir = TempDir::new().unwrap();
        let path = write_workflow(
            dir.path(),
            "triage.flow.md",
            "---\nname: triage\non:\n  issues:\n    types: [opened]\nsafe-outputs:\n  create-issue:\n  missing-tool: false\n  threat-detection: false\n---\n# Body\n",
        );
        let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
        let yaml = compiled.to_yaml().unwrap();

        assert!(yaml.starts_with("# Generated by flowforge"));
        assert!(yaml.contains("name: triage"));
        assert!(yaml.contains("issues:"));
        assert!(yaml.contains("create_issue:"));
        assert!(yaml.contains("timeout-minutes: 10"));

        // round-trips as YAML with the expected job set
        let parsed: Value = serde_yaml::from_str(&yaml).unwrap();
        let jobs = parsed.get("jobs").unwrap().as_mapping().unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_default_trigger_is_dispatch() {
        let dir = TempDir::new().unwrap();
        let path = write_workflow(dir.path(), "x.flow.md", "---\nname: x\n---\nbody\n");
        let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
        let yaml = compiled.to_yaml().unwrap();
        assert!(yaml.contains("workflow_dispatch"));
    }

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("flows/My Triage.flow.md")),
            Path::new("flows/my-triage.lock.yml")
        );
    }

    #[test]
    fn test_tool_catalog_embedded_in_host_env() {
        let dir = TempDir::new().unwrap();
        let path = write_workflow(
            dir.path(),
            "triage.flow.md",
            "---\nname: triage\nsafe-outputs:\n  create-issue:\n---\nbody\n",
        );
        let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
        let host = &compiled.jobs[0];
        let agent_step = host
            .steps
            .iter()
            .find(|s| s.id.as_deref() == Some("agent"))
            .unwrap();
        let catalog = agent_step.env.get("FLOWFORGE_TOOLS").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(catalog).unwrap();
        assert!(parsed.as_array().unwrap().iter().any(|t| t["name"] == "create-issue"));
    }
}
