//! Job graph builder
//!
//! Assembles one execution job per enabled capability: optional
//! credential-mint step, declared pre-steps, the capability's
//! execution step (inline script or a registered packaged action),
//! declared post-steps, and the credential-revoke step when minting
//! was used. Jobs default to depending on the hosting job and to a
//! condition of "this capability was requested".

use super::app_token;
use super::permission_calc::min_permissions;
use super::registry::CapabilityKind;
use super::SafeOutputsConfig;
use crate::error::CompileError;
use crate::job::{Job, Step};
use crate::permissions::{Level, Permissions, Scope};
use crate::workflow_data::WorkflowData;
use std::collections::BTreeMap;
use tracing::debug;

/// Default token expression when nothing overrides it
pub const DEFAULT_TOKEN_EXPR: &str = "${{ secrets.GITHUB_TOKEN }}";

/// Execution step of a capability job
#[derive(Debug, Clone)]
pub struct MainStep {
    pub name: String,
    pub id: String,
    /// Inline script body; replaced by a packaged action reference
    /// when one is registered for the capability
    pub script: String,
}

/// Everything the builder needs to assemble one job
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub main: Option<MainStep>,
    pub env: BTreeMap<String, String>,
    pub permissions: Permissions,
    pub outputs: BTreeMap<String, String>,
    /// Custom condition; the capability's default when unset
    pub condition: Option<String>,
    /// Custom dependency list; `[hosting job]` when unset
    pub needs: Option<Vec<String>>,
    pub pre_steps: Vec<Step>,
    pub post_steps: Vec<Step>,
    /// Per-capability token override
    pub token: Option<String>,
    /// Kind this spec was derived from; None for custom jobs
    pub kind: Option<CapabilityKind>,
}

impl JobSpec {
    fn new(name: impl Into<String>) -> Self {
        JobSpec {
            name: name.into(),
            main: None,
            env: BTreeMap::new(),
            permissions: Permissions::empty(),
            outputs: BTreeMap::new(),
            condition: None,
            needs: None,
            pre_steps: Vec::new(),
            post_steps: Vec::new(),
            token: None,
            kind: None,
        }
    }
}

/// Builds the per-capability job graph for one compiled workflow
pub struct JobGraphBuilder<'a> {
    workflow: &'a WorkflowData,
    config: Option<&'a SafeOutputsConfig>,
    hosting_job: String,
    /// Capability id → packaged action reference; when present the
    /// inline script is substituted by the action (same inputs,
    /// different invocation shape)
    external_actions: BTreeMap<String, String>,
}

impl<'a> JobGraphBuilder<'a> {
    pub fn new(workflow: &'a WorkflowData, config: Option<&'a SafeOutputsConfig>) -> Self {
        JobGraphBuilder {
            workflow,
            config,
            hosting_job: crate::workflow_data::HOSTING_JOB.to_string(),
            external_actions: BTreeMap::new(),
        }
    }

    pub fn hosting_job(mut self, name: impl Into<String>) -> Self {
        self.hosting_job = name.into();
        self
    }

    pub fn register_action(mut self, capability: impl Into<String>, action: impl Into<String>) -> Self {
        self.external_actions.insert(capability.into(), action.into());
        self
    }

    fn config(&self, job: &str) -> Result<&'a SafeOutputsConfig, CompileError> {
        self.config.ok_or_else(|| CompileError::MissingSafeOutputs {
            job: job.to_string(),
        })
    }

    /// One job per enabled capability kind, then one per user-defined
    /// custom job, in deterministic order.
    pub fn build_enabled(&self) -> Result<Vec<Job>, CompileError> {
        let config = self.config("safe-outputs")?;
        let mut out = Vec::new();
        for kind in config.enabled_kinds() {
            out.push(self.build_capability_job(kind)?);
        }
        for name in config.jobs.keys() {
            let job = self.build_custom_job(name)?;
            // a custom job shadowing a capability job name is dropped
            if out.iter().any(|existing: &Job| existing.name == job.name) {
                debug!(job = %job.name, "custom job shadows a capability job; skipped");
                continue;
            }
            out.push(job);
        }
        Ok(out)
    }

    /// Build the job for one capability kind. Fails only when the
    /// kind's sub-config is absent (a caller ordering bug).
    pub fn build_capability_job(&self, kind: CapabilityKind) -> Result<Job, CompileError> {
        let config = self.config(&kind.job_name())?;
        if !config.is_enabled(kind) {
            return Err(CompileError::MissingCapability {
                kind: kind.id().to_string(),
            });
        }
        let spec = self.capability_spec(kind, config)?;
        self.build_job(spec)
    }

    /// Build a user-defined custom job from its declared step list
    pub fn build_custom_job(&self, name: &str) -> Result<Job, CompileError> {
        let config = self.config(name)?;
        let job_config = config.jobs.get(name).ok_or_else(|| {
            CompileError::MissingCapability {
                kind: name.to_string(),
            }
        })?;

        let mut spec = JobSpec::new(sanitize_job_name(name));
        spec.condition = Some(format!(
            "contains(needs.{}.outputs.output_types, '{}')",
            self.hosting_job, name
        ));
        spec.token = job_config.github_token.clone();
        spec.pre_steps = job_config
            .steps
            .iter()
            .filter_map(|v| serde_yaml::from_value(v.clone()).ok())
            .collect();
        self.build_job(spec)
    }

    /// Generic assembly: mint, pre-steps, execution step, post-steps,
    /// revoke. Never fails on missing optional fields.
    pub fn build_job(&self, spec: JobSpec) -> Result<Job, CompileError> {
        let config = self.config(&spec.name)?;
        debug!(job = %spec.name, "assembling safe-output job");

        let mut job = Job::new(spec.name.clone());
        job.runs_on = config
            .runs_on
            .clone()
            .unwrap_or_else(|| self.workflow.runs_on.clone());
        job.needs = spec
            .needs
            .clone()
            .unwrap_or_else(|| vec![self.hosting_job.clone()]);
        job.if_cond = spec.condition.clone().or_else(|| {
            spec.kind
                .map(|kind| kind.default_condition(&self.hosting_job))
        });
        job.permissions = spec.permissions.clone();
        job.outputs = spec.outputs.clone();

        let minting = config.app.as_ref().filter(|app| app.is_valid());

        // (1) mint step scoped to this job's own permission set
        if let Some(app) = minting {
            job.steps.push(app_token::mint_step(app, &spec.permissions));
        }

        // (2) declared pre-steps
        job.steps.extend(spec.pre_steps.iter().cloned());

        // (3) the capability's execution step
        if let Some(main) = &spec.main {
            let token = self.resolve_token(config, &spec, minting.is_some());
            let mut step = match spec
                .kind
                .and_then(|kind| self.external_actions.get(kind.id()))
            {
                Some(action) => Step::uses(&main.name, action),
                None => Step::uses(&main.name, "actions/github-script@v8")
                    .with_input("script", &main.script),
            };
            step = step.with_id(&main.id).with_env("GITHUB_TOKEN", token);
            for (key, value) in &spec.env {
                step = step.with_env(key, value);
            }
            for (key, value) in &config.env {
                step = step.with_env(key, value);
            }
            job.steps.push(step);
        }

        // (4) declared post-steps
        job.steps.extend(spec.post_steps.iter().cloned());

        // (5) guaranteed revoke when a token was minted
        if minting.is_some() {
            job.steps.push(app_token::revoke_step());
        }

        Ok(job)
    }

    /// Token precedence: per-kind override, then the minted app token,
    /// then the workflow-wide default, then the platform token.
    fn resolve_token(
        &self,
        config: &SafeOutputsConfig,
        spec: &JobSpec,
        minted: bool,
    ) -> String {
        if let Some(token) = &spec.token {
            return token.clone();
        }
        if minted {
            return app_token::minted_token_expr();
        }
        config
            .github_token
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_EXPR.to_string())
    }

    /// Per-kind job spec: step naming, environment wiring, declared
    /// outputs, and the kind's computed minimal permissions. Reports a
    /// configuration-precondition error naming the capability when its
    /// sub-config is absent.
    fn capability_spec(
        &self,
        kind: CapabilityKind,
        config: &SafeOutputsConfig,
    ) -> Result<JobSpec, CompileError> {
        let missing = || CompileError::MissingCapability {
            kind: kind.id().to_string(),
        };
        let job_name = kind.job_name();
        let mut spec = JobSpec::new(&job_name);
        spec.kind = Some(kind);
        spec.permissions = min_permissions(kind, config);
        spec.token = config.token_override(kind).map(String::from);
        spec.main = Some(MainStep {
            name: main_step_name(kind),
            id: job_name.clone(),
            script: handler_script(kind),
        });

        spec.env.insert(
            "FLOWFORGE_AGENT_OUTPUT".to_string(),
            format!("${{{{ needs.{}.outputs.output }}}}", self.hosting_job),
        );
        spec.env.insert(
            "FLOWFORGE_WORKFLOW_NAME".to_string(),
            self.workflow.name.clone(),
        );

        use CapabilityKind::*;
        match kind {
            CreateIssue => {
                let c = config.create_issue.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TITLE_PREFIX", &c.title_prefix);
                env_list(&mut spec, "FLOWFORGE_LABELS", &c.labels);
                env_opt(&mut spec, "FLOWFORGE_TARGET_REPO", &c.target_repo);
                env_list(&mut spec, "FLOWFORGE_ALLOWED_REPOS", &c.allowed_repos);
                out(&mut spec, &job_name, "issue_number");
                out(&mut spec, &job_name, "issue_url");
            }
            UpdateIssue => {
                let c = config.update_issue.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_flag(&mut spec, "FLOWFORGE_CAN_STATUS", c.status);
                env_flag(&mut spec, "FLOWFORGE_CAN_TITLE", c.title);
                env_flag(&mut spec, "FLOWFORGE_CAN_BODY", c.body);
                out(&mut spec, &job_name, "issue_number");
            }
            CloseIssue => {
                let c = config.close_issue.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_list(&mut spec, "FLOWFORGE_REQUIRED_LABELS", &c.required_labels);
                out(&mut spec, &job_name, "issue_number");
            }
            AddComment => {
                let c = config.add_comment.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_opt(&mut spec, "FLOWFORGE_TARGET_REPO", &c.target_repo);
                env_list(&mut spec, "FLOWFORGE_ALLOWED_REPOS", &c.allowed_repos);
                env_flag(&mut spec, "FLOWFORGE_DISCUSSION", c.discussion);
                out(&mut spec, &job_name, "comment_id");
                out(&mut spec, &job_name, "comment_url");
            }
            AddLabels => {
                let c = config.add_labels.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_list(&mut spec, "FLOWFORGE_ALLOWED", &c.allowed);
            }
            RemoveLabels => {
                let c = config.remove_labels.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_list(&mut spec, "FLOWFORGE_ALLOWED", &c.allowed);
            }
            CreateDiscussion => {
                let c = config.create_discussion.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TITLE_PREFIX", &c.title_prefix);
                env_opt(&mut spec, "FLOWFORGE_CATEGORY", &c.category);
                env_opt(&mut spec, "FLOWFORGE_TARGET_REPO", &c.target_repo);
                env_list(&mut spec, "FLOWFORGE_ALLOWED_REPOS", &c.allowed_repos);
                out(&mut spec, &job_name, "discussion_number");
                out(&mut spec, &job_name, "discussion_url");
            }
            CloseDiscussion => {
                let c = config.close_discussion.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_opt(&mut spec, "FLOWFORGE_REQUIRED_CATEGORY", &c.required_category);
                out(&mut spec, &job_name, "discussion_number");
            }
            CreatePullRequest => {
                let c = config.create_pull_request.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TITLE_PREFIX", &c.title_prefix);
                env_list(&mut spec, "FLOWFORGE_LABELS", &c.labels);
                env_flag(&mut spec, "FLOWFORGE_DRAFT", c.draft);
                spec.env.insert(
                    "FLOWFORGE_IF_NO_CHANGES".to_string(),
                    c.if_no_changes.clone(),
                );
                env_flag(&mut spec, "FLOWFORGE_FALLBACK_AS_ISSUE", c.fallback_as_issue);
                spec.env.insert(
                    "FLOWFORGE_MAX_PATCH_SIZE".to_string(),
                    config.max_patch_size().to_string(),
                );
                out(&mut spec, &job_name, "pull_request_number");
                out(&mut spec, &job_name, "pull_request_url");
                out(&mut spec, &job_name, "fallback_issue_number");
            }
            UpdatePullRequest => {
                let c = config.update_pull_request.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_flag(&mut spec, "FLOWFORGE_CAN_TITLE", c.title);
                env_flag(&mut spec, "FLOWFORGE_CAN_BODY", c.body);
                out(&mut spec, &job_name, "pull_request_number");
            }
            ClosePullRequest => {
                let c = config.close_pull_request.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_list(&mut spec, "FLOWFORGE_REQUIRED_LABELS", &c.required_labels);
                out(&mut spec, &job_name, "pull_request_number");
            }
            CreatePullRequestReviewComment => {
                let c = config
                    .create_pull_request_review_comment
                    .as_ref()
                    .ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                spec.env
                    .insert("FLOWFORGE_SIDE".to_string(), c.side.clone());
                out(&mut spec, &job_name, "review_comment_id");
            }
            PushToPullRequestBranch => {
                let c = config.push_to_pull_request_branch.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_TARGET", &c.target);
                env_opt(&mut spec, "FLOWFORGE_BRANCH", &c.branch);
                spec.env.insert(
                    "FLOWFORGE_IF_NO_CHANGES".to_string(),
                    c.if_no_changes.clone(),
                );
                spec.env.insert(
                    "FLOWFORGE_MAX_PATCH_SIZE".to_string(),
                    config.max_patch_size().to_string(),
                );
                out(&mut spec, &job_name, "commit_sha");
            }
            CreateCodeScanningAlert => {
                let c = config.create_code_scanning_alert.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                spec.env
                    .insert("FLOWFORGE_DRIVER".to_string(), c.driver.clone());
                out(&mut spec, &job_name, "sarif_id");
            }
            UploadAsset => {
                let c = config.upload_asset.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                spec.env
                    .insert("FLOWFORGE_BRANCH".to_string(), c.branch.clone());
                spec.env.insert(
                    "FLOWFORGE_MAX_SIZE_KB".to_string(),
                    c.max_size_kb.to_string(),
                );
                env_list(&mut spec, "FLOWFORGE_ALLOWED_EXTS", &c.allowed_exts);
                out(&mut spec, &job_name, "asset_urls");
            }
            DispatchWorkflow => {
                let c = config.dispatch_workflow.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_list(&mut spec, "FLOWFORGE_WORKFLOWS", &c.workflows);
            }
            CreateAgentTask => {
                let c = config.create_agent_task.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_BASE_BRANCH", &c.base_branch);
                out(&mut spec, &job_name, "task_url");
            }
            UpdateProject => {
                let c = config.update_project.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                env_opt(&mut spec, "FLOWFORGE_PROJECT", &c.project);
            }
            MissingTool => {
                let c = config.missing_tool.as_ref().ok_or_else(missing)?;
                env_max(&mut spec, c.max);
                out(&mut spec, &job_name, "tools_reported");
            }
        }

        Ok(spec)
    }
}

/// Human-readable execution step name, e.g. "Create Issue"
fn main_step_name(kind: CapabilityKind) -> String {
    kind.id()
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inline invocation of the kind's run-time handler
fn handler_script(kind: CapabilityKind) -> String {
    format!(
        "await require('${{{{ github.workspace }}}}/.flowforge/handlers/{}.cjs')({{ github, context, core }})",
        kind.job_name()
    )
}

fn sanitize_job_name(name: &str) -> String {
    name.replace('-', "_")
}

fn env_max(spec: &mut JobSpec, max: u32) {
    spec.env
        .insert("FLOWFORGE_MAX".to_string(), max.to_string());
}

fn env_opt(spec: &mut JobSpec, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        spec.env.insert(key.to_string(), v.clone());
    }
}

fn env_list(spec: &mut JobSpec, key: &str, values: &[String]) {
    if !values.is_empty() {
        spec.env.insert(key.to_string(), values.join(","));
    }
}

fn env_flag(spec: &mut JobSpec, key: &str, value: bool) {
    spec.env.insert(key.to_string(), value.to_string());
}

fn out(spec: &mut JobSpec, step_id: &str, name: &str) {
    spec.outputs.insert(
        name.to_string(),
        format!("${{{{ steps.{}.outputs.{} }}}}", step_id, name),
    );
}

/// Threat-detection job: scans the agent output before any capability
/// job acts on it. Generated when detection is enabled.
pub fn detection_job(
    workflow: &WorkflowData,
    config: &SafeOutputsConfig,
    hosting_job: &str,
) -> Option<Job> {
    let detection = config.threat_detection.as_ref()?;
    if !detection.enabled {
        return None;
    }

    let mut job = Job::new("detection");
    job.needs = vec![hosting_job.to_string()];
    job.if_cond = Some(format!("needs.{}.outputs.output != ''", hosting_job));
    job.runs_on = config
        .runs_on
        .clone()
        .unwrap_or_else(|| workflow.runs_on.clone());
    job.permissions = Permissions::of([(Scope::Contents, Level::Read)]);

    let mut step = Step::uses("Threat Detection", "actions/github-script@v8")
        .with_id("detection")
        .with_input(
            "script",
            "await require('${{ github.workspace }}/.flowforge/handlers/detection.cjs')({ github, context, core })",
        )
        .with_env(
            "FLOWFORGE_AGENT_OUTPUT",
            format!("${{{{ needs.{}.outputs.output }}}}", hosting_job),
        );
    if let Some(prompt) = &detection.prompt {
        step = step.with_env("FLOWFORGE_DETECTION_PROMPT", prompt);
    }
    job.steps.push(step);
    job.outputs.insert(
        "verdict".to_string(),
        "${{ steps.detection.outputs.verdict }}".to_string(),
    );
    Some(job)
}
