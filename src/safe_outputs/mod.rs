//! Safe Outputs subsystem
//!
//! Turns the `safe-outputs:` section of a workflow's frontmatter into:
//! a minimal permission set per generated job, one isolated job per
//! requested capability, and a tool-discovery catalog describing those
//! capabilities back to the executing agent.

pub mod app_token;
pub mod config;
pub mod dispatch;
pub mod jobs;
pub mod merge;
pub mod permission_calc;
pub mod registry;
pub mod tools;

pub use app_token::GitHubAppConfig;
pub use registry::CapabilityKind;
pub use tools::ToolDefinition;

use crate::job::RunsOn;
use crate::value::ConfigMap;
use config::*;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Default cap on the size of an artifact/patch in KB
pub const DEFAULT_MAX_PATCH_SIZE_KB: u32 = 1024;

/// Aggregate root for the Safe Outputs subsystem.
///
/// Built once per compiled workflow from the merged configuration and
/// immutable afterwards; consumed by the permission calculator, the
/// job graph builder, and the tool-schema generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeOutputsConfig {
    // one presence-optional slot per capability kind
    pub create_issue: Option<CreateIssueConfig>,
    pub update_issue: Option<UpdateIssueConfig>,
    pub close_issue: Option<CloseIssueConfig>,
    pub add_comment: Option<AddCommentConfig>,
    pub add_labels: Option<AddLabelsConfig>,
    pub remove_labels: Option<RemoveLabelsConfig>,
    pub create_discussion: Option<CreateDiscussionConfig>,
    pub close_discussion: Option<CloseDiscussionConfig>,
    pub create_pull_request: Option<CreatePullRequestConfig>,
    pub update_pull_request: Option<UpdatePullRequestConfig>,
    pub close_pull_request: Option<ClosePullRequestConfig>,
    pub create_pull_request_review_comment: Option<CreatePullRequestReviewCommentConfig>,
    pub push_to_pull_request_branch: Option<PushToPullRequestBranchConfig>,
    pub create_code_scanning_alert: Option<CreateCodeScanningAlertConfig>,
    pub upload_asset: Option<UploadAssetConfig>,
    pub dispatch_workflow: Option<DispatchWorkflowConfig>,
    pub create_agent_task: Option<CreateAgentTaskConfig>,
    pub update_project: Option<UpdateProjectConfig>,
    pub missing_tool: Option<MissingToolConfig>,

    // cross-cutting fields
    pub allowed_domains: Vec<String>,
    pub allowed_refs: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub github_token: Option<String>,
    pub max_patch_size: Option<u32>,
    pub threat_detection: Option<ThreatDetectionConfig>,
    pub runs_on: Option<RunsOn>,
    pub messages: BTreeMap<String, String>,
    pub mentions: Option<MentionsConfig>,
    pub hide_footer: Option<bool>,
    pub group_reports: Option<bool>,
    pub jobs: BTreeMap<String, SafeJobConfig>,
    pub app: Option<GitHubAppConfig>,

    /// Kinds whose key was declared with an explicit `false`. A
    /// disable is a declaration: inherited fragments cannot re-enable
    /// the kind.
    pub disabled: BTreeSet<CapabilityKind>,
}

impl SafeOutputsConfig {
    /// Parse one `safe-outputs:` section. Inherited fragments go
    /// through the same parse and are combined by the merge engine.
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);

        fn slot<T>(cfg: &ConfigMap<'_>, key: &str, parse: impl Fn(&Value) -> T) -> Option<T> {
            let v = cfg.value(key)?;
            config::kind_enabled(v).then(|| parse(v))
        }

        let mut out = SafeOutputsConfig {
            create_issue: slot(&cfg, "create-issue", CreateIssueConfig::parse),
            update_issue: slot(&cfg, "update-issue", UpdateIssueConfig::parse),
            close_issue: slot(&cfg, "close-issue", CloseIssueConfig::parse),
            add_comment: slot(&cfg, "add-comment", AddCommentConfig::parse),
            add_labels: slot(&cfg, "add-labels", AddLabelsConfig::parse),
            remove_labels: slot(&cfg, "remove-labels", RemoveLabelsConfig::parse),
            create_discussion: slot(&cfg, "create-discussion", CreateDiscussionConfig::parse),
            close_discussion: slot(&cfg, "close-discussion", CloseDiscussionConfig::parse),
            create_pull_request: slot(&cfg, "create-pull-request", CreatePullRequestConfig::parse),
            update_pull_request: slot(&cfg, "update-pull-request", UpdatePullRequestConfig::parse),
            close_pull_request: slot(&cfg, "close-pull-request", ClosePullRequestConfig::parse),
            create_pull_request_review_comment: slot(
                &cfg,
                "create-pull-request-review-comment",
                CreatePullRequestReviewCommentConfig::parse,
            ),
            push_to_pull_request_branch: slot(
                &cfg,
                "push-to-pull-request-branch",
                PushToPullRequestBranchConfig::parse,
            ),
            create_code_scanning_alert: slot(
                &cfg,
                "create-code-scanning-alert",
                CreateCodeScanningAlertConfig::parse,
            ),
            upload_asset: slot(&cfg, "upload-asset", UploadAssetConfig::parse),
            dispatch_workflow: slot(&cfg, "dispatch-workflow", DispatchWorkflowConfig::parse),
            create_agent_task: slot(&cfg, "create-agent-task", CreateAgentTaskConfig::parse),
            update_project: slot(&cfg, "update-project", UpdateProjectConfig::parse),
            missing_tool: slot(&cfg, "missing-tool", MissingToolConfig::parse),

            allowed_domains: cfg.str_list("allowed-domains").unwrap_or_default(),
            allowed_refs: cfg.str_list("allowed-refs").unwrap_or_default(),
            env: cfg.string_map("env").unwrap_or_default(),
            github_token: cfg.str("github-token"),
            max_patch_size: cfg.uint("max-patch-size").and_then(|n| u32::try_from(n).ok()),
            threat_detection: cfg.value("threat-detection").map(ThreatDetectionConfig::parse),
            runs_on: cfg
                .value("runs-on")
                .and_then(|v| serde_yaml::from_value(v.clone()).ok()),
            messages: cfg.string_map("messages").unwrap_or_default(),
            mentions: cfg.value("mentions").map(MentionsConfig::parse),
            hide_footer: cfg.bool("hide-footer"),
            group_reports: cfg.bool("group-reports"),
            jobs: cfg
                .section("jobs")
                .entries()
                .map(|(name, v)| (name.to_string(), SafeJobConfig::parse(v)))
                .collect(),
            app: cfg.value("app").map(GitHubAppConfig::parse),
            disabled: BTreeSet::new(),
        };

        for kind in CapabilityKind::all() {
            if matches!(cfg.value(kind.id()), Some(Value::Bool(false))) {
                out.disabled.insert(*kind);
            }
        }

        // the missing-tool reporting channel is on by default; only an
        // explicit `missing-tool: false` turns it off
        if out.missing_tool.is_none() && !cfg.has("missing-tool") {
            out.missing_tool = Some(MissingToolConfig::default());
        }

        out
    }

    /// Whether a capability kind has a configuration present
    pub fn is_enabled(&self, kind: CapabilityKind) -> bool {
        use CapabilityKind::*;
        match kind {
            CreateIssue => self.create_issue.is_some(),
            UpdateIssue => self.update_issue.is_some(),
            CloseIssue => self.close_issue.is_some(),
            AddComment => self.add_comment.is_some(),
            AddLabels => self.add_labels.is_some(),
            RemoveLabels => self.remove_labels.is_some(),
            CreateDiscussion => self.create_discussion.is_some(),
            CloseDiscussion => self.close_discussion.is_some(),
            CreatePullRequest => self.create_pull_request.is_some(),
            UpdatePullRequest => self.update_pull_request.is_some(),
            ClosePullRequest => self.close_pull_request.is_some(),
            CreatePullRequestReviewComment => {
                self.create_pull_request_review_comment.is_some()
            }
            PushToPullRequestBranch => self.push_to_pull_request_branch.is_some(),
            CreateCodeScanningAlert => self.create_code_scanning_alert.is_some(),
            UploadAsset => self.upload_asset.is_some(),
            DispatchWorkflow => self.dispatch_workflow.is_some(),
            CreateAgentTask => self.create_agent_task.is_some(),
            UpdateProject => self.update_project.is_some(),
            MissingTool => self.missing_tool.is_some(),
        }
    }

    /// Enabled kinds in catalog order
    pub fn enabled_kinds(&self) -> Vec<CapabilityKind> {
        CapabilityKind::all()
            .iter()
            .copied()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }

    pub fn any_enabled(&self) -> bool {
        CapabilityKind::all().iter().any(|k| self.is_enabled(*k))
    }

    /// Per-kind token override, if the kind declares one
    pub fn token_override(&self, kind: CapabilityKind) -> Option<&str> {
        use CapabilityKind::*;
        let token = match kind {
            CreateIssue => &self.create_issue.as_ref()?.github_token,
            UpdateIssue => &self.update_issue.as_ref()?.github_token,
            CloseIssue => &self.close_issue.as_ref()?.github_token,
            AddComment => &self.add_comment.as_ref()?.github_token,
            AddLabels => &self.add_labels.as_ref()?.github_token,
            RemoveLabels => &self.remove_labels.as_ref()?.github_token,
            CreateDiscussion => &self.create_discussion.as_ref()?.github_token,
            CloseDiscussion => &self.close_discussion.as_ref()?.github_token,
            CreatePullRequest => &self.create_pull_request.as_ref()?.github_token,
            UpdatePullRequest => &self.update_pull_request.as_ref()?.github_token,
            ClosePullRequest => &self.close_pull_request.as_ref()?.github_token,
            CreatePullRequestReviewComment => {
                &self.create_pull_request_review_comment.as_ref()?.github_token
            }
            PushToPullRequestBranch => {
                &self.push_to_pull_request_branch.as_ref()?.github_token
            }
            CreateCodeScanningAlert => {
                &self.create_code_scanning_alert.as_ref()?.github_token
            }
            UploadAsset => &self.upload_asset.as_ref()?.github_token,
            DispatchWorkflow => &self.dispatch_workflow.as_ref()?.github_token,
            CreateAgentTask => &self.create_agent_task.as_ref()?.github_token,
            UpdateProject => &self.update_project.as_ref()?.github_token,
            MissingTool => &self.missing_tool.as_ref()?.github_token,
        };
        token.as_deref()
    }

    /// Effective artifact/patch size cap in KB
    pub fn max_patch_size(&self) -> u32 {
        self.max_patch_size.unwrap_or(DEFAULT_MAX_PATCH_SIZE_KB)
    }

    /// Auto-populate threat detection after merging: defaults to
    /// enabled when any capability is enabled and the key was entirely
    /// absent. A present key (including an explicit `false`) is never
    /// overwritten.
    pub fn apply_threat_detection_default(&mut self) {
        if self.threat_detection.is_none() && self.any_enabled() {
            self.threat_detection = Some(ThreatDetectionConfig::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> SafeOutputsConfig {
        SafeOutputsConfig::parse(&serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_parse_kind_slots() {
        let cfg = parse("create-issue:\nadd-comment:\n  max: 3");
        assert!(cfg.is_enabled(CapabilityKind::CreateIssue));
        assert!(cfg.is_enabled(CapabilityKind::AddComment));
        assert!(!cfg.is_enabled(CapabilityKind::CreatePullRequest));
        assert_eq!(cfg.add_comment.as_ref().unwrap().max, 3);
    }

    #[test]
    fn test_explicit_false_disables_kind() {
        let cfg = parse("create-issue: false\nadd-comment:");
        assert!(!cfg.is_enabled(CapabilityKind::CreateIssue));
    }

    #[test]
    fn test_missing_tool_default_on() {
        let cfg = parse("create-issue:");
        assert!(cfg.is_enabled(CapabilityKind::MissingTool));

        let cfg = parse("create-issue:\nmissing-tool: false");
        assert!(!cfg.is_enabled(CapabilityKind::MissingTool));
    }

    #[test]
    fn test_threat_detection_auto_population() {
        let mut cfg = parse("create-discussion:");
        assert!(cfg.threat_detection.is_none());
        cfg.apply_threat_detection_default();
        let td = cfg.threat_detection.as_ref().unwrap();
        assert!(td.enabled);
    }

    #[test]
    fn test_threat_detection_explicit_false_not_overwritten() {
        let mut cfg = parse("create-discussion:\nthreat-detection: false");
        cfg.apply_threat_detection_default();
        assert!(!cfg.threat_detection.as_ref().unwrap().enabled);
    }

    #[test]
    fn test_cross_cutting_fields() {
        let cfg = parse(
            r#"
create-issue:
allowed-domains: ["api.example.com"]
github-token: "${{ secrets.BOT_TOKEN }}"
max-patch-size: 2048
env:
  DEBUG: "1"
runs-on: [self-hosted, linux]
"#,
        );
        assert_eq!(cfg.allowed_domains, vec!["api.example.com"]);
        assert_eq!(cfg.max_patch_size(), 2048);
        assert_eq!(cfg.env.get("DEBUG").map(String::as_str), Some("1"));
        assert!(matches!(cfg.runs_on, Some(RunsOn::Multiple(_))));
    }

    #[test]
    fn test_default_max_patch_size() {
        let cfg = parse("create-issue:");
        assert_eq!(cfg.max_patch_size(), DEFAULT_MAX_PATCH_SIZE_KB);
    }

    #[test]
    fn test_enabled_kinds_order_is_catalog_order() {
        let cfg = parse("add-comment:\ncreate-issue:\nmissing-tool: false");
        assert_eq!(
            cfg.enabled_kinds(),
            vec![CapabilityKind::CreateIssue, CapabilityKind::AddComment]
        );
    }
}
