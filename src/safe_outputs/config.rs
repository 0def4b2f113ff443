//! Per-kind safe output configuration records
//!
//! One typed record per capability kind. All records share the common
//! shape (`max` cap, optional token override, cross-repository routing)
//! plus kind-specific fields. A kind key whose value is `null` or
//! `true` enables the kind with defaults; a mapping overrides fields;
//! wrong-typed fields fall back to their defaults silently.

use crate::value::{parse_max, ConfigMap};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Shared helper: a kind block enables with defaults on `null`/`true`,
/// parses fields on a mapping, and is disabled on explicit `false`.
pub(crate) fn kind_enabled(value: &Value) -> bool {
    !matches!(value, Value::Bool(false))
}

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIssueConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target_repo: Option<String>,
    pub allowed_repos: Vec<String>,
    pub title_prefix: Option<String>,
    pub labels: Vec<String>,
}

impl Default for CreateIssueConfig {
    fn default() -> Self {
        CreateIssueConfig {
            max: 1,
            github_token: None,
            target_repo: None,
            allowed_repos: Vec::new(),
            title_prefix: None,
            labels: Vec::new(),
        }
    }
}

impl CreateIssueConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CreateIssueConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target_repo: cfg.str("target-repo"),
            allowed_repos: cfg.str_list("allowed-repos").unwrap_or_default(),
            title_prefix: cfg.str("title-prefix"),
            labels: cfg.str_list("labels").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateIssueConfig {
    pub max: u32,
    pub github_token: Option<String>,
    /// Issue to update: "triggering" (default), "*", or an explicit number
    pub target: Option<String>,
    /// Field opt-ins: only listed fields may be updated
    pub status: bool,
    pub title: bool,
    pub body: bool,
}

impl Default for UpdateIssueConfig {
    fn default() -> Self {
        UpdateIssueConfig {
            max: 1,
            github_token: None,
            target: None,
            status: false,
            title: false,
            body: false,
        }
    }
}

impl UpdateIssueConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        // a present key opts the field in unless explicitly false
        let opt_in = |key: &str| cfg.bool(key).unwrap_or_else(|| cfg.has(key));
        UpdateIssueConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            status: opt_in("status"),
            title: opt_in("title"),
            body: opt_in("body"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseIssueConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target: Option<String>,
    /// Only issues carrying every listed label may be closed
    pub required_labels: Vec<String>,
}

impl Default for CloseIssueConfig {
    fn default() -> Self {
        CloseIssueConfig {
            max: 1,
            github_token: None,
            target: None,
            required_labels: Vec::new(),
        }
    }
}

impl CloseIssueConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CloseIssueConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            required_labels: cfg.str_list("required-labels").unwrap_or_default(),
        }
    }
}

// ============================================================================
// COMMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AddCommentConfig {
    pub max: u32,
    pub github_token: Option<String>,
    /// "triggering" (default), "*", or an explicit issue/PR number
    pub target: Option<String>,
    pub target_repo: Option<String>,
    pub allowed_repos: Vec<String>,
    /// Comment on a discussion instead of an issue/PR
    pub discussion: bool,
}

impl Default for AddCommentConfig {
    fn default() -> Self {
        AddCommentConfig {
            max: 1,
            github_token: None,
            target: None,
            target_repo: None,
            allowed_repos: Vec::new(),
            discussion: false,
        }
    }
}

impl AddCommentConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        AddCommentConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            target_repo: cfg.str("target-repo"),
            allowed_repos: cfg.str_list("allowed-repos").unwrap_or_default(),
            discussion: cfg.bool("discussion").unwrap_or(false),
        }
    }
}

// ============================================================================
// LABELS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AddLabelsConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target: Option<String>,
    /// Allow-list; empty means any existing label
    pub allowed: Vec<String>,
}

impl Default for AddLabelsConfig {
    fn default() -> Self {
        AddLabelsConfig {
            max: 3,
            github_token: None,
            target: None,
            allowed: Vec::new(),
        }
    }
}

impl AddLabelsConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        AddLabelsConfig {
            max: parse_max(&cfg, 3, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            allowed: cfg.str_list("allowed").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoveLabelsConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target: Option<String>,
    pub allowed: Vec<String>,
}

impl Default for RemoveLabelsConfig {
    fn default() -> Self {
        RemoveLabelsConfig {
            max: 3,
            github_token: None,
            target: None,
            allowed: Vec::new(),
        }
    }
}

impl RemoveLabelsConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        RemoveLabelsConfig {
            max: parse_max(&cfg, 3, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            allowed: cfg.str_list("allowed").unwrap_or_default(),
        }
    }
}

// ============================================================================
// DISCUSSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDiscussionConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target_repo: Option<String>,
    pub allowed_repos: Vec<String>,
    pub title_prefix: Option<String>,
    /// Discussion category name; the platform default when unset
    pub category: Option<String>,
}

impl Default for CreateDiscussionConfig {
    fn default() -> Self {
        CreateDiscussionConfig {
            max: 1,
            github_token: None,
            target_repo: None,
            allowed_repos: Vec::new(),
            title_prefix: None,
            category: None,
        }
    }
}

impl CreateDiscussionConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CreateDiscussionConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target_repo: cfg.str("target-repo"),
            allowed_repos: cfg.str_list("allowed-repos").unwrap_or_default(),
            title_prefix: cfg.str("title-prefix"),
            category: cfg.str("category"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseDiscussionConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target: Option<String>,
    /// Only discussions in this category may be closed
    pub required_category: Option<String>,
}

impl Default for CloseDiscussionConfig {
    fn default() -> Self {
        CloseDiscussionConfig {
            max: 1,
            github_token: None,
            target: None,
            required_category: None,
        }
    }
}

impl CloseDiscussionConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CloseDiscussionConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            required_category: cfg.str("required-category"),
        }
    }
}

// ============================================================================
// PULL REQUESTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePullRequestConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target_repo: Option<String>,
    pub allowed_repos: Vec<String>,
    pub title_prefix: Option<String>,
    pub labels: Vec<String>,
    /// Open as draft (default true)
    pub draft: bool,
    /// "warn" (default), "error", or "ignore" when the patch is empty
    pub if_no_changes: String,
    /// Fall back to opening an issue when the push fails (default true).
    /// This fallback path is the only reason this kind ever needs
    /// issue-write access.
    pub fallback_as_issue: bool,
}

impl Default for CreatePullRequestConfig {
    fn default() -> Self {
        CreatePullRequestConfig {
            max: 1,
            github_token: None,
            target_repo: None,
            allowed_repos: Vec::new(),
            title_prefix: None,
            labels: Vec::new(),
            draft: true,
            if_no_changes: "warn".to_string(),
            fallback_as_issue: true,
        }
    }
}

impl CreatePullRequestConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CreatePullRequestConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target_repo: cfg.str("target-repo"),
            allowed_repos: cfg.str_list("allowed-repos").unwrap_or_default(),
            title_prefix: cfg.str("title-prefix"),
            labels: cfg.str_list("labels").unwrap_or_default(),
            draft: cfg.bool("draft").unwrap_or(true),
            if_no_changes: cfg
                .str("if-no-changes")
                .unwrap_or_else(|| "warn".to_string()),
            fallback_as_issue: cfg.bool("fallback-as-issue").unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePullRequestConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target: Option<String>,
    pub title: bool,
    pub body: bool,
}

impl Default for UpdatePullRequestConfig {
    fn default() -> Self {
        UpdatePullRequestConfig {
            max: 1,
            github_token: None,
            target: None,
            title: false,
            body: false,
        }
    }
}

impl UpdatePullRequestConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        let opt_in = |key: &str| cfg.bool(key).unwrap_or_else(|| cfg.has(key));
        UpdatePullRequestConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            title: opt_in("title"),
            body: opt_in("body"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosePullRequestConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target: Option<String>,
    pub required_labels: Vec<String>,
}

impl Default for ClosePullRequestConfig {
    fn default() -> Self {
        ClosePullRequestConfig {
            max: 1,
            github_token: None,
            target: None,
            required_labels: Vec::new(),
        }
    }
}

impl ClosePullRequestConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        ClosePullRequestConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            required_labels: cfg.str_list("required-labels").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePullRequestReviewCommentConfig {
    pub max: u32,
    pub github_token: Option<String>,
    /// Diff side: LEFT or RIGHT
    pub side: String,
}

impl Default for CreatePullRequestReviewCommentConfig {
    fn default() -> Self {
        CreatePullRequestReviewCommentConfig {
            max: 10,
            github_token: None,
            side: "RIGHT".to_string(),
        }
    }
}

impl CreatePullRequestReviewCommentConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CreatePullRequestReviewCommentConfig {
            max: parse_max(&cfg, 10, false),
            github_token: cfg.str("github-token"),
            side: cfg.str("side").unwrap_or_else(|| "RIGHT".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushToPullRequestBranchConfig {
    pub max: u32,
    pub github_token: Option<String>,
    pub target: Option<String>,
    /// Branch to push to; the triggering PR's head branch when unset
    pub branch: Option<String>,
    pub if_no_changes: String,
}

impl Default for PushToPullRequestBranchConfig {
    fn default() -> Self {
        PushToPullRequestBranchConfig {
            max: 1,
            github_token: None,
            target: None,
            branch: None,
            if_no_changes: "warn".to_string(),
        }
    }
}

impl PushToPullRequestBranchConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        PushToPullRequestBranchConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            target: cfg.str("target"),
            branch: cfg.str("branch"),
            if_no_changes: cfg
                .str("if-no-changes")
                .unwrap_or_else(|| "warn".to_string()),
        }
    }
}

// ============================================================================
// SECURITY / ASSETS / DISPATCH
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCodeScanningAlertConfig {
    /// 0 means unlimited for this kind
    pub max: u32,
    pub github_token: Option<String>,
    /// Tool driver name recorded in the report
    pub driver: String,
}

impl Default for CreateCodeScanningAlertConfig {
    fn default() -> Self {
        CreateCodeScanningAlertConfig {
            max: 0,
            github_token: None,
            driver: "flowforge".to_string(),
        }
    }
}

impl CreateCodeScanningAlertConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CreateCodeScanningAlertConfig {
            max: parse_max(&cfg, 0, true),
            github_token: cfg.str("github-token"),
            driver: cfg.str("driver").unwrap_or_else(|| "flowforge".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadAssetConfig {
    pub max: u32,
    pub github_token: Option<String>,
    /// Orphan branch that hosts uploaded assets
    pub branch: String,
    pub max_size_kb: u32,
    pub allowed_exts: Vec<String>,
}

impl Default for UploadAssetConfig {
    fn default() -> Self {
        UploadAssetConfig {
            max: 10,
            github_token: None,
            branch: "flowforge-assets".to_string(),
            max_size_kb: 10240,
            allowed_exts: vec![
                "png".to_string(),
                "jpg".to_string(),
                "jpeg".to_string(),
            ],
        }
    }
}

impl UploadAssetConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        let defaults = UploadAssetConfig::default();
        UploadAssetConfig {
            max: parse_max(&cfg, 10, false),
            github_token: cfg.str("github-token"),
            branch: cfg.str("branch").unwrap_or(defaults.branch),
            max_size_kb: cfg
                .uint("max-size")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_size_kb),
            allowed_exts: cfg
                .str_list("allowed-exts")
                .unwrap_or(defaults.allowed_exts),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchWorkflowConfig {
    pub max: u32,
    pub github_token: Option<String>,
    /// Names of sibling workflows this workflow may trigger
    pub workflows: Vec<String>,
}

impl Default for DispatchWorkflowConfig {
    fn default() -> Self {
        DispatchWorkflowConfig {
            max: 1,
            github_token: None,
            workflows: Vec::new(),
        }
    }
}

impl DispatchWorkflowConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        DispatchWorkflowConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            workflows: cfg.str_list("workflows").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateAgentTaskConfig {
    pub max: u32,
    pub github_token: Option<String>,
    /// Base branch for the delegated agent session
    pub base_branch: Option<String>,
}

impl Default for CreateAgentTaskConfig {
    fn default() -> Self {
        CreateAgentTaskConfig {
            max: 1,
            github_token: None,
            base_branch: None,
        }
    }
}

impl CreateAgentTaskConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        CreateAgentTaskConfig {
            max: parse_max(&cfg, 1, false),
            github_token: cfg.str("github-token"),
            base_branch: cfg.str("base-branch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateProjectConfig {
    pub max: u32,
    pub github_token: Option<String>,
    /// Project board name or URL
    pub project: Option<String>,
}

impl Default for UpdateProjectConfig {
    fn default() -> Self {
        UpdateProjectConfig {
            max: 10,
            github_token: None,
            project: None,
        }
    }
}

impl UpdateProjectConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        UpdateProjectConfig {
            max: parse_max(&cfg, 10, false),
            github_token: cfg.str("github-token"),
            project: cfg.str("project"),
        }
    }
}

/// Reporting channel for tools the agent needed but did not have.
/// Enabled by default whenever any safe output is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingToolConfig {
    /// 0 means unlimited for this kind
    pub max: u32,
    pub github_token: Option<String>,
}

impl Default for MissingToolConfig {
    fn default() -> Self {
        MissingToolConfig {
            max: 0,
            github_token: None,
        }
    }
}

impl MissingToolConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        MissingToolConfig {
            max: parse_max(&cfg, 0, true),
            github_token: cfg.str("github-token"),
        }
    }
}

// ============================================================================
// CROSS-CUTTING SUB-CONFIGS
// ============================================================================

/// Threat-detection pass over agent output before any safe output runs
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatDetectionConfig {
    pub enabled: bool,
    /// Extra instructions appended to the detection prompt
    pub prompt: Option<String>,
}

impl Default for ThreatDetectionConfig {
    fn default() -> Self {
        ThreatDetectionConfig {
            enabled: true,
            prompt: None,
        }
    }
}

impl ThreatDetectionConfig {
    /// Accepts `true`/`false` or a mapping
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Bool(b) => ThreatDetectionConfig {
                enabled: *b,
                prompt: None,
            },
            _ => {
                let cfg = ConfigMap::new(value);
                ThreatDetectionConfig {
                    enabled: cfg.bool("enabled").unwrap_or(true),
                    prompt: cfg.str("prompt"),
                }
            }
        }
    }
}

/// Mentions policy for generated text (issue bodies, comments)
#[derive(Debug, Clone, PartialEq)]
pub struct MentionsConfig {
    pub enabled: bool,
    /// Users/teams that may be mentioned; empty means any
    pub allowed: Vec<String>,
}

impl Default for MentionsConfig {
    fn default() -> Self {
        MentionsConfig {
            enabled: true,
            allowed: Vec::new(),
        }
    }
}

impl MentionsConfig {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Bool(b) => MentionsConfig {
                enabled: *b,
                allowed: Vec::new(),
            },
            _ => {
                let cfg = ConfigMap::new(value);
                MentionsConfig {
                    enabled: cfg.bool("enabled").unwrap_or(true),
                    allowed: cfg.str_list("allowed").unwrap_or_default(),
                }
            }
        }
    }
}

/// One declared input of a user-defined custom job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeJobInput {
    pub description: Option<String>,
    pub required: bool,
    /// "choice", "boolean", "number"; anything else maps to string
    pub input_type: Option<String>,
    /// Options for "choice" inputs
    pub options: Vec<String>,
    pub default: Option<String>,
}

impl SafeJobInput {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        SafeJobInput {
            description: cfg.str("description"),
            required: cfg.bool("required").unwrap_or(false),
            input_type: cfg.str("type"),
            options: cfg.str_list("options").unwrap_or_default(),
            default: cfg.str("default"),
        }
    }
}

/// User-defined custom job exposed to the agent as a tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeJobConfig {
    pub description: Option<String>,
    pub inputs: BTreeMap<String, SafeJobInput>,
    pub github_token: Option<String>,
    /// Raw step list carried into the generated job verbatim
    pub steps: Vec<Value>,
}

impl SafeJobConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        let inputs = cfg
            .section("inputs")
            .entries()
            .map(|(name, v)| (name.to_string(), SafeJobInput::parse(v)))
            .collect();
        let steps = match cfg.value("steps") {
            Some(Value::Sequence(seq)) => seq.clone(),
            _ => Vec::new(),
        };
        SafeJobConfig {
            description: cfg.str("description"),
            inputs,
            github_token: cfg.str("github-token"),
            steps,
        }
    }
}
