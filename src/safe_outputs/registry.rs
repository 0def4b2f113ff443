//! Capability kind registry
//!
//! Single source of truth per capability kind: identifier, default
//! cap, minimal permission set, default job condition, and the tool
//! input schema exposed to the agent. The Permission Calculator, Job
//! Graph Builder, and Tool-Schema Generator all read from this table
//! instead of keeping their own per-kind switch.

use crate::permissions::{Level, Scope};
use serde_json::{json, Value as JsonValue};

/// One named category of automated action the compiled workflow may
/// perform after the agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    CreateIssue,
    UpdateIssue,
    CloseIssue,
    AddComment,
    AddLabels,
    RemoveLabels,
    CreateDiscussion,
    CloseDiscussion,
    CreatePullRequest,
    UpdatePullRequest,
    ClosePullRequest,
    CreatePullRequestReviewComment,
    PushToPullRequestBranch,
    CreateCodeScanningAlert,
    UploadAsset,
    DispatchWorkflow,
    CreateAgentTask,
    UpdateProject,
    MissingTool,
}

impl CapabilityKind {
    /// Every kind, in catalog order
    pub fn all() -> &'static [CapabilityKind] {
        use CapabilityKind::*;
        &[
            CreateIssue,
            UpdateIssue,
            CloseIssue,
            AddComment,
            AddLabels,
            RemoveLabels,
            CreateDiscussion,
            CloseDiscussion,
            CreatePullRequest,
            UpdatePullRequest,
            ClosePullRequest,
            CreatePullRequestReviewComment,
            PushToPullRequestBranch,
            CreateCodeScanningAlert,
            UploadAsset,
            DispatchWorkflow,
            CreateAgentTask,
            UpdateProject,
            MissingTool,
        ]
    }

    /// Frontmatter key / tool name for this kind
    pub fn id(&self) -> &'static str {
        use CapabilityKind::*;
        match self {
            CreateIssue => "create-issue",
            UpdateIssue => "update-issue",
            CloseIssue => "close-issue",
            AddComment => "add-comment",
            AddLabels => "add-labels",
            RemoveLabels => "remove-labels",
            CreateDiscussion => "create-discussion",
            CloseDiscussion => "close-discussion",
            CreatePullRequest => "create-pull-request",
            UpdatePullRequest => "update-pull-request",
            ClosePullRequest => "close-pull-request",
            CreatePullRequestReviewComment => "create-pull-request-review-comment",
            PushToPullRequestBranch => "push-to-pull-request-branch",
            CreateCodeScanningAlert => "create-code-scanning-alert",
            UploadAsset => "upload-asset",
            DispatchWorkflow => "dispatch-workflow",
            CreateAgentTask => "create-agent-task",
            UpdateProject => "update-project",
            MissingTool => "missing-tool",
        }
    }

    /// Job key in the generated document
    pub fn job_name(&self) -> String {
        self.id().replace('-', "_")
    }

    pub fn from_id(id: &str) -> Option<CapabilityKind> {
        CapabilityKind::all().iter().copied().find(|k| k.id() == id)
    }

    /// Default job condition: "this capability was requested at run
    /// time". Each kind owns its predicate rather than deriving it
    /// from configuration field names.
    pub fn default_condition(&self, hosting_job: &str) -> String {
        format!(
            "contains(needs.{}.outputs.output_types, '{}')",
            hosting_job,
            self.id()
        )
    }

    /// Minimal permission set to execute this kind, before
    /// kind-specific conditional variants are applied.
    pub fn base_permissions(&self) -> &'static [(Scope, Level)] {
        use CapabilityKind::*;
        match self {
            CreateIssue | UpdateIssue | CloseIssue => {
                &[(Scope::Contents, Level::Read), (Scope::Issues, Level::Write)]
            }
            AddComment => &[
                (Scope::Contents, Level::Read),
                (Scope::Issues, Level::Write),
                (Scope::PullRequests, Level::Write),
                (Scope::Discussions, Level::Write),
            ],
            AddLabels | RemoveLabels => &[
                (Scope::Contents, Level::Read),
                (Scope::Issues, Level::Write),
                (Scope::PullRequests, Level::Write),
            ],
            CreateDiscussion | CloseDiscussion => &[
                (Scope::Contents, Level::Read),
                (Scope::Discussions, Level::Write),
            ],
            // the fallback-to-issue variant adds issues:write; see
            // the permission calculator
            CreatePullRequest => &[
                (Scope::Contents, Level::Write),
                (Scope::PullRequests, Level::Write),
            ],
            UpdatePullRequest | ClosePullRequest | CreatePullRequestReviewComment => &[
                (Scope::Contents, Level::Read),
                (Scope::PullRequests, Level::Write),
            ],
            PushToPullRequestBranch => &[
                (Scope::Contents, Level::Write),
                (Scope::PullRequests, Level::Read),
            ],
            CreateCodeScanningAlert => &[
                (Scope::Contents, Level::Read),
                (Scope::SecurityEvents, Level::Write),
            ],
            UploadAsset => &[(Scope::Contents, Level::Write)],
            DispatchWorkflow => {
                &[(Scope::Contents, Level::Read), (Scope::Actions, Level::Write)]
            }
            CreateAgentTask => &[
                (Scope::Contents, Level::Read),
                (Scope::Actions, Level::Write),
                (Scope::Issues, Level::Write),
            ],
            UpdateProject => &[
                (Scope::Contents, Level::Read),
                (Scope::RepositoryProjects, Level::Write),
            ],
            MissingTool => &[(Scope::Contents, Level::Read)],
        }
    }

    /// Base tool description before live configuration is folded in
    pub fn description(&self) -> &'static str {
        use CapabilityKind::*;
        match self {
            CreateIssue => "Open a new issue in the repository",
            UpdateIssue => "Update fields of an existing issue",
            CloseIssue => "Close an existing issue with an optional comment",
            AddComment => "Add a comment to the triggering issue, pull request, or discussion",
            AddLabels => "Add labels to an issue or pull request",
            RemoveLabels => "Remove labels from an issue or pull request",
            CreateDiscussion => "Open a new discussion in the repository",
            CloseDiscussion => "Close an existing discussion",
            CreatePullRequest => {
                "Open a pull request with the changes the agent made in the workspace"
            }
            UpdatePullRequest => "Update fields of an existing pull request",
            ClosePullRequest => "Close an existing pull request without merging",
            CreatePullRequestReviewComment => {
                "Add a review comment to a specific line of the pull request diff"
            }
            PushToPullRequestBranch => {
                "Push the agent's workspace changes to the pull request branch"
            }
            CreateCodeScanningAlert => {
                "Report a security finding as a code scanning alert"
            }
            UploadAsset => "Upload a file produced by the agent as a hosted asset",
            DispatchWorkflow => "Trigger another workflow in this repository",
            CreateAgentTask => "Delegate a follow-up task to a new agent session",
            UpdateProject => "Add or update an item on a project board",
            MissingTool => {
                "Report that a tool needed to complete the task was not available"
            }
        }
    }

    /// Tool input schema for this kind: a JSON-schema object with
    /// named properties, a required list, and closed extra properties.
    pub fn input_schema(&self) -> JsonValue {
        use CapabilityKind::*;
        match self {
            CreateIssue => object_schema(
                json!({
                    "title": { "type": "string", "description": "Issue title" },
                    "body": { "type": "string", "description": "Issue body in markdown" },
                    "labels": { "type": "array", "items": { "type": "string" } }
                }),
                &["body", "title"],
            ),
            UpdateIssue => object_schema(
                json!({
                    "issue_number": { "type": "number", "description": "Issue to update; defaults to the triggering issue" },
                    "status": { "type": "string", "enum": ["open", "closed"] },
                    "title": { "type": "string" },
                    "body": { "type": "string" }
                }),
                &[],
            ),
            CloseIssue => object_schema(
                json!({
                    "issue_number": { "type": "number" },
                    "comment": { "type": "string", "description": "Closing comment in markdown" }
                }),
                &[],
            ),
            AddComment => object_schema(
                json!({
                    "body": { "type": "string", "description": "Comment body in markdown" },
                    "item_number": { "type": "number", "description": "Issue or PR number; defaults to the triggering item" }
                }),
                &["body"],
            ),
            AddLabels => object_schema(
                json!({
                    "labels": { "type": "array", "items": { "type": "string" } },
                    "item_number": { "type": "number" }
                }),
                &["labels"],
            ),
            RemoveLabels => object_schema(
                json!({
                    "labels": { "type": "array", "items": { "type": "string" } },
                    "item_number": { "type": "number" }
                }),
                &["labels"],
            ),
            CreateDiscussion => object_schema(
                json!({
                    "title": { "type": "string" },
                    "body": { "type": "string", "description": "Discussion body in markdown" },
                    "category": { "type": "string" }
                }),
                &["body", "title"],
            ),
            CloseDiscussion => object_schema(
                json!({
                    "discussion_number": { "type": "number" },
                    "comment": { "type": "string" }
                }),
                &[],
            ),
            CreatePullRequest => object_schema(
                json!({
                    "title": { "type": "string" },
                    "body": { "type": "string", "description": "Pull request body in markdown" },
                    "branch": { "type": "string", "description": "Head branch name; generated when omitted" },
                    "labels": { "type": "array", "items": { "type": "string" } }
                }),
                &["body", "title"],
            ),
            UpdatePullRequest => object_schema(
                json!({
                    "pull_number": { "type": "number" },
                    "title": { "type": "string" },
                    "body": { "type": "string" }
                }),
                &[],
            ),
            ClosePullRequest => object_schema(
                json!({
                    "pull_number": { "type": "number" },
                    "comment": { "type": "string" }
                }),
                &[],
            ),
            CreatePullRequestReviewComment => object_schema(
                json!({
                    "path": { "type": "string", "description": "File path in the diff" },
                    "line": { "type": "number", "description": "Line the comment applies to" },
                    "body": { "type": "string" },
                    "start_line": { "type": "number", "description": "First line for a multi-line comment" }
                }),
                &["body", "line", "path"],
            ),
            PushToPullRequestBranch => object_schema(
                json!({
                    "message": { "type": "string", "description": "Commit message" },
                    "pull_number": { "type": "number" }
                }),
                &["message"],
            ),
            CreateCodeScanningAlert => object_schema(
                json!({
                    "file": { "type": "string" },
                    "line": { "type": "number" },
                    "severity": { "type": "string", "enum": ["error", "warning", "note"] },
                    "message": { "type": "string" },
                    "column": { "type": "number" },
                    "rule_id_suffix": { "type": "string" }
                }),
                &["file", "line", "message", "severity"],
            ),
            UploadAsset => object_schema(
                json!({
                    "path": { "type": "string", "description": "Workspace-relative path of the file to upload" }
                }),
                &["path"],
            ),
            DispatchWorkflow => object_schema(
                json!({
                    "workflow": { "type": "string", "description": "Name of the workflow to trigger" },
                    "inputs": { "type": "object", "description": "Inputs passed to the dispatched workflow" }
                }),
                &["workflow"],
            ),
            CreateAgentTask => object_schema(
                json!({
                    "body": { "type": "string", "description": "Task description for the delegated agent" }
                }),
                &["body"],
            ),
            UpdateProject => object_schema(
                json!({
                    "project": { "type": "string", "description": "Project board name or URL" },
                    "content_type": { "type": "string", "enum": ["issue", "pull-request", "draft"] },
                    "content_number": { "type": "number" },
                    "fields": { "type": "object", "description": "Field name to value map" }
                }),
                &["project"],
            ),
            MissingTool => object_schema(
                json!({
                    "tool": { "type": "string", "description": "Name of the missing tool" },
                    "reason": { "type": "string", "description": "Why the tool was needed" },
                    "alternatives": { "type": "string", "description": "Workarounds considered" }
                }),
                &["reason", "tool"],
            ),
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Closed object schema with a sorted required list
fn object_schema(properties: JsonValue, required: &[&str]) -> JsonValue {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}
