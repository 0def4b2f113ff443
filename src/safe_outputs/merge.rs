//! Configuration merge engine
//!
//! Combines the main workflow's safe-outputs configuration with zero
//! or more inherited fragments (imports before includes, each in
//! declaration order). For any capability kind the main declaration is
//! final; a kind the main workflow does not declare is taken from the
//! first inherited fragment that declares it. Two cross-cutting
//! exceptions use different rules: the custom-job map is deep-merged
//! (main wins on name collision), and the app config is "main wins
//! outright, else first valid inherited value".

use super::registry::CapabilityKind;
use super::SafeOutputsConfig;

/// Merge the main configuration with inherited fragments. Returns
/// `None` when nothing anywhere declares a safe-outputs section.
pub fn merge_safe_outputs(
    main: Option<SafeOutputsConfig>,
    inherited: &[SafeOutputsConfig],
) -> Option<SafeOutputsConfig> {
    if main.is_none() && inherited.is_empty() {
        return None;
    }
    let mut merged = main.unwrap_or_default();

    for fragment in inherited {
        fill_kind_slots(&mut merged, fragment);
        fill_cross_cutting(&mut merged, fragment);

        // inherited custom jobs are added only when no job of the same
        // name exists yet
        for (name, job) in &fragment.jobs {
            merged
                .jobs
                .entry(name.clone())
                .or_insert_with(|| job.clone());
        }

        // app config: main wins outright, else first *valid* inherited
        if merged.app.is_none() {
            if let Some(app) = &fragment.app {
                if app.is_valid() {
                    merged.app = Some(app.clone());
                }
            }
        }
    }

    Some(merged)
}

/// Fill every unset kind slot from the fragment, unless the kind was
/// explicitly disabled in the main workflow.
fn fill_kind_slots(merged: &mut SafeOutputsConfig, fragment: &SafeOutputsConfig) {
    macro_rules! fill {
        ($field:ident, $kind:expr) => {
            if merged.$field.is_none() && !merged.disabled.contains(&$kind) {
                if fragment.disabled.contains(&$kind) {
                    // a fragment's explicit `false` is a declaration too
                    merged.disabled.insert($kind);
                } else {
                    merged.$field = fragment.$field.clone();
                }
            }
        };
    }

    fill!(create_issue, CapabilityKind::CreateIssue);
    fill!(update_issue, CapabilityKind::UpdateIssue);
    fill!(close_issue, CapabilityKind::CloseIssue);
    fill!(add_comment, CapabilityKind::AddComment);
    fill!(add_labels, CapabilityKind::AddLabels);
    fill!(remove_labels, CapabilityKind::RemoveLabels);
    fill!(create_discussion, CapabilityKind::CreateDiscussion);
    fill!(close_discussion, CapabilityKind::CloseDiscussion);
    fill!(create_pull_request, CapabilityKind::CreatePullRequest);
    fill!(update_pull_request, CapabilityKind::UpdatePullRequest);
    fill!(close_pull_request, CapabilityKind::ClosePullRequest);
    fill!(
        create_pull_request_review_comment,
        CapabilityKind::CreatePullRequestReviewComment
    );
    fill!(
        push_to_pull_request_branch,
        CapabilityKind::PushToPullRequestBranch
    );
    fill!(
        create_code_scanning_alert,
        CapabilityKind::CreateCodeScanningAlert
    );
    fill!(upload_asset, CapabilityKind::UploadAsset);
    fill!(dispatch_workflow, CapabilityKind::DispatchWorkflow);
    fill!(create_agent_task, CapabilityKind::CreateAgentTask);
    fill!(update_project, CapabilityKind::UpdateProject);
    fill!(missing_tool, CapabilityKind::MissingTool);
}

/// Cross-cutting scalars: main wins when set, first-set fragment fills
/// the gap. Lists and maps: main wins when non-empty.
fn fill_cross_cutting(merged: &mut SafeOutputsConfig, fragment: &SafeOutputsConfig) {
    if merged.allowed_domains.is_empty() {
        merged.allowed_domains = fragment.allowed_domains.clone();
    }
    if merged.allowed_refs.is_empty() {
        merged.allowed_refs = fragment.allowed_refs.clone();
    }
    if merged.env.is_empty() {
        merged.env = fragment.env.clone();
    }
    if merged.messages.is_empty() {
        merged.messages = fragment.messages.clone();
    }
    if merged.github_token.is_none() {
        merged.github_token = fragment.github_token.clone();
    }
    if merged.max_patch_size.is_none() {
        merged.max_patch_size = fragment.max_patch_size;
    }
    if merged.threat_detection.is_none() {
        merged.threat_detection = fragment.threat_detection.clone();
    }
    if merged.runs_on.is_none() {
        merged.runs_on = fragment.runs_on.clone();
    }
    if merged.mentions.is_none() {
        merged.mentions = fragment.mentions.clone();
    }
    if merged.hide_footer.is_none() {
        merged.hide_footer = fragment.hide_footer;
    }
    if merged.group_reports.is_none() {
        merged.group_reports = fragment.group_reports;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe_outputs::GitHubAppConfig;

    fn parse(yaml: &str) -> SafeOutputsConfig {
        SafeOutputsConfig::parse(&serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_main_declaration_wins() {
        let main = parse("create-issue:\n  max: 2");
        let fragment = parse("create-issue:\n  max: 9\n  labels: [from-import]");
        let merged = merge_safe_outputs(Some(main), &[fragment]).unwrap();
        let issue = merged.create_issue.unwrap();
        assert_eq!(issue.max, 2);
        assert!(issue.labels.is_empty());
    }

    #[test]
    fn test_inherited_fills_gaps() {
        let main = parse("create-issue:");
        let fragment = parse("add-comment:\n  max: 5");
        let merged = merge_safe_outputs(Some(main), &[fragment]).unwrap();
        assert!(merged.create_issue.is_some());
        assert_eq!(merged.add_comment.unwrap().max, 5);
    }

    #[test]
    fn test_first_inherited_fragment_wins() {
        let first = parse("add-comment:\n  max: 5");
        let second = parse("add-comment:\n  max: 7");
        let merged = merge_safe_outputs(None, &[first, second]).unwrap();
        assert_eq!(merged.add_comment.unwrap().max, 5);
    }

    #[test]
    fn test_merge_idempotence() {
        let main = parse("create-issue:");
        let fragment = parse("add-comment:\n  max: 5\njobs:\n  deploy:\n    description: d");
        let once = merge_safe_outputs(Some(main.clone()), &[fragment.clone()]).unwrap();
        let twice =
            merge_safe_outputs(Some(main), &[fragment.clone(), fragment]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_explicit_disable_blocks_inheritance() {
        let main = parse("create-issue: false\nadd-comment:");
        let fragment = parse("create-issue:\n  max: 4");
        let merged = merge_safe_outputs(Some(main), &[fragment]).unwrap();
        assert!(merged.create_issue.is_none());
    }

    #[test]
    fn test_custom_jobs_deep_merge() {
        let main = parse("jobs:\n  deploy:\n    description: main deploy");
        let fragment =
            parse("jobs:\n  deploy:\n    description: imported deploy\n  lint:\n    description: lint");
        let merged = merge_safe_outputs(Some(main), &[fragment]).unwrap();
        assert_eq!(merged.jobs.len(), 2);
        assert_eq!(
            merged.jobs["deploy"].description.as_deref(),
            Some("main deploy")
        );
        assert_eq!(merged.jobs["lint"].description.as_deref(), Some("lint"));
    }

    #[test]
    fn test_app_config_requires_validity_from_fragments() {
        let main = parse("create-issue:");
        let invalid = parse("app:\n  app-id: '123'");
        let valid = parse("app:\n  app-id: '456'\n  private-key: ${{ secrets.K }}");
        let merged = merge_safe_outputs(Some(main), &[invalid, valid]).unwrap();
        let app: GitHubAppConfig = merged.app.unwrap();
        assert_eq!(app.app_id, "456");
    }

    #[test]
    fn test_app_config_main_wins_outright() {
        let main = parse("app:\n  app-id: 'main-app'\n  private-key: k");
        let fragment = parse("app:\n  app-id: 'other'\n  private-key: k");
        let merged = merge_safe_outputs(Some(main), &[fragment]).unwrap();
        assert_eq!(merged.app.unwrap().app_id, "main-app");
    }

    #[test]
    fn test_nothing_declared_anywhere() {
        assert!(merge_safe_outputs(None, &[]).is_none());
    }
}
