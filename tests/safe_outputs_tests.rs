//! End-to-end tests over the library surface
//!
//! Exercises merge + permission calculation + job generation + tool
//! schemas on multi-capability workflows, including the properties
//! the subsystem is designed around: least privilege, mint/revoke
//! pairing, and tool catalog exactness.

use flowforge::compiler::{compile_file, CompileOptions};
use flowforge::safe_outputs::permission_calc::compute_permissions;
use flowforge::safe_outputs::{CapabilityKind, SafeOutputsConfig};
use jsonschema::JSONSchema;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_workflow(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn parse_config(yaml: &str) -> SafeOutputsConfig {
    SafeOutputsConfig::parse(&serde_yaml::from_str(yaml).unwrap())
}

// ============================================================================
// Permission properties
// ============================================================================

#[test]
fn test_least_privilege_union_over_subsets() {
    // permissions for a subset equal the per-scope union of each
    // kind's minimal entry, regardless of declaration order
    let forward = parse_config("create-issue:\nadd-comment:\nupload-asset:\nmissing-tool: false");
    let backward = parse_config("upload-asset:\nadd-comment:\ncreate-issue:\nmissing-tool: false");
    assert_eq!(
        compute_permissions(&forward),
        compute_permissions(&backward)
    );
    assert_eq!(
        compute_permissions(&forward).to_lines(),
        vec![
            "contents: write",
            "discussions: write",
            "issues: write",
            "pull-requests: write"
        ]
    );
}

#[test]
fn test_fallback_switch_scenario() {
    let with_fallback = parse_config("create-pull-request:\nmissing-tool: false");
    assert_eq!(
        compute_permissions(&with_fallback).to_lines(),
        vec!["contents: write", "issues: write", "pull-requests: write"]
    );

    let without = parse_config(
        "create-pull-request:\n  fallback-as-issue: false\nmissing-tool: false",
    );
    assert_eq!(
        compute_permissions(&without).to_lines(),
        vec!["contents: write", "pull-requests: write"]
    );
}

// ============================================================================
// Full compile scenarios
// ============================================================================

#[test]
fn test_create_issue_scenario() {
    let dir = TempDir::new().unwrap();
    let path = write_workflow(
        &dir,
        "triage.flow.md",
        r#"---
name: triage
safe-outputs:
  create-issue:
  missing-tool: false
  threat-detection: false
---
File a summary issue.
"#,
    );
    let compiled = compile_file(&path, &CompileOptions::default()).unwrap();

    let job = compiled
        .jobs
        .iter()
        .find(|j| j.name == "create_issue")
        .unwrap();
    assert_eq!(job.needs, vec!["agent".to_string()]);
    assert_eq!(job.timeout_minutes, 10);
    assert_eq!(
        job.permissions.to_lines(),
        vec!["contents: read", "issues: write"]
    );
    assert_eq!(
        job.if_cond.as_deref(),
        Some("contains(needs.agent.outputs.output_types, 'create-issue')")
    );
}

#[test]
fn test_threat_detection_auto_population_scenario() {
    let dir = TempDir::new().unwrap();
    let path = write_workflow(
        &dir,
        "discuss.flow.md",
        "---\nname: discuss\nsafe-outputs:\n  create-discussion:\n---\nbody\n",
    );
    let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
    let config = compiled.safe_outputs.as_ref().unwrap();
    assert!(config.threat_detection.as_ref().unwrap().enabled);
    assert!(compiled.jobs.iter().any(|j| j.name == "detection"));

    let path = write_workflow(
        &dir,
        "quiet.flow.md",
        "---\nname: quiet\nsafe-outputs:\n  create-discussion:\n  threat-detection: false\n---\nbody\n",
    );
    let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
    let config = compiled.safe_outputs.as_ref().unwrap();
    assert!(!config.threat_detection.as_ref().unwrap().enabled);
    assert!(!compiled.jobs.iter().any(|j| j.name == "detection"));
}

#[test]
fn test_mint_revoke_pairing_across_all_capability_jobs() {
    let dir = TempDir::new().unwrap();
    let path = write_workflow(
        &dir,
        "full.flow.md",
        r#"---
name: full
safe-outputs:
  create-issue:
  add-comment:
  create-pull-request:
  threat-detection: false
  app:
    app-id: "4242"
    private-key: ${{ secrets.APP_PRIVATE_KEY }}
---
body
"#,
    );
    let compiled = compile_file(&path, &CompileOptions::default()).unwrap();

    for job in compiled.jobs.iter().filter(|j| j.name != "agent") {
        let mints = job
            .steps
            .iter()
            .filter(|s| s.id.as_deref() == Some("app_token"))
            .count();
        let revoke_positions: Vec<usize> = job
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name.as_deref() == Some("Revoke installation token"))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(mints, 1, "job {} must mint exactly once", job.name);
        assert_eq!(
            revoke_positions.len(),
            1,
            "job {} must revoke exactly once",
            job.name
        );
        // mint first, revoke last
        assert_eq!(job.steps[0].id.as_deref(), Some("app_token"));
        assert_eq!(revoke_positions[0], job.steps.len() - 1);
        assert_eq!(
            job.steps[revoke_positions[0]].if_cond.as_deref(),
            Some("always()")
        );
    }
}

#[test]
fn test_tool_catalog_exactness() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("nightly.lock.yml"),
        "name: nightly\non: [workflow_dispatch]\njobs: {}\n",
    )
    .unwrap();
    let path = write_workflow(
        &dir,
        "main.flow.md",
        r#"---
name: main
safe-outputs:
  create-issue:
  add-labels:
  missing-tool: false
  dispatch-workflow:
    workflows: [nightly]
  jobs:
    deploy:
      description: Deploy the site
---
body
"#,
    );
    let compiled = compile_file(&path, &CompileOptions::default()).unwrap();

    let mut names: Vec<&str> = compiled.tools.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "add-labels",
            "create-issue",
            "deploy",
            "dispatch-workflow",
            "nightly"
        ]
    );

    // no duplicates
    let mut deduped = names.clone();
    deduped.dedup();
    assert_eq!(names, deduped);
}

#[test]
fn test_inheritance_order_imports_before_includes() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        &dir,
        "imported.flow.md",
        "---\nsafe-outputs:\n  add-comment:\n    max: 3\n---\n",
    );
    write_workflow(
        &dir,
        "included.flow.md",
        "---\nsafe-outputs:\n  add-comment:\n    max: 9\n  add-labels:\n---\n",
    );
    let path = write_workflow(
        &dir,
        "main.flow.md",
        r#"---
name: main
imports: [imported.flow.md]
safe-outputs:
  create-issue:
---
body

@include included.flow.md
"#,
    );
    let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
    let config = compiled.safe_outputs.unwrap();

    // the import declared add-comment first, so it wins over the include
    assert_eq!(config.add_comment.as_ref().unwrap().max, 3);
    // the include still fills the add-labels gap
    assert!(config.is_enabled(CapabilityKind::AddLabels));
    // main's declaration is untouched
    assert!(config.is_enabled(CapabilityKind::CreateIssue));
}

// ============================================================================
// Schema well-formedness
// ============================================================================

#[test]
fn test_generated_tool_schemas_are_valid_json_schema() {
    let dir = TempDir::new().unwrap();
    let mut yaml = String::from("---\nname: everything\nsafe-outputs:\n");
    for kind in CapabilityKind::all() {
        yaml.push_str(&format!("  {}:\n", kind.id()));
    }
    yaml.push_str("---\nbody\n");
    let path = write_workflow(&dir, "everything.flow.md", &yaml);

    let compiled = compile_file(&path, &CompileOptions::default()).unwrap();
    assert_eq!(compiled.tools.len(), CapabilityKind::all().len());

    for tool in &compiled.tools {
        let schema = JSONSchema::compile(&tool.input_schema)
            .unwrap_or_else(|e| panic!("invalid schema for {}: {}", tool.name, e));
        // a sample instance with unknown properties must be rejected
        let bogus = serde_json::json!({ "definitely_not_declared": 1 });
        assert!(
            !schema.is_valid(&bogus),
            "{} schema accepts undeclared properties",
            tool.name
        );
    }
}

#[test]
fn test_create_issue_schema_accepts_valid_input() {
    let config = parse_config("create-issue:\nmissing-tool: false");
    let tools =
        flowforge::safe_outputs::tools::generate_tools(&config, std::path::Path::new("."));
    let schema = JSONSchema::compile(&tools[0].input_schema).unwrap();

    let valid = serde_json::json!({
        "title": "Weekly report",
        "body": "All good.",
        "labels": ["automation"]
    });
    assert!(schema.is_valid(&valid));

    let missing_title = serde_json::json!({ "body": "no title" });
    assert!(!schema.is_valid(&missing_title));
}
