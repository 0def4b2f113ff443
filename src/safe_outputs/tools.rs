//! Tool-schema generator
//!
//! Derives the discovery catalog the executing agent sees: one entry
//! per enabled capability kind (description rewritten to fold in live
//! configuration), one per user-defined custom job, and one per
//! cross-workflow dispatch target. Pure read-and-transform; the wire
//! format is a JSON array of `{name, description, inputSchema}`.

use super::config::SafeJobInput;
use super::registry::CapabilityKind;
use super::SafeOutputsConfig;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// One tool the agent can request at run time
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
}

/// Generate the ordered tool catalog for one compiled workflow.
/// `workflows_dir` is consulted only for dispatch-target input
/// schemas; a target that cannot be read falls back to an empty
/// schema rather than failing the generation.
pub fn generate_tools(config: &SafeOutputsConfig, workflows_dir: &Path) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    let mut seen = BTreeSet::new();

    // static catalog filtered to enabled kinds
    for kind in config.enabled_kinds() {
        let mut tool = ToolDefinition {
            name: kind.id().to_string(),
            description: kind.description().to_string(),
            input_schema: kind.input_schema(),
        };
        rewrite_for_config(&mut tool, kind, config);
        seen.insert(tool.name.clone());
        tools.push(tool);
    }

    // one synthesized entry per user-defined custom job
    for (name, job) in &config.jobs {
        if !seen.insert(name.clone()) {
            continue;
        }
        tools.push(ToolDefinition {
            name: name.clone(),
            description: job
                .description
                .clone()
                .unwrap_or_else(|| format!("Run the custom '{}' job", name)),
            input_schema: inputs_schema(job.inputs.iter()),
        });
    }

    // one synthesized entry per cross-workflow dispatch target
    if let Some(dispatch) = &config.dispatch_workflow {
        for target in &dispatch.workflows {
            if !seen.insert(target.clone()) {
                continue;
            }
            tools.push(ToolDefinition {
                name: target.clone(),
                description: format!("Trigger the '{}' workflow", target),
                input_schema: target_input_schema(workflows_dir, target),
            });
        }
    }

    tools
}

/// Serialize the catalog to its JSON wire form
pub fn to_catalog_json(tools: &[ToolDefinition]) -> String {
    serde_json::to_string_pretty(tools).unwrap_or_else(|_| "[]".to_string())
}

/// Fold live configuration into a static catalog entry: allowed
/// labels, configured target repository, and the `repo` input property
/// for kinds with a cross-repository allow-list.
fn rewrite_for_config(tool: &mut ToolDefinition, kind: CapabilityKind, config: &SafeOutputsConfig) {
    use CapabilityKind::*;

    let routing: Option<(&Option<String>, &[String])> = match kind {
        CreateIssue => config
            .create_issue
            .as_ref()
            .map(|c| (&c.target_repo, c.allowed_repos.as_slice())),
        AddComment => config
            .add_comment
            .as_ref()
            .map(|c| (&c.target_repo, c.allowed_repos.as_slice())),
        CreateDiscussion => config
            .create_discussion
            .as_ref()
            .map(|c| (&c.target_repo, c.allowed_repos.as_slice())),
        CreatePullRequest => config
            .create_pull_request
            .as_ref()
            .map(|c| (&c.target_repo, c.allowed_repos.as_slice())),
        _ => None,
    };

    let allowed_labels = match kind {
        AddLabels => config.add_labels.as_ref().map(|c| &c.allowed),
        RemoveLabels => config.remove_labels.as_ref().map(|c| &c.allowed),
        _ => None,
    };
    if let Some(allowed) = allowed_labels.filter(|a| !a.is_empty()) {
        tool.description = format!(
            "{}. Allowed labels: {}",
            tool.description,
            allowed.join(", ")
        );
    }

    let Some((target_repo, allowed_repos)) = routing else {
        return;
    };

    if let Some(repo) = target_repo {
        tool.description = format!("{}. Targets repository {} by default", tool.description, repo);
    }

    // a non-empty allow-list exposes cross-repository routing to the
    // agent; enforcement happens at run time
    if !allowed_repos.is_empty() {
        let default_target = target_repo
            .clone()
            .unwrap_or_else(|| "the current repository".to_string());
        if let Some(properties) = tool
            .input_schema
            .get_mut("properties")
            .and_then(JsonValue::as_object_mut)
        {
            properties.insert(
                "repo".to_string(),
                json!({
                    "type": "string",
                    "description": format!(
                        "Target repository in owner/repo form. Defaults to {}; must match the default target or one of: {}",
                        default_target,
                        allowed_repos.join(", ")
                    )
                }),
            );
        }
    }
}

/// Input schema for a custom job or dispatch target from declared
/// input definitions. Type mapping: choice → string+enum, boolean,
/// number, anything else → string. The required list is sorted.
fn inputs_schema<'a>(
    inputs: impl Iterator<Item = (&'a String, &'a SafeJobInput)>,
) -> JsonValue {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, input) in inputs {
        let mut property = Map::new();
        if let Some(description) = &input.description {
            property.insert("description".to_string(), json!(description));
        }
        match input.input_type.as_deref() {
            Some("choice") => {
                property.insert("type".to_string(), json!("string"));
                if !input.options.is_empty() {
                    property.insert("enum".to_string(), json!(input.options));
                }
            }
            Some("boolean") => {
                property.insert("type".to_string(), json!("boolean"));
            }
            Some("number") => {
                property.insert("type".to_string(), json!("number"));
            }
            _ => {
                property.insert("type".to_string(), json!("string"));
            }
        }
        properties.insert(name.clone(), JsonValue::Object(property));
        if input.required {
            required.push(name.clone());
        }
    }

    required.sort_unstable();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// Read a dispatch target's own trigger-input schema from its
/// compiled artifact. Any failure falls back to an empty schema.
fn target_input_schema(workflows_dir: &Path, target: &str) -> JsonValue {
    match read_target_inputs(workflows_dir, target) {
        Some(schema) => schema,
        None => {
            warn!(target, "dispatch target inputs unavailable; using empty schema");
            empty_schema()
        }
    }
}

fn read_target_inputs(workflows_dir: &Path, target: &str) -> Option<JsonValue> {
    let path = ["lock.yml", "yml"]
        .iter()
        .map(|ext| workflows_dir.join(format!("{}.{}", target, ext)))
        .find(|p| p.is_file())?;
    let text = std::fs::read_to_string(path).ok()?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&text).ok()?;

    let trigger = super::dispatch::trigger_section(&doc)?;
    let inputs = trigger
        .get("workflow_dispatch")
        .and_then(|d| d.get("inputs"))
        .and_then(serde_yaml::Value::as_mapping)?;

    let parsed: Vec<(String, SafeJobInput)> = inputs
        .iter()
        .filter_map(|(k, v)| Some((k.as_str()?.to_string(), SafeJobInput::parse(v))))
        .collect();
    Some(inputs_schema(parsed.iter().map(|(k, v)| (k, v))))
}

fn empty_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {},
        "required": [],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> SafeOutputsConfig {
        SafeOutputsConfig::parse(&serde_yaml::from_str(yaml).unwrap())
    }

    fn names(tools: &[ToolDefinition]) -> Vec<&str> {
        tools.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_catalog_exactness() {
        let config = parse(
            r#"
create-issue:
add-comment:
missing-tool: false
jobs:
  deploy:
    description: Deploy the site
dispatch-workflow:
  workflows: [nightly-scan]
"#,
        );
        let tools = generate_tools(&config, Path::new("/nonexistent"));
        assert_eq!(
            names(&tools),
            vec![
                "create-issue",
                "add-comment",
                "dispatch-workflow",
                "deploy",
                "nightly-scan"
            ]
        );
    }

    #[test]
    fn test_disabled_kinds_have_no_entry() {
        let config = parse("create-issue:\nmissing-tool: false");
        let tools = generate_tools(&config, Path::new("."));
        assert_eq!(names(&tools), vec!["create-issue"]);
    }

    #[test]
    fn test_no_duplicate_names() {
        // a custom job shadowing a kind name is dropped
        let config = parse(
            "create-issue:\nmissing-tool: false\njobs:\n  create-issue:\n    description: dup",
        );
        let tools = generate_tools(&config, Path::new("."));
        assert_eq!(names(&tools), vec!["create-issue"]);
    }

    #[test]
    fn test_description_rewriting() {
        let config = parse(
            "add-labels:\n  allowed: [bug, triage]\nmissing-tool: false",
        );
        let tools = generate_tools(&config, Path::new("."));
        assert!(tools[0].description.contains("Allowed labels: bug, triage"));
    }

    #[test]
    fn test_repo_property_injection() {
        let config = parse(
            r#"
create-issue:
  target-repo: acme/tracker
  allowed-repos: [acme/tracker, acme/docs]
missing-tool: false
"#,
        );
        let tools = generate_tools(&config, Path::new("."));
        let schema = &tools[0].input_schema;
        let repo = &schema["properties"]["repo"];
        assert_eq!(repo["type"], "string");
        let desc = repo["description"].as_str().unwrap();
        assert!(desc.contains("acme/tracker"));
        assert!(desc.contains("acme/docs"));
        assert!(tools[0].description.contains("acme/tracker"));
    }

    #[test]
    fn test_no_repo_property_without_allow_list() {
        let config = parse("create-issue:\nmissing-tool: false");
        let tools = generate_tools(&config, Path::new("."));
        assert!(tools[0].input_schema["properties"]["repo"].is_null());
    }

    #[test]
    fn test_custom_job_input_type_mapping() {
        let config = parse(
            r#"
missing-tool: false
jobs:
  deploy:
    inputs:
      environment:
        type: choice
        required: true
        options: [staging, production]
      dry-run:
        type: boolean
      replicas:
        type: number
      note: {}
"#,
        );
        let tools = generate_tools(&config, Path::new("."));
        let schema = &tools[0].input_schema;
        assert_eq!(schema["properties"]["environment"]["type"], "string");
        assert_eq!(
            schema["properties"]["environment"]["enum"],
            json!(["staging", "production"])
        );
        assert_eq!(schema["properties"]["dry-run"]["type"], "boolean");
        assert_eq!(schema["properties"]["replicas"]["type"], "number");
        assert_eq!(schema["properties"]["note"]["type"], "string");
        assert_eq!(schema["required"], json!(["environment"]));
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_dispatch_target_schema_from_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("nightly-scan.lock.yml"),
            r#"
name: nightly-scan
on:
  workflow_dispatch:
    inputs:
      depth:
        type: number
        required: true
jobs: {}
"#,
        )
        .unwrap();
        let config = parse(
            "missing-tool: false\ndispatch-workflow:\n  workflows: [nightly-scan]",
        );
        let tools = generate_tools(&config, dir.path());
        let target = tools
            .iter()
            .find(|t| t.name == "nightly-scan")
            .unwrap();
        assert_eq!(target.input_schema["properties"]["depth"]["type"], "number");
        assert_eq!(target.input_schema["required"], json!(["depth"]));
    }

    #[test]
    fn test_dispatch_target_fallback_empty_schema() {
        let config = parse(
            "missing-tool: false\ndispatch-workflow:\n  workflows: [ghost]",
        );
        let tools = generate_tools(&config, Path::new("/nonexistent"));
        let target = tools.iter().find(|t| t.name == "ghost").unwrap();
        assert_eq!(target.input_schema, empty_schema());
    }

    #[test]
    fn test_catalog_json_wire_format() {
        let config = parse("create-issue:\nmissing-tool: false");
        let tools = generate_tools(&config, Path::new("."));
        let json = to_catalog_json(&tools);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["name"], "create-issue");
        assert!(parsed[0]["inputSchema"]["properties"].is_object());
    }
}
