//! Resolved workflow aggregate
//!
//! Carries the workflow-level facts the job builders need for
//! environment wiring: derived name, engine identity, declared
//! permissions, and the execution pool.

use crate::frontmatter::Document;
use crate::job::RunsOn;
use crate::permissions::{Level, Permissions, Scope};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

/// Default AI execution engine when the frontmatter names none
pub const DEFAULT_ENGINE: &str = "copilot";

/// Job key of the hosting (agent) job in the generated document
pub const HOSTING_JOB: &str = "agent";

static NAME_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

#[derive(Debug, Clone)]
pub struct WorkflowData {
    /// Derived workflow name (frontmatter `name:` or file stem)
    pub name: String,
    pub engine: String,
    /// Permissions declared for the hosting job; minimal read set
    /// when the frontmatter declares none
    pub permissions: Permissions,
    pub runs_on: RunsOn,
    /// Directory holding sibling compiled workflows, for
    /// dispatch-target validation
    pub workflows_dir: PathBuf,
}

impl WorkflowData {
    pub fn from_document(doc: &Document) -> Self {
        let cfg = doc.config();
        let name = cfg
            .str("name")
            .unwrap_or_else(|| derive_name(&doc.path.display().to_string()));
        let engine = cfg
            .str("engine")
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());
        let permissions = cfg
            .value("permissions")
            .and_then(|v| parse_declared_permissions(v))
            .unwrap_or_else(|| Permissions::of([(Scope::Contents, Level::Read)]));
        let runs_on = cfg
            .value("runs-on")
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
            .unwrap_or_default();
        let workflows_dir = doc
            .path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        WorkflowData {
            name,
            engine,
            permissions,
            runs_on,
            workflows_dir,
        }
    }
}

/// Derive a workflow name from its file path: stem, lowercased,
/// non-alphanumeric runs collapsed to single dashes.
pub fn derive_name(path: &str) -> String {
    let stem = std::path::Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    let stem = stem
        .trim_end_matches(".md")
        .trim_end_matches(".flow")
        .to_lowercase();
    NAME_SANITIZER
        .replace_all(&stem, "-")
        .trim_matches('-')
        .to_string()
}

/// Declared permissions: shorthand string or scope→level mapping.
/// Unknown scopes and levels are dropped.
fn parse_declared_permissions(value: &serde_yaml::Value) -> Option<Permissions> {
    match value {
        serde_yaml::Value::String(s) => match s.as_str() {
            "read-all" => Some(Permissions::read_all()),
            "write-all" => Some(Permissions::write_all()),
            "none" => Some(Permissions::none()),
            _ => None,
        },
        serde_yaml::Value::Mapping(m) => {
            let mut perms = Permissions::empty();
            for (k, v) in m {
                let (Some(scope), Some(level)) = (k.as_str(), v.as_str()) else {
                    continue;
                };
                let Some(scope) = Scope::all().iter().find(|s| s.as_str() == scope) else {
                    continue;
                };
                let level = match level {
                    "read" => Level::Read,
                    "write" => Level::Write,
                    "none" => Level::None,
                    _ => continue,
                };
                perms.grant(*scope, level);
            }
            Some(perms)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parse_document;
    use std::path::Path;

    #[test]
    fn test_derive_name() {
        assert_eq!(derive_name("Weekly Triage.flow.md"), "weekly-triage");
        assert_eq!(derive_name("ci/nightly_scan.flow.md"), "nightly-scan");
    }

    #[test]
    fn test_from_document_defaults() {
        let doc = parse_document(
            "---\nsafe-outputs:\n  create-issue:\n---\nbody",
            Path::new("auto triage.flow.md"),
        )
        .unwrap();
        let wf = WorkflowData::from_document(&doc);
        assert_eq!(wf.name, "auto-triage");
        assert_eq!(wf.engine, DEFAULT_ENGINE);
        assert_eq!(wf.permissions.to_lines(), vec!["contents: read"]);
    }

    #[test]
    fn test_declared_permissions_mapping() {
        let doc = parse_document(
            "---\npermissions:\n  contents: read\n  models: read\n  bogus: write\n---\n",
            Path::new("x.flow.md"),
        )
        .unwrap();
        let wf = WorkflowData::from_document(&doc);
        assert_eq!(
            wf.permissions.to_lines(),
            vec!["contents: read", "models: read"]
        );
    }

    #[test]
    fn test_declared_permissions_shorthand() {
        let doc = parse_document(
            "---\npermissions: read-all\n---\n",
            Path::new("x.flow.md"),
        )
        .unwrap();
        let wf = WorkflowData::from_document(&doc);
        assert_eq!(wf.permissions, Permissions::read_all());
    }
}
