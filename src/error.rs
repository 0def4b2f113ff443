//! Error types with fix suggestions

use thiserror::Error;

use crate::safe_outputs::dispatch::DispatchReport;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Frontmatter errors (FORGE-010 to FORGE-012)
    // ─────────────────────────────────────────────────────────────

    #[error("FORGE-010: No frontmatter block found in '{path}'")]
    MissingFrontmatter { path: String },

    #[error("FORGE-011: Frontmatter in '{path}' is not a mapping")]
    FrontmatterNotMapping { path: String },

    #[error("FORGE-012: Cannot resolve import '{import}' from '{path}'")]
    ImportNotFound { import: String, path: String },

    // ─────────────────────────────────────────────────────────────
    // Precondition errors (FORGE-020 to FORGE-021)
    //
    // These indicate an ordering bug in the caller, not bad user
    // input: a job builder was invoked before its configuration
    // aggregate existed.
    // ─────────────────────────────────────────────────────────────

    #[error("FORGE-020: Safe outputs configuration missing while building job '{job}'")]
    MissingSafeOutputs { job: String },

    #[error("FORGE-021: Capability '{kind}' has no configuration but its job builder was invoked")]
    MissingCapability { kind: String },

    // ─────────────────────────────────────────────────────────────
    // Dispatch-target validation (FORGE-030)
    // ─────────────────────────────────────────────────────────────

    #[error("FORGE-030: Workflow dispatch validation failed:\n{0}")]
    DispatchValidation(DispatchReport),
}

impl FixSuggestion for CompileError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            CompileError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            CompileError::Io(_) => Some("Check file path and permissions"),
            CompileError::MissingFrontmatter { .. } => {
                Some("Start the file with a '---' delimited YAML frontmatter block")
            }
            CompileError::FrontmatterNotMapping { .. } => {
                Some("Frontmatter must be a YAML mapping of keys to values")
            }
            CompileError::ImportNotFound { .. } => {
                Some("Import paths are resolved relative to the importing file")
            }
            CompileError::MissingSafeOutputs { .. } | CompileError::MissingCapability { .. } => {
                Some("Build the SafeOutputsConfig before invoking job builders")
            }
            CompileError::DispatchValidation(_) => {
                Some("Compile the target workflows first, and declare a dispatch trigger in each")
            }
        }
    }
}
