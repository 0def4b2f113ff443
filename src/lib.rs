//! flowforge - compiles agentic workflow files into CI automation graphs

pub mod compiler;
pub mod error;
pub mod frontmatter;
pub mod job;
pub mod permissions;
pub mod safe_outputs;
pub mod value;
pub mod workflow_data;

pub use compiler::{compile_file, CompileOptions, CompiledWorkflow};
pub use error::{CompileError, FixSuggestion};
pub use job::{Job, RunsOn, Step};
pub use permissions::{Level, Permissions, Scope};
pub use safe_outputs::{CapabilityKind, GitHubAppConfig, SafeOutputsConfig, ToolDefinition};
pub use workflow_data::WorkflowData;
