//! Markdown + frontmatter document loading
//!
//! A workflow file is a markdown body preceded by a `---` delimited
//! YAML frontmatter block. Configuration can be inherited from other
//! files two ways: a frontmatter `imports:` list, and `@include`
//! directives in the markdown body. Imports are scanned before
//! includes, each in declaration order.

use crate::error::CompileError;
use crate::value::ConfigMap;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// A parsed workflow source file
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub frontmatter: Mapping,
    pub markdown: String,
}

impl Document {
    /// Typed view over the frontmatter
    pub fn config(&self) -> ConfigMap<'_> {
        ConfigMap::from_mapping(&self.frontmatter)
    }
}

/// Split `---` frontmatter from the markdown body
pub fn parse_document(text: &str, path: &Path) -> Result<Document, CompileError> {
    let mut lines = text.lines();
    match lines.next() {
        Some(line) if line.trim_end() == "---" => {}
        _ => {
            return Err(CompileError::MissingFrontmatter {
                path: path.display().to_string(),
            })
        }
    }

    let mut frontmatter_lines = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim_end() == "---" {
            closed = true;
            break;
        }
        frontmatter_lines.push(line);
    }
    if !closed {
        return Err(CompileError::MissingFrontmatter {
            path: path.display().to_string(),
        });
    }

    let frontmatter_text = frontmatter_lines.join("\n");
    let value: Value = serde_yaml::from_str(&frontmatter_text)?;
    let frontmatter = match value {
        Value::Mapping(m) => m,
        Value::Null => Mapping::new(),
        _ => {
            return Err(CompileError::FrontmatterNotMapping {
                path: path.display().to_string(),
            })
        }
    };

    let markdown: String = lines.collect::<Vec<_>>().join("\n");

    Ok(Document {
        path: path.to_path_buf(),
        frontmatter,
        markdown,
    })
}

/// Read and parse a workflow file from disk
pub fn load_document(path: &Path) -> Result<Document, CompileError> {
    let text = std::fs::read_to_string(path)?;
    parse_document(&text, path)
}

/// `@include path` directives in the markdown body, in order
pub fn include_paths(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .filter_map(|line| line.trim().strip_prefix("@include "))
        .map(|rest| rest.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Resolve inherited documents: `imports:` entries first, then
/// `@include` directives, each in declaration order. Paths are
/// relative to the importing file.
pub fn resolve_inherited(doc: &Document) -> Result<Vec<Document>, CompileError> {
    let base = doc.path.parent().unwrap_or_else(|| Path::new("."));
    let mut refs: Vec<String> = doc.config().str_list("imports").unwrap_or_default();
    refs.extend(include_paths(&doc.markdown));

    let mut out = Vec::new();
    for reference in refs {
        let target = base.join(&reference);
        if !target.is_file() {
            return Err(CompileError::ImportNotFound {
                import: reference,
                path: doc.path.display().to_string(),
            });
        }
        out.push(load_document(&target)?);
    }
    Ok(out)
}
