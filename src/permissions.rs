//! Permission model for generated jobs
//!
//! A `Permissions` value is one of: empty, a named shorthand
//! (`read-all`, `write-all`, `none`), an "all scopes at level X"
//! expansion, or an explicit scope→level map. Explicit per-scope
//! entries take precedence over the "all" expansion. Rendering is
//! deterministic: scopes are emitted in alphabetical order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Access level for a single scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    None,
    Read,
    Write,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::None => write!(f, "none"),
            Level::Read => write!(f, "read"),
            Level::Write => write!(f, "write"),
        }
    }
}

/// Platform access scope.
///
/// Variants are declared in alphabetical order of their rendered name,
/// so `BTreeMap<Scope, _>` iteration is already the render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Actions,
    Attestations,
    Checks,
    Contents,
    Deployments,
    Discussions,
    IdToken,
    Issues,
    Metadata,
    Models,
    Packages,
    Pages,
    PullRequests,
    RepositoryProjects,
    SecurityEvents,
    Statuses,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Actions => "actions",
            Scope::Attestations => "attestations",
            Scope::Checks => "checks",
            Scope::Contents => "contents",
            Scope::Deployments => "deployments",
            Scope::Discussions => "discussions",
            Scope::IdToken => "id-token",
            Scope::Issues => "issues",
            Scope::Metadata => "metadata",
            Scope::Models => "models",
            Scope::Packages => "packages",
            Scope::Pages => "pages",
            Scope::PullRequests => "pull-requests",
            Scope::RepositoryProjects => "repository-projects",
            Scope::SecurityEvents => "security-events",
            Scope::Statuses => "statuses",
        }
    }

    /// Every scope, in render order
    pub fn all() -> &'static [Scope] {
        &[
            Scope::Actions,
            Scope::Attestations,
            Scope::Checks,
            Scope::Contents,
            Scope::Deployments,
            Scope::Discussions,
            Scope::IdToken,
            Scope::Issues,
            Scope::Metadata,
            Scope::Models,
            Scope::Packages,
            Scope::Pages,
            Scope::PullRequests,
            Scope::RepositoryProjects,
            Scope::SecurityEvents,
            Scope::Statuses,
        ]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named shorthand forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Shorthand {
    None,
    ReadAll,
    WriteAll,
}

impl Shorthand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shorthand::None => "none",
            Shorthand::ReadAll => "read-all",
            Shorthand::WriteAll => "write-all",
        }
    }
}

/// Minimal execution rights for one job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    shorthand: Option<Shorthand>,
    all: Option<Level>,
    scopes: BTreeMap<Scope, Level>,
}

impl Permissions {
    pub fn empty() -> Self {
        Permissions::default()
    }

    pub fn read_all() -> Self {
        Permissions {
            shorthand: Some(Shorthand::ReadAll),
            ..Default::default()
        }
    }

    pub fn write_all() -> Self {
        Permissions {
            shorthand: Some(Shorthand::WriteAll),
            ..Default::default()
        }
    }

    pub fn none() -> Self {
        Permissions {
            shorthand: Some(Shorthand::None),
            ..Default::default()
        }
    }

    /// All scopes at one level
    pub fn all_at(level: Level) -> Self {
        Permissions {
            all: Some(level),
            ..Default::default()
        }
    }

    /// Explicit scope→level map
    pub fn of(entries: impl IntoIterator<Item = (Scope, Level)>) -> Self {
        Permissions {
            scopes: entries.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shorthand.is_none() && self.all.is_none() && self.scopes.is_empty()
    }

    /// Set one scope, keeping the stronger of old and new level
    pub fn grant(&mut self, scope: Scope, level: Level) {
        let entry = self.scopes.entry(scope).or_insert(level);
        if level > *entry {
            *entry = level;
        }
    }

    /// Per-scope commutative union: write beats read beats none.
    /// Shorthand and "all" components take the stronger of both sides.
    pub fn union(&mut self, other: &Permissions) {
        self.shorthand = max_opt(self.shorthand, other.shorthand);
        self.all = max_opt(self.all, other.all);
        for (scope, level) in &other.scopes {
            self.grant(*scope, *level);
        }
    }

    /// Effective level for a scope: explicit entry first, then the
    /// "all" expansion. Shorthands are terminal render forms and are
    /// not consulted here.
    pub fn level_for(&self, scope: Scope) -> Option<Level> {
        if let Some(level) = self.scopes.get(&scope) {
            return Some(*level);
        }
        match self.all {
            // id-token never appears in a read expansion
            Some(Level::Read) if scope == Scope::IdToken => None,
            other => other,
        }
    }

    /// Rendered `scope: level` lines, alphabetical. Metadata is never
    /// rendered; id-token is dropped unless write or none.
    pub fn to_lines(&self) -> Vec<String> {
        self.render_entries()
            .into_iter()
            .map(|(scope, level)| format!("{}: {}", scope, level))
            .collect()
    }

    /// Effective (scope, level) pairs in render order, with the
    /// metadata and id-token exclusions applied
    pub fn entries(&self) -> Vec<(Scope, Level)> {
        self.render_entries()
    }

    fn render_entries(&self) -> Vec<(Scope, Level)> {
        let mut out = Vec::new();
        for &scope in Scope::all() {
            if scope == Scope::Metadata {
                continue;
            }
            let Some(level) = self.level_for(scope) else {
                continue;
            };
            if scope == Scope::IdToken && level == Level::Read {
                continue;
            }
            out.push((scope, level));
        }
        out
    }
}

fn max_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(shorthand) = self.shorthand {
            return serializer.serialize_str(shorthand.as_str());
        }
        let entries = self.render_entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (scope, level) in entries {
            map.serialize_entry(scope.as_str(), &level.to_string())?;
        }
        map.end()
    }
}
