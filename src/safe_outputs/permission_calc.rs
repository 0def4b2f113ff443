//! Permission calculator
//!
//! Maps the set of enabled capability kinds to the minimal permission
//! set required to execute them: the per-scope union of each kind's
//! minimal table entry. Union is commutative, so the result is
//! independent of enumeration order.

use super::registry::CapabilityKind;
use super::SafeOutputsConfig;
use crate::permissions::{Level, Permissions, Scope};

/// Minimal permissions for one kind, with its conditional variants
/// applied from the kind's own sub-options.
pub fn min_permissions(kind: CapabilityKind, config: &SafeOutputsConfig) -> Permissions {
    let mut perms = Permissions::of(kind.base_permissions().iter().copied());

    // pull-request creation needs issue-write access only for its
    // fallback-to-issue path
    if kind == CapabilityKind::CreatePullRequest {
        let fallback = config
            .create_pull_request
            .as_ref()
            .map(|c| c.fallback_as_issue)
            .unwrap_or(true);
        if fallback {
            perms.grant(Scope::Issues, Level::Write);
        }
    }

    perms
}

/// Union of the minimal permission sets of every enabled kind
pub fn compute_permissions(config: &SafeOutputsConfig) -> Permissions {
    let mut acc = Permissions::empty();
    for kind in config.enabled_kinds() {
        acc.union(&min_permissions(kind, config));
    }
    acc
}
