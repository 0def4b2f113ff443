//! Installation-credential minting and guaranteed revocation
//!
//! Jobs that opt into app-token minting get a Mint step prepended and
//! a Revoke step appended. The token is scoped to exactly the
//! permission scopes the consuming job computed for itself, and its
//! lifetime never exceeds the job's own execution window: the revoke
//! step runs on every exit path, including prior-step failure.

use crate::job::Step;
use crate::permissions::Permissions;
use crate::value::ConfigMap;
use serde_yaml::Value;

/// Step id the minted token is read back from
pub const MINT_STEP_ID: &str = "app_token";

/// Expression resolving to the minted token inside the same job
pub fn minted_token_expr() -> String {
    format!("${{{{ steps.{}.outputs.token }}}}", MINT_STEP_ID)
}

/// Installation-credential minting configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitHubAppConfig {
    pub app_id: String,
    /// Secret expression reference, never key material
    pub private_key: String,
    /// Owner override; the current repository's owner when unset
    pub owner: Option<String>,
    /// Repository scope list. `["*"]` means do not scope (grant
    /// organization-wide access); empty means scope to the current
    /// repository only.
    pub repositories: Vec<String>,
}

impl GitHubAppConfig {
    pub fn parse(value: &Value) -> Self {
        let cfg = ConfigMap::new(value);
        GitHubAppConfig {
            app_id: cfg.str("app-id").unwrap_or_default(),
            private_key: cfg.str("private-key").unwrap_or_default(),
            owner: cfg.str("owner"),
            repositories: cfg.str_list("repositories").unwrap_or_default(),
        }
    }

    /// A config is usable only with both an app id and a key reference
    pub fn is_valid(&self) -> bool {
        !self.app_id.is_empty() && !self.private_key.is_empty()
    }

    fn wildcard_scope(&self) -> bool {
        self.repositories.iter().any(|r| r == "*")
    }
}

/// Mint step: requests a short-lived installation token scoped to
/// exactly the consuming job's own permission set.
pub fn mint_step(app: &GitHubAppConfig, job_permissions: &Permissions) -> Step {
    let mut step = Step::uses(
        "Mint installation token",
        "actions/create-github-app-token@v2",
    )
    .with_id(MINT_STEP_ID)
    .with_input("app-id", &app.app_id)
    .with_input("private-key", &app.private_key)
    .with_input(
        "owner",
        app.owner
            .clone()
            .unwrap_or_else(|| "${{ github.repository_owner }}".to_string()),
    );

    if !app.wildcard_scope() {
        let repositories = if app.repositories.is_empty() {
            "${{ github.event.repository.name }}".to_string()
        } else {
            app.repositories.join(",")
        };
        step = step.with_input("repositories", repositories);
    }

    // sorted scope inputs keep the rendered step deterministic
    for (scope, level) in job_permissions.entries() {
        step = step.with_input(format!("permission-{}", scope), level.to_string());
    }

    step
}

/// Revoke step: scheduled unconditionally, acts only when a token was
/// in fact minted, and never fails the job.
pub fn revoke_step() -> Step {
    let script = r#"if [ -z "$APP_TOKEN" ]; then
  echo "no installation token was minted"
  exit 0
fi
if curl -sf -X DELETE \
  -H "Authorization: token $APP_TOKEN" \
  -H "Accept: application/vnd.github+json" \
  "$GITHUB_API_URL/installation/token"; then
  echo "installation token revoked"
else
  echo "::warning::failed to revoke installation token (it may have expired already)"
fi"#;

    Step::run("Revoke installation token", script)
        .when("always()")
        .with_env("APP_TOKEN", minted_token_expr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Level, Scope};

    fn v(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_and_validity() {
        let app = GitHubAppConfig::parse(&v(
            "app-id: '12345'\nprivate-key: ${{ secrets.APP_KEY }}",
        ));
        assert!(app.is_valid());

        let app = GitHubAppConfig::parse(&v("app-id: '12345'"));
        assert!(!app.is_valid());
    }

    #[test]
    fn test_mint_step_scope_inputs_sorted() {
        let app = GitHubAppConfig {
            app_id: "1".to_string(),
            private_key: "${{ secrets.K }}".to_string(),
            ..Default::default()
        };
        let perms = Permissions::of([
            (Scope::Issues, Level::Write),
            (Scope::Contents, Level::Read),
        ]);
        let step = mint_step(&app, &perms);
        let keys: Vec<&String> = step
            .with
            .keys()
            .filter(|k| k.starts_with("permission-"))
            .collect();
        assert_eq!(keys, ["permission-contents", "permission-issues"]);
        assert_eq!(
            step.with.get("permission-issues").map(String::as_str),
            Some("write")
        );
    }

    #[test]
    fn test_wildcard_omits_repositories() {
        let app = GitHubAppConfig {
            app_id: "1".to_string(),
            private_key: "k".to_string(),
            repositories: vec!["*".to_string()],
            ..Default::default()
        };
        let step = mint_step(&app, &Permissions::empty());
        assert!(!step.with.contains_key("repositories"));
    }

    #[test]
    fn test_unset_repositories_scope_to_current() {
        let app = GitHubAppConfig {
            app_id: "1".to_string(),
            private_key: "k".to_string(),
            ..Default::default()
        };
        let step = mint_step(&app, &Permissions::empty());
        assert_eq!(
            step.with.get("repositories").map(String::as_str),
            Some("${{ github.event.repository.name }}")
        );
    }

    #[test]
    fn test_explicit_repositories_kept() {
        let app = GitHubAppConfig {
            app_id: "1".to_string(),
            private_key: "k".to_string(),
            repositories: vec!["acme/api".to_string(), "acme/web".to_string()],
            ..Default::default()
        };
        let step = mint_step(&app, &Permissions::empty());
        assert_eq!(
            step.with.get("repositories").map(String::as_str),
            Some("acme/api,acme/web")
        );
    }

    #[test]
    fn test_owner_defaults_to_repository_owner() {
        let app = GitHubAppConfig {
            app_id: "1".to_string(),
            private_key: "k".to_string(),
            ..Default::default()
        };
        let step = mint_step(&app, &Permissions::empty());
        assert_eq!(
            step.with.get("owner").map(String::as_str),
            Some("${{ github.repository_owner }}")
        );
    }

    #[test]
    fn test_revoke_step_runs_always() {
        let step = revoke_step();
        assert_eq!(step.if_cond.as_deref(), Some("always()"));
        assert!(step.run.as_ref().unwrap().contains("DELETE"));
    }
}
