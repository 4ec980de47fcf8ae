//! Naming and change-request text derived from run state.

use crate::core::excerpt;
use crate::core::state::RunState;
use crate::core::types::UNKNOWN_VERSION;

/// Upgrade domain embedded in derived feature-branch names.
pub const UPGRADE_DOMAIN: &str = "java-springboot";

/// Characters of the latest build error quoted in a failing change request.
const ERROR_EXCERPT_CHARS: usize = 4_000;

/// Derive `upgrade-<domain>-<target|latest>`.
///
/// The target hint is free-form, so it is lower-cased and anything outside
/// `[a-z0-9._-]` collapses to `-`. A derived name never equals `base_branch`.
pub fn default_branch_name(target_version: Option<&str>, base_branch: &str) -> String {
    let slug = target_version.map(slugify).filter(|s| !s.is_empty());
    let name = format!(
        "upgrade-{UPGRADE_DOMAIN}-{}",
        slug.as_deref().unwrap_or("latest")
    );
    if name == base_branch {
        format!("{name}-auto")
    } else {
        name
    }
}

fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        let keep = c.is_ascii_alphanumeric() || c == '.' || c == '_';
        if keep && !(c == '.' && out.ends_with('.')) {
            out.push(c);
        } else if !keep && !out.ends_with('-') {
            out.push('-');
        }
    }
    let mut slug = out.trim_matches(|c| c == '-' || c == '.');
    while let Some(stripped) = slug.strip_suffix(".lock") {
        slug = stripped.trim_end_matches(['-', '.']);
    }
    slug.to_string()
}

pub fn commit_message(state: &RunState) -> String {
    format!(
        "Automated upgrade: Java {} -> {}",
        state.platform_version,
        state.target_label()
    )
}

/// Title naming each upgraded component whose current version is known.
///
/// The target is attached to whichever component the hint mentions.
pub fn change_request_title(platform: &str, framework: &str, target: Option<&str>) -> String {
    let hint = target.map(str::to_lowercase).unwrap_or_default();
    let mut parts = Vec::new();

    if is_known(platform) {
        match target {
            Some(t) if hint.contains("java") => {
                parts.push(format!("Upgrade Java from {platform} to {t}"));
            }
            _ => parts.push(format!("Upgrade Java from {platform}")),
        }
    }
    if is_known(framework) {
        match target {
            Some(t) if hint.contains("spring") => {
                parts.push(format!("Upgrade Spring Boot from {framework} to {t}"));
            }
            _ => parts.push(format!("Upgrade Spring Boot from {framework}")),
        }
    }

    if parts.is_empty() {
        return match target {
            Some(t) => format!("Automated upgrade to {t}"),
            None => "Automated project upgrade".to_string(),
        };
    }
    parts.join(" and ")
}

fn is_known(version: &str) -> bool {
    !version.is_empty() && version != UNKNOWN_VERSION
}

/// Markdown body for the change request.
pub fn change_request_body(state: &RunState) -> String {
    let mut body = Vec::new();
    body.push("## Automated Java/Spring Boot Upgrade".to_string());
    body.push(String::new());
    body.push("This change was prepared by an automated upgrade agent.".to_string());
    body.push(String::new());
    body.push("### Summary".to_string());
    body.push(if state.summary.trim().is_empty() {
        "_No summary was recorded._".to_string()
    } else {
        state.summary.clone()
    });
    body.push(String::new());
    body.push("### OpenRewrite Recipes Applied".to_string());
    if state.recipes.is_empty() {
        body.push("- No recipes were applied".to_string());
    } else {
        body.extend(state.recipes.iter().map(|r| format!("- `{r}`")));
    }
    body.push(String::new());
    body.push(format!("### Troubleshooting Attempts: {}", state.attempt));
    body.push(String::new());

    if state.flags.build_succeeded {
        body.push("### Build Status: passing".to_string());
    } else {
        body.push(format!(
            "### Build Status: failing after {} of {} attempts",
            state.attempt,
            state.params().max_attempts
        ));
        if let Some(latest) = state.build_errors.last() {
            body.push(String::new());
            body.push("Latest build errors (tail):".to_string());
            body.push("```".to_string());
            body.push(excerpt::tail(latest, ERROR_EXCERPT_CHARS).trim().to_string());
            body.push("```".to_string());
        }
    }

    body.push(String::new());
    body.push("### Review Notes".to_string());
    body.push("- Review the changes carefully before merging".to_string());
    body.push("- Consider running additional manual tests".to_string());
    body.push("- The upgrade may include breaking changes; check the migration guides".to_string());
    body.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{RunParams, validate_branch_name};

    #[test]
    fn branch_name_defaults_to_latest() {
        assert_eq!(default_branch_name(None, "main"), "upgrade-java-springboot-latest");
        assert_eq!(
            default_branch_name(Some("  "), "main"),
            "upgrade-java-springboot-latest"
        );
        assert_eq!(default_branch_name(Some("17"), "main"), "upgrade-java-springboot-17");
    }

    #[test]
    fn branch_name_slugifies_free_form_targets() {
        assert_eq!(
            default_branch_name(Some("Spring Boot 3.2"), "main"),
            "upgrade-java-springboot-spring-boot-3.2"
        );
        assert_eq!(
            default_branch_name(Some("java/21!"), "main"),
            "upgrade-java-springboot-java-21"
        );
    }

    #[test]
    fn branch_name_collapses_dot_runs() {
        let name = default_branch_name(Some("1...2"), "main");
        assert_eq!(name, "upgrade-java-springboot-1.2");
        validate_branch_name(&name).expect("valid branch");
    }

    #[test]
    fn branch_name_drops_lock_suffix() {
        let name = default_branch_name(Some("foo.lock"), "main");
        assert_eq!(name, "upgrade-java-springboot-foo");
        validate_branch_name(&name).expect("valid branch");
        assert_eq!(
            default_branch_name(Some("v1.lock"), "main"),
            "upgrade-java-springboot-v1"
        );
        assert_eq!(
            default_branch_name(Some("a.lock.lock"), "main"),
            "upgrade-java-springboot-a"
        );
    }

    #[test]
    fn branch_name_never_equals_base() {
        let name = default_branch_name(Some("17"), "upgrade-java-springboot-17");
        assert_eq!(name, "upgrade-java-springboot-17-auto");
        assert_ne!(
            default_branch_name(None, "upgrade-java-springboot-latest"),
            "upgrade-java-springboot-latest"
        );
    }

    #[test]
    fn title_mentions_known_components() {
        assert_eq!(
            change_request_title("11", "2.7.0", Some("Java 17")),
            "Upgrade Java from 11 to Java 17 and Upgrade Spring Boot from 2.7.0"
        );
        assert_eq!(
            change_request_title("unknown", "2.7.0", Some("Spring Boot 3.2")),
            "Upgrade Spring Boot from 2.7.0 to Spring Boot 3.2"
        );
    }

    #[test]
    fn title_falls_back_when_nothing_known() {
        assert_eq!(
            change_request_title("unknown", "unknown", Some("21")),
            "Automated upgrade to 21"
        );
        assert_eq!(
            change_request_title("unknown", "unknown", None),
            "Automated project upgrade"
        );
    }

    #[test]
    fn body_reports_failing_build_with_error_excerpt() {
        let mut params = RunParams::new("https://github.com/acme/demo", "main");
        params.max_attempts = 2;
        let mut state = RunState::new(params).expect("state");
        state.note("Strategy: go to 17");
        state.recipes.insert("org.openrewrite.java.migrate.UpgradeToJava17");
        state.attempt = 2;
        state.add_build_error("[ERROR] cannot find symbol");

        let body = change_request_body(&state);
        assert!(body.contains("Strategy: go to 17"));
        assert!(body.contains("- `org.openrewrite.java.migrate.UpgradeToJava17`"));
        assert!(body.contains("### Troubleshooting Attempts: 2"));
        assert!(body.contains("failing after 2 of 2 attempts"));
        assert!(body.contains("cannot find symbol"));
    }

    #[test]
    fn body_reports_passing_build_without_errors() {
        let mut state =
            RunState::new(RunParams::new("https://github.com/acme/demo", "main")).expect("state");
        state.flags.build_succeeded = true;
        let body = change_request_body(&state);
        assert!(body.contains("### Build Status: passing"));
        assert!(body.contains("- No recipes were applied"));
    }

    #[test]
    fn commit_message_uses_target_label() {
        let mut state =
            RunState::new(RunParams::new("https://github.com/acme/demo", "main")).expect("state");
        state.platform_version = "11".to_string();
        assert_eq!(commit_message(&state), "Automated upgrade: Java 11 -> latest");
    }
}
