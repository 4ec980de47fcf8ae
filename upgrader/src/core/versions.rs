//! Best-effort version extraction from build manifests.
//!
//! This is ordered pattern matching, not a manifest parser: the first pattern
//! that matches wins, and anything unmatched becomes [`UNKNOWN_VERSION`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::types::{BuildToolKind, UNKNOWN_VERSION};

/// Platform (Java) and framework (Spring Boot) versions found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedVersions {
    pub platform: String,
    pub framework: String,
}

impl DetectedVersions {
    pub fn unknown() -> Self {
        Self {
            platform: UNKNOWN_VERSION.to_string(),
            framework: UNKNOWN_VERSION.to_string(),
        }
    }
}

static MAVEN_PLATFORM: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"<maven\.compiler\.source>\s*(1\.\d+|\d+)\s*</maven\.compiler\.source>",
        r"<maven\.compiler\.target>\s*(1\.\d+|\d+)\s*</maven\.compiler\.target>",
        r"<maven\.compiler\.release>\s*(\d+)\s*</maven\.compiler\.release>",
        r"<java\.version>\s*(1\.\d+|\d+)\s*</java\.version>",
    ])
});

static MAVEN_FRAMEWORK: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"<spring-boot\.version>\s*([^<\s]+)\s*</spring-boot\.version>",
        r"(?s)<artifactId>\s*spring-boot-starter-parent\s*</artifactId>.*?<version>\s*([^<\s]+)\s*</version>",
    ])
});

static GRADLE_PLATFORM: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"sourceCompatibility\s*=\s*(?:JavaVersion\.VERSION_)?['"]?(1[._]\d+|\d+)"#,
        r#"targetCompatibility\s*=\s*(?:JavaVersion\.VERSION_)?['"]?(1[._]\d+|\d+)"#,
        r"JavaLanguageVersion\.of\(\s*(\d+)\s*\)",
    ])
});

static GRADLE_FRAMEWORK: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"org\.springframework\.boot['"]?\)?\s*version\s*['"]([^'"]+)['"]"#,
        r#"spring-boot-gradle-plugin['"]?\)?\s*version\s*['"]([^'"]+)['"]"#,
        r#"spring-boot-gradle-plugin:([^'"\s)]+)"#,
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("version pattern is valid"))
        .collect()
}

/// Extract the platform and framework versions from `manifest` for `kind`.
pub fn extract_versions(kind: BuildToolKind, manifest: &str) -> DetectedVersions {
    let (platform, framework) = match kind {
        BuildToolKind::Maven => (&*MAVEN_PLATFORM, &*MAVEN_FRAMEWORK),
        BuildToolKind::Gradle => (&*GRADLE_PLATFORM, &*GRADLE_FRAMEWORK),
        BuildToolKind::Unknown => return DetectedVersions::unknown(),
    };
    DetectedVersions {
        // `JavaVersion.VERSION_1_8` is the Gradle spelling of `1.8`.
        platform: first_capture(platform, manifest).replace('_', "."),
        framework: first_capture(framework, manifest),
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> String {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}
