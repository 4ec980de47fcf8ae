//! Transformation identifiers: the accumulated recipe set and extraction of
//! recipe names from advisory narratives.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Recipes applied whenever a narrative talks about a Java release upgrade.
pub const JAVA_BASELINE: [&str; 3] = [
    "org.openrewrite.java.migrate.UpgradeToJava11",
    "org.openrewrite.java.migrate.UpgradeToJava17",
    "org.openrewrite.java.migrate.UpgradeToJava21",
];

/// Recipes applied whenever a narrative talks about Spring Boot.
pub const SPRING_BOOT_BASELINE: [&str; 4] = [
    "org.openrewrite.java.spring.boot2.UpgradeSpringBoot_2_7",
    "org.openrewrite.java.spring.boot3.UpgradeSpringBoot_3_0",
    "org.openrewrite.java.spring.boot3.UpgradeSpringBoot_3_1",
    "org.openrewrite.java.spring.boot3.UpgradeSpringBoot_3_2",
];

static RECIPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"org\.openrewrite\.[A-Za-z0-9._]+").expect("recipe pattern is valid")
});
static JAVA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bjava").expect("java pattern is valid"));
// "Java17" and "jdk21" glue the release to a word, so only the right edge is bounded.
static JAVA_RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b|[A-Za-z])(?:11|17|21)\b").expect("release pattern is valid")
});
static SPRING_BOOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bspring[ -]boot\b").expect("spring boot pattern is valid"));

/// Ordered set of transformation identifiers.
///
/// Insertion order is preserved, duplicates are ignored and nothing is ever
/// removed: re-entering the apply phase replays the whole accumulated set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecipeSet {
    ids: Vec<String>,
}

impl RecipeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` unless it is blank or already present. Returns whether it was added.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id: String = id.into();
        let id = id.trim();
        if id.is_empty() || self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    /// Add every id in order, returning how many were new.
    pub fn extend<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for id in ids {
            if self.insert(id) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RecipeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = RecipeSet::new();
        set.extend(iter);
        set
    }
}

/// Derive the recipe plan from a strategy narrative.
///
/// The curated baselines come first (Java when the text mentions Java together
/// with a known release, then Spring Boot), followed by every explicitly named
/// `org.openrewrite.*` recipe in order of appearance.
pub fn recipes_from_strategy(narrative: &str) -> RecipeSet {
    let mut recipes = RecipeSet::new();
    if JAVA_RE.is_match(narrative) && JAVA_RELEASE_RE.is_match(narrative) {
        recipes.extend(JAVA_BASELINE);
    }
    if SPRING_BOOT_RE.is_match(narrative) {
        recipes.extend(SPRING_BOOT_BASELINE);
    }
    recipes.extend(named_recipes(narrative));
    recipes
}

/// First explicitly named recipe in a fix narrative, if any.
pub fn recipe_from_fix(narrative: &str) -> Option<String> {
    named_recipes(narrative).next()
}

fn named_recipes(text: &str) -> impl Iterator<Item = String> + '_ {
    RECIPE_RE
        .find_iter(text)
        // Prose often ends a sentence right after the recipe name.
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_suppresses_duplicates_and_keeps_order() {
        let mut set = RecipeSet::new();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));
        assert!(!set.insert("  a "));
        assert!(!set.insert(""));
        assert_eq!(set.as_slice(), ["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn extend_counts_only_new_ids() {
        let mut set: RecipeSet = ["x", "y"].into_iter().collect();
        let added = set.extend(["y", "z", "x", "w"]);
        assert_eq!(added, 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["x", "y", "z", "w"]);
    }

    #[test]
    fn strategy_with_java_release_adds_java_baseline() {
        let recipes = recipes_from_strategy("Move the project to Java 17 first.");
        assert_eq!(recipes.as_slice(), JAVA_BASELINE.map(String::from));
    }

    #[test]
    fn strategy_with_release_glued_to_java_adds_java_baseline() {
        let recipes = recipes_from_strategy("Migrate the project to Java17.");
        assert_eq!(recipes.as_slice(), JAVA_BASELINE.map(String::from));
        assert_eq!(recipes_from_strategy("Target java-21 now.").len(), 3);
    }

    #[test]
    fn strategy_mentioning_java_without_release_adds_nothing() {
        let recipes = recipes_from_strategy("Java code looks fine; version 2011 is irrelevant.");
        assert!(recipes.is_empty());
    }

    #[test]
    fn strategy_merges_baselines_with_named_recipes() {
        let narrative = "Upgrade Java to 21 and Spring Boot to 3.2. \
            Apply org.openrewrite.java.spring.boot3.UpgradeSpringBoot_3_2. \
            Then run org.openrewrite.java.migrate.jakarta.JavaxMigrationToJakarta.";
        let recipes = recipes_from_strategy(narrative);

        assert_eq!(recipes.len(), 3 + 4 + 1);
        assert_eq!(recipes.as_slice()[0], JAVA_BASELINE[0]);
        assert_eq!(recipes.as_slice()[3], SPRING_BOOT_BASELINE[0]);
        assert_eq!(
            recipes.as_slice().last().map(String::as_str),
            Some("org.openrewrite.java.migrate.jakarta.JavaxMigrationToJakarta")
        );
    }

    #[test]
    fn fix_picks_first_named_recipe() {
        let fix = "Root cause: javax imports. Use org.openrewrite.java.migrate.jakarta.JavaxMigrationToJakarta, \
            or alternatively org.openrewrite.java.OrderImports.";
        assert_eq!(
            recipe_from_fix(fix).as_deref(),
            Some("org.openrewrite.java.migrate.jakarta.JavaxMigrationToJakarta")
        );
        assert_eq!(recipe_from_fix("no recipe here"), None);
    }
}
