//! Entity resolution: mapping raw strings to a canonical form.
//!
//! `resolve(s) = alias(normalize(s))`. Both steps are pure, deterministic,
//! and unicode-safe.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in alias table mapping common synonyms to their canonical form.
///
/// Reproduced verbatim from the original implementation. Every key and
/// value here is already normalized (lowercased, trimmed, single-spaced) —
/// this is enforced by a test below rather than assumed.
static ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("我", "user"),
        ("i", "user"),
        ("me", "user"),
        ("myself", "user"),
        ("使用者", "user"),
        ("用戶", "user"),
        ("本人", "user"),
        ("js", "javascript"),
        ("ts", "typescript"),
        ("py", "python"),
        ("rb", "ruby"),
        ("rs", "rust"),
        ("vim", "neovim"),
        ("pg", "postgresql"),
        ("postgres", "postgresql"),
        ("mongo", "mongodb"),
        ("k8s", "kubernetes"),
        ("tf", "terraform"),
        ("gh", "github"),
        ("mac", "macos"),
        ("osx", "macos"),
        ("win", "windows"),
    ])
});

/// Lowercases, trims, and collapses internal whitespace.
///
/// Unicode-safe: operates on `char`s, not bytes, so CJK input passes
/// through unaffected apart from ASCII case folding and space collapsing.
#[must_use]
pub fn normalize(s: &str) -> String {
    let trimmed = s.trim();
    let mut result = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            if !last_was_space && !result.is_empty() {
                result.push(' ');
            }
            last_was_space = true;
        } else {
            for lc in c.to_lowercase() {
                result.push(lc);
            }
            last_was_space = false;
        }
    }
    while result.ends_with(' ') {
        result.pop();
    }
    result
}

/// Looks up a normalized string in the built-in alias table.
///
/// Unknown inputs fall through unchanged.
#[must_use]
pub fn alias(normalized: &str) -> String {
    ALIASES
        .get(normalized)
        .map_or_else(|| normalized.to_string(), |v| (*v).to_string())
}

/// Resolves a raw string to its canonical form: `alias(normalize(s))`.
///
/// Deterministic, side-effect-free, and idempotent:
/// `resolve(resolve(x)) == resolve(x)`.
#[must_use]
pub fn resolve(s: &str) -> String {
    alias(&normalize(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_trims_collapses() {
        assert_eq!(normalize("  Hello   World  "), "hello world");
        assert_eq!(normalize("PostgreSQL"), "postgresql");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_is_unicode_safe() {
        assert_eq!(normalize("  我  "), "我");
        assert_eq!(normalize("使用者"), "使用者");
    }

    #[test]
    fn resolve_maps_known_aliases() {
        assert_eq!(resolve("js"), "javascript");
        assert_eq!(resolve("  JS  "), "javascript");
        assert_eq!(resolve("我"), "user");
        assert_eq!(resolve("I"), "user");
        assert_eq!(resolve("k8s"), "kubernetes");
        assert_eq!(resolve("OSX"), "macos");
    }

    #[test]
    fn resolve_passes_through_unknown() {
        assert_eq!(resolve("Alice"), "alice");
        assert_eq!(resolve("Python"), "python");
    }

    #[test]
    fn resolve_is_idempotent() {
        for raw in ["js", "我", "Alice", "K8S", "  postgres  "] {
            let once = resolve(raw);
            let twice = resolve(&once);
            assert_eq!(once, twice, "resolve not idempotent for {raw:?}");
        }
    }

    #[test]
    fn alias_table_entries_are_normalized() {
        for (key, value) in ALIASES.iter() {
            assert_eq!(normalize(key), *key, "alias key {key:?} is not normalized");
            assert_eq!(
                normalize(value),
                *value,
                "alias value {value:?} is not normalized"
            );
        }
    }
}
