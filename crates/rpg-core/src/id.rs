//! Identifier generation for graph entities.
//!
//! Node ids are never chosen by the caller directly: a free-form hint is
//! slugified and de-duplicated with a numeric suffix. Edge ids are either
//! supplied by the caller (for idempotent retry) or derived from the two
//! endpoints.

use crate::edge::Endpoint;

/// Fallback slug used when a hint contains no usable characters.
pub const DEFAULT_SLUG: &str = "node";

/// Converts a human hint into a slug: lowercase ASCII alphanumerics with every
/// other run of characters collapsed into a single `-`.
pub fn slugify(hint: &str) -> String {
    let mut slug = String::with_capacity(hint.len());
    let mut pending_dash = false;
    for ch in hint.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

/// Generates a node id from `hint` that `is_taken` does not report as used.
///
/// The bare slug is preferred; on collision `-2`, `-3`, ... are tried in
/// order and the first free one wins.
pub fn unique_node_id(hint: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let base = slugify(hint);
    if !is_taken(&base) {
        return base;
    }
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Derives the default edge id for a connection.
pub fn derive_edge_id(from: &Endpoint, to: &Endpoint) -> String {
    format!("{}.{}->{}.{}", from.node, from.port, to.node, to.port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  User Auth / Login  "), "user-auth-login");
        assert_eq!(slugify("HTTP_Client"), "http-client");
        assert_eq!(slugify("v2 API"), "v2-api");
    }

    #[test]
    fn slugify_empty_hint_falls_back() {
        assert_eq!(slugify(""), DEFAULT_SLUG);
        assert_eq!(slugify("***"), DEFAULT_SLUG);
    }

    #[test]
    fn unique_id_appends_first_free_suffix() {
        let taken = ["parser", "parser-2"];
        let id = unique_node_id("Parser", |c| taken.contains(&c));
        assert_eq!(id, "parser-3");
    }

    #[test]
    fn unique_id_prefers_bare_slug() {
        let id = unique_node_id("Parser", |_| false);
        assert_eq!(id, "parser");
    }

    #[test]
    fn derived_edge_id_names_both_endpoints() {
        let from = Endpoint::new("a", "out");
        let to = Endpoint::new("b", "in");
        assert_eq!(derive_edge_id(&from, &to), "a.out->b.in");
    }

    proptest! {
        #[test]
        fn slug_is_always_well_formed(hint in ".{0,40}") {
            let slug = slugify(&hint);
            prop_assert!(!slug.is_empty());
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        #[test]
        fn slugify_is_idempotent(hint in ".{0,40}") {
            let once = slugify(&hint);
            prop_assert_eq!(slugify(&once), once);
        }
    }
}
