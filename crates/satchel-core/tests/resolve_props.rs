//! Property tests for file list resolution and the minifiers.

use std::collections::HashSet;

use proptest::prelude::*;
use satchel_core::minify::{MarkupMinifier, ScriptMinifier, StylesheetMinifier};
use satchel_core::{resolve, Member, Minifier, Source};

/// File names like `app.js`, `a1.css` or `README`.
fn file_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}\\.(js|css|html)",
        "[a-z]{1,6}[0-9]\\.(js|css)",
        "[A-Z]{1,6}",
    ]
}

fn local_names(sources: &[Source]) -> Vec<&str> {
    sources
        .iter()
        .filter(|s| !s.is_remote())
        .map(Source::name)
        .collect()
}

proptest! {
    /// Property: literal-only file lists are returned unchanged
    #[test]
    fn prop_literals_pass_through(
        literals in prop::collection::vec(file_name_strategy(), 0..10),
        listing in prop::collection::vec(file_name_strategy(), 0..20),
    ) {
        let declared: Vec<Member> = literals.iter().map(|l| Member::parse(l)).collect();
        let resolved = resolve(&declared, &listing);

        let names = local_names(&resolved);
        let expected: Vec<&str> = literals.iter().map(String::as_str).collect();
        prop_assert_eq!(names, expected);
    }

    /// Property: a wildcard never duplicates a literal and keeps literals in place
    #[test]
    fn prop_wildcard_does_not_duplicate_literals(
        literals in prop::collection::hash_set(file_name_strategy(), 0..6),
        listing in prop::collection::hash_set(file_name_strategy(), 0..20),
    ) {
        let literals: Vec<String> = literals.into_iter().collect();
        let mut listing: Vec<String> = listing.into_iter().collect();
        listing.sort();

        let mut declared: Vec<Member> = literals.iter().map(|l| Member::parse(l)).collect();
        declared.push(Member::Wildcard);
        let resolved = resolve(&declared, &listing);
        let names = local_names(&resolved);

        let unique: HashSet<&str> = names.iter().copied().collect();
        prop_assert_eq!(unique.len(), names.len());

        for (i, literal) in literals.iter().enumerate() {
            prop_assert_eq!(names[i], literal.as_str());
        }

        // Every listed file with an extension that is not a literal shows up.
        for entry in &listing {
            if entry.contains('.') {
                prop_assert!(unique.contains(entry.as_str()));
            }
        }
    }

    /// Property: expanded files keep directory listing order
    #[test]
    fn prop_expansion_keeps_listing_order(
        listing in prop::collection::hash_set(file_name_strategy(), 0..20),
    ) {
        let mut listing: Vec<String> = listing.into_iter().collect();
        listing.sort();

        let declared = vec![Member::pattern(r"\.js$").unwrap()];
        let resolved = resolve(&declared, &listing);
        let names = local_names(&resolved);

        let expected: Vec<&str> = listing
            .iter()
            .map(String::as_str)
            .filter(|n| n.ends_with(".js"))
            .collect();
        prop_assert_eq!(names, expected);
    }

    /// Property: minifiers are total and never grow plain text
    #[test]
    fn prop_minifiers_never_grow_input(source in "[ -~\n\t]{0,400}") {
        let script = ScriptMinifier.minify(&source);
        let stylesheet = StylesheetMinifier.minify(&source);
        let markup = MarkupMinifier.minify(&source);

        prop_assert!(script.len() <= source.len());
        prop_assert!(stylesheet.len() <= source.len());
        prop_assert!(markup.len() <= source.len());
    }
}
