//! Expansion of declared file lists against a group directory.

use crate::error::{CacheError, Result};
use crate::group::{Member, Source};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Expands pattern members against `listing`.
///
/// Literal and remote members keep their declared positions. Each pattern
/// is replaced, in place, by the directory entries it matched, in listing
/// order. A directory entry is assigned to the first pattern that matches
/// it and is skipped entirely when a literal member already names it.
/// Patterns that match nothing are dropped.
pub fn resolve(declared: &[Member], listing: &[String]) -> Vec<Source> {
    let literals: HashSet<&str> = declared
        .iter()
        .filter_map(|m| match m {
            Member::Literal(name) => Some(name.trim()),
            _ => None,
        })
        .collect();

    let patterns: Vec<(usize, &Member)> = declared
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_pattern())
        .collect();

    let mut insertions: HashMap<usize, Vec<&str>> = HashMap::new();
    if !patterns.is_empty() {
        for entry in listing {
            let name = entry.trim();
            if literals.contains(name) {
                continue;
            }
            if let Some((index, _)) = patterns.iter().find(|(_, p)| p.matches(name)) {
                insertions.entry(*index).or_default().push(name);
            }
        }
    }

    let mut resolved = Vec::with_capacity(declared.len() + listing.len());
    for (index, member) in declared.iter().enumerate() {
        match member {
            Member::Literal(name) => resolved.push(Source::Local(name.trim().to_string())),
            Member::Remote(url) => resolved.push(Source::Remote(url.clone())),
            Member::Pattern(_) | Member::Wildcard => match insertions.remove(&index) {
                Some(files) => {
                    resolved.extend(files.into_iter().map(|f| Source::Local(f.to_string())))
                }
                None => tracing::debug!(index, "Pattern matched no files"),
            },
        }
    }
    resolved
}

/// Lists the regular files of a group directory, sorted by name.
///
/// # Errors
///
/// Returns [`CacheError::ListDirectory`] if the directory cannot be read.
pub async fn list_directory(path: &Path) -> Result<Vec<String>> {
    let list_err = |source| CacheError::ListDirectory {
        path: path.to_path_buf(),
        source,
    };

    let mut dir = tokio::fs::read_dir(path).await.map_err(list_err)?;
    let mut names = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(list_err)? {
        let is_file = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn names(sources: &[Source]) -> Vec<&str> {
        sources.iter().map(Source::name).collect()
    }

    #[test]
    fn test_literals_unchanged() {
        let declared = vec![Member::parse("b.js"), Member::parse("a.js")];
        let out = resolve(&declared, &listing(&["a.js", "b.js", "c.js"]));
        assert_eq!(names(&out), vec!["b.js", "a.js"]);
    }

    #[test]
    fn test_wildcard_expands_in_place() {
        let declared = vec![
            Member::parse("first.js"),
            Member::Wildcard,
            Member::parse("last.js"),
        ];
        let out = resolve(
            &declared,
            &listing(&["a.js", "first.js", "last.js", "Makefile", "z.js"]),
        );
        assert_eq!(
            names(&out),
            vec!["first.js", "a.js", "z.js", "last.js"]
        );
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let declared = vec![
            Member::pattern(r"^vendor\.").unwrap(),
            Member::parse("app.js"),
            Member::pattern(r"\.js$").unwrap(),
        ];
        let out = resolve(
            &declared,
            &listing(&["app.js", "util.js", "vendor.jquery.js", "vendor.lodash.js"]),
        );
        assert_eq!(
            names(&out),
            vec!["vendor.jquery.js", "vendor.lodash.js", "app.js", "util.js"]
        );
    }

    #[test]
    fn test_remote_members_keep_position() {
        let declared = vec![
            Member::parse("https://cdn.example.com/lib.js"),
            Member::Wildcard,
        ];
        let out = resolve(&declared, &listing(&["a.js"]));
        assert_eq!(out[0], Source::Remote("https://cdn.example.com/lib.js".into()));
        assert_eq!(out[1], Source::Local("a.js".into()));
    }

    #[test]
    fn test_unmatched_pattern_dropped() {
        let declared = vec![Member::parse("a.js"), Member::pattern(r"\.css$").unwrap()];
        let out = resolve(&declared, &listing(&["a.js"]));
        assert_eq!(names(&out), vec!["a.js"]);
    }

    #[tokio::test]
    async fn test_list_directory_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.js"), "b").unwrap();
        std::fs::write(dir.path().join("a.js"), "a").unwrap();
        std::fs::create_dir(dir.path().join("nested.d")).unwrap();

        let names = list_directory(dir.path()).await.unwrap();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }

    #[tokio::test]
    async fn test_list_directory_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_directory(&dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, CacheError::ListDirectory { .. }));
    }
}
