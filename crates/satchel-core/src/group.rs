//! Asset group configuration and resolved groups.

use crate::error::{CacheError, Result};
use crate::resolve::{list_directory, resolve};
use crate::transform::{Manipulations, Pipeline};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Variant key used when a group configures no manipulations; matches every user agent.
pub const DEFAULT_VARIANT: &str = "^";

/// The kind of content a group bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum DataType {
    /// JavaScript.
    Script,
    /// CSS.
    Stylesheet,
    /// HTML fragments.
    Markup,
}

impl DataType {
    /// Returns the response content type.
    pub fn content_type(self) -> &'static str {
        match self {
            DataType::Script => "application/javascript",
            DataType::Stylesheet => "text/css",
            DataType::Markup => "text/html",
        }
    }
}

impl FromStr for DataType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "javascript" | "js" | "script" => Ok(DataType::Script),
            "css" | "stylesheet" => Ok(DataType::Stylesheet),
            "html" | "markup" => Ok(DataType::Markup),
            _ => Err(CacheError::UnknownDataType(s.to_string())),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Script => "javascript",
            DataType::Stylesheet => "css",
            DataType::Markup => "html",
        };
        f.write_str(name)
    }
}

/// A declared member of a group's file list.
#[derive(Debug, Clone)]
pub enum Member {
    /// A file name relative to the group directory.
    Literal(String),
    /// An absolute `http://` or `https://` URL.
    Remote(String),
    /// A regular expression matched against directory entries.
    Pattern(Regex),
    /// `*`: every directory entry with an extension.
    Wildcard,
}

impl Member {
    /// Classifies a plain file-list entry.
    pub fn parse(entry: &str) -> Self {
        let trimmed = entry.trim();
        if trimmed == "*" {
            Member::Wildcard
        } else if is_remote(trimmed) {
            Member::Remote(trimmed.to_string())
        } else {
            Member::Literal(trimmed.to_string())
        }
    }

    /// Builds a regular-expression member.
    pub fn pattern(expr: &str) -> Result<Self> {
        Regex::new(expr)
            .map(Member::Pattern)
            .map_err(|e| CacheError::invalid_pattern(expr, e))
    }

    /// Returns true for members that expand against the directory listing.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Member::Pattern(_) | Member::Wildcard)
    }

    pub(crate) fn matches(&self, file_name: &str) -> bool {
        match self {
            Member::Pattern(re) => re.is_match(file_name),
            Member::Wildcard => has_extension(file_name),
            Member::Literal(_) | Member::Remote(_) => false,
        }
    }
}

fn has_extension(file_name: &str) -> bool {
    // Equivalent to /\.[a-z]+$/i.
    match file_name.rfind('.') {
        Some(dot) => {
            let ext = &file_name[dot + 1..];
            !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphabetic())
        }
        None => false,
    }
}

pub(crate) fn is_remote(entry: &str) -> bool {
    entry.starts_with("http://") || entry.starts_with("https://")
}

/// A concrete, resolved group member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A file inside the group directory.
    Local(String),
    /// A remote URL.
    Remote(String),
}

impl Source {
    /// Returns the file name or URL.
    pub fn name(&self) -> &str {
        match self {
            Source::Local(name) | Source::Remote(name) => name,
        }
    }

    /// Returns true for remote members.
    pub fn is_remote(&self) -> bool {
        matches!(self, Source::Remote(_))
    }
}

/// Declared configuration of one group, before resolution.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    name: String,
    path: PathBuf,
    members: Vec<Member>,
    route: Regex,
    data_type: DataType,
    debug: bool,
    stale: bool,
    pre_manipulate: Manipulations,
    post_manipulate: Manipulations,
}

impl GroupSpec {
    /// Creates a group with an empty file list.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        route: &str,
        data_type: DataType,
    ) -> Result<Self> {
        let route = Regex::new(route).map_err(|e| CacheError::invalid_pattern(route, e))?;
        Ok(Self {
            name: name.into(),
            path: path.into(),
            members: Vec::new(),
            route,
            data_type,
            debug: false,
            stale: false,
            pre_manipulate: Manipulations::new(),
            post_manipulate: Manipulations::new(),
        })
    }

    /// Appends one member.
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Appends plain file-list entries (`*`, URLs and file names).
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.members
            .extend(files.into_iter().map(|f| Member::parse(f.as_ref())));
        self
    }

    /// Appends a regular-expression member.
    pub fn with_pattern(self, expr: &str) -> Result<Self> {
        Ok(self.with_member(Member::pattern(expr)?))
    }

    /// Serves raw concatenation instead of minified output.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Excludes the group from file-watch invalidation.
    pub fn stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }

    /// Sets the per-file transform for the given user-agent pattern.
    pub fn pre_manipulate(mut self, user_agent: &str, pipeline: Pipeline) -> Result<Self> {
        compile_variant(user_agent)?;
        self.pre_manipulate.insert(user_agent, pipeline);
        Ok(self)
    }

    /// Sets the post-minify transform for the given user-agent pattern.
    pub fn post_manipulate(mut self, user_agent: &str, pipeline: Pipeline) -> Result<Self> {
        compile_variant(user_agent)?;
        self.post_manipulate.insert(user_agent, pipeline);
        Ok(self)
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the group directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the declared members.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Returns the variant keys: the union of pre and post manipulation
    /// keys in declaration order, or the catch-all default.
    pub fn variants(&self) -> Result<Vec<Variant>> {
        let mut seen = HashSet::new();
        let keys: Vec<&str> = self
            .pre_manipulate
            .keys()
            .chain(self.post_manipulate.keys())
            .filter(|k| seen.insert(*k))
            .collect();

        if keys.is_empty() {
            return Ok(vec![Variant::new(DEFAULT_VARIANT)?]);
        }
        keys.into_iter().map(Variant::new).collect()
    }

    fn needs_listing(&self) -> bool {
        self.members.iter().any(Member::is_pattern)
    }
}

fn compile_variant(user_agent: &str) -> Result<Regex> {
    RegexBuilder::new(user_agent)
        .case_insensitive(true)
        .build()
        .map_err(|e| CacheError::invalid_pattern(user_agent, e))
}

/// One cached rendition of a group, selected by user agent.
#[derive(Debug, Clone)]
pub struct Variant {
    key: String,
    matcher: Regex,
}

impl Variant {
    /// Compiles a user-agent pattern (case-insensitive).
    pub fn new(key: &str) -> Result<Self> {
        Ok(Self {
            key: key.to_string(),
            matcher: compile_variant(key)?,
        })
    }

    /// Returns the variant key as configured.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true if the user agent selects this variant.
    pub fn matches(&self, user_agent: &str) -> bool {
        self.matcher.is_match(user_agent)
    }
}

/// A group whose file list has been resolved against its directory.
#[derive(Debug)]
pub struct Group {
    spec: GroupSpec,
    sources: Vec<Source>,
    variants: Vec<Variant>,
}

impl Group {
    /// Lists the group directory (when the group declares patterns) and
    /// resolves its file list.
    ///
    /// # Errors
    ///
    /// A directory that cannot be listed is fatal for the group.
    pub async fn resolve(spec: GroupSpec) -> Result<Self> {
        let listing = if spec.needs_listing() {
            list_directory(&spec.path).await?
        } else {
            Vec::new()
        };
        Self::from_listing(spec, &listing)
    }

    /// Resolves the file list against an already known directory listing.
    pub fn from_listing(spec: GroupSpec, listing: &[String]) -> Result<Self> {
        let sources = resolve(&spec.members, listing);
        let variants = spec.variants()?;

        tracing::debug!(
            group = %spec.name,
            files = sources.len(),
            variants = variants.len(),
            "Resolved group"
        );

        Ok(Self {
            spec,
            sources,
            variants,
        })
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Returns the group directory.
    pub fn path(&self) -> &Path {
        &self.spec.path
    }

    /// Returns true if the request path is served by this group.
    pub fn matches_route(&self, path: &str) -> bool {
        self.spec.route.is_match(path)
    }

    /// Returns the group data type.
    pub fn data_type(&self) -> DataType {
        self.spec.data_type
    }

    /// Returns true if minification is bypassed.
    pub fn is_debug(&self) -> bool {
        self.spec.debug
    }

    /// Returns true if the group is excluded from file watching.
    pub fn is_stale(&self) -> bool {
        self.spec.stale
    }

    /// Returns the resolved file list.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Returns the variants built for this group.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Returns the per-file pipeline for a variant, if any.
    pub fn pre_pipeline(&self, variant: &str) -> Option<&Pipeline> {
        self.spec.pre_manipulate.get(variant)
    }

    /// Returns the post-minify pipeline for a variant, if any.
    pub fn post_pipeline(&self, variant: &str) -> Option<&Pipeline> {
        self.spec.post_manipulate.get(variant)
    }

    /// Returns the on-disk paths of all local members.
    pub fn local_paths(&self) -> Vec<PathBuf> {
        self.sources
            .iter()
            .filter_map(|s| match s {
                Source::Local(name) => Some(self.spec.path.join(name)),
                Source::Remote(_) => None,
            })
            .collect()
    }
}

/// The process-wide, ordered set of resolved groups.
#[derive(Debug, Default)]
pub struct GroupSet {
    groups: Vec<Arc<Group>>,
}

impl GroupSet {
    /// Resolves every group.
    ///
    /// # Errors
    ///
    /// Any resolution failure aborts the whole set: a partial topology is
    /// never served.
    pub async fn resolve(specs: Vec<GroupSpec>) -> Result<Self> {
        check_unique(specs.iter().map(GroupSpec::name))?;
        let groups = futures::future::try_join_all(specs.into_iter().map(Group::resolve)).await?;
        Self::from_groups(groups)
    }

    /// Builds a set from already resolved groups.
    pub fn from_groups(groups: Vec<Group>) -> Result<Self> {
        check_unique(groups.iter().map(Group::name))?;
        Ok(Self {
            groups: groups.into_iter().map(Arc::new).collect(),
        })
    }

    /// Looks up a group by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Group>> {
        self.groups.iter().find(|g| g.name() == name)
    }

    /// Returns the first group (in declaration order) whose route matches.
    pub fn match_route(&self, path: &str) -> Option<&Arc<Group>> {
        self.groups.iter().find(|g| g.matches_route(path))
    }

    /// Iterates groups in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Group>> {
        self.groups.iter()
    }

    /// Returns the number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no groups are configured.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CacheError::DuplicateGroup(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> GroupSpec {
        GroupSpec::new(name, "/tmp/assets", r"^/js/app\.js", DataType::Script).unwrap()
    }

    #[test]
    fn test_data_type_parse() {
        assert_eq!("JavaScript".parse::<DataType>().unwrap(), DataType::Script);
        assert_eq!("js".parse::<DataType>().unwrap(), DataType::Script);
        assert_eq!("CSS".parse::<DataType>().unwrap(), DataType::Stylesheet);
        assert_eq!("html".parse::<DataType>().unwrap(), DataType::Markup);
        assert!(matches!(
            "less".parse::<DataType>(),
            Err(CacheError::UnknownDataType(_))
        ));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(DataType::Script.content_type(), "application/javascript");
        assert_eq!(DataType::Stylesheet.content_type(), "text/css");
        assert_eq!(DataType::Markup.content_type(), "text/html");
    }

    #[test]
    fn test_member_parse() {
        assert!(matches!(Member::parse(" * "), Member::Wildcard));
        assert!(matches!(
            Member::parse("https://cdn.example.com/x.js"),
            Member::Remote(_)
        ));
        assert!(matches!(Member::parse(" a.js "), Member::Literal(ref n) if n == "a.js"));
        assert!(Member::pattern("(").is_err());
    }

    #[test]
    fn test_wildcard_requires_extension() {
        assert!(Member::Wildcard.matches("app.js"));
        assert!(Member::Wildcard.matches("README.MD"));
        assert!(!Member::Wildcard.matches("Makefile"));
        assert!(!Member::Wildcard.matches("archive.tar2"));
        assert!(!Member::Wildcard.matches("trailing."));
    }

    #[test]
    fn test_default_variant() {
        let variants = spec("app").variants().unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].key(), DEFAULT_VARIANT);
        assert!(variants[0].matches(""));
        assert!(variants[0].matches("curl/8.0"));
    }

    #[test]
    fn test_variant_union_keeps_order() {
        let spec = spec("app")
            .pre_manipulate("MSIE", Pipeline::new())
            .unwrap()
            .post_manipulate("Firefox", Pipeline::new())
            .unwrap()
            .post_manipulate("MSIE", Pipeline::new())
            .unwrap();

        let keys: Vec<_> = spec
            .variants()
            .unwrap()
            .iter()
            .map(|v| v.key().to_string())
            .collect();
        assert_eq!(keys, vec!["MSIE", "Firefox"]);
    }

    #[test]
    fn test_variant_match_is_case_insensitive() {
        let variant = Variant::new("msie").unwrap();
        assert!(variant.matches("Mozilla/4.0 (compatible; MSIE 8.0)"));
        assert!(!variant.matches("Mozilla/5.0 Firefox/120.0"));
    }

    #[test]
    fn test_invalid_variant_rejected() {
        assert!(spec("app").pre_manipulate("[", Pipeline::new()).is_err());
    }

    #[test]
    fn test_group_set_rejects_duplicates() {
        let a = Group::from_listing(spec("app"), &[]).unwrap();
        let b = Group::from_listing(spec("app"), &[]).unwrap();
        assert!(matches!(
            GroupSet::from_groups(vec![a, b]),
            Err(CacheError::DuplicateGroup(_))
        ));
    }

    #[test]
    fn test_route_first_match_wins() {
        let a = Group::from_listing(
            GroupSpec::new("a", "/tmp", r"^/assets/", DataType::Script).unwrap(),
            &[],
        )
        .unwrap();
        let b = Group::from_listing(
            GroupSpec::new("b", "/tmp", r"\.js$", DataType::Script).unwrap(),
            &[],
        )
        .unwrap();
        let set = GroupSet::from_groups(vec![a, b]).unwrap();

        assert_eq!(set.match_route("/assets/app.js").unwrap().name(), "a");
        assert_eq!(set.match_route("/other/app.js").unwrap().name(), "b");
        assert!(set.match_route("/index.html").is_none());
    }

    #[test]
    fn test_local_paths_skip_remote() {
        let group = Group::from_listing(
            spec("app").with_files(["a.js", "https://cdn.example.com/b.js"]),
            &[],
        )
        .unwrap();
        assert_eq!(
            group.local_paths(),
            vec![PathBuf::from("/tmp/assets/a.js")]
        );
    }
}
