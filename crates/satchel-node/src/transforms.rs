//! Named transforms that can be declared in configuration files.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use satchel_core::{Transform, TransformContext};

/// `//# sourceMappingURL=...` and `/*# sourceMappingURL=... */` lines.
static SOURCE_MAP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?://[#@] sourceMappingURL=[^\n]*|/\*[#@] sourceMappingURL=[^\n]*?\*/)[ \t]*\r?(?:\n|$)")
        .expect("source map regex is valid")
});

/// Regex replace-all.
#[derive(Debug, Clone)]
pub struct Replace {
    pattern: Regex,
    with: String,
}

impl Replace {
    /// Compiles `pattern`; `with` may use `$1`-style capture references.
    pub fn new(pattern: &str, with: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            with: with.into(),
        })
    }
}

#[async_trait]
impl Transform for Replace {
    async fn apply(&self, content: String, _cx: &TransformContext<'_>) -> String {
        self.pattern
            .replace_all(&content, self.with.as_str())
            .into_owned()
    }
}

/// Prepends a line of text.
#[derive(Debug, Clone)]
pub struct Banner {
    text: String,
}

impl Banner {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Transform for Banner {
    async fn apply(&self, content: String, _cx: &TransformContext<'_>) -> String {
        format!("{}\n{content}", self.text)
    }
}

/// Removes source map reference comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripSourceMaps;

#[async_trait]
impl Transform for StripSourceMaps {
    async fn apply(&self, content: String, _cx: &TransformContext<'_>) -> String {
        SOURCE_MAP_REGEX.replace_all(&content, "").into_owned()
    }
}
