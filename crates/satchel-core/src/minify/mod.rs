//! Minifiers, one per [`DataType`].
//!
//! Minifiers are pure and total: malformed input is minified as well as
//! possible and never rejected.

mod markup;
mod script;
mod stylesheet;

pub use markup::MarkupMinifier;
pub use script::ScriptMinifier;
pub use stylesheet::StylesheetMinifier;

use crate::group::DataType;
use std::sync::Arc;

/// A text-to-text minifier.
pub trait Minifier: Send + Sync {
    /// Minifies `source`.
    fn minify(&self, source: &str) -> String;
}

/// The minifier used for each data type.
#[derive(Clone)]
pub struct MinifierSet {
    script: Arc<dyn Minifier>,
    stylesheet: Arc<dyn Minifier>,
    markup: Arc<dyn Minifier>,
}

impl MinifierSet {
    /// Replaces the script minifier.
    pub fn with_script(mut self, minifier: impl Minifier + 'static) -> Self {
        self.script = Arc::new(minifier);
        self
    }

    /// Replaces the stylesheet minifier.
    pub fn with_stylesheet(mut self, minifier: impl Minifier + 'static) -> Self {
        self.stylesheet = Arc::new(minifier);
        self
    }

    /// Replaces the markup minifier.
    pub fn with_markup(mut self, minifier: impl Minifier + 'static) -> Self {
        self.markup = Arc::new(minifier);
        self
    }

    /// Returns the minifier for `data_type`.
    pub fn for_type(&self, data_type: DataType) -> &Arc<dyn Minifier> {
        match data_type {
            DataType::Script => &self.script,
            DataType::Stylesheet => &self.stylesheet,
            DataType::Markup => &self.markup,
        }
    }

    /// Minifies `source` as `data_type`.
    pub fn minify(&self, data_type: DataType, source: &str) -> String {
        self.for_type(data_type).minify(source)
    }
}

impl Default for MinifierSet {
    fn default() -> Self {
        Self {
            script: Arc::new(ScriptMinifier),
            stylesheet: Arc::new(StylesheetMinifier),
            markup: Arc::new(MarkupMinifier),
        }
    }
}

impl std::fmt::Debug for MinifierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinifierSet").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Minifier for Upper {
        fn minify(&self, source: &str) -> String {
            source.to_uppercase()
        }
    }

    #[test]
    fn test_dispatch_by_data_type() {
        let set = MinifierSet::default().with_markup(Upper);
        assert_eq!(set.minify(DataType::Markup, "<p>a</p>"), "<P>A</P>");
        assert_eq!(set.minify(DataType::Stylesheet, "a { color : red ; }"), "a{color:red}");
        assert_eq!(set.minify(DataType::Script, "var  x = 1 ;"), "var x=1;");
    }
}
