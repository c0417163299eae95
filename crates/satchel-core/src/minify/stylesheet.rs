//! CSS minification.

use super::Minifier;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use tracing::debug;

/// CSS minifier backed by `lightningcss`.
///
/// Input that does not parse, or that would not shrink, is returned as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct StylesheetMinifier;

impl Minifier for StylesheetMinifier {
    fn minify(&self, source: &str) -> String {
        match print_minified(source) {
            Some(code) if code.len() <= source.len() => code,
            Some(_) => source.to_string(),
            None => {
                debug!(len = source.len(), "stylesheet left unminified");
                source.to_string()
            }
        }
    }
}

fn print_minified(source: &str) -> Option<String> {
    let sheet = StyleSheet::parse(
        source,
        ParserOptions {
            error_recovery: true,
            ..ParserOptions::default()
        },
    )
    .ok()?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(printed.code)
}
