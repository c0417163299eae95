//! HTML fragment minification.

use super::Minifier;

const RAW_TAGS: &[&str] = &["pre", "textarea", "script", "style"];

/// Collapses whitespace and drops comments in HTML fragments.
///
/// Conditional comments (`<!--[if ...]>`) and the bodies of `pre`,
/// `textarea`, `script` and `style` elements are copied verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupMinifier;

impl Minifier for MarkupMinifier {
    fn minify(&self, source: &str) -> String {
        let lower = source.to_ascii_lowercase();
        let mut out = String::with_capacity(source.len());
        // Some(true) when the pending whitespace run contained a line break.
        let mut pending: Option<bool> = None;
        let mut i = 0;

        while i < source.len() {
            let rest = &source[i..];

            if rest.starts_with("<!--") {
                let end = lower[i + 4..]
                    .find("-->")
                    .map(|e| i + 4 + e + 3)
                    .unwrap_or(source.len());
                if rest.starts_with("<!--[if") {
                    flush(&mut out, &mut pending, '<');
                    out.push_str(&source[i..end]);
                }
                i = end;
                continue;
            }

            if let Some(tag) = RAW_TAGS.iter().find(|t| opens_tag(&lower[i..], t)) {
                let end = raw_end(&lower, i, tag);
                flush(&mut out, &mut pending, '<');
                out.push_str(&source[i..end]);
                i = end;
                continue;
            }

            let Some(ch) = rest.chars().next() else {
                break;
            };
            i += ch.len_utf8();

            if ch.is_whitespace() {
                let newline = ch == '\n' || pending == Some(true);
                pending = Some(newline);
                continue;
            }

            flush(&mut out, &mut pending, ch);
            out.push(ch);
        }
        out
    }
}

fn flush(out: &mut String, pending: &mut Option<bool>, next: char) {
    if let Some(newline) = pending.take() {
        let between_tags = out.ends_with('>') && next == '<';
        if !out.is_empty() && !(newline && between_tags) {
            out.push(' ');
        }
    }
}

fn opens_tag(rest: &str, tag: &str) -> bool {
    rest.strip_prefix('<')
        .and_then(|r| r.strip_prefix(tag))
        .and_then(|r| r.chars().next())
        .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
}

fn raw_end(lower: &str, start: usize, tag: &str) -> usize {
    let close = format!("</{tag}");
    match lower[start..].find(&close) {
        Some(pos) => {
            let after = start + pos + close.len();
            lower[after..]
                .find('>')
                .map(|e| after + e + 1)
                .unwrap_or(lower.len())
        }
        None => lower.len(),
    }
}
