//! JavaScript minification: comment stripping and whitespace collapsing.

use super::Minifier;

/// Conservative JavaScript minifier.
///
/// Removes comments and collapses whitespace in a single lexing pass. A line
/// break is kept where dropping it could change automatic semicolon
/// insertion. Block comments starting with `/*!` are preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptMinifier;

impl Minifier for ScriptMinifier {
    fn minify(&self, source: &str) -> String {
        Lexer::new(source).run()
    }
}

/// Keywords after which a `/` begins a regular expression literal.
const REGEX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "case",
    "do",
    "else",
    "in",
    "of",
    "void",
    "yield",
    "await",
    "delete",
    "throw",
    "new",
];

#[derive(Clone, Copy)]
enum State {
    Code,
    Quote(char),
    Regex { class: bool },
}

struct Lexer<'a> {
    rest: &'a str,
    out: String,
    state: State,
    pending_space: bool,
    pending_newline: bool,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            out: String::with_capacity(input.len()),
            state: State::Code,
            pending_space: false,
            pending_newline: false,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.rest.chars().next()?;
        self.rest = &self.rest[ch.len_utf8()..];
        Some(ch)
    }

    fn run(mut self) -> String {
        while let Some(ch) = self.bump() {
            match self.state {
                State::Code => self.code(ch),
                State::Quote(quote) => self.quoted(ch, quote),
                State::Regex { class } => self.regex(ch, class),
            }
        }
        self.out
    }

    fn code(&mut self, ch: char) {
        if ch.is_whitespace() {
            self.pending_space = true;
            self.pending_newline |= ch == '\n';
            return;
        }

        if ch == '/' {
            if self.rest.starts_with('*') {
                self.block_comment();
                return;
            }
            if self.rest.starts_with('/') {
                self.line_comment();
                return;
            }
        }

        let regex = ch == '/' && self.slash_starts_regex();
        self.flush_separator(ch);
        match ch {
            '"' | '\'' | '`' => self.state = State::Quote(ch),
            '/' if regex => self.state = State::Regex { class: false },
            _ => {}
        }
        self.out.push(ch);
    }

    fn quoted(&mut self, ch: char, quote: char) {
        self.out.push(ch);
        if ch == '\\' {
            if let Some(next) = self.bump() {
                self.out.push(next);
            }
        } else if ch == quote {
            self.state = State::Code;
        }
    }

    fn regex(&mut self, ch: char, class: bool) {
        self.out.push(ch);
        self.state = match ch {
            '\\' => {
                if let Some(next) = self.bump() {
                    self.out.push(next);
                }
                State::Regex { class }
            }
            '[' => State::Regex { class: true },
            ']' => State::Regex { class: false },
            '/' if !class => State::Code,
            '\n' => State::Code,
            _ => State::Regex { class },
        };
    }

    /// Consumes a block comment; `rest` starts just past the opening `/`.
    fn block_comment(&mut self) {
        let rest = self.rest;
        let end = rest[1..].find("*/").map(|e| e + 3).unwrap_or(rest.len());
        let body = &rest[..end];
        if body.starts_with("*!") {
            self.flush_separator('/');
            self.out.push('/');
            self.out.push_str(body);
        } else {
            // Keep tokens on either side of the comment apart.
            self.pending_space = true;
            self.pending_newline |= body.contains('\n');
        }
        self.rest = &rest[end..];
    }

    fn line_comment(&mut self) {
        let end = self.rest.find('\n').unwrap_or(self.rest.len());
        self.rest = &self.rest[end..];
    }

    /// Whether a `/` at this point starts a regular expression literal rather than a division.
    fn slash_starts_regex(&self) -> bool {
        let emitted = self.out.trim_end();
        let Some(prev) = emitted.chars().last() else {
            return true;
        };

        if is_word_char(prev) {
            let start = emitted
                .char_indices()
                .rev()
                .find(|(_, c)| !is_word_char(*c))
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            return REGEX_KEYWORDS.contains(&&emitted[start..]);
        }

        matches!(
            prev,
            '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';' | '+' | '-' | '*'
                | '%' | '<' | '>' | '~' | '^'
        )
    }

    fn flush_separator(&mut self, next: char) {
        if !self.pending_space {
            return;
        }
        let newline = self.pending_newline;
        self.pending_space = false;
        self.pending_newline = false;

        let Some(prev) = self.out.chars().last() else {
            return;
        };

        if newline && ends_statement(prev) && begins_statement(next) {
            self.out.push('\n');
            return;
        }

        // Avoid merging `a + ++b` into `a+++b`, or `/` into a comment opener.
        if (prev == '+' && next == '+')
            || (prev == '-' && next == '-')
            || (prev == '/' && matches!(next, '/' | '*'))
        {
            self.out.push(' ');
            return;
        }

        if is_word_char(prev) && is_word_char(next) {
            self.out.push(' ');
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '\\'
}

fn ends_statement(c: char) -> bool {
    is_word_char(c) || matches!(c, ')' | ']' | '}' | '"' | '\'' | '`' | '+' | '-' | '/')
}

fn begins_statement(c: char) -> bool {
    is_word_char(c) || matches!(c, '(' | '[' | '{' | '"' | '\'' | '`' | '+' | '-' | '!' | '~' | '/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minify(input: &str) -> String {
        ScriptMinifier.minify(input)
    }

    #[test]
    fn test_strip_block_and_line_comments() {
        let out = minify("/* block */ var x = 1; // line\nvar y;");
        assert!(!out.contains("block"));
        assert!(!out.contains("line"));
        assert_eq!(out, "var x=1;var y;");
    }

    #[test]
    fn test_preserve_strings_and_templates() {
        let out = minify(r#"var a = "/* no */"; var b = `// no`;"#);
        assert!(out.contains("\"/* no */\""));
        assert!(out.contains("`// no`"));
    }

    #[test]
    fn test_preserve_bang_comment() {
        let out = minify("/*! (c) Example */\nvar a = 1;");
        assert!(out.starts_with("/*! (c) Example */"));
        assert!(out.ends_with("var a=1;"));
    }

    #[test]
    fn test_division_and_regex_survive() {
        let out = minify(r#"const a = x / y; const ok = /a\/b/.test("z");"#);
        assert_eq!(out, r#"const a=x/y;const ok=/a\/b/.test("z");"#);

        assert_eq!(minify(r"var re = /[/]/g; // tail"), "var re=/[/]/g;");
    }

    #[test]
    fn test_regex_after_keyword_keeps_later_strings() {
        let out = minify("function f(s){ return /\"/.test(s) }\nvar msg = \"a  b\";");
        assert_eq!(out, "function f(s){return/\"/.test(s)}\nvar msg=\"a  b\";");
    }

    #[test]
    fn test_regex_after_keyword_keeps_its_whitespace() {
        assert_eq!(
            minify("function g(x){ return typeof /a  b/ }"),
            "function g(x){return typeof/a  b/}"
        );
        assert_eq!(minify("throw /'  '/"), "throw/'  '/");
    }

    #[test]
    fn test_identifier_ending_in_keyword_divides() {
        assert_eq!(minify("var q = myreturn / 2 / n;"), "var q=myreturn/2/n;");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(
            minify("function foo ( x ) { return x + 1 ; }"),
            "function foo(x){return x+1;}"
        );
    }

    #[test]
    fn test_keeps_newline_for_asi() {
        assert_eq!(minify("var a = 1\nvar b = 2\n"), "var a=1\nvar b=2");
        assert_eq!(minify("a = b\n++c"), "a=b\n++c");
    }

    #[test]
    fn test_multiline_comment_counts_as_line_break() {
        assert_eq!(minify("var a = 1/*\n*/var b = 2"), "var a=1\nvar b=2");
    }

    #[test]
    fn test_no_increment_merge() {
        assert_eq!(minify("a + ++b"), "a+ ++b");
    }

    #[test]
    fn test_regex_whitespace_untouched() {
        assert_eq!(minify("var re = / +/g ;"), "var re=/ +/g;");
    }

    #[test]
    fn test_comment_between_words_keeps_separation() {
        assert_eq!(minify("return/* x */value;"), "return value;");
    }

    #[test]
    fn test_unterminated_input_is_total() {
        assert_eq!(minify("var s = \"unterminated"), "var s=\"unterminated");
        assert_eq!(minify("/* open comment"), "");
        assert_eq!(minify("a /"), "a/");
    }
}
