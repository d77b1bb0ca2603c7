//! Signature canonicalization
//!
//! Formatting-only edits (whitespace, comments, line breaks) must not change a
//! signature, so every extracted text goes through [`canonicalize`] before it
//! is hashed.

use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\(\s*["'][^"']*["']\s*\)\."#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([:()\[\]{},;|&=<>?])\s*").unwrap());
static COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*:\s*").unwrap());
static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*").unwrap());

/// Normalize raw signature text into its canonical form.
///
/// Strips comments and `import("...")` type prefixes, collapses whitespace,
/// removes spacing around structural punctuation and type operators (`|`, `&`,
/// `=`, `=>`, `<`, `>`, `?`) and then puts back exactly one space after `:`
/// and `,`. Pure and total.
pub fn canonicalize(raw: &str) -> String {
    let text = strip_comments(raw);
    let text = IMPORT_PREFIX.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = PUNCTUATION.replace_all(&text, "$1");
    let text = COLON.replace_all(&text, ": ");
    let text = COMMA.replace_all(&text, ", ");

    text.trim().to_string()
}

/// Remove `/* */` and `//` comments that are not inside string literals.
fn strip_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                // keep tokens on either side apart
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'/') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}
