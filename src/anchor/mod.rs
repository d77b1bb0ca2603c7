//! Documentation anchors
//!
//! An anchor binds a region of Markdown to one code symbol:
//!
//! ```text
//! <!-- doctype:start id="<uuid>" code_ref="src/math.ts#add" -->
//! ...content...
//! <!-- doctype:end id="<uuid>" -->
//! ```
//!
//! Markers inside fenced or indented code blocks are ignored, so documents
//! that describe the syntax are not mistaken for tracked regions.
//! All line numbers are 0-indexed.

use crate::error::{Error, Result};
use crate::map::CodeRef;
use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

static START_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!--\s*doctype:start\s+id="([^"]+)"(?:\s+code_ref="([^"]*)")?\s*-->"#).unwrap()
});
static END_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<!--\s*doctype:end\s+id="([^"]+)"\s*-->"#).unwrap());

/// A parsed anchor region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// Identifier shared by both markers
    pub id: String,
    /// `file#symbol` reference from the start marker
    pub code_ref: Option<String>,
    /// Line of the start marker
    pub start_line: usize,
    /// Line of the end marker
    pub end_line: usize,
    /// Text strictly between the markers
    pub content: String,
}

/// A marker problem found while pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorProblem {
    /// Line of the offending marker
    pub line: usize,
    /// What is wrong with it
    pub reason: String,
}

impl AnchorProblem {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for AnchorProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.reason)
    }
}

impl From<AnchorProblem> for Error {
    fn from(problem: AnchorProblem) -> Self {
        Error::MalformedAnchor {
            line: problem.line,
            reason: problem.reason,
        }
    }
}

/// Result of parsing a document: well-formed anchors plus everything rejected
#[derive(Debug, Clone, Default)]
pub struct ParsedAnchors {
    pub anchors: Vec<Anchor>,
    pub problems: Vec<AnchorProblem>,
}

impl ParsedAnchors {
    /// Whether the document parsed without problems
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Options for [`insert`]
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// Put a `## SymbolName` heading above the anchor
    pub create_section: bool,
    /// Initial anchor body
    pub placeholder: String,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            create_section: true,
            placeholder: "TODO: Add documentation for this symbol".to_string(),
        }
    }
}

/// Outcome of [`insert`]
#[derive(Debug, Clone)]
pub struct Inserted {
    /// The whole updated document
    pub content: String,
    /// Id of the new anchor
    pub anchor_id: String,
    /// Line of the new start marker
    pub start_line: usize,
    /// Line of the new end marker
    pub end_line: usize,
}

/// Outcome of [`replace_content`]
#[derive(Debug, Clone)]
pub struct Replaced {
    /// The whole updated document
    pub content: String,
    /// Line of the (unchanged) start marker
    pub start_line: usize,
    /// New line of the end marker
    pub end_line: usize,
}

/// Marker found on a single line
#[derive(Debug)]
enum Marker {
    Start { id: String, code_ref: Option<String> },
    End { id: String },
}

/// A start/end pair after validation
#[derive(Debug)]
struct Pair {
    id: String,
    code_ref: Option<String>,
    start_line: usize,
    end_line: usize,
}

/// Render a start marker
pub fn start_marker(id: &str, code_ref: &str) -> String {
    format!("<!-- doctype:start id=\"{}\" code_ref=\"{}\" -->", id, code_ref)
}

/// Render an end marker
pub fn end_marker(id: &str) -> String {
    format!("<!-- doctype:end id=\"{}\" -->", id)
}

/// Split `path#Symbol` into a [`CodeRef`]
///
/// The last `#` separates the symbol, so paths containing `#` still work.
pub fn parse_code_ref(reference: &str) -> Result<CodeRef> {
    let malformed = || Error::MalformedRef {
        reference: reference.to_string(),
    };

    let (file_path, symbol_name) = reference.rsplit_once('#').ok_or_else(malformed)?;
    if file_path.trim().is_empty() || symbol_name.trim().is_empty() {
        return Err(malformed());
    }

    Ok(CodeRef::new(file_path.trim(), symbol_name.trim()))
}

/// Parse every well-formed anchor and report the malformed ones
pub fn parse(doc: &str) -> ParsedAnchors {
    let lines: Vec<&str> = doc.lines().collect();
    let (pairs, problems) = pair_markers(doc, &lines);

    let anchors = pairs
        .into_iter()
        .map(|pair| Anchor {
            content: lines[pair.start_line + 1..pair.end_line].join("\n"),
            id: pair.id,
            code_ref: pair.code_ref,
            start_line: pair.start_line,
            end_line: pair.end_line,
        })
        .collect();

    ParsedAnchors { anchors, problems }
}

/// Parse anchors, failing on the first malformed marker
pub fn parse_strict(doc: &str) -> Result<Vec<Anchor>> {
    let parsed = parse(doc);
    match parsed.problems.into_iter().next() {
        Some(problem) => Err(problem.into()),
        None => Ok(parsed.anchors),
    }
}

/// Check marker structure without extracting content
///
/// Returns one human-readable message per problem; empty means valid.
pub fn validate(doc: &str) -> Vec<String> {
    let lines: Vec<&str> = doc.lines().collect();
    let (_, problems) = pair_markers(doc, &lines);
    problems.iter().map(ToString::to_string).collect()
}

/// Every `code_ref` already anchored in the document, in document order
pub fn get_existing_code_refs(doc: &str) -> Vec<String> {
    let lines: Vec<&str> = doc.lines().collect();
    let code_lines = code_block_lines(doc);

    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| !code_lines.contains(i))
        .filter_map(|(_, line)| START_MARKER.captures(line))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().to_string()))
        .filter(|code_ref| !code_ref.is_empty())
        .collect()
}

/// Find a well-formed anchor by id
pub fn find(doc: &str, id: &str) -> Option<Anchor> {
    parse(doc).anchors.into_iter().find(|a| a.id == id)
}

/// Append a new anchor for `code_ref` at the end of the document
pub fn insert(doc: &str, code_ref: &CodeRef, options: &InsertOptions) -> Inserted {
    let anchor_id = uuid::Uuid::new_v4().to_string();

    let mut content = doc.trim_end_matches(['\r', '\n']).to_string();
    if !content.is_empty() {
        content.push_str("\n\n");
    }
    if options.create_section {
        content.push_str(&format!("## {}\n\n", code_ref.symbol_name));
    }

    let start_line = content.lines().count();
    content.push_str(&start_marker(&anchor_id, &code_ref.to_string()));
    content.push('\n');

    let mut body_lines = 0;
    for line in options.placeholder.lines() {
        content.push_str(line);
        content.push('\n');
        body_lines += 1;
    }

    let end_line = start_line + 1 + body_lines;
    content.push_str(&end_marker(&anchor_id));
    content.push('\n');

    Inserted {
        content,
        anchor_id,
        start_line,
        end_line,
    }
}

/// Replace the whole body of one anchor, keeping both markers
pub fn replace_content(doc: &str, id: &str, new_content: &str) -> Result<Replaced> {
    let anchor = find(doc, id).ok_or_else(|| Error::AnchorNotFound { id: id.to_string() })?;
    let offsets = line_offsets(doc);

    let body_start = offsets[anchor.start_line + 1];
    let body_end = offsets[anchor.end_line];

    let body = new_content.trim_end_matches(['\r', '\n']);
    let mut replacement = String::with_capacity(body.len() + 1);
    if !body.is_empty() {
        replacement.push_str(body);
        replacement.push('\n');
    }

    let mut content = String::with_capacity(doc.len() + replacement.len());
    content.push_str(&doc[..body_start]);
    content.push_str(&replacement);
    content.push_str(&doc[body_end..]);

    Ok(Replaced {
        content,
        start_line: anchor.start_line,
        end_line: anchor.start_line + 1 + body.lines().count(),
    })
}

/// Byte offset at which each line starts
fn line_offsets(doc: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(doc.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Lines that belong to a fenced or indented code block
fn code_block_lines(doc: &str) -> HashSet<usize> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for (event, range) in Parser::new(doc).into_offset_iter() {
        if let Event::Start(Tag::CodeBlock(_)) = event {
            ranges.push(range);
        }
    }

    if ranges.is_empty() {
        return HashSet::new();
    }

    line_offsets(doc)
        .into_iter()
        .enumerate()
        .filter(|(_, offset)| ranges.iter().any(|r| r.contains(offset)))
        .map(|(line, _)| line)
        .collect()
}

/// Recognize a marker on one line
fn marker_on(line: &str) -> Option<Marker> {
    if let Some(caps) = START_MARKER.captures(line) {
        return Some(Marker::Start {
            id: caps[1].to_string(),
            code_ref: caps.get(2).map(|m| m.as_str().to_string()),
        });
    }
    END_MARKER.captures(line).map(|caps| Marker::End {
        id: caps[1].to_string(),
    })
}

/// Pair start and end markers, collecting every structural problem
fn pair_markers(doc: &str, lines: &[&str]) -> (Vec<Pair>, Vec<AnchorProblem>) {
    let code_lines = code_block_lines(doc);
    let mut pairs: Vec<Pair> = Vec::new();
    let mut problems = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut open: Option<(String, Option<String>, usize)> = None;

    for (line_no, line) in lines.iter().enumerate() {
        if code_lines.contains(&line_no) {
            continue;
        }
        let Some(marker) = marker_on(line) else {
            continue;
        };

        match marker {
            Marker::Start { id, code_ref } => {
                if let Some((open_id, _, open_line)) = open.take() {
                    problems.push(AnchorProblem::new(
                        open_line,
                        format!(
                            "unterminated start marker id=\"{}\" (next start marker at line {})",
                            open_id,
                            line_no + 1
                        ),
                    ));
                }
                open = Some((id, code_ref, line_no));
            }
            Marker::End { id } => match open.take() {
                None => problems.push(AnchorProblem::new(
                    line_no,
                    format!("end marker id=\"{}\" has no matching start marker", id),
                )),
                Some((open_id, _, open_line)) if open_id != id => {
                    problems.push(AnchorProblem::new(
                        line_no,
                        format!(
                            "mismatched anchor ids: start id=\"{}\" (line {}) closed by end id=\"{}\"",
                            open_id,
                            open_line + 1,
                            id
                        ),
                    ));
                }
                Some((open_id, code_ref, open_line)) => {
                    if !seen_ids.insert(open_id.clone()) {
                        problems.push(AnchorProblem::new(
                            open_line,
                            format!("duplicate anchor id=\"{}\"", open_id),
                        ));
                        continue;
                    }
                    if let Some(reference) = code_ref.as_deref() {
                        if let Err(e) = parse_code_ref(reference) {
                            problems.push(AnchorProblem::new(open_line, e.to_string()));
                            continue;
                        }
                    }
                    pairs.push(Pair {
                        id: open_id,
                        code_ref,
                        start_line: open_line,
                        end_line: line_no,
                    });
                }
            },
        }
    }

    if let Some((open_id, _, open_line)) = open {
        problems.push(AnchorProblem::new(
            open_line,
            format!("unterminated start marker id=\"{}\"", open_id),
        ));
    }

    (pairs, problems)
}
