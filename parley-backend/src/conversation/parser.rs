//! Question markdown parser.
//!
//! One `---`-delimited chunk becomes at most one question. Each trimmed line
//! is classified top-to-bottom, first match wins, and the tagged outcome is
//! folded into an accumulator.
//!
//! The grammar, by precedence:
//!
//! ```text
//! #tag1 #tag2
//! [Label] (single|multi)
//! > **parent_id**: parent summary
//! **q1**: Question text?
//! free-form body lines
//! [A] Option A
//!   > Description for A
//! [_] (freeform slot, auto-appended when missing)
//! ```

use regex::Regex;
use std::sync::LazyLock;

use super::model::{Question, QuestionOption, SENTINEL_OPTION_ID, SelectMode, now_millis};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").unwrap());
static LABEL_WIDE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[[^\]]{2,}\]").unwrap());
static LABEL_MODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[.+\].*\((single|multi)\)").unwrap());
static LABEL_CAPTURE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]").unwrap());
static PARENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^> \*\*([^*]+)\*\*:\s*(.+)").unwrap());
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*([^*]+)\*\*:\s*(.+)").unwrap());
// Accepts the bare ask dialect (`[A] text`) and the serializer's list forms
// (`- [A] text`, `- [x] [A] text`) so rendered output re-parses.
static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:- )?(?:\[[x ]\] )?\[([A-Z_])\]\s*(.*)$").unwrap());

/// A question as recovered from one markdown chunk, before it is appended
/// to a conversation (ids and timestamps are assigned at append time).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuestion {
    pub id: Option<String>,
    pub text: String,
    pub label: Option<String>,
    pub tags: Vec<String>,
    pub select_mode: Option<SelectMode>,
    pub parent_id: Option<String>,
    pub parent_summary: Option<String>,
    pub body: Option<String>,
    pub options: Vec<ParsedOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOption {
    pub id: String,
    pub text: String,
    pub description: Option<String>,
}

impl ParsedQuestion {
    /// Materialize into a conversation question. `fallback_id` is used when
    /// the chunk did not carry its own id; options start unchecked/unseen.
    pub fn into_question(self, fallback_id: String) -> Question {
        Question {
            id: self.id.unwrap_or(fallback_id),
            parent_id: self.parent_id,
            parent_summary: self.parent_summary,
            label: self.label,
            tags: self.tags,
            select_mode: self.select_mode,
            text: self.text,
            body: self.body,
            options: self
                .options
                .into_iter()
                .map(|o| QuestionOption {
                    id: o.id,
                    text: o.text,
                    description: o.description,
                    checked: false,
                    seen: false,
                    marker: None,
                })
                .collect(),
            created_at: now_millis(),
        }
    }
}

/// Classification outcome for a single trimmed line.
#[derive(Debug, PartialEq)]
enum LineKind {
    Tags(Vec<String>),
    LabelMode {
        label: Option<String>,
        mode: Option<SelectMode>,
    },
    ParentRef {
        id: String,
        summary: String,
    },
    QuestionHeader {
        id: String,
        text: String,
    },
    OptionLine {
        id: String,
        text: String,
    },
    DescriptionLine(String),
    BodyLine,
    Ignored,
}

/// Classify one trimmed line. Precedence is order-sensitive: the label rule
/// runs before the option rule so `[AB]` or `[Pick one] (multi)` are never
/// mistaken for options, while a bare `[A]` falls through to the option rule.
fn classify_line(line: &str, in_body: bool, has_options: bool) -> LineKind {
    if line.starts_with('#') && !line.starts_with("##") {
        let tags = TAG_RE
            .captures_iter(line)
            .map(|c| c[1].to_string())
            .collect();
        return LineKind::Tags(tags);
    }

    if LABEL_WIDE_RE.is_match(line) || LABEL_MODE_RE.is_match(line) {
        let label = LABEL_CAPTURE_RE.captures(line).map(|c| c[1].to_string());
        // (multi) outranks (single) when both appear on one line
        let mode = if line.contains("(multi)") {
            Some(SelectMode::Multi)
        } else if line.contains("(single)") {
            Some(SelectMode::Single)
        } else {
            None
        };
        return LineKind::LabelMode { label, mode };
    }

    if line.starts_with("> **") {
        // Consumed by this rule even when malformed: a `> **` line is never
        // an option description.
        return match PARENT_RE.captures(line) {
            Some(caps) => LineKind::ParentRef {
                id: caps[1].to_string(),
                summary: caps[2].to_string(),
            },
            None => LineKind::Ignored,
        };
    }

    if line.starts_with("**") && line.contains("**:") {
        if let Some(caps) = HEADER_RE.captures(line) {
            return LineKind::QuestionHeader {
                id: caps[1].to_string(),
                text: caps[2].to_string(),
            };
        }
        return LineKind::Ignored;
    }

    if let Some(caps) = OPTION_RE.captures(line) {
        return LineKind::OptionLine {
            id: caps[1].to_string(),
            text: caps[2].to_string(),
        };
    }

    if line.starts_with('>') && has_options {
        return LineKind::DescriptionLine(line[1..].trim().to_string());
    }

    if in_body && !line.is_empty() {
        return LineKind::BodyLine;
    }

    LineKind::Ignored
}

#[derive(Default)]
struct Accumulator {
    id: Option<String>,
    text: Option<String>,
    label: Option<String>,
    tags: Vec<String>,
    select_mode: Option<SelectMode>,
    parent_id: Option<String>,
    parent_summary: Option<String>,
    body_lines: Vec<String>,
    options: Vec<ParsedOption>,
    in_body: bool,
}

impl Accumulator {
    fn apply(&mut self, raw_line: &str, kind: LineKind) {
        match kind {
            LineKind::Tags(tags) => {
                // last non-empty tags line wins
                if !tags.is_empty() {
                    self.tags = tags;
                }
            }
            LineKind::LabelMode { label, mode } => {
                if let Some(label) = label {
                    self.label = Some(label);
                }
                if let Some(mode) = mode {
                    self.select_mode = Some(mode);
                }
            }
            LineKind::ParentRef { id, summary } => {
                self.parent_id = Some(id);
                self.parent_summary = Some(summary);
            }
            LineKind::QuestionHeader { id, text } => {
                self.id = Some(id);
                self.text = Some(text);
                self.in_body = true;
            }
            LineKind::OptionLine { id, text } => {
                // option ids are unique within a question; first wins
                if !self.options.iter().any(|o| o.id == id) {
                    self.options.push(ParsedOption {
                        id,
                        text,
                        description: None,
                    });
                }
                self.in_body = false;
            }
            LineKind::DescriptionLine(desc) => {
                if !desc.is_empty() {
                    if let Some(last) = self.options.last_mut() {
                        match &mut last.description {
                            Some(existing) => {
                                existing.push('\n');
                                existing.push_str(&desc);
                            }
                            None => last.description = Some(desc),
                        }
                    }
                }
            }
            LineKind::BodyLine => {
                // body keeps the original, non-trimmed form
                self.body_lines.push(raw_line.to_string());
            }
            LineKind::Ignored => {}
        }
    }

    fn finish(mut self) -> Option<ParsedQuestion> {
        let text = self.text?;

        if !self.options.iter().any(|o| o.id == SENTINEL_OPTION_ID) {
            self.options.push(ParsedOption {
                id: SENTINEL_OPTION_ID.to_string(),
                text: String::new(),
                description: None,
            });
        }

        let body = self.body_lines.join("\n");
        let body = body.trim();

        Some(ParsedQuestion {
            id: self.id,
            text,
            label: self.label,
            tags: self.tags,
            select_mode: self.select_mode,
            parent_id: self.parent_id,
            parent_summary: self.parent_summary,
            body: (!body.is_empty()).then(|| body.to_string()),
            options: self.options,
        })
    }
}

/// Split an `ask.md` payload into chunks on lines whose trimmed form is
/// exactly `---`.
pub fn split_chunks(payload: &str) -> Vec<String> {
    let mut chunks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in payload.lines() {
        if line.trim() == "---" {
            chunks.push(Vec::new());
        } else if let Some(current) = chunks.last_mut() {
            current.push(line);
        }
    }
    chunks.into_iter().map(|lines| lines.join("\n")).collect()
}

/// Parse one chunk into a question. A chunk that never produces question
/// text yields `None`: dropped silently, not an error.
pub fn parse_chunk(chunk: &str) -> Option<ParsedQuestion> {
    let mut acc = Accumulator::default();
    for raw_line in chunk.lines() {
        let trimmed = raw_line.trim();
        let kind = classify_line(trimmed, acc.in_body, !acc.options.is_empty());
        acc.apply(raw_line, kind);
    }
    acc.finish()
}
