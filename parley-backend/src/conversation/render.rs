//! Markdown serializer, the canonical inverse of the parser.
//!
//! Produces a frontmatter status block followed by each surviving question.
//! Built line-by-line into a Vec and joined, like the notes frontmatter
//! generator. Rendered questions re-parse to the same structured values
//! (ignoring checked/seen state).

use crate::markers::MarkerTable;

use super::model::{Conversation, Note, Question};
use super::status::compute_status;

/// Filters applied to a rendered document. Defaults render everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Only checked options, without checkbox glyphs; questions with no
    /// checked option are dropped entirely.
    pub answers_only: bool,
    /// Only questions with at least one checked-and-unseen option.
    pub new_only: bool,
    /// Emit a trailing `timeout: true` frontmatter field (wait route only).
    pub timed_out: bool,
}

/// Render a conversation to markdown with a status frontmatter block.
pub fn render_conversation(
    id: &str,
    conversation: &Conversation,
    markers: &MarkerTable,
    opts: RenderOptions,
) -> String {
    let status = compute_status(conversation);

    let mut lines = vec![
        "---".to_string(),
        format!("conversation: {}", id),
        format!("pending: [{}]", status.pending.join(", ")),
        format!("unread: [{}]", status.unread.join(", ")),
    ];
    if opts.timed_out {
        lines.push("timeout: true".to_string());
    }
    lines.push("---".to_string());

    let surviving: Vec<&Question> = conversation
        .questions
        .iter()
        .filter(|q| {
            (!opts.new_only || q.has_new_answers())
                && (!opts.answers_only || q.options.iter().any(|o| o.checked))
        })
        .collect();

    if surviving.is_empty() {
        if opts.answers_only {
            lines.push("No answers yet.".to_string());
        } else {
            lines.push(format!("# {}", id));
        }
        return format!("{}\n", lines.join("\n"));
    }

    lines.push(format!("# {}", id));

    for q in surviving {
        lines.push(String::new());
        lines.push(render_question(q, markers, opts.answers_only));
    }

    format!("{}\n", lines.join("\n"))
}

/// Render one question block.
pub fn render_question(q: &Question, markers: &MarkerTable, answers_only: bool) -> String {
    let mut lines = Vec::new();

    // Tags and label/mode go on separate lines: a combined line would be
    // consumed whole by the parser's tags rule.
    if !q.tags.is_empty() {
        let tags: Vec<String> = q.tags.iter().map(|t| format!("#{}", t)).collect();
        lines.push(tags.join(" "));
    }

    if q.label.is_some() || q.select_mode.is_some() {
        let mut parts = Vec::new();
        if let Some(label) = &q.label {
            parts.push(format!("[{}]", label));
        }
        if let Some(mode) = q.select_mode {
            parts.push(format!("({})", mode.as_str()));
        }
        lines.push(parts.join(" "));
    }

    if let (Some(parent_id), Some(parent_summary)) = (&q.parent_id, &q.parent_summary) {
        lines.push(format!("> **{}**: {}", parent_id, parent_summary));
    }

    lines.push(format!("**{}**: {}", q.id, q.text));

    if let Some(body) = &q.body {
        lines.push(body.clone());
    }

    for opt in &q.options {
        if opt.is_empty_sentinel() {
            continue;
        }
        if answers_only && !opt.checked {
            continue;
        }

        let marker = opt
            .marker
            .as_deref()
            .map(|m| format!(" {}", markers.resolve(m)))
            .unwrap_or_default();

        let line = if answers_only {
            format!("- [{}]{} {}", opt.id, marker, opt.text)
        } else {
            let glyph = if opt.checked { "x" } else { " " };
            format!("- [{}] [{}]{} {}", glyph, opt.id, marker, opt.text)
        };
        lines.push(line.trim_end().to_string());

        if let Some(description) = &opt.description {
            for desc_line in description.lines() {
                lines.push(format!("  > {}", desc_line));
            }
        }
    }

    lines.join("\n")
}

/// Render delivered notes as an appendix section for `wait.md` responses.
pub fn render_notes_appendix(notes: &[Note]) -> String {
    let mut lines = vec![String::new(), "## Notes".to_string(), String::new()];
    for note in notes {
        lines.push(format!("- [{}] {}", note.category, note.text));
    }
    format!("{}\n", lines.join("\n"))
}
