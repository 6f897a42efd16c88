//! Pending/unread bookkeeping and new-answer extraction.
//!
//! A question is *pending* until its first option is checked, *unread* while
//! any checked option has not been delivered, and neither once fully seen.

use serde::Serialize;

use super::model::{Conversation, Note, now_millis};

/// Pending/unread id sets, in question insertion order. The two sets are
/// always disjoint.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationStatus {
    pub pending: Vec<String>,
    pub unread: Vec<String>,
}

/// One question's newly-answered options, as delivered to a caller.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerDelta {
    pub question_id: String,
    pub label: Option<String>,
    pub tags: Vec<String>,
    pub question_text: String,
    pub selected: Vec<SelectedOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedOption {
    pub id: String,
    pub text: String,
    pub description: Option<String>,
    pub marker: Option<String>,
}

/// Classify every question as pending, unread, or fully seen.
pub fn compute_status(conversation: &Conversation) -> ConversationStatus {
    let mut pending = Vec::new();
    let mut unread = Vec::new();

    for q in &conversation.questions {
        if q.is_pending() {
            pending.push(q.id.clone());
        } else if q.has_new_answers() {
            unread.push(q.id.clone());
        }
    }

    ConversationStatus { pending, unread }
}

/// Gather checked-and-unseen options per question. With `mark_seen`, every
/// currently-checked option on a question that had new answers is flagged
/// seen, not just the newly-delivered ones.
///
/// Always advances `lastRead`, even on a non-mutating peek (a quirk callers
/// rely on: `lastRead` records the last diff pass, not the last delivery).
pub fn collect_new_answers(conversation: &mut Conversation, mark_seen: bool) -> Vec<AnswerDelta> {
    let mut new_answers = Vec::new();

    for q in &mut conversation.questions {
        let selected: Vec<SelectedOption> = q
            .options
            .iter()
            .filter(|o| o.checked && !o.seen)
            .map(|o| SelectedOption {
                id: o.id.clone(),
                text: o.text.clone(),
                description: o.description.clone(),
                marker: o.marker.clone(),
            })
            .collect();

        if selected.is_empty() {
            continue;
        }

        new_answers.push(AnswerDelta {
            question_id: q.id.clone(),
            label: q.label.clone(),
            tags: q.tags.clone(),
            question_text: q.text.clone(),
            selected,
        });

        if mark_seen {
            for opt in &mut q.options {
                if opt.checked {
                    opt.seen = true;
                }
            }
        }
    }

    conversation.last_read = Some(now_millis());
    new_answers
}

/// Gather unseen notes; with `mark_seen`, flip their `seen` flags.
pub fn collect_new_notes(conversation: &mut Conversation, mark_seen: bool) -> Vec<Note> {
    let mut new_notes = Vec::new();

    for note in &mut conversation.notes {
        if note.seen {
            continue;
        }
        new_notes.push(note.clone());
        if mark_seen {
            note.seen = true;
        }
    }

    new_notes
}
