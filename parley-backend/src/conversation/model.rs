//! Conversation document model.
//!
//! One Conversation per id, holding ordered Questions and Notes. The JSON
//! field names `lastRead` and `selectMode` are kept from the original wire
//! format so existing UIs keep working against the `data` route.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Reserved option id for the freeform/"other" answer slot.
pub const SENTINEL_OPTION_ID: &str = "_";

/// Current time as epoch milliseconds (the document's timestamp unit).
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// The persisted unit: all questions and notes for one conversation id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Advanced on every diff-collection pass, including read-only peeks.
    #[serde(rename = "lastRead", default)]
    pub last_read: Option<i64>,
}

/// Single vs. multi-choice answering hint for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    Single,
    Multi,
}

impl SelectMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectMode::Single => "single",
            SelectMode::Multi => "multi",
        }
    }
}

/// A multi-choice question appended by a caller.
///
/// Questions are append-only: once created they are only mutated by option
/// toggles (whole-document overwrite via the data route) or by the diff
/// engine flipping `seen` flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Weak back-reference to another question. A label only, never
    /// validated or dereferenced.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_summary: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "selectMode", default)]
    pub select_mode: Option<SelectMode>,
    pub text: String,
    /// Free-form text between the question line and the first option line.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub created_at: i64,
}

impl Question {
    /// True if any checked option has not yet been delivered to a caller.
    pub fn has_new_answers(&self) -> bool {
        self.options.iter().any(|o| o.checked && !o.seen)
    }

    /// True if no option is checked yet.
    pub fn is_pending(&self) -> bool {
        !self.options.iter().any(|o| o.checked)
    }
}

/// One answer slot of a question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionOption {
    /// A single uppercase letter, or `_` for the sentinel slot.
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Toggled by the answering party, never by this process.
    #[serde(default)]
    pub checked: bool,
    /// Set true only by the diff engine after delivery of a checked option.
    #[serde(default)]
    pub seen: bool,
    /// Opaque annotation (marker code or glyph) attached by the answering UI.
    #[serde(default)]
    pub marker: Option<String>,
}

impl QuestionOption {
    /// The sentinel is omitted from rendering while it carries no content.
    pub fn is_empty_sentinel(&self) -> bool {
        self.id == SENTINEL_OPTION_ID
            && self.text.is_empty()
            && self.description.as_deref().is_none_or(str::is_empty)
    }
}

fn default_category() -> String {
    "note".to_string()
}

/// A free-form note, merged into the same wait/notify channel as answers
/// but never into the question markdown grammar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub seen: bool,
}

impl Note {
    /// Build a note from a raw posted body, honoring the `\category` prefix
    /// convention: `\idea remember the tradeoff` files under "idea".
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        let (category, text) = match trimmed.strip_prefix('\\') {
            Some(rest) => {
                let mut parts = rest.splitn(2, char::is_whitespace);
                let cat = parts.next().unwrap_or_default();
                let remainder = parts.next().unwrap_or_default().trim();
                if cat.is_empty() {
                    (default_category(), trimmed.to_string())
                } else {
                    (cat.to_string(), remainder.to_string())
                }
            }
            None => (default_category(), trimmed.to_string()),
        };

        Note {
            text,
            category,
            time: now_millis(),
            seen: false,
        }
    }
}
