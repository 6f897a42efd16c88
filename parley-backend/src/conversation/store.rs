//! Conversation persistence.
//!
//! One pretty-printed JSON document per conversation at `<data>/<id>.json`,
//! with a derived markdown mirror regenerated on every save at
//! `<data>/<id>.md`. Categorized notes additionally accumulate append-only
//! under `<data>/notes/<category>.md`.
//!
//! A missing document is an empty conversation, never an error. There is no
//! locking or versioning across the two artifacts written on save: last
//! write wins, and concurrent waiters on one conversation may interleave
//! their read/mark/save cycles. The conversation id is used as a storage
//! key verbatim.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::markers::MarkerTable;

use super::model::{Conversation, Note};
use super::parser::ParsedQuestion;
use super::render::{RenderOptions, render_conversation};

/// A conversation id with its document's modification time (epoch ms).
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub id: String,
    pub modified: i64,
}

/// File-backed store for conversation documents.
pub struct ConversationStore {
    data_dir: PathBuf,
    markers: Arc<MarkerTable>,
}

impl ConversationStore {
    /// Create a store rooted at `data_dir`, creating the directory layout.
    pub fn new(data_dir: PathBuf, markers: Arc<MarkerTable>) -> io::Result<Self> {
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(data_dir.join("notes"))?;
        Ok(Self { data_dir, markers })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn json_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", id))
    }

    fn markdown_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.md", id))
    }

    /// Load a conversation document; a missing file is an empty default.
    pub fn load(&self, id: &str) -> io::Result<Conversation> {
        match fs::read_to_string(self.json_path(id)) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Conversation::default()),
            Err(e) => Err(e),
        }
    }

    /// Persist the document and regenerate its markdown mirror. Write errors
    /// propagate uncaught: no retry, no partial-write cleanup.
    pub fn save(&self, id: &str, conversation: &Conversation) -> io::Result<()> {
        let json = serde_json::to_string_pretty(conversation)?;
        fs::write(self.json_path(id), json)?;

        let markdown = render_conversation(id, conversation, &self.markers, RenderOptions::default());
        fs::write(self.markdown_path(id), markdown)?;
        Ok(())
    }

    /// Append parsed questions, assigning `"q" + (1 + count)` ids to chunks
    /// that did not carry their own. Returns the assigned ids and the saved
    /// document.
    pub fn append_questions(
        &self,
        id: &str,
        parsed: Vec<ParsedQuestion>,
    ) -> io::Result<(Vec<String>, Conversation)> {
        let mut conversation = self.load(id)?;
        let mut ids = Vec::new();

        for p in parsed {
            let fallback = format!("q{}", conversation.questions.len() + 1);
            let question = p.into_question(fallback);
            ids.push(question.id.clone());
            conversation.questions.push(question);
        }

        self.save(id, &conversation)?;
        Ok((ids, conversation))
    }

    /// Append a note to the document and to its per-category side file.
    pub fn append_note(&self, id: &str, note: Note) -> io::Result<Conversation> {
        self.append_category_file(&note)?;

        let mut conversation = self.load(id)?;
        conversation.notes.push(note);
        self.save(id, &conversation)?;
        Ok(conversation)
    }

    fn append_category_file(&self, note: &Note) -> io::Result<()> {
        let path = self
            .data_dir
            .join("notes")
            .join(format!("{}.md", note.category));

        let stamp = chrono::DateTime::from_timestamp_millis(note.time)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| note.time.to_string());

        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "- [{}] {}", stamp, note.text)
    }

    /// Overwrite with the empty default document.
    pub fn reset(&self, id: &str) -> io::Result<()> {
        self.save(id, &Conversation::default())
    }

    /// All known conversations, most recently modified first.
    pub fn list(&self) -> io::Result<Vec<ConversationEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let Some(id) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                    continue;
                };
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                entries.push(ConversationEntry { id, modified });
            }
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::parser::parse_chunk;
    use tempfile::tempdir;

    fn store(dir: &Path) -> ConversationStore {
        ConversationStore::new(dir.join("data"), Arc::new(MarkerTable::default()))
            .expect("store should initialize")
    }

    #[test]
    fn test_load_missing_is_empty_default() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let conv = store.load("nope").unwrap();
        assert!(conv.questions.is_empty());
        assert!(conv.last_read.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let parsed = parse_chunk("**q1**: Pick?\n[A] Yes").unwrap();
        let (ids, _) = store.append_questions("demo", vec![parsed]).unwrap();
        assert_eq!(ids, vec!["q1"]);

        let conv = store.load("demo").unwrap();
        assert_eq!(conv.questions.len(), 1);
        assert_eq!(conv.questions[0].text, "Pick?");
        assert_eq!(conv.questions[0].options.len(), 2); // A + sentinel
    }

    #[test]
    fn test_auto_assigned_question_ids() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        // a headerless chunk can't exist (no text), so simulate id-less
        // questions directly
        let mut p1 = parse_chunk("**x**: first?").unwrap();
        p1.id = None;
        let mut p2 = parse_chunk("**x**: second?").unwrap();
        p2.id = None;

        let (ids, conv) = store.append_questions("demo", vec![p1, p2]).unwrap();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(conv.questions[1].id, "q2");
    }

    #[test]
    fn test_markdown_mirror_regenerated_on_save() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let parsed = parse_chunk("**q1**: Pick?\n[A] Yes").unwrap();
        let (_, mut conv) = store.append_questions("demo", vec![parsed]).unwrap();

        let mirror = fs::read_to_string(store.markdown_path("demo")).unwrap();
        assert!(mirror.contains("pending: [q1]"));
        assert!(mirror.contains("- [ ] [A] Yes"));

        conv.questions[0].options[0].checked = true;
        store.save("demo", &conv).unwrap();

        let mirror = fs::read_to_string(store.markdown_path("demo")).unwrap();
        assert!(mirror.contains("unread: [q1]"));
        assert!(mirror.contains("- [x] [A] Yes"));
    }

    #[test]
    fn test_reset_clears_document() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let parsed = parse_chunk("**q1**: Pick?").unwrap();
        store.append_questions("demo", vec![parsed]).unwrap();
        store.reset("demo").unwrap();

        let conv = store.load("demo").unwrap();
        assert!(conv.questions.is_empty());
    }

    #[test]
    fn test_list_sorted_by_modification_desc() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.save("older", &Conversation::default()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(25));
        store.save("newer", &Conversation::default()).unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "newer");
        assert_eq!(entries[1].id, "older");
        assert!(entries[0].modified >= entries[1].modified);
    }

    #[test]
    fn test_append_note_accumulates_category_file() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store
            .append_note("demo", Note::from_text("\\idea first"))
            .unwrap();
        store
            .append_note("demo", Note::from_text("\\idea second"))
            .unwrap();
        store
            .append_note("demo", Note::from_text("plain note"))
            .unwrap();

        let conv = store.load("demo").unwrap();
        assert_eq!(conv.notes.len(), 3);

        let idea_file =
            fs::read_to_string(store.data_dir().join("notes").join("idea.md")).unwrap();
        assert_eq!(idea_file.lines().count(), 2);
        assert!(idea_file.contains("first"));
        assert!(idea_file.contains("second"));

        let note_file =
            fs::read_to_string(store.data_dir().join("notes").join("note.md")).unwrap();
        assert!(note_file.contains("plain note"));
    }
}
