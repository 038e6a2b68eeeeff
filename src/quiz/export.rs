use crate::quiz::splitter::{self, ANSWER_KEY_MARKER};

const DEFAULT_TITLE: &str = "Generated Quiz";
const DEFAULT_FILE_STEM: &str = "quiz";
const MAX_FILE_STEM_CHARS: usize = 60;

/// A rendered quiz ready to be sent as a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Renders the combined quiz as a plain-text document.
///
/// The teacher copy keeps the answer key, the student copy stops at the marker.
pub fn render(combined: &str, include_answers: bool, filename_hint: Option<&str>) -> ExportedFile {
    let hint = filename_hint.map(str::trim).filter(|h| !h.is_empty());
    let doc = splitter::split(combined);

    let mut text = String::new();
    text.push_str(hint.unwrap_or(DEFAULT_TITLE));
    text.push_str("\n\n");
    text.push_str(&doc.questions);
    if include_answers && doc.has_answer_key() {
        text.push_str("\n\n");
        text.push_str(ANSWER_KEY_MARKER);
        text.push('\n');
        text.push_str(&doc.answer_key);
    }
    text.push('\n');

    let suffix = if include_answers { "teacher" } else { "student" };
    let file_name = format!(
        "{}_{}.txt",
        sanitize_file_stem(hint.unwrap_or(DEFAULT_FILE_STEM)),
        suffix
    );
    log::debug!("Rendered {} ({} bytes)", file_name, text.len());

    ExportedFile {
        file_name,
        bytes: text.into_bytes(),
    }
}

/// Replaces every run of characters outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    let mut stem = String::new();
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
            stem.push(c);
            in_run = false;
        } else if !in_run {
            stem.push('_');
            in_run = true;
        }
    }
    let stem = stem.chars().take(MAX_FILE_STEM_CHARS).collect::<String>();
    if stem.is_empty() {
        return DEFAULT_FILE_STEM.to_string();
    }
    stem
}
