use crate::quiz::QuizDocument;

/// Marker line emitted by [`join`] between the questions and the answer key.
pub const ANSWER_KEY_MARKER: &str = "ANSWER KEY";

// Markup a generator may wrap around the marker line (bold, headings, quotes...)
const DECORATION_CHARS: [char; 6] = ['*', '_', '`', '~', '#', '>'];

// Whitespace plus the byte order mark, which some generators leave in front of lines
fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Trims whitespace and byte order marks from both ends.
pub fn trim_blank(text: &str) -> &str {
    text.trim_matches(is_blank)
}

fn normalize_line(line: &str) -> String {
    trim_blank(line)
        .chars()
        .filter(|c| !DECORATION_CHARS.contains(c))
        .collect::<String>()
        .split(is_blank)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `line` separates the questions from the answer key,
/// e.g. "ANSWER KEY", "**Answer key:**" or "## Answer Key".
pub fn is_boundary_marker(line: &str) -> bool {
    let normalized = normalize_line(line);
    normalized == "answer key" || normalized == "answer key:"
}

/// Splits a generated quiz into its questions and answer key.
///
/// Only the first marker line counts; it is dropped from both halves.
/// Without a marker the whole text is returned trimmed but otherwise untouched,
/// line endings included.
pub fn split(combined: &str) -> QuizDocument {
    let text = combined.replace("\r\n", "\n");
    let lines = text.split('\n').collect::<Vec<_>>();

    match lines.iter().position(|line| is_boundary_marker(line)) {
        Some(idx) => QuizDocument {
            questions: trim_blank(&lines[..idx].join("\n")).to_string(),
            answer_key: trim_blank(&lines[idx + 1..].join("\n")).to_string(),
        },
        None => QuizDocument {
            questions: trim_blank(combined).to_string(),
            answer_key: String::new(),
        },
    }
}

/// Joins the two halves back into the single text the services expect.
pub fn join(questions: &str, answer_key: &str) -> String {
    let questions = trim_blank(questions);
    let answer_key = trim_blank(answer_key);
    if answer_key.is_empty() {
        return questions.to_string();
    }
    format!("{}\n\n{}\n{}", questions, ANSWER_KEY_MARKER, answer_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input_splits_into_empty_parts() {
        let doc = split("");
        assert_eq!(doc.questions, "");
        assert_eq!(doc.answer_key, "");
    }

    #[test]
    fn splits_on_plain_marker() {
        let doc = split("Q1. ...\nQ2. ...\nAnswer Key\n1. A\n2. B");
        assert_eq!(doc.questions, "Q1. ...\nQ2. ...");
        assert_eq!(doc.answer_key, "1. A\n2. B");
    }

    #[test]
    fn recognizes_markup_decorated_marker() {
        let doc = split("Intro\n## Answer Key\n1. A");
        assert_eq!(doc.questions, "Intro");
        assert_eq!(doc.answer_key, "1. A");

        let doc = split("Intro\n**ANSWER   KEY:**\n1) B");
        assert_eq!(doc.questions, "Intro");
        assert_eq!(doc.answer_key, "1) B");

        let doc = split("Intro\n> _answer key_\n1) C");
        assert_eq!(doc.answer_key, "1) C");
    }

    #[test]
    fn crlf_line_endings_are_normalized() {
        let doc = split("1. Who?\r\n\r\nANSWER KEY\r\n1) A\r\n");
        assert_eq!(doc.questions, "1. Who?");
        assert_eq!(doc.answer_key, "1) A");
    }

    #[test]
    fn missing_marker_keeps_everything_as_questions() {
        let doc = split("\n\n  Title: Cats\n1. What do cats eat?\n\n");
        assert_eq!(doc.questions, "Title: Cats\n1. What do cats eat?");
        assert_eq!(doc.answer_key, "");
    }

    #[test]
    fn punctuation_is_not_stripped_from_marker_candidates() {
        assert!(!is_boundary_marker("Answer key?"));
        assert!(!is_boundary_marker("(Answer key)"));
        assert!(!is_boundary_marker("The answer key is below"));
        assert!(is_boundary_marker("  ~~Answer Key~~  "));
        assert!(is_boundary_marker("`answer\tkey:`"));
    }

    #[test]
    fn marker_at_the_end_leaves_empty_answer_key() {
        let doc = split("1. Who?\nANSWER KEY\n   \n");
        assert_eq!(doc.questions, "1. Who?");
        assert_eq!(doc.answer_key, "");
    }

    #[test]
    fn only_first_marker_is_a_boundary() {
        let doc = split("1. Who?\nANSWER KEY\n1) A\n## Answer Key\n2) B");
        assert_eq!(doc.questions, "1. Who?");
        assert_eq!(doc.answer_key, "1) A\n## Answer Key\n2) B");
    }

    #[test]
    fn internal_blank_lines_are_preserved() {
        let doc = split("1. Who?\n\n\nA) me\n\nAnswer key\n1) A\n\n2) B");
        assert_eq!(doc.questions, "1. Who?\n\n\nA) me");
        assert_eq!(doc.answer_key, "1) A\n\n2) B");
    }

    #[test]
    fn join_without_answer_key_emits_no_marker() {
        assert_eq!(join("  1. Who?\n", ""), "1. Who?");
        assert_eq!(join("1. Who?", "  \n "), "1. Who?");
        assert_eq!(join("", ""), "");
    }

    #[test]
    fn join_uses_canonical_marker() {
        assert_eq!(
            join("1. Who?\n", "\n1) A"),
            "1. Who?\n\nANSWER KEY\n1) A"
        );
    }

    #[test]
    fn decorated_marker_is_canonicalized_on_round_trip() {
        let doc = split("1. Who?\n**Answer key:**\n1) A");
        assert_eq!(doc.combined(), "1. Who?\n\nANSWER KEY\n1) A");
    }

    #[test]
    fn crlf_text_without_marker_keeps_its_line_endings() {
        let doc = split("1. Who?\r\nA) me\r\n");
        assert_eq!(doc.questions, "1. Who?\r\nA) me");
        assert_eq!(doc.answer_key, "");
    }

    #[test]
    fn byte_order_mark_is_treated_as_blank() {
        let doc = split("\u{feff}Q1\n\u{feff}ANSWER KEY\n1) A");
        assert_eq!(doc.questions, "Q1");
        assert_eq!(doc.answer_key, "1) A");
        assert!(is_boundary_marker("\u{feff}## Answer\u{feff}Key"));
        assert_eq!(join("\u{feff}1. Who?", "\u{feff}"), "1. Who?");
    }

    // Lines drawn from text, tabs and every decoration character, so blank
    // lines and decorated non-marker lines show up too.
    fn marker_free_text(line_ending: &'static str) -> impl Strategy<Value = String> {
        prop::collection::vec("[a-zA-Z0-9 \t.?:)(*_`~#>]{0,20}", 0..8)
            .prop_map(move |lines| lines.join(line_ending))
            .prop_filter("no marker lines", |text| {
                !text.lines().any(is_boundary_marker)
            })
    }

    fn any_line_ending() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("\n"), Just("\r\n")]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn text_without_marker_is_all_questions(
            text in any_line_ending().prop_flat_map(marker_free_text)
        ) {
            let doc = split(&text);
            prop_assert_eq!(doc.questions, text.trim());
            prop_assert_eq!(doc.answer_key, "");
        }

        #[test]
        fn split_undoes_join(questions in marker_free_text("\n"), answer_key in marker_free_text("\n")) {
            prop_assume!(!answer_key.trim().is_empty());
            let doc = split(&join(&questions, &answer_key));
            prop_assert_eq!(doc.questions, questions.trim());
            prop_assert_eq!(doc.answer_key, answer_key.trim());
        }

        #[test]
        fn join_after_split_is_idempotent(questions in marker_free_text("\n"), answer_key in marker_free_text("\n")) {
            prop_assume!(!answer_key.trim().is_empty());
            let combined = join(&questions, &answer_key);
            let doc = split(&combined);
            prop_assert_eq!(join(&doc.questions, &doc.answer_key), combined);
        }
    }
}
