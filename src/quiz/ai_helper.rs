use crate::quiz::{splitter::ANSWER_KEY_MARKER, Level, QuizRequest, QuizType};
use chatgpt::prelude::*;
use chatgpt::types::{ChatMessage, CompletionResponse, Role};
use once_cell::sync::Lazy;
use regex::Regex;

// First line of every generated quiz: "Level: B1 | Type: Reading Exercise"
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*Level:\s*(A1|A2|B1|B2)\s*\|\s*Type:\s*([A-Za-z]+)")
        .expect("header pattern is valid")
});

/// Talks to the generation service: creates new quizzes and applies edit requests.
pub struct QuizHelper {
    chat_gpt: ChatGPT,
}

impl QuizHelper {
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }

    /// Creates a whole quiz (questions followed by an answer key) from the request.
    pub async fn generate(&self, request: &QuizRequest) -> Result<String> {
        log::info!(
            "Generating {} quiz ({}, {} questions)",
            request.quiz_type,
            request.level,
            request.question_count
        );
        let history = vec![
            message(
                Role::System,
                generation_system_prompt(request.level, request.quiz_type, request.question_count),
            ),
            message(Role::User, generation_user_prompt(request)),
        ];
        self.complete(&history).await
    }

    /// Applies `instruction` to the combined quiz text and returns the full revised quiz.
    pub async fn refine(&self, combined: &str, instruction: &str) -> Result<String> {
        let (level, quiz_type) = extract_header_meta(combined);
        log::info!("Refining {} quiz ({}): {:?}", quiz_type, level, instruction);
        let history = vec![
            message(Role::System, refine_system_prompt(level, quiz_type)),
            message(Role::User, refine_user_prompt(combined, instruction)),
        ];
        self.complete(&history).await
    }

    async fn complete(&self, history: &Vec<ChatMessage>) -> Result<String> {
        let response: CompletionResponse = self.chat_gpt.send_history(history).await?;
        let content = response.message().clone().content;

        log::debug!("Completion: {:?}", content);

        let content = content.trim();
        if content.is_empty() {
            return Err(chatgpt::err::Error::BackendError {
                message: "The model returned an empty quiz".to_string(),
                error_type: "QuizError".to_string(),
            });
        }
        Ok(content.to_string())
    }
}

fn message(role: Role, content: String) -> ChatMessage {
    ChatMessage { role, content }
}

/// Reads level and quiz type back from the header line.
/// Falls back to B1 reading when the header is missing or unrecognized.
pub fn extract_header_meta(quiz_text: &str) -> (Level, QuizType) {
    let Some(caps) = HEADER_RE.captures(quiz_text) else {
        return (Level::B1, QuizType::Reading);
    };
    let level = caps[1].parse().unwrap_or_default();
    let quiz_type = caps[2].parse().unwrap_or_default();
    (level, quiz_type)
}

pub fn level_profile(level: Level) -> &'static str {
    match level {
        Level::A1 => {
            "Vocabulary: very basic everyday words. \
             Sentences: very short and simple (5-8 words). \
             Tenses: present simple; avoid complex clauses; no passive."
        }
        Level::A2 => {
            "Vocabulary: basic everyday with simple time words. \
             Sentences: short (8-12 words). \
             Tenses: present simple/past simple; limited adjectives; no conditionals."
        }
        Level::B1 => {
            "Vocabulary: common academic and daily-life words. \
             Sentences: medium length (10-16 words). \
             Tenses: present/past/simple future; some connectors (because/so/but)."
        }
        Level::B2 => {
            "Vocabulary: upper-intermediate; use paraphrase when needed. \
             Sentences: medium-long (12-20 words). \
             Tenses: mix of present, past, present perfect; clear cohesion."
        }
    }
}

pub fn type_spec(quiz_type: QuizType, question_count: usize) -> String {
    match quiz_type {
        QuizType::Grammar => format!(
            "Create exactly {} questions:\n\
             - About half: multiple-choice (A-D) focusing on target grammar or tenses.\n\
             - The rest: fill-in-the-blank (e.g., 'He (go) to school ____.').\n\
             Ensure only ONE correct answer per question.",
            question_count
        ),
        QuizType::Reading => format!(
            "Create exactly {} questions based on the source ideas (paraphrased):\n\
             - Most questions: reading comprehension (who/what/when/where/why/how).\n\
             - The last one or two: vocabulary-in-context (synonym/meaning) with options A-D.",
            question_count
        ),
        QuizType::Vocabulary => format!(
            "Create exactly {} questions focusing on vocabulary:\n\
             - At least half multiple-choice (A-D) for meaning/synonym/collocation.\n\
             - The rest may be matching (word -> definition) or fill-in-the-blank.",
            question_count
        ),
        QuizType::TrueFalse => format!(
            "Create exactly {} true/false statements based on the source ideas (paraphrased):\n\
             - Mix true and false statements.\n\
             - Every false statement must be clearly contradicted by the source.",
            question_count
        ),
    }
}

fn header_line(level: Level, quiz_type: QuizType) -> String {
    format!("Level: {} | Type: {} Exercise", level, quiz_type.title())
}

pub fn generation_system_prompt(level: Level, quiz_type: QuizType, question_count: usize) -> String {
    format!(
        "You are an expert English teacher assistant who generates classroom-ready exercises.\n\
         CEFR level: {level}. Exercise type: {quiz_type}.\n\
         OUTPUT RULES (MANDATORY):\n\
         - Plain text ONLY (no Markdown, no **bold**, no bullets).\n\
         - Do NOT copy the source text verbatim; paraphrase ideas.\n\
         - Begin with a header line: 'Level: <A1/A2/B1/B2> | Type: <Reading/Grammar/Vocabulary/Truefalse> Exercise'.\n\
         - Provide Title and short Instructions (1-2 sentences).\n\
         - Number questions 1.-{question_count}. (exactly {question_count} questions).\n\
         - Multiple-choice options must be formatted as: A) ..., B) ..., C) ..., D) ...\n\
         - Finish with a section titled exactly: {ANSWER_KEY_MARKER} (on its own line), \
         then {question_count} lines like '1) B'.\n\
         - Level profile to respect: {profile}",
        profile = level_profile(level),
    )
}

pub fn generation_user_prompt(request: &QuizRequest) -> String {
    let numbered_questions = (1..=request.question_count)
        .map(|i| format!("{}. <question>", i))
        .collect::<Vec<_>>()
        .join("\n");
    let numbered_answers = (1..=request.question_count)
        .map(|i| format!("{}) <A/B/C/D or short answer>", i))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "### HEADER ###\n\
         {header}\n\n\
         ### TASK ###\n\
         Use the source ideas below (do NOT copy sentences) to create an exercise.\n\
         Provide a clear title and short instructions, then {count} numbered questions and an {ANSWER_KEY_MARKER}.\n\n\
         SOURCE TEXT:\n\
         {source}\n\n\
         TYPE SPEC:\n\
         {spec}\n\n\
         OUTPUT FORMAT (STRICT):\n\
         Title: <short title>\n\
         Instructions: <1-2 sentences>\n\
         {numbered_questions}\n\
         {ANSWER_KEY_MARKER}\n\
         {numbered_answers}\n",
        header = header_line(request.level, request.quiz_type),
        count = request.question_count,
        source = request.source_text,
        spec = type_spec(request.quiz_type, request.question_count),
    )
}

pub fn refine_system_prompt(level: Level, quiz_type: QuizType) -> String {
    format!(
        "You are an assistant that REVISES an existing English exercise.\n\
         HARD REQUIREMENTS:\n\
         1) Do MINIMAL necessary changes to satisfy the user's request. Do NOT rewrite the whole quiz.\n\
         2) PRESERVE the overall format EXACTLY:\n\
         \x20  - First line (header): 'Level: <A1/A2/B1/B2> | Type: <Reading/Grammar/Vocabulary/Truefalse> Exercise'\n\
         \x20  - Then: Title, Instructions, the numbered questions, then '{ANSWER_KEY_MARKER}' on its own line \
         with one line '1) ...' per question.\n\
         3) Keep any text that is not directly affected by the request VERBATIM (unchanged).\n\
         4) If a question becomes multiple-choice, format options exactly: A) ..., B) ..., C) ..., D) ... \
         with ONE correct answer.\n\
         5) No Markdown, no explanations.\n\
         6) Keep CEFR level = {level} and exercise type = {quiz_type}.\n"
    )
}

pub fn refine_user_prompt(combined: &str, instruction: &str) -> String {
    format!(
        "CURRENT QUIZ (preserve structure and all unchanged lines verbatim):\n\
         {combined}\n\n\
         EDIT REQUEST (apply only what is necessary; if ambiguous, choose the smallest change that satisfies it):\n\
         {instruction}\n\n\
         Return the FULL revised quiz in the SAME format (header + title + instructions + questions + {ANSWER_KEY_MARKER})."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> QuizRequest {
        QuizRequest::new(
            "Bees collect nectar from flowers and turn it into honey.",
            Level::A2,
            QuizType::Grammar,
            3,
        )
        .unwrap()
    }

    #[test]
    fn header_meta_is_extracted() {
        let quiz = "Level: B2 | Type: Vocabulary Exercise\nTitle: Bees\n1. ...";
        assert_eq!(extract_header_meta(quiz), (Level::B2, QuizType::Vocabulary));
    }

    #[test]
    fn header_meta_is_case_insensitive_and_found_on_any_line() {
        let quiz = "Some preamble\n  level: a1 |  type: GRAMMAR exercise\n1. ...";
        assert_eq!(extract_header_meta(quiz), (Level::A1, QuizType::Grammar));
    }

    #[test]
    fn header_meta_falls_back_to_b1_reading() {
        assert_eq!(extract_header_meta(""), (Level::B1, QuizType::Reading));
        assert_eq!(
            extract_header_meta("Level: C2 | Type: Grammar"),
            (Level::B1, QuizType::Reading)
        );
        // Unknown type still keeps the level
        assert_eq!(
            extract_header_meta("Level: A2 | Type: Essay Exercise"),
            (Level::A2, QuizType::Reading)
        );
    }

    #[test]
    fn generated_header_round_trips_through_extraction() {
        for level in Level::ALL {
            for quiz_type in QuizType::ALL {
                let header = header_line(level, quiz_type);
                assert_eq!(extract_header_meta(&header), (level, quiz_type), "{}", header);
            }
        }
    }

    #[test]
    fn generation_prompts_carry_request_details() {
        let request = request();
        let system = generation_system_prompt(request.level, request.quiz_type, request.question_count);
        assert!(system.contains("CEFR level: A2. Exercise type: grammar."));
        assert!(system.contains(level_profile(Level::A2)));
        assert!(system.contains("exactly 3 questions"));

        let user = generation_user_prompt(&request);
        assert!(user.contains("Level: A2 | Type: Grammar Exercise"));
        assert!(user.contains("Bees collect nectar"));
        assert!(user.contains("3. <question>\nANSWER KEY\n1) "));
        assert!(!user.contains("4. <question>"));
    }

    #[test]
    fn refine_prompts_keep_level_and_type() {
        let system = refine_system_prompt(Level::B2, QuizType::TrueFalse);
        assert!(system.contains("Keep CEFR level = B2 and exercise type = truefalse."));

        let user = refine_user_prompt("1. Who?\n\nANSWER KEY\n1) A", "Make question 1 harder");
        assert!(user.contains("1. Who?\n\nANSWER KEY\n1) A"));
        assert!(user.contains("Make question 1 harder"));
    }

    #[test]
    fn type_spec_uses_question_count() {
        for quiz_type in QuizType::ALL {
            assert!(type_spec(quiz_type, 12).contains("exactly 12"));
        }
    }
}
