pub mod ai_helper;
pub mod export;
pub mod splitter;

use std::fmt;
use std::str::FromStr;

pub const MIN_SOURCE_TEXT_CHARS: usize = 10;
pub const MAX_QUESTION_COUNT: usize = 15;

/// The working copy of a quiz: questions and answer key, edited independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizDocument {
    pub questions: String,
    pub answer_key: String,
}

impl QuizDocument {
    pub fn from_combined(text: &str) -> Self {
        splitter::split(text)
    }

    /// The single text sent back to the generator or to the export.
    pub fn combined(&self) -> String {
        splitter::join(&self.questions, &self.answer_key)
    }

    pub fn has_answer_key(&self) -> bool {
        !self.answer_key.trim().is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizRequestError {
    #[error("source text must be at least {} characters long", MIN_SOURCE_TEXT_CHARS)]
    SourceTooShort,
    #[error("number of questions must be between 1 and {}, got {0}", MAX_QUESTION_COUNT)]
    QuestionCountOutOfRange(usize),
    #[error("unknown level: {0}")]
    InvalidLevel(String),
    #[error("unknown quiz type: {0}")]
    InvalidQuizType(String),
}

// CEFR levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Level {
    A1,
    A2,
    #[default]
    B1,
    B2,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::A1, Level::A2, Level::B1, Level::B2];

    pub fn code(&self) -> &'static str {
        match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
            Level::B2 => "B2",
        }
    }

    /// Button label, e.g. "B1 - Intermediate"
    pub fn label(&self) -> &'static str {
        match self {
            Level::A1 => "A1 - Beginner",
            Level::A2 => "A2 - Elementary",
            Level::B1 => "B1 - Intermediate",
            Level::B2 => "B2 - Upper Intermediate",
        }
    }
}

impl FromStr for Level {
    type Err = QuizRequestError;

    // Accepts both the bare code and the button label
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.split_whitespace().next().unwrap_or_default();
        Level::ALL
            .into_iter()
            .find(|level| level.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| QuizRequestError::InvalidLevel(s.trim().to_string()))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QuizType {
    #[default]
    Reading,
    Grammar,
    Vocabulary,
    TrueFalse,
}

impl QuizType {
    pub const ALL: [QuizType; 4] = [
        QuizType::Reading,
        QuizType::Grammar,
        QuizType::Vocabulary,
        QuizType::TrueFalse,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            QuizType::Reading => "reading",
            QuizType::Grammar => "grammar",
            QuizType::Vocabulary => "vocabulary",
            QuizType::TrueFalse => "truefalse",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuizType::Reading => "Reading Comprehension",
            QuizType::Grammar => "Grammar",
            QuizType::Vocabulary => "Vocabulary",
            QuizType::TrueFalse => "True/False",
        }
    }

    /// Name used in the quiz header line, e.g. "Reading"
    pub fn title(&self) -> &'static str {
        match self {
            QuizType::Reading => "Reading",
            QuizType::Grammar => "Grammar",
            QuizType::Vocabulary => "Vocabulary",
            QuizType::TrueFalse => "Truefalse",
        }
    }
}

impl FromStr for QuizType {
    type Err = QuizRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        QuizType::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(s) || t.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| QuizRequestError::InvalidQuizType(s.to_string()))
    }
}

impl fmt::Display for QuizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Everything the generator needs to create a new quiz.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizRequest {
    pub source_text: String,
    pub level: Level,
    pub quiz_type: QuizType,
    pub question_count: usize,
}

impl QuizRequest {
    pub fn new(
        source_text: &str,
        level: Level,
        quiz_type: QuizType,
        question_count: usize,
    ) -> Result<Self, QuizRequestError> {
        let source_text = validate_source_text(source_text)?;
        let question_count = validate_question_count(question_count)?;
        Ok(Self {
            source_text,
            level,
            quiz_type,
            question_count,
        })
    }
}

pub fn validate_source_text(text: &str) -> Result<String, QuizRequestError> {
    let text = text.trim();
    if text.chars().count() < MIN_SOURCE_TEXT_CHARS {
        return Err(QuizRequestError::SourceTooShort);
    }
    Ok(text.to_string())
}

pub fn validate_question_count(count: usize) -> Result<usize, QuizRequestError> {
    if !(1..=MAX_QUESTION_COUNT).contains(&count) {
        return Err(QuizRequestError::QuestionCountOutOfRange(count));
    }
    Ok(count)
}
