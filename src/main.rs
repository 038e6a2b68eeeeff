mod config;
mod quiz;

use std::sync::Arc;

use chatgpt::client::ChatGPT;
use config::Config;
use dotenv::dotenv;
use quiz::{ai_helper::QuizHelper, export, Level, QuizDocument, QuizRequest, QuizType};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveSourceText,
    ReceiveLevel {
        source_text: String,
    },
    ReceiveQuizType {
        source_text: String,
        level: Level,
    },
    ReceiveQuestionCount {
        source_text: String,
        level: Level,
        quiz_type: QuizType,
    },
    Editing {
        quiz: QuizDocument,
    },
    EditingQuestions {
        quiz: QuizDocument,
    },
    EditingAnswerKey {
        quiz: QuizDocument,
    },
}

type QuizStorage = std::sync::Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting quiz maker bot...");

    let config = Config::from_env()?;

    let bot = Bot::from_env();

    log::info!("Opening dialogue storage at {}", config.db_path);
    let storage: QuizStorage = SqliteStorage::open(&config.db_path, Json).await?.erase();

    let gpt = {
        let mut gpt = ChatGPT::new(&config.chatgpt_api_key)?;

        gpt.config.engine = config.engine();
        gpt.config.timeout = config.timeout;
        gpt.config.temperature = config.temperature;

        gpt
    };
    let quiz_helper = Arc::new(QuizHelper::new(gpt));

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::filter(|msg: Message| msg.text() == Some(RESTART_COMMAND)).endpoint(start))
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveSourceText].endpoint(receive_source_text))
            .branch(dptree::case![State::ReceiveLevel { source_text }].endpoint(receive_level))
            .branch(
                dptree::case![State::ReceiveQuizType { source_text, level }]
                    .endpoint(receive_quiz_type),
            )
            .branch(
                dptree::case![State::ReceiveQuestionCount {
                    source_text,
                    level,
                    quiz_type
                }]
                .endpoint(receive_question_count),
            )
            .branch(dptree::case![State::Editing { quiz }].endpoint(editing))
            .branch(dptree::case![State::EditingQuestions { quiz }].endpoint(receive_questions))
            .branch(dptree::case![State::EditingAnswerKey { quiz }].endpoint(receive_answer_key)),
    )
    .dependencies(dptree::deps![storage, quiz_helper])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const RESTART_COMMAND: &str = "/start";
const GREETING_TEXT: &str = "Hi! I turn any text into an English exercise with an answer key. \
Paste the source text you want the quiz to be based on.";
const SOURCE_TEXT_PROMPT: &str = "Paste the source text for the new quiz.";

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(KeyboardRemove::new())
        .await?;

    dialogue.update(State::ReceiveSourceText).await?;
    Ok(())
}

async fn receive_source_text(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send the source text as a message")
            .await?;
        return Ok(());
    };

    let source_text = match quiz::validate_source_text(text) {
        Ok(source_text) => source_text,
        Err(err) => {
            bot.send_message(msg.chat.id, format!("Sorry, {}.", err)).await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "Choose the level")
        .reply_markup(level_keyboard())
        .await?;
    dialogue.update(State::ReceiveLevel { source_text }).await?;
    Ok(())
}

async fn receive_level(
    bot: Bot,
    dialogue: QuizDialogue,
    source_text: String,
    msg: Message,
) -> HandlerResult {
    match msg.text().map(str::parse::<Level>) {
        Some(Ok(level)) => {
            bot.send_message(msg.chat.id, "Choose the quiz type")
                .reply_markup(quiz_type_keyboard())
                .await?;
            dialogue
                .update(State::ReceiveQuizType { source_text, level })
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the levels")
                .reply_markup(level_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn receive_quiz_type(
    bot: Bot,
    dialogue: QuizDialogue,
    (source_text, level): (String, Level),
    msg: Message,
) -> HandlerResult {
    match msg.text().map(str::parse::<QuizType>) {
        Some(Ok(quiz_type)) => {
            bot.send_message(msg.chat.id, "How many questions?")
                .reply_markup(question_count_keyboard())
                .await?;
            dialogue
                .update(State::ReceiveQuestionCount {
                    source_text,
                    level,
                    quiz_type,
                })
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the quiz types")
                .reply_markup(quiz_type_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn receive_question_count(
    bot: Bot,
    dialogue: QuizDialogue,
    quiz_helper: Arc<QuizHelper>,
    (source_text, level, quiz_type): (String, Level, QuizType),
    msg: Message,
) -> HandlerResult {
    let Some(amount) = msg.text().and_then(|text| text.trim().parse::<usize>().ok()) else {
        bot.send_message(msg.chat.id, "Please enter a number").await?;
        return Ok(());
    };

    let request = match QuizRequest::new(&source_text, level, quiz_type, amount) {
        Ok(request) => request,
        Err(err) => {
            bot.send_message(msg.chat.id, format!("Sorry, {}.", err)).await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "Preparing your quiz, please wait a few seconds...")
        .reply_markup(KeyboardRemove::new())
        .await?;
    // Only cosmetic, so a failure here is ignored
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let generated = match quiz_helper.generate(&request).await {
        Ok(generated) => generated,
        Err(err) => {
            log::error!("Quiz generation failed: {}", err);
            bot.send_message(
                msg.chat.id,
                "Sorry, I couldn't generate the quiz. Send the number of questions again to retry.",
            )
            .reply_markup(question_count_keyboard())
            .await?;
            return Ok(());
        }
    };

    let quiz = QuizDocument::from_combined(&generated);
    send_quiz(&bot, msg.chat.id, &quiz).await?;
    dialogue.update(State::Editing { quiz }).await?;
    Ok(())
}

const SHOW_ANSWER_KEY: &str = "Show answer key";
const EDIT_QUESTIONS: &str = "Replace questions";
const EDIT_ANSWER_KEY: &str = "Replace answer key";
const DOWNLOAD_TEACHER: &str = "Download teacher copy";
const DOWNLOAD_STUDENT: &str = "Download student copy";
const NEW_QUIZ: &str = "New quiz";
const CANCEL: &str = "Cancel";

/// What a message in the editing state asks for.
#[derive(Debug, PartialEq, Eq)]
enum EditingAction<'a> {
    ShowAnswerKey,
    ReplaceQuestions,
    ReplaceAnswerKey,
    Download { include_answers: bool },
    NewQuiz,
    ShowMenu,
    Refine(&'a str),
}

impl<'a> EditingAction<'a> {
    // Button labels map to actions, anything else is an edit request for the model
    fn from_text(text: &'a str) -> Self {
        match text.trim() {
            SHOW_ANSWER_KEY => EditingAction::ShowAnswerKey,
            EDIT_QUESTIONS => EditingAction::ReplaceQuestions,
            EDIT_ANSWER_KEY => EditingAction::ReplaceAnswerKey,
            DOWNLOAD_TEACHER => EditingAction::Download {
                include_answers: true,
            },
            DOWNLOAD_STUDENT => EditingAction::Download {
                include_answers: false,
            },
            NEW_QUIZ => EditingAction::NewQuiz,
            // A stale cancel button or an empty message is not an edit request
            CANCEL | "" => EditingAction::ShowMenu,
            instruction => EditingAction::Refine(instruction),
        }
    }
}

async fn editing(
    bot: Bot,
    dialogue: QuizDialogue,
    quiz_helper: Arc<QuizHelper>,
    quiz: QuizDocument,
    msg: Message,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send your edit request as text")
            .reply_markup(editing_keyboard())
            .await?;
        return Ok(());
    };

    match EditingAction::from_text(text) {
        EditingAction::ShowAnswerKey => {
            let answer_key = if quiz.has_answer_key() {
                quiz.answer_key.as_str()
            } else {
                "(no answer key)"
            };
            send_long_text(&bot, msg.chat.id, answer_key).await?;
        }
        EditingAction::ReplaceQuestions => {
            bot.send_message(msg.chat.id, "Send the new questions. They replace the current ones.")
                .reply_markup(cancel_keyboard())
                .await?;
            dialogue.update(State::EditingQuestions { quiz }).await?;
        }
        EditingAction::ReplaceAnswerKey => {
            bot.send_message(
                msg.chat.id,
                "Send the new answer key. It replaces the current one.",
            )
            .reply_markup(cancel_keyboard())
            .await?;
            dialogue.update(State::EditingAnswerKey { quiz }).await?;
        }
        EditingAction::Download { include_answers } => {
            send_export(&bot, msg.chat.id, &quiz, include_answers).await?
        }
        EditingAction::NewQuiz => {
            bot.send_message(msg.chat.id, SOURCE_TEXT_PROMPT)
                .reply_markup(KeyboardRemove::new())
                .await?;
            dialogue.update(State::ReceiveSourceText).await?;
        }
        EditingAction::ShowMenu => {
            bot.send_message(msg.chat.id, "What next?")
                .reply_markup(editing_keyboard())
                .await?;
        }
        EditingAction::Refine(instruction) => {
            let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

            match quiz_helper.refine(&quiz.combined(), instruction).await {
                Ok(revised) => {
                    let quiz = QuizDocument::from_combined(&revised);
                    send_quiz(&bot, msg.chat.id, &quiz).await?;
                    dialogue.update(State::Editing { quiz }).await?;
                }
                // The current quiz stays as it was, so the request can simply be sent again
                Err(err) => {
                    log::error!("Quiz refinement failed: {}", err);
                    bot.send_message(
                        msg.chat.id,
                        "Sorry, I couldn't apply that change. Please try again.",
                    )
                    .reply_markup(editing_keyboard())
                    .await?;
                }
            }
        }
    }
    Ok(())
}

async fn receive_questions(
    bot: Bot,
    dialogue: QuizDialogue,
    quiz: QuizDocument,
    msg: Message,
) -> HandlerResult {
    let quiz = match msg.text() {
        Some(CANCEL) => quiz,
        Some(questions) => QuizDocument {
            questions: questions.trim().to_string(),
            ..quiz
        },
        None => {
            bot.send_message(msg.chat.id, "Please send the questions as text")
                .await?;
            return Ok(());
        }
    };
    bot.send_message(msg.chat.id, "Done. What next?")
        .reply_markup(editing_keyboard())
        .await?;
    dialogue.update(State::Editing { quiz }).await?;
    Ok(())
}

async fn receive_answer_key(
    bot: Bot,
    dialogue: QuizDialogue,
    quiz: QuizDocument,
    msg: Message,
) -> HandlerResult {
    let quiz = match msg.text() {
        Some(CANCEL) => quiz,
        Some(answer_key) => QuizDocument {
            answer_key: answer_key.trim().to_string(),
            ..quiz
        },
        None => {
            bot.send_message(msg.chat.id, "Please send the answer key as text")
                .await?;
            return Ok(());
        }
    };
    bot.send_message(msg.chat.id, "Done. What next?")
        .reply_markup(editing_keyboard())
        .await?;
    dialogue.update(State::Editing { quiz }).await?;
    Ok(())
}

async fn send_quiz(bot: &Bot, chat_id: ChatId, quiz: &QuizDocument) -> HandlerResult {
    send_long_text(bot, chat_id, &quiz.questions).await?;

    let footer = if quiz.has_answer_key() {
        "The answer key is hidden. Send an edit request (e.g. \"make question 2 easier\") or pick an option below."
    } else {
        "No answer key was found. Send an edit request or pick an option below."
    };
    bot.send_message(chat_id, footer)
        .reply_markup(editing_keyboard())
        .await?;
    Ok(())
}

async fn send_export(
    bot: &Bot,
    chat_id: ChatId,
    quiz: &QuizDocument,
    include_answers: bool,
) -> HandlerResult {
    let _ = bot.send_chat_action(chat_id, ChatAction::UploadDocument).await;

    let file = export_quiz(quiz, include_answers);
    log::info!("Sending {} to chat {}", file.file_name, chat_id.0);
    bot.send_document(chat_id, InputFile::memory(file.bytes).file_name(file.file_name))
        .reply_markup(editing_keyboard())
        .await?;
    Ok(())
}

// Title and file name stem of every export
const EXPORT_NAME: &str = "quiz";

fn export_quiz(quiz: &QuizDocument, include_answers: bool) -> export::ExportedFile {
    export::render(&quiz.combined(), include_answers, Some(EXPORT_NAME))
}

// Telegram rejects messages longer than 4096 characters
const MESSAGE_LIMIT: usize = 4000;

async fn send_long_text(bot: &Bot, chat_id: ChatId, text: &str) -> HandlerResult {
    let text = if text.trim().is_empty() { "(empty)" } else { text };
    for chunk in chunk_message(text, MESSAGE_LIMIT) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

/// Splits `text` on line boundaries into pieces of at most `limit` characters.
/// A single line longer than `limit` is cut as-is.
fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let mut line = line.chars().collect::<Vec<_>>();
        // +1 for the newline joining it to the previous line
        if current_len > 0 && current_len + 1 + line.len() > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        while line.len() > limit {
            let rest = line.split_off(limit);
            chunks.push(line.into_iter().collect());
            line = rest;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current_len += line.len();
        current.extend(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn level_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(
        Level::ALL
            .iter()
            .map(|level| vec![KeyboardButton::new(level.label())])
            .collect::<Vec<_>>(),
    )
}

fn quiz_type_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(
        QuizType::ALL
            .iter()
            .map(|quiz_type| vec![KeyboardButton::new(quiz_type.label())])
            .collect::<Vec<_>>(),
    )
}

fn question_count_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("5")],
        vec![KeyboardButton::new("10")],
        vec![KeyboardButton::new("15")],
    ])
}

fn editing_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(SHOW_ANSWER_KEY)],
        vec![
            KeyboardButton::new(EDIT_QUESTIONS),
            KeyboardButton::new(EDIT_ANSWER_KEY),
        ],
        vec![
            KeyboardButton::new(DOWNLOAD_TEACHER),
            KeyboardButton::new(DOWNLOAD_STUDENT),
        ],
        vec![KeyboardButton::new(NEW_QUIZ)],
    ])
}

fn cancel_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(CANCEL)]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_message("1. Who?\n2. Why?", 100), vec!["1. Who?\n2. Why?"]);
    }

    #[test]
    fn chunks_break_on_line_boundaries() {
        let chunks = chunk_message("aaaa\nbbbb\ncccc", 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn overlong_line_is_cut() {
        let chunks = chunk_message("abcdefghij\nxy", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij", "xy"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }

    #[test]
    fn menu_buttons_are_not_edit_requests() {
        assert_eq!(EditingAction::from_text(CANCEL), EditingAction::ShowMenu);
        assert_eq!(EditingAction::from_text("  "), EditingAction::ShowMenu);
        assert_eq!(
            EditingAction::from_text(DOWNLOAD_STUDENT),
            EditingAction::Download {
                include_answers: false
            }
        );
        assert_eq!(EditingAction::from_text(NEW_QUIZ), EditingAction::NewQuiz);
        assert_eq!(
            EditingAction::from_text(" Make question 2 easier \n"),
            EditingAction::Refine("Make question 2 easier")
        );
    }

    #[test]
    fn exports_are_named_after_the_quiz() {
        let quiz = QuizDocument::from_combined("1. Who?\nANSWER KEY\n1) A");

        let teacher = export_quiz(&quiz, true);
        assert_eq!(teacher.file_name, "quiz_teacher.txt");
        assert_eq!(
            std::str::from_utf8(&teacher.bytes).unwrap(),
            "quiz\n\n1. Who?\n\nANSWER KEY\n1) A\n"
        );

        let student = export_quiz(&quiz, false);
        assert_eq!(student.file_name, "quiz_student.txt");
        assert_eq!(std::str::from_utf8(&student.bytes).unwrap(), "quiz\n\n1. Who?\n");
    }

    #[test]
    fn keyboard_labels_parse_back() {
        for level in Level::ALL {
            assert_eq!(level.label().parse::<Level>(), Ok(level));
        }
        for quiz_type in QuizType::ALL {
            assert_eq!(quiz_type.label().parse::<QuizType>(), Ok(quiz_type));
        }
    }
}
