//! crates/study_assistant_core/src/parser.rs
//!
//! Turns the free-form text a generative model returns into flashcard and quiz
//! records.
//!
//! The model is asked for blocks separated by `---`, each block made of labelled
//! lines (`Q:`, `A:`, `D:` for flashcards; `Q:`, `O1:`..`O4:`, `C:`, `E:`, `D:` for
//! quiz questions). Nothing about that format is guaranteed, so parsing never
//! fails: unknown lines are ignored, blocks missing required fields are dropped
//! and a missing or unknown difficulty falls back to `medium`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{Difficulty, NewQuizQuestion};

/// Separates one record from the next in a model reply.
pub const BLOCK_DELIMITER: &str = "---";

/// Number of options every quiz question must carry.
pub const QUIZ_OPTION_COUNT: usize = 4;

static LABELLED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(Q|A|C|E|D|O[1-4]):(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Flashcard,
    QuizQuestion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFlashcard {
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuizQuestion {
    pub question: String,
    /// Option texts in the order their lines appeared.
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Flashcard(ParsedFlashcard),
    QuizQuestion(ParsedQuizQuestion),
}

/// The labelled fields found in one block. Later lines win for single-valued
/// labels; option lines accumulate.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockFields<'a> {
    pub question: Option<&'a str>,
    pub answer: Option<&'a str>,
    pub correct_answer: Option<&'a str>,
    pub explanation: Option<&'a str>,
    pub difficulty: Option<&'a str>,
    pub options: Vec<&'a str>,
}

//=========================================================================================
// Block Splitting and Field Extraction
//=========================================================================================

/// Splits a reply into non-blank, trimmed blocks.
pub fn split_blocks(raw_text: &str) -> impl Iterator<Item = &str> {
    raw_text
        .split(BLOCK_DELIMITER)
        .map(str::trim)
        .filter(|block| !block.is_empty())
}

/// Collects the labelled lines of a single block.
pub fn read_block(block: &str) -> BlockFields<'_> {
    let mut fields = BlockFields::default();

    for line in block.lines() {
        let Some(captures) = LABELLED_LINE.captures(line.trim()) else {
            continue;
        };
        let (Some(label), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let value = value.as_str().trim();

        match label.as_str() {
            "Q" => fields.question = Some(value),
            "A" => fields.answer = Some(value),
            "C" => fields.correct_answer = Some(value),
            "E" => fields.explanation = Some(value),
            "D" => fields.difficulty = Some(value),
            _ => fields.options.push(value),
        }
    }

    fields
}

//=========================================================================================
// Policies
//=========================================================================================

/// Maps a raw difficulty value onto the enumerated set, defaulting to `medium`.
pub fn resolve_difficulty(raw: Option<&str>) -> Difficulty {
    raw.map(|value| value.trim().to_lowercase())
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

/// A flashcard needs both a question and an answer.
pub fn is_valid_flashcard_block(fields: &BlockFields<'_>) -> bool {
    non_empty(fields.question) && non_empty(fields.answer)
}

/// A quiz question needs a question, exactly four options and a correct answer.
/// Whether the correct answer is one of the options is checked separately by
/// [`resolve_correct_option`].
pub fn is_valid_quiz_block(fields: &BlockFields<'_>) -> bool {
    non_empty(fields.question)
        && fields.options.len() == QUIZ_OPTION_COUNT
        && non_empty(fields.correct_answer)
}

fn non_empty(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Keeps a quiz question only when its correct answer matches exactly one option
/// (exact, case-sensitive), and flags that option as correct.
pub fn resolve_correct_option(question: ParsedQuizQuestion) -> Option<NewQuizQuestion> {
    let matches = question
        .options
        .iter()
        .filter(|option| **option == question.correct_answer)
        .count();
    if matches != 1 {
        return None;
    }

    let options = question
        .options
        .into_iter()
        .map(|option| {
            let is_correct = option == question.correct_answer;
            (option, is_correct)
        })
        .collect();

    Some(NewQuizQuestion {
        question: question.question,
        explanation: question.explanation,
        difficulty: question.difficulty,
        correct_answer: question.correct_answer,
        options,
    })
}

//=========================================================================================
// Parsing
//=========================================================================================

/// Every valid flashcard in the reply, in order and untruncated.
pub fn flashcard_candidates(raw_text: &str) -> impl Iterator<Item = ParsedFlashcard> + '_ {
    split_blocks(raw_text)
        .map(read_block)
        .filter(is_valid_flashcard_block)
        .map(|fields| ParsedFlashcard {
            question: fields.question.unwrap_or_default().to_string(),
            answer: fields.answer.unwrap_or_default().to_string(),
            difficulty: resolve_difficulty(fields.difficulty),
        })
}

/// Every valid quiz question in the reply, in order and untruncated.
pub fn quiz_candidates(raw_text: &str) -> impl Iterator<Item = ParsedQuizQuestion> + '_ {
    split_blocks(raw_text)
        .map(read_block)
        .filter(is_valid_quiz_block)
        .map(|fields| ParsedQuizQuestion {
            question: fields.question.unwrap_or_default().to_string(),
            options: fields.options.iter().map(|o| o.to_string()).collect(),
            correct_answer: fields.correct_answer.unwrap_or_default().to_string(),
            explanation: fields.explanation.unwrap_or_default().to_string(),
            difficulty: resolve_difficulty(fields.difficulty),
        })
}

/// Parses at most `expected_count` flashcards.
pub fn parse_flashcards(raw_text: &str, expected_count: usize) -> Vec<ParsedFlashcard> {
    flashcard_candidates(raw_text).take(expected_count).collect()
}

/// Parses at most `expected_count` quiz questions.
pub fn parse_quiz_questions(raw_text: &str, expected_count: usize) -> Vec<ParsedQuizQuestion> {
    quiz_candidates(raw_text).take(expected_count).collect()
}

/// Parses at most `expected_count` records of the requested kind.
pub fn parse_records(raw_text: &str, expected_count: usize, kind: RecordKind) -> Vec<ParsedRecord> {
    match kind {
        RecordKind::Flashcard => flashcard_candidates(raw_text)
            .take(expected_count)
            .map(ParsedRecord::Flashcard)
            .collect(),
        RecordKind::QuizQuestion => quiz_candidates(raw_text)
            .take(expected_count)
            .map(ParsedRecord::QuizQuestion)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz_block(question: &str, correct: &str) -> String {
        format!(
            "Q: {}\nO1: Paris\nO2: Berlin\nO3: Rome\nO4: Madrid\nC: {}\nE: Because.\nD: hard",
            question, correct
        )
    }

    fn flashcard_blocks(n: usize) -> String {
        (1..=n)
            .map(|i| format!("Q: Question {}\nA: Answer {}", i, i))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    #[test]
    fn test_parses_flashcards_and_defaults_difficulty() {
        let raw = "Q: What is 2+2?\nA: 4\nD: easy\n---\nQ: Capital of France?\nA: Paris";
        let cards = parse_flashcards(raw, 10);

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].question, "What is 2+2?");
        assert_eq!(cards[0].answer, "4");
        assert_eq!(cards[0].difficulty, Difficulty::Easy);
        assert_eq!(cards[1].question, "Capital of France?");
        assert_eq!(cards[1].difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_block_without_answer_is_dropped() {
        let complete = flashcard_blocks(3);
        let with_broken = format!("{}\n---\nQ: Orphan question\nD: hard", complete);

        assert_eq!(parse_flashcards(&complete, 10).len(), 3);
        assert_eq!(parse_flashcards(&with_broken, 10).len(), 3);

        let broken_in_middle = "Q: one\nA: 1\n---\nQ: two\n---\nQ: three\nA: 3";
        let cards = parse_flashcards(broken_in_middle, 10);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].question, "three");
    }

    #[test]
    fn test_truncates_to_expected_count_in_order() {
        let cards = parse_flashcards(&flashcard_blocks(5), 3);
        assert_eq!(
            cards.iter().map(|c| c.question.as_str()).collect::<Vec<_>>(),
            vec!["Question 1", "Question 2", "Question 3"]
        );
    }

    #[test]
    fn test_fewer_valid_blocks_than_requested_is_not_an_error() {
        assert_eq!(parse_flashcards(&flashcard_blocks(2), 10).len(), 2);
        assert!(parse_flashcards("", 10).is_empty());
        assert!(parse_flashcards("no labels here at all", 10).is_empty());
    }

    #[test]
    fn test_blank_blocks_and_unknown_lines_are_ignored() {
        let raw = "---\n   \n---\nCards:\nQ: Term?\nNote: ignore me\nA: Definition\n---\n\n";
        let cards = parse_flashcards(raw, 10);

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question, "Term?");
        assert_eq!(cards[0].answer, "Definition");
    }

    #[test]
    fn test_labels_tolerate_indentation_and_crlf() {
        let raw = "  Q:   Spaced out?  \r\n\tA: yes\r\n  D: HARD \r\n";
        let cards = parse_flashcards(raw, 1);

        assert_eq!(cards[0].question, "Spaced out?");
        assert_eq!(cards[0].answer, "yes");
        assert_eq!(cards[0].difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_resolve_difficulty_policy() {
        assert_eq!(resolve_difficulty(Some("easy")), Difficulty::Easy);
        assert_eq!(resolve_difficulty(Some(" Medium ")), Difficulty::Medium);
        assert_eq!(resolve_difficulty(Some("HARD")), Difficulty::Hard);
        assert_eq!(resolve_difficulty(Some("extreme")), Difficulty::Medium);
        assert_eq!(resolve_difficulty(Some("")), Difficulty::Medium);
        assert_eq!(resolve_difficulty(None), Difficulty::Medium);
    }

    #[test]
    fn test_flashcard_validity_policy() {
        assert!(is_valid_flashcard_block(&read_block("Q: a\nA: b")));
        assert!(!is_valid_flashcard_block(&read_block("Q: a\nA:")));
        assert!(!is_valid_flashcard_block(&read_block("A: b")));
        assert!(!is_valid_flashcard_block(&read_block("Question: a\nAnswer: b")));
    }

    #[test]
    fn test_parses_quiz_questions() {
        let raw = format!(
            "{}\n---\n{}",
            quiz_block("Capital of France?", "Paris"),
            quiz_block("Capital of Italy?", "Rome")
        );
        let questions = parse_quiz_questions(&raw, 5);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options, vec!["Paris", "Berlin", "Rome", "Madrid"]);
        assert_eq!(questions[0].correct_answer, "Paris");
        assert_eq!(questions[0].explanation, "Because.");
        assert_eq!(questions[0].difficulty, Difficulty::Hard);
        assert_eq!(questions[1].question, "Capital of Italy?");
    }

    #[test]
    fn test_quiz_block_needs_exactly_four_options_and_an_answer() {
        let three_options = "Q: q\nO1: a\nO2: b\nO3: c\nC: a";
        let five_options = "Q: q\nO1: a\nO2: b\nO3: c\nO4: d\nO1: e\nC: a";
        let no_answer = "Q: q\nO1: a\nO2: b\nO3: c\nO4: d\nE: why";
        let out_of_range_label = "Q: q\nO1: a\nO2: b\nO3: c\nO5: d\nC: a";

        for raw in [three_options, five_options, no_answer, out_of_range_label] {
            assert!(parse_quiz_questions(raw, 5).is_empty(), "should drop: {:?}", raw);
        }
    }

    #[test]
    fn test_correct_answer_mismatch_is_not_validated_at_parse_time() {
        let raw = quiz_block("Capital of France?", "paris");
        let questions = parse_quiz_questions(&raw, 5);

        assert_eq!(questions.len(), 1);
        assert!(!questions[0].options.contains(&questions[0].correct_answer));
    }

    #[test]
    fn test_resolve_correct_option_flags_the_single_match() {
        let parsed = parse_quiz_questions(&quiz_block("Capital of Italy?", "Rome"), 1).remove(0);
        let resolved = resolve_correct_option(parsed).expect("one option matches");

        assert_eq!(
            resolved.options,
            vec![
                ("Paris".to_string(), false),
                ("Berlin".to_string(), false),
                ("Rome".to_string(), true),
                ("Madrid".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_resolve_correct_option_drops_zero_or_ambiguous_matches() {
        let mismatch =
            parse_quiz_questions(&quiz_block("Capital of France?", "paris"), 1).remove(0);
        assert!(resolve_correct_option(mismatch).is_none());

        let duplicated = "Q: q\nO1: same\nO2: same\nO3: c\nO4: d\nC: same";
        let ambiguous = parse_quiz_questions(duplicated, 1).remove(0);
        assert!(resolve_correct_option(ambiguous).is_none());
    }

    #[test]
    fn test_parse_records_dispatches_on_kind() {
        let flashcards = parse_records(&flashcard_blocks(4), 2, RecordKind::Flashcard);
        assert_eq!(flashcards.len(), 2);
        assert!(matches!(flashcards[0], ParsedRecord::Flashcard(_)));

        let quiz = parse_records(&quiz_block("q?", "Rome"), 2, RecordKind::QuizQuestion);
        assert_eq!(quiz.len(), 1);
        assert!(matches!(quiz[0], ParsedRecord::QuizQuestion(_)));

        // Flashcard labels alone never make a quiz question.
        assert!(parse_records(&flashcard_blocks(3), 3, RecordKind::QuizQuestion).is_empty());
    }
}
