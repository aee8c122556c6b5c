// src/services/normalizer.rs
//
// Converts raw trivia records into quiz-ready questions: entity-decoded
// text, an unbiased option shuffle, and a verified single-correct-option
// invariant.

use std::fmt;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use uuid::Uuid;

use crate::models::quiz::{Difficulty, Question, QuestionOption};
use crate::services::trivia::RawTriviaQuestion;

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&[#\w]+;").unwrap());

/// Per-item ingestion failure. Rejected items are reported, not silently
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    EmptyQuestion,
    EmptyCorrectAnswer,
    /// Total candidate count (correct + incorrect) outside 2-6.
    OptionCountOutOfRange(usize),
    /// The correct answer string was not found among the decoded options.
    CorrectAnswerNotFound,
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::EmptyQuestion => write!(f, "question text is empty"),
            NormalizeError::EmptyCorrectAnswer => write!(f, "correct answer is empty"),
            NormalizeError::OptionCountOutOfRange(n) => {
                write!(f, "candidate answer count {n} is outside 2-6")
            }
            NormalizeError::CorrectAnswerNotFound => {
                write!(f, "correct answer not found among decoded options")
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Decodes the fixed HTML entity table the upstream is known to emit.
/// Unknown entities pass through unchanged.
pub fn decode_entities(input: &str) -> String {
    ENTITY_RE
        .replace_all(input, |caps: &regex::Captures| {
            match &caps[0] {
                "&amp;" => "&",
                "&lt;" => "<",
                "&gt;" => ">",
                "&quot;" => "\"",
                "&#039;" => "'",
                "&ldquo;" => "\u{201c}",
                "&rdquo;" => "\u{201d}",
                "&rsquo;" => "\u{2019}",
                "&lsquo;" => "\u{2018}",
                "&hellip;" => "...",
                "&ndash;" => "\u{2013}",
                "&mdash;" => "\u{2014}",
                other => other,
            }
            .to_string()
        })
        .into_owned()
}

/// In-place Fisher-Yates, uniform over all permutations.
fn fisher_yates<T>(items: &mut [T], rng: &mut impl Rng) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Normalizes one raw record into a `Question`.
///
/// The candidate set is the correct answer plus the incorrect ones, decoded
/// and shuffled to destroy the upstream's correct-answer-first ordering.
/// Exactly one option is marked correct, by exact post-decode string match;
/// duplicated answer text marks only the first occurrence.
pub fn normalize_question(raw: &RawTriviaQuestion) -> Result<Question, NormalizeError> {
    let text = decode_entities(raw.question.trim());
    if text.is_empty() {
        return Err(NormalizeError::EmptyQuestion);
    }

    let correct = decode_entities(raw.correct_answer.trim());
    if correct.is_empty() {
        return Err(NormalizeError::EmptyCorrectAnswer);
    }

    let mut candidates: Vec<String> = Vec::with_capacity(raw.incorrect_answers.len() + 1);
    candidates.push(correct.clone());
    for incorrect in &raw.incorrect_answers {
        candidates.push(decode_entities(incorrect.trim()));
    }

    if candidates.len() < 2 || candidates.len() > 6 {
        return Err(NormalizeError::OptionCountOutOfRange(candidates.len()));
    }

    fisher_yates(&mut candidates, &mut rand::thread_rng());

    let correct_index = candidates
        .iter()
        .position(|c| *c == correct)
        .ok_or(NormalizeError::CorrectAnswerNotFound)?;

    let options = candidates
        .into_iter()
        .enumerate()
        .map(|(i, text)| QuestionOption {
            id: Uuid::new_v4(),
            text,
            is_correct: i == correct_index,
        })
        .collect();

    let difficulty = Difficulty::parse(&raw.difficulty.to_lowercase()).unwrap_or(Difficulty::Easy);

    Ok(Question {
        id: Uuid::new_v4(),
        text,
        options,
        explanation: Some(format!("The correct answer is: {correct}")),
        difficulty,
        points: difficulty.points(),
    })
}

/// Outcome of a tolerant batch run: rejected items are reported alongside
/// their input position, and the rest of the batch goes through.
#[derive(Debug)]
pub struct NormalizedBatch {
    pub questions: Vec<Question>,
    pub rejected: Vec<(usize, NormalizeError)>,
}

pub fn normalize_batch(raws: &[RawTriviaQuestion]) -> NormalizedBatch {
    let mut questions = Vec::with_capacity(raws.len());
    let mut rejected = Vec::new();

    for (index, raw) in raws.iter().enumerate() {
        match normalize_question(raw) {
            Ok(question) => questions.push(question),
            Err(err) => {
                tracing::warn!("Rejected trivia record {}: {}", index, err);
                rejected.push((index, err));
            }
        }
    }

    NormalizedBatch { questions, rejected }
}

/// All-or-nothing variant: the first rejected item fails the whole batch.
pub fn normalize_batch_atomic(
    raws: &[RawTriviaQuestion],
) -> Result<Vec<Question>, (usize, NormalizeError)> {
    raws.iter()
        .enumerate()
        .map(|(index, raw)| normalize_question(raw).map_err(|err| (index, err)))
        .collect()
}
