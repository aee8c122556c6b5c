// src/models/quiz.rs

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Difficulty of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Fixed difficulty-to-points table. Unknown difficulties are parsed
    /// to `Easy` upstream and land on 1 point.
    pub fn points(self) -> i32 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty of a whole quiz. `Mixed` covers quizzes whose questions span
/// several difficulties (e.g., generated ones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizDifficulty {
    Easy,
    Medium,
    Hard,
    Mixed,
}

impl QuizDifficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizDifficulty::Easy => "easy",
            QuizDifficulty::Medium => "medium",
            QuizDifficulty::Hard => "hard",
            QuizDifficulty::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(QuizDifficulty::Easy),
            "medium" => Some(QuizDifficulty::Medium),
            "hard" => Some(QuizDifficulty::Hard),
            "mixed" => Some(QuizDifficulty::Mixed),
            _ => None,
        }
    }

    /// The concrete difficulty to request from the trivia source.
    /// `Mixed` maps to no difficulty filter at all.
    pub fn as_question_difficulty(self) -> Option<Difficulty> {
        match self {
            QuizDifficulty::Easy => Some(Difficulty::Easy),
            QuizDifficulty::Medium => Some(Difficulty::Medium),
            QuizDifficulty::Hard => Some(Difficulty::Hard),
            QuizDifficulty::Mixed => None,
        }
    }
}

impl fmt::Display for QuizDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quiz category. Each variant knows its Open Trivia DB numeric category id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technology,
    Science,
    Mathematics,
    History,
    Literature,
    Sports,
    General,
    Programming,
}

impl Category {
    /// Upstream category id ('Science: Computers' doubles for both
    /// technology and programming, same as the original mapping).
    pub fn trivia_id(self) -> u32 {
        match self {
            Category::Technology => 18,
            Category::Science => 17,
            Category::Mathematics => 19,
            Category::History => 23,
            Category::Literature => 10,
            Category::Sports => 21,
            Category::General => 9,
            Category::Programming => 18,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Mathematics => "mathematics",
            Category::History => "history",
            Category::Literature => "literature",
            Category::Sports => "sports",
            Category::General => "general",
            Category::Programming => "programming",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "technology" => Some(Category::Technology),
            "science" => Some(Category::Science),
            "mathematics" => Some(Category::Mathematics),
            "history" => Some(Category::History),
            "literature" => Some(Category::Literature),
            "sports" => Some(Category::Sports),
            "general" => Some(Category::General),
            "programming" => Some(Category::Programming),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single answer option embedded in a question.
/// `is_correct` must never reach a taker; see the `*ForTaker` DTOs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

/// A multiple-choice question embedded in a quiz document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    pub points: i32,
}

impl Question {
    pub fn option(&self, id: Uuid) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

/// The quiz aggregate. Questions are embedded (stored as a JSONB column),
/// `attempts`/`average_score` are running aggregates updated only through
/// the store's atomic increment operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub difficulty: QuizDifficulty,
    pub questions: Vec<Question>,
    pub time_limit_minutes: i32,
    pub is_published: bool,
    pub total_points: i32,
    pub attempts: i64,
    pub average_score: f64,
    pub tags: Vec<String>,
    pub created_by: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Quiz {
    /// Recomputes `total_points` from the embedded questions. Must be called
    /// whenever the question list changes.
    pub fn recompute_total_points(&mut self) {
        self.total_points = self.questions.iter().map(|q| q.points).sum();
    }

    /// Builds the id-to-question map once, so answer resolution does not
    /// linear-scan the question list per submitted answer.
    pub fn question_index(&self) -> HashMap<Uuid, &Question> {
        self.questions.iter().map(|q| (q.id, q)).collect()
    }

    /// Projection for takers: drops `is_correct` flags and explanations.
    pub fn for_taker(&self) -> QuizForTaker {
        QuizForTaker {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category,
            difficulty: self.difficulty,
            questions: self
                .questions
                .iter()
                .map(|q| QuestionForTaker {
                    id: q.id,
                    text: q.text.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|o| OptionForTaker {
                            id: o.id,
                            text: o.text.clone(),
                        })
                        .collect(),
                    difficulty: q.difficulty,
                    points: q.points,
                })
                .collect(),
            time_limit_minutes: self.time_limit_minutes,
            total_points: self.total_points,
            attempts: self.attempts,
            average_score: self.average_score,
        }
    }

    /// Listing projection: metadata only, no question bodies.
    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category,
            difficulty: self.difficulty,
            question_count: self.questions.len(),
            time_limit_minutes: self.time_limit_minutes,
            total_points: self.total_points,
            attempts: self.attempts,
            average_score: self.average_score,
            tags: self.tags.clone(),
            created_at: self.created_at,
        }
    }
}

/// Sanitized option: no `is_correct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionForTaker {
    pub id: Uuid,
    pub text: String,
}

/// Sanitized question: no correctness flags, no explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionForTaker {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<OptionForTaker>,
    pub difficulty: Difficulty,
    pub points: i32,
}

/// Sanitized quiz projection handed to takers. Also the exact input the
/// session state machine consumes, hence `Deserialize` as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizForTaker {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub difficulty: QuizDifficulty,
    pub questions: Vec<QuestionForTaker>,
    pub time_limit_minutes: i32,
    pub total_points: i32,
    pub attempts: i64,
    pub average_score: f64,
}

/// Listing projection: enough to render a quiz card, nothing more.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub difficulty: QuizDifficulty,
    pub question_count: usize,
    pub time_limit_minutes: i32,
    pub total_points: i32,
    pub attempts: i64,
    pub average_score: f64,
    pub tags: Vec<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for an authored answer option.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionPayload {
    #[validate(length(min = 1, max = 200))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for an authored question.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct QuestionPayload {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<OptionPayload>,
    #[validate(length(max = 1000))]
    pub explanation: Option<String>,
    #[serde(default = "default_question_difficulty")]
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_points")]
    pub points: i32,
}

fn default_question_difficulty() -> Difficulty {
    Difficulty::Medium
}

fn default_points() -> i32 {
    1
}

/// 2-6 options, exactly one of them correct.
fn validate_options(options: &[OptionPayload]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 6 {
        return Err(validator::ValidationError::new("options_count_out_of_range"));
    }
    if options.iter().filter(|o| o.is_correct).count() != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_required"));
    }
    for opt in options {
        if opt.text.is_empty() || opt.text.len() > 200 {
            return Err(validator::ValidationError::new("option_text_length"));
        }
    }
    Ok(())
}

impl QuestionPayload {
    /// Materializes the payload, assigning fresh ids to the question and
    /// every option.
    pub fn into_question(self) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: self.text,
            options: self
                .options
                .into_iter()
                .map(|o| QuestionOption {
                    id: Uuid::new_v4(),
                    text: o.text,
                    is_correct: o.is_correct,
                })
                .collect(),
            explanation: self.explanation,
            difficulty: self.difficulty,
            points: self.points,
        }
    }
}

/// DTO for creating or replacing a quiz (admin only).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub category: Category,
    #[serde(default = "default_quiz_difficulty")]
    pub difficulty: QuizDifficulty,
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionPayload>,
    #[validate(range(min = 1, max = 180))]
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: i32,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_quiz_difficulty() -> QuizDifficulty {
    QuizDifficulty::Medium
}

fn default_time_limit() -> i32 {
    30
}

/// DTO for generating a quiz from the trivia source.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default = "default_quiz_difficulty")]
    pub difficulty: QuizDifficulty,
    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_amount")]
    pub amount: u8,
    #[validate(range(min = 1, max = 180))]
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: i32,
}

fn default_category() -> Category {
    Category::General
}

fn default_amount() -> u8 {
    15
}
