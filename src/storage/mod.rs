// src/storage/mod.rs
//
// The storage seam. Handlers only see the `Store` trait; `PgStore` backs
// production, `MemoryStore` backs the tests. The two stat increments are
// the single correctness-critical pieces: each must be atomic with respect
// to concurrent submissions against the same row.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    quiz::{Category, Quiz, QuizDifficulty},
    result::QuizResult,
    user::User,
};

/// Filters and pagination for the published-quizzes listing.
#[derive(Debug, Clone, Default)]
pub struct QuizFilter {
    pub category: Option<Category>,
    pub difficulty: Option<QuizDifficulty>,
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- users ---

    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Atomically folds one result into the user's running aggregates.
    async fn increment_user_stats(
        &self,
        id: i64,
        correct_answers: i64,
        total_questions: i64,
        percentage: f64,
    ) -> Result<(), AppError>;

    // --- quizzes ---

    /// Inserts the quiz and returns it with its assigned id.
    async fn insert_quiz(&self, quiz: Quiz) -> Result<Quiz, AppError>;

    /// Full-document replace; returns `NotFound` if the id does not exist.
    async fn update_quiz(&self, quiz: Quiz) -> Result<Quiz, AppError>;

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError>;

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError>;

    /// Published quizzes matching the filter, newest first, with the total
    /// match count for pagination.
    async fn list_published_quizzes(
        &self,
        filter: &QuizFilter,
    ) -> Result<(Vec<Quiz>, i64), AppError>;

    async fn list_all_quizzes(&self) -> Result<Vec<Quiz>, AppError>;

    /// Atomically bumps `attempts` and folds `percentage` into the running
    /// average. Never a read-modify-write round trip.
    async fn increment_quiz_stats(&self, id: i64, percentage: f64) -> Result<(), AppError>;

    // --- results ---

    /// Inserts the result and returns it with its assigned id. Results are
    /// immutable: there is no update operation.
    async fn insert_result(&self, result: QuizResult) -> Result<QuizResult, AppError>;

    async fn find_result(&self, id: i64) -> Result<Option<QuizResult>, AppError>;

    async fn list_results_for_user(
        &self,
        user_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<QuizResult>, i64), AppError>;

    async fn list_results_for_quiz(&self, quiz_id: i64) -> Result<Vec<QuizResult>, AppError>;
}
