// src/storage/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::{quiz::Quiz, result::QuizResult, user::User};
use crate::stats::incremental_average;
use crate::storage::{QuizFilter, Store};

/// In-memory store used by the test suites: it lets the full HTTP surface
/// run without a database. Every operation takes the single mutex, which is
/// what makes the stat increments atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    quizzes: HashMap<i64, Quiz>,
    results: HashMap<i64, QuizResult>,
    next_user_id: i64,
    next_quiz_id: i64,
    next_result_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{username}' already exists"
            )));
        }
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
            quizzes_taken: 0,
            total_correct: 0,
            total_questions: 0,
            average_score: 0.0,
            created_at: Some(chrono::Utc::now()),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .inner
            .lock()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn increment_user_stats(
        &self,
        id: i64,
        correct_answers: i64,
        total_questions: i64,
        percentage: f64,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&id) {
            user.average_score =
                incremental_average(user.average_score, user.quizzes_taken, percentage);
            user.quizzes_taken += 1;
            user.total_correct += correct_answers;
            user.total_questions += total_questions;
        }
        Ok(())
    }

    async fn insert_quiz(&self, mut quiz: Quiz) -> Result<Quiz, AppError> {
        let mut inner = self.inner.lock().await;
        inner.next_quiz_id += 1;
        quiz.id = inner.next_quiz_id;
        quiz.created_at = Some(chrono::Utc::now());
        inner.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn update_quiz(&self, quiz: Quiz) -> Result<Quiz, AppError> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .quizzes
            .get(&quiz.id)
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        // aggregates move only through increment_quiz_stats
        let mut updated = quiz;
        updated.attempts = existing.attempts;
        updated.average_score = existing.average_score;
        updated.created_at = existing.created_at;
        updated.updated_at = Some(chrono::Utc::now());
        inner.quizzes.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.inner.lock().await.quizzes.remove(&id).is_some())
    }

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.inner.lock().await.quizzes.get(&id).cloned())
    }

    async fn list_published_quizzes(
        &self,
        filter: &QuizFilter,
    ) -> Result<(Vec<Quiz>, i64), AppError> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<Quiz> = inner
            .quizzes
            .values()
            .filter(|q| q.is_published)
            .filter(|q| filter.category.is_none_or(|c| q.category == c))
            .filter(|q| filter.difficulty.is_none_or(|d| q.difficulty == d))
            .filter(|q| {
                filter.search.as_ref().is_none_or(|s| {
                    let needle = s.to_lowercase();
                    q.title.to_lowercase().contains(&needle)
                        || q.description.to_lowercase().contains(&needle)
                })
            })
            .cloned()
            .collect();
        matched.sort_by_key(|q| std::cmp::Reverse(q.id));

        let total = matched.len() as i64;
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);
        let start = ((page - 1) * limit) as usize;
        let items = matched
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn list_all_quizzes(&self) -> Result<Vec<Quiz>, AppError> {
        let inner = self.inner.lock().await;
        let mut quizzes: Vec<Quiz> = inner.quizzes.values().cloned().collect();
        quizzes.sort_by_key(|q| std::cmp::Reverse(q.id));
        Ok(quizzes)
    }

    async fn increment_quiz_stats(&self, id: i64, percentage: f64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if let Some(quiz) = inner.quizzes.get_mut(&id) {
            quiz.average_score = incremental_average(quiz.average_score, quiz.attempts, percentage);
            quiz.attempts += 1;
        }
        Ok(())
    }

    async fn insert_result(&self, mut result: QuizResult) -> Result<QuizResult, AppError> {
        let mut inner = self.inner.lock().await;
        inner.next_result_id += 1;
        result.id = inner.next_result_id;
        result.created_at = Some(chrono::Utc::now());
        inner.results.insert(result.id, result.clone());
        Ok(result)
    }

    async fn find_result(&self, id: i64) -> Result<Option<QuizResult>, AppError> {
        Ok(self.inner.lock().await.results.get(&id).cloned())
    }

    async fn list_results_for_user(
        &self,
        user_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<QuizResult>, i64), AppError> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<QuizResult> = inner
            .results
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by_key(|r| std::cmp::Reverse(r.id));

        let total = matched.len() as i64;
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let start = ((page - 1) * limit) as usize;
        let items = matched
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn list_results_for_quiz(&self, quiz_id: i64) -> Result<Vec<QuizResult>, AppError> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<QuizResult> = inner
            .results
            .values()
            .filter(|r| r.quiz_id == quiz_id)
            .cloned()
            .collect();
        matched.sort_by_key(|r| std::cmp::Reverse(r.id));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{Category, QuizDifficulty};
    use std::sync::Arc;

    fn quiz() -> Quiz {
        Quiz {
            id: 0,
            title: "t".to_string(),
            description: "d".to_string(),
            category: Category::General,
            difficulty: QuizDifficulty::Easy,
            questions: vec![],
            time_limit_minutes: 30,
            is_published: true,
            total_points: 0,
            attempts: 0,
            average_score: 0.0,
            tags: vec![],
            created_by: 1,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_stat_increments_lose_no_update() {
        let store = Arc::new(MemoryStore::new());
        let quiz = store.insert_quiz(quiz()).await.unwrap();

        let n = 32;
        let mut handles = Vec::new();
        for _ in 0..n {
            let store = Arc::clone(&store);
            let quiz_id = quiz.id;
            handles.push(tokio::spawn(async move {
                store.increment_quiz_stats(quiz_id, 75.0).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let updated = store.find_quiz(quiz.id).await.unwrap().unwrap();
        assert_eq!(updated.attempts, n);
        // identical inputs make the running mean order-independent
        assert_eq!(updated.average_score, 75.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_mixed_percentages_converge_on_the_true_mean() {
        let store = Arc::new(MemoryStore::new());
        let quiz = store.insert_quiz(quiz()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..30 {
            let store = Arc::clone(&store);
            let quiz_id = quiz.id;
            let percentage = if i % 2 == 0 { 100.0 } else { 0.0 };
            handles.push(tokio::spawn(async move {
                store.increment_quiz_stats(quiz_id, percentage).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let updated = store.find_quiz(quiz.id).await.unwrap().unwrap();
        assert_eq!(updated.attempts, 30);
        // per-step 2dp rounding can drift a cent or two, never more
        assert!((updated.average_score - 50.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn user_stats_fold_incrementally()  {
        let store = MemoryStore::new();
        let user = store.insert_user("taker", "hash", "user").await.unwrap();

        store.increment_user_stats(user.id, 8, 10, 80.0).await.unwrap();
        store.increment_user_stats(user.id, 5, 10, 50.0).await.unwrap();

        let updated = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(updated.quizzes_taken, 2);
        assert_eq!(updated.total_correct, 13);
        assert_eq!(updated.total_questions, 20);
        assert_eq!(updated.average_score, 65.0);
    }

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let store = MemoryStore::new();
        store.insert_user("dup", "hash", "user").await.unwrap();
        let err = store.insert_user("dup", "hash", "user").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_quiz_preserves_running_aggregates() {
        let store = MemoryStore::new();
        let inserted = store.insert_quiz(quiz()).await.unwrap();
        store.increment_quiz_stats(inserted.id, 40.0).await.unwrap();

        let mut edited = inserted.clone();
        edited.title = "renamed".to_string();
        edited.attempts = 999; // must be ignored
        let updated = store.update_quiz(edited).await.unwrap();

        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.attempts, 1);
        assert_eq!(updated.average_score, 40.0);
    }
}
