// src/storage/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, prelude::FromRow, types::Json};

use crate::error::AppError;
use crate::models::{
    quiz::{Category, Question, Quiz, QuizDifficulty},
    result::{Grade, QuizResult, ResultStatus, ScoredAnswer},
    user::User,
};
use crate::storage::{QuizFilter, Store};

const QUIZ_COLUMNS: &str = "id, title, description, category, difficulty, questions, \
     time_limit_minutes, is_published, total_points, attempts, average_score, tags, \
     created_by, created_at, updated_at";

const RESULT_COLUMNS: &str = "id, user_id, quiz_id, answers, score, total_questions, \
     correct_answers, percentage, total_time_seconds, status, grade, feedback, created_at";

const USER_COLUMNS: &str = "id, username, password, role, quizzes_taken, total_correct, \
     total_questions, average_score, created_at";

/// Postgres-backed store. Embedded sub-entities (questions, scored answers,
/// tags) live in JSONB columns; enum-ish fields are TEXT and parsed on the
/// way out.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw quizzes row; converted into the domain `Quiz` after enum parsing.
#[derive(FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    description: String,
    category: String,
    difficulty: String,
    questions: Json<Vec<Question>>,
    time_limit_minutes: i32,
    is_published: bool,
    total_points: i32,
    attempts: i64,
    average_score: f64,
    tags: Json<Vec<String>>,
    created_by: i64,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl QuizRow {
    fn into_quiz(self) -> Result<Quiz, AppError> {
        let category = Category::parse(&self.category).ok_or_else(|| {
            AppError::InternalServerError(format!("corrupt quiz category '{}'", self.category))
        })?;
        let difficulty = QuizDifficulty::parse(&self.difficulty).ok_or_else(|| {
            AppError::InternalServerError(format!("corrupt quiz difficulty '{}'", self.difficulty))
        })?;
        Ok(Quiz {
            id: self.id,
            title: self.title,
            description: self.description,
            category,
            difficulty,
            questions: self.questions.0,
            time_limit_minutes: self.time_limit_minutes,
            is_published: self.is_published,
            total_points: self.total_points,
            attempts: self.attempts,
            average_score: self.average_score,
            tags: self.tags.0,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ResultRow {
    id: i64,
    user_id: i64,
    quiz_id: i64,
    answers: Json<Vec<ScoredAnswer>>,
    score: i32,
    total_questions: i32,
    correct_answers: i32,
    percentage: f64,
    total_time_seconds: i32,
    status: String,
    grade: String,
    feedback: String,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ResultRow {
    fn into_result(self) -> Result<QuizResult, AppError> {
        let status = ResultStatus::parse(&self.status).ok_or_else(|| {
            AppError::InternalServerError(format!("corrupt result status '{}'", self.status))
        })?;
        let grade = Grade::parse(&self.grade).ok_or_else(|| {
            AppError::InternalServerError(format!("corrupt result grade '{}'", self.grade))
        })?;
        Ok(QuizResult {
            id: self.id,
            user_id: self.user_id,
            quiz_id: self.quiz_id,
            answers: self.answers.0,
            score: self.score,
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            percentage: self.percentage,
            total_time_seconds: self.total_time_seconds,
            status,
            grade,
            feedback: self.feedback,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(password_hash)
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // Postgres error code for unique violation is 23505
                if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                    AppError::Conflict(format!("Username '{username}' already exists"))
                } else {
                    tracing::error!("Failed to insert user: {:?}", e);
                    AppError::from(e)
                }
            })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn increment_user_stats(
        &self,
        id: i64,
        correct_answers: i64,
        total_questions: i64,
        percentage: f64,
    ) -> Result<(), AppError> {
        // Single-statement increment-and-recompute: concurrent submissions
        // for the same user serialize on the row, so no update is lost.
        sqlx::query(
            r#"
            UPDATE users SET
                quizzes_taken = quizzes_taken + 1,
                total_correct = total_correct + $2,
                total_questions = total_questions + $3,
                average_score = ROUND((((average_score * quizzes_taken) + $4)::numeric
                    / (quizzes_taken + 1)), 2)::double precision
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(correct_answers)
        .bind(total_questions)
        .bind(percentage)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_quiz(&self, quiz: Quiz) -> Result<Quiz, AppError> {
        let sql = format!(
            r#"
            INSERT INTO quizzes
                (title, description, category, difficulty, questions, time_limit_minutes,
                 is_published, total_points, attempts, average_score, tags, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {QUIZ_COLUMNS}
            "#
        );
        sqlx::query_as::<_, QuizRow>(&sql)
            .bind(&quiz.title)
            .bind(&quiz.description)
            .bind(quiz.category.as_str())
            .bind(quiz.difficulty.as_str())
            .bind(Json(&quiz.questions))
            .bind(quiz.time_limit_minutes)
            .bind(quiz.is_published)
            .bind(quiz.total_points)
            .bind(quiz.attempts)
            .bind(quiz.average_score)
            .bind(Json(&quiz.tags))
            .bind(quiz.created_by)
            .fetch_one(&self.pool)
            .await?
            .into_quiz()
    }

    async fn update_quiz(&self, quiz: Quiz) -> Result<Quiz, AppError> {
        // attempts/average_score deliberately untouched: aggregates move
        // only through increment_quiz_stats
        let sql = format!(
            r#"
            UPDATE quizzes SET
                title = $2, description = $3, category = $4, difficulty = $5,
                questions = $6, time_limit_minutes = $7, is_published = $8,
                total_points = $9, tags = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {QUIZ_COLUMNS}
            "#
        );
        sqlx::query_as::<_, QuizRow>(&sql)
            .bind(quiz.id)
            .bind(&quiz.title)
            .bind(&quiz.description)
            .bind(quiz.category.as_str())
            .bind(quiz.difficulty.as_str())
            .bind(Json(&quiz.questions))
            .bind(quiz.time_limit_minutes)
            .bind(quiz.is_published)
            .bind(quiz.total_points)
            .bind(Json(&quiz.tags))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?
            .into_quiz()
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1");
        sqlx::query_as::<_, QuizRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(QuizRow::into_quiz)
            .transpose()
    }

    async fn list_published_quizzes(
        &self,
        filter: &QuizFilter,
    ) -> Result<(Vec<Quiz>, i64), AppError> {
        fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &QuizFilter) {
            if let Some(category) = filter.category {
                builder.push(" AND category = ").push_bind(category.as_str());
            }
            if let Some(difficulty) = filter.difficulty {
                builder
                    .push(" AND difficulty = ")
                    .push_bind(difficulty.as_str());
            }
            if let Some(search) = &filter.search {
                let pattern = format!("%{search}%");
                builder
                    .push(" AND (title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR description ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        }

        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);

        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM quizzes WHERE is_published = TRUE");
        push_filters(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE is_published = TRUE"
        ));
        push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1) * limit);

        let rows: Vec<QuizRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let quizzes = rows
            .into_iter()
            .map(QuizRow::into_quiz)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((quizzes, total))
    }

    async fn list_all_quizzes(&self) -> Result<Vec<Quiz>, AppError> {
        let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes ORDER BY created_at DESC");
        sqlx::query_as::<_, QuizRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(QuizRow::into_quiz)
            .collect()
    }

    async fn increment_quiz_stats(&self, id: i64, percentage: f64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE quizzes SET
                attempts = attempts + 1,
                average_score = ROUND((((average_score * attempts) + $2)::numeric
                    / (attempts + 1)), 2)::double precision,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(percentage)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_result(&self, result: QuizResult) -> Result<QuizResult, AppError> {
        let sql = format!(
            r#"
            INSERT INTO results
                (user_id, quiz_id, answers, score, total_questions, correct_answers,
                 percentage, total_time_seconds, status, grade, feedback)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {RESULT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ResultRow>(&sql)
            .bind(result.user_id)
            .bind(result.quiz_id)
            .bind(Json(&result.answers))
            .bind(result.score)
            .bind(result.total_questions)
            .bind(result.correct_answers)
            .bind(result.percentage)
            .bind(result.total_time_seconds)
            .bind(result.status.as_str())
            .bind(result.grade.as_str())
            .bind(&result.feedback)
            .fetch_one(&self.pool)
            .await?
            .into_result()
    }

    async fn find_result(&self, id: i64) -> Result<Option<QuizResult>, AppError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM results WHERE id = $1");
        sqlx::query_as::<_, ResultRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ResultRow::into_result)
            .transpose()
    }

    async fn list_results_for_user(
        &self,
        user_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<QuizResult>, i64), AppError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM results WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let rows: Vec<ResultRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(limit)
            .bind((page - 1) * limit)
            .fetch_all(&self.pool)
            .await?;

        let results = rows
            .into_iter()
            .map(ResultRow::into_result)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((results, total))
    }

    async fn list_results_for_quiz(&self, quiz_id: i64) -> Result<Vec<QuizResult>, AppError> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM results WHERE quiz_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ResultRow>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ResultRow::into_result)
            .collect()
    }
}
