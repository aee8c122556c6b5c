// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{Category, CreateQuizRequest, GenerateQuizRequest, Quiz, QuizDifficulty},
    services::{normalizer, trivia::TriviaClient},
    storage::{QuizFilter, Store},
    utils::{html::clean_text, jwt::Claims},
};

#[derive(Debug, Deserialize)]
pub struct ListQuizzesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub search: Option<String>,
}

impl ListQuizzesQuery {
    /// 'all' and absent mean no filter; anything else must parse.
    fn into_filter(self) -> Result<QuizFilter, AppError> {
        let category = match self.category.as_deref() {
            None | Some("all") => None,
            Some(raw) => Some(
                Category::parse(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown category '{raw}'")))?,
            ),
        };
        let difficulty = match self.difficulty.as_deref() {
            None | Some("all") => None,
            Some(raw) => Some(
                QuizDifficulty::parse(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown difficulty '{raw}'")))?,
            ),
        };
        Ok(QuizFilter {
            category,
            difficulty,
            search: self.search,
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(12),
        })
    }
}

/// Lists published quizzes, newest first, without question bodies.
pub async fn list_quizzes(
    State(store): State<Arc<dyn Store>>,
    Query(query): Query<ListQuizzesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = query.into_filter()?;
    let page = filter.page.max(1);
    let limit = filter.limit.clamp(1, 100);

    let (quizzes, total) = store.list_published_quizzes(&filter).await?;
    let total_pages = (total + limit - 1) / limit;

    let summaries: Vec<_> = quizzes.iter().map(Quiz::summary).collect();

    Ok(Json(json!({
        "quizzes": summaries,
        "pagination": {
            "current_page": page,
            "total_pages": total_pages,
            "total_quizzes": total,
            "has_next": page < total_pages,
            "has_prev": page > 1
        }
    })))
}

/// Fetches one quiz sanitized for taking: no correctness flags, no
/// explanations. Unpublished quizzes are only visible through the admin
/// surface.
pub async fn get_quiz(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store
        .find_quiz(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_published {
        return Err(AppError::Forbidden("Quiz is not published".to_string()));
    }

    Ok(Json(quiz.for_taker()))
}

/// Admin view: the full quiz document, correct answers included.
pub async fn get_quiz_full(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store
        .find_quiz(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    Ok(Json(quiz))
}

/// Admin listing of every quiz, published or not.
pub async fn list_all_quizzes(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = store.list_all_quizzes().await?;
    Ok(Json(quizzes))
}

fn build_quiz(payload: CreateQuizRequest, created_by: i64) -> Quiz {
    let questions = payload
        .questions
        .into_iter()
        .map(|mut q| {
            q.text = clean_text(&q.text);
            for option in &mut q.options {
                option.text = clean_text(&option.text);
            }
            q.explanation = q.explanation.map(|e| clean_text(&e));
            q.into_question()
        })
        .collect();

    let mut quiz = Quiz {
        id: 0,
        title: clean_text(&payload.title),
        description: clean_text(&payload.description),
        category: payload.category,
        difficulty: payload.difficulty,
        questions,
        time_limit_minutes: payload.time_limit_minutes,
        is_published: payload.is_published,
        total_points: 0,
        attempts: 0,
        average_score: 0.0,
        tags: payload.tags,
        created_by,
        created_at: None,
        updated_at: None,
    };
    quiz.recompute_total_points();
    quiz
}

/// Creates a quiz from hand-authored questions (admin only).
pub async fn create_quiz(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = store.insert_quiz(build_quiz(payload, claims.user_id()?)).await?;

    tracing::info!("Quiz {} created with {} questions", quiz.id, quiz.questions.len());

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Full-document replace of a quiz (admin only). Recomputes `total_points`
/// from the new question list; attempts/average are untouched.
pub async fn update_quiz(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let existing = store
        .find_quiz(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    // replacing the document does not change its owner
    let mut quiz = build_quiz(payload, existing.created_by);
    quiz.id = existing.id;

    let quiz = store.update_quiz(quiz).await?;
    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_quiz(id).await? {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    Ok(Json(json!({ "message": "Quiz deleted successfully" })))
}

/// Flips the publish flag (admin only).
pub async fn toggle_publish(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut quiz = store
        .find_quiz(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    quiz.is_published = !quiz.is_published;
    let quiz = store.update_quiz(quiz).await?;

    let message = if quiz.is_published {
        "Quiz published successfully"
    } else {
        "Quiz unpublished successfully"
    };
    Ok(Json(json!({ "message": message, "quiz": quiz })))
}

/// Generates a quiz from the trivia source.
///
/// Upstream failures (non-zero response code, timeout) abort the request
/// with the mapped message; individual malformed records are rejected and
/// logged while the rest of the batch goes through.
pub async fn generate_quiz(
    State(store): State<Arc<dyn Store>>,
    State(trivia): State<Arc<TriviaClient>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let raw = trivia
        .fetch_questions(
            payload.amount,
            Some(payload.category),
            payload.difficulty.as_question_difficulty(),
        )
        .await?;

    let batch = normalizer::normalize_batch(&raw);
    if !batch.rejected.is_empty() {
        tracing::warn!(
            "Rejected {} of {} trivia records during normalization",
            batch.rejected.len(),
            raw.len()
        );
    }
    if batch.questions.is_empty() {
        return Err(AppError::BadRequest(
            "No questions available for the specified criteria".to_string(),
        ));
    }

    let question_count = batch.questions.len();
    let mut quiz = Quiz {
        id: 0,
        title: payload.title,
        description: payload.description,
        category: payload.category,
        difficulty: payload.difficulty,
        questions: batch.questions,
        time_limit_minutes: payload.time_limit_minutes,
        is_published: true,
        total_points: 0,
        attempts: 0,
        average_score: 0.0,
        tags: vec![
            "generated".to_string(),
            "trivia".to_string(),
            payload.category.as_str().to_string(),
        ],
        created_by: claims.user_id()?,
        created_at: None,
        updated_at: None,
    };
    quiz.recompute_total_points();

    let quiz = store.insert_quiz(quiz).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!(
                "Quiz generated successfully with {question_count} questions from the trivia source"
            ),
            "quiz": quiz
        })),
    ))
}
