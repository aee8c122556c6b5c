// src/handlers/result.rs

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
    models::result::{EnhancedAnswer, QuizResult, Submission},
    scoring::score_submission,
    storage::Store,
    utils::jwt::Claims,
};

/// Submits a quiz attempt for scoring.
///
/// * Rejects missing (404) and unpublished (403) quizzes; no result is
///   created in either case.
/// * Scores the submission against the authoritative quiz; malformed
///   single answers degrade to incorrect instead of failing the request.
/// * Persists the immutable result, then folds it into the quiz and user
///   aggregates. The two increments touch disjoint documents and run
///   concurrently; each is atomic on its own row.
///
/// Retried submissions are not deduplicated: each call creates a new
/// result.
pub async fn submit_result(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<Submission>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = store
        .find_quiz(payload.quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_published {
        return Err(AppError::Forbidden("Quiz is not published".to_string()));
    }

    let user_id = claims.user_id()?;
    let outcome = score_submission(&quiz, &payload);

    let result = store
        .insert_result(QuizResult {
            id: 0,
            user_id,
            quiz_id: quiz.id,
            answers: outcome.answers,
            score: outcome.score,
            total_questions: outcome.total_questions,
            correct_answers: outcome.correct_answers,
            percentage: outcome.percentage,
            total_time_seconds: payload.total_time_seconds,
            status: outcome.status,
            grade: outcome.grade,
            feedback: outcome.feedback.to_string(),
            created_at: None,
        })
        .await?;

    let (quiz_stats, user_stats) = tokio::join!(
        store.increment_quiz_stats(quiz.id, result.percentage),
        store.increment_user_stats(
            user_id,
            result.correct_answers as i64,
            result.total_questions as i64,
            result.percentage,
        )
    );
    quiz_stats?;
    user_stats?;

    tracing::info!(
        "User {} scored {}/{} on quiz {}",
        user_id,
        result.score,
        quiz.total_points,
        quiz.id
    );

    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(Debug, Deserialize)]
pub struct ListResultsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Lists the current user's results, newest first.
pub async fn list_my_results(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListResultsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let (results, total) = store
        .list_results_for_user(claims.user_id()?, page, limit)
        .await?;
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "results": results,
        "pagination": {
            "current_page": page,
            "total_pages": total_pages,
            "total_results": total,
            "has_next": page < total_pages,
            "has_prev": page > 1
        }
    })))
}

/// Fetches one result with its answers joined back against the quiz
/// (question text, selected and correct answer text, explanation).
/// Readable by the owning user and admins only.
pub async fn get_result(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = store
        .find_result(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    if result.user_id != claims.user_id()? && !claims.is_admin() {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    // the quiz may have been deleted since; the bare result still stands
    match store.find_quiz(result.quiz_id).await? {
        Some(quiz) => {
            let enhanced: Vec<EnhancedAnswer> = result
                .answers
                .iter()
                .map(|a| EnhancedAnswer::from_scored(a, &quiz))
                .collect();
            Ok(Json(json!({
                "result": result,
                "quiz_title": quiz.title,
                "answers": enhanced
            })))
        }
        None => Ok(Json(json!({ "result": result }))),
    }
}

/// Admin listing of every result for one quiz.
pub async fn list_quiz_results(
    State(store): State<Arc<dyn Store>>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let results = store.list_results_for_quiz(quiz_id).await?;
    Ok(Json(results))
}
