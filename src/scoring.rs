// src/scoring.rs
//
// Answer resolution and scoring. Pure: a fixed quiz and a fixed submission
// always produce the same outcome. Persistence and statistics updates live
// behind the store boundary, not here.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{
    quiz::Quiz,
    result::{Grade, ResultStatus, ScoredAnswer, Submission, feedback_for},
};

/// The computed outcome of one submission, ready to be persisted as a result.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub answers: Vec<ScoredAnswer>,
    pub score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub percentage: f64,
    pub status: ResultStatus,
    pub grade: Grade,
    pub feedback: &'static str,
}

/// Resolves every submitted answer against the authoritative quiz and scores
/// it.
///
/// Malformed single answers degrade instead of failing the submission: a
/// `question_id` the quiz does not contain, or a `selected_option_id` that
/// does not belong to its question, scores as incorrect with 0 points.
/// Repeated `question_id`s keep only the first occurrence, so no question
/// can contribute points more than once.
/// Rejecting a missing or unpublished quiz is the caller's job; by this
/// point the quiz is authoritative.
pub fn score_submission(quiz: &Quiz, submission: &Submission) -> ScoreOutcome {
    let index = quiz.question_index();

    let mut answers = Vec::with_capacity(submission.answers.len());
    let mut score = 0;
    let mut correct_answers = 0;
    let mut answered: HashSet<Uuid> = HashSet::with_capacity(submission.answers.len());
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(submission.answers.len());

    for submitted in &submission.answers {
        // one scored answer per question: repeated question_ids would let a
        // crafted submission collect the same points N times and push the
        // percentage past 100
        if !seen.insert(submitted.question_id) {
            continue;
        }

        let question = index.get(&submitted.question_id);
        let option = question.and_then(|q| q.option(submitted.selected_option_id));
        let is_correct = option.map(|o| o.is_correct).unwrap_or(false);

        let points = if is_correct {
            // option resolved, so the question exists
            question.map(|q| q.points).unwrap_or(0)
        } else {
            0
        };

        if is_correct {
            correct_answers += 1;
        }
        score += points;

        if question.is_some() {
            answered.insert(submitted.question_id);
        }

        answers.push(ScoredAnswer {
            question_id: submitted.question_id,
            selected_option_id: submitted.selected_option_id,
            is_correct,
            points,
            time_spent_seconds: submitted.time_spent_seconds.max(0),
        });
    }

    let percentage = if quiz.total_points > 0 {
        (score as f64 / quiz.total_points as f64 * 100.0).round()
    } else {
        0.0
    };

    // The pipeline does not know why answers are missing; only the caller
    // can distinguish a voluntary early submit from a forced one.
    let status = if submission.timed_out {
        ResultStatus::Timeout
    } else if answered.len() == quiz.questions.len() {
        ResultStatus::Completed
    } else {
        ResultStatus::Incomplete
    };

    ScoreOutcome {
        answers,
        score,
        total_questions: quiz.questions.len() as i32,
        correct_answers,
        percentage,
        status,
        grade: Grade::from_percentage(percentage),
        feedback: feedback_for(percentage),
    }
}
