// src/models/result.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::quiz::Quiz;

/// Terminal status of a scored attempt. `Timeout` is chosen by the caller
/// (the session's auto-submit path), never inferred by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Incomplete,
    Timeout,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Incomplete => "incomplete",
            ResultStatus::Timeout => "timeout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(ResultStatus::Completed),
            "incomplete" => Some(ResultStatus::Incomplete),
            "timeout" => Some(ResultStatus::Timeout),
            _ => None,
        }
    }
}

/// Letter grade bands, inclusive on the lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 95.0 {
            Grade::APlus
        } else if percentage >= 90.0 {
            Grade::A
        } else if percentage >= 85.0 {
            Grade::BPlus
        } else if percentage >= 80.0 {
            Grade::B
        } else if percentage >= 75.0 {
            Grade::CPlus
        } else if percentage >= 70.0 {
            Grade::C
        } else if percentage >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A+" => Some(Grade::APlus),
            "A" => Some(Grade::A),
            "B+" => Some(Grade::BPlus),
            "B" => Some(Grade::B),
            "C+" => Some(Grade::CPlus),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            "F" => Some(Grade::F),
            _ => None,
        }
    }
}

/// Fixed feedback messages, keyed to coarser bands than the grade table.
pub fn feedback_for(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "Excellent work! Outstanding performance!"
    } else if percentage >= 80.0 {
        "Great job! Very good performance!"
    } else if percentage >= 70.0 {
        "Good work! Keep practicing to improve!"
    } else if percentage >= 60.0 {
        "Fair performance. Consider reviewing the material."
    } else {
        "Needs improvement. Please review the topics and try again."
    }
}

/// One resolved and scored answer, embedded in a result document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredAnswer {
    pub question_id: Uuid,
    pub selected_option_id: Uuid,
    pub is_correct: bool,
    pub points: i32,
    pub time_spent_seconds: i32,
}

/// The persisted, immutable outcome of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub answers: Vec<ScoredAnswer>,
    pub score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub percentage: f64,
    pub total_time_seconds: i32,
    pub status: ResultStatus,
    pub grade: Grade,
    pub feedback: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One answer as submitted by the taker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    pub selected_option_id: Uuid,
    #[serde(default)]
    pub time_spent_seconds: i32,
}

/// Ephemeral submission produced by the session machine and consumed once
/// by the scoring pipeline. `timed_out` is set by the auto-submit path.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Submission {
    pub quiz_id: i64,
    pub answers: Vec<SubmittedAnswer>,
    #[validate(range(min = 0))]
    pub total_time_seconds: i32,
    #[serde(default)]
    pub timed_out: bool,
}

/// A result answer joined with question/option text for the detail view.
#[derive(Debug, Serialize)]
pub struct EnhancedAnswer {
    pub question_id: Uuid,
    pub selected_option_id: Uuid,
    pub is_correct: bool,
    pub points: i32,
    pub time_spent_seconds: i32,
    pub question: String,
    pub selected_answer: String,
    pub correct_answer: String,
    pub explanation: String,
}

impl EnhancedAnswer {
    /// Resolves the stored ids back against the quiz. Ids that no longer
    /// match (e.g., answers that referenced unknown options) degrade to
    /// placeholder text, same as the original detail view.
    pub fn from_scored(answer: &ScoredAnswer, quiz: &Quiz) -> Self {
        let question = quiz.questions.iter().find(|q| q.id == answer.question_id);
        let selected = question.and_then(|q| q.option(answer.selected_option_id));
        let correct = question.and_then(|q| q.correct_option());

        EnhancedAnswer {
            question_id: answer.question_id,
            selected_option_id: answer.selected_option_id,
            is_correct: answer.is_correct,
            points: answer.points,
            time_spent_seconds: answer.time_spent_seconds,
            question: question.map(|q| q.text.clone()).unwrap_or_default(),
            selected_answer: selected
                .map(|o| o.text.clone())
                .unwrap_or_else(|| "No answer selected".to_string()),
            correct_answer: correct
                .map(|o| o.text.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            explanation: question
                .and_then(|q| q.explanation.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_bands_are_inclusive_on_the_lower_bound() {
        assert_eq!(Grade::from_percentage(95.0), Grade::APlus);
        assert_eq!(Grade::from_percentage(94.0), Grade::A);
        assert_eq!(Grade::from_percentage(90.0), Grade::A);
        assert_eq!(Grade::from_percentage(89.0), Grade::BPlus);
        assert_eq!(Grade::from_percentage(85.0), Grade::BPlus);
        assert_eq!(Grade::from_percentage(80.0), Grade::B);
        assert_eq!(Grade::from_percentage(75.0), Grade::CPlus);
        assert_eq!(Grade::from_percentage(70.0), Grade::C);
        assert_eq!(Grade::from_percentage(60.0), Grade::D);
        assert_eq!(Grade::from_percentage(59.0), Grade::F);
        assert_eq!(Grade::from_percentage(0.0), Grade::F);
    }

    #[test]
    fn grade_serializes_with_plus_signs() {
        assert_eq!(
            serde_json::to_string(&Grade::APlus).unwrap(),
            "\"A+\"".to_string()
        );
        assert_eq!(Grade::parse("B+"), Some(Grade::BPlus));
    }

    #[test]
    fn feedback_bands_match_thresholds() {
        assert!(feedback_for(90.0).starts_with("Excellent"));
        assert!(feedback_for(89.0).starts_with("Great"));
        assert!(feedback_for(79.0).starts_with("Good"));
        assert!(feedback_for(60.0).starts_with("Fair"));
        assert!(feedback_for(59.0).starts_with("Needs improvement"));
    }
}
