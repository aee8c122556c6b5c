// src/session.rs
//
// The timed quiz-taking state machine. One session value owns all
// in-progress state (countdown, answer map, current question); the
// one-second tick is an injected event, not a background thread. Nothing
// here is persisted: the machine's only output is the Submission handed to
// the scoring endpoint, and abandonment is just dropping the value.

use std::collections::HashMap;
use std::fmt;

use crate::models::quiz::QuizForTaker;
use crate::models::result::{Submission, SubmittedAnswer};

/// `NotStarted -> Running -> Submitting -> Terminated`, with a
/// `Submitting -> Running` edge for failed submit calls. No re-entry after
/// `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Running,
    Submitting,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The action is only valid in the `Running` phase (or `NotStarted`
    /// for `start`).
    InvalidPhase {
        expected: SessionPhase,
        actual: SessionPhase,
    },
    QuestionOutOfRange(usize),
    OptionOutOfRange { question: usize, option: usize },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidPhase { expected, actual } => {
                write!(f, "session is {actual:?}, action requires {expected:?}")
            }
            SessionError::QuestionOutOfRange(i) => write!(f, "no question at index {i}"),
            SessionError::OptionOutOfRange { question, option } => {
                write!(f, "question {question} has no option {option}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// What one injected clock tick did.
#[derive(Debug)]
pub enum Tick {
    /// Countdown decremented, still running.
    Running { time_left: u32 },
    /// The countdown hit zero: the machine moved to `Submitting` and this
    /// submission must be sent. Fires at most once per session.
    AutoSubmit(Submission),
    /// Tick ignored: not running, or zero already observed and handled.
    Idle,
}

/// An in-progress taking session over a sanitized quiz projection.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: QuizForTaker,
    phase: SessionPhase,
    current_question: usize,
    /// question index -> selected option index; overwrite on reselect,
    /// no history.
    answers: HashMap<usize, usize>,
    time_limit_seconds: u32,
    time_left: u32,
    auto_submit_fired: bool,
    result_id: Option<i64>,
}

impl QuizSession {
    /// Loads the quiz and arms the timer without starting it.
    pub fn new(quiz: QuizForTaker) -> Self {
        let time_limit_seconds = quiz.time_limit_minutes.max(0) as u32 * 60;
        Self {
            quiz,
            phase: SessionPhase::NotStarted,
            current_question: 0,
            answers: HashMap::new(),
            time_limit_seconds,
            time_left: time_limit_seconds,
            auto_submit_fired: false,
            result_id: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn quiz(&self) -> &QuizForTaker {
        &self.quiz
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn current_question(&self) -> usize {
        self.current_question
    }

    pub fn selected_option(&self, question: usize) -> Option<usize> {
        self.answers.get(&question).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Set after a successful submit.
    pub fn result_id(&self) -> Option<i64> {
        self.result_id
    }

    fn require(&self, expected: SessionPhase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Starts the countdown. Only valid once, from `NotStarted`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.require(SessionPhase::NotStarted)?;
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Injects one second of elapsed time. When the countdown reaches zero
    /// the machine auto-submits, exactly once, without confirmation; any
    /// further zero observations are ignored.
    pub fn tick(&mut self) -> Tick {
        if self.phase != SessionPhase::Running {
            return Tick::Idle;
        }

        if self.time_left > 0 {
            self.time_left -= 1;
            if self.time_left > 0 {
                return Tick::Running {
                    time_left: self.time_left,
                };
            }
        }

        // time_left == 0; the idempotency guard keeps a repeatedly-observed
        // zero from firing twice
        if self.auto_submit_fired {
            return Tick::Idle;
        }
        self.auto_submit_fired = true;
        self.phase = SessionPhase::Submitting;
        Tick::AutoSubmit(self.build_submission(true))
    }

    /// Records or overwrites the answer for a question. Does not touch the
    /// timer or the displayed question.
    pub fn select_answer(&mut self, question: usize, option: usize) -> Result<(), SessionError> {
        self.require(SessionPhase::Running)?;
        let q = self
            .quiz
            .questions
            .get(question)
            .ok_or(SessionError::QuestionOutOfRange(question))?;
        if option >= q.options.len() {
            return Err(SessionError::OptionOutOfRange { question, option });
        }
        self.answers.insert(question, option);
        Ok(())
    }

    /// Moves to the next question, saturating at the last one.
    pub fn next_question(&mut self) -> Result<(), SessionError> {
        self.require(SessionPhase::Running)?;
        if self.current_question + 1 < self.quiz.questions.len() {
            self.current_question += 1;
        }
        Ok(())
    }

    /// Moves to the previous question, saturating at the first one.
    pub fn previous_question(&mut self) -> Result<(), SessionError> {
        self.require(SessionPhase::Running)?;
        self.current_question = self.current_question.saturating_sub(1);
        Ok(())
    }

    pub fn jump_to(&mut self, question: usize) -> Result<(), SessionError> {
        self.require(SessionPhase::Running)?;
        if question >= self.quiz.questions.len() {
            return Err(SessionError::QuestionOutOfRange(question));
        }
        self.current_question = question;
        Ok(())
    }

    /// Manual submit confirmation: `Running -> Submitting`. While the
    /// submit call is outstanding every other transition is rejected, which
    /// is what makes rapid double-submits harmless.
    pub fn begin_submit(&mut self) -> Result<Submission, SessionError> {
        self.require(SessionPhase::Running)?;
        self.phase = SessionPhase::Submitting;
        Ok(self.build_submission(false))
    }

    /// The submit call came back with a created result.
    pub fn submit_succeeded(&mut self, result_id: i64) -> Result<(), SessionError> {
        self.require(SessionPhase::Submitting)?;
        self.phase = SessionPhase::Terminated;
        self.result_id = Some(result_id);
        Ok(())
    }

    /// The submit call failed: back to `Running` with answers intact and
    /// the timer wherever it was (zero after an auto-submit; the guard
    /// keeps it from auto-firing again, so the retry is manual).
    pub fn submit_failed(&mut self) -> Result<(), SessionError> {
        self.require(SessionPhase::Submitting)?;
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Walking away before submitting. All state is discarded; nothing was
    /// ever persisted.
    pub fn abandon(self) {}

    /// Maps the in-memory index answers to identifiers. Unanswered
    /// questions are omitted, never defaulted.
    fn build_submission(&self, timed_out: bool) -> Submission {
        let mut indices: Vec<usize> = self.answers.keys().copied().collect();
        indices.sort_unstable();

        let answers = indices
            .into_iter()
            .filter_map(|qi| {
                let oi = self.answers[&qi];
                let question = self.quiz.questions.get(qi)?;
                let option = question.options.get(oi)?;
                Some(SubmittedAnswer {
                    question_id: question.id,
                    selected_option_id: option.id,
                    time_spent_seconds: 0,
                })
            })
            .collect();

        Submission {
            quiz_id: self.quiz.id,
            answers,
            total_time_seconds: (self.time_limit_seconds - self.time_left) as i32,
            timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{
        Category, Difficulty, OptionForTaker, QuestionForTaker, QuizDifficulty,
    };
    use uuid::Uuid;

    fn taker_quiz(question_count: usize, time_limit_minutes: i32) -> QuizForTaker {
        let questions = (0..question_count)
            .map(|i| QuestionForTaker {
                id: Uuid::new_v4(),
                text: format!("question {i}"),
                options: (0..4)
                    .map(|j| OptionForTaker {
                        id: Uuid::new_v4(),
                        text: format!("option {j}"),
                    })
                    .collect(),
                difficulty: Difficulty::Medium,
                points: 2,
            })
            .collect();
        QuizForTaker {
            id: 42,
            title: "t".to_string(),
            description: "d".to_string(),
            category: Category::General,
            difficulty: QuizDifficulty::Medium,
            questions,
            time_limit_minutes,
            total_points: question_count as i32 * 2,
            attempts: 0,
            average_score: 0.0,
        }
    }

    fn running_session(question_count: usize, minutes: i32) -> QuizSession {
        let mut session = QuizSession::new(taker_quiz(question_count, minutes));
        session.start().unwrap();
        session
    }

    #[test]
    fn timer_is_armed_but_not_counting_before_start() {
        let mut session = QuizSession::new(taker_quiz(3, 2));
        assert_eq!(session.phase(), SessionPhase::NotStarted);
        assert_eq!(session.time_left(), 120);
        assert!(matches!(session.tick(), Tick::Idle));
        assert_eq!(session.time_left(), 120);
        assert!(session.select_answer(0, 0).is_err());
    }

    #[test]
    fn start_is_valid_exactly_once() {
        let mut session = QuizSession::new(taker_quiz(1, 1));
        assert!(session.start().is_ok());
        assert!(session.start().is_err());
    }

    #[test]
    fn ticks_count_down_one_second_each() {
        let mut session = running_session(1, 2);
        for expected in (1..120).rev() {
            match session.tick() {
                Tick::Running { time_left } => assert_eq!(time_left, expected),
                other => panic!("unexpected tick outcome: {other:?}"),
            }
        }
    }

    #[test]
    fn reselecting_overwrites_the_prior_answer() {
        let mut session = running_session(2, 5);
        session.select_answer(0, 1).unwrap();
        session.select_answer(0, 3).unwrap();
        assert_eq!(session.selected_option(0), Some(3));
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn navigation_never_touches_answers_or_timer() {
        let mut session = running_session(3, 5);
        session.select_answer(0, 1).unwrap();
        let time_before = session.time_left();

        session.next_question().unwrap();
        session.next_question().unwrap();
        session.next_question().unwrap(); // saturates at the last question
        assert_eq!(session.current_question(), 2);
        session.previous_question().unwrap();
        session.jump_to(0).unwrap();
        assert!(session.jump_to(7).is_err());

        assert_eq!(session.time_left(), time_before);
        assert_eq!(session.selected_option(0), Some(1));
    }

    #[test]
    fn out_of_range_selections_are_rejected() {
        let mut session = running_session(1, 5);
        assert_eq!(
            session.select_answer(9, 0).unwrap_err(),
            SessionError::QuestionOutOfRange(9)
        );
        assert_eq!(
            session.select_answer(0, 9).unwrap_err(),
            SessionError::OptionOutOfRange {
                question: 0,
                option: 9
            }
        );
    }

    #[test]
    fn manual_submit_omits_unanswered_and_reports_elapsed_time() {
        let mut session = running_session(3, 1);
        for _ in 0..45 {
            session.tick();
        }
        session.select_answer(1, 2).unwrap();

        let submission = session.begin_submit().unwrap();
        assert_eq!(session.phase(), SessionPhase::Submitting);
        assert_eq!(submission.quiz_id, 42);
        assert_eq!(submission.answers.len(), 1);
        assert_eq!(
            submission.answers[0].question_id,
            session.quiz().questions[1].id
        );
        assert_eq!(submission.total_time_seconds, 45);
        assert!(!submission.timed_out);
    }

    #[test]
    fn auto_submit_fires_exactly_once() {
        let mut session = running_session(1, 1);
        session.select_answer(0, 0).unwrap();

        let mut auto_submissions = 0;
        for _ in 0..70 {
            if let Tick::AutoSubmit(submission) = session.tick() {
                auto_submissions += 1;
                assert!(submission.timed_out);
                assert_eq!(submission.total_time_seconds, 60);
                // failure path re-enters Running at zero; further zero
                // observations must not re-fire
                session.submit_failed().unwrap();
            }
        }
        assert_eq!(auto_submissions, 1);
        assert_eq!(session.phase(), SessionPhase::Running);
        assert_eq!(session.selected_option(0), Some(0));
    }

    #[test]
    fn no_transition_is_allowed_while_submitting() {
        let mut session = running_session(2, 5);
        session.begin_submit().unwrap();

        assert!(session.begin_submit().is_err());
        assert!(session.select_answer(0, 0).is_err());
        assert!(session.next_question().is_err());
        assert!(matches!(session.tick(), Tick::Idle));
    }

    #[test]
    fn failed_submit_keeps_answers_and_allows_retry() {
        let mut session = running_session(2, 5);
        session.select_answer(0, 1).unwrap();
        session.select_answer(1, 2).unwrap();

        let first = session.begin_submit().unwrap();
        session.submit_failed().unwrap();
        assert_eq!(session.phase(), SessionPhase::Running);

        let retry = session.begin_submit().unwrap();
        assert_eq!(retry.answers.len(), first.answers.len());
        session.submit_succeeded(9).unwrap();
        assert_eq!(session.phase(), SessionPhase::Terminated);
        assert_eq!(session.result_id(), Some(9));
    }

    #[test]
    fn terminated_sessions_reject_everything() {
        let mut session = running_session(1, 5);
        session.begin_submit().unwrap();
        session.submit_succeeded(1).unwrap();

        assert!(session.start().is_err());
        assert!(session.select_answer(0, 0).is_err());
        assert!(matches!(session.tick(), Tick::Idle));
        assert!(session.begin_submit().is_err());
    }
}
