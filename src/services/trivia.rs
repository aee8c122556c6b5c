// src/services/trivia.rs

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::models::quiz::{Category, Difficulty};

/// Closed error enumeration for the trivia upstream: one variant per
/// documented response code, a catch-all for undocumented codes, and the
/// transport failures.
#[derive(Debug)]
pub enum TriviaError {
    /// response_code 1
    NoResults,
    /// response_code 2
    InvalidParameter,
    /// response_code 3
    TokenNotFound,
    /// response_code 4
    TokenEmpty,
    UnknownCode(u8),
    /// Network-level failure, including the bounded request timeout.
    Request(reqwest::Error),
    InvalidBaseUrl(url::ParseError),
}

impl fmt::Display for TriviaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriviaError::NoResults => write!(
                f,
                "No Results - The trivia source doesn't have enough questions for this query."
            ),
            TriviaError::InvalidParameter => write!(
                f,
                "Invalid Parameter - Arguments passed to the trivia source aren't valid."
            ),
            TriviaError::TokenNotFound => {
                write!(f, "Token Not Found - Session token does not exist.")
            }
            TriviaError::TokenEmpty => write!(
                f,
                "Token Empty - Session token has returned all possible questions for this query."
            ),
            TriviaError::UnknownCode(code) => write!(f, "Unknown error (Code: {code})"),
            TriviaError::Request(err) => write!(f, "Trivia request failed: {err}"),
            TriviaError::InvalidBaseUrl(err) => write!(f, "Invalid trivia base URL: {err}"),
        }
    }
}

impl std::error::Error for TriviaError {}

impl From<reqwest::Error> for TriviaError {
    fn from(err: reqwest::Error) -> Self {
        TriviaError::Request(err)
    }
}

impl TriviaError {
    fn from_code(code: u8) -> Self {
        match code {
            1 => TriviaError::NoResults,
            2 => TriviaError::InvalidParameter,
            3 => TriviaError::TokenNotFound,
            4 => TriviaError::TokenEmpty,
            other => TriviaError::UnknownCode(other),
        }
    }
}

/// One raw multiple-choice record as served by the upstream, entities and
/// all. The normalizer turns these into quiz-ready questions.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTriviaQuestion {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct TriviaResponse {
    response_code: u8,
    #[serde(default)]
    results: Vec<RawTriviaQuestion>,
}

/// HTTP client for the Open Trivia DB. Requests carry a bounded timeout;
/// a timeout surfaces as `TriviaError::Request`, a recoverable ingestion
/// failure rather than a crash.
#[derive(Debug, Clone)]
pub struct TriviaClient {
    http: reqwest::Client,
    base_url: Url,
}

impl TriviaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TriviaError> {
        let base_url = Url::parse(base_url).map_err(TriviaError::InvalidBaseUrl)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("quizmaster/0.1")
            .build()?;
        Ok(Self { http, base_url })
    }

    /// Fetches `amount` raw multiple-choice questions. A non-zero upstream
    /// response code aborts the whole request with the mapped error.
    pub async fn fetch_questions(
        &self,
        amount: u8,
        category: Option<Category>,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<RawTriviaQuestion>, TriviaError> {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("amount", &amount.to_string());
            pairs.append_pair("type", "multiple");
            if let Some(category) = category {
                pairs.append_pair("category", &category.trivia_id().to_string());
            }
            if let Some(difficulty) = difficulty {
                pairs.append_pair("difficulty", difficulty.as_str());
            }
        }

        tracing::info!("Fetching {} questions from trivia source", amount);

        let response: TriviaResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.response_code != 0 {
            return Err(TriviaError::from_code(response.response_code));
        }

        Ok(response.results)
    }
}
