// tests/api_tests.rs

use std::sync::Arc;
use std::time::Duration;

use quizmaster::{
    config::Config,
    routes,
    services::trivia::TriviaClient,
    state::AppState,
    storage::{MemoryStore, Store},
    utils::hash::hash_password,
};

/// Helper to spawn the app on a random port, backed by an in-memory store.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and the store so
/// tests can seed and inspect state directly.
async fn spawn_app() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        trivia_api_url: "http://127.0.0.1:9/api.php".to_string(),
        trivia_timeout_secs: 1,
        admin_username: None,
        admin_password: None,
    };

    let trivia = TriviaClient::new(&config.trivia_api_url, Duration::from_secs(1))
        .expect("Failed to build trivia client");

    let state = AppState {
        store: store.clone(),
        config,
        trivia: Arc::new(trivia),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, store)
}

/// Seeds an admin account straight through the store and logs in over HTTP.
/// Returns the bearer token.
async fn admin_token(address: &str, store: &MemoryStore, client: &reqwest::Client) -> String {
    let hashed = hash_password("admin_password").unwrap();
    store.insert_user("seed_admin", &hashed, "admin").await.unwrap();

    let login_resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": "seed_admin",
            "password": "admin_password"
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    login_resp["token"].as_str().expect("Token not found").to_string()
}

/// Registers and logs in a regular user, returning the bearer token.
async fn user_token(address: &str, client: &reqwest::Client, username: &str) -> String {
    let register = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(register.status().as_u16(), 201);

    let login_resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    login_resp["token"].as_str().expect("Token not found").to_string()
}

fn sample_quiz_body() -> serde_json::Value {
    serde_json::json!({
        "title": "Basic Arithmetic",
        "description": "Two easy questions",
        "category": "mathematics",
        "difficulty": "easy",
        "time_limit_minutes": 5,
        "is_published": true,
        "questions": [
            {
                "text": "What is 2 + 2?",
                "difficulty": "easy",
                "points": 1,
                "options": [
                    { "text": "3" },
                    { "text": "4", "is_correct": true },
                    { "text": "5" }
                ]
            },
            {
                "text": "What is 3 * 3?",
                "difficulty": "medium",
                "points": 2,
                "options": [
                    { "text": "9", "is_correct": true },
                    { "text": "6" }
                ]
            }
        ]
    })
}

#[tokio::test]
async fn health_check_404() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);

    // The password hash must never leak in the response body
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "username": "repeat_user",
        "password": "password123"
    });

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn quiz_taking_flow() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();

    // Admin creates a published quiz
    let admin = admin_token(&address, &store, &client).await;
    let create_resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&sample_quiz_body())
        .send()
        .await
        .expect("Create quiz failed");
    assert_eq!(create_resp.status().as_u16(), 201);
    let quiz: serde_json::Value = create_resp.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();
    assert_eq!(quiz["total_points"], 3);

    // A taker fetches the sanitized quiz
    let taker = user_token(&address, &client, "flow_taker").await;
    let quiz_resp = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .send()
        .await
        .unwrap();
    assert_eq!(quiz_resp.status().as_u16(), 200);
    let sanitized: serde_json::Value = quiz_resp.json().await.unwrap();

    // Correctness flags and explanations must not be visible to takers
    let raw = sanitized.to_string();
    assert!(!raw.contains("is_correct"));
    assert!(!raw.contains("explanation"));

    let questions = sanitized["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);

    // Answer the first question with option text "4" (correct per seed) by
    // looking it up from the authoritative store copy
    let stored = store.find_quiz(quiz_id).await.unwrap().unwrap();
    let q0 = &stored.questions[0];
    let correct0 = q0.correct_option().unwrap().id;
    let q1 = &stored.questions[1];
    let wrong1 = q1
        .options
        .iter()
        .find(|o| !o.is_correct)
        .unwrap()
        .id;

    let submit_resp = client
        .post(format!("{}/api/results", address))
        .header("Authorization", format!("Bearer {}", taker))
        .json(&serde_json::json!({
            "quiz_id": quiz_id,
            "total_time_seconds": 42,
            "answers": [
                { "question_id": q0.id, "selected_option_id": correct0, "time_spent_seconds": 20 },
                { "question_id": q1.id, "selected_option_id": wrong1, "time_spent_seconds": 22 }
            ]
        }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(submit_resp.status().as_u16(), 201);

    let result: serde_json::Value = submit_resp.json().await.unwrap();
    // 1 point of 3, rounded percentage 33
    assert_eq!(result["score"], 1);
    assert_eq!(result["correct_answers"], 1);
    assert_eq!(result["percentage"], 33.0);
    assert_eq!(result["grade"], "F");
    assert_eq!(result["status"], "completed");

    // Result detail joins answers back against the quiz
    let result_id = result["id"].as_i64().unwrap();
    let detail_resp = client
        .get(format!("{}/api/results/{}", address, result_id))
        .header("Authorization", format!("Bearer {}", taker))
        .send()
        .await
        .unwrap();
    assert_eq!(detail_resp.status().as_u16(), 200);
    let detail: serde_json::Value = detail_resp.json().await.unwrap();
    assert_eq!(detail["quiz_title"], "Basic Arithmetic");
    assert_eq!(detail["answers"].as_array().unwrap().len(), 2);

    // The taker's aggregates reflect the attempt
    let me_resp = client
        .get(format!("{}/api/users/me", address))
        .header("Authorization", format!("Bearer {}", taker))
        .send()
        .await
        .unwrap();
    let me: serde_json::Value = me_resp.json().await.unwrap();
    assert_eq!(me["quizzes_taken"], 1);
    assert_eq!(me["total_correct"], 1);
    assert_eq!(me["total_questions"], 2);
    assert_eq!(me["average_score"], 33.0);

    // The quiz aggregates updated too
    let listed = store.find_quiz(quiz_id).await.unwrap().unwrap();
    assert_eq!(listed.attempts, 1);
    assert_eq!(listed.average_score, 33.0);
}

#[tokio::test]
async fn submit_missing_quiz_is_404() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let taker = user_token(&address, &client, "missing_quiz_taker").await;

    let resp = client
        .post(format!("{}/api/results", address))
        .header("Authorization", format!("Bearer {}", taker))
        .json(&serde_json::json!({
            "quiz_id": 9999,
            "total_time_seconds": 1,
            "answers": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn unpublished_quiz_is_hidden_and_rejects_submissions() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();

    let admin = admin_token(&address, &store, &client).await;
    let mut body = sample_quiz_body();
    body["is_published"] = serde_json::json!(false);

    let create_resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&body)
        .send()
        .await
        .unwrap();
    let quiz: serde_json::Value = create_resp.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    // Hidden from the public fetch
    let fetch = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .send()
        .await
        .unwrap();
    assert_eq!(fetch.status().as_u16(), 403);

    // And refuses submissions
    let taker = user_token(&address, &client, "unpub_taker").await;
    let submit = client
        .post(format!("{}/api/results", address))
        .header("Authorization", format!("Bearer {}", taker))
        .json(&serde_json::json!({
            "quiz_id": quiz_id,
            "total_time_seconds": 1,
            "answers": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status().as_u16(), 403);

    // Publishing it makes it visible
    let publish = client
        .put(format!("{}/api/admin/quizzes/{}/publish", address, quiz_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(publish.status().as_u16(), 200);

    let fetch = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .send()
        .await
        .unwrap();
    assert_eq!(fetch.status().as_u16(), 200);
}

#[tokio::test]
async fn non_admin_cannot_reach_admin_routes() {
    let (address, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let taker = user_token(&address, &client, "plain_user").await;

    let resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", taker))
        .json(&sample_quiz_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // And with no token at all it is a 401
    let resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .json(&sample_quiz_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn users_cannot_read_each_others_results() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();

    let admin = admin_token(&address, &store, &client).await;
    let create_resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&sample_quiz_body())
        .send()
        .await
        .unwrap();
    let quiz: serde_json::Value = create_resp.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let owner = user_token(&address, &client, "result_owner").await;
    let submit: serde_json::Value = client
        .post(format!("{}/api/results", address))
        .header("Authorization", format!("Bearer {}", owner))
        .json(&serde_json::json!({
            "quiz_id": quiz_id,
            "total_time_seconds": 5,
            "answers": []
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let result_id = submit["id"].as_i64().unwrap();

    let stranger = user_token(&address, &client, "result_stranger").await;
    let resp = client
        .get(format!("{}/api/results/{}", address, result_id))
        .header("Authorization", format!("Bearer {}", stranger))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Admins may read any result
    let resp = client
        .get(format!("{}/api/results/{}", address, result_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_submissions_keep_aggregates_consistent() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();

    let admin = admin_token(&address, &store, &client).await;
    let create_resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&sample_quiz_body())
        .send()
        .await
        .unwrap();
    let quiz: serde_json::Value = create_resp.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let stored = store.find_quiz(quiz_id).await.unwrap().unwrap();
    let q0_id = stored.questions[0].id;
    let correct0 = stored.questions[0].correct_option().unwrap().id;

    // 16 distinct users all answer only question 0 correctly: 1 of 3 points,
    // so every submission lands at the same rounded percentage.
    let mut handles = Vec::new();
    for i in 0..16 {
        let address = address.clone();
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let token = user_token(&address, &client, &format!("conc_user_{i}")).await;
            let resp = client
                .post(format!("{}/api/results", address))
                .header("Authorization", format!("Bearer {}", token))
                .json(&serde_json::json!({
                    "quiz_id": quiz_id,
                    "total_time_seconds": 10,
                    "answers": [
                        { "question_id": q0_id, "selected_option_id": correct0 }
                    ]
                }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status().as_u16(), 201);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let after = store.find_quiz(quiz_id).await.unwrap().unwrap();
    assert_eq!(after.attempts, 16);
    // Every attempt scored 33%, so the running mean is exactly 33
    assert!((after.average_score - 33.0).abs() < f64::EPSILON);
}
