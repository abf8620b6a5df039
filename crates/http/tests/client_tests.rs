//! Integration tests for the SkillVerse HTTP client

use serde_json::json;
use skillverse_core::MemoryStore;
use skillverse_http::client::error::{MSG_NOT_FOUND, MSG_PERMISSION_DENIED, MSG_RATE_LIMITED};
use skillverse_http::{ApiRequest, ClientError, SkillverseClient, TokenStorage};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(area: &str, name: &str) -> serde_json::Value {
    skillverse_fixtures::get_fixture_json(area, name).unwrap()
}

fn client_with_token(server: &MockServer, token: &str) -> SkillverseClient {
    let store = Arc::new(MemoryStore::new());
    TokenStorage::new(store.clone()).set_tokens(token, "refresh-token");
    SkillverseClient::builder()
        .base_url(server.uri())
        .store(store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_client_builder() {
    let client = SkillverseClient::builder()
        .base_url("http://localhost:8000/")
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000");
    assert!(!client.tokens().has_tokens());
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = SkillverseClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/trend-signals"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("trends", "trend_signals")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "access-1");
    let trends = client.trend_signals().await.unwrap();
    assert_eq!(trends.signals.len(), 6);
    assert_eq!(trends.top_skills[0], "Python");
}

#[tokio::test]
async fn test_caller_cannot_override_authorization() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/quiz-history/user_1"))
        .and(header("authorization", "Bearer stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "stored");
    let request = ApiRequest::get("/api/quiz-history/user_1")
        .header("Authorization", "Bearer forged");
    let history: Vec<serde_json::Value> = client.execute(request).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_role_query_parameter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/gap-analysis/user_1"))
        .and(query_param("role_id", "role_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("learning", "gap_analysis")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "t");
    let gaps = client.gap_analysis("user_1", Some("role_9")).await.unwrap();
    assert_eq!(gaps.gaps.len(), 4);
    assert!((gaps.overall_readiness - 72.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_ids_are_path_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/team%2Fa%3Fadmin%3D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("dashboard", "dashboard")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/gap-analysis/team%2Fa"))
        .and(query_param("role_id", "role 9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("learning", "gap_analysis")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "t");
    client.dashboard("team/a?admin=1").await.unwrap();
    client.gap_analysis("team/a", Some("role 9")).await.unwrap();
}

#[tokio::test]
async fn test_error_messages_by_status() {
    let mock_server = MockServer::start().await;

    for (route, status) in [("/api/a", 403), ("/api/b", 404), ("/api/c", 429), ("/api/d", 502)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string("<html>nope</html>"))
            .mount(&mock_server)
            .await;
    }

    let client = client_with_token(&mock_server, "t");

    let err = client.request(ApiRequest::get("/api/a")).await.unwrap_err();
    assert!(matches!(err, ClientError::PermissionDenied(_)));
    assert_eq!(err.user_message(), MSG_PERMISSION_DENIED);
    assert_eq!(err.title(), "Error 403");

    let err = client.request(ApiRequest::get("/api/b")).await.unwrap_err();
    assert_eq!(err.user_message(), MSG_NOT_FOUND);

    let err = client.request(ApiRequest::get("/api/c")).await.unwrap_err();
    assert!(matches!(err, ClientError::RateLimited(_)));
    assert_eq!(err.user_message(), MSG_RATE_LIMITED);

    let err = client.request(ApiRequest::get("/api/d")).await.unwrap_err();
    assert!(matches!(err, ClientError::ServerError { status: 502, .. }));
}

#[tokio::test]
async fn test_server_message_precedence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/skills"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "detail": "Skill already exists" })),
        )
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "t");
    let skill = skillverse_http::types::NewSkill {
        name: "Rust".into(),
        level: 40,
        category: "Languages".into(),
        proficiency: skillverse_http::types::Proficiency::Beginner,
        trending: None,
        demand: None,
    };
    let err = client.add_skill(&skill).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation { status: Some(409), .. }));
    assert_eq!(err.user_message(), "Skill already exists");
}

#[tokio::test]
async fn test_network_error() {
    let client = SkillverseClient::new("http://127.0.0.1:9").unwrap();
    let err = client.trend_signals().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(err.title(), "Connection Error");
}

#[tokio::test]
async fn test_invalid_input_is_not_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "t");
    let request = skillverse_http::types::WhatIfRequest {
        user_id: "user_1".into(),
        scenario: skillverse_http::types::Scenario {
            skills_to_learn: vec!["Rust".into()],
            target_role: None,
            timeframe: 30,
        },
    };
    let err = client.simulate_what_if(&request).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation { status: None, .. }));
}

#[tokio::test]
async fn test_fixture_fallback_when_backend_down() {
    let client = SkillverseClient::builder()
        .base_url("http://127.0.0.1:9")
        .fixture_fallback(true)
        .build()
        .unwrap();

    let dashboard = client.dashboard("user_1").await.unwrap();
    assert_eq!(dashboard.stats.streak, 7);

    // No fixture for this route, so the network error surfaces
    let err = client.quiz_history("user_1").await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
}
