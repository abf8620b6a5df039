//! Development fixture backend
//!
//! [`FixtureTransport`] answers known routes from embedded fixtures and
//! computes the dynamic ones. [`FallbackTransport`] puts it behind a real
//! transport so development builds keep working when the backend is down.

use super::error::TransportError;
use super::transport::{ApiRequest, ApiResponse, RequestBody, Transport};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, warn};

const QUIZ_ANSWER_KEY: [u32; 5] = [1, 1, 0, 1, 1];

/// Serves canned responses from `skillverse-fixtures`
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTransport;

impl FixtureTransport {
    pub const fn new() -> Self {
        Self
    }

    /// Canned answer for `request`, if the route is known
    pub fn answer(&self, request: &ApiRequest) -> Option<ApiResponse> {
        let segments: Vec<&str> = request
            .path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let body = request.json_body();

        let value = match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["api", "auth", "login"]) => {
                let email = body.and_then(|b| b["email"].as_str()).unwrap_or_default();
                auth_response(email, "Demo User")
            }
            ("POST", ["api", "auth", "register"]) => {
                let email = body.and_then(|b| b["email"].as_str()).unwrap_or_default();
                let name = body.and_then(|b| b["name"].as_str()).unwrap_or("Demo User");
                auth_response(email, name)
            }
            ("GET", ["api", "auth", "profile"]) => fixture("auth", "profile")?,
            ("PATCH", ["api", "auth", "profile"]) => {
                let field = |key: &str, default: &str| {
                    body.and_then(|b| b[key].as_str())
                        .unwrap_or(default)
                        .to_string()
                };
                json!({
                    "id": "user_1",
                    "email": field("email", "demo@skillverse.ai"),
                    "name": field("name", "Demo User"),
                    "createdAt": Utc::now().to_rfc3339(),
                })
            }
            ("POST", ["api", "auth", "change-password"]) => {
                return Some(ApiResponse::new(204, ""));
            }
            ("POST", ["api", "auth", "avatar"]) => {
                let file_name = match &request.body {
                    Some(RequestBody::Multipart { file_name, .. }) => file_name.as_str(),
                    _ => "avatar",
                };
                json!({ "avatarUrl": format!("fixture://avatars/{file_name}") })
            }
            ("GET", ["api", "dashboard", _]) => fixture("dashboard", "dashboard")?,
            ("GET", ["api", "skill-graph", _]) => fixture("skills", "skill_graph")?,
            ("POST", ["api", "upload-resume"]) => fixture("skills", "resume_upload")?,
            ("GET", ["api", "gap-analysis", _]) => fixture("learning", "gap_analysis")?,
            ("GET", ["api", "learning-path", _]) => fixture("learning", "learning_path")?,
            ("GET", ["api", "quizzes", skill_id]) => {
                let mut quiz = fixture("quizzes", "quiz")?;
                quiz["skillId"] = json!(skill_id);
                quiz
            }
            ("POST", ["api", "quiz-submit"]) => score_quiz(body?),
            ("GET", ["api", "trend-signals"]) => fixture("trends", "trend_signals")?,
            ("GET", ["api", "role-recommendations", _]) => {
                fixture("trends", "role_recommendations")?
            }
            ("POST", ["api", "what-if"]) => project_what_if(body?),
            _ => return None,
        };

        Some(ApiResponse::json_ok(&value))
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        _bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        Ok(self.answer(request).unwrap_or_else(|| {
            ApiResponse::new(404, r#"{"message":"No fixture for this route"}"#)
        }))
    }
}

fn fixture(area: &str, name: &str) -> Option<Value> {
    let value = skillverse_fixtures::get_fixture_json(area, name);
    if value.is_none() {
        warn!(area, name, "Fixture missing");
    }
    value
}

fn auth_response(email: &str, name: &str) -> Value {
    let now = Utc::now();
    let stamp = now.timestamp_millis();
    json!({
        "access_token": format!("mock_access_token_{stamp}"),
        "refresh_token": format!("mock_refresh_token_{stamp}"),
        "user": {
            "id": "user_1",
            "email": email,
            "name": name,
            "createdAt": now.to_rfc3339(),
        },
    })
}

fn score_quiz(submission: &Value) -> Value {
    let empty = Vec::new();
    let answers = submission["answers"].as_array().unwrap_or(&empty);

    let feedback: Vec<Value> = answers
        .iter()
        .enumerate()
        .map(|(index, answer)| {
            let expected = QUIZ_ANSWER_KEY.get(index).copied();
            let given = answer["answer"].as_u64();
            let correct = expected.is_some_and(|e| given == Some(u64::from(e)));
            let explanation = if correct {
                "Correct!"
            } else {
                "Review this concept in the documentation."
            };
            json!({
                "questionId": answer["questionId"],
                "correct": correct,
                "correctAnswer": expected.unwrap_or_default(),
                "explanation": explanation,
            })
        })
        .collect();

    let total = feedback.len();
    let correct = feedback.iter().filter(|f| f["correct"] == true).count();
    let score = if total == 0 {
        0
    } else {
        (correct * 100 + total / 2) / total
    };
    let level_change = if correct >= 3 { 5 } else { 0 };

    json!({
        "quizId": submission["quizId"],
        "score": score,
        "totalQuestions": total,
        "correctAnswers": correct,
        "skillLevelChange": level_change,
        "feedback": feedback,
    })
}

fn project_what_if(request: &Value) -> Value {
    let scenario = &request["scenario"];
    let skills: Vec<Value> = scenario["skillsToLearn"].as_array().cloned().unwrap_or_default();
    let timeframe = scenario["timeframe"].as_u64().unwrap_or(1).max(1);

    let count = skills.len() as u64;
    let improvement = count * 8;
    let total_hours = count * 40;
    let daily_commitment = total_hours.div_ceil(timeframe * 30);

    let with = |extra: &str| {
        let mut list = skills.clone();
        list.push(json!(extra));
        list
    };
    let first_two: Vec<Value> = skills.iter().take(2).cloned().collect();

    json!({
        "currentState": {
            "matchScore": 72,
            "marketability": 68,
            "salaryRange": { "min": 120_000, "max": 150_000 },
        },
        "projectedState": {
            "matchScore": (72 + improvement).min(95),
            "marketability": (68 + improvement + 5).min(92),
            "salaryRange": { "min": 140_000, "max": 180_000 },
        },
        "newOpportunities": [
            {
                "id": "opp1",
                "title": "Staff Engineer",
                "matchScore": 88,
                "salary": { "min": 180_000, "max": 250_000, "currency": "USD" },
                "requiredSkills": with("Leadership"),
                "matchingSkills": skills.clone(),
                "missingSkills": ["Leadership"],
                "growthPotential": 9,
            },
            {
                "id": "opp2",
                "title": "Engineering Manager",
                "matchScore": 75,
                "salary": { "min": 170_000, "max": 230_000, "currency": "USD" },
                "requiredSkills": with("Team Management"),
                "matchingSkills": first_two,
                "missingSkills": ["Team Management"],
                "growthPotential": 10,
            },
        ],
        "requiredEffort": {
            "totalHours": total_hours,
            "dailyCommitment": daily_commitment,
        },
    })
}

/// Tries `primary` and answers from `fallback` when the backend is
/// unreachable, missing the route, or failing
///
/// 401 and other 4xx responses pass through untouched, so the refresh
/// protocol behaves the same with or without the fallback.
pub struct FallbackTransport<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackTransport<P, F> {
    pub const fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P, F: Transport> FallbackTransport<P, F> {
    async fn fallback_answer(&self, request: &ApiRequest) -> Option<ApiResponse> {
        match self.fallback.send(request, None).await {
            Ok(response) if response.status != 404 => Some(response),
            _ => None,
        }
    }
}

#[async_trait]
impl<P: Transport, F: Transport> Transport for FallbackTransport<P, F> {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        match self.primary.send(request, bearer).await {
            Ok(response) if response.status == 404 || response.status >= 500 => {
                match self.fallback_answer(request).await {
                    Some(answer) => {
                        debug!(path = %request.path, status = response.status, "Serving fixture");
                        Ok(answer)
                    }
                    None => Ok(response),
                }
            }
            Ok(response) => Ok(response),
            Err(TransportError::Network(message)) => match self.fallback_answer(request).await {
                Some(answer) => {
                    debug!(path = %request.path, error = %message, "Backend unreachable, serving fixture");
                    Ok(answer)
                }
                None => Err(TransportError::Network(message)),
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QuizResultResponse, WhatIfResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        status: Option<u16>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(status: Option<u16>) -> Self {
            Self {
                status,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(
            &self,
            _request: &ApiRequest,
            _bearer: Option<&str>,
        ) -> Result<ApiResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.status {
                Some(status) => Ok(ApiResponse::new(status, r#"{"from":"primary"}"#)),
                None => Err(TransportError::Network("connection refused".into())),
            }
        }
    }

    #[test]
    fn quiz_scoring_uses_answer_key() {
        let request = ApiRequest::post("/api/quiz-submit")
            .json(&json!({
                "quizId": "quiz_1",
                "userId": "user_1",
                "answers": [
                    { "questionId": "q1", "answer": 1 },
                    { "questionId": "q2", "answer": 1 },
                    { "questionId": "q3", "answer": 2 },
                    { "questionId": "q4", "answer": 1 },
                    { "questionId": "q5", "answer": 0 },
                ],
                "timeTaken": 120,
            }))
            .unwrap();

        let result: QuizResultResponse = FixtureTransport.answer(&request).unwrap().json().unwrap();
        assert_eq!(result.correct_answers, 3);
        assert_eq!(result.score, 60);
        assert_eq!(result.skill_level_change, 5);
        assert_eq!(result.feedback[2].correct_answer, 0);
        assert_eq!(result.feedback[2].explanation, "Review this concept in the documentation.");
    }

    #[test]
    fn what_if_projection() {
        let request = ApiRequest::post("/api/what-if")
            .json(&json!({
                "userId": "user_1",
                "scenario": { "skillsToLearn": ["Rust", "Kubernetes", "AWS"], "timeframe": 2 },
            }))
            .unwrap();

        let result: WhatIfResponse = FixtureTransport.answer(&request).unwrap().json().unwrap();
        assert!((result.projected_state.match_score - 95.0).abs() < f64::EPSILON);
        assert!((result.projected_state.marketability - 92.0).abs() < f64::EPSILON);
        assert_eq!(result.required_effort.total_hours, 120);
        assert_eq!(result.required_effort.daily_commitment, 2);
        assert_eq!(result.new_opportunities[1].matching_skills.len(), 2);
    }

    #[test]
    fn quiz_fixture_takes_requested_skill() {
        let response = FixtureTransport
            .answer(&ApiRequest::get("/api/quizzes/rust"))
            .unwrap();
        let quiz: Value = response.json().unwrap();
        assert_eq!(quiz["skillId"], "rust");
    }

    #[test]
    fn unknown_routes_have_no_answer() {
        assert!(FixtureTransport.answer(&ApiRequest::get("/api/quiz-history/u1")).is_none());
        assert!(FixtureTransport.answer(&ApiRequest::post("/api/trend-signals")).is_none());
    }

    #[tokio::test]
    async fn falls_back_when_unreachable() {
        let transport = FallbackTransport::new(Scripted::new(None), FixtureTransport);
        let response = transport
            .send(&ApiRequest::get("/api/trend-signals"), None)
            .await
            .unwrap();
        let body: Value = response.json().unwrap();
        assert!(body["signals"].is_array());
    }

    #[tokio::test]
    async fn unauthorized_is_never_masked() {
        let transport = FallbackTransport::new(Scripted::new(Some(401)), FixtureTransport);
        let response = transport
            .send(&ApiRequest::get("/api/dashboard/user_1"), Some("stale"))
            .await
            .unwrap();
        assert_eq!(response.status, 401);
    }

    #[tokio::test]
    async fn server_errors_fall_back_and_unknown_routes_pass_through() {
        let transport = FallbackTransport::new(Scripted::new(Some(503)), FixtureTransport);
        let ok = transport
            .send(&ApiRequest::get("/api/dashboard/user_1"), None)
            .await
            .unwrap();
        assert_eq!(ok.status, 200);

        let missing = transport
            .send(&ApiRequest::get("/api/quiz-history/user_1"), None)
            .await
            .unwrap();
        assert_eq!(missing.status, 503);
        assert_eq!(transport.primary.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_without_fixture_stays_a_network_error() {
        let transport = FallbackTransport::new(Scripted::new(None), FixtureTransport);
        let result = transport
            .send(&ApiRequest::get("/api/quiz-history/user_1"), None)
            .await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }
}
