//! Quiz API client methods

use super::{ClientError, SkillverseClient};
use crate::client::transport::{ApiRequest, path_segment};
use crate::types::{QuizResponse, QuizResultResponse, QuizSubmitRequest};
use crate::validation::Validate;

pub const QUIZ_SUBMIT_PATH: &str = "/api/quiz-submit";

impl SkillverseClient {
    /// Get a quiz for a skill
    pub async fn quiz(
        &self,
        skill_id: &str,
        user_id: Option<&str>,
    ) -> Result<QuizResponse, ClientError> {
        let req = ApiRequest::get(format!("/api/quizzes/{}", path_segment(skill_id))).query_opt("user_id", user_id);
        self.execute(req).await
    }

    /// Submit answers for scoring
    pub async fn submit_quiz(
        &self,
        submission: &QuizSubmitRequest,
    ) -> Result<QuizResultResponse, ClientError> {
        for answer in &submission.answers {
            answer.validate()?;
        }
        let req = ApiRequest::post(QUIZ_SUBMIT_PATH).json(submission)?;
        self.execute(req).await
    }

    pub async fn quiz_history(&self, user_id: &str) -> Result<Vec<QuizResultResponse>, ClientError> {
        self.execute(ApiRequest::get(format!("/api/quiz-history/{}", path_segment(user_id))))
            .await
    }
}
