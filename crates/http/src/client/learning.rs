//! Gap analysis and learning path API client methods

use super::{ClientError, SkillverseClient};
use crate::client::transport::{ApiRequest, path_segment};
use crate::types::{
    AddToPathRequest, GapAnalysisResponse, LearningPathResponse, LearningStep, StepProgressUpdate,
};

impl SkillverseClient {
    /// Get the gap analysis for a user, optionally against a target role
    pub async fn gap_analysis(
        &self,
        user_id: &str,
        role_id: Option<&str>,
    ) -> Result<GapAnalysisResponse, ClientError> {
        let req = ApiRequest::get(format!("/api/gap-analysis/{}", path_segment(user_id))).query_opt("role_id", role_id);
        self.execute(req).await
    }

    /// Get the learning path for a user, optionally towards a target role
    pub async fn learning_path(
        &self,
        user_id: &str,
        role_id: Option<&str>,
    ) -> Result<LearningPathResponse, ClientError> {
        let req =
            ApiRequest::get(format!("/api/learning-path/{}", path_segment(user_id))).query_opt("role_id", role_id);
        self.execute(req).await
    }

    /// Mark a learning step complete or incomplete
    pub async fn update_step_progress(
        &self,
        step_id: &str,
        completed: bool,
    ) -> Result<LearningStep, ClientError> {
        let req = ApiRequest::patch(format!("/api/learning-steps/{}", path_segment(step_id)))
            .json(&StepProgressUpdate { completed })?;
        self.execute(req).await
    }

    /// Add the steps for a skill to a user's learning path
    pub async fn add_to_learning_path(
        &self,
        user_id: &str,
        skill_id: &str,
    ) -> Result<Vec<LearningStep>, ClientError> {
        let req = ApiRequest::post(format!("/api/learning-path/{}/add", path_segment(user_id))).json(
            &AddToPathRequest {
                skill_id: skill_id.to_string(),
            },
        )?;
        self.execute(req).await
    }
}
