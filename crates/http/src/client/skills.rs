//! Skill graph and resume API client methods

use super::{ClientError, SkillverseClient};
use crate::client::transport::{ApiRequest, path_segment};
use crate::types::{NewSkill, ResumeUploadResponse, Skill, SkillGraph, SkillUpdate};
use crate::validation::Validate;
use bytes::Bytes;

pub const UPLOAD_RESUME_PATH: &str = "/api/upload-resume";
pub const SKILLS_PATH: &str = "/api/skills";

impl SkillverseClient {
    /// Get the skill graph for a user
    pub async fn skill_graph(&self, user_id: &str) -> Result<SkillGraph, ClientError> {
        self.execute(ApiRequest::get(format!("/api/skill-graph/{}", path_segment(user_id))))
            .await
    }

    /// Upload a resume for skill extraction
    ///
    /// The file is held in memory so the upload can be replayed after a
    /// token refresh.
    pub async fn upload_resume(
        &self,
        file_name: &str,
        mime: &str,
        bytes: impl Into<Bytes>,
    ) -> Result<ResumeUploadResponse, ClientError> {
        let req = ApiRequest::post(UPLOAD_RESUME_PATH).multipart("file", file_name, mime, bytes);
        self.execute(req).await
    }

    pub async fn add_skill(&self, skill: &NewSkill) -> Result<Skill, ClientError> {
        skill.validate()?;
        let req = ApiRequest::post(SKILLS_PATH).json(skill)?;
        self.execute(req).await
    }

    pub async fn update_skill(
        &self,
        skill_id: &str,
        update: &SkillUpdate,
    ) -> Result<Skill, ClientError> {
        let req = ApiRequest::patch(format!("{SKILLS_PATH}/{}", path_segment(skill_id))).json(update)?;
        self.execute(req).await
    }
}
