//! Dashboard API client methods

use super::{ClientError, SkillverseClient};
use crate::client::transport::{ApiRequest, path_segment};
use crate::types::DashboardResponse;

impl SkillverseClient {
    /// Get the dashboard summary for a user
    pub async fn dashboard(&self, user_id: &str) -> Result<DashboardResponse, ClientError> {
        self.execute(ApiRequest::get(format!("/api/dashboard/{}", path_segment(user_id))))
            .await
    }
}
