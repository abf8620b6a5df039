//! Market trend and role recommendation API client methods

use super::{ClientError, SkillverseClient};
use crate::client::transport::{ApiRequest, path_segment};
use crate::types::{RoleRecommendationsResponse, TrendResponse, TrendSubscription};

pub const TREND_SIGNALS_PATH: &str = "/api/trend-signals";
pub const TREND_SUBSCRIBE_PATH: &str = "/api/trends/subscribe";

impl SkillverseClient {
    /// Get current market trend signals
    pub async fn trend_signals(&self) -> Result<TrendResponse, ClientError> {
        self.execute(ApiRequest::get(TREND_SIGNALS_PATH)).await
    }

    /// Get role recommendations for a user
    pub async fn role_recommendations(
        &self,
        user_id: &str,
    ) -> Result<RoleRecommendationsResponse, ClientError> {
        self.execute(ApiRequest::get(format!("/api/role-recommendations/{}", path_segment(user_id))))
            .await
    }

    /// Subscribe to alerts for a skill's trend
    pub async fn subscribe_to_trend(&self, skill_name: &str) -> Result<(), ClientError> {
        let req = ApiRequest::post(TREND_SUBSCRIBE_PATH).json(&TrendSubscription {
            skill_name: skill_name.to_string(),
        })?;
        self.request(req).await?;
        Ok(())
    }
}
