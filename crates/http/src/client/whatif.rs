//! What-if scenario API client methods

use super::{ClientError, SkillverseClient};
use crate::client::transport::ApiRequest;
use crate::types::{WhatIfRequest, WhatIfResponse};
use crate::validation::Validate;

pub const WHAT_IF_PATH: &str = "/api/what-if";

impl SkillverseClient {
    /// Project career outcomes for learning a set of skills
    pub async fn simulate_what_if(
        &self,
        request: &WhatIfRequest,
    ) -> Result<WhatIfResponse, ClientError> {
        request.scenario.validate()?;
        let req = ApiRequest::post(WHAT_IF_PATH).json(request)?;
        self.execute(req).await
    }
}
