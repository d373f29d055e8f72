//! Login handler.

use axum::extract::State;

use crate::api::extractors::ApiJson;
use crate::api::state::AppState;
use crate::domain::{ApiResponse, LoginRequest, LoginResponse};
use crate::error::Result;
use crate::service::auth::Login;

/// Exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>> {
    state.pipeline.send(Login(body)).await?.expect_envelope()
}
