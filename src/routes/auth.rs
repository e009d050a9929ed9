use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::auth::{LoginResponse, OtpLoginRequest, OtpRequested, OtpResendRequest, OtpVerifyRequest},
    error::AppResult,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/otp/verify", post(verify_otp))
        .route("/otp/resend", post(resend_otp))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = OtpLoginRequest,
    responses(
        (status = 200, description = "One-time code sent; unknown e-mails are registered first", body = ApiResponse<OtpRequested>),
        (status = 400, description = "Invalid e-mail or missing username"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<OtpLoginRequest>,
) -> AppResult<Json<ApiResponse<OtpRequested>>> {
    let resp = auth_service::request_otp(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Bearer token", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid OTP"),
    ),
    tag = "Auth"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerifyRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::verify_otp(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/auth/otp/resend",
    request_body = OtpResendRequest,
    responses(
        (status = 200, description = "New code sent", body = ApiResponse<OtpRequested>),
        (status = 400, description = "Unknown e-mail"),
    ),
    tag = "Auth"
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpResendRequest>,
) -> AppResult<Json<ApiResponse<OtpRequested>>> {
    let resp = auth_service::resend_otp(&state, payload).await?;
    Ok(Json(resp))
}
