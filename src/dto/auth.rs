use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug, ToSchema)]
pub struct OtpLoginRequest {
    pub email: String,
    /// Required the first time an e-mail address signs in.
    pub username: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct OtpResendRequest {
    pub email: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpRequested {
    pub email: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
