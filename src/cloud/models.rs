//! Wire shapes of the cloud API responses.

use serde::Deserialize;

/// `meta` block present on auth-host responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub code: u16,
    #[serde(default)]
    pub error: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Standard `{ "meta": ..., "data": ... }` wrapper
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub meta: Option<Meta>,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "authCompleted", default)]
    pub auth_completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct FactorList {
    #[serde(default)]
    pub items: Vec<super::mfa::MfaFactor>,
}

#[derive(Debug, Deserialize)]
pub struct StartAuthData {
    #[serde(rename = "factorAuthCode")]
    pub factor_auth_code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinishAuthData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(rename = "authCompleted", default)]
    pub auth_completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct NotifyResponse {
    #[serde(default)]
    pub success: bool,
}
