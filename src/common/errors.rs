use crate::utils::security::ValidationError;
use thiserror::Error;

/// Every failure the cloud session and the local station transport can surface.
///
/// The status-carrying variants hold the raw response body so callers can see
/// what the service actually said; no partially parsed data is ever returned
/// alongside them.
#[derive(Error, Debug)]
pub enum ArloError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("MFA setup failed: {0}")]
    MfaSetup(String),

    #[error("MFA rejected: {0}")]
    MfaRejected(String),

    #[error("MFA not confirmed after {attempts} attempts")]
    MfaTimeout { attempts: u32 },

    #[error("Request to {path} failed with status {status}: {body}")]
    ApiRequest {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Certificate provisioning failed with status {status}: {body}")]
    CertificateProvisioning { status: u16, body: String },

    #[error("Recording list failed with status {status}: {body}")]
    RecordingList { status: u16, body: String },

    #[error("Recording download failed with status {status}: {body}")]
    RecordingDownload { status: u16, body: String },

    /// Raised while building the station transport: bundle or key missing/unreadable
    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("No local access token, call refresh_local_token first")]
    LocalTokenMissing,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid recording path: {0}")]
    InvalidPath(#[from] ValidationError),

    #[error("Key generation failed: {0}")]
    KeyGeneration(#[from] rcgen::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ArloError {
    /// Status code the cloud or station answered with, when the failure was an HTTP status
    pub fn status(&self) -> Option<u16> {
        match self {
            ArloError::ApiRequest { status, .. }
            | ArloError::CertificateProvisioning { status, .. }
            | ArloError::RecordingList { status, .. }
            | ArloError::RecordingDownload { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArloError>;
