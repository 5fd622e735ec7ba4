use super::mfa::{self, FinishAuthOutcome, MfaFactor};
use super::models::{
    Envelope, FactorList, FinishAuthData, LoginData, NotifyResponse, StartAuthData,
};
use crate::common::{ArloError, ClientSettings, CloudApi, Result};
use crate::crypto::pem::bare_public_key;
use crate::crypto::{CertStore, ProvisionedCerts};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use reqwest::header::{AUTHORIZATION, REFERER};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const AUTH_VERSION: &str = "auth-version";
const CLOUD_ID: &str = "xcloudId";

/// Authenticated state of one login.
///
/// The auth host wants the token base64 encoded, the API host wants it raw.
#[derive(Clone)]
pub struct Session {
    token: String,
    token_b64: String,
    user_id: String,
}

impl Session {
    fn new(token: String, user_id: String) -> Self {
        let token_b64 = STANDARD.encode(token.as_bytes());
        Self {
            token,
            token_b64,
            user_id,
        }
    }

    // MFA completion hands out a new token
    fn replace_token(&mut self, token: String) {
        self.token_b64 = STANDARD.encode(token.as_bytes());
        self.token = token;
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn token_b64(&self) -> &str {
        &self.token_b64
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Cloud session: login, MFA, authenticated calls and certificate provisioning
pub struct ArloClient {
    http: Client,
    settings: ClientSettings,
    store: Arc<dyn CertStore>,
    session: Option<Session>,
}

impl ArloClient {
    pub fn new(settings: ClientSettings, store: Arc<dyn CertStore>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            http,
            settings,
            store,
            session: None,
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Certificate key for a station: `<user_id>_<station_id>`
    pub fn station_key(&self, station_id: &str) -> Result<String> {
        Ok(format!("{}_{}", self.require_session()?.user_id, station_id))
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(ArloError::NotLoggedIn)
    }

    //===============
    // Login + MFA
    //===============

    /// Log in, running the MFA poll loop when the account requires it.
    ///
    /// The session is only kept once login (and MFA, if any) succeeds; a failed
    /// attempt leaves the client logged out.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<()> {
        self.session = None;

        let response = self
            .http
            .post(format!("{}/api/auth", self.settings.auth_host))
            .header(REFERER, &self.settings.auth_host)
            .json(&json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let (status, body) = failure(response).await;
            tracing::debug!(status, "login rejected");
            return Err(ArloError::Authentication(format!(
                "status {}: {}",
                status, body
            )));
        }

        let envelope: Envelope<LoginData> = response.json().await?;
        let data = envelope
            .data
            .ok_or_else(|| ArloError::InvalidResponse("login response has no data".to_string()))?;

        tracing::debug!(user_id = %data.user_id, auth_completed = data.auth_completed, "login accepted");
        let auth_completed = data.auth_completed;
        let mut session = Session::new(data.token, data.user_id);

        if !auth_completed {
            self.complete_mfa(&mut session).await?;
        }

        tracing::info!("login completed");
        self.session = Some(session);
        Ok(())
    }

    async fn complete_mfa(&self, session: &mut Session) -> Result<()> {
        let factors = self.get_factors(session.token_b64()).await?;
        let factor = mfa::select_primary(&factors)
            .ok_or_else(|| ArloError::MfaSetup("no PRIMARY factor registered".to_string()))?;
        tracing::debug!(
            factor_id = %factor.factor_id,
            factor_type = factor.factor_type.as_deref().unwrap_or("unknown"),
            "selected MFA factor"
        );

        let code = self.start_auth(session.token_b64(), &factor.factor_id).await?;
        tracing::info!("MFA challenge started, waiting for confirmation");

        let max_attempts = self.settings.mfa.max_attempts;
        let interval = self.settings.mfa.poll_interval();

        for attempt in 1..=max_attempts {
            match self.finish_auth(session.token_b64(), &code).await? {
                FinishAuthOutcome::Completed(token) => {
                    session.replace_token(token);
                    tracing::info!(attempt, "MFA completed");
                    return Ok(());
                }
                FinishAuthOutcome::Rejected(reason) => {
                    tracing::warn!(attempt, %reason, "MFA rejected");
                    return Err(ArloError::MfaRejected(reason));
                }
                FinishAuthOutcome::Pending => {
                    tracing::debug!(attempt, "MFA not confirmed yet");
                    if attempt < max_attempts {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
        }

        Err(ArloError::MfaTimeout {
            attempts: max_attempts,
        })
    }

    async fn get_factors(&self, token_b64: &str) -> Result<Vec<MfaFactor>> {
        let response = self
            .http
            .get(format!(
                "{}/api/getFactors?data={}",
                self.settings.auth_host,
                unix_time()
            ))
            .header(AUTHORIZATION, token_b64)
            .header(REFERER, &self.settings.auth_host)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let (status, body) = failure(response).await;
            return Err(ArloError::MfaSetup(format!(
                "getFactors status {}: {}",
                status, body
            )));
        }

        let envelope: Envelope<FactorList> = response.json().await?;
        Ok(envelope.data.map(|d| d.items).unwrap_or_default())
    }

    async fn start_auth(&self, token_b64: &str, factor_id: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/startAuth", self.settings.auth_host))
            .header(AUTHORIZATION, token_b64)
            .header(REFERER, &self.settings.auth_host)
            .json(&json!({ "factorId": factor_id }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let (status, body) = failure(response).await;
            return Err(ArloError::MfaSetup(format!(
                "startAuth status {}: {}",
                status, body
            )));
        }

        let envelope: Envelope<StartAuthData> = response.json().await?;
        envelope
            .data
            .map(|d| d.factor_auth_code)
            .ok_or_else(|| ArloError::MfaSetup("startAuth returned no factorAuthCode".to_string()))
    }

    async fn finish_auth(&self, token_b64: &str, factor_auth_code: &str) -> Result<FinishAuthOutcome> {
        let response = self
            .http
            .post(format!("{}/api/finishAuth", self.settings.auth_host))
            .header(AUTHORIZATION, token_b64)
            .header(REFERER, &self.settings.auth_host)
            .json(&json!({ "factorAuthCode": factor_auth_code }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let (status, body) = failure(response).await;
            return Err(ArloError::ApiRequest {
                path: "/api/finishAuth".to_string(),
                status,
                body,
            });
        }

        let envelope: Envelope<FinishAuthData> = response.json().await?;
        let meta = envelope.meta.unwrap_or_default();
        tracing::debug!(code = meta.code, error = ?meta.error, "finishAuth answered");
        Ok(mfa::classify(&meta, envelope.data.as_ref()))
    }

    //=====================
    // Authenticated calls
    //=====================

    /// GET `{api_host}{path}`, returning the `data` field
    pub async fn server_get(&self, path: &str) -> Result<Value> {
        let session = self.require_session()?;
        let response = self
            .http
            .get(format!("{}{}", self.settings.api_host, path))
            .header(AUTHORIZATION, session.token())
            .header(AUTH_VERSION, "2")
            .send()
            .await?;

        unwrap_data(path, response).await
    }

    /// POST a JSON body to `{api_host}{path}`, returning the `data` field
    pub async fn server_post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let session = self.require_session()?;
        let response = self
            .http
            .post(format!("{}{}", self.settings.api_host, path))
            .header(AUTHORIZATION, session.token())
            .header(AUTH_VERSION, "2")
            .json(body)
            .send()
            .await?;

        unwrap_data(path, response).await
    }

    /// Send a device command. Best effort: every failure is logged and reported as `false`.
    pub async fn notify_device(
        &self,
        device_id: &str,
        cloud_id: &str,
        action: &str,
        resource: &str,
        publish: bool,
    ) -> bool {
        let Ok(session) = self.require_session() else {
            tracing::warn!(device_id, "notify skipped, not logged in");
            return false;
        };

        let trans_id = format!(
            "web!{}!{}",
            rand::thread_rng().gen_range(90_000_000..100_000_000),
            unix_time()
        );

        let result = self
            .http
            .post(format!(
                "{}/hmsweb/users/devices/notify/{}",
                self.settings.api_host, device_id
            ))
            .header(AUTHORIZATION, session.token())
            .header(AUTH_VERSION, "2")
            .header(CLOUD_ID, cloud_id)
            .json(&json!({
                "action": action,
                "resource": resource,
                "from": session.user_id(),
                "transId": trans_id,
                "to": device_id,
                "publishResponse": publish,
            }))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(device_id, error = %e, "notify request failed");
                return false;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::warn!(device_id, status = response.status().as_u16(), "notify rejected");
            return false;
        }

        match response.json::<NotifyResponse>().await {
            Ok(body) => {
                tracing::debug!(device_id, action, resource, success = body.success, "notify sent");
                body.success
            }
            Err(e) => {
                tracing::warn!(device_id, error = %e, "notify response unreadable");
                false
            }
        }
    }

    //==========================
    // Certificate provisioning
    //==========================

    /// Make sure a certificate bundle exists for `station_key`.
    /// Returns `true` when one was provisioned by this call.
    pub async fn ensure_device_certificate(&self, station_key: &str) -> Result<bool> {
        if self.store.has_device_certs(station_key) {
            tracing::debug!(station_key, "device certificates already present");
            return Ok(false);
        }

        let session = self.require_session()?;
        let response = self
            .http
            .post(format!(
                "{}/hmsweb/users/devices/v2/security/cert/create",
                self.settings.api_host
            ))
            .header(AUTH_VERSION, "2")
            .header(AUTHORIZATION, session.token())
            .json(&json!({
                "uuid": self.settings.device_id,
                "publicKey": bare_public_key(self.store.public_key()),
                "uniqueIds": [station_key],
            }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let (status, body) = failure(response).await;
            return Err(ArloError::CertificateProvisioning { status, body });
        }

        let envelope: Envelope<ProvisionedCerts> = response.json().await?;
        let certs = envelope.data.ok_or_else(|| {
            ArloError::InvalidResponse("certificate response has no data".to_string())
        })?;

        self.store.save_device_certs(station_key, &certs)?;
        tracing::info!(station_key, "device certificates provisioned");
        Ok(true)
    }
}

#[async_trait]
impl CloudApi for ArloClient {
    fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id())
    }

    async fn server_get(&self, path: &str) -> Result<Value> {
        ArloClient::server_get(self, path).await
    }

    async fn notify_device(
        &self,
        device_id: &str,
        cloud_id: &str,
        action: &str,
        resource: &str,
        publish: bool,
    ) -> bool {
        ArloClient::notify_device(self, device_id, cloud_id, action, resource, publish).await
    }
}

// Status plus body text, for error reporting
async fn failure(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    (status, body)
}

async fn unwrap_data(path: &str, response: Response) -> Result<Value> {
    if response.status() != StatusCode::OK {
        let (status, body) = failure(response).await;
        tracing::debug!(path, status, "authenticated request failed");
        return Err(ArloError::ApiRequest {
            path: path.to_string(),
            status,
            body,
        });
    }

    let mut body: Value = response.json().await?;
    body.get_mut("data")
        .map(Value::take)
        .ok_or_else(|| ArloError::InvalidResponse(format!("{} response has no data", path)))
}

fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
