use arlo_ratls::common::{ClientSettings, MfaConfig};
use arlo_ratls::{ArloClient, FileCertStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DEVICE_ID: &str = "6c58c859-10e2-4b2f-b2cb-1b4a8bdecafa";
pub const USER_ID: &str = "USER-1";
pub const TOKEN: &str = "login-token";
pub const MFA_MAX_ATTEMPTS: u32 = 5;

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

pub fn settings(server: &MockServer) -> ClientSettings {
    ClientSettings {
        auth_host: server.uri(),
        api_host: server.uri(),
        device_id: DEVICE_ID.to_string(),
        request_timeout: Duration::from_secs(5),
        mfa: MfaConfig {
            poll_interval_ms: 10,
            max_attempts: MFA_MAX_ATTEMPTS,
        },
    }
}

pub fn client(server: &MockServer, dir: &TempDir) -> (ArloClient, Arc<FileCertStore>) {
    let store = Arc::new(FileCertStore::open(dir.path()).expect("open cert store"));
    let client = ArloClient::new(settings(server), store.clone()).expect("build client");
    (client, store)
}

pub fn login_body(auth_completed: bool) -> serde_json::Value {
    json!({
        "meta": { "code": 200 },
        "data": {
            "token": TOKEN,
            "userId": USER_ID,
            "authCompleted": auth_completed,
        }
    })
}

/// Client that already went through a login without MFA
pub async fn logged_in_client(server: &MockServer, dir: &TempDir) -> (ArloClient, Arc<FileCertStore>) {
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(true)))
        .mount(server)
        .await;

    let (mut client, store) = client(server, dir);
    client
        .login("me@example.com", "hunter2")
        .await
        .expect("login should succeed");
    (client, store)
}
