use super::recording::{DownloadedRecording, Recording, RecordingListing};
use super::tls;
use crate::common::{ArloError, CloudApi, Result, StationConfig, TransferConfig};
use crate::crypto::CertStore;
use crate::transfer;
use crate::utils::security::recording_destination;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The station closes its storage port after this long without traffic
pub const PORT_IDLE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Base station addressing, cloud side and LAN side
#[derive(Debug, Clone)]
pub struct StationTarget {
    pub device_id: String,
    pub cloud_id: String,
    pub ip: String,
    pub port: u16,
}

impl StationTarget {
    pub fn base_url(&self) -> String {
        format!("https://{}:{}/hmsls", self.ip, self.port)
    }
}

impl From<&StationConfig> for StationTarget {
    fn from(config: &StationConfig) -> Self {
        Self {
            device_id: config.device_id.clone(),
            cloud_id: config.cloud_id.clone(),
            ip: config.ip.clone(),
            port: config.port,
        }
    }
}

struct LocalAccessToken {
    value: String,
    last_used: Instant,
}

/// Local storage client for one station.
///
/// Valid only while the station's bundle exists and its local token has not
/// lapsed on the station side; neither is checked here, the next request
/// simply fails.
pub struct RatlsClient {
    cloud: Arc<dyn CloudApi>,
    target: StationTarget,
    http: Client,
    base_url: String,
    recordings_dir: PathBuf,
    chunk_size: usize,
    token: Option<LocalAccessToken>,
}

impl RatlsClient {
    /// Load the station's certificate bundle and build the TLS context.
    /// Fails if `ensure_device_certificate` has not run for this station.
    pub fn new(
        cloud: Arc<dyn CloudApi>,
        store: &dyn CertStore,
        target: StationTarget,
        recordings_dir: PathBuf,
        transfer: &TransferConfig,
    ) -> Result<Self> {
        let user_id = cloud.user_id().ok_or(ArloError::NotLoggedIn)?;
        let station_key = format!("{}_{}", user_id, target.device_id);

        let bundle = store.load_device_bundle(&station_key)?;
        let http = tls::station_client(&bundle, transfer)?;
        let base_url = target.base_url();

        tracing::debug!(%station_key, %base_url, "station TLS context ready");
        Ok(Self::from_parts(
            cloud,
            target,
            http,
            base_url,
            recordings_dir,
            transfer.chunk_size,
        ))
    }

    fn from_parts(
        cloud: Arc<dyn CloudApi>,
        target: StationTarget,
        http: Client,
        base_url: String,
        recordings_dir: PathBuf,
        chunk_size: usize,
    ) -> Self {
        Self {
            cloud,
            target,
            http,
            base_url,
            recordings_dir,
            chunk_size,
            token: None,
        }
    }

    /// Fetch a fresh JWT for the station's storage server.
    /// Needed before the first request and after the port has closed.
    pub async fn refresh_local_token(&mut self) -> Result<()> {
        let path = format!("/hmsweb/users/device/ratls/token/{}", self.target.device_id);
        let data = self.cloud.server_get(&path).await?;

        let value = data
            .get("ratlsToken")
            .and_then(Value::as_str)
            .ok_or_else(|| ArloError::InvalidResponse("no ratlsToken in token response".to_string()))?;

        self.token = Some(LocalAccessToken {
            value: value.to_string(),
            last_used: Instant::now(),
        });
        tracing::debug!(device_id = %self.target.device_id, "local access token refreshed");
        Ok(())
    }

    /// Ask the station, through the cloud, to open its storage port.
    ///
    /// The confirmation with the LAN address arrives later on the push-event
    /// channel; wait for it (or a settle delay) before listing.
    pub async fn request_port_open(&self) -> bool {
        let opened = self
            .cloud
            .notify_device(
                &self.target.device_id,
                &self.target.cloud_id,
                "open",
                "storage/ratls",
                false,
            )
            .await;

        if opened {
            tracing::info!(device_id = %self.target.device_id, "storage port open requested");
        } else {
            tracing::warn!(device_id = %self.target.device_id, "storage port open request not accepted");
        }
        opened
    }

    /// True when no token exists or it sat idle past the station's port window
    pub fn port_window_elapsed(&self) -> bool {
        self.token
            .as_ref()
            .map_or(true, |t| t.last_used.elapsed() >= PORT_IDLE_WINDOW)
    }

    /// Recordings between two station-formatted dates (e.g. `20210304`)
    pub async fn list_recordings(&mut self, start: &str, end: &str) -> Result<Vec<Recording>> {
        let bearer = self.bearer()?;
        let response = self
            .http
            .get(format!("{}/list/{}/{}", self.base_url, start, end))
            .header(AUTHORIZATION, bearer)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ArloError::RecordingList {
                status: status.as_u16(),
                body,
            });
        }

        // The station does not always label its JSON, so parse the text ourselves
        let text = response.text().await?;
        let listing: RecordingListing = serde_json::from_str(&text)?;
        let recordings = listing.data.ok_or_else(|| {
            ArloError::InvalidResponse(format!("recording listing has no data: {}", text))
        })?;
        self.touch();

        tracing::info!(start, end, count = recordings.len(), "listed recordings");
        Ok(recordings)
    }

    /// Stream one recording to `<recordings_dir>/<path>`
    pub async fn download_recording(&mut self, path: &str) -> Result<DownloadedRecording> {
        let dest = recording_destination(&self.recordings_dir, path)?;
        let bearer = self.bearer()?;

        let response = self
            .http
            .get(format!("{}/download/{}", self.base_url, path))
            .header(AUTHORIZATION, bearer)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ArloError::RecordingDownload {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = transfer::stream_to_file(response.bytes_stream(), &dest, self.chunk_size).await?;
        self.touch();

        tracing::info!(path, bytes, dest = %dest.display(), "download finished");
        Ok(DownloadedRecording { path: dest, bytes })
    }

    fn bearer(&self) -> Result<String> {
        self.token
            .as_ref()
            .map(|t| format!("Bearer {}", t.value))
            .ok_or(ArloError::LocalTokenMissing)
    }

    fn touch(&mut self) {
        if let Some(token) = self.token.as_mut() {
            token.last_used = Instant::now();
        }
    }
}
