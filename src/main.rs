use anyhow::{bail, Context};
use arlo_ratls::common::ArloConfig;
use arlo_ratls::ratls::{RatlsClient, StationTarget};
use arlo_ratls::transport;
use arlo_ratls::{ArloClient, CloudApi, FileCertStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "arlo-ratls")]
#[command(about = "Download recordings from a base station's local storage")]
struct Cli {
    /// TOML config file; ARLO_* env vars override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, open the station's storage port, list a date range and download one recording
    Fetch {
        #[arg(long, help = "First day, station format (e.g. 20210304)")]
        start: String,
        #[arg(long, help = "Last day, station format")]
        end: String,
        #[arg(long, default_value_t = 0, help = "Which listed recording to download")]
        index: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ArloConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Fetch { start, end, index } => fetch(config, &start, &end, index).await,
    }
}

async fn fetch(config: ArloConfig, start: &str, end: &str, index: usize) -> anyhow::Result<()> {
    if config.email.is_empty() || config.password.is_empty() {
        bail!("email and password must be set (ARLO_EMAIL / ARLO_PASSWORD)");
    }
    if config.station.device_id.is_empty() || config.station.ip.is_empty() {
        bail!("station device_id and ip must be set");
    }

    let store = FileCertStore::open(&config.storage_dir).with_context(|| {
        format!("Failed to open storage at {}", config.storage_dir.display())
    })?;
    let device_id = match &config.device_id {
        Some(id) => id.clone(),
        None => store.installation_id()?,
    };
    let store = Arc::new(store);

    let mut cloud = ArloClient::new(config.client_settings(device_id), store.clone())?;
    cloud
        .login(&config.email, &config.password)
        .await
        .context("Login failed")?;

    let station_key = cloud.station_key(&config.station.device_id)?;
    cloud.ensure_device_certificate(&station_key).await?;

    // Session is read-only from here on
    let cloud: Arc<dyn CloudApi> = Arc::new(cloud);
    let mut ratls = RatlsClient::new(
        cloud,
        store.as_ref(),
        StationTarget::from(&config.station),
        config.storage_dir.join("recordings"),
        &config.transfer,
    )?;

    ratls.refresh_local_token().await?;
    if !ratls.request_port_open().await {
        bail!("Could not open storage port");
    }

    transport::wait_for_port_open(
        transport::settle_delay(Duration::from_secs(config.station.port_open_delay_secs)),
        Duration::from_secs(config.station.port_open_timeout_secs),
    )
    .await
    .context("Timed out waiting for the storage port")?;

    let recordings = ratls.list_recordings(start, end).await?;
    let Some(recording) = recordings.get(index) else {
        bail!("{} recordings listed, no index {}", recordings.len(), index);
    };
    tracing::info!(path = recording.path(), "selected recording");

    let downloaded = ratls.download_recording(recording.path()).await?;
    println!("{} ({} bytes)", downloaded.path.display(), downloaded.bytes);
    Ok(())
}
