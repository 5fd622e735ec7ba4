use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_AUTH_HOST: &str = "https://ocapi-app.arlo.com";
pub const DEFAULT_API_HOST: &str = "https://myapi.arlo.com";

/// MFA poll loop tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MfaConfig {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
}

impl MfaConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            // ~2 minutes at the default interval
            max_attempts: 120,
        }
    }
}

/// Config for streaming recordings off the station
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024, // 64 KB
            connect_timeout_secs: 10,
        }
    }
}

/// Which base station to talk to and where it listens.
/// `ip`/`port` normally come from the port-open event the station pushes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StationConfig {
    pub device_id: String,
    pub cloud_id: String,
    pub ip: String,
    pub port: u16,
    pub port_open_delay_secs: u64,
    pub port_open_timeout_secs: u64,
}

/// Settings the cloud session needs, independent of where they were loaded from
#[derive(Clone, Debug)]
pub struct ClientSettings {
    pub auth_host: String,
    pub api_host: String,
    pub device_id: String,
    pub request_timeout: Duration,
    pub mfa: MfaConfig,
}

/// Everything the binary reads from defaults, `arlo.toml` and `ARLO_*` env vars
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArloConfig {
    pub auth_host: String,
    pub api_host: String,
    /// Stable per installation; generated and persisted when absent
    pub device_id: Option<String>,
    pub storage_dir: PathBuf,
    pub email: String,
    pub password: String,
    pub request_timeout_secs: u64,
    pub mfa: MfaConfig,
    pub transfer: TransferConfig,
    pub station: StationConfig,
}

impl Default for ArloConfig {
    fn default() -> Self {
        Self {
            auth_host: DEFAULT_AUTH_HOST.to_string(),
            api_host: DEFAULT_API_HOST.to_string(),
            device_id: None,
            storage_dir: default_storage_dir(),
            email: String::new(),
            password: String::new(),
            request_timeout_secs: 60,
            mfa: MfaConfig::default(),
            transfer: TransferConfig::default(),
            station: StationConfig {
                port_open_delay_secs: 5,
                port_open_timeout_secs: 30,
                ..Default::default()
            },
        }
    }
}

impl ArloConfig {
    /// Layer defaults, then the TOML file (if any), then `ARLO_` env vars.
    /// Nested keys use `__`, e.g. `ARLO_STATION__IP`.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ArloConfig::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("ARLO_").split("__"))
    }

    pub fn load(file: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(file).extract()
    }

    pub fn client_settings(&self, device_id: String) -> ClientSettings {
        ClientSettings {
            auth_host: self.auth_host.trim_end_matches('/').to_string(),
            api_host: self.api_host.trim_end_matches('/').to_string(),
            device_id,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            mfa: self.mfa.clone(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "arlo-ratls")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./storage"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_point_at_production_hosts() {
        let config = ArloConfig::default();
        assert_eq!(config.auth_host, DEFAULT_AUTH_HOST);
        assert_eq!(config.api_host, DEFAULT_API_HOST);
        assert_eq!(config.mfa.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.station.port_open_delay_secs, 5);
        assert!(config.device_id.is_none());
    }

    #[test]
    fn file_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "arlo.toml",
                r#"
                email = "me@example.com"
                device_id = "install-1"

                [station]
                device_id = "BASE1"
                cloud_id = "CLOUD1"
                ip = "192.168.1.20"
                port = 4443
                "#,
            )?;
            jail.set_env("ARLO_STATION__PORT", "5555");
            jail.set_env("ARLO_MFA__MAX_ATTEMPTS", "3");

            let config = ArloConfig::load(Some(Path::new("arlo.toml")))?;
            assert_eq!(config.email, "me@example.com");
            assert_eq!(config.device_id.as_deref(), Some("install-1"));
            assert_eq!(config.station.ip, "192.168.1.20");
            assert_eq!(config.station.port, 5555);
            assert_eq!(config.station.port_open_delay_secs, 5);
            assert_eq!(config.mfa.max_attempts, 3);
            Ok(())
        });
    }

    #[test]
    fn client_settings_trim_trailing_slashes() {
        let config = ArloConfig {
            auth_host: "https://auth.example/".to_string(),
            api_host: "https://api.example//".to_string(),
            ..Default::default()
        };
        let settings = config.client_settings("dev".to_string());
        assert_eq!(settings.auth_host, "https://auth.example");
        assert_eq!(settings.api_host, "https://api.example");
        assert_eq!(settings.device_id, "dev");
    }
}
