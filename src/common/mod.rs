pub mod cloud_api;
pub mod config;
pub mod errors;

pub use cloud_api::CloudApi;
pub use config::{ArloConfig, ClientSettings, MfaConfig, StationConfig, TransferConfig};
pub use errors::{ArloError, Result};
