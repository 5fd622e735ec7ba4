//! Direct mutual-TLS access to a base station's local storage.

mod client;
mod recording;
pub mod tls;

pub use client::{RatlsClient, StationTarget, PORT_IDLE_WINDOW};
pub use recording::{DownloadedRecording, Recording};
