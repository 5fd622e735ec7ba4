//! Client for a camera cloud's local-storage protocol (RATLS).
//!
//! [`cloud::ArloClient`] owns the cloud session: login with MFA, authenticated
//! calls and certificate provisioning. [`ratls::RatlsClient`] uses that session
//! and the provisioned certificate to talk mutual TLS straight to a base
//! station on the LAN, listing and downloading its recordings.

pub mod cloud;
pub mod common;
pub mod crypto;
pub mod ratls;
pub mod transfer;
pub mod transport;
pub mod utils;

pub use cloud::ArloClient;
pub use common::{ArloConfig, ArloError, CloudApi, Result};
pub use crypto::{CertStore, FileCertStore};
pub use ratls::{RatlsClient, Recording, StationTarget};
