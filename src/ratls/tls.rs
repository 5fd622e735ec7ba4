use crate::common::{ArloError, Result, TransferConfig};
use crate::crypto::CertificateBundle;
use reqwest::{Certificate, Client, Identity};
use std::time::Duration;

/// Build the mutual-TLS client for one station.
///
/// The station serves a certificate chained to its intermediate CA and issued
/// for whatever address it happens to have on the LAN, so only the chain is
/// checked, not the hostname. The client presents the cloud-issued peer
/// certificate with the installation private key.
pub fn station_client(bundle: &CertificateBundle, transfer: &TransferConfig) -> Result<Client> {
    let mut identity_pem = bundle.peer_cert_pem.clone().into_bytes();
    if !identity_pem.ends_with(b"\n") {
        identity_pem.push(b'\n');
    }
    identity_pem.extend_from_slice(bundle.private_key_pem.as_bytes());

    let identity = Identity::from_pem(&identity_pem)
        .map_err(|e| ArloError::Certificate(format!("client identity: {}", e)))?;
    // rustls skips non-PEM input silently, which would leave no trust anchor
    if !bundle.ica_cert_pem.contains("-----BEGIN CERTIFICATE-----") {
        return Err(ArloError::Certificate(
            "station CA is not a PEM certificate".to_string(),
        ));
    }
    let ica = Certificate::from_pem(bundle.ica_cert_pem.as_bytes())
        .map_err(|e| ArloError::Certificate(format!("station CA: {}", e)))?;

    Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .add_root_certificate(ica)
        .identity(identity)
        .danger_accept_invalid_hostnames(true)
        .connect_timeout(Duration::from_secs(transfer.connect_timeout_secs))
        .build()
        .map_err(|e| ArloError::Certificate(format!("station TLS context: {}", e)))
}
