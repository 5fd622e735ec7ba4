//! Storage for the installation key pair and the per-station certificate bundles.
//!
//! Layout under the storage root:
//!
//! ```text
//! device_id                  installation id sent as `uuid` when provisioning
//! certs/private.pem          installation private key (PKCS#8)
//! certs/public.pem           matching public key
//! certs/<station_key>/peer.crt    client certificate presented to the station
//! certs/<station_key>/device.crt  station certificate, when the cloud sends one
//! certs/<station_key>/ica.crt     intermediate CA the station chains to
//! ```

use crate::common::errors::{ArloError, Result};
use crate::crypto::pem::certificate_pem;
use rcgen::KeyPair;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const PRIVATE_KEY_FILE: &str = "private.pem";
const PUBLIC_KEY_FILE: &str = "public.pem";
const PEER_CERT_FILE: &str = "peer.crt";
const DEVICE_CERT_FILE: &str = "device.crt";
const ICA_CERT_FILE: &str = "ica.crt";
const DEVICE_ID_FILE: &str = "device_id";

/// One entry of `certsData` in the provisioning response
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCerts {
    #[serde(rename = "uniqueId", default)]
    pub unique_id: Option<String>,
    #[serde(rename = "peerCert")]
    pub peer_cert: String,
    #[serde(rename = "deviceCert", default)]
    pub device_cert: Option<String>,
}

/// `data` of a successful `security/cert/create` call
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionedCerts {
    #[serde(rename = "certsData")]
    pub certs_data: Vec<DeviceCerts>,
    #[serde(rename = "icaCert")]
    pub ica_cert: String,
}

impl ProvisionedCerts {
    /// Entry issued for `station_key`, falling back to the first one
    pub fn for_station(&self, station_key: &str) -> Option<&DeviceCerts> {
        self.certs_data
            .iter()
            .find(|c| c.unique_id.as_deref() == Some(station_key))
            .or_else(|| self.certs_data.first())
    }
}

/// Everything needed to build the mutual-TLS client for one station
#[derive(Clone)]
pub struct CertificateBundle {
    pub peer_cert_pem: String,
    pub private_key_pem: String,
    pub ica_cert_pem: String,
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("peer_cert_pem", &self.peer_cert_pem.len())
            .field("private_key_pem", &"<redacted>")
            .field("ica_cert_pem", &self.ica_cert_pem.len())
            .finish()
    }
}

/// Lookup/save contract for certificate material.
///
/// The filesystem layout is one backing; anything that keeps the same
/// lookup and save semantics (an encrypted key store, say) can stand in.
pub trait CertStore: Send + Sync {
    /// Root directory holding the key pair and per-station bundles
    fn certs_path(&self) -> &Path;

    fn private_key_path(&self) -> PathBuf {
        self.certs_path().join(PRIVATE_KEY_FILE)
    }

    /// Installation public key, PEM armoured
    fn public_key(&self) -> &str;

    fn device_certs_path(&self, station_key: &str) -> PathBuf {
        self.certs_path().join(station_key)
    }

    fn has_device_certs(&self, station_key: &str) -> bool {
        let dir = self.device_certs_path(station_key);
        dir.join(PEER_CERT_FILE).is_file() && dir.join(ICA_CERT_FILE).is_file()
    }

    fn save_device_certs(&self, station_key: &str, certs: &ProvisionedCerts) -> Result<()>;

    /// Read back the bundle for `station_key`. Fails if provisioning never happened.
    fn load_device_bundle(&self, station_key: &str) -> Result<CertificateBundle> {
        check_station_key(station_key)?;
        let dir = self.device_certs_path(station_key);
        Ok(CertificateBundle {
            peer_cert_pem: read_material(&dir.join(PEER_CERT_FILE))?,
            private_key_pem: read_material(&self.private_key_path())?,
            ica_cert_pem: read_material(&dir.join(ICA_CERT_FILE))?,
        })
    }
}

/// Filesystem-backed [`CertStore`]
pub struct FileCertStore {
    root: PathBuf,
    certs_path: PathBuf,
    public_key: String,
}

impl FileCertStore {
    /// Open (or initialise) the store, generating the key pair on first use
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let certs_path = root.join("certs");
        fs::create_dir_all(&certs_path)?;

        let public_key = load_or_generate_key_pair(&certs_path)?;

        Ok(Self {
            root,
            certs_path,
            public_key,
        })
    }

    /// Stable per-installation id, generated once and kept next to the certs
    pub fn installation_id(&self) -> Result<String> {
        let path = self.root.join(DEVICE_ID_FILE);
        match fs::read_to_string(&path) {
            Ok(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            Ok(_) => write_installation_id(&path),
            Err(e) if e.kind() == ErrorKind::NotFound => write_installation_id(&path),
            Err(e) => Err(e.into()),
        }
    }
}

impl CertStore for FileCertStore {
    fn certs_path(&self) -> &Path {
        &self.certs_path
    }

    fn public_key(&self) -> &str {
        &self.public_key
    }

    fn save_device_certs(&self, station_key: &str, certs: &ProvisionedCerts) -> Result<()> {
        check_station_key(station_key)?;
        let entry = certs.for_station(station_key).ok_or_else(|| {
            ArloError::InvalidResponse("certificate response has no certsData".to_string())
        })?;

        // Validate everything before touching disk
        let peer = certificate_pem(&entry.peer_cert)?;
        let device = entry.device_cert.as_deref().map(certificate_pem).transpose()?;
        let ica = certificate_pem(&certs.ica_cert)?;

        let dir = self.device_certs_path(station_key);
        fs::create_dir_all(&dir)?;

        fs::write(dir.join(PEER_CERT_FILE), peer)?;
        if let Some(device) = device {
            fs::write(dir.join(DEVICE_CERT_FILE), device)?;
        }
        fs::write(dir.join(ICA_CERT_FILE), ica)?;

        tracing::debug!(station_key, dir = %dir.display(), "saved device certificates");
        Ok(())
    }
}

// Returns the public key PEM
fn load_or_generate_key_pair(certs_path: &Path) -> Result<String> {
    let private_path = certs_path.join(PRIVATE_KEY_FILE);
    let public_path = certs_path.join(PUBLIC_KEY_FILE);

    if private_path.is_file() {
        let private_pem = fs::read_to_string(&private_path)?;
        let key_pair = KeyPair::from_pem(&private_pem)?;
        let public_pem = key_pair.public_key_pem();
        if !public_path.is_file() {
            fs::write(&public_path, &public_pem)?;
        }
        return Ok(public_pem);
    }

    let key_pair = KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256)?;
    write_private_key(&private_path, &key_pair.serialize_pem())?;
    let public_pem = key_pair.public_key_pem();
    fs::write(&public_path, &public_pem)?;

    tracing::info!(path = %private_path.display(), "generated installation key pair");
    Ok(public_pem)
}

fn write_private_key(path: &Path, pem: &str) -> Result<()> {
    fs::write(path, pem)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn write_installation_id(path: &Path) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    fs::write(path, &id)?;
    Ok(id)
}

fn read_material(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ArloError::Certificate(format!(
            "{} not found, provision device certificates first",
            path.display()
        )),
        _ => ArloError::Certificate(format!("failed to read {}: {}", path.display(), e)),
    })
}

// Station keys become a directory name
fn check_station_key(station_key: &str) -> Result<()> {
    if station_key.is_empty()
        || station_key == "."
        || station_key == ".."
        || station_key.contains(['/', '\\', '\0'])
    {
        return Err(ArloError::Certificate(format!(
            "invalid station key: {:?}",
            station_key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn provisioned(unique_id: &str) -> ProvisionedCerts {
        ProvisionedCerts {
            certs_data: vec![DeviceCerts {
                unique_id: Some(unique_id.to_string()),
                peer_cert: "UEVFUg==".to_string(),
                device_cert: Some("REVWSUNF".to_string()),
            }],
            ica_cert: "SUNB".to_string(),
        }
    }

    #[test]
    fn open_generates_key_pair_once() {
        let dir = TempDir::new().unwrap();

        let first = FileCertStore::open(dir.path()).unwrap();
        assert!(first.public_key().starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(first.private_key_path().is_file());

        let second = FileCertStore::open(dir.path()).unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn save_then_load_bundle() {
        let dir = TempDir::new().unwrap();
        let store = FileCertStore::open(dir.path()).unwrap();

        assert!(!store.has_device_certs("user_BASE1"));
        store
            .save_device_certs("user_BASE1", &provisioned("user_BASE1"))
            .unwrap();
        assert!(store.has_device_certs("user_BASE1"));

        let bundle = store.load_device_bundle("user_BASE1").unwrap();
        assert!(bundle.peer_cert_pem.contains("UEVFUg=="));
        assert!(bundle.ica_cert_pem.contains("SUNB"));
        assert!(bundle.private_key_pem.contains("PRIVATE KEY"));
        assert!(store
            .device_certs_path("user_BASE1")
            .join(DEVICE_CERT_FILE)
            .is_file());
    }

    #[test]
    fn load_without_provisioning_is_a_certificate_error() {
        let dir = TempDir::new().unwrap();
        let store = FileCertStore::open(dir.path()).unwrap();

        let err = store.load_device_bundle("user_BASE2").unwrap_err();
        assert!(matches!(err, ArloError::Certificate(_)));
    }

    #[test]
    fn rejects_station_keys_that_escape_the_store() {
        let dir = TempDir::new().unwrap();
        let store = FileCertStore::open(dir.path()).unwrap();

        let err = store
            .save_device_certs("../evil", &provisioned("../evil"))
            .unwrap_err();
        assert!(matches!(err, ArloError::Certificate(_)));
    }

    #[test]
    fn empty_certs_data_is_invalid() {
        let dir = TempDir::new().unwrap();
        let store = FileCertStore::open(dir.path()).unwrap();
        let certs = ProvisionedCerts {
            certs_data: vec![],
            ica_cert: "SUNB".to_string(),
        };

        let err = store.save_device_certs("user_BASE1", &certs).unwrap_err();
        assert!(matches!(err, ArloError::InvalidResponse(_)));
        assert!(!store.has_device_certs("user_BASE1"));
    }

    #[test]
    fn malformed_certificate_body_saves_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileCertStore::open(dir.path()).unwrap();
        let mut certs = provisioned("user_BASE1");
        certs.ica_cert = "SUNB\u{e9}LUNF".to_string();

        let err = store.save_device_certs("user_BASE1", &certs).unwrap_err();
        assert!(matches!(err, ArloError::Certificate(_)));
        assert!(!store.has_device_certs("user_BASE1"));
        assert!(!store.device_certs_path("user_BASE1").join(PEER_CERT_FILE).exists());
    }

    #[test]
    fn installation_id_is_stable() {
        let dir = TempDir::new().unwrap();
        let store = FileCertStore::open(dir.path()).unwrap();

        let id = store.installation_id().unwrap();
        assert_eq!(id.len(), 36);
        assert_eq!(store.installation_id().unwrap(), id);
    }
}
