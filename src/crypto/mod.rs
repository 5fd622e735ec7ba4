pub mod pem;
pub mod store;

pub use store::{CertStore, CertificateBundle, DeviceCerts, FileCertStore, ProvisionedCerts};
