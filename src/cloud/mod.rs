mod client;
pub mod mfa;
pub mod models;

pub use client::{ArloClient, Session};
pub use mfa::{FactorRole, FinishAuthOutcome, MfaFactor};
