//! PEM armour helpers for the bare base64 blobs the cloud hands out.

use crate::common::errors::{ArloError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

const LINE_WIDTH: usize = 64;

/// Armour a base64 DER certificate body. Already-armoured input passes through.
///
/// Fails with `Certificate` when the body is not valid base64.
pub fn certificate_pem(body: &str) -> Result<String> {
    armour("CERTIFICATE", body)
}

/// Strip armour and line breaks from a public key PEM, as the cert endpoint expects
pub fn bare_public_key(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .map(str::trim)
        .collect()
}

fn armour(label: &str, body: &str) -> Result<String> {
    if body.contains("-----BEGIN") {
        let mut pem = body.trim().to_string();
        pem.push('\n');
        return Ok(pem);
    }

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ArloError::Certificate(format!("{} body is not base64: {}", label, e)))?;
    if der.is_empty() {
        return Err(ArloError::Certificate(format!("{} body is empty", label)));
    }

    let encoded = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {}-----\n", label);
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        // encoder output is ASCII
        let (line, tail) = rest.split_at(rest.len().min(LINE_WIDTH));
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }
    pem.push_str(&format!("-----END {}-----\n", label));
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_long_bodies_at_64_columns() {
        let body = "A".repeat(100);
        let pem = certificate_pem(&body).unwrap();
        let lines: Vec<&str> = pem.lines().collect();

        assert_eq!(lines[0], "-----BEGIN CERTIFICATE-----");
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 36);
        assert_eq!(lines[3], "-----END CERTIFICATE-----");
    }

    #[test]
    fn ignores_embedded_whitespace() {
        let pem = certificate_pem("QUJD\nREVG\r\n").unwrap();
        assert!(pem.contains("\nQUJDREVG\n"));
    }

    #[test]
    fn armoured_input_passes_through() {
        let input = "-----BEGIN CERTIFICATE-----\nQUJD\n-----END CERTIFICATE-----";
        assert_eq!(certificate_pem(input).unwrap(), format!("{}\n", input));
    }

    #[test]
    fn rejects_bodies_that_are_not_base64() {
        for body in ["not base64!", "QUJ", "Q\u{e9}JD", ""] {
            let err = certificate_pem(body).unwrap_err();
            assert!(matches!(err, ArloError::Certificate(_)), "{body:?}");
        }
    }

    #[test]
    fn public_key_is_stripped_to_one_line() {
        let pem = "-----BEGIN PUBLIC KEY-----\nMFkwEwYH\nKoZIzj0C\n-----END PUBLIC KEY-----\n";
        assert_eq!(bare_public_key(pem), "MFkwEwYHKoZIzj0C");
    }
}
