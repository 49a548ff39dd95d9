//! Inbound signature verification.
//!
//! Transports sign the raw request body with HMAC-SHA256 and send
//! `sha256=<hex>` in a signature header. Verification is constant-time;
//! failures stop at this boundary and never reach the core.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{GatewayError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verify `sha256=<hex>` against the raw body.
pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> Result<()> {
    let sig_hex = signature_header
        .strip_prefix("sha256=")
        .ok_or_else(|| GatewayError::Unauthorized("malformed signature header".into()))?;

    let expected = hex::decode(sig_hex)
        .map_err(|_| GatewayError::Unauthorized("signature is not valid hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::Unauthorized("invalid HMAC key".into()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| GatewayError::Unauthorized("signature mismatch".into()))
}

/// Sign a body the way a transport would. Used by tests and local tooling.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
