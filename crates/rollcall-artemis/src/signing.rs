//! Artemis request signing.
//!
//! The gateway authenticates each call with an HMAC-SHA256 over a
//! newline-joined canonical string:
//!
//! ```text
//! POST
//! <Accept>
//! <Content-MD5>
//! <Content-Type>
//! x-ca-key:<app key>
//! x-ca-timestamp:<epoch millis>
//! <uri path>
//! ```
//!
//! Both the digest and the signature are base64-encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ACCEPT: &str = "*/*";
pub const CONTENT_TYPE: &str = "application/json;charset=UTF-8";
/// Names of the headers covered by the signature, in signing order.
pub const SIGNATURE_HEADERS: &str = "x-ca-key,x-ca-timestamp";

/// Header values produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub content_md5: String,
    pub timestamp: i64,
    pub signature: String,
}

/// Base64 MD5 of the exact bytes sent as the request body.
pub fn content_md5(body: &[u8]) -> String {
    STANDARD.encode(Md5::digest(body))
}

pub fn string_to_sign(content_md5: &str, app_key: &str, timestamp: i64, uri: &str) -> String {
    format!(
        "POST\n{ACCEPT}\n{content_md5}\n{CONTENT_TYPE}\nx-ca-key:{app_key}\nx-ca-timestamp:{timestamp}\n{uri}"
    )
}

/// Sign `body` for `uri`. Deterministic for fixed inputs.
pub fn sign(app_key: &str, app_secret: &str, uri: &str, body: &[u8], timestamp: i64) -> Signature {
    let content_md5 = content_md5(body);
    let canonical = string_to_sign(&content_md5, app_key, timestamp, uri);
    Signature {
        signature: STANDARD.encode(hmac_sha256(app_secret.as_bytes(), canonical.as_bytes())),
        content_md5,
        timestamp,
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
