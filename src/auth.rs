//! Credentials presented to the message server.
//!
//! Two schemes exist. The current one sends an HTTP Basic `Authorization` header during the
//! websocket handshake. The legacy one opens the socket unauthenticated and then sends a
//! `connect` message carrying an auth code derived from the secret key.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest as _, Sha512};

use crate::types::Version;

/// Number of random bytes in an auth code nonce.
const NONCE_LEN: usize = 32;

/// Returns the `Authorization` header value for the handshake:
/// `Basic base64("<VERSION>.<BUILD>:<secret_key>")`.
#[must_use]
pub fn basic_authorization(version: &Version, secret_key: &SecretString) -> SecretString {
    let credentials = format!("{}:{}", version.user_name(), secret_key.expose_secret());
    SecretString::from(format!("Basic {}", STANDARD.encode(credentials)))
}

/// Builds a legacy auth code with a fresh random nonce.
#[must_use]
pub fn build_auth_code(secret_key: &SecretString) -> String {
    let nonce: [u8; NONCE_LEN] = rand::random();
    auth_code_with_nonce(secret_key, &STANDARD.encode(nonce))
}

/// `"<key part>;<nonce>;<hash>"` where the key part is the first and last three characters
/// of the key and the hash is `base64(sha512("<nonce>;<secret_key>"))`.
fn auth_code_with_nonce(secret_key: &SecretString, nonce: &str) -> String {
    let key = secret_key.expose_secret();

    let mut hasher = Sha512::new();
    hasher.update(nonce.as_bytes());
    hasher.update(b";");
    hasher.update(key.as_bytes());
    let key_hash = STANDARD.encode(hasher.finalize());

    format!("{};{nonce};{key_hash}", key_part(key))
}

fn key_part(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head = chars.iter().take(3);
    let tail = chars.iter().skip(chars.len().saturating_sub(3));
    head.chain(tail).collect()
}
