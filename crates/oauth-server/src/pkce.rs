//! PKCE (Proof Key for Code Exchange) verification per RFC 7636
//!
//! The authorization endpoint records the client's S256 challenge next to
//! the issued code. At exchange time the client presents the original
//! verifier; the token endpoint recomputes the challenge and compares it
//! against the stored value. Also hosts the random generator used for every
//! opaque credential this server mints.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Bytes of entropy behind every client id, secret, code and token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Mint an unguessable opaque credential with a readable prefix.
///
/// 32 random bytes encoded as URL-safe base64 (no padding) yields 43
/// characters after the prefix.
pub fn random_token(prefix: &str) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    format!("{prefix}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Check a presented verifier against the challenge stored with the code.
///
/// The comparison is byte-for-byte on the encoded form.
pub fn verify(verifier: &str, challenge: &str) -> bool {
    compute_challenge(verifier).as_bytes() == challenge.as_bytes()
}
