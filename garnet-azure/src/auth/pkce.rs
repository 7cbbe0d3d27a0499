//! PKCE utilities

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::Digest;
use sha2::Sha256;

/// A PKCE verifier and its S256 challenge.
///
/// Generated once per login attempt and consumed by the matching code exchange.
#[derive(Clone)]
pub struct PkceCodes {
    pub(crate) verifier: String,
    pub challenge: String,
}

impl PkceCodes {
    /// Generates a fresh verifier/challenge pair.
    pub fn generate() -> Self {
        let verifier = generate_code_verifier();
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl std::fmt::Debug for PkceCodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceCodes")
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

/// Generate a random code verifier (43-128 chars, [A-Za-z0-9-._~])
fn generate_code_verifier() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::rng();
    (0..128)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// S256 code challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Random `state` parameter for CSRF protection.
pub(crate) fn generate_state() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_uses_unreserved_charset() {
        let codes = PkceCodes::generate();
        assert_eq!(codes.verifier.len(), 128);
        assert!(
            codes
                .verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-._~".contains(c))
        );
    }

    #[test]
    fn challenge_matches_rfc7636_example() {
        // Appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pairs_are_fresh() {
        let a = PkceCodes::generate();
        let b = PkceCodes::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(generate_state(), generate_state());
    }
}
