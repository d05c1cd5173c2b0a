//! Salted PBKDF2-HMAC-SHA256 hashes stored as
//! `pbkdf2_sha256$<iterations>$<salt>$<digest>`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2_sha256";

/// Iterations for new hashes. Stored hashes keep the count they were made with.
pub const PBKDF2_ITERATIONS: u32 = 260_000;

/// Hashes a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    encode(password, &random_salt(), PBKDF2_ITERATIONS)
}

/// Checks a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != SCHEME || salt.is_empty() {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    let computed = digest(password, salt, iterations);
    computed.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn random_salt() -> String {
    let salt: [u8; 16] = rand::rng().random();
    STANDARD.encode(salt)
}

fn encode(password: &str, salt: &str, iterations: u32) -> String {
    format!("{}${}${}${}", SCHEME, iterations, salt, digest(password, salt, iterations))
}

fn digest(password: &str, salt: &str, iterations: u32) -> String {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    STANDARD.encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("rahasia123");
        assert!(hash.starts_with(&format!("pbkdf2_sha256${}$", PBKDF2_ITERATIONS)));
        assert_eq!(hash.split('$').count(), 4);
        assert!(verify_password("rahasia123", &hash));
        assert!(!verify_password("rahasia124", &hash));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same-password1"), hash_password("same-password1"));
    }

    #[test]
    fn test_stored_iteration_count_is_used() {
        let hash = encode("rahasia123", "garam", 1000);
        assert!(verify_password("rahasia123", &hash));

        let bumped = hash.replacen("$1000$", "$1001$", 1);
        assert!(!verify_password("rahasia123", &bumped));
    }

    #[test]
    fn test_rfc_vector() {
        // RFC 7914 section 11, PBKDF2-HMAC-SHA256 with one iteration
        let mut out = [0u8; 64];
        pbkdf2::pbkdf2_hmac::<Sha256>(b"passwd", b"salt", 1, &mut out);
        assert_eq!(
            out[..8],
            [0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]
        );
    }

    #[test]
    fn test_malformed_hash_is_rejected() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "md5$1$abc$def"));
        assert!(!verify_password("anything", "pbkdf2_sha256$1$$def"));
        assert!(!verify_password("anything", "pbkdf2_sha256$0$abc$def"));
        assert!(!verify_password("anything", "pbkdf2_sha256$many$abc$def"));
        assert!(!verify_password("anything", "sha256$abc$def"));
        assert!(!verify_password("anything", "pbkdf2_sha256"));
    }
}
