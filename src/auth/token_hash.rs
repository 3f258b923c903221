use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a refresh token.
///
/// Records are keyed by this digest; the token itself is never stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("some.refresh.token");
        let hash2 = hash_token("some.refresh.token");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, "some.refresh.token");
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
