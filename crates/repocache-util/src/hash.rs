use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of a byte slice, returning a lowercase hex string.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Stable storage key for a repository URL: the hex SHA-256 of the URL text.
pub fn url_key(url: &str) -> String {
    sha256_bytes(url.as_bytes())
}
