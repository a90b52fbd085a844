use sha2::{Digest, Sha256};

/// Checksum used for `MemoryVersion.checksum` and content-addressed dedup: lowercase hex
/// SHA-256 of the raw content text.
pub fn checksum(content_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derives a stable `project_key` by hashing the chosen identity source (repo URL, cwd, or an
/// explicit value), truncated to a short hex prefix so keys stay readable in logs and URIs.
pub fn derive_project_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(checksum("hello"), checksum("hello"));
        assert_ne!(checksum("hello"), checksum("world"));
    }

    #[test]
    fn project_key_is_stable_and_short() {
        let a = derive_project_key("https://github.com/acme/widgets");
        let b = derive_project_key("https://github.com/acme/widgets");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
