use sha2::{Digest, Sha256};

/// Lowercase, sort, and keep only alphanumeric tokens — the canonical normalization the
/// deterministic fake embedder hashes, so that word-order and casing never change the vector.
fn normalize_tokens(text: &str) -> String {
    let mut tokens: Vec<String> = text
        .split_whitespace()
        .map(|tok| {
            tok.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|tok| !tok.is_empty())
        .collect();
    tokens.sort();
    tokens.join(" ")
}

/// Deterministic fake embedding: SHA-256 of the normalized token string, each output byte
/// mapped into `[-1, 1]`. Used by tests and by the `EMBEDDER_USE_FAKE` configuration switch.
pub fn deterministic_embedding(text: &str, dims: usize) -> Vec<f32> {
    let dims = dims.max(1);
    let normalized = normalize_tokens(text);

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();

    let mut out = Vec::with_capacity(dims);
    let mut counter: u32 = 0;
    while out.len() < dims {
        let mut round = Sha256::new();
        round.update(digest);
        round.update(counter.to_le_bytes());
        let bytes = round.finalize();
        for byte in bytes.iter() {
            if out.len() == dims {
                break;
            }
            out.push((*byte as f32 / 127.5) - 1.0);
        }
        counter += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_embedding_is_reproducible_for_same_inputs() {
        let a = deterministic_embedding("hello world", 16);
        let b = deterministic_embedding("hello world", 16);
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_embedding_ignores_word_order_and_case() {
        let a = deterministic_embedding("Connection Reset", 8);
        let b = deterministic_embedding("reset connection", 8);
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_embedding_changes_when_text_changes() {
        let a = deterministic_embedding("hello", 8);
        let b = deterministic_embedding("goodbye", 8);
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_embedding_respects_requested_dims() {
        let v = deterministic_embedding("hello", 37);
        assert_eq!(v.len(), 37);
        assert!(v.iter().all(|x| (-1.0..=1.0).contains(x)));
    }
}
