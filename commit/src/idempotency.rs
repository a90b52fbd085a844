/// Namespaces a caller-supplied idempotency key by the originating tool operation so the same
/// raw key reused across different tools never collides.
pub fn namespaced_key(tool_prefix: &str, raw_key: &str) -> String {
    format!("{tool_prefix}:{raw_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_differ_across_prefixes() {
        assert_ne!(namespaced_key("commit", "abc"), namespaced_key("canonical_upsert", "abc"));
    }

    #[test]
    fn same_prefix_and_key_is_stable() {
        assert_eq!(namespaced_key("commit", "abc"), namespaced_key("commit", "abc"));
    }
}
