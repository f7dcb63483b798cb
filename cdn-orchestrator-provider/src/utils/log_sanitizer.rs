//! Log sanitization
//!
//! Keeps response bodies, canonical requests and credentials from being
//! written to logs in full.

/// Maximum number of bytes of a payload echoed into a log line.
const TRUNCATE_LIMIT: usize = 256;

/// Number of leading characters of a secret left visible by [`mask_secret`].
const MASK_VISIBLE_PREFIX: usize = 3;

/// MSRV-compatible `str::floor_char_boundary` (stable since 1.91.0).
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Truncate a payload for logging, appending the total length when cut.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        return s.to_string();
    }
    format!(
        "{}... [truncated, total {} bytes]",
        &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
        s.len()
    )
}

/// Mask a credential for display: `abc*****`. Short values are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(MASK_VISIBLE_PREFIX).collect();
    let total = secret.chars().count();
    if total <= MASK_VISIBLE_PREFIX * 2 {
        return "*".repeat(total.max(1));
    }
    format!("{visible}{}", "*".repeat(total - MASK_VISIBLE_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payload_unchanged() {
        let s = "{\"status\":{\"code\":1}}";
        assert_eq!(truncate_for_log(s), s);
    }

    #[test]
    fn payload_at_limit_unchanged() {
        let s = "a".repeat(TRUNCATE_LIMIT);
        assert_eq!(truncate_for_log(&s), s);
    }

    #[test]
    fn long_payload_truncated() {
        let s = "a".repeat(TRUNCATE_LIMIT + 100);
        let result = truncate_for_log(&s);
        assert!(result.starts_with(&"a".repeat(TRUNCATE_LIMIT)));
        assert!(result.ends_with(&format!("[truncated, total {} bytes]", TRUNCATE_LIMIT + 100)));
    }

    #[test]
    fn multibyte_boundary_respected() {
        // 3-byte chars; 256 is not a multiple of 3
        let s = "域".repeat(200);
        let result = truncate_for_log(&s);
        assert!(result.contains("... [truncated, total 600 bytes]"));
        assert!(result.starts_with(&"域".repeat(85)));
    }

    #[test]
    fn mask_keeps_prefix() {
        assert_eq!(mask_secret("supersecretvalue"), "sup*************");
    }

    #[test]
    fn mask_short_secret_fully() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdef"), "******");
        assert_eq!(mask_secret(""), "*");
    }
}
