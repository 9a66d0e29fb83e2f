//! Segmented wildcard topic matching.
//!
//! A topic is a sequence of segments separated by `.`. A pattern shares that
//! structure and may use `*` to match exactly one segment. `**` is reserved
//! (spec §4.A, §9) and rejected outright rather than silently treated as a
//! literal or ignored — see [`validate_pattern`].

/// Returns `true` if `pattern` contains no wildcard segment.
pub fn is_literal(pattern: &str) -> bool {
    pattern.split('.').all(|segment| segment != "*")
}

/// Rejects patterns using the reserved (and unimplemented) `**` token.
///
/// Every other segment is accepted verbatim, including `*`.
pub fn validate_pattern(pattern: &str) -> Result<(), crate::Error> {
    if pattern.is_empty() {
        return Err(crate::Error::EmptyPattern);
    }
    if pattern.split('.').any(|segment| segment == "**") {
        return Err(crate::Error::InvalidPattern(pattern.to_string()));
    }
    Ok(())
}

/// Segment-by-segment match of `topic` against `pattern`.
///
/// `*` matches any single segment; any other segment must compare equal
/// case-sensitively. Pattern and topic must have the same segment count.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_segments = pattern.split('.');
    let mut topic_segments = topic.split('.');

    loop {
        match (pattern_segments.next(), topic_segments.next()) {
            (Some(p), Some(t)) => {
                if p != "*" && p != t {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_has_no_wildcard_segment() {
        assert!(is_literal("user.login"));
        assert!(!is_literal("user.*"));
    }

    #[test]
    fn exact_match() {
        assert!(matches("user.login", "user.login"));
        assert!(!matches("user.login", "user.logout"));
    }

    #[test]
    fn single_segment_wildcard() {
        assert!(matches("user.*", "user.login"));
        assert!(matches("user.*", "user.logout"));
        assert!(!matches("user.*", "system.error"));
    }

    #[test]
    fn wildcard_prefix() {
        assert!(matches("*.error", "system.error"));
        assert!(matches("*.error", "network.error"));
        assert!(!matches("*.error", "system.warning"));
    }

    #[test]
    fn segment_count_must_match() {
        assert!(!matches("user.*", "user.profile.updated"));
        assert!(!matches("user.*.updated", "user.updated"));
    }

    #[test]
    fn double_wildcard_is_rejected() {
        assert!(validate_pattern("user.**").is_err());
        assert!(validate_pattern("**").is_err());
        assert!(validate_pattern("user.*").is_ok());
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(validate_pattern("").is_err());
    }
}
