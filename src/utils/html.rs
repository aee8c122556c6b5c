use ammonia;

/// Strips markup from admin-authored quiz text (titles, descriptions,
/// question and option bodies) before it is stored. Whitelist-based, so
/// plain text passes through while script/iframe payloads and event
/// attributes are removed.
pub fn clean_text(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(clean_text("What is 2 + 2?"), "What is 2 + 2?");
    }

    #[test]
    fn script_payloads_are_stripped() {
        let cleaned = clean_text("hi<script>alert(1)</script>");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.starts_with("hi"));
    }
}
