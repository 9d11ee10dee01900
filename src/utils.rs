/// First `max` characters of `text`, never splitting a character
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        // Multi-byte characters count once
        assert_eq!(truncate_chars("किसान योजना", 5), "किसान");
    }
}
