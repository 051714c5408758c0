/// Byte-wise ASCII text normalisation.
///
/// Lowercases ASCII letters, strips ASCII punctuation, folds whitespace runs
/// into single spaces and trims the ends. Non-ASCII bytes pass through
/// unchanged, so multi-byte UTF-8 sequences survive intact.
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn normalize(text: &str) -> String {
        let mut cleaned: Vec<u8> = Vec::with_capacity(text.len());
        for &byte in text.as_bytes() {
            if byte.is_ascii_whitespace() {
                cleaned.push(b' ');
            } else if byte.is_ascii_punctuation() {
                continue;
            } else {
                cleaned.push(byte.to_ascii_lowercase());
            }
        }

        // Collapse space runs; treating the start as a space trims the front.
        let mut collapsed: Vec<u8> = Vec::with_capacity(cleaned.len());
        let mut prev_space = true;
        for byte in cleaned {
            if byte == b' ' {
                if !prev_space {
                    collapsed.push(b' ');
                    prev_space = true;
                }
            } else {
                collapsed.push(byte);
                prev_space = false;
            }
        }
        if collapsed.last() == Some(&b' ') {
            collapsed.pop();
        }

        String::from_utf8_lossy(&collapsed).into_owned()
    }

    /// Split normalised text on the single-space boundaries `normalize`
    /// guarantees; duplicates are preserved in input order.
    pub fn tokenize(normalized: &str) -> Vec<String> {
        if normalized.is_empty() {
            return Vec::new();
        }
        normalized.split(' ').map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(
            TextNormalizer::normalize("Hello, World! This is FINE."),
            "hello world this is fine"
        );
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(TextNormalizer::normalize("a\t\tb  \n c"), "a b c");
        assert_eq!(TextNormalizer::normalize("  padded  "), "padded");
    }

    #[test]
    fn empty_and_junk_input_normalize_to_empty() {
        assert_eq!(TextNormalizer::normalize(""), "");
        assert_eq!(TextNormalizer::normalize("   \t \n "), "");
        assert_eq!(TextNormalizer::normalize("!!! ... ?!"), "");
    }

    #[test]
    fn non_ascii_bytes_pass_through() {
        assert_eq!(TextNormalizer::normalize("Crème Brûlée"), "crème brûlée");
    }

    #[test]
    fn digits_and_letters_survive() {
        assert_eq!(
            TextNormalizer::normalize("Order #42 shipped on 2024-06-01!"),
            "order 42 shipped on 20240601"
        );
    }

    #[test]
    fn tokenize_preserves_order_and_duplicates() {
        let normalized = TextNormalizer::normalize("to be or NOT to be");
        assert_eq!(
            TextNormalizer::tokenize(&normalized),
            vec!["to", "be", "or", "not", "to", "be"]
        );
        assert!(TextNormalizer::tokenize("").is_empty());
    }
}
