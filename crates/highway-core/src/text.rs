use regex::Regex;
use std::sync::LazyLock;

/// Whitespace plus the common CJK and ASCII punctuation ignored during lookup.
/// The ASCII full stop is kept so decimals and abbreviations survive.
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\s\u{3000}。！？!?；;，,、：:「」『』“”"'（）()【】\[\]《》<>…—\-·]"#).unwrap()
});

/// Strip whitespace and punctuation, keeping the core character order.
///
/// The result is the identity of a meta: two surface forms that differ only
/// in punctuation or spacing normalize to the same key.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    PUNCTUATION.replace_all(text, "").into_owned()
}

/// True when the text carries nothing but punctuation and whitespace.
pub fn is_punctuation(text: &str) -> bool {
    normalize(text).is_empty()
}

/// CJK unified ideograph range used by the simple segmenters.
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}
