use regex::Regex;
use std::sync::LazyLock;

static STYLED_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<[^>]*\bstyle\s*=\s*(?:"[^"]*"|'[^']*')[^>]*>"#).unwrap()
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Decoded in this order, so `&amp;lt;` ends up as `<`.
const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

/// Best-effort plain text from a message body.
///
/// Not a parser: malformed markup passes through whatever the tag patterns
/// don't match, and nothing here can fail.
pub fn clean_html(content: Option<&str>) -> String {
    let Some(content) = content.filter(|c| !c.is_empty()) else {
        return String::new();
    };

    let stripped = STYLED_TAG.replace_all(content, "");
    let stripped = ANY_TAG.replace_all(&stripped, "");

    let mut text = stripped.into_owned();
    for (entity, replacement) in ENTITIES {
        text = text.replace(entity, replacement);
    }

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
