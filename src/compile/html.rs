//! HTML normalization used before every rendered-output comparison.

use once_cell::sync::Lazy;
use regex::Regex;

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());

/// Strip comments, collapse whitespace runs, drop whitespace between tags
/// and trim. Normalizing twice gives the same string.
pub fn normalize_html(html: &str) -> String {
    let mut text = html.to_string();
    loop {
        let stripped = COMMENT.replace_all(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }
    let collapsed = WHITESPACE.replace_all(&text, " ");
    let joined = BETWEEN_TAGS.replace_all(&collapsed, "><");
    joined.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_joins_tags() {
        let html = "\n  <h1>I  am  title</h1>\n  <p>\n    I'm&nbsp;&nbsp;   paragraph <span>I am   spanning</span>\n  </p>\n";
        assert_eq!(
            normalize_html(html),
            "<h1>I am title</h1><p> I'm&nbsp;&nbsp; paragraph <span>I am spanning</span></p>"
        );
    }

    #[test]
    fn strips_comments() {
        let html = "<h2>Kild: I am expected</h2><!--<Child>--><!--<App>-->\n";
        assert_eq!(normalize_html(html), "<h2>Kild: I am expected</h2>");
    }

    #[test]
    fn is_idempotent() {
        for html in [
            "  a   b  ",
            "<p> x </p>\n\n<p>y</p>",
            "<!-<!---->--> text",
            "",
            "\t<div>\n</div>",
        ] {
            let once = normalize_html(html);
            assert_eq!(normalize_html(&once), once, "input: {:?}", html);
        }
    }

    #[test]
    fn whitespace_run_length_does_not_matter() {
        assert_eq!(
            normalize_html("before anything:\n   expect#0\n after all"),
            normalize_html("before anything: expect#0 after all")
        );
    }
}
