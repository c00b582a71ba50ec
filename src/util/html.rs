use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::resolve_predefined_entity;
use regex::{Captures, Regex};

/// `src`/`href` attributes whose quoted value is site-root-relative (`/x`, not `//x`).
static RELATIVE_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(src|href)(\s*=\s*)(?:"(/(?:[^/"][^"]*)?)"|'(/(?:[^/'][^']*)?)')"#).unwrap()
});

/// First `<audio ... src=...mp3>` in a decoded description.
static AUDIO_SRC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<audio[^>]+src\s*=\s*["']?([^"'>\s]+\.mp3)(?:["'\s>/]|$)"#).unwrap()
});

/// A named (`&amp;`), decimal (`&#38;`) or hex (`&#x26;`) character reference.
static CHAR_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9A-Fa-f]{1,6})|([A-Za-z][A-Za-z0-9]{1,31}));").unwrap()
});

/// HTML named entities seen in article markup beyond the five XML builtins.
fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    if let Some(resolved) = resolve_predefined_entity(entity) {
        return Some(resolved);
    }
    match entity {
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "thinsp" => Some("\u{2009}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "hellip" => Some("\u{2026}"),
        "middot" => Some("\u{b7}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "trade" => Some("\u{2122}"),
        "yen" => Some("\u{a5}"),
        _ => None,
    }
}

/// Decodes HTML character references in description markup.
///
/// Handles the XML builtins, numeric references and a small table of common
/// HTML named entities. Each reference is decoded on its own: unknown names,
/// invalid code points and stray `&` are left as written, so one odd
/// reference never hides the rest of the markup from the audio scan.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    CHAR_REF_PATTERN.replace_all(text, |caps: &Captures<'_>| {
        let decoded = if let Some(dec) = caps.get(1) {
            dec.as_str().parse::<u32>().ok().and_then(char_from_code)
        } else if let Some(hex) = caps.get(2) {
            u32::from_str_radix(hex.as_str(), 16).ok().and_then(char_from_code)
        } else {
            caps.get(3)
                .and_then(|name| resolve_html_entity(name.as_str()))
                .map(str::to_owned)
        };
        decoded.unwrap_or_else(|| caps[0].to_owned())
    })
}

/// NUL and non-scalar values stay undecoded.
fn char_from_code(code: u32) -> Option<String> {
    char::from_u32(code)
        .filter(|&c| c != '\0')
        .map(String::from)
}

/// Rewrites site-root-relative `src`/`href` values to absolute URLs.
///
/// `prefix` is the site base without a trailing slash. Protocol-relative
/// values (`//host/path`) and anything already absolute are left alone.
/// Returns `Cow::Borrowed` when nothing was rewritten.
pub fn repair_relative_links<'a>(html: &'a str, prefix: &str) -> Cow<'a, str> {
    RELATIVE_LINK_PATTERN.replace_all(html, |caps: &Captures<'_>| {
        let (quote, path) = match (caps.get(3), caps.get(4)) {
            (Some(path), _) => ('"', path.as_str()),
            (None, Some(path)) => ('\'', path.as_str()),
            // Unreachable: one alternative always matches
            (None, None) => return caps[0].to_owned(),
        };
        format!("{}{}{quote}{prefix}{path}{quote}", &caps[1], &caps[2])
    })
}

/// Finds the first `.mp3` source of an `<audio>` tag, case-insensitively.
///
/// The description is entity-decoded first, so both literal and escaped
/// markup (`&lt;audio src=...&gt;`) are recognized. The returned path is
/// unresolved; it may be absolute, protocol-relative or site-relative.
pub fn find_audio_src(description: &str) -> Option<String> {
    let decoded = decode_entities(description);
    AUDIO_SRC_PATTERN
        .captures(&decoded)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "https://nhkeasier.com";

    #[test]
    fn test_decode_plain_text_is_borrowed() {
        assert!(matches!(decode_entities("no entities here"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_escaped_markup() {
        assert_eq!(
            decode_entities("&lt;audio src=&quot;/a.mp3&quot;&gt;&#x3042;&nbsp;"),
            "<audio src=\"/a.mp3\">\u{3042}\u{a0}"
        );
    }

    #[test]
    fn test_decode_keeps_unknown_references_and_decodes_the_rest() {
        assert_eq!(
            decode_entities("caf&eacute; &lt;b&gt; &#0; &#x110000; &bogus &lt;/b&gt;"),
            "caf&eacute; <b> &#0; &#x110000; &bogus </b>"
        );
    }

    #[test]
    fn test_find_audio_src_next_to_unknown_entity() {
        let html = "&lt;p&gt;caf&eacute;&lt;/p&gt;&lt;audio src=&quot;/a.mp3&quot;&gt;";
        assert_eq!(find_audio_src(html).as_deref(), Some("/a.mp3"));
    }

    #[test]
    fn test_find_audio_src_next_to_bare_ampersand() {
        let html = "&lt;p&gt;AT&T&lt;/p&gt;&lt;audio src=\"/a.mp3\"&gt;";
        assert_eq!(find_audio_src(html).as_deref(), Some("/a.mp3"));
    }

    #[test]
    fn test_decode_stray_ampersand_returns_input() {
        assert_eq!(decode_entities("Q&A <audio>"), "Q&A <audio>");
    }

    #[test]
    fn test_repair_double_quoted_src() {
        let html = r#"<audio src="/audio/foo.mp3"></audio>"#;
        assert_eq!(
            repair_relative_links(html, PREFIX),
            r#"<audio src="https://nhkeasier.com/audio/foo.mp3"></audio>"#
        );
    }

    #[test]
    fn test_repair_single_quoted_href_and_spacing() {
        let html = "<a HREF = '/story/1/'>story</a>";
        assert_eq!(
            repair_relative_links(html, PREFIX),
            "<a HREF = 'https://nhkeasier.com/story/1/'>story</a>"
        );
    }

    #[test]
    fn test_repair_leaves_protocol_relative() {
        let html = r#"<audio src="//cdn.example/x.mp3"></audio>"#;
        let repaired = repair_relative_links(html, PREFIX);
        assert!(matches!(repaired, Cow::Borrowed(_)));
        assert_eq!(repaired, html);
    }

    #[test]
    fn test_repair_leaves_absolute() {
        let html = r#"<img src="https://nhkeasier.com/a.jpg"><a href="page">x</a>"#;
        assert_eq!(repair_relative_links(html, PREFIX), html);
    }

    #[test]
    fn test_repair_site_root() {
        assert_eq!(
            repair_relative_links(r#"<a href="/">home</a>"#, PREFIX),
            r#"<a href="https://nhkeasier.com/">home</a>"#
        );
    }

    #[test]
    fn test_repair_multiple_links() {
        let html = r#"<img src="/i.jpg"><audio src="/a.mp3"></audio>"#;
        assert_eq!(
            repair_relative_links(html, PREFIX),
            r#"<img src="https://nhkeasier.com/i.jpg"><audio src="https://nhkeasier.com/a.mp3"></audio>"#
        );
    }

    #[test]
    fn test_repair_rewrites_data_src() {
        // `-` is a word boundary, so lazy-image attributes are repaired as well
        let html = r#"<img data-src="/i.jpg">"#;
        assert_eq!(
            repair_relative_links(html, PREFIX),
            r#"<img data-src="https://nhkeasier.com/i.jpg">"#
        );
    }

    #[test]
    fn test_find_audio_src_literal() {
        let html = r#"<p>text</p><audio controls src="/audio/a.mp3"></audio>"#;
        assert_eq!(find_audio_src(html).as_deref(), Some("/audio/a.mp3"));
    }

    #[test]
    fn test_find_audio_src_escaped() {
        let html = "&lt;AUDIO src=&quot;https://x.example/A.MP3&quot;&gt;";
        assert_eq!(find_audio_src(html).as_deref(), Some("https://x.example/A.MP3"));
    }

    #[test]
    fn test_find_audio_src_unquoted() {
        let html = "<audio src=/audio/b.mp3>";
        assert_eq!(find_audio_src(html).as_deref(), Some("/audio/b.mp3"));
    }

    #[test]
    fn test_find_audio_src_first_match_wins() {
        let html = r#"<audio src="/first.mp3"></audio><audio src="/second.mp3"></audio>"#;
        assert_eq!(find_audio_src(html).as_deref(), Some("/first.mp3"));
    }

    #[test]
    fn test_find_audio_src_requires_mp3_suffix() {
        assert!(find_audio_src(r#"<audio src="/a.ogg"></audio>"#).is_none());
        assert!(find_audio_src(r#"<audio src="/a.mp3x"></audio>"#).is_none());
        assert!(find_audio_src(r#"<img src="/a.mp3">"#).is_none());
    }
}
