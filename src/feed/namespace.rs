use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::document::Element;

/// Apple podcast namespace; clients read `author`, `duration` etc. from it.
pub const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// Preferred prefix for [`ITUNES_NS`].
pub const ITUNES_PREFIX: &str = "itunes";

/// The first start tag of the document; `<?` and `<!` constructs come before it.
static ROOT_START_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z_][^>]*>").unwrap());

/// A run of consecutive namespace declarations inside a start tag.
static DECLARATION_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\s+xmlns(?::[A-Za-z_][\w.\-]*)?\s*=\s*(?:"[^"]*"|'[^']*'))+"#).unwrap()
});

/// One declaration within a run; group 1 is the prefix (absent for the default namespace).
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+xmlns(?::([A-Za-z_][\w.\-]*))?\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap()
});

/// Collapses repeated namespace declarations before the document is parsed.
///
/// The upstream feed has been seen declaring `xmlns:itunes` several times on
/// the root element, which is a duplicate-attribute error for any XML parser.
/// Only the root start tag is rewritten: within each run of consecutive
/// declarations the first one per prefix is kept. Content further down,
/// CDATA and escaped markup included, is never touched. Returns
/// `Cow::Borrowed` when there is nothing to collapse.
pub fn dedupe_namespace_declarations(source: &str) -> Cow<'_, str> {
    let Some(tag) = ROOT_START_TAG.find(source) else {
        return Cow::Borrowed(source);
    };
    let has_duplicates = DECLARATION_RUN
        .find_iter(tag.as_str())
        .any(|run| collapse_run(run.as_str()).is_some());
    if !has_duplicates {
        return Cow::Borrowed(source);
    }

    tracing::debug!("Collapsing repeated namespace declarations on the root element");
    let collapsed = DECLARATION_RUN.replace_all(tag.as_str(), |run: &Captures<'_>| {
        collapse_run(&run[0]).unwrap_or_else(|| run[0].to_owned())
    });

    let mut out = String::with_capacity(source.len());
    out.push_str(&source[..tag.start()]);
    out.push_str(&collapsed);
    out.push_str(&source[tag.end()..]);
    Cow::Owned(out)
}

/// Returns the run without repeated prefixes, or `None` if it had none.
fn collapse_run(run: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let mut kept = String::with_capacity(run.len());
    let mut dropped = 0usize;

    for decl in DECLARATION.captures_iter(run) {
        let prefix = decl.get(1).map_or("", |m| m.as_str());
        if seen.insert(prefix) {
            kept.push_str(&decl[0]);
        } else {
            dropped += 1;
        }
    }

    (dropped > 0).then_some(kept)
}

/// Returns the prefix bound to `uri` on `root`, declaring one if needed.
///
/// An existing binding is reused whatever its prefix, so feeds that already
/// carry the namespace under another name stay consistent. Otherwise
/// `preferred` is declared, suffixed with a number if it is taken by a
/// different namespace.
pub fn ensure_namespace(root: &mut Element, preferred: &str, uri: &str) -> String {
    let existing = root.attributes.iter().find_map(|(key, value)| {
        key.strip_prefix("xmlns:")
            .filter(|_| value == uri)
            .map(str::to_owned)
    });
    if let Some(prefix) = existing {
        return prefix;
    }

    let mut prefix = preferred.to_owned();
    let mut n = 1;
    while root.attribute(&format!("xmlns:{prefix}")).is_some() {
        prefix = format!("{preferred}{n}");
        n += 1;
    }

    tracing::debug!(prefix = %prefix, uri = %uri, "Declaring namespace on root element");
    root.set_attribute(format!("xmlns:{prefix}"), uri);
    prefix
}

/// Builds `prefix:local`.
pub fn qualified(prefix: &str, local: &str) -> String {
    format!("{prefix}:{local}")
}
