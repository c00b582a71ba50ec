use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validates a URL string for use as a feed source or site base.
///
/// Rejects anything that is not an absolute `http`/`https` URL with a host.
///
/// # Examples
///
/// ```
/// use nhk_podcast_feed::util::validate_url;
///
/// let url = validate_url("https://nhkeasier.com/feed/").unwrap();
/// assert_eq!(url.host_str(), Some("nhkeasier.com"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// assert!(validate_url("/feed/").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost(url_str.to_owned()));
    }

    Ok(url)
}

/// Returns the base URL as a prefix for site-root-relative paths.
///
/// `Url` always serializes an empty path as `/`, so the trailing slash is
/// dropped to keep `prefix + "/path"` free of a double slash.
pub fn site_prefix(base: &Url) -> &str {
    base.as_str().trim_end_matches('/')
}

/// Returns true for a site-root-relative reference: a single leading `/`
/// not followed by a second one.
pub fn is_site_relative(reference: &str) -> bool {
    reference.starts_with('/') && !reference.starts_with("//")
}

/// Resolves a reference found in feed content to an absolute URL.
///
/// - `/path` is prefixed with the site base
/// - `//host/path` takes the scheme of the site base
/// - `http(s)://…` is returned verbatim
/// - anything else is joined against the site base
///
/// Returns `None` only when the reference cannot be turned into a URL at all.
pub fn resolve_reference(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if is_site_relative(reference) {
        return Some(format!("{}{}", site_prefix(base), reference));
    }

    if reference.starts_with("//") {
        return Some(format!("{}:{}", base.scheme(), reference));
    }

    if let Ok(absolute) = Url::parse(reference) {
        if matches!(absolute.scheme(), "http" | "https") {
            return Some(reference.to_owned());
        }
    }

    base.join(reference).ok().map(String::from)
}
