//! City names, file keys and URLs.
//!
//! Everything here is a pure, total function: characters that cannot be
//! represented are dropped rather than rejected.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// File key used when a city name has no ASCII-representable characters
pub const SLUG_SENTINEL: &str = "cidade";

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Decompose to NFKD and keep only the ASCII part.
///
/// `"Jacareí"` becomes `"Jacarei"`; scripts without an ASCII decomposition
/// vanish entirely.
pub fn ascii_fold(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

/// Trimmed city, or `default_city` when the input is blank
pub fn normalize_city(raw: &str, default_city: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        default_city.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Filesystem-safe key for a city: lowercase ASCII letters, digits and `-`
pub fn slug(city: &str) -> String {
    let folded = ascii_fold(city).to_lowercase();
    let dashed = NON_ALNUM.replace_all(&folded, "-");
    let trimmed = dashed.trim_matches('-');

    if trimmed.is_empty() {
        SLUG_SENTINEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Fill the `{city}` placeholder of `template` with the percent-encoded city
pub fn build_search_url(template: &str, city: &str) -> String {
    template.replace("{city}", &urlencoding::encode(city))
}

/// Resolve `href` against `origin` (scheme and host, trailing slash optional)
pub fn absolutize(href: &str, origin: &str) -> String {
    let href = href.trim();
    let origin = origin.trim_end_matches('/');

    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        format!("{}/{}", origin, href)
    }
}

/// Absolute URL for `href` without query string or fragment
pub fn canonicalize_url(href: &str, origin: &str) -> String {
    strip_query(&absolutize(href, origin)).to_string()
}

/// `url` up to (not including) the first `?` or `#`
pub fn strip_query(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(pos) => &url[..pos],
        None => url,
    }
}
