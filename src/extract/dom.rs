//! Helpers for reading rendered markup.

use url::Url;

/// Parse a rendered count like `"1,234 followers"` by dropping every non-digit.
///
/// Abbreviated counts (`"1.2K"`) lose their scale; the exact figure is only
/// available through interception.
pub fn parse_count(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Path of an href, accepting both `/profile/x` and absolute URLs.
fn href_path(href: &str) -> Option<String> {
    if href.starts_with('/') {
        return Some(href.split(['?', '#']).next().unwrap_or(href).to_string());
    }
    Url::parse(href).ok().map(|url| url.path().to_string())
}

/// Actor (DID or handle) a profile link points at.
///
/// Only `/profile/<actor>` itself counts; deeper links such as
/// `/profile/<actor>/post/<rkey>` or `/profile/<actor>/followers` are not profile links.
pub fn profile_actor_from_href(href: &str) -> Option<String> {
    let path = href_path(href)?;
    let mut segments = path.trim_end_matches('/').split('/').skip(1);
    match (segments.next(), segments.next(), segments.next()) {
        (Some("profile"), Some(actor), None) if !actor.is_empty() => Some(actor.to_string()),
        _ => None,
    }
}

/// Canonical `at://` URI for a rendered post permalink.
pub fn post_uri_from_href(href: &str) -> Option<String> {
    let path = href_path(href)?;
    let segments: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();
    match segments.as_slice() {
        ["profile", actor, "post", rkey] if !actor.is_empty() && !rkey.is_empty() => {
            Some(format!("at://{}/app.bsky.feed.post/{}", actor, rkey))
        }
        _ => None,
    }
}

/// Strip the leading `@` and surrounding whitespace the UI puts around handles.
pub fn clean_handle(text: &str) -> String {
    text.trim().trim_start_matches('@').trim().to_string()
}
