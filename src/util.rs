use std::time::SystemTime;

use reqwest::header::{DATE, HeaderMap};
use scraper::ElementRef;

/// Visible text of an element with runs of whitespace squashed to one space.
pub fn text_of(element: ElementRef) -> String {
    squash(element.text())
}

pub fn squash<'a>(pieces: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for word in pieces.into_iter().flat_map(str::split_whitespace) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Course URLs spell a set name with underscores for spaces.
pub fn set_slug(set_name: &str) -> String {
    set_name.trim().replace(' ', "_")
}

/// The server clock from a `Date` header, or the local clock if it is missing
/// or malformed.
pub fn server_date(headers: &HeaderMap) -> SystemTime {
    let date = headers
        .get(DATE)
        .and_then(|s| s.to_str().ok())
        .and_then(|s| httpdate::parse_http_date(s).ok());
    if date.is_none() {
        tracing::debug!(target: "fetch", "no/wrong date header, using local clock");
    }
    date.unwrap_or_else(SystemTime::now)
}
