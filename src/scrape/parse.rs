//! Pure page parsers: markup in, records or a [`crate::Error::Parse`] out.
//!
//! Each parser accepts cosmetic variation (whitespace, attribute order,
//! extra columns) but fails on a missing table, link or field instead of
//! returning a defaulted record.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

pub mod date;
pub mod grades;
pub mod hardcopy;
pub mod problem;
pub mod sets;

pub use date::parse_date;
pub use grades::parse_grades;
pub use hardcopy::{HardcopyForm, JobStatus, classify_hardcopy, parse_hardcopy_form};
pub use problem::parse_problem;
pub use sets::{parse_set_detail, parse_set_list};

static PASSWD_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<input\b[^>]*\bname\s*=\s*["']?passwd\b"#).unwrap());

static SEL_LOGIN_STATUS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#loginstatus").unwrap());

/// Whether the page is the "please log in" form rather than a course view.
pub fn is_login_page(html: &str) -> bool {
    PASSWD_INPUT.is_match(html)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    Rejected,
    Unrecognized,
}

pub fn login_outcome(html: &str) -> LoginOutcome {
    let doc = Html::parse_document(html);
    let logged_in = doc
        .select(&SEL_LOGIN_STATUS)
        .next()
        .is_some_and(|status| crate::util::text_of(status).contains("Logged in as"));

    if logged_in {
        LoginOutcome::LoggedIn
    } else if is_login_page(html) {
        LoginOutcome::Rejected
    } else {
        LoginOutcome::Unrecognized
    }
}
