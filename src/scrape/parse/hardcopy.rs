use core::time::Duration;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

use crate::{
    error::{Error, Result, View},
    util::text_of,
};

static SEL_FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form#hardcopy-form").unwrap());
static SEL_HIDDEN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[type="hidden"][name]"#).unwrap());
static SEL_ERROR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#hardcopy-errors, .hardcopy-error, div.alert-danger, div.ResultsWithError").unwrap()
});
static SEL_DOWNLOAD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href*="tempFilename"], a[href$=".pdf"], a[data-hardcopy-download]"#).unwrap()
});
static SEL_PENDING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[data-hardcopy-status="pending"]"#).unwrap());
static SEL_META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta[http-equiv][content]").unwrap());

static REFRESH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:[;,]\s*url\s*=\s*['"]?([^'"]+)['"]?)?"#).unwrap());

/// Fields that would turn a POST into an answer submission or preview.
pub fn is_submission_field(name: &str) -> bool {
    matches!(name, "submitAnswers" | "previewAnswers" | "checkAnswers")
        || name.starts_with("AnSwEr")
        || name.starts_with("MuLtIaNsWeR_")
        || name.starts_with("previous_")
}

#[derive(Debug)]
pub struct HardcopyForm {
    pub action: Url,
    pub fields: Vec<(String, String)>,
}

/// Reads `#hardcopy-form`: where it posts to and its hidden fields, minus
/// `.cgifields` and anything answer related.
pub fn parse_hardcopy_form(html: &str, page_url: &Url) -> Result<HardcopyForm> {
    let doc = Html::parse_document(html);
    let form = doc
        .select(&SEL_FORM)
        .next()
        .ok_or(Error::parse(View::HardcopyForm, "#hardcopy-form"))?;

    let action = match form.attr("action").filter(|a| !a.trim().is_empty()) {
        Some(action) => page_url
            .join(action.trim())
            .map_err(|_| Error::parse(View::HardcopyForm, "form action"))?,
        None => page_url.clone(),
    };

    let fields = form
        .select(&SEL_HIDDEN)
        .filter_map(|input| {
            let name = input.attr("name")?;
            if name.is_empty() || name == ".cgifields" {
                return None;
            }
            if is_submission_field(name) {
                tracing::warn!(target: "parse", "dropping answer field {name:?} from hardcopy form");
                return None;
            }
            Some((name.to_owned(), input.attr("value").unwrap_or_default().to_owned()))
        })
        .collect();

    Ok(HardcopyForm { action, fields })
}

/// Where a hardcopy job stands according to an HTML response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending { poll: Url, retry_after: Option<Duration> },
    Ready { download: Url },
    Failed { reason: String },
}

pub fn classify_hardcopy(html: &str, page_url: &Url) -> Result<JobStatus> {
    let doc = Html::parse_document(html);

    if let Some(error) = doc.select(&SEL_ERROR).next() {
        let reason = text_of(error);
        return Ok(JobStatus::Failed {
            reason: if reason.is_empty() { "no reason given".to_owned() } else { reason },
        });
    }

    if let Some(download) = doc
        .select(&SEL_DOWNLOAD)
        .find_map(|a| page_url.join(a.attr("href")?).ok())
    {
        return Ok(JobStatus::Ready { download });
    }

    if let Some(pending) = doc.select(&SEL_PENDING).next() {
        let poll = pending
            .attr("data-poll-url")
            .and_then(|u| page_url.join(u).ok())
            .unwrap_or_else(|| page_url.clone());
        return Ok(JobStatus::Pending { poll, retry_after: None });
    }

    let refresh = doc
        .select(&SEL_META)
        .filter(|m| m.attr("http-equiv").is_some_and(|v| v.eq_ignore_ascii_case("refresh")))
        .find_map(|m| REFRESH.captures(m.attr("content")?));
    if let Some(c) = refresh {
        let retry_after = c[1].parse::<f64>().ok().and_then(|s| Duration::try_from_secs_f64(s).ok());
        let poll = c
            .get(2)
            .and_then(|u| page_url.join(u.as_str().trim()).ok())
            .unwrap_or_else(|| page_url.clone());
        return Ok(JobStatus::Pending { poll, retry_after });
    }

    Err(Error::parse(View::HardcopyStatus, "job status"))
}
