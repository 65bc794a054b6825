use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use super::date::parse_date;
use crate::{
    error::{Error, Result, View},
    model::{Attempts, DueDate, HomeworkSet, ProblemSummary, SetStatus},
    util::text_of,
};

static SEL_SET_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.problem_set_table").unwrap());
static SEL_PROBLEM_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.problem_set_table, table.problem_table").unwrap());
static SEL_ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static SEL_A: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

static NO_SETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bno\s+(?:homework\s+|problem\s+)?sets\b").unwrap());
static DUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:closes|closed|due)\s+(?:on\s+)?(?P<rest>.+)").unwrap());
static OPENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:will\s+open|opens)\s+(?:on\s+)?(?P<rest>.+)").unwrap());
static DATE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d{1,2}/\d{1,2}/\d{4}\s+(?:at\s+)?\d{1,2}:\d{2}(?:\s*[ap]\.?m\.?)?(?:\s+(?:[A-Za-z]{1,5}|[+-]\d{2}:?\d{2})\b)?").unwrap()
});
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());

/// `<td>` children of a row; header rows made of `<th>` come back empty.
fn cells(row: ElementRef) -> Vec<ElementRef> {
    row.child_elements()
        .filter(|c| c.value().name() == "td")
        .collect()
}

fn classify(status_text: &str) -> SetStatus {
    let lower = status_text.to_ascii_lowercase();
    if lower.starts_with("open") {
        SetStatus::Open
    } else if lower.contains("will open") || lower.starts_with("opens") {
        SetStatus::NotYetOpen
    } else if lower.starts_with("closed") || lower.contains("answers available") {
        SetStatus::Closed
    } else {
        SetStatus::Other
    }
}

/// The date following a keyword: the leading date-shaped span when there is
/// one, otherwise everything up to the end of the clause.
fn date_after(re: &Regex, status_text: &str) -> Option<DueDate> {
    let rest = re.captures(status_text)?.name("rest")?.as_str();
    let span = DATE_SPAN.find(rest).map_or_else(
        || rest.split(['.', ';']).next().unwrap_or(rest),
        |m| m.as_str(),
    );
    let span = span.trim();
    (!span.is_empty()).then(|| parse_date(span))
}

fn parse_score(status: &str) -> Option<f64> {
    PERCENT
        .captures(status)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|p| p / 100.0)
}

/// Parses the course root page into its sets, in page order.
pub fn parse_set_list(html: &str, page_url: &Url, class_name: &str) -> Result<Vec<HomeworkSet>> {
    let doc = Html::parse_document(html);
    let Some(table) = doc.select(&SEL_SET_TABLE).next() else {
        if NO_SETS.is_match(&text_of(doc.root_element())) {
            return Ok(Vec::new());
        }
        return Err(Error::parse(View::SetList, "table.problem_set_table"));
    };

    let mut sets = Vec::new();
    for row in table.select(&SEL_ROW) {
        let cells = cells(row);
        if cells.is_empty() {
            continue;
        }

        let (idx, link) = cells
            .iter()
            .enumerate()
            .find_map(|(i, cell)| cell.select(&SEL_A).next().map(|a| (i, a)))
            .ok_or(Error::parse(View::SetList, "set link"))?;
        let name = text_of(link);
        if name.is_empty() {
            return Err(Error::parse(View::SetList, "set name"));
        }
        let url = link
            .attr("href")
            .and_then(|href| page_url.join(href).ok())
            .ok_or(Error::parse(View::SetList, "set link href"))?;

        let status_text = cells
            .get(idx + 1)
            .map(|c| text_of(*c))
            .ok_or(Error::parse(View::SetList, "set status"))?;

        sets.push(HomeworkSet {
            class_name: class_name.into(),
            name,
            url: url.into(),
            status: classify(&status_text),
            opens: date_after(&OPENS, &status_text),
            due: date_after(&DUE, &status_text),
            status_text,
            problems: Vec::new(),
        });
    }

    tracing::debug!(target: "parse", "{class_name}: {} sets", sets.len());
    Ok(sets)
}

/// Parses a set page's problem table.
pub fn parse_set_detail(html: &str, page_url: &Url) -> Result<Vec<ProblemSummary>> {
    const V: View = View::SetDetail;

    let doc = Html::parse_document(html);
    let table = doc
        .select(&SEL_PROBLEM_TABLE)
        .next()
        .ok_or(Error::parse(V, "problem table"))?;

    let mut problems = Vec::new();
    for row in table.select(&SEL_ROW) {
        let cells = cells(row);
        if cells.is_empty() {
            continue;
        }
        let [name_cell, attempts, remaining, worth, status, ..] = cells[..] else {
            return Err(Error::parse(V, "problem columns"));
        };

        let name = text_of(name_cell);
        let number = NUMBER
            .find(&name)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or(Error::parse(V, "problem number"))?;
        let url = name_cell
            .select(&SEL_A)
            .next()
            .and_then(|a| a.attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .map(String::from);

        let attempts = text_of(attempts)
            .parse()
            .map_err(|_| Error::parse(V, "attempts"))?;
        let remaining = match text_of(remaining) {
            r if r.eq_ignore_ascii_case("unlimited") => Attempts::Unlimited,
            r => Attempts::Remaining(r.parse().map_err(|_| Error::parse(V, "remaining attempts"))?),
        };
        let worth = text_of(worth)
            .parse()
            .map_err(|_| Error::parse(V, "worth"))?;
        let status = text_of(status);

        problems.push(ProblemSummary {
            number,
            name,
            url,
            attempts,
            remaining,
            worth,
            score: parse_score(&status),
            status,
        });
    }

    Ok(problems)
}
