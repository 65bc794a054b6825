use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::{
    error::{Error, Result, View},
    model::{AnswerField, Attempts, MathSegment, Problem},
    util::text_of,
};

static SEL_BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#problem_body").unwrap());
static SEL_SCORE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#score_summary").unwrap());
static SEL_FIELDS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input, select").unwrap());
static SEL_OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

static BODY_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\sid\s*=\s*["']?problem_body(?:["'\s/][^>]*)?>"#).unwrap()
});
static ATTEMPTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"attempted this problem\s+(\d+)\s+times?").unwrap());
static REMAINING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)You have\s+(unlimited|\d+)\s+attempts?\s+remaining").unwrap());
static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*){2,}").unwrap());

const BLOCK_TAGS: [&str; 7] = ["div", "p", "table", "tr", "ul", "ol", "li"];
const BOOKKEEPING_INPUTS: [&str; 3] = ["previous_", "MaThQuIlL_", "MuLtIaNsWeR_"];
const ANSWER_PREFIXES: [&str; 2] = ["AnSwEr", "MuLtIaNsWeR_AnSwEr"];

/// Inner markup of the element with `id="problem_body"`, cut out of the
/// source text so that nothing is re-serialized.
fn body_markup(html: &str) -> Option<&str> {
    let open = BODY_OPEN.captures(html)?;
    let tag = open.get(1)?.as_str();
    let start = open.get(0)?.end();
    if open.get(0)?.as_str().ends_with("/>") {
        return Some("");
    }

    let pattern = format!(r"(?i)<(/?){}\b[^>]*>", regex::escape(tag));
    let nested = Regex::new(&pattern).ok()?;
    let mut depth = 1usize;
    for m in nested.captures_iter(&html[start..]) {
        let whole = m.get(0)?;
        if m.get(1).is_some_and(|c| !c.as_str().is_empty()) {
            depth -= 1;
            if depth == 0 {
                return Some(&html[start..start + whole.start()]);
            }
        } else if !whole.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    None
}

fn math_mode(element: ElementRef) -> Option<bool> {
    if element.value().name() != "script" {
        return None;
    }
    let ty = element.attr("type")?;
    ty.starts_with("math/tex").then(|| ty.contains("mode=display"))
}

/// Plain-text rendition: TeX scripts become `$…$`/`$$…$$`, visible answer
/// blanks and drop-downs become `[label]`, hidden and bookkeeping inputs
/// vanish.
fn render(element: ElementRef, out: &mut String, math: &mut Vec<MathSegment>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else { continue };
                let name = child.value().name();

                if let Some(display) = math_mode(child) {
                    let tex: String = child.text().collect();
                    let fence = if display { "$$" } else { "$" };
                    out.push_str(fence);
                    out.push_str(&tex);
                    out.push_str(fence);
                    math.push(MathSegment { display, tex });
                } else if name == "script" || name == "style" {
                    // no problem text in these
                } else if name == "br" {
                    out.push('\n');
                } else if name == "input" {
                    let field = child.attr("name").unwrap_or_default();
                    if child.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
                        || BOOKKEEPING_INPUTS.iter().any(|p| field.starts_with(p))
                    {
                        continue;
                    }
                    let label = child
                        .attr("aria-label")
                        .or_else(|| (!field.is_empty()).then_some(field))
                        .unwrap_or("___");
                    out.push('[');
                    out.push_str(label);
                    out.push(']');
                } else if name == "select" {
                    out.push('[');
                    out.push_str(child.attr("aria-label").or_else(|| child.attr("name")).unwrap_or("___"));
                    out.push(']');
                } else if BLOCK_TAGS.contains(&name) {
                    out.push('\n');
                    render(child, out, math);
                    out.push('\n');
                } else {
                    render(child, out, math);
                }
            }
            _ => (),
        }
    }
}

/// Visible answer blanks and drop-downs, in page order. Nothing here is
/// ever posted back.
fn answer_fields(body: ElementRef) -> Vec<AnswerField> {
    body.select(&SEL_FIELDS)
        .filter_map(|field| {
            let name = field.attr("name")?;
            if !ANSWER_PREFIXES.iter().any(|p| name.starts_with(p)) {
                return None;
            }
            let label = field.attr("aria-label").unwrap_or_default().to_owned();
            if field.value().name() == "select" {
                return Some(AnswerField {
                    name: name.to_owned(),
                    kind: "select".to_owned(),
                    label,
                    value: String::new(),
                    options: field.select(&SEL_OPTION).map(text_of).collect(),
                });
            }
            let kind = field.attr("type").unwrap_or("text");
            (!kind.eq_ignore_ascii_case("hidden")).then(|| AnswerField {
                name: name.to_owned(),
                kind: kind.to_ascii_lowercase(),
                label,
                value: field.attr("value").unwrap_or_default().to_owned(),
                options: Vec::new(),
            })
        })
        .collect()
}

/// Parses a problem page. `markup` and every `math` segment are copied from
/// the source without re-encoding.
pub fn parse_problem(html: &str, set_name: &str, number: u32, url: &str) -> Result<Problem> {
    const V: View = View::Problem;

    let markup = body_markup(html).ok_or(Error::parse(V, "#problem_body"))?;
    let doc = Html::parse_document(html);
    let body = doc.select(&SEL_BODY).next().ok_or(Error::parse(V, "#problem_body"))?;

    let mut text = String::new();
    let mut math = Vec::new();
    render(body, &mut text, &mut math);
    let answers = answer_fields(body);
    let text = BLANK_LINES.replace_all(text.trim(), "\n\n").into_owned();

    let attempts = ATTEMPTED
        .captures(html)
        .and_then(|c| c[1].parse().ok())
        .ok_or(Error::parse(V, "attempt count"))?;
    let remaining = REMAINING.captures(html).and_then(|c| match &c[1] {
        r if r.eq_ignore_ascii_case("unlimited") => Some(Attempts::Unlimited),
        r => r.parse().ok().map(Attempts::Remaining),
    });
    let score = doc
        .select(&SEL_SCORE)
        .next()
        .and_then(|s| PERCENT.captures(&text_of(s)).and_then(|c| c[1].parse::<f64>().ok()))
        .map(|p| p / 100.0);

    Ok(Problem {
        set_name: set_name.to_owned(),
        number,
        url: url.to_owned(),
        markup: markup.to_owned(),
        text,
        math,
        answers,
        attempts,
        remaining,
        score,
    })
}
