use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{Error, Result, View},
    model::GradeRecord,
    util::text_of,
};

static SEL_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.grade_table, table#grades_table").unwrap());
static SEL_ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

/// Column positions of earned and possible points. Taken from the header
/// when it names them, otherwise the classic `set | score | out of` layout.
fn columns(table: ElementRef) -> (usize, usize) {
    let header = table.select(&SEL_ROW).find_map(|row| {
        let heads: Vec<String> = row
            .child_elements()
            .filter(|c| c.value().name() == "th")
            .map(|c| text_of(c).to_ascii_lowercase())
            .collect();
        (!heads.is_empty()).then_some(heads)
    });

    header
        .and_then(|heads| {
            let score = heads.iter().position(|h| h == "score")?;
            let out_of = heads.iter().position(|h| h.starts_with("out of"))?;
            Some((score, out_of))
        })
        .unwrap_or((1, 2))
}

fn points(cell: Option<&ElementRef>, field: &'static str) -> Result<f64> {
    cell.map(|c| text_of(*c))
        .and_then(|t| t.parse().ok())
        .ok_or(Error::parse(View::Grades, field))
}

/// Parses the grades table. Percentages are recomputed from the points
/// rather than read from the page.
pub fn parse_grades(html: &str) -> Result<Vec<GradeRecord>> {
    let doc = Html::parse_document(html);
    let table = doc
        .select(&SEL_TABLE)
        .next()
        .ok_or(Error::parse(View::Grades, "table.grade_table"))?;
    let (score_col, out_of_col) = columns(table);

    let mut grades = Vec::new();
    for row in table.select(&SEL_ROW) {
        let cells: Vec<ElementRef> = row
            .child_elements()
            .filter(|c| c.value().name() == "td")
            .collect();
        if cells.is_empty() {
            continue;
        }

        let set_name = text_of(cells[0]);
        if set_name.is_empty() {
            return Err(Error::parse(View::Grades, "set name"));
        }
        let earned = points(cells.get(score_col), "points earned")?;
        let possible = points(cells.get(out_of_col), "points possible")?;
        grades.push(GradeRecord::new(set_name, earned, possible));
    }

    Ok(grades)
}
