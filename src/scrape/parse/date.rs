use std::sync::LazyLock;

use chrono::{FixedOffset, NaiveDate, TimeZone};
use regex::Regex;

use crate::model::DueDate;

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?xi)
        (?P<mon>\d{1,2}) / (?P<day>\d{1,2}) / (?P<year>\d{4})
        \s+ (?:at\s+)?
        (?P<hour>\d{1,2}) : (?P<min>\d{2})
        (?: \s* (?P<ampm>[ap]\.?m\.?) )?
        (?: \s+ (?P<tz>[A-Za-z]{1,5} | [+-]\d{2}:?\d{2}) \b )?",
    )
    .unwrap()
});

/// Offset in minutes east of UTC for the zone names the server prints.
fn named_offset(tz: &str) -> Option<i32> {
    Some(match tz.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "Z" => 0,
        "NST" => -210,
        "NDT" => -150,
        "ADT" => -180,
        "AST" | "EDT" => -240,
        "EST" | "CDT" => -300,
        "CST" | "MDT" => -360,
        "MST" | "PDT" => -420,
        "PST" | "AKDT" => -480,
        "AKST" => -540,
        "HST" => -600,
        _ => return None,
    })
}

fn numeric_offset(tz: &str) -> Option<i32> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let digits = digits.replace(':', "");
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

/// Keeps `display` as printed. The timestamp is set only when the text
/// contains a full date, a time and an explicit zone; nothing is guessed.
pub fn parse_date(display: &str) -> DueDate {
    let display = display.trim().trim_end_matches('.').trim_end();
    DueDate {
        display: display.to_owned(),
        timestamp: DATE.captures(display).and_then(|c| {
            let num = |name| c.name(name)?.as_str().parse::<u32>().ok();

            let mut hour = num("hour")?;
            if let Some(ampm) = c.name("ampm") {
                if !(1..=12).contains(&hour) {
                    return None;
                }
                let pm = ampm.as_str().starts_with(['p', 'P']);
                hour = match (hour, pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                };
            }

            let tz = c.name("tz")?.as_str();
            let minutes = numeric_offset(tz).or_else(|| named_offset(tz))?;
            let offset = FixedOffset::east_opt(minutes * 60)?;

            let naive = NaiveDate::from_ymd_opt(num("year")? as i32, num("mon")?, num("day")?)?
                .and_hms_opt(hour, num("min")?, 0)?;
            offset.from_local_datetime(&naive).single()
        }),
    }
}
