//! Records parsed out of the course pages. None of these are cached; each
//! one describes the server state at the moment its page was fetched.

use core::cmp::Ordering;
use std::time::SystemTime;

use chrono::{DateTime, FixedOffset, Utc};
use compact_str::CompactString;
use serde::Serialize;

/// A date as the page printed it, plus the instant it denotes when the
/// printed form names its offset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DueDate {
    pub display: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    Open,
    NotYetOpen,
    Closed,
    Other,
}

#[derive(Clone, Debug, Serialize)]
pub struct HomeworkSet {
    pub class_name: CompactString,
    pub name: String,
    pub url: String,
    pub status: SetStatus,
    pub status_text: String,
    pub opens: Option<DueDate>,
    pub due: Option<DueDate>,
    /// Filled only by the set-detail view.
    pub problems: Vec<ProblemSummary>,
}

impl HomeworkSet {
    fn due_at(&self) -> Option<DateTime<FixedOffset>> {
        self.due.as_ref().and_then(|d| d.timestamp)
    }

    /// Whether `now` lies inside the set's `[open, due]` window. A bound the
    /// page did not print falls back to the status the page reported; a set
    /// reported closed is never open.
    pub fn is_open_at(&self, now: SystemTime) -> bool {
        if self.status == SetStatus::Closed {
            return false;
        }
        let now = DateTime::<Utc>::from(now);
        let after_open = match self.opens.as_ref().and_then(|d| d.timestamp) {
            Some(opens) => opens <= now,
            None => self.status != SetStatus::NotYetOpen,
        };
        let before_due = match self.due_at() {
            Some(due) => now <= due,
            None => self.status == SetStatus::Open,
        };
        after_open && before_due
    }

    /// Ascending due date, undated sets last, name as tiebreak.
    pub fn cmp_by_due(&self, other: &Self) -> Ordering {
        match (self.due_at(), other.due_at()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.name.cmp(&other.name))
    }

    pub fn total_points(&self) -> f64 {
        self.problems.iter().map(|p| p.worth).sum()
    }

    pub fn earned_points(&self) -> f64 {
        self.problems.iter().map(ProblemSummary::earned).sum()
    }
}

/// The sets of one class along with the server's clock at fetch time.
#[derive(Clone, Debug, Serialize)]
pub struct SetListing {
    pub sets: Vec<HomeworkSet>,
    #[serde(with = "httpdate_serde")]
    pub fetched_at: SystemTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attempts {
    Unlimited,
    Remaining(u32),
}

/// One row of a set's problem table.
#[derive(Clone, Debug, Serialize)]
pub struct ProblemSummary {
    pub number: u32,
    pub name: String,
    /// Absent when the row is not linked, e.g. before the set opens.
    pub url: Option<String>,
    pub attempts: u32,
    pub remaining: Attempts,
    pub worth: f64,
    pub status: String,
    /// Fraction in `[0, 1]` read from `status`, when it is a percentage.
    pub score: Option<f64>,
}

impl ProblemSummary {
    pub fn is_completed(&self) -> bool {
        self.score.is_some_and(|s| s >= 1.0)
    }

    pub fn earned(&self) -> f64 {
        self.worth * self.score.unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MathSegment {
    pub display: bool,
    pub tex: String,
}

/// An answer blank as the page shows it. Read-only metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnswerField {
    pub name: String,
    /// `text`, `radio`, `checkbox`, `select`, ...
    pub kind: String,
    pub label: String,
    pub value: String,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Problem {
    pub set_name: String,
    pub number: u32,
    pub url: String,
    /// Inner markup of `#problem_body`, sliced from the page unchanged.
    pub markup: String,
    pub text: String,
    pub math: Vec<MathSegment>,
    pub answers: Vec<AnswerField>,
    pub attempts: u32,
    pub remaining: Option<Attempts>,
    pub score: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GradeRecord {
    pub set_name: String,
    pub earned: f64,
    pub possible: f64,
    pub percentage: Option<f64>,
}

impl GradeRecord {
    pub fn new(set_name: String, earned: f64, possible: f64) -> Self {
        let percentage = (possible > 0.0).then(|| round2(earned / possible * 100.0));
        Self {
            set_name,
            earned,
            possible,
            percentage,
        }
    }
}

#[inline]
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

mod httpdate_serde {
    use std::time::SystemTime;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&httpdate::fmt_http_date(*time))
    }
}
