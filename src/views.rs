//! Aggregations over already-fetched records. Nothing here touches the
//! network; the same input always gives the same output.

use std::time::SystemTime;

use compact_str::CompactString;
use serde::Serialize;

use crate::{
    account::ClassSummary,
    model::{DueDate, HomeworkSet, SetStatus, round2},
};

#[derive(Clone, Debug, Serialize)]
pub struct DueDateEntry {
    pub name: String,
    pub due: Option<DueDate>,
    pub status: SetStatus,
    pub status_text: String,
}

impl From<&HomeworkSet> for DueDateEntry {
    fn from(set: &HomeworkSet) -> Self {
        Self {
            name: set.name.clone(),
            due: set.due.clone(),
            status: set.status,
            status_text: set.status_text.clone(),
        }
    }
}

/// Sets whose `[open, due]` window contains `now`, earliest due first.
pub fn open_sets(sets: &[HomeworkSet], now: SystemTime) -> Vec<HomeworkSet> {
    let mut open: Vec<HomeworkSet> = sets.iter().filter(|s| s.is_open_at(now)).cloned().collect();
    open.sort_by(HomeworkSet::cmp_by_due);
    open
}

pub fn due_dates(sets: &[HomeworkSet]) -> Vec<DueDateEntry> {
    let mut sorted: Vec<&HomeworkSet> = sets.iter().collect();
    sorted.sort_by(|a, b| a.cmp_by_due(b));
    sorted.into_iter().map(DueDateEntry::from).collect()
}

pub fn upcoming_deadlines(sets: &[HomeworkSet], now: SystemTime) -> Vec<DueDateEntry> {
    due_dates(&open_sets(sets, now))
}

#[derive(Clone, Debug, Serialize)]
pub struct SetProgress {
    pub set_name: String,
    pub status: SetStatus,
    pub due: Option<DueDate>,
    pub total_problems: usize,
    pub completed_count: usize,
    pub total_points: f64,
    pub earned_points: f64,
    /// `None` when the set is worth nothing.
    pub percent: Option<f64>,
    pub completed_problems: Vec<u32>,
    pub remaining_problems: Vec<u32>,
}

/// Progress through a set whose `problems` have been filled in.
pub fn set_progress(set: &HomeworkSet) -> SetProgress {
    let (completed, remaining): (Vec<_>, Vec<_>) = set.problems.iter().partition(|p| p.is_completed());
    let total_points = set.total_points();
    let earned_points = set.earned_points();

    SetProgress {
        set_name: set.name.clone(),
        status: set.status,
        due: set.due.clone(),
        total_problems: set.problems.len(),
        completed_count: completed.len(),
        total_points,
        earned_points: round2(earned_points),
        percent: (total_points > 0.0).then(|| round2(earned_points / total_points * 100.0)),
        completed_problems: completed.iter().map(|p| p.number).collect(),
        remaining_problems: remaining.iter().map(|p| p.number).collect(),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DashboardEntry {
    pub class_name: CompactString,
    pub open_sets: Vec<DueDateEntry>,
}

pub fn dashboard_entry(class_name: &str, sets: &[HomeworkSet], now: SystemTime) -> DashboardEntry {
    DashboardEntry {
        class_name: class_name.into(),
        open_sets: upcoming_deadlines(sets, now),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CourseInfo {
    pub class: ClassSummary,
    pub total_sets: usize,
    pub open_sets_count: usize,
    pub closed_sets_count: usize,
    pub open_sets: Vec<SetProgress>,
    /// Every set not open right now, whatever the reason.
    pub closed_sets: Vec<DueDateEntry>,
}

/// `open` are the open sets of `sets` with their problems filled in.
pub fn course_info(class: ClassSummary, sets: &[HomeworkSet], open: &[HomeworkSet], now: SystemTime) -> CourseInfo {
    let closed: Vec<HomeworkSet> = sets.iter().filter(|s| !s.is_open_at(now)).cloned().collect();

    CourseInfo {
        class,
        total_sets: sets.len(),
        open_sets_count: open.len(),
        closed_sets_count: closed.len(),
        open_sets: open.iter().map(set_progress).collect(),
        closed_sets: due_dates(&closed),
    }
}
