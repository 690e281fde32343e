//! Day-by-day assignment of courses to study slots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ScheduleRange, SelectedCourse, StudyParameters};
use crate::error::ValidationError;

/// One study slot of a day, assigned to a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub course_id: String,
    /// Position of the slot within the day, from 0.
    pub block_index: usize,
}

/// Ordered course assignments for one calendar day, before times are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub entries: Vec<PlanEntry>,
}

impl DayPlan {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Assign courses to each day's study slots.
///
/// Every study day gets `blocks_per_day` slots, filled by cycling through
/// `courses` in the given order, one slot per course per pass. Days that are
/// not study days, and every day when no course is selected, get an empty plan.
///
/// # Errors
/// Returns a [`ValidationError`] if `params` break an invariant.
pub fn allocate(
    courses: &[SelectedCourse],
    params: &StudyParameters,
    range: &ScheduleRange,
) -> Result<Vec<DayPlan>, ValidationError> {
    params.validate()?;
    let slots = params.blocks_per_day();

    let plans = range
        .days()
        .map(|date| {
            if courses.is_empty() || !params.study_days.is_study_day(date, params.study_days_per_week) {
                return DayPlan::empty(date);
            }

            let entries = courses
                .iter()
                .cycle()
                .take(slots)
                .enumerate()
                .map(|(block_index, course)| PlanEntry {
                    course_id: course.course_id.clone(),
                    block_index,
                })
                .collect();

            let plan = DayPlan { date, entries };
            debug!(%date, blocks = plan.len(), "allocated day");
            plan
        })
        .collect();

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::{date, params};
    use crate::scheduler::StudyDayPolicy;
    use proptest::prelude::*;

    fn ids(plan: &DayPlan) -> Vec<&str> {
        plan.entries.iter().map(|e| e.course_id.as_str()).collect()
    }

    fn courses(names: &[&str]) -> Vec<SelectedCourse> {
        names.iter().map(|n| SelectedCourse::new(*n)).collect()
    }

    fn week() -> ScheduleRange {
        // Monday to Sunday
        ScheduleRange::from_dates(date(2024, 3, 4), date(2024, 3, 10)).unwrap()
    }

    #[test]
    fn cycles_courses_in_input_order() {
        let plans = allocate(&courses(&["A", "B"]), &params(180, 60, 15), &week()).unwrap();
        assert_eq!(plans.len(), 7);
        for plan in &plans {
            assert_eq!(ids(plan), ["A", "B", "A"]);
            let indices: Vec<usize> = plan.entries.iter().map(|e| e.block_index).collect();
            assert_eq!(indices, [0, 1, 2]);
        }
    }

    #[test]
    fn more_courses_than_slots_keeps_the_first_ones() {
        let plans = allocate(&courses(&["A", "B", "C"]), &params(120, 60, 15), &week()).unwrap();
        assert_eq!(ids(&plans[0]), ["A", "B"]);
    }

    #[test]
    fn remainder_of_budget_is_discarded() {
        let plans = allocate(&courses(&["A"]), &params(90, 40, 0), &week()).unwrap();
        assert!(plans.iter().all(|p| p.len() == 2));
    }

    #[test]
    fn no_courses_gives_empty_days() {
        let plans = allocate(&[], &params(180, 60, 15), &week()).unwrap();
        assert_eq!(plans.len(), 7);
        assert!(plans.iter().all(DayPlan::is_empty));
    }

    #[test]
    fn zero_block_size_fails_fast() {
        assert!(allocate(&courses(&["A"]), &params(180, 0, 15), &week()).is_err());
    }

    #[test]
    fn every_day_is_used_by_default() {
        let mut p = params(60, 60, 0);
        p.study_days_per_week = 3;
        let plans = allocate(&courses(&["A"]), &p, &week()).unwrap();
        assert!(plans.iter().all(|d| d.len() == 1));
    }

    #[test]
    fn weekly_limit_applies_when_enforced() {
        let mut p = params(60, 60, 0);
        p.study_days_per_week = 3;
        p.study_days = StudyDayPolicy::FirstDaysOfWeek;
        let plans = allocate(&courses(&["A"]), &p, &week()).unwrap();
        let busy: Vec<usize> = plans.iter().map(DayPlan::len).collect();
        assert_eq!(busy, [1, 1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn plans_follow_calendar_days() {
        let range = ScheduleRange::from_dates(date(2024, 2, 28), date(2024, 3, 1)).unwrap();
        let plans = allocate(&courses(&["A"]), &params(60, 60, 0), &range).unwrap();
        let dates: Vec<NaiveDate> = plans.iter().map(|p| p.date).collect();
        assert_eq!(dates, [date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
    }

    proptest! {
        #[test]
        fn each_day_has_budget_entries_in_cycle_order(
            n in 1usize..6,
            block in 15u32..120,
            factor in 1u32..8,
        ) {
            let names: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
            let selected: Vec<SelectedCourse> = names.iter().map(SelectedCourse::new).collect();
            let p = params(block * factor, block, 10);
            let plans = allocate(&selected, &p, &week()).unwrap();

            for plan in &plans {
                prop_assert_eq!(plan.len(), factor as usize);
                for (i, entry) in plan.entries.iter().enumerate() {
                    prop_assert_eq!(&entry.course_id, &names[i % n]);
                }
            }
        }
    }
}
