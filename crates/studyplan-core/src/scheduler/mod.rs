//! Study block scheduler.
//!
//! Scheduling runs in two passes over a [`ScheduleRange`]:
//! - [`allocate`] decides, per calendar day, which course takes each study slot
//! - [`materialize`] turns those day plans into concrete study and pause
//!   [`Interval`]s starting at the configured day start
//!
//! [`Planner`] validates the inputs once and runs both passes. A run is pure:
//! the same inputs always give the same intervals.

mod allocate;
mod materialize;

pub use allocate::{allocate, DayPlan, PlanEntry};
pub use materialize::{materialize, BlockKind, Interval};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::course::Course;
use crate::error::ValidationError;
use crate::estimator::CourseWorkload;

/// Which calendar days in the range receive study blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyDayPolicy {
    /// Every day in the range is a study day; `study_days_per_week` is
    /// informational only.
    #[default]
    EveryDay,
    /// Only the first `study_days_per_week` days of each week (from Monday)
    /// are study days.
    FirstDaysOfWeek,
}

impl StudyDayPolicy {
    pub fn is_study_day(&self, date: NaiveDate, days_per_week: u8) -> bool {
        match self {
            Self::EveryDay => true,
            Self::FirstDaysOfWeek => date.weekday().num_days_from_monday() < u32::from(days_per_week),
        }
    }
}

/// What happens to the pause slot after a day's last study block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingPause {
    /// The cursor still advances by the pause duration (no interval emitted).
    #[default]
    Advance,
    /// The cursor stops at the end of the last study block.
    Skip,
}

/// How blocks running past the configured day end are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayEndPolicy {
    /// Blocks are emitted even if they end after day end.
    #[default]
    PassThrough,
    /// Blocks that would end after day end are dropped for that day.
    Clip,
    /// A plan that cannot fit the day window is rejected up front.
    Reject,
}

/// Study-time constraints for one scheduling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyParameters {
    pub study_minutes_per_day: u32,
    pub study_days_per_week: u8,
    /// Length of one study block.
    pub block_minutes: u32,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub pause_minutes: u32,
    #[serde(default)]
    pub study_days: StudyDayPolicy,
    #[serde(default)]
    pub trailing_pause: TrailingPause,
    #[serde(default)]
    pub day_end_policy: DayEndPolicy,
}

impl Default for StudyParameters {
    fn default() -> Self {
        Self {
            study_minutes_per_day: 8 * 60,
            study_days_per_week: 7,
            block_minutes: 8 * 60,
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            pause_minutes: 30,
            study_days: StudyDayPolicy::default(),
            trailing_pause: TrailingPause::default(),
            day_end_policy: DayEndPolicy::default(),
        }
    }
}

impl StudyParameters {
    /// Check the parameter invariants.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if the block size is zero or larger than
    /// the daily budget, the day window is empty, or the weekly day count is
    /// outside 1..=7.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.block_minutes == 0 {
            return Err(ValidationError::invalid("block_minutes", "must be greater than zero"));
        }
        if self.block_minutes > self.study_minutes_per_day {
            return Err(ValidationError::invalid(
                "block_minutes",
                format!(
                    "block of {} minutes exceeds the daily budget of {} minutes",
                    self.block_minutes, self.study_minutes_per_day
                ),
            ));
        }
        if self.day_start >= self.day_end {
            return Err(ValidationError::invalid(
                "day_end",
                format!("day end {} must be after day start {}", self.day_end, self.day_start),
            ));
        }
        if !(1..=7).contains(&self.study_days_per_week) {
            return Err(ValidationError::OutOfRange {
                field: "study_days_per_week".into(),
                value: i64::from(self.study_days_per_week),
                min: 1,
                max: 7,
            });
        }
        Ok(())
    }

    /// Whole study blocks that fit in the daily budget. The remainder is dropped.
    pub fn blocks_per_day(&self) -> usize {
        if self.block_minutes == 0 {
            return 0;
        }
        (self.study_minutes_per_day / self.block_minutes) as usize
    }

    pub fn block_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.block_minutes))
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.pause_minutes))
    }

    /// Length of the window between day start and day end.
    pub fn day_window(&self) -> Duration {
        self.day_end - self.day_start
    }
}

/// Inclusive date range a schedule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl ScheduleRange {
    /// # Errors
    /// Returns [`ValidationError::InvalidDateRange`] if `end` is before `start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range from the start of `start` to 23:59 on `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default();
        Self::new(start.and_time(NaiveTime::MIN), end.and_time(end_of_day))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Every calendar date from start to end, both included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.end.date();
        self.start.date().iter_days().take_while(move |d| *d <= last)
    }

    pub fn day_count(&self) -> usize {
        ((self.end.date() - self.start.date()).num_days() + 1) as usize
    }
}

/// A course picked for scheduling. Order in the selection is the tie-break
/// priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedCourse {
    pub course_id: String,
    /// Study time the course needs over the range, if known.
    #[serde(default)]
    pub required_minutes: Option<i64>,
}

impl SelectedCourse {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            required_minutes: None,
        }
    }

    pub fn with_required(mut self, required: Duration) -> Self {
        self.required_minutes = Some(required.num_minutes());
        self
    }
}

impl From<&Course> for SelectedCourse {
    fn from(course: &Course) -> Self {
        Self::new(course.id.clone())
    }
}

impl From<&CourseWorkload> for SelectedCourse {
    fn from(workload: &CourseWorkload) -> Self {
        Self::new(workload.course.id.clone()).with_required(workload.stats.required_study_time())
    }
}

/// Study minutes a course received compared to what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCoverage {
    pub course_id: String,
    pub planned_minutes: i64,
    pub required_minutes: Option<i64>,
}

impl CourseCoverage {
    /// Planned minus required; negative means the plan falls short.
    pub fn balance_minutes(&self) -> Option<i64> {
        self.required_minutes.map(|required| self.planned_minutes - required)
    }
}

/// Output of one scheduling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlan {
    pub intervals: Vec<Interval>,
    pub coverage: Vec<CourseCoverage>,
}

impl StudyPlan {
    pub fn study_minutes(&self) -> i64 {
        self.intervals
            .iter()
            .filter(|i| i.kind == BlockKind::Study)
            .map(Interval::duration_minutes)
            .sum()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.intervals.first().map(Interval::date)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.intervals.last().map(Interval::date)
    }
}

/// Runs allocation and materialization with one validated parameter set.
#[derive(Debug, Clone)]
pub struct Planner {
    params: StudyParameters,
}

impl Planner {
    /// # Errors
    /// Returns a [`ValidationError`] if `params` break an invariant.
    pub fn new(params: StudyParameters) -> Result<Self, ValidationError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &StudyParameters {
        &self.params
    }

    /// Build the study plan for `courses` over `range`.
    ///
    /// Nothing is emitted unless every check passes. An empty selection gives
    /// an empty plan.
    pub fn plan(
        &self,
        courses: &[SelectedCourse],
        range: &ScheduleRange,
    ) -> Result<StudyPlan, ValidationError> {
        info!(
            courses = courses.len(),
            days = range.day_count(),
            blocks_per_day = self.params.blocks_per_day(),
            "planning study blocks"
        );

        let days = allocate(courses, &self.params, range)?;
        let intervals = materialize(&days, &self.params)?;
        let coverage = coverage(courses, &intervals);

        Ok(StudyPlan { intervals, coverage })
    }
}

fn coverage(courses: &[SelectedCourse], intervals: &[Interval]) -> Vec<CourseCoverage> {
    let mut seen = std::collections::HashSet::new();
    courses
        .iter()
        .filter(|c| seen.insert(c.course_id.as_str()))
        .map(|course| CourseCoverage {
            course_id: course.course_id.clone(),
            planned_minutes: intervals
                .iter()
                .filter(|i| i.course_id.as_deref() == Some(course.course_id.as_str()))
                .map(Interval::duration_minutes)
                .sum(),
            required_minutes: course.required_minutes,
        })
        .collect()
}
