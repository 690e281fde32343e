//! Conversion of day plans into time-stamped study and pause intervals.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DayEndPolicy, DayPlan, StudyParameters, TrailingPause};
use crate::error::ValidationError;

/// Kind of scheduled block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Study,
    Pause,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Pause => "pause",
        }
    }
}

impl std::str::FromStr for BlockKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "study" => Ok(Self::Study),
            "pause" => Ok(Self::Pause),
            other => Err(ValidationError::invalid(
                "kind",
                format!("expected study or pause, got '{other}'"),
            )),
        }
    }
}

/// A concrete block in the final schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub kind: BlockKind,
    /// Set for study blocks, `None` for pauses.
    pub course_id: Option<String>,
}

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn quarter_hour(time: NaiveTime) -> u32 {
    time.hour() * 4 + time.minute() / 15
}

impl Interval {
    pub fn study(start: NaiveDateTime, end: NaiveDateTime, course_id: impl Into<String>) -> Self {
        Self {
            start,
            end,
            kind: BlockKind::Study,
            course_id: Some(course_id.into()),
        }
    }

    pub fn pause(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            kind: BlockKind::Pause,
            course_id: None,
        }
    }

    /// Calendar day the block starts on.
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start.time()
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end.time()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Quarter-hour slot the block starts in (08:15 is slot 33).
    pub fn slot_index(&self) -> u32 {
        quarter_hour(self.start_time())
    }

    pub fn end_slot_index(&self) -> u32 {
        quarter_hour(self.end_time())
    }

    /// Number of quarter-hour slots the block spans on a day grid.
    pub fn slot_count(&self) -> u32 {
        self.end_slot_index().saturating_sub(self.slot_index())
    }

    pub fn weekday_name(&self) -> &'static str {
        WEEKDAY_NAMES[self.date().weekday().num_days_from_monday() as usize]
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Minutes a plan of `blocks` entries occupies, pauses between blocks included.
fn span_minutes(blocks: usize, params: &StudyParameters) -> i64 {
    if blocks == 0 {
        return 0;
    }
    let blocks = blocks as i64;
    blocks * i64::from(params.block_minutes) + (blocks - 1) * i64::from(params.pause_minutes)
}

/// Attach times to day plans.
///
/// Each day starts at `day_start`. Study blocks follow each other with a pause
/// between consecutive blocks; the last block of a day is not followed by a
/// pause interval. The date of each day is the day after the previous day's
/// cursor, so a day that runs past midnight pushes the following days back.
///
/// # Errors
/// Returns a [`ValidationError`] if `params` break an invariant, or, under
/// [`DayEndPolicy::Reject`], if any day does not fit its window. No interval
/// is returned in either case.
pub fn materialize(plans: &[DayPlan], params: &StudyParameters) -> Result<Vec<Interval>, ValidationError> {
    params.validate()?;

    if params.day_end_policy == DayEndPolicy::Reject {
        let available = params.day_window().num_minutes();
        if let Some(plan) = plans.iter().find(|p| span_minutes(p.len(), params) > available) {
            return Err(ValidationError::DayOverflow {
                date: plan.date,
                needed_minutes: span_minutes(plan.len(), params),
                available_minutes: available,
            });
        }
    }

    let block = params.block_duration();
    let pause = params.pause_duration();
    let clip = params.day_end_policy == DayEndPolicy::Clip;

    let mut intervals = Vec::with_capacity(plans.iter().map(|p| p.len() * 2).sum());
    let mut carried: Option<NaiveDate> = None;

    for plan in plans {
        let date = carried.map_or(plan.date, |next| next.max(plan.date));
        let day_end = date.and_time(params.day_end);
        let mut cursor = date.and_time(params.day_start);
        let last = plan.len().saturating_sub(1);

        for (i, entry) in plan.entries.iter().enumerate() {
            let study_end = cursor + block;
            if clip && study_end > day_end {
                warn!(%date, dropped = plan.len() - i, "study blocks past day end were clipped");
                break;
            }
            intervals.push(Interval::study(cursor, study_end, entry.course_id.clone()));
            cursor = study_end;

            if i < last {
                let pause_end = cursor + pause;
                if !clip || pause_end + block <= day_end {
                    intervals.push(Interval::pause(cursor, pause_end));
                }
            }
            if i < last || params.trailing_pause == TrailingPause::Advance {
                cursor += pause;
            }
        }

        debug!(%date, until = %cursor.time(), "materialized day");
        carried = Some(
            cursor
                .date()
                .succ_opt()
                .ok_or_else(|| ValidationError::invalid("range", "date past the supported calendar"))?,
        );
    }

    Ok(intervals)
}
