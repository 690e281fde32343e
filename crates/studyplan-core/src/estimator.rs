//! Workload estimation from peer ratings.
//!
//! Turns a course's ratings into averages (grade, difficulty, study time),
//! a star score and a workload-based ECTS figure. All functions are pure over
//! the ratings they are given; nothing is read from storage here.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::course::{Course, Rating};
use crate::error::EstimateError;

/// Study hours that make up one ECTS credit.
pub const HOURS_PER_ECTS: f64 = 25.0;

/// Aggregated workload statistics for one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadStats {
    pub course_id: String,
    pub rating_count: usize,
    pub avg_grade: f64,
    pub avg_difficulty: f64,
    /// Hours, averaged over all ratings.
    pub avg_study_time: f64,
    /// Difficulty on a five-star scale.
    pub avg_stars: f64,
    /// Credits implied by the reported study time, rounded up.
    pub real_ects: u32,
}

impl WorkloadStats {
    /// Study time a student should plan for this course.
    pub fn required_study_time(&self) -> Duration {
        Duration::minutes((self.avg_study_time * 60.0).round() as i64)
    }
}

/// Round to two decimals.
///
/// Rounding works on the exact binary value of `value`, so 1.835 (stored as
/// 1.83499999...) rounds down. Exact ties go to the even neighbour.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let bits = value.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exp) = if exp_bits == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), exp_bits - 1075)
    };

    if exp >= 0 {
        return value;
    }

    // value * 100 == mantissa * 100 * 2^exp, exactly
    let scaled = u128::from(mantissa) * 100;
    let hundredths = if exp <= -127 {
        // scaled < 2^67, far below half of 2^127
        0
    } else {
        let shift = (-exp) as u32;
        let floor = scaled >> shift;
        let rem = scaled & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if rem > half || (rem == half && floor % 2 == 1) {
            floor + 1
        } else {
            floor
        }
    };

    (hundredths as f64 / 100.0).copysign(value)
}

fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    values.sum::<f64>() / count as f64
}

/// Compute workload statistics for a course from its ratings.
///
/// # Errors
/// Returns [`EstimateError::NoRatings`] when `ratings` is empty.
pub fn estimate(course_id: &str, ratings: &[Rating]) -> Result<WorkloadStats, EstimateError> {
    if ratings.is_empty() {
        return Err(EstimateError::NoRatings {
            course_id: course_id.to_string(),
        });
    }

    let n = ratings.len();
    let avg_grade = round2(mean(ratings.iter().map(|r| f64::from(r.grade)), n));
    let avg_difficulty = round2(mean(ratings.iter().map(|r| f64::from(r.difficulty)), n));
    let avg_study_time = round2(mean(ratings.iter().map(|r| r.study_time as f64), n));

    Ok(WorkloadStats {
        course_id: course_id.to_string(),
        rating_count: n,
        avg_grade,
        avg_difficulty,
        avg_study_time,
        avg_stars: round2(avg_difficulty / 2.0),
        real_ects: (avg_study_time / HOURS_PER_ECTS).ceil() as u32,
    })
}

/// A course paired with its estimated workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseWorkload {
    pub course: Course,
    pub stats: WorkloadStats,
}

/// Result of estimating many courses at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseBatch {
    pub estimated: Vec<CourseWorkload>,
    /// Ids of courses that had no ratings.
    pub skipped: Vec<String>,
}

/// Estimate every course, skipping (with a warning) the ones without ratings.
pub fn estimate_many<'a, I>(courses: I) -> CourseBatch
where
    I: IntoIterator<Item = (&'a Course, &'a [Rating])>,
{
    let mut batch = CourseBatch::default();
    for (course, ratings) in courses {
        match estimate(&course.id, ratings) {
            Ok(stats) => batch.estimated.push(CourseWorkload {
                course: course.clone(),
                stats,
            }),
            Err(err) => {
                warn!(course = %course.name, error = %err, "skipping course without ratings");
                batch.skipped.push(course.id.clone());
            }
        }
    }
    batch
}

/// Statistic used to order courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    Grade,
    Difficulty,
    StudyTime,
}

impl RankBy {
    fn key(&self, stats: &WorkloadStats) -> f64 {
        match self {
            Self::Grade => stats.avg_grade,
            Self::Difficulty => stats.avg_difficulty,
            Self::StudyTime => stats.avg_study_time,
        }
    }
}

/// Sort courses by the chosen average, highest first. Ties keep input order.
pub fn rank(workloads: &[CourseWorkload], by: RankBy) -> Vec<CourseWorkload> {
    let mut ranked = workloads.to_vec();
    ranked.sort_by(|a, b| by.key(&b.stats).total_cmp(&by.key(&a.stats)));
    ranked
}
