pub mod config;
pub mod course;
pub mod plan;

use studyplan_core::{estimate, Course, ScheduleDb, SelectedCourse};
use tracing::warn;

/// Planner selection for a course, carrying its estimated study time when
/// the course has ratings.
pub(crate) fn select(db: &ScheduleDb, course: &Course) -> Result<SelectedCourse, Box<dyn std::error::Error>> {
    let ratings = db.ratings_for(&course.id)?;
    Ok(match estimate(&course.id, &ratings) {
        Ok(stats) => SelectedCourse::from(course).with_required(stats.required_study_time()),
        Err(err) => {
            warn!(course = %course.name, error = %err, "planning course without a required study time");
            SelectedCourse::from(course)
        }
    })
}
