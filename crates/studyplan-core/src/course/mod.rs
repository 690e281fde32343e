//! Course catalog types and peer ratings.
//!
//! Faculty and university are administrative metadata; the scheduler only
//! looks at course ids and the workload derived from [`Rating`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lowest accepted difficulty score.
pub const MIN_DIFFICULTY: u32 = 1;
/// Highest accepted difficulty score.
pub const MAX_DIFFICULTY: u32 = 10;

/// University a faculty belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct University {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_website")]
    pub website: String,
}

fn default_website() -> String {
    "example.com".into()
}

/// Faculty offering a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    pub name: String,
    pub university: University,
}

/// A course a student can follow and rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Nominal credit value, as advertised by the faculty.
    #[serde(default)]
    pub ects: u32,
    #[serde(default)]
    pub faculty: Option<Faculty>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    /// Create a course with a fresh id.
    pub fn new(name: impl Into<String>, ects: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            ects,
            faculty: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_faculty(mut self, faculty: Faculty) -> Self {
        self.faculty = Some(faculty);
        self
    }
}

impl std::fmt::Display for Course {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Where a student stands in a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::invalid(
                "status",
                format!("expected running, succeeded or failed, got '{other}'"),
            )),
        }
    }
}

/// One student's rating of one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub student_id: String,
    pub course_id: String,
    pub grade: u32,
    /// 1 (easy) to 10 (hard).
    pub difficulty: u32,
    /// Total hours spent studying the course.
    pub study_time: u64,
    #[serde(default)]
    pub attended: bool,
    #[serde(default)]
    pub status: EnrollmentStatus,
}

impl Rating {
    /// Build a rating, rejecting difficulty scores outside 1..=10.
    pub fn new(
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        grade: u32,
        difficulty: u32,
        study_time: u64,
    ) -> Result<Self, ValidationError> {
        let rating = Self {
            student_id: student_id.into(),
            course_id: course_id.into(),
            grade,
            difficulty,
            study_time,
            attended: false,
            status: EnrollmentStatus::Running,
        };
        rating.validate()?;
        Ok(rating)
    }

    pub fn attended(mut self, attended: bool) -> Self {
        self.attended = attended;
        self
    }

    pub fn with_status(mut self, status: EnrollmentStatus) -> Self {
        self.status = status;
        self
    }

    /// Check the difficulty bounds. Deserialized ratings skip [`Rating::new`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(ValidationError::OutOfRange {
                field: "difficulty".into(),
                value: i64::from(self.difficulty),
                min: i64::from(MIN_DIFFICULTY),
                max: i64::from(MAX_DIFFICULTY),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_rejects_difficulty_out_of_bounds() {
        assert!(Rating::new("s1", "c1", 12, 0, 40).is_err());
        assert!(Rating::new("s1", "c1", 12, 11, 40).is_err());
        assert!(Rating::new("s1", "c1", 12, 10, 40).is_ok());
    }

    #[test]
    fn status_parses_lowercase_names() {
        assert_eq!("failed".parse::<EnrollmentStatus>().unwrap(), EnrollmentStatus::Failed);
        assert!("done".parse::<EnrollmentStatus>().is_err());
    }

    #[test]
    fn rating_serialization() {
        let rating = Rating::new("s1", "c1", 14, 6, 55)
            .unwrap()
            .attended(true)
            .with_status(EnrollmentStatus::Succeeded);
        let json = serde_json::to_string(&rating).unwrap();
        assert!(json.contains("\"status\":\"succeeded\""));
        let decoded: Rating = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, rating);
    }

    #[test]
    fn course_displays_its_name() {
        let course = Course::new("Linear Algebra", 5);
        assert_eq!(course.to_string(), "Linear Algebra");
        assert_eq!(course.ects, 5);
    }
}
