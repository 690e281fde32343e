//! Course catalog and rating commands for CLI.

use clap::Subcommand;
use serde_json::json;
use studyplan_core::{
    estimate, estimate_many, rank, Config, Course, EnrollmentStatus, RankBy, Rating, ScheduleDb,
};

#[derive(Subcommand)]
pub enum CourseAction {
    /// Add a course to the catalog
    Add {
        /// Course name
        name: String,
        /// Official ECTS credits
        #[arg(long, default_value = "5")]
        ects: u32,
        /// Course description
        #[arg(long)]
        description: Option<String>,
    },
    /// List all courses
    List,
    /// Search courses by name
    Search {
        /// Case-insensitive name fragment
        query: String,
    },
    /// Show a course with its workload estimate
    Show {
        /// Course ID
        id: String,
    },
    /// Rate a course (replaces your previous rating)
    Rate {
        /// Course ID
        id: String,
        /// Grade obtained
        #[arg(long)]
        grade: u32,
        /// Difficulty from 1 to 10
        #[arg(long)]
        difficulty: u32,
        /// Hours spent studying
        #[arg(long)]
        study_time: u64,
        /// Attended the lectures
        #[arg(long)]
        attended: bool,
        /// Enrollment status: running, succeeded or failed
        #[arg(long, default_value = "running")]
        status: EnrollmentStatus,
        /// Student ID (default: config student_id)
        #[arg(long)]
        student: Option<String>,
    },
    /// Rank rated courses by an average
    Rank {
        /// grade, difficulty or study_time
        #[arg(long, default_value = "study_time")]
        by: String,
    },
}

fn parse_rank_by(value: &str) -> Result<RankBy, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown ranking '{value}', expected grade, difficulty or study_time"))
}

pub fn run(action: CourseAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ScheduleDb::open()?;

    match action {
        CourseAction::Add {
            name,
            ects,
            description,
        } => {
            let mut course = Course::new(name, ects);
            if let Some(d) = description {
                course = course.with_description(d);
            }
            db.add_course(&course)?;
            println!("Course created: {}", course.id);
            println!("{}", serde_json::to_string_pretty(&course)?);
        }
        CourseAction::List => {
            println!("{}", serde_json::to_string_pretty(&db.list_courses()?)?);
        }
        CourseAction::Search { query } => {
            println!("{}", serde_json::to_string_pretty(&db.search_courses(&query)?)?);
        }
        CourseAction::Show { id } => {
            let course = db.get_course(&id)?.ok_or(format!("Course not found: {id}"))?;
            let ratings = db.ratings_for(&id)?;
            let workload = estimate(&id, &ratings).ok();
            let output = json!({ "course": course, "workload": workload });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        CourseAction::Rate {
            id,
            grade,
            difficulty,
            study_time,
            attended,
            status,
            student,
        } => {
            let student = student.unwrap_or_else(|| Config::load_or_default().student_id);
            let rating = Rating::new(student, id, grade, difficulty, study_time)?
                .attended(attended)
                .with_status(status);
            db.rate(&rating)?;
            println!("Rating saved");
            println!("{}", serde_json::to_string_pretty(&rating)?);
        }
        CourseAction::Rank { by } => {
            let by = parse_rank_by(&by)?;
            let courses = db.list_courses()?;
            let ratings = courses
                .iter()
                .map(|c| db.ratings_for(&c.id))
                .collect::<Result<Vec<_>, _>>()?;
            let batch = estimate_many(courses.iter().zip(ratings.iter().map(Vec::as_slice)));
            println!("{}", serde_json::to_string_pretty(&rank(&batch.estimated, by))?);
        }
    }
    Ok(())
}
