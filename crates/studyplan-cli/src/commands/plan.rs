//! Study schedule commands for CLI.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Local, NaiveDate, NaiveTime};
use clap::Subcommand;
use serde_json::json;
use studyplan_core::export::{self, IcsExport};
use studyplan_core::{Config, Planner, ScheduleDb, ScheduleRange, StudyParameters};
use tracing::info;

use super::select;

#[derive(Subcommand)]
pub enum PlanAction {
    /// Generate and store a schedule
    Create {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last day, included (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Course ID to schedule, repeatable (default: courses you follow)
        #[arg(long = "course")]
        courses: Vec<String>,
        /// Schedule name
        #[arg(long)]
        name: Option<String>,
        /// Study minutes per day
        #[arg(long)]
        per_day: Option<u32>,
        /// Study days per week
        #[arg(long)]
        days_per_week: Option<u8>,
        /// Study block length in minutes
        #[arg(long)]
        block: Option<u32>,
        /// Pause length in minutes
        #[arg(long)]
        pause: Option<u32>,
        /// Day start (HH:MM)
        #[arg(long)]
        day_start: Option<NaiveTime>,
        /// Day end (HH:MM)
        #[arg(long)]
        day_end: Option<NaiveTime>,
    },
    /// List stored schedules
    List,
    /// Show a schedule with all its blocks
    Show {
        /// Schedule ID
        id: String,
    },
    /// Show the blocks of one week
    Week {
        /// Schedule ID
        id: String,
        /// Any day of the week to show (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a schedule
    Delete {
        /// Schedule ID
        id: String,
    },
    /// Export a schedule as an iCalendar file
    Export {
        /// Schedule ID
        id: String,
        /// Output path (default: <schedule name>.ics)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Overrides given on the command line, applied on top of the config.
struct Overrides {
    per_day: Option<u32>,
    days_per_week: Option<u8>,
    block: Option<u32>,
    pause: Option<u32>,
    day_start: Option<NaiveTime>,
    day_end: Option<NaiveTime>,
}

impl Overrides {
    fn apply(self, mut params: StudyParameters) -> StudyParameters {
        if let Some(v) = self.per_day { params.study_minutes_per_day = v; }
        if let Some(v) = self.days_per_week { params.study_days_per_week = v; }
        if let Some(v) = self.block { params.block_minutes = v; }
        if let Some(v) = self.pause { params.pause_minutes = v; }
        if let Some(v) = self.day_start { params.day_start = v; }
        if let Some(v) = self.day_end { params.day_end = v; }
        params
    }
}

fn course_names(db: &ScheduleDb) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    Ok(db.list_courses()?.into_iter().map(|c| (c.id, c.name)).collect())
}

pub fn run(action: PlanAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ScheduleDb::open()?;

    match action {
        PlanAction::Create {
            from,
            to,
            courses,
            name,
            per_day,
            days_per_week,
            block,
            pause,
            day_start,
            day_end,
        } => {
            let config = Config::load()?;
            let params = Overrides {
                per_day,
                days_per_week,
                block,
                pause,
                day_start,
                day_end,
            }
            .apply(config.study.parameters());
            let planner = Planner::new(params)?;
            let range = ScheduleRange::from_dates(from, to)?;

            let courses = if courses.is_empty() {
                db.followed_courses(&config.student_id)?
            } else {
                let mut found = Vec::with_capacity(courses.len());
                for id in &courses {
                    found.push(db.get_course(id)?.ok_or(format!("Course not found: {id}"))?);
                }
                found
            };
            let selected = courses
                .iter()
                .map(|c| select(&db, c))
                .collect::<Result<Vec<_>, _>>()?;

            let plan = planner.plan(&selected, &range)?;
            let name = name.unwrap_or_else(|| format!("Schedule : {from} to {to}"));
            let id = db.save_schedule(&name, planner.params(), &plan.intervals)?;

            println!("Schedule created: {id}");
            let output = json!({
                "id": id,
                "name": name,
                "blocks": plan.intervals.len(),
                "study_minutes": plan.study_minutes(),
                "coverage": plan.coverage,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        PlanAction::List => {
            println!("{}", serde_json::to_string_pretty(&db.list_schedules()?)?);
        }
        PlanAction::Show { id } => {
            let schedule = db.get_schedule(&id)?.ok_or(format!("Schedule not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        PlanAction::Week { id, date } => {
            if db.get_schedule(&id)?.is_none() {
                return Err(format!("Schedule not found: {id}").into());
            }
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let names = course_names(&db)?;
            let blocks: Vec<_> = db
                .week_blocks(&id, today)?
                .into_iter()
                .map(|b| {
                    json!({
                        "day": b.weekday_name(),
                        "date": b.date(),
                        "start": b.start_time().format("%H:%M").to_string(),
                        "end": b.end_time().format("%H:%M").to_string(),
                        "slot": b.slot_index(),
                        "slots": b.slot_count(),
                        "kind": b.kind,
                        "course": b.course_id.as_ref().map(|c| names.get(c).unwrap_or(c)),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        PlanAction::Delete { id } => {
            if !db.delete_schedule(&id)? {
                return Err(format!("Schedule not found: {id}").into());
            }
            println!("Schedule deleted: {id}");
        }
        PlanAction::Export { id, out } => {
            let schedule = db.get_schedule(&id)?.ok_or(format!("Schedule not found: {id}"))?;
            let config = Config::load_or_default();
            let names = course_names(&db)?;
            let ics = IcsExport::new(&names)
                .pause_label(config.export.pause_label)
                .render(&schedule.intervals);
            let path = out.unwrap_or_else(|| PathBuf::from(export::file_name(&schedule.name)));
            std::fs::write(&path, ics)?;
            info!(schedule = %id, path = %path.display(), "wrote calendar");
            println!("Exported {} blocks to {}", schedule.intervals.len(), path.display());
        }
    }
    Ok(())
}
