//! Integration tests for the planning workflow.
//!
//! Tests the full path from stored ratings through workload estimation,
//! scheduling, persistence and calendar export.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use studyplan_core::{
    estimate_many, export, Course, IcsExport, Planner, Rating, ScheduleDb, ScheduleRange,
    SelectedCourse, StudyParameters,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn seed(db: &ScheduleDb) -> (Course, Course, Course) {
    let algebra = Course::new("Algebra", 5);
    let physics = Course::new("Physics", 5);
    let history = Course::new("History", 3);
    for course in [&algebra, &physics, &history] {
        db.add_course(course).unwrap();
    }

    db.rate(&Rating::new("me", &algebra.id, 14, 7, 60).unwrap()).unwrap();
    db.rate(&Rating::new("peer", &algebra.id, 12, 8, 70).unwrap()).unwrap();
    db.rate(&Rating::new("me", &physics.id, 11, 5, 40).unwrap()).unwrap();
    db.rate(&Rating::new("peer", &physics.id, 13, 4, 36).unwrap()).unwrap();
    // History has no ratings at all.

    (algebra, physics, history)
}

fn weekday_params() -> StudyParameters {
    StudyParameters {
        study_minutes_per_day: 180,
        block_minutes: 60,
        pause_minutes: 15,
        ..StudyParameters::default()
    }
}

#[test]
fn test_full_planning_workflow() {
    let db = ScheduleDb::open_memory().unwrap();
    let (algebra, physics, history) = seed(&db);

    let ratings: Vec<(Course, Vec<Rating>)> = [&algebra, &physics, &history]
        .into_iter()
        .map(|c| (c.clone(), db.ratings_for(&c.id).unwrap()))
        .collect();
    let batch = estimate_many(ratings.iter().map(|(c, r)| (c, r.as_slice())));
    assert_eq!(batch.estimated.len(), 2);
    assert_eq!(batch.skipped, vec![history.id.clone()]);
    assert_eq!(batch.estimated[0].stats.avg_study_time, 65.0);
    assert_eq!(batch.estimated[0].stats.real_ects, 3);

    let selected: Vec<SelectedCourse> = batch.estimated.iter().map(SelectedCourse::from).collect();
    let planner = Planner::new(weekday_params()).unwrap();
    let range = ScheduleRange::from_dates(date(2024, 3, 4), date(2024, 3, 10)).unwrap();
    let plan = planner.plan(&selected, &range).unwrap();

    // 7 days x (3 study + 2 pause)
    assert_eq!(plan.intervals.len(), 35);
    assert_eq!(plan.intervals[0].start_time(), hm(8, 0));
    assert_eq!(plan.intervals[0].course_id.as_deref(), Some(algebra.id.as_str()));
    assert_eq!(plan.intervals[2].course_id.as_deref(), Some(physics.id.as_str()));
    assert_eq!(plan.intervals[4].course_id.as_deref(), Some(algebra.id.as_str()));

    // Algebra takes 2 of 3 slots a day: 14h planned against 65h required.
    assert_eq!(plan.coverage[0].planned_minutes, 14 * 60);
    assert_eq!(plan.coverage[0].balance_minutes(), Some(14 * 60 - 65 * 60));

    let id = db
        .save_schedule("Schedule : 2024-03-04 to 2024-03-10", planner.params(), &plan.intervals)
        .unwrap();
    let stored = db.get_schedule(&id).unwrap().unwrap();
    assert_eq!(stored.intervals, plan.intervals);
    assert_eq!(stored.start_date(), Some(date(2024, 3, 4)));
    assert_eq!(stored.end_date(), Some(date(2024, 3, 10)));

    let names: HashMap<String, String> = db
        .list_courses()
        .unwrap()
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let ics = IcsExport::new(&names).render(&stored.intervals);
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 35);
    assert_eq!(ics.matches("SUMMARY:Break").count(), 14);
    assert_eq!(ics.matches("SUMMARY:Algebra").count(), 14);
    assert_eq!(ics.matches("SUMMARY:Physics").count(), 7);
    assert_eq!(export::file_name(&stored.name), "Schedule _ 2024-03-04 to 2024-03-10.ics");
}

#[test]
fn test_followed_courses_feed_the_planner() {
    let db = ScheduleDb::open_memory().unwrap();
    let (algebra, physics, _) = seed(&db);

    let followed = db.followed_courses("me").unwrap();
    let selected: Vec<SelectedCourse> = followed.iter().map(SelectedCourse::from).collect();
    assert_eq!(selected.len(), 2);

    let planner = Planner::new(weekday_params()).unwrap();
    let day = date(2024, 3, 4);
    let plan = planner
        .plan(&selected, &ScheduleRange::from_dates(day, day).unwrap())
        .unwrap();
    let study: Vec<&str> = plan
        .intervals
        .iter()
        .filter_map(|i| i.course_id.as_deref())
        .collect();
    assert_eq!(study, [algebra.id.as_str(), physics.id.as_str(), algebra.id.as_str()]);
}

#[test]
fn test_invalid_parameters_store_nothing() {
    let db = ScheduleDb::open_memory().unwrap();
    let params = StudyParameters {
        block_minutes: 0,
        ..weekday_params()
    };
    assert!(Planner::new(params).is_err());
    assert!(db.list_schedules().unwrap().is_empty());
}

#[test]
fn test_schedule_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studyplan.db");
    let day = date(2024, 3, 4);

    let id = {
        let db = ScheduleDb::open_at(&path).unwrap();
        let planner = Planner::new(weekday_params()).unwrap();
        let plan = planner
            .plan(&[SelectedCourse::new("solo")], &ScheduleRange::from_dates(day, day).unwrap())
            .unwrap();
        db.save_schedule("Solo", planner.params(), &plan.intervals).unwrap()
    };

    let db = ScheduleDb::open_at(&path).unwrap();
    let schedule = db.get_schedule(&id).unwrap().unwrap();
    assert_eq!(schedule.intervals.len(), 5);
    assert_eq!(schedule.intervals[4].end_time(), hm(11, 30));
}
