//! iCalendar export of a schedule.
//!
//! Pause blocks get a generic label and study blocks the course name. Times
//! are written as floating local times, matching how intervals are stored.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::scheduler::{BlockKind, Interval};

const LINE_LIMIT: usize = 75;

/// Renders intervals as an `.ics` document.
#[derive(Debug, Clone)]
pub struct IcsExport<'a> {
    course_names: &'a HashMap<String, String>,
    pause_label: String,
    stamp: DateTime<Utc>,
}

impl<'a> IcsExport<'a> {
    /// `course_names` maps course ids to display names.
    pub fn new(course_names: &'a HashMap<String, String>) -> Self {
        Self {
            course_names,
            pause_label: "Break".into(),
            stamp: Utc::now(),
        }
    }

    pub fn pause_label(mut self, label: impl Into<String>) -> Self {
        self.pause_label = label.into();
        self
    }

    /// Timestamp written as DTSTAMP on every event.
    pub fn stamp(mut self, stamp: DateTime<Utc>) -> Self {
        self.stamp = stamp;
        self
    }

    fn summary<'b>(&'b self, interval: &'b Interval) -> &'b str {
        match (interval.kind, interval.course_id.as_deref()) {
            (BlockKind::Pause, _) | (BlockKind::Study, None) => self.pause_label.as_str(),
            (BlockKind::Study, Some(id)) => self.course_names.get(id).map_or(id, String::as_str),
        }
    }

    pub fn render(&self, intervals: &[Interval]) -> String {
        let mut out = String::new();
        push_line(&mut out, "BEGIN:VCALENDAR");
        push_line(&mut out, "VERSION:2.0");
        push_line(&mut out, "PRODID:-//studyplan//schedule export//EN");
        push_line(&mut out, "CALSCALE:GREGORIAN");

        let stamp = self.stamp.format("%Y%m%dT%H%M%SZ").to_string();
        for (index, interval) in intervals.iter().enumerate() {
            push_line(&mut out, "BEGIN:VEVENT");
            push_line(
                &mut out,
                &format!("UID:{}-{}@studyplan", local_stamp(interval.start), index),
            );
            push_line(&mut out, &format!("DTSTAMP:{stamp}"));
            push_line(&mut out, &format!("DTSTART:{}", local_stamp(interval.start)));
            push_line(&mut out, &format!("DTEND:{}", local_stamp(interval.end)));
            push_line(&mut out, &format!("SUMMARY:{}", escape_text(self.summary(interval))));
            push_line(&mut out, "END:VEVENT");
        }

        push_line(&mut out, "END:VCALENDAR");
        out
    }
}

fn local_stamp(dt: NaiveDateTime) -> String {
    dt.format("%Y%m%dT%H%M%S").to_string()
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}

/// Append a content line, folded at 75 octets, terminated by CRLF.
fn push_line(out: &mut String, line: &str) {
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > LINE_LIMIT {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out.push_str("\r\n");
}

/// File name for a schedule export, with path-hostile characters replaced.
pub fn file_name(schedule_name: &str) -> String {
    let mut name = String::with_capacity(schedule_name.len() + 4);
    for c in schedule_name.trim().chars() {
        if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
            name.push(c);
        } else {
            name.push('_');
        }
    }
    if name.is_empty() {
        name.push_str("schedule");
    }
    name.push_str(".ics");
    name
}
