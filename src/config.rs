//! CLI arguments and the typed study configuration built from them.
//!
//! The defaults are the study constants: the amlodipine course, the switch
//! to losartan, and the two measurement windows. Everything is overridable so
//! the pipeline can be rerun against a different medication history.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, NaiveTime};
use clap::Parser;
use std::path::PathBuf;

use crate::{DailyWindow, DatetimeSpan};

pub const DATETIME_ARG_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const TIME_ARG_FORMAT: &str = "%H:%M";

/// Label blood-pressure observations from an Apple Health export
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the Apple Health export.xml file
    #[arg(help = "Path to the Apple Health export.xml file")]
    pub export_path: PathBuf,

    /// Directory for labeled tables, label sidecars and the QA summary
    #[arg(long, default_value = "data/output")]
    pub output_dir: PathBuf,

    /// First day on amlodipine (format: YYYY-MM-DD HH:MM)
    #[arg(long, default_value = "2023-04-26 15:04")]
    pub amlodipine_start: String,

    /// Switch from amlodipine to losartan (format: YYYY-MM-DD HH:MM)
    #[arg(long, default_value = "2023-06-11 02:28")]
    pub medication_switch: String,

    /// End of the losartan period (format: YYYY-MM-DD HH:MM), defaults to now
    #[arg(long)]
    pub losartan_stop: Option<String>,

    /// Start of the morning group (format: HH:MM)
    #[arg(long, default_value = "03:00")]
    pub morning_start: String,

    /// Boundary between the morning and evening groups (format: HH:MM)
    #[arg(long, default_value = "12:00")]
    pub evening_start: String,
}

impl Args {
    /// The medication label family. The start of each span is the stop of
    /// the previous one; the open-ended losartan period closes at run time.
    pub fn medication_spans(&self) -> Result<Vec<DatetimeSpan>> {
        let amlodipine_start = parse_datetime_arg(&self.amlodipine_start)?;
        let switch = parse_datetime_arg(&self.medication_switch)?;
        let losartan_stop = match &self.losartan_stop {
            Some(value) => parse_datetime_arg(value)?,
            None => Local::now().naive_local(),
        };

        Ok(vec![
            DatetimeSpan {
                name: "Amlodipine Besylate".to_string(),
                start: amlodipine_start,
                stop: switch,
            },
            DatetimeSpan {
                name: "Losartan Potassium".to_string(),
                start: switch,
                stop: losartan_stop,
            },
        ])
    }

    /// The time-of-day label family. The evening window runs from the noon
    /// boundary back around to the morning start, so it wraps midnight.
    pub fn time_of_day_windows(&self) -> Result<Vec<DailyWindow>> {
        let morning_start = parse_time_arg(&self.morning_start)?;
        let evening_start = parse_time_arg(&self.evening_start)?;

        Ok(vec![
            DailyWindow {
                name: "Group 1 (Morning)".to_string(),
                start: morning_start,
                stop: evening_start,
            },
            DailyWindow {
                name: "Group 2 (Evening)".to_string(),
                start: evening_start,
                stop: morning_start,
            },
        ])
    }
}

fn parse_datetime_arg(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_ARG_FORMAT)
        .with_context(|| format!("Invalid datetime {:?}, expected YYYY-MM-DD HH:MM", value))
}

fn parse_time_arg(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_ARG_FORMAT)
        .with_context(|| format!("Invalid time {:?}, expected HH:MM", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::time_to_ordinal;
    use clap::Parser;

    fn default_args() -> Args {
        Args::parse_from(["bp-decoder", "export.xml"])
    }

    #[test]
    fn default_medication_spans_are_contiguous() {
        let spans = default_args().medication_spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "Amlodipine Besylate");
        assert_eq!(spans[1].name, "Losartan Potassium");
        // No gap and no overlap at the switch.
        assert_eq!(spans[0].stop, spans[1].start);
        assert!(spans[0].start < spans[0].stop);
        assert!(spans[1].start < spans[1].stop);
    }

    #[test]
    fn default_evening_window_wraps_midnight() {
        let windows = default_args().time_of_day_windows().unwrap();
        assert_eq!(windows.len(), 2);
        let morning = &windows[0];
        let evening = &windows[1];
        assert!(time_to_ordinal(morning.start) < time_to_ordinal(morning.stop));
        assert!(time_to_ordinal(evening.start) > time_to_ordinal(evening.stop));
        // The two windows tile the clock between them.
        assert_eq!(morning.stop, evening.start);
        assert_eq!(evening.stop, morning.start);
    }

    #[test]
    fn rejects_malformed_overrides() {
        let args = Args::parse_from([
            "bp-decoder",
            "export.xml",
            "--amlodipine-start",
            "April 26th",
        ]);
        assert!(args.medication_spans().is_err());

        let args = Args::parse_from(["bp-decoder", "export.xml", "--morning-start", "3am"]);
        assert!(args.time_of_day_windows().is_err());
    }
}
