//! Weekly resource-stage rotation.
//!
//! Resource stages open on fixed weekdays; everything else (story stages,
//! LS, annihilation) is always open. The game day starts at `reset_hour`,
//! so 02:00 on a Tuesday still counts as Monday.

use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Weekday};
use farmflow_core::traits::StageCalendar;
use farmflow_core::types::StageAvailability;

use chrono::Weekday::{Fri, Mon, Sat, Sun, Thu, Tue, Wed};

const ROTATION: &[(&str, &[Weekday])] = &[
    ("CE", &[Tue, Thu, Sat, Sun]),
    ("CA", &[Tue, Wed, Fri, Sun]),
    ("AP", &[Mon, Thu, Sat, Sun]),
    ("SK", &[Mon, Wed, Fri, Sat]),
    ("PR-A", &[Mon, Thu, Fri, Sun]),
    ("PR-B", &[Mon, Tue, Fri, Sat]),
    ("PR-C", &[Wed, Thu, Sat, Sun]),
    ("PR-D", &[Tue, Wed, Sat, Sun]),
];

/// Stage family used for the rotation lookup: `PR-A-2` → `PR-A`, `CE-6` → `CE`.
fn stage_family(stage_id: &str) -> &str {
    if stage_id.starts_with("PR-") {
        if let Some(family) = stage_id.get(..4) {
            return family;
        }
    }
    stage_id.split('-').next().unwrap_or(stage_id)
}

fn short_day(day: Weekday) -> &'static str {
    match day {
        Mon => "Mon",
        Tue => "Tue",
        Wed => "Wed",
        Thu => "Thu",
        Fri => "Fri",
        Sat => "Sat",
        Sun => "Sun",
    }
}

/// Days a stage is open, `None` if it is never rotated out.
pub fn open_days(stage_id: &str) -> Option<&'static [Weekday]> {
    let family = stage_family(stage_id);
    ROTATION
        .iter()
        .find(|(prefix, _)| *prefix == family)
        .map(|(_, days)| *days)
}

/// Availability of `stage_id` on game day `day`.
pub fn availability_on(stage_id: &str, day: Weekday) -> StageAvailability {
    match open_days(stage_id) {
        Some(days) if !days.contains(&day) => {
            let open: Vec<&str> = days.iter().map(|d| short_day(*d)).collect();
            StageAvailability::closed(format!(
                "{stage_id} is closed on {} (open {})",
                short_day(day),
                open.join("/")
            ))
        }
        _ => StageAvailability::open(),
    }
}

/// Game weekday of a wall-clock instant given the daily reset hour.
pub fn game_weekday<Tz: TimeZone>(now: DateTime<Tz>, reset_hour: u32) -> Weekday {
    (now - Duration::hours(i64::from(reset_hour))).weekday()
}

/// Calendar backed by the weekly rotation table.
#[derive(Debug, Clone)]
pub struct WeeklyStageCalendar {
    reset_hour: u32,
    fixed_day: Option<Weekday>,
}

impl WeeklyStageCalendar {
    pub fn new(reset_hour: u32) -> Self {
        Self {
            reset_hour,
            fixed_day: None,
        }
    }

    /// Calendar pinned to one game day, independent of the clock.
    pub fn fixed(day: Weekday) -> Self {
        Self {
            reset_hour: 0,
            fixed_day: Some(day),
        }
    }

    pub fn today(&self) -> Weekday {
        self.fixed_day
            .unwrap_or_else(|| game_weekday(Local::now(), self.reset_hour))
    }
}

impl StageCalendar for WeeklyStageCalendar {
    fn is_stage_open_today(&self, stage_id: &str) -> StageAvailability {
        availability_on(stage_id, self.today())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_story_stage_always_open() {
        for day in [Mon, Tue, Wed, Thu, Fri, Sat, Sun] {
            assert!(availability_on("1-7", day).is_open);
            assert!(availability_on("LS-6", day).is_open);
        }
    }

    #[test]
    fn test_ce_closed_on_monday() {
        let a = availability_on("CE-6", Mon);
        assert!(!a.is_open);
        assert_eq!(a.reason, "CE-6 is closed on Mon (open Tue/Thu/Sat/Sun)");
        assert!(availability_on("CE-6", Tue).is_open);
    }

    #[test]
    fn test_chip_families() {
        assert_eq!(stage_family("PR-A-2"), "PR-A");
        assert_eq!(stage_family("CA-5"), "CA");
        assert!(availability_on("PR-C-1", Wed).is_open);
        assert!(!availability_on("PR-C-1", Mon).is_open);
    }

    #[test]
    fn test_non_ascii_chip_stage_is_open() {
        assert_eq!(stage_family("PR-剿灭"), "PR");
        for day in [Mon, Tue, Wed, Thu, Fri, Sat, Sun] {
            assert!(availability_on("PR-剿灭", day).is_open);
        }
        assert!(availability_on("剿灭作战", Mon).is_open);
    }

    #[test]
    fn test_reset_hour_shifts_day() {
        // 2026-03-03 is a Tuesday; 02:00 is still Monday's game day.
        let early = Utc.with_ymd_and_hms(2026, 3, 3, 2, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 3, 5, 0, 0).unwrap();
        assert_eq!(game_weekday(early, 4), Mon);
        assert_eq!(game_weekday(later, 4), Tue);
    }

    #[test]
    fn test_fixed_calendar() {
        let cal = WeeklyStageCalendar::fixed(Mon);
        assert!(!cal.is_stage_open_today("CE-6").is_open);
        assert!(cal.is_stage_open_today("AP-5").is_open);
    }
}
