//! Daily schedule times.
//! Supports: "HH:MM" (24h), one entry per daily run.
//! Example: ["05:30", "17:30"] = twice a day.
//!
//! Finds the next matching minute by scanning forward, no cron crate needed.

use chrono::{DateTime, Duration, TimeZone, Timelike};

/// Parse an `HH:MM` time of day.
pub fn parse_time_of_day(text: &str) -> Option<(u32, u32)> {
    let (h, m) = text.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 || m.len() != 2 {
        return None;
    }
    Some((hour, minute))
}

/// Next instant strictly after `after` matching one of `times`.
///
/// Invalid entries are logged and ignored; `None` if none is valid.
pub fn next_run_from_times<Tz: TimeZone>(
    times: &[String],
    after: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let slots: Vec<(u32, u32)> = times
        .iter()
        .filter_map(|t| {
            let slot = parse_time_of_day(t);
            if slot.is_none() {
                tracing::warn!("Invalid schedule time: '{t}' (expected HH:MM)");
            }
            slot
        })
        .collect();
    if slots.is_empty() {
        return None;
    }

    let mut candidate = after.clone() + Duration::minutes(1);
    // Zero out seconds
    candidate = candidate
        .with_second(0)
        .and_then(|c| c.with_nanosecond(0))
        .unwrap_or(candidate);

    // A day and a bit covers every slot; 48h absorbs DST jumps.
    for _ in 0..(48 * 60) {
        let now = (candidate.hour(), candidate.minute());
        if slots.contains(&now) {
            return Some(candidate);
        }
        candidate = candidate + Duration::minutes(1);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn times(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("05:30"), Some((5, 30)));
        assert_eq!(parse_time_of_day(" 23:59 "), Some((23, 59)));
        assert_eq!(parse_time_of_day("24:00"), None);
        assert_eq!(parse_time_of_day("7:5"), None);
        assert_eq!(parse_time_of_day("noon"), None);
    }

    #[test]
    fn test_later_today() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap();
        let next = next_run_from_times(&times(&["05:30", "17:30"]), &after).unwrap();
        assert_eq!((next.hour(), next.minute()), (17, 30));
        assert_eq!(next.date_naive(), after.date_naive());
    }

    #[test]
    fn test_wraps_to_tomorrow() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 18, 0, 0).unwrap();
        let next = next_run_from_times(&times(&["05:30", "17:30"]), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_strictly_after() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 5, 30, 20).unwrap();
        let next = next_run_from_times(&times(&["05:30"]), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_no_valid_times() {
        let after = Utc::now();
        assert!(next_run_from_times(&times(&["bad", "25:00"]), &after).is_none());
        assert!(next_run_from_times(&[], &after).is_none());
    }
}
