//! Contest window gate: open/upcoming/closed status and remaining time

use crate::types::ContestWindow;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Open,
    Upcoming,
    Closed,
}

/// Whole hours and minutes left, rounded down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub hours: i64,
    pub minutes: i64,
}

impl Remaining {
    fn between(now: DateTime<Utc>, target: DateTime<Utc>) -> Self {
        let total_minutes = (target - now).num_seconds().max(0) / 60;
        Self {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0
    }
}

pub fn status_of(window: &ContestWindow, now: DateTime<Utc>) -> WindowStatus {
    if now < window.start_at {
        WindowStatus::Upcoming
    } else if now < window.end_at {
        WindowStatus::Open
    } else {
        WindowStatus::Closed
    }
}

/// Time until the start (upcoming) or the end (open); None once closed
pub fn remaining(window: &ContestWindow, now: DateTime<Utc>) -> Option<Remaining> {
    match status_of(window, now) {
        WindowStatus::Upcoming => Some(Remaining::between(now, window.start_at)),
        WindowStatus::Open => Some(Remaining::between(now, window.end_at)),
        WindowStatus::Closed => None,
    }
}

/// Pick the Russian word form agreeing with `number`
/// (1 минута, 2 минуты, 5 минут, 11 минут, 21 минута)
pub fn agree_with_number<'a>(number: i64, one: &'a str, few: &'a str, many: &'a str) -> &'a str {
    let normalized = number.abs() % 100;
    let last_digit = normalized % 10;
    if (11..20).contains(&normalized) {
        return many;
    }
    match last_digit {
        1 => one,
        2..=4 => few,
        _ => many,
    }
}

pub fn waiting_for_start_message(remaining: Remaining) -> String {
    if remaining.is_zero() {
        return "⏰ До начала розыгрыша осталось менее одной минуты.".to_string();
    }
    // The hour word agrees with the minute count, as it always has
    let hours_word = agree_with_number(remaining.minutes, "час", "часа", "часов");
    let minutes_word = agree_with_number(remaining.minutes, "минута", "минуты", "минут");
    format!(
        "⏰ До начала розыгрыша осталось {} {} {} {}.",
        remaining.hours, hours_word, remaining.minutes, minutes_word
    )
}

pub fn waiting_for_end_message(remaining: Remaining) -> String {
    if remaining.is_zero() {
        return "⏰ До окончания розыгрыша осталось менее одной минуты.".to_string();
    }
    let minutes_word = agree_with_number(remaining.minutes, "минута", "минуты", "минут");
    format!(
        "⏰ До окончания розыгрыша осталось {} {}.",
        remaining.minutes, minutes_word
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, hour, minute, second).unwrap()
    }

    fn window() -> ContestWindow {
        ContestWindow::new("Morning", at(10, 0, 0), at(11, 0, 0))
    }

    #[test]
    fn test_upcoming_window() {
        let now = at(9, 58, 0);
        assert_eq!(status_of(&window(), now), WindowStatus::Upcoming);
        assert_eq!(
            remaining(&window(), now),
            Some(Remaining { hours: 0, minutes: 2 })
        );
    }

    #[test]
    fn test_open_window_counts_to_end() {
        let now = at(9, 0, 0) + chrono::Duration::minutes(75);
        assert_eq!(status_of(&window(), now), WindowStatus::Open);
        assert_eq!(
            remaining(&window(), now),
            Some(Remaining { hours: 0, minutes: 45 })
        );
    }

    #[test]
    fn test_end_is_exclusive() {
        assert_eq!(status_of(&window(), at(10, 0, 0)), WindowStatus::Open);
        assert_eq!(status_of(&window(), at(11, 0, 0)), WindowStatus::Closed);
        assert_eq!(remaining(&window(), at(11, 30, 0)), None);
    }

    #[test]
    fn test_hours_span_more_than_a_day() {
        let now = at(10, 0, 0) - chrono::Duration::hours(26) - chrono::Duration::minutes(3);
        assert_eq!(
            remaining(&window(), now),
            Some(Remaining { hours: 26, minutes: 3 })
        );
    }

    #[test]
    fn test_less_than_a_minute() {
        let now = at(9, 59, 30);
        let left = remaining(&window(), now).unwrap();
        assert!(left.is_zero());
        assert_eq!(
            waiting_for_start_message(left),
            "⏰ До начала розыгрыша осталось менее одной минуты."
        );
        assert_eq!(
            waiting_for_end_message(left),
            "⏰ До окончания розыгрыша осталось менее одной минуты."
        );
    }

    #[test]
    fn test_agree_with_number() {
        let forms = |n| agree_with_number(n, "минута", "минуты", "минут");
        assert_eq!(forms(1), "минута");
        assert_eq!(forms(21), "минута");
        assert_eq!(forms(3), "минуты");
        assert_eq!(forms(44), "минуты");
        assert_eq!(forms(5), "минут");
        assert_eq!(forms(0), "минут");
        assert_eq!(forms(11), "минут");
        assert_eq!(forms(14), "минут");
        assert_eq!(forms(111), "минут");
        assert_eq!(forms(-2), "минуты");
    }

    #[test]
    fn test_hour_word_follows_minute_count() {
        // 1 hour 5 minutes reads "1 часов 5 минут": the hour word is chosen
        // from the minutes value
        let message = waiting_for_start_message(Remaining { hours: 1, minutes: 5 });
        assert_eq!(message, "⏰ До начала розыгрыша осталось 1 часов 5 минут.");

        let message = waiting_for_start_message(Remaining { hours: 0, minutes: 2 });
        assert_eq!(message, "⏰ До начала розыгрыша осталось 0 часа 2 минуты.");
    }

    #[test]
    fn test_end_message_uses_minutes_only() {
        let message = waiting_for_end_message(Remaining { hours: 0, minutes: 4 });
        assert_eq!(message, "⏰ До окончания розыгрыша осталось 4 минуты.");
    }
}
