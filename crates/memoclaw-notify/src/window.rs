//! Delay window controller — spreads a slot's sends randomly inside its
//! configured clock-time window.

use chrono::NaiveDateTime;
use rand::Rng;

use memoclaw_core::config::Window;
use memoclaw_core::error::Result;

/// Seconds to wait before this slot's batch starts.
///
/// Before the window: wait until the window opens plus a random offset
/// inside it. Inside the window: a random offset up to the window's end.
/// After the window: send immediately. Test mode ignores the window and
/// waits 1–5 seconds so verification runs stay fast.
pub fn compute_delay(window: &Window, now: NaiveDateTime, test_mode: bool) -> Result<u64> {
    if test_mode {
        return Ok(rand::thread_rng().gen_range(1..=5));
    }

    let (start, end) = window.bounds()?;
    let start = now.date().and_time(start);
    let end = now.date().and_time(end);

    let mut rng = rand::thread_rng();
    let delay = if now < start {
        let until_start = (start - now).num_seconds() as u64;
        let span = (end - start).num_seconds() as u64;
        until_start + rng.gen_range(0..=span)
    } else if now < end {
        let remaining = (end - now).num_seconds() as u64;
        rng.gen_range(0..=remaining)
    } else {
        0
    };
    Ok(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window(start: &str, end: &str) -> Window {
        Window {
            start: start.into(),
            end: end.into(),
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_before_window_lands_inside_it() {
        let w = window("09:00", "10:00");
        for _ in 0..50 {
            let delay = compute_delay(&w, at(8, 0), false).unwrap();
            // At least until 09:00, at most until 10:00.
            assert!((3600..=7200).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_inside_window_stays_before_end() {
        let w = window("09:00", "10:00");
        for _ in 0..50 {
            let delay = compute_delay(&w, at(9, 30), false).unwrap();
            assert!(delay <= 1800, "delay {delay} past window end");
        }
    }

    #[test]
    fn test_after_window_sends_immediately() {
        let w = window("09:00", "10:00");
        assert_eq!(compute_delay(&w, at(10, 0), false).unwrap(), 0);
        assert_eq!(compute_delay(&w, at(23, 59), false).unwrap(), 0);
    }

    #[test]
    fn test_test_mode_is_one_to_five_seconds() {
        let w = window("09:00", "10:00");
        for _ in 0..50 {
            let delay = compute_delay(&w, at(3, 0), true).unwrap();
            assert!((1..=5).contains(&delay));
        }
    }

    #[test]
    fn test_zero_length_window() {
        let w = window("09:00", "09:00");
        assert_eq!(compute_delay(&w, at(9, 0), false).unwrap(), 0);
        let delay = compute_delay(&w, at(8, 59), false).unwrap();
        assert_eq!(delay, 60);
    }
}
