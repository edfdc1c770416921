use chrono::{DateTime, Utc};
use chrono_tz::Africa::Lubumbashi;
use gloo_timers::callback::Interval;
use web_sys::Document;

use crate::dom;

const TICK_MS: u32 = 1000;

/// Header clock text, always in studio time.
pub fn format_clock(now: DateTime<Utc>) -> String {
    format!("{} GMT+2", now.with_timezone(&Lubumbashi).format("%H:%M:%S"))
}

pub fn install(doc: &Document) {
    let Some(clock) = dom::query(doc, "#live-time") else { return };
    clock.set_text_content(Some(&format_clock(Utc::now())));
    Interval::new(TICK_MS, move || {
        clock.set_text_content(Some(&format_clock(Utc::now())));
    })
    .forget();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn clock_shows_lubumbashi_time() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 5, 9).unwrap();
        assert_eq!(format_clock(now), "12:05:09 GMT+2");
    }

    #[test]
    fn clock_wraps_past_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(format_clock(now), "01:30:00 GMT+2");
    }
}
