//! Business hours and slot arithmetic (local naive time)

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Length of every appointment
pub const SLOT_MINUTES: i64 = 60;

/// A busy period reported by the calendar, in local naive time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BusyInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Half-open overlap with `[start, end)`
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && start < self.end
    }
}

/// Daily window in which appointments can start and end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl BusinessHours {
    /// Opening and closing instants for `date`
    pub fn window(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (date.and_time(self.open), date.and_time(self.close))
    }

    /// Slot `[start, start+1h)` lies fully inside the window
    pub fn contains_slot(&self, start: NaiveDateTime) -> bool {
        let (open, close) = self.window(start.date());
        start >= open && slot_end(start) <= close
    }

    /// Every hourly slot start of the day
    pub fn slot_starts(&self, date: NaiveDate) -> Vec<NaiveDateTime> {
        let (open, close) = self.window(date);
        let mut slots = Vec::new();
        let mut cur = open;
        while slot_end(cur) <= close {
            slots.push(cur);
            cur = slot_end(cur);
        }
        slots
    }
}

/// Round down to the top of the hour
pub fn floor_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

pub fn slot_end(start: NaiveDateTime) -> NaiveDateTime {
    start + Duration::minutes(SLOT_MINUTES)
}

/// No busy interval touches `[start, start+1h)`
pub fn slot_is_free(start: NaiveDateTime, busy: &[BusyInterval]) -> bool {
    let end = slot_end(start);
    !busy.iter().any(|b| b.overlaps(start, end))
}

/// Hourly slot starts in business hours with no overlap
pub fn free_slots(hours: &BusinessHours, date: NaiveDate, busy: &[BusyInterval]) -> Vec<NaiveDateTime> {
    hours
        .slot_starts(date)
        .into_iter()
        .filter(|s| slot_is_free(*s, busy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 21)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_floor_to_hour() {
        assert_eq!(floor_to_hour(t(15, 30)), t(15, 0));
        assert_eq!(floor_to_hour(t(9, 0)), t(9, 0));
    }

    #[test]
    fn test_contains_slot() {
        let hours = BusinessHours::default();
        assert!(hours.contains_slot(t(9, 0)));
        assert!(hours.contains_slot(t(17, 0)));
        assert!(!hours.contains_slot(t(8, 0)));
        assert!(!hours.contains_slot(t(18, 0)));
        assert!(!hours.contains_slot(t(17, 30)));
        assert!(!hours.contains_slot(t(23, 0)));
        assert!(!hours.contains_slot(t(0, 0)));
    }

    #[test]
    fn test_half_open_overlap() {
        let busy = [BusyInterval::new(t(10, 0), t(11, 0))];
        assert!(slot_is_free(t(9, 0), &busy)); // ends exactly when busy starts
        assert!(!slot_is_free(t(10, 0), &busy));
        assert!(slot_is_free(t(11, 0), &busy)); // starts exactly when busy ends

        let partial = [BusyInterval::new(t(14, 30), t(14, 45))];
        assert!(!slot_is_free(t(14, 0), &partial));

        let spanning = [BusyInterval::new(t(12, 0), t(16, 0))];
        assert!(!slot_is_free(t(13, 0), &spanning));
    }

    #[test]
    fn test_free_slots() {
        let hours = BusinessHours::default();
        let date = t(0, 0).date();
        assert_eq!(hours.slot_starts(date).len(), 9);

        let busy = [
            BusyInterval::new(t(9, 0), t(10, 0)),
            BusyInterval::new(t(12, 15), t(13, 15)),
        ];
        let free: Vec<String> = free_slots(&hours, date, &busy)
            .iter()
            .map(|s| s.format("%H:%M").to_string())
            .collect();
        assert_eq!(free, vec!["10:00", "11:00", "14:00", "15:00", "16:00", "17:00"]);
    }
}
