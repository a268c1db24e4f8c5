//! Calendar features derived from the order time.

use chrono::{Datelike, Timelike};
use returns_core::{BasketTable, CalendarFeatures, Timestamp};
use tracing::debug;

/// Derives month, weekday, hour, quarter and weekend flag per order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalFeatureBuilder;

impl TemporalFeatureBuilder {
    /// Calendar fields for one timestamp.
    pub fn calendar(ts: &Timestamp) -> CalendarFeatures {
        let month = ts.month();
        let weekday = ts.weekday().num_days_from_monday();
        CalendarFeatures {
            month,
            weekday,
            hour: ts.hour(),
            quarter: (month - 1) / 3 + 1,
            is_weekend: weekday >= 5,
        }
    }

    /// Attach calendar fields to every row with a known order time.
    pub fn apply(&self, mut table: BasketTable) -> BasketTable {
        let mut missing = 0usize;
        for row in &mut table.rows {
            row.calendar = row.order.invoice_date.as_ref().map(Self::calendar);
            if row.calendar.is_none() {
                missing += 1;
            }
        }
        debug!(rows = table.len(), missing, "Calendar features computed");
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use returns_core::parse_timestamp;

    #[test]
    fn test_weekday_calendar() {
        // Wednesday
        let ts = parse_timestamp("2010-12-01 08:26:00").unwrap();
        let cal = TemporalFeatureBuilder::calendar(&ts);
        assert_eq!(cal.month, 12);
        assert_eq!(cal.weekday, 2);
        assert_eq!(cal.hour, 8);
        assert_eq!(cal.quarter, 4);
        assert!(!cal.is_weekend);
    }

    #[test]
    fn test_weekend_flags() {
        // 2011-01-08 is a Saturday, 2011-01-09 a Sunday.
        let sat = TemporalFeatureBuilder::calendar(&parse_timestamp("2011-01-08 23:59:00").unwrap());
        let sun = TemporalFeatureBuilder::calendar(&parse_timestamp("2011-01-09 00:00:00").unwrap());
        let mon = TemporalFeatureBuilder::calendar(&parse_timestamp("2011-01-10 00:00:00").unwrap());
        assert_eq!((sat.weekday, sat.is_weekend), (5, true));
        assert_eq!((sun.weekday, sun.is_weekend), (6, true));
        assert_eq!((mon.weekday, mon.is_weekend), (0, false));
        assert_eq!(sat.hour, 23);
    }

    #[test]
    fn test_quarter_boundaries() {
        let cases = [
            ("2011-01-01", 1),
            ("2011-03-31", 1),
            ("2011-04-01", 2),
            ("2011-06-30", 2),
            ("2011-07-01", 3),
            ("2011-09-30", 3),
            ("2011-10-01", 4),
            ("2011-12-31", 4),
        ];
        for (date, quarter) in cases {
            let cal = TemporalFeatureBuilder::calendar(&parse_timestamp(date).unwrap());
            assert_eq!(cal.quarter, quarter, "{date}");
        }
    }
}
