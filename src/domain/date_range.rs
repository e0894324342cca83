use chrono::{Duration, NaiveDate};

pub const HISTORY_LOOKBACK_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn ending_on(today: NaiveDate) -> Self {
        Self {
            from: today - Duration::days(HISTORY_LOOKBACK_DAYS),
            to: today,
        }
    }

    pub fn from_param(&self) -> String {
        self.from.format("%Y-%m-%d").to_string()
    }

    pub fn to_param(&self) -> String {
        self.to.format("%Y-%m-%d").to_string()
    }
}
