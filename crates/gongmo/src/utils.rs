use chrono::{Datelike, Days, NaiveDate};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Start date ({start}) must be before end date ({end})")]
    Empty { start: NaiveDate, end: NaiveDate },
    #[error("Year {0} is out of range")]
    InvalidYear(i32),
    #[error("Days ahead ({0}) is too large")]
    TooFarAhead(u64),
}

/// Half-open range of calendar days `[start, end)` covered by one crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Everything from January 1st of `start_year` up to, not including, `today`.
    pub fn full(start_year: i32, today: NaiveDate) -> Result<Self, WindowError> {
        let start =
            NaiveDate::from_ymd_opt(start_year, 1, 1).ok_or(WindowError::InvalidYear(start_year))?;
        Self::new(start, today).validate()
    }

    /// `date` and the `days_ahead` days after it, both ends included.
    pub fn daily(date: NaiveDate, days_ahead: u64) -> Result<Self, WindowError> {
        let end = date
            .checked_add_days(Days::new(days_ahead.saturating_add(1)))
            .ok_or(WindowError::TooFarAhead(days_ahead))?;
        Self::new(date, end).validate()
    }

    /// A single calendar month.
    pub fn month(year: i32, month: u32) -> Result<Self, WindowError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or(WindowError::InvalidYear(year))?;
        let end = start
            .checked_add_months(chrono::Months::new(1))
            .ok_or(WindowError::InvalidYear(year))?;
        Self::new(start, end).validate()
    }

    pub fn validate(self) -> Result<Self, WindowError> {
        if self.start >= self.end {
            return Err(WindowError::Empty {
                start: self.start,
                end: self.end,
            });
        }
        Ok(self)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Last day inside the window.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.end)
    }

    /// `(year, month)` of every calendar page the window touches, in order.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let last = self.last_day();
        let mut months = Vec::new();
        let (mut year, mut month) = (self.start.year(), self.start.month());

        while (year, month) <= (last.year(), last.month()) {
            months.push((year, month));
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        months
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ~ {}", self.start, self.last_day())
    }
}
