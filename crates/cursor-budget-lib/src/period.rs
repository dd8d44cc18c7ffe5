//! Calendar arithmetic for billing periods and Monday–Friday work weeks.
//!
//! Every function takes the reference day explicitly; nothing here reads the
//! clock. Results are calendar days, so "midnight-aligned" is implicit.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub struct PeriodCalculator;

impl PeriodCalculator {
    pub fn new() -> Self {
        Self
    }

    /// First day of the current billing period.
    ///
    /// Before the anchor day the period started in the previous month. The
    /// resulting date is clamped to the length of its month, so an anchor of
    /// 31 starts February's period on its last day.
    pub fn billing_period_start(&self, anchor_day: u32, today: NaiveDate) -> NaiveDate {
        let anchor = anchor_day.clamp(1, 31);

        let (year, month) = if today.day() < anchor {
            previous_month(today.year(), today.month())
        } else {
            (today.year(), today.month())
        };

        NaiveDate::from_ymd_opt(year, month, anchor.min(days_in_month(year, month)))
            .unwrap_or(today)
    }

    /// Last day of the billing period containing `today`.
    pub fn billing_period_end(&self, anchor_day: u32, today: NaiveDate) -> NaiveDate {
        let start = self.billing_period_start(anchor_day, today);
        let next_start = self.billing_period_start(anchor_day, start + Duration::days(32));
        next_start.pred_opt().unwrap_or(next_start)
    }

    pub fn month_start(&self, today: NaiveDate) -> NaiveDate {
        today.with_day(1).unwrap_or(today)
    }

    pub fn is_work_day(&self, day: NaiveDate) -> bool {
        !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Monday on or before `today`; weekends belong to the week just ended.
    pub fn work_week_start(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
    }

    /// Friday of the work week containing `today`.
    pub fn work_week_end(&self, today: NaiveDate) -> NaiveDate {
        self.work_week_start(today) + Duration::days(4)
    }

    /// `today` if it is a work day, otherwise the Friday before it.
    pub fn current_work_day(&self, today: NaiveDate) -> NaiveDate {
        match today.weekday() {
            Weekday::Sat => today - Duration::days(1),
            Weekday::Sun => today - Duration::days(2),
            _ => today,
        }
    }

    /// Work days in `[start, end]`, both ends inclusive. Empty ranges count 0.
    pub fn count_work_days(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        if end < start {
            return 0;
        }

        let span = (end - start).num_days() + 1;
        let full_weeks = span / 7;
        let mut count = full_weeks * 5;

        let mut day = start + Duration::days(full_weeks * 7);
        while day <= end {
            if self.is_work_day(day) {
                count += 1;
            }
            day += Duration::days(1);
        }

        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Work days left this week, counting the current work day itself.
    pub fn count_work_days_remaining_in_week(&self, today: NaiveDate) -> u32 {
        self.count_work_days(self.current_work_day(today), self.work_week_end(today))
    }

    /// Work weeks left in the billing period, the current one included.
    ///
    /// Counting starts at the later of this week's Monday and the period
    /// start. A week counts when its Friday falls on or after that point and
    /// its Monday falls on or before `period_end`.
    pub fn count_work_weeks_remaining(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
        today: NaiveDate,
    ) -> u32 {
        let effective_start = self.work_week_start(today).max(period_start);
        if period_end < effective_start {
            return 0;
        }

        let mut first_monday = self.work_week_start(effective_start);
        if first_monday + Duration::days(4) < effective_start {
            first_monday += Duration::days(7);
        }
        let last_monday = self.work_week_start(period_end);

        if last_monday < first_monday {
            return 0;
        }

        let weeks = (last_monday - first_monday).num_days() / 7 + 1;
        u32::try_from(weeks).unwrap_or(u32::MAX)
    }
}

impl Default for PeriodCalculator {
    fn default() -> Self {
        Self::new()
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if NaiveDate::from_ymd_opt(year, 2, 29).is_some() => 29,
        2 => 28,
        _ => 31,
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}
