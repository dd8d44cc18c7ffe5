use crate::data_structures::{BudgetMetrics, DateRange, UsageRecord};
use crate::filter::{exclude_no_charge, filter_by_date_range, ON_DEMAND};
use crate::period::PeriodCalculator;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

/// Cascades a monthly cap into weekly and daily allowances.
///
/// Usage figures are always taken from the whole collection with only the
/// no-charge exclusion applied; table/chart filters never reach this type.
pub struct BudgetCalculator {
    periods: PeriodCalculator,
}

impl BudgetCalculator {
    pub fn new() -> Self {
        Self {
            periods: PeriodCalculator::new(),
        }
    }

    pub fn periods(&self) -> &PeriodCalculator {
        &self.periods
    }

    pub fn calculate_total_cost<'a, I>(&self, records: I) -> f64
    where
        I: IntoIterator<Item = &'a UsageRecord>,
    {
        records.into_iter().map(|record| record.cost()).sum()
    }

    pub fn calculate_on_demand_cost<'a, I>(&self, records: I) -> f64
    where
        I: IntoIterator<Item = &'a UsageRecord>,
    {
        self.calculate_total_cost(
            records
                .into_iter()
                .filter(|record| record.category() == ON_DEMAND),
        )
    }

    /// Chargeable cost of records whose day falls within `range`.
    pub fn calculate_usage_in(&self, records: &[UsageRecord], range: &DateRange) -> f64 {
        let in_range = filter_by_date_range(records, range);
        self.calculate_total_cost(exclude_no_charge(in_range))
    }

    pub fn calculate_billing_period_usage(
        &self,
        records: &[UsageRecord],
        anchor_day: u32,
        today: NaiveDate,
    ) -> f64 {
        self.calculate_usage_in(records, &self.billing_period(anchor_day, today))
    }

    pub fn calculate_work_week_usage(&self, records: &[UsageRecord], today: NaiveDate) -> f64 {
        let range = DateRange::between(
            self.periods.work_week_start(today),
            self.periods.work_week_end(today),
        );
        self.calculate_usage_in(records, &range)
    }

    pub fn calculate_work_day_usage(&self, records: &[UsageRecord], today: NaiveDate) -> f64 {
        let range = DateRange::single_day(self.periods.current_work_day(today));
        self.calculate_usage_in(records, &range)
    }

    /// Remaining monthly budget spread evenly over the remaining work weeks.
    pub fn calculate_weekly_limit(
        &self,
        monthly_limit: f64,
        billing_period_usage: f64,
        weeks_remaining: u32,
    ) -> f64 {
        if weeks_remaining == 0 {
            return 0.0;
        }

        ((monthly_limit - billing_period_usage) / f64::from(weeks_remaining)).max(0.0)
    }

    /// Remaining weekly budget spread evenly over the remaining work days.
    pub fn calculate_daily_limit(
        &self,
        weekly_limit: f64,
        work_week_usage: f64,
        work_days_remaining: u32,
    ) -> f64 {
        if work_days_remaining == 0 {
            return 0.0;
        }

        ((weekly_limit - work_week_usage) / f64::from(work_days_remaining)).max(0.0)
    }

    pub fn compute_budget_metrics(
        &self,
        records: &[UsageRecord],
        anchor_day: u32,
        monthly_limit: Option<f64>,
        now: DateTime<Utc>,
    ) -> BudgetMetrics {
        let today = now.date_naive();
        let period_start = self.periods.billing_period_start(anchor_day, today);
        let period_end = self.periods.billing_period_end(anchor_day, today);
        let period = DateRange::between(period_start, period_end);

        let monthly_usage = self.calculate_usage_in(records, &period);
        let weekly_usage = self.calculate_work_week_usage(records, today);
        let daily_usage = self.calculate_work_day_usage(records, today);

        let (weekly_limit, daily_limit) = match monthly_limit {
            Some(monthly_limit) => {
                let weeks_remaining =
                    self.periods
                        .count_work_weeks_remaining(period_start, period_end, today);
                let weekly_limit =
                    self.calculate_weekly_limit(monthly_limit, monthly_usage, weeks_remaining);

                let days_remaining = self.periods.count_work_days_remaining_in_week(today);
                let daily_limit =
                    self.calculate_daily_limit(weekly_limit, weekly_usage, days_remaining);

                debug!(
                    weeks_remaining,
                    days_remaining, weekly_limit, daily_limit, "Cascaded monthly limit"
                );
                (Some(weekly_limit), Some(daily_limit))
            }
            None => (None, None),
        };

        BudgetMetrics::new(
            monthly_usage,
            monthly_limit,
            weekly_usage,
            weekly_limit,
            daily_usage,
            daily_limit,
        )
    }

    fn billing_period(&self, anchor_day: u32, today: NaiveDate) -> DateRange {
        DateRange::between(
            self.periods.billing_period_start(anchor_day, today),
            self.periods.billing_period_end(anchor_day, today),
        )
    }
}

impl Default for BudgetCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::TokenCounts;
    use crate::filter::{ABORTED_NOT_CHARGED, ERRORED_NO_CHARGE};
    use chrono::TimeZone;

    fn record(y: i32, m: u32, d: u32, cost: f64, category: &str) -> UsageRecord {
        UsageRecord::new(
            Utc.with_ymd_and_hms(y, m, d, 14, 30, 0).unwrap(),
            category,
            "auto",
            "No",
            TokenCounts::default(),
            cost,
        )
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_calculate_total_cost() {
        let calculator = BudgetCalculator::new();
        let records = vec![
            record(2025, 12, 20, 1.5, "Included"),
            record(2025, 12, 21, 2.3, "Included"),
            record(2025, 12, 22, 0.8, "Included"),
        ];
        assert_close(calculator.calculate_total_cost(&records), 4.6);
        assert_eq!(calculator.calculate_total_cost(&Vec::<UsageRecord>::new()), 0.0);
    }

    #[test]
    fn test_calculate_on_demand_cost() {
        let calculator = BudgetCalculator::new();
        let records = vec![
            record(2025, 12, 20, 10.0, "Included"),
            record(2025, 12, 21, 5.0, "On-Demand"),
            record(2025, 12, 22, 15.0, "On-Demand"),
        ];
        assert_close(calculator.calculate_on_demand_cost(&records), 20.0);
    }

    #[test]
    fn test_weekly_limit() {
        let calculator = BudgetCalculator::new();
        assert_close(calculator.calculate_weekly_limit(100.0, 40.0, 4), 15.0);
        assert_eq!(calculator.calculate_weekly_limit(100.0, 40.0, 0), 0.0);
        assert_eq!(calculator.calculate_weekly_limit(100.0, 140.0, 4), 0.0);
    }

    #[test]
    fn test_daily_limit() {
        let calculator = BudgetCalculator::new();
        assert_close(calculator.calculate_daily_limit(15.0, 5.0, 4), 2.5);
        assert_eq!(calculator.calculate_daily_limit(15.0, 5.0, 0), 0.0);
        assert_eq!(calculator.calculate_daily_limit(15.0, 20.0, 2), 0.0);
    }

    #[test]
    fn test_billing_period_usage_excludes_no_charge() {
        let calculator = BudgetCalculator::new();
        let records = vec![
            record(2025, 12, 16, 10.0, "Included"),
            record(2025, 12, 17, 5.0, ERRORED_NO_CHARGE),
            record(2025, 12, 18, 15.0, "On-Demand"),
            record(2025, 12, 19, 7.0, ABORTED_NOT_CHARGED),
            record(2025, 12, 14, 100.0, "Included"),
            record(2026, 1, 15, 100.0, "Included"),
        ];
        let usage = calculator.calculate_billing_period_usage(&records, 15, day(2025, 12, 20));
        assert_close(usage, 25.0);
    }

    #[test]
    fn test_work_week_and_day_usage() {
        let calculator = BudgetCalculator::new();
        let records = vec![
            record(2025, 12, 19, 50.0, "Included"),
            record(2025, 12, 22, 1.0, "Included"),
            record(2025, 12, 24, 2.0, "Included"),
            record(2025, 12, 26, 3.0, "Included"),
            record(2025, 12, 27, 4.0, "Included"),
        ];
        // Saturday: week is Mon 22 .. Fri 26, work day is Fri 26.
        let today = day(2025, 12, 27);
        assert_close(calculator.calculate_work_week_usage(&records, today), 6.0);
        assert_close(calculator.calculate_work_day_usage(&records, today), 3.0);
    }

    #[test]
    fn test_metrics_without_limit() {
        let calculator = BudgetCalculator::new();
        let records = vec![record(2025, 12, 17, 12.0, "Included")];
        let now = Utc.with_ymd_and_hms(2025, 12, 17, 18, 0, 0).unwrap();

        let metrics = calculator.compute_budget_metrics(&records, 1, None, now);
        assert_close(metrics.monthly_usage(), 12.0);
        assert_close(metrics.weekly_usage(), 12.0);
        assert_close(metrics.daily_usage(), 12.0);
        assert_eq!(metrics.monthly_limit(), None);
        assert_eq!(metrics.weekly_limit(), None);
        assert_eq!(metrics.daily_limit(), None);
    }

    #[test]
    fn test_metrics_cascade_from_remaining_budget() {
        let calculator = BudgetCalculator::new();
        let records = vec![
            record(2025, 12, 2, 20.0, "Included"),
            record(2025, 12, 15, 4.0, "On-Demand"),
            record(2025, 12, 17, 6.0, "Included"),
            record(2025, 12, 17, 9.0, ERRORED_NO_CHARGE),
        ];
        // Wednesday 17 December: weeks of 15, 22 and 29 December remain.
        let now = Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap();

        let metrics = calculator.compute_budget_metrics(&records, 1, Some(120.0), now);
        assert_close(metrics.monthly_usage(), 30.0);
        assert_close(metrics.weekly_usage(), 10.0);
        assert_close(metrics.daily_usage(), 6.0);
        assert_eq!(metrics.monthly_limit(), Some(120.0));
        // (120 - 30) / 3 weeks = 30; (30 - 10) / 3 days (Wed..Fri).
        assert_close(metrics.weekly_limit().unwrap(), 30.0);
        assert_close(metrics.daily_limit().unwrap(), 20.0 / 3.0);
    }

    #[test]
    fn test_metrics_over_budget_never_negative() {
        let calculator = BudgetCalculator::new();
        let records = vec![record(2025, 12, 17, 500.0, "Included")];
        let now = Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap();

        let metrics = calculator.compute_budget_metrics(&records, 1, Some(100.0), now);
        assert_eq!(metrics.weekly_limit(), Some(0.0));
        assert_eq!(metrics.daily_limit(), Some(0.0));
    }

    #[test]
    fn test_metrics_are_idempotent() {
        let calculator = BudgetCalculator::new();
        let records = vec![
            record(2025, 12, 16, 10.0, "Included"),
            record(2025, 12, 18, 15.0, "On-Demand"),
        ];
        let now = Utc.with_ymd_and_hms(2025, 12, 20, 9, 0, 0).unwrap();

        let first = calculator.compute_budget_metrics(&records, 15, Some(200.0), now);
        let second = calculator.compute_budget_metrics(&records, 15, Some(200.0), now);
        assert_eq!(first, second);
    }
}
