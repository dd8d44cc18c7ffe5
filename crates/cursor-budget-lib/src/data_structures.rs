use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    input_with_cache_write: u64,
    input_without_cache_write: u64,
    cache_read: u64,
    output_tokens: u64,
    total_tokens: u64,
}

impl TokenCounts {
    pub fn new(
        input_with_cache_write: u64,
        input_without_cache_write: u64,
        cache_read: u64,
        output_tokens: u64,
        total_tokens: u64,
    ) -> Self {
        Self {
            input_with_cache_write,
            input_without_cache_write,
            cache_read,
            output_tokens,
            total_tokens,
        }
    }

    pub fn add(&mut self, other: &TokenCounts) {
        self.input_with_cache_write += other.input_with_cache_write;
        self.input_without_cache_write += other.input_without_cache_write;
        self.cache_read += other.cache_read;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }

    pub fn input_with_cache_write(&self) -> u64 {
        self.input_with_cache_write
    }

    pub fn input_without_cache_write(&self) -> u64 {
        self.input_without_cache_write
    }

    pub fn cache_read(&self) -> u64 {
        self.cache_read
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    /// Total as reported by the export, not recomputed from the parts.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }
}

/// One usage event from the export. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredUsageRecord")]
pub struct UsageRecord {
    date: DateTime<Utc>,
    category: String,
    model: String,
    max_mode: String,
    tokens: TokenCounts,
    cost: f64,
}

impl UsageRecord {
    pub fn new(
        date: DateTime<Utc>,
        category: impl Into<String>,
        model: impl Into<String>,
        max_mode: impl Into<String>,
        tokens: TokenCounts,
        cost: f64,
    ) -> Self {
        Self {
            date,
            category: category.into(),
            model: model.into(),
            max_mode: max_mode.into(),
            tokens,
            cost: if cost.is_finite() { cost.max(0.0) } else { 0.0 },
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Calendar day of the event; all filtering and bucketing use this.
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_mode(&self) -> &str {
        &self.max_mode
    }

    pub fn tokens(&self) -> &TokenCounts {
        &self.tokens
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }
}

/// Inclusive day range; an absent bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self::between(day, day)
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        if let Some(start) = self.start {
            if day < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if day > end {
                return false;
            }
        }
        true
    }
}

/// Snapshot form of [`UsageRecord`]; restored values go through `UsageRecord::new`.
#[derive(Deserialize)]
struct StoredUsageRecord {
    date: DateTime<Utc>,
    category: String,
    model: String,
    max_mode: String,
    tokens: TokenCounts,
    cost: f64,
}

impl From<StoredUsageRecord> for UsageRecord {
    fn from(stored: StoredUsageRecord) -> Self {
        Self::new(
            stored.date,
            stored.category,
            stored.model,
            stored.max_mode,
            stored.tokens,
            stored.cost,
        )
    }
}

/// User-selected table/chart filters. Absent means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    date_range: DateRange,
    model: Option<String>,
    category: Option<String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn set_model(&mut self, model: Option<String>) {
        self.model = model;
    }

    pub fn set_category(&mut self, category: Option<String>) {
        self.category = category;
    }

    pub fn date_range(&self) -> &DateRange {
        &self.date_range
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    billing_period_day: u32,
    monthly_cost_limit: Option<f64>,
}

impl Settings {
    pub const DEFAULT_BILLING_PERIOD_DAY: u32 = 1;

    pub fn new(billing_period_day: u32, monthly_cost_limit: Option<f64>) -> Self {
        Self {
            billing_period_day,
            monthly_cost_limit,
        }
    }

    pub fn billing_period_day(&self) -> u32 {
        self.billing_period_day
    }

    pub fn monthly_cost_limit(&self) -> Option<f64> {
        self.monthly_cost_limit
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BILLING_PERIOD_DAY, None)
    }
}

/// Derived budget figures for the current billing period, work week and work day.
///
/// The weekly and daily limits are present exactly when a monthly limit is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetMetrics {
    monthly_usage: f64,
    monthly_limit: Option<f64>,
    weekly_usage: f64,
    weekly_limit: Option<f64>,
    daily_usage: f64,
    daily_limit: Option<f64>,
}

impl BudgetMetrics {
    pub fn new(
        monthly_usage: f64,
        monthly_limit: Option<f64>,
        weekly_usage: f64,
        weekly_limit: Option<f64>,
        daily_usage: f64,
        daily_limit: Option<f64>,
    ) -> Self {
        Self {
            monthly_usage,
            monthly_limit,
            weekly_usage,
            weekly_limit,
            daily_usage,
            daily_limit,
        }
    }

    pub fn monthly_usage(&self) -> f64 {
        self.monthly_usage
    }

    pub fn monthly_limit(&self) -> Option<f64> {
        self.monthly_limit
    }

    pub fn weekly_usage(&self) -> f64 {
        self.weekly_usage
    }

    pub fn weekly_limit(&self) -> Option<f64> {
        self.weekly_limit
    }

    pub fn daily_usage(&self) -> f64 {
        self.daily_usage
    }

    pub fn daily_limit(&self) -> Option<f64> {
        self.daily_limit
    }

    pub fn monthly_percentage(&self) -> f64 {
        percentage(self.monthly_usage, self.monthly_limit)
    }

    pub fn weekly_percentage(&self) -> f64 {
        percentage(self.weekly_usage, self.weekly_limit)
    }

    pub fn daily_percentage(&self) -> f64 {
        percentage(self.daily_usage, self.daily_limit)
    }
}

fn percentage(usage: f64, limit: Option<f64>) -> f64 {
    match limit {
        Some(limit) if limit > 0.0 => (usage / limit * 100.0).min(100.0),
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyCostPoint {
    day: NaiveDate,
    daily_cost: f64,
    cumulative_cost: f64,
}

impl DailyCostPoint {
    pub fn new(day: NaiveDate, daily_cost: f64, cumulative_cost: f64) -> Self {
        Self {
            day,
            daily_cost,
            cumulative_cost,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn daily_cost(&self) -> f64 {
        self.daily_cost
    }

    pub fn cumulative_cost(&self) -> f64 {
        self.cumulative_cost
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostSummary {
    total_cost: f64,
    on_demand_cost: f64,
    record_count: usize,
}

impl CostSummary {
    pub fn new(total_cost: f64, on_demand_cost: f64, record_count: usize) -> Self {
        Self {
            total_cost,
            on_demand_cost,
            record_count,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn on_demand_cost(&self) -> f64 {
        self.on_demand_cost
    }

    /// Records counted in `total_cost`.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelBreakdown {
    model: String,
    tokens: TokenCounts,
    cost: f64,
    record_count: usize,
}

impl ModelBreakdown {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn add_record(&mut self, record: &UsageRecord) {
        self.tokens.add(record.tokens());
        self.cost += record.cost();
        self.record_count += 1;
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tokens(&self) -> &TokenCounts {
        &self.tokens
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_record_day_strips_time() {
        let date = Utc.with_ymd_and_hms(2025, 12, 28, 23, 59, 59).unwrap();
        let record = UsageRecord::new(date, "Included", "auto", "No", TokenCounts::default(), 1.0);
        assert_eq!(record.day(), day(2025, 12, 28));
    }

    #[test]
    fn test_negative_cost_is_clamped() {
        let date = Utc.with_ymd_and_hms(2025, 12, 28, 0, 0, 0).unwrap();
        let record = UsageRecord::new(date, "Included", "auto", "No", TokenCounts::default(), -3.0);
        assert_eq!(record.cost(), 0.0);
    }

    #[test]
    fn test_restored_negative_cost_is_clamped() {
        let json = r#"{
            "date": "2025-12-28T12:05:02.926Z",
            "category": "Included",
            "model": "auto",
            "max_mode": "No",
            "tokens": {
                "input_with_cache_write": 1,
                "input_without_cache_write": 2,
                "cache_read": 3,
                "output_tokens": 4,
                "total_tokens": 10
            },
            "cost": -7.5
        }"#;

        let record: UsageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.cost(), 0.0);
        assert_eq!(record.model(), "auto");
        assert_eq!(record.tokens().total_tokens(), 10);
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let range = DateRange::between(day(2025, 12, 21), day(2025, 12, 22));
        assert!(!range.contains(day(2025, 12, 20)));
        assert!(range.contains(day(2025, 12, 21)));
        assert!(range.contains(day(2025, 12, 22)));
        assert!(!range.contains(day(2025, 12, 23)));
    }

    #[test]
    fn test_open_date_range() {
        let range = DateRange::new(None, Some(day(2025, 1, 1)));
        assert!(range.contains(day(1999, 1, 1)));
        assert!(!range.contains(day(2025, 1, 2)));
        assert!(DateRange::default().is_unbounded());
    }

    #[test]
    fn test_budget_percentages() {
        let metrics = BudgetMetrics::new(50.0, Some(100.0), 30.0, Some(20.0), 1.0, Some(0.0));
        assert_eq!(metrics.monthly_percentage(), 50.0);
        assert_eq!(metrics.weekly_percentage(), 100.0);
        assert_eq!(metrics.daily_percentage(), 0.0);

        let unset = BudgetMetrics::new(50.0, None, 0.0, None, 0.0, None);
        assert_eq!(unset.monthly_percentage(), 0.0);
    }

    #[test]
    fn test_token_counts_add() {
        let mut counts = TokenCounts::new(1, 2, 3, 4, 10);
        counts.add(&TokenCounts::new(10, 20, 30, 40, 100));
        assert_eq!(counts.input_with_cache_write(), 11);
        assert_eq!(counts.output_tokens(), 44);
        assert_eq!(counts.total_tokens(), 110);
    }
}
