use crate::aggregator::Aggregator;
use crate::calculator::BudgetCalculator;
use crate::data_structures::{
    BudgetMetrics, CostSummary, DailyCostPoint, DateRange, Filters, ModelBreakdown, Settings,
    UsageRecord,
};
use crate::filter::{unique_categories, unique_models};
use crate::loader::DataLoader;
use crate::store::{BudgetStore, SettingsStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info};

/// One budgeting session: the record collection, its settings and the engines
/// that read them.
pub struct UsageMonitor<S: SettingsStore> {
    records: Vec<UsageRecord>,
    store: BudgetStore<S>,
    loader: DataLoader,
    calculator: BudgetCalculator,
    aggregator: Aggregator,
}

impl<S: SettingsStore> UsageMonitor<S> {
    pub fn new(store: S) -> Self {
        Self {
            records: Vec::new(),
            store: BudgetStore::new(store),
            loader: DataLoader::new(),
            calculator: BudgetCalculator::new(),
            aggregator: Aggregator::new(),
        }
    }

    /// Reloads the persisted record snapshot, if any. Returns the record count.
    pub fn restore(&mut self) -> usize {
        self.records = self.store.load_records().unwrap_or_default();
        debug!(records = self.records.len(), "Restored session");
        self.records.len()
    }

    pub fn load_str(&mut self, content: &str) -> Result<usize> {
        let records = self
            .loader
            .parse_str(content)
            .context("Failed to parse usage export")?;
        self.replace_records(records)
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let records = self
            .loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load usage export {}", path.display()))?;
        self.replace_records(records)
    }

    /// Persists `records` first, so a failed save keeps the current collection.
    fn replace_records(&mut self, records: Vec<UsageRecord>) -> Result<usize> {
        self.store
            .save_records(&records)
            .context("Failed to save record snapshot")?;
        self.records = records;
        info!(records = self.records.len(), "Loaded usage records");
        Ok(self.records.len())
    }

    pub fn clear_data(&mut self) -> Result<()> {
        self.store
            .delete_records()
            .context("Failed to delete record snapshot")?;
        self.records.clear();
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        self.store.settings()
    }

    pub fn set_billing_period_day(&mut self, day: u32) -> Result<()> {
        self.store
            .set_billing_period_day(day)
            .context("Failed to save billing period day")
    }

    pub fn set_monthly_cost_limit(&mut self, limit: Option<f64>) -> Result<()> {
        self.store
            .set_monthly_cost_limit(limit)
            .context("Failed to save monthly cost limit")
    }

    /// Budget figures for `now`, over the whole collection regardless of filters.
    pub fn budget_metrics(&self, now: DateTime<Utc>) -> BudgetMetrics {
        let settings = self.settings();
        self.calculator.compute_budget_metrics(
            &self.records,
            settings.billing_period_day(),
            settings.monthly_cost_limit(),
            now,
        )
    }

    /// Current billing period up to today, with no model or category filter.
    pub fn default_filters(&self, now: DateTime<Utc>) -> Filters {
        let today = now.date_naive();
        let start = self
            .calculator
            .periods()
            .billing_period_start(self.settings().billing_period_day(), today);
        Filters::new().with_date_range(DateRange::between(start, today))
    }

    pub fn daily_series(&self, filters: &Filters) -> Vec<DailyCostPoint> {
        self.aggregator
            .filtered_daily_series(&self.records, filters)
    }

    pub fn cost_summary(&self, filters: &Filters) -> CostSummary {
        self.aggregator.cost_summary(&self.records, filters)
    }

    pub fn model_breakdown(&self, filters: &Filters) -> Vec<ModelBreakdown> {
        self.aggregator.model_breakdown(&self.records, filters)
    }

    pub fn unique_models(&self) -> Vec<String> {
        unique_models(&self.records)
    }

    pub fn unique_categories(&self) -> Vec<String> {
        unique_categories(&self.records)
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_store(self) -> S {
        self.store.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::store::{JsonFileStore, MemoryStore};
    use chrono::{NaiveDate, TimeZone};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const HEADER: &str = "Date,Kind,Model,Max Mode,Input (w/ Cache Write),Input (w/o Cache Write),Cache Read,Output Tokens,Total Tokens,Cost";

    fn export() -> String {
        [
            HEADER,
            "2025-12-18T10:00:00.000Z,On-Demand,gpt-5,No,0,10,0,5,15,15",
            "2025-12-17T10:00:00.000Z,\"Errored, No Charge\",auto,No,0,0,0,0,0,5",
            "2025-12-16T10:00:00.000Z,Included,auto,No,100,20,300,40,460,10",
        ]
        .join("\n")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_monitor() {
        let monitor = UsageMonitor::new(MemoryStore::new());
        assert!(monitor.is_empty());
        assert_eq!(monitor.entry_count(), 0);
        assert_eq!(monitor.settings(), Settings::default());
    }

    #[test]
    fn test_load_str_preserves_order() {
        let mut monitor = UsageMonitor::new(MemoryStore::new());
        assert_eq!(monitor.load_str(&export()).unwrap(), 3);

        let days: Vec<u32> = monitor
            .records()
            .iter()
            .map(|r| chrono::Datelike::day(&r.day()))
            .collect();
        assert_eq!(days, vec![18, 17, 16]);
    }

    #[test]
    fn test_no_charge_excluded_from_totals_and_budget() {
        let mut monitor = UsageMonitor::new(MemoryStore::new());
        monitor.load_str(&export()).unwrap();
        monitor.set_billing_period_day(15).unwrap();

        let metrics = monitor.budget_metrics(now());
        assert_eq!(metrics.monthly_usage(), 25.0);

        let summary = monitor.cost_summary(&Filters::new());
        assert_eq!(summary.total_cost(), 25.0);
        assert_eq!(summary.on_demand_cost(), 15.0);

        let errored = Filters::new().with_category(Some("Errored, No Charge".to_string()));
        assert_eq!(monitor.cost_summary(&errored).total_cost(), 5.0);
    }

    #[test]
    fn test_budget_metrics_ignore_filters() {
        let mut monitor = UsageMonitor::new(MemoryStore::new());
        monitor.load_str(&export()).unwrap();
        monitor.set_monthly_cost_limit(Some(100.0)).unwrap();

        let before = monitor.budget_metrics(now());
        let _ = monitor.daily_series(&Filters::new().with_model(Some("gpt-5".to_string())));
        assert_eq!(monitor.budget_metrics(now()), before);
        assert_eq!(before.monthly_limit(), Some(100.0));
    }

    #[test]
    fn test_default_filters_cover_current_period() {
        let mut monitor = UsageMonitor::new(MemoryStore::new());
        monitor.set_billing_period_day(15).unwrap();

        let filters = monitor.default_filters(now());
        assert_eq!(
            *filters.date_range(),
            DateRange::between(
                NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
                NaiveDate::from_ymd_opt(2025, 12, 20).unwrap()
            )
        );
        assert_eq!(filters.model(), None);
        assert_eq!(filters.category(), None);
    }

    #[test]
    fn test_failed_parse_keeps_previous_records() {
        let mut monitor = UsageMonitor::new(MemoryStore::new());
        monitor.load_str(&export()).unwrap();

        let err = monitor.load_str(HEADER).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParseError>(),
            Some(ParseError::EmptyOrHeaderOnly)
        ));
        assert_eq!(monitor.entry_count(), 3);

        let store = monitor.into_store();
        let mut restored = UsageMonitor::new(store);
        assert_eq!(restored.restore(), 3);
    }

    #[test]
    fn test_restore_round_trip() {
        let mut monitor = UsageMonitor::new(MemoryStore::new());
        monitor.load_str(&export()).unwrap();
        let saved = monitor.records().to_vec();

        let mut restored = UsageMonitor::new(monitor.into_store());
        restored.restore();
        assert_eq!(restored.records(), saved.as_slice());
    }

    #[test]
    fn test_load_file_with_json_store() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("store.json");
        let mut export_file = NamedTempFile::new().unwrap();
        export_file.write_all(export().as_bytes()).unwrap();

        let mut monitor = UsageMonitor::new(JsonFileStore::open(&store_path).unwrap());
        monitor.load_file(export_file.path()).unwrap();
        assert_eq!(monitor.unique_models(), vec!["auto", "gpt-5"]);
        assert_eq!(
            monitor.unique_categories(),
            vec!["Errored, No Charge", "Included", "On-Demand"]
        );

        let mut reopened = UsageMonitor::new(JsonFileStore::open(&store_path).unwrap());
        assert_eq!(reopened.restore(), 3);
    }

    #[test]
    fn test_clear_data() {
        let mut monitor = UsageMonitor::new(MemoryStore::new());
        monitor.load_str(&export()).unwrap();
        monitor.clear_data().unwrap();
        assert!(monitor.is_empty());

        let mut restored = UsageMonitor::new(monitor.into_store());
        assert_eq!(restored.restore(), 0);
    }
}
