//! Record filters and the no-charge exclusion rule.

use crate::data_structures::{DateRange, Filters, UsageRecord};
use std::collections::BTreeSet;

/// Category of requests that failed and were not billed.
pub const ERRORED_NO_CHARGE: &str = "Errored, No Charge";
/// Category of requests cancelled before they were billed.
pub const ABORTED_NOT_CHARGED: &str = "Aborted, Not Charged";
pub const ON_DEMAND: &str = "On-Demand";

pub fn is_no_charge(category: &str) -> bool {
    category == ERRORED_NO_CHARGE || category == ABORTED_NOT_CHARGED
}

pub fn filter_by_date_range<'a, I>(records: I, range: &DateRange) -> Vec<&'a UsageRecord>
where
    I: IntoIterator<Item = &'a UsageRecord>,
{
    records
        .into_iter()
        .filter(|record| range.contains(record.day()))
        .collect()
}

pub fn filter_by_model<'a, I>(records: I, model: Option<&str>) -> Vec<&'a UsageRecord>
where
    I: IntoIterator<Item = &'a UsageRecord>,
{
    records
        .into_iter()
        .filter(|record| model.map_or(true, |model| record.model() == model))
        .collect()
}

pub fn filter_by_category<'a, I>(records: I, category: Option<&str>) -> Vec<&'a UsageRecord>
where
    I: IntoIterator<Item = &'a UsageRecord>,
{
    records
        .into_iter()
        .filter(|record| category.map_or(true, |category| record.category() == category))
        .collect()
}

/// Drops errored and aborted requests.
pub fn exclude_no_charge<'a, I>(records: I) -> Vec<&'a UsageRecord>
where
    I: IntoIterator<Item = &'a UsageRecord>,
{
    records
        .into_iter()
        .filter(|record| !is_no_charge(record.category()))
        .collect()
}

impl Filters {
    /// Applies date range, then model, then category.
    pub fn apply<'a>(&self, records: &'a [UsageRecord]) -> Vec<&'a UsageRecord> {
        let by_date = filter_by_date_range(records, self.date_range());
        let by_model = filter_by_model(by_date, self.model());
        filter_by_category(by_model, self.category())
    }

    /// Like [`Filters::apply`], but also drops no-charge records unless the
    /// category filter selects one of those categories explicitly.
    pub fn apply_for_totals<'a>(&self, records: &'a [UsageRecord]) -> Vec<&'a UsageRecord> {
        let filtered = self.apply(records);
        if self.selects_no_charge() {
            filtered
        } else {
            exclude_no_charge(filtered)
        }
    }

    pub fn selects_no_charge(&self) -> bool {
        self.category().is_some_and(is_no_charge)
    }
}

pub fn unique_models(records: &[UsageRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.model().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn unique_categories(records: &[UsageRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.category().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::TokenCounts;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(d: u32, hour: u32, cost: f64, model: &str, category: &str) -> UsageRecord {
        UsageRecord::new(
            Utc.with_ymd_and_hms(2025, 12, d, hour, 0, 0).unwrap(),
            category,
            model,
            "No",
            TokenCounts::default(),
            cost,
        )
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, d).unwrap()
    }

    fn sample() -> Vec<UsageRecord> {
        vec![
            record(20, 9, 1.0, "auto", "Included"),
            record(21, 23, 2.0, "claude-4.5", "On-Demand"),
            record(22, 0, 3.0, "auto", ERRORED_NO_CHARGE),
            record(22, 12, 4.0, "auto", ABORTED_NOT_CHARGED),
        ]
    }

    #[test]
    fn test_filter_by_date_range_ignores_time_of_day() {
        let records = sample();
        let filtered = filter_by_date_range(&records, &DateRange::between(day(21), day(22)));
        let costs: Vec<f64> = filtered.iter().map(|r| r.cost()).collect();
        assert_eq!(costs, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_open_ended_date_range() {
        let records = sample();
        assert_eq!(
            filter_by_date_range(&records, &DateRange::new(Some(day(22)), None)).len(),
            2
        );
        assert_eq!(
            filter_by_date_range(&records, &DateRange::default()).len(),
            4
        );
    }

    #[test]
    fn test_filter_by_model() {
        let records = sample();
        let filtered = filter_by_model(&records, Some("auto"));
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|r| r.model() == "auto"));
        assert_eq!(filter_by_model(&records, None).len(), 4);
    }

    #[test]
    fn test_filter_by_category() {
        let records = sample();
        let filtered = filter_by_category(&records, Some("On-Demand"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].cost(), 2.0);
    }

    #[test]
    fn test_exclude_no_charge() {
        let records = sample();
        let kept = exclude_no_charge(&records);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| !is_no_charge(r.category())));
    }

    #[test]
    fn test_filters_compose() {
        let records = sample();
        let filters = Filters::new()
            .with_date_range(DateRange::between(day(20), day(21)))
            .with_model(Some("auto".to_string()));
        let filtered = filters.apply(&records);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].cost(), 1.0);
    }

    #[test]
    fn test_totals_exclude_no_charge_unless_selected() {
        let records = sample();

        let unfiltered = Filters::new().apply_for_totals(&records);
        assert_eq!(unfiltered.len(), 2);

        let errored = Filters::new()
            .with_category(Some(ERRORED_NO_CHARGE.to_string()))
            .apply_for_totals(&records);
        assert_eq!(errored.len(), 1);
        assert_eq!(errored[0].cost(), 3.0);

        let aborted = Filters::new()
            .with_category(Some(ABORTED_NOT_CHARGED.to_string()))
            .apply_for_totals(&records);
        assert_eq!(aborted.len(), 1);
    }

    #[test]
    fn test_unique_values_are_sorted() {
        let records = sample();
        assert_eq!(unique_models(&records), vec!["auto", "claude-4.5"]);
        assert_eq!(
            unique_categories(&records),
            vec![ABORTED_NOT_CHARGED, ERRORED_NO_CHARGE, "Included", "On-Demand"]
        );
    }
}
