use crate::calculator::BudgetCalculator;
use crate::data_structures::{CostSummary, DailyCostPoint, Filters, ModelBreakdown, UsageRecord};
use crate::filter::{exclude_no_charge, filter_by_category, ON_DEMAND};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Builds chart series and summaries from a filtered view of the collection.
pub struct Aggregator {
    calculator: BudgetCalculator,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            calculator: BudgetCalculator::new(),
        }
    }

    /// One point per day present in `records`, ascending, with a running total.
    ///
    /// An empty result means there is nothing to chart for the current filters.
    pub fn daily_series<'a, I>(&self, records: I) -> Vec<DailyCostPoint>
    where
        I: IntoIterator<Item = &'a UsageRecord>,
    {
        let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for record in records {
            *by_day.entry(record.day()).or_insert(0.0) += record.cost();
        }

        let mut cumulative = 0.0;
        by_day
            .into_iter()
            .map(|(day, daily_cost)| {
                cumulative += daily_cost;
                DailyCostPoint::new(day, daily_cost, cumulative)
            })
            .collect()
    }

    /// Daily series for `filters`, with no-charge records dropped unless selected.
    pub fn filtered_daily_series(
        &self,
        records: &[UsageRecord],
        filters: &Filters,
    ) -> Vec<DailyCostPoint> {
        self.daily_series(filters.apply_for_totals(records))
    }

    /// Total and On-Demand cost for `filters`.
    ///
    /// The On-Demand figure honors the date and model filters but always
    /// looks at On-Demand records, whatever category is selected.
    pub fn cost_summary(&self, records: &[UsageRecord], filters: &Filters) -> CostSummary {
        let counted = filters.apply_for_totals(records);
        let total_cost = self.calculator.calculate_total_cost(counted.iter().copied());

        let without_category = filters.clone().with_category(None).apply(records);
        let on_demand = exclude_no_charge(filter_by_category(without_category, Some(ON_DEMAND)));
        let on_demand_cost = self.calculator.calculate_on_demand_cost(on_demand);

        CostSummary::new(total_cost, on_demand_cost, counted.len())
    }

    /// Per-model totals for `filters`, sorted by model name.
    pub fn model_breakdown(&self, records: &[UsageRecord], filters: &Filters) -> Vec<ModelBreakdown> {
        let mut by_model: BTreeMap<&str, ModelBreakdown> = BTreeMap::new();
        for record in filters.apply_for_totals(records) {
            by_model
                .entry(record.model())
                .or_insert_with(|| ModelBreakdown::new(record.model()))
                .add_record(record);
        }
        by_model.into_values().collect()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
