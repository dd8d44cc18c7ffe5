pub mod aggregator;
pub mod calculator;
pub mod data_structures;
pub mod error;
pub mod filter;
pub mod loader;
pub mod monitor;
pub mod period;
pub mod store;

pub use aggregator::Aggregator;
pub use calculator::BudgetCalculator;
pub use data_structures::{
    BudgetMetrics, CostSummary, DailyCostPoint, DateRange, Filters, ModelBreakdown, Settings,
    TokenCounts, UsageRecord,
};
pub use error::{ParseError, RowError, StoreError};
pub use loader::DataLoader;
pub use monitor::UsageMonitor;
pub use period::PeriodCalculator;
pub use store::{BudgetStore, JsonFileStore, MemoryStore, SettingsStore};

pub use anyhow::Result;
pub use chrono::{DateTime, NaiveDate, Utc};

pub mod prelude {
    pub use crate::data_structures::{BudgetMetrics, DateRange, Filters, Settings, UsageRecord};
    pub use crate::monitor::UsageMonitor;
    pub use crate::store::{default_store_path, JsonFileStore, MemoryStore};
    pub use anyhow::Result;
    pub use chrono::{DateTime, Utc};
}
