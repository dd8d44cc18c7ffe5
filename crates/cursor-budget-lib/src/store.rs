//! Settings persistence.
//!
//! The core only needs a string key/value store with `get`, `set` and
//! `delete`. [`BudgetStore`] layers typed settings and the record snapshot
//! on top of any such store.

use crate::data_structures::{Settings, UsageRecord};
use crate::error::StoreError;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::{debug, warn};

pub const BILLING_PERIOD_DAY_KEY: &str = "cursor-budget.billing-period-day";
pub const MONTHLY_COST_LIMIT_KEY: &str = "cursor-budget.monthly-cost-limit";
pub const RECORDS_KEY: &str = "cursor-budget.records";

/// Opaque string key/value storage.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// JSON object on disk, shared with any other process using the same path.
///
/// Reads reuse the last parsed contents only while the file's modification
/// time and length are unchanged. Writes re-read the file, apply one key
/// and replace the file, so keys written by others survive.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Option<CachedValues>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct CachedValues {
    stamp: FileStamp,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`; a missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            cache: Mutex::new(None),
        };

        let keys = store.with_values(|values| values.len())?;
        debug!(path = %store.path.display(), keys, "Opened settings store");
        Ok(store)
    }

    fn stamp(&self) -> Result<Option<FileStamp>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let metadata = std::fs::metadata(&self.path)?;
        Ok(Some(FileStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }))
    }

    fn read_file(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            Ok(BTreeMap::new())
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Runs `f` on the current on-disk contents.
    fn with_values<T>(
        &self,
        f: impl FnOnce(&BTreeMap<String, String>) -> T,
    ) -> Result<T, StoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        let Some(stamp) = self.stamp()? else {
            *cache = None;
            return Ok(f(&BTreeMap::new()));
        };

        match cache.as_ref() {
            Some(cached) if cached.stamp == stamp => Ok(f(&cached.values)),
            _ => {
                let values = self.read_file()?;
                let result = f(&values);
                *cache = Some(CachedValues { stamp, values });
                Ok(result)
            }
        }
    }

    /// Applies `change` to a fresh read of the file and writes the result.
    ///
    /// Nothing is cached unless the write succeeds.
    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        let mut values = self.read_file()?;
        if !change(&mut values) {
            return Ok(());
        }

        self.write_file(&values)?;
        *cache = self
            .stamp()?
            .map(|stamp| CachedValues { stamp, values });
        Ok(())
    }

    /// Writes via a temp file + rename so a crash never leaves half a file.
    fn write_file(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(values)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "Saved settings store");
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.with_values(|values| values.get(key).cloned()) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read settings store");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.update(|values| values.remove(key).is_some())
    }
}

/// Returns the default store location (`<config dir>/cursor-budget/store.json`).
pub fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("cursor-budget"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("store.json")
}

/// Typed access to budget settings and the record snapshot.
///
/// Reads go to the underlying store every time, so changes made by another
/// writer are picked up on the next read.
pub struct BudgetStore<S> {
    store: S,
}

impl<S: SettingsStore> BudgetStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Stored anchor day, or 1 when missing or invalid.
    pub fn billing_period_day(&self) -> u32 {
        let Some(stored) = self.store.get(BILLING_PERIOD_DAY_KEY) else {
            return Settings::DEFAULT_BILLING_PERIOD_DAY;
        };

        match stored.trim().parse::<u32>() {
            Ok(day) if (1..=31).contains(&day) => day,
            _ => {
                warn!(value = %stored, "Ignoring invalid stored billing period day");
                Settings::DEFAULT_BILLING_PERIOD_DAY
            }
        }
    }

    pub fn set_billing_period_day(&mut self, day: u32) -> Result<(), StoreError> {
        if !(1..=31).contains(&day) {
            return Err(StoreError::InvalidSetting(format!(
                "billing period day must be between 1 and 31, got {day}"
            )));
        }
        self.store.set(BILLING_PERIOD_DAY_KEY, &day.to_string())
    }

    /// Stored monthly cap, or `None` when missing or invalid.
    pub fn monthly_cost_limit(&self) -> Option<f64> {
        let stored = self.store.get(MONTHLY_COST_LIMIT_KEY)?;
        if stored.trim().is_empty() {
            return None;
        }

        match stored.trim().parse::<f64>() {
            Ok(limit) if limit.is_finite() && limit >= 0.0 => Some(limit),
            _ => {
                warn!(value = %stored, "Ignoring invalid stored monthly cost limit");
                None
            }
        }
    }

    /// `None` or zero clears the limit.
    pub fn set_monthly_cost_limit(&mut self, limit: Option<f64>) -> Result<(), StoreError> {
        match limit {
            None => self.store.delete(MONTHLY_COST_LIMIT_KEY),
            Some(limit) if limit == 0.0 => self.store.delete(MONTHLY_COST_LIMIT_KEY),
            Some(limit) if limit.is_finite() && limit > 0.0 => {
                self.store.set(MONTHLY_COST_LIMIT_KEY, &limit.to_string())
            }
            Some(limit) => Err(StoreError::InvalidSetting(format!(
                "monthly cost limit must be a non-negative amount, got {limit}"
            ))),
        }
    }

    pub fn settings(&self) -> Settings {
        Settings::new(self.billing_period_day(), self.monthly_cost_limit())
    }

    pub fn save_records(&mut self, records: &[UsageRecord]) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(records)?;
        self.store.set(RECORDS_KEY, &snapshot)?;
        debug!(records = records.len(), "Saved record snapshot");
        Ok(())
    }

    /// The saved snapshot, or `None` if there is none or it cannot be read.
    pub fn load_records(&self) -> Option<Vec<UsageRecord>> {
        let snapshot = self.store.get(RECORDS_KEY)?;
        match serde_json::from_str::<Vec<UsageRecord>>(&snapshot) {
            Ok(records) => {
                debug!(records = records.len(), "Loaded record snapshot");
                Some(records)
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable record snapshot");
                None
            }
        }
    }

    pub fn delete_records(&mut self) -> Result<(), StoreError> {
        self.store.delete(RECORDS_KEY)
    }
}
