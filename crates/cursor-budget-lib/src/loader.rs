use crate::data_structures::{TokenCounts, UsageRecord};
use crate::error::{ParseError, RowError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Mandatory export columns, matched case-insensitively against the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Kind,
    Model,
    MaxMode,
    InputWithCacheWrite,
    InputWithoutCacheWrite,
    CacheRead,
    OutputTokens,
    TotalTokens,
    Cost,
}

impl Column {
    const ALL: [Column; 10] = [
        Column::Date,
        Column::Kind,
        Column::Model,
        Column::MaxMode,
        Column::InputWithCacheWrite,
        Column::InputWithoutCacheWrite,
        Column::CacheRead,
        Column::OutputTokens,
        Column::TotalTokens,
        Column::Cost,
    ];

    fn header(self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Kind => "Kind",
            Column::Model => "Model",
            Column::MaxMode => "Max Mode",
            Column::InputWithCacheWrite => "Input (w/ Cache Write)",
            Column::InputWithoutCacheWrite => "Input (w/o Cache Write)",
            Column::CacheRead => "Cache Read",
            Column::OutputTokens => "Output Tokens",
            Column::TotalTokens => "Total Tokens",
            Column::Cost => "Cost",
        }
    }
}

/// Field positions of every mandatory column, resolved once from the header.
struct ColumnMap {
    positions: [usize; Column::ALL.len()],
}

impl ColumnMap {
    fn from_header(header: &str) -> Result<Self, ParseError> {
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (index, name) in split_line(header).into_iter().enumerate() {
            by_name.entry(name.trim().to_lowercase()).or_insert(index);
        }

        let mut positions = [0; Column::ALL.len()];
        for (slot, column) in positions.iter_mut().zip(Column::ALL) {
            *slot = *by_name
                .get(&column.header().to_lowercase())
                .ok_or_else(|| ParseError::MissingColumn(column.header().to_string()))?;
        }

        Ok(Self { positions })
    }

    fn value<'a>(&self, fields: &'a [String], column: Column) -> Result<&'a str, RowError> {
        let position = self.positions[column as usize];
        let value = fields
            .get(position)
            .ok_or_else(|| RowError::MissingValue(column.header().to_string()))?
            .trim();

        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            Ok(&value[1..value.len() - 1])
        } else {
            Ok(value)
        }
    }

    fn parse_record(&self, fields: &[String]) -> Result<UsageRecord, RowError> {
        let date_text = self.value(fields, Column::Date)?;
        let date =
            parse_date(date_text).ok_or_else(|| RowError::InvalidDate(date_text.to_string()))?;
        let kind = self.value(fields, Column::Kind)?;
        let model = self.value(fields, Column::Model)?;
        let max_mode = self.value(fields, Column::MaxMode)?;

        let tokens = TokenCounts::new(
            parse_count(self.value(fields, Column::InputWithCacheWrite)?),
            parse_count(self.value(fields, Column::InputWithoutCacheWrite)?),
            parse_count(self.value(fields, Column::CacheRead)?),
            parse_count(self.value(fields, Column::OutputTokens)?),
            parse_count(self.value(fields, Column::TotalTokens)?),
        );

        let cost = parse_number(self.value(fields, Column::Cost)?);
        if cost < 0.0 {
            warn!(cost, "Negative cost in export, treating as zero");
        }

        Ok(UsageRecord::new(date, kind, model, max_mode, tokens, cost))
    }
}

/// Parses usage-cost exports (comma-delimited, header row first).
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<UsageRecord>, ParseError> {
        let content = std::fs::read_to_string(&path)?;
        debug!(path = %path.as_ref().display(), bytes = content.len(), "Read usage export");
        self.parse_str(&content)
    }

    /// Parses a whole export. Records keep the order of their data rows.
    pub fn parse_str(&self, content: &str) -> Result<Vec<UsageRecord>, ParseError> {
        let lines: Vec<&str> = content.trim().split('\n').collect();
        if lines.len() < 2 {
            return Err(ParseError::EmptyOrHeaderOnly);
        }

        let columns = ColumnMap::from_header(lines[0])?;
        let mut records = Vec::with_capacity(lines.len() - 1);

        for (index, line) in lines.iter().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let fields = split_line(line);
            let record = columns
                .parse_record(&fields)
                .map_err(|cause| ParseError::Row {
                    line: index + 1,
                    cause,
                })?;
            records.push(record);
        }

        debug!(records = records.len(), "Parsed usage export");
        Ok(records)
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits one line on commas, honoring double-quoted fields and `""` escapes.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    fields.push(current.trim().to_string());
    fields
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Some(date.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

/// Lenient decimal parse: anything unusable becomes 0.
fn parse_number(text: &str) -> f64 {
    let cleaned = text.replace('"', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "null" || cleaned == "undefined" {
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            trace!(value = cleaned, "Unparseable number, using 0");
            0.0
        }
    }
}

fn parse_count(text: &str) -> u64 {
    let value = parse_number(text);
    if value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}
