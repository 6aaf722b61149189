use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::types::Figure;

/// One row of a time series: field name → value.
pub type Row = BTreeMap<String, Figure>;

/// A reporting period: a calendar date (or the first day of an aggregation
/// bucket) or a positional index when the source had no dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Period {
    Date(NaiveDate),
    Index(u32),
}

impl Period {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Period::Date(d) => Some(*d),
            Period::Index(_) => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Period::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Serialized form of a single period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub period: Period,
    pub values: Row,
}

/// Location of an `Undefined` value inside a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndefinedCell {
    pub period: Period,
    pub field: String,
}

/// Ordered periods, each holding named figures.
///
/// Periods are unique and ascending. A field missing from a period is simply
/// absent; it is never treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct TimeSeries {
    rows: BTreeMap<Period, Row>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Set a single value, creating the period if needed.
    pub fn insert(&mut self, period: Period, field: impl Into<String>, value: impl Into<Figure>) {
        self.rows
            .entry(period)
            .or_default()
            .insert(field.into(), value.into());
    }

    /// Add `amount` to an existing value, or set it when absent.
    pub fn accumulate(&mut self, period: Period, field: &str, amount: Decimal) {
        let row = self.rows.entry(period).or_default();
        let current = row.get(field).copied();
        let next = match current {
            Some(existing) => existing + Figure::Value(amount),
            None => Figure::Value(amount),
        };
        row.insert(field.to_string(), next);
    }

    /// Make sure a period exists even if it carries no values.
    pub fn ensure_period(&mut self, period: Period) {
        self.rows.entry(period).or_default();
    }

    pub fn get(&self, period: &Period, field: &str) -> Option<Figure> {
        self.rows.get(period).and_then(|r| r.get(field)).copied()
    }

    /// Value of `field` in `period`, `Undefined` when absent.
    pub fn figure(&self, period: &Period, field: &str) -> Figure {
        self.get(period, field).unwrap_or(Figure::Undefined)
    }

    pub fn row(&self, period: &Period) -> Option<&Row> {
        self.rows.get(period)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Period, &Row)> {
        self.rows.iter()
    }

    pub fn periods(&self) -> Vec<Period> {
        self.rows.keys().copied().collect()
    }

    pub fn contains_period(&self, period: &Period) -> bool {
        self.rows.contains_key(period)
    }

    pub fn last_period(&self) -> Option<Period> {
        self.rows.keys().next_back().copied()
    }

    /// Union of field names across all periods.
    pub fn fields(&self) -> BTreeSet<String> {
        self.rows
            .values()
            .flat_map(|r| r.keys().cloned())
            .collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.rows.values().any(|r| r.contains_key(field))
    }

    /// Values of one field in period order, skipping periods where it is absent.
    pub fn column(&self, field: &str) -> Vec<(Period, Figure)> {
        self.rows
            .iter()
            .filter_map(|(p, r)| r.get(field).map(|v| (*p, *v)))
            .collect()
    }

    /// Multiply every value of `field` by `factor`.
    pub fn scale_field(&mut self, field: &str, factor: Decimal) {
        for row in self.rows.values_mut() {
            if let Some(v) = row.get_mut(field) {
                *v = *v * factor;
            }
        }
    }

    pub fn undefined_cells(&self) -> Vec<UndefinedCell> {
        self.rows
            .iter()
            .flat_map(|(p, r)| {
                r.iter()
                    .filter(|(_, v)| v.is_undefined())
                    .map(move |(f, _)| UndefinedCell {
                        period: *p,
                        field: f.clone(),
                    })
            })
            .collect()
    }
}

impl TryFrom<Vec<Observation>> for TimeSeries {
    type Error = String;

    fn try_from(observations: Vec<Observation>) -> Result<Self, Self::Error> {
        let mut rows = BTreeMap::new();
        for obs in observations {
            if rows.insert(obs.period, obs.values).is_some() {
                return Err(format!("duplicate period {} in time series", obs.period));
            }
        }
        Ok(TimeSeries { rows })
    }
}

impl From<TimeSeries> for Vec<Observation> {
    fn from(series: TimeSeries) -> Self {
        series
            .rows
            .into_iter()
            .map(|(period, values)| Observation { period, values })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32) -> Period {
        Period::Date(NaiveDate::from_ymd_opt(y, m, 1).unwrap())
    }

    #[test]
    fn test_periods_sorted_regardless_of_insert_order() {
        let mut ts = TimeSeries::new();
        ts.insert(d(2024, 3), "revenue", dec!(3));
        ts.insert(d(2024, 1), "revenue", dec!(1));
        ts.insert(d(2024, 2), "revenue", dec!(2));
        assert_eq!(ts.periods(), vec![d(2024, 1), d(2024, 2), d(2024, 3)]);
    }

    #[test]
    fn test_missing_field_is_absent_not_zero() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(0), "revenue", dec!(10));
        assert_eq!(ts.get(&Period::Index(0), "cogs"), None);
        assert!(ts.figure(&Period::Index(0), "cogs").is_undefined());
    }

    #[test]
    fn test_accumulate_sums() {
        let mut ts = TimeSeries::new();
        ts.accumulate(Period::Index(0), "revenue", dec!(10));
        ts.accumulate(Period::Index(0), "revenue", dec!(5));
        assert_eq!(ts.get(&Period::Index(0), "revenue"), Some(Figure::Value(dec!(15))));
    }

    #[test]
    fn test_json_roundtrip_rejects_duplicate_periods() {
        let json = serde_json::json!([
            {"period": "2024-01-01", "values": {"revenue": "1"}},
            {"period": "2024-01-01", "values": {"revenue": "2"}}
        ]);
        assert!(serde_json::from_value::<TimeSeries>(json).is_err());
    }

    #[test]
    fn test_index_and_date_periods_deserialize() {
        let json = serde_json::json!([
            {"period": 1, "values": {"revenue": 100}},
            {"period": 2, "values": {"revenue": null}}
        ]);
        let ts: TimeSeries = serde_json::from_value(json).unwrap();
        assert_eq!(ts.periods(), vec![Period::Index(1), Period::Index(2)]);
        assert!(ts.figure(&Period::Index(2), "revenue").is_undefined());
        assert_eq!(ts.undefined_cells().len(), 1);
    }
}
