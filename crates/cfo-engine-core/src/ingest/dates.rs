use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Column-name fragments that mark a column as a date candidate.
const DATE_COLUMN_HINTS: &[&str] = &["date", "period", "month", "quarter", "year", "time"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub fn is_date_like_column(name: &str) -> bool {
    let lowered = name.to_lowercase();
    DATE_COLUMN_HINTS.iter().any(|h| lowered.contains(h))
}

/// Parse a single cell into a date, trying every supported representation.
pub fn parse_date_cell(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .filter(|y| (1900..=2200).contains(y))
            .and_then(|y| NaiveDate::from_ymd_opt(y as i32, 1, 1)),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    // YYYY-MM
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
        return Some(d);
    }

    parse_quarter(s).or_else(|| parse_year(s))
}

/// `2024-Q1`, `2024Q1`, `Q1 2024`, `Q1-2024` → first day of the quarter.
fn parse_quarter(s: &str) -> Option<NaiveDate> {
    let upper = s.to_uppercase().replace([' ', '-', '/'], "");
    let (year, quarter) = if let Some(idx) = upper.find('Q') {
        let (left, right) = upper.split_at(idx);
        let right = &right[1..];
        if left.len() == 4 && right.len() == 1 {
            (left.parse::<i32>().ok()?, right.parse::<u32>().ok()?)
        } else if left.is_empty() && right.len() == 5 {
            (right.get(1..)?.parse::<i32>().ok()?, right.get(..1)?.parse::<u32>().ok()?)
        } else {
            return None;
        }
    } else {
        return None;
    };

    if !(1..=4).contains(&quarter) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
}

fn parse_year(s: &str) -> Option<NaiveDate> {
    if s.len() != 4 {
        return None;
    }
    let year: i32 = s.parse().ok()?;
    if !(1900..=2200).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Parse a whole column. Returns `None` if any non-null cell fails, so a
/// partially parseable column is left untouched by the caller. Null cells
/// also fail: every row needs a period.
pub fn parse_date_column<'a>(cells: impl Iterator<Item = &'a Value>) -> Option<Vec<NaiveDate>> {
    cells.map(parse_date_cell).collect()
}
