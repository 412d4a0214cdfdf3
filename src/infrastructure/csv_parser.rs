// Comma-separated text parsing for catalog tables and signal windows
use crate::domain::signal::SamplePoint;
use futures::stream::Stream;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

const DELIMITER: char = ',';
const TIME_COLUMN: &str = "Time";

/// A single cell. Numeric-looking text becomes a number, everything else
/// (including the empty string) stays text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if !trimmed.is_empty() && n.is_finite() => FieldValue::Number(n),
            _ => FieldValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One data row keyed by the header. Columns past the end of a short row are
/// simply absent; values past the last header are dropped. The trimmed cell
/// text is kept next to the parsed value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    columns: Arc<[String]>,
    cells: Vec<String>,
    values: Vec<FieldValue>,
}

impl ParsedRow {
    fn index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.index(column).and_then(|i| self.values.get(i))
    }

    /// Cell text exactly as written, trimmed.
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.index(column)
            .and_then(|i| self.cells.get(i))
            .map(String::as_str)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(FieldValue::as_f64)
    }

    /// Non-empty cell text for `column`. Numeric-looking identifiers such as
    /// `00123` keep their original spelling.
    pub fn text(&self, column: &str) -> Option<String> {
        self.raw(column)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for ParsedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|line| !line.trim().is_empty())
}

fn split_fields(line: &str) -> impl Iterator<Item = FieldValue> + '_ {
    line.split(DELIMITER).map(FieldValue::parse)
}

/// Parses text whose first non-blank line is the header.
pub fn parse_delimited(text: &str) -> Vec<ParsedRow> {
    let mut lines = content_lines(text);
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Arc<[String]> = header
        .split(DELIMITER)
        .map(|c| c.trim().to_string())
        .collect();

    lines
        .map(|line| {
            let cells: Vec<String> = line
                .split(DELIMITER)
                .take(columns.len())
                .map(|cell| cell.trim().to_string())
                .collect();
            let values = cells.iter().map(|cell| FieldValue::parse(cell)).collect();
            ParsedRow {
                columns: Arc::clone(&columns),
                cells,
                values,
            }
        })
        .collect()
}

/// Parses headerless text into raw field arrays.
pub fn parse_raw(text: &str) -> Vec<Vec<FieldValue>> {
    content_lines(text)
        .map(|line| split_fields(line).collect())
        .collect()
}

/// Name of the value column in a signal table: the first column that is not `Time`.
fn value_column(rows: &[ParsedRow]) -> Option<&str> {
    rows.first()?
        .columns
        .iter()
        .map(String::as_str)
        .find(|c| *c != TIME_COLUMN)
}

fn row_point(row: &ParsedRow, value_column: &str) -> Option<SamplePoint> {
    let time = row.number(TIME_COLUMN)?;
    let value = row.number(value_column)?;
    Some(SamplePoint::new(time, value))
}

pub fn sort_by_time(points: &mut [SamplePoint]) {
    points.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Converts `Time,<value>` rows to sorted sample points, dropping rows without
/// a numeric time and value.
pub fn rows_to_points(rows: &[ParsedRow]) -> Vec<SamplePoint> {
    let Some(column) = value_column(rows) else {
        return Vec::new();
    };
    let mut points: Vec<SamplePoint> = rows.iter().filter_map(|r| row_point(r, column)).collect();
    sort_by_time(&mut points);
    points
}

/// Points converted from one chunk of a large table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkProgress {
    pub points: Vec<SamplePoint>,
    pub processed_rows: usize,
    pub total_rows: usize,
}

impl ChunkProgress {
    pub fn percent(&self) -> u8 {
        if self.total_rows == 0 {
            return 100;
        }
        ((self.processed_rows * 100) / self.total_rows).min(100) as u8
    }
}

/// Converts `rows` in chunks of `chunk_size`, yielding to the scheduler between
/// chunks so a large table never blocks the runtime for long. Points within a
/// chunk keep row order; callers sort after collecting.
pub fn rows_to_points_progressive(
    rows: Vec<ParsedRow>,
    chunk_size: usize,
) -> impl Stream<Item = ChunkProgress> {
    let chunk_size = chunk_size.max(1);
    async_stream::stream! {
        let total_rows = rows.len();
        let Some(column) = value_column(&rows).map(str::to_string) else {
            return;
        };
        let mut processed_rows = 0;
        for chunk in rows.chunks(chunk_size) {
            let points = chunk.iter().filter_map(|r| row_point(r, &column)).collect();
            processed_rows += chunk.len();
            yield ChunkProgress { points, processed_rows, total_rows };
            tokio::task::yield_now().await;
        }
    }
}
