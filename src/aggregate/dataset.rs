use crate::storage::token::UniquenessToken;
use crate::types::record::{CanonicalRecord, FieldValue, DATE_FIELD, STATION_FIELD};
use chrono::NaiveDate;
use object_store::path::Path;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

/// A record read back from storage, together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: Path,
    pub token: Option<UniquenessToken>,
    pub record: CanonicalRecord,
}

/// Counters produced while cleaning the raw record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningStats {
    /// Records without a usable date or station.
    pub dropped_invalid: usize,
    /// Records discarded in favour of a later copy of the same (date, station).
    pub duplicates_collapsed: usize,
}

/// Winner selection among copies of one (date, station): greatest token,
/// then greatest key. Records without a token lose to any record with one.
struct Candidate {
    token: Option<UniquenessToken>,
    key: Path,
    record: CanonicalRecord,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        (self.token, self.key.as_ref()) > (other.token, other.key.as_ref())
    }
}

/// The cleaned, deduplicated dataset, sorted by date and then station.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedDataset {
    rows: Vec<(NaiveDate, CanonicalRecord)>,
    columns: Vec<String>,
}

impl ConsolidatedDataset {
    /// Cleans, deduplicates and sorts `records`. Input order does not affect
    /// the result.
    pub fn consolidate(records: Vec<StoredRecord>) -> (Self, CleaningStats) {
        let mut stats = CleaningStats::default();
        let mut winners: BTreeMap<(NaiveDate, String), Candidate> = BTreeMap::new();

        for stored in records {
            let (Some(date), Some(station)) =
                (stored.record.calendar_date(), stored.record.station())
            else {
                stats.dropped_invalid += 1;
                continue;
            };
            let slot = (date, station.to_string());
            let candidate = Candidate {
                token: stored.token,
                key: stored.key,
                record: stored.record,
            };

            match winners.get_mut(&slot) {
                Some(current) => {
                    stats.duplicates_collapsed += 1;
                    if candidate.beats(current) {
                        *current = candidate;
                    }
                }
                None => {
                    winners.insert(slot, candidate);
                }
            }
        }

        let rows: Vec<_> = winners
            .into_iter()
            .map(|((date, _), candidate)| (date, candidate.record))
            .collect();
        (Self::from_rows(rows), stats)
    }

    fn from_rows(rows: Vec<(NaiveDate, CanonicalRecord)>) -> Self {
        let columns: BTreeSet<String> = rows
            .iter()
            .flat_map(|(_, record)| record.measurements().map(|(name, _)| name.to_string()))
            .collect();
        Self {
            rows,
            columns: columns.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The retained records in output order.
    pub fn records(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.rows.iter().map(|(_, record)| record)
    }

    /// Measurement column names in header order.
    pub fn measurement_columns(&self) -> &[String] {
        &self.columns
    }

    /// Header row: `date`, `station`, then the measurement columns by name.
    pub fn header(&self) -> Vec<&str> {
        [DATE_FIELD, STATION_FIELD]
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    /// Builds a frame of string columns. `date` is rendered as `YYYY-MM-DD`;
    /// absent and null fields are null.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let dates: Vec<Option<String>> = self
            .rows
            .iter()
            .map(|(date, _)| Some(date.format("%Y-%m-%d").to_string()))
            .collect();
        let stations: Vec<Option<String>> = self
            .rows
            .iter()
            .map(|(_, record)| record.station().map(str::to_string))
            .collect();

        let mut columns = Vec::with_capacity(self.columns.len() + 2);
        columns.push(Column::new(DATE_FIELD.into(), dates));
        columns.push(Column::new(STATION_FIELD.into(), stations));
        for name in &self.columns {
            let values: Vec<Option<String>> = self
                .rows
                .iter()
                .map(|(_, record)| record.get(name).and_then(render_cell))
                .collect();
            columns.push(Column::new(name.as_str().into(), values));
        }
        DataFrame::new(columns)
    }

    /// Renders the dataset as CSV with a header row.
    pub fn to_csv_bytes(&self) -> PolarsResult<Vec<u8>> {
        let mut df = self.to_dataframe()?;
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buffer)
    }

    /// Reads a consolidated CSV back. Every column other than `date` and
    /// `station` is treated as a measurement; blank cells become absent fields
    /// and numeric or boolean text is restored to its scalar type.
    pub fn from_csv(bytes: &[u8]) -> PolarsResult<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;

        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let mut cells = Vec::with_capacity(names.len());
        for name in &names {
            let values: Vec<Option<String>> = df
                .column(name)?
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|value| value.map(str::to_string))
                .collect();
            cells.push(values);
        }

        let mut rows = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let mut record = CanonicalRecord::default();
            for (name, values) in names.iter().zip(&cells) {
                let Some(text) = values[row].as_deref() else {
                    continue;
                };
                if name == DATE_FIELD || name == STATION_FIELD {
                    record.insert(name.as_str(), text);
                } else {
                    record.insert(name.as_str(), parse_cell(text));
                }
            }
            let date = record.calendar_date().ok_or_else(|| {
                PolarsError::ComputeError(format!("row {} has no valid date", row + 1).into())
            })?;
            rows.push((date, record));
        }
        Ok(Self::from_rows(rows))
    }
}

fn render_cell(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => None,
        FieldValue::Text(text) if text.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn parse_cell(text: &str) -> FieldValue {
    if let Ok(v) = text.parse::<i64>() {
        return FieldValue::Integer(v);
    }
    if let Ok(v) = text.parse::<u64>() {
        return FieldValue::Unsigned(v);
    }
    if let Ok(v) = text.parse::<f64>() {
        return FieldValue::Float(v);
    }
    match text {
        "true" => FieldValue::Bool(true),
        "false" => FieldValue::Bool(false),
        _ => FieldValue::Text(text.to_string()),
    }
}
