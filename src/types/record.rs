//! The canonical record shared by every stage of the pipeline.
//!
//! A [`CanonicalRecord`] is an ordered mapping from field name to a scalar
//! [`FieldValue`]. Two fields are mandatory for a record to be usable
//! downstream: `date` and `station`. Every other field is a measurement keyed by
//! the provider's datatype (e.g. `TMAX`, `PRCP`), and the set of measurements is
//! open: different dates and stations may report different datatypes.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the mandatory calendar date field.
pub const DATE_FIELD: &str = "date";
/// Name of the mandatory station identifier field.
pub const STATION_FIELD: &str = "station";
/// Optional field used by the sink to tag stored objects.
pub const DATATYPE_FIELD: &str = "datatype";

/// A single scalar value inside a [`CanonicalRecord`].
///
/// Nested arrays and objects are deliberately not representable, so a stored
/// object containing them fails to parse and is treated as malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    /// Integers above `i64::MAX`, kept exact instead of widening to a float.
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    #[default]
    Null,
}

impl FieldValue {
    /// Returns the contained text, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Renders the raw value as it appears in the consolidated CSV.
/// `Null` renders as an empty string.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Unsigned(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::Unsigned(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One normalized (date, station) weather observation.
///
/// Serializes as a flat JSON object, preserving field insertion order:
///
/// ```
/// use weatherflow::CanonicalRecord;
///
/// let record = CanonicalRecord::new("2025-04-01", "S1")
///     .with_field("TMAX", 70)
///     .with_field("TMIN", 50);
/// let json = String::from_utf8(record.to_json_vec().unwrap()).unwrap();
/// assert_eq!(json, r#"{"date":"2025-04-01","station":"S1","TMAX":70,"TMIN":50}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: IndexMap<String, FieldValue>,
}

impl CanonicalRecord {
    /// Creates a record holding only the two mandatory fields.
    pub fn new(date: impl Into<String>, station: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(DATE_FIELD.to_string(), FieldValue::Text(date.into()));
        fields.insert(STATION_FIELD.to_string(), FieldValue::Text(station.into()));
        Self { fields }
    }

    /// Builder-style variant of [`CanonicalRecord::insert`].
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, replacing any previous value while keeping its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Measurement fields only, i.e. everything except `date` and `station`.
    pub fn measurements(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields()
            .filter(|(name, _)| *name != DATE_FIELD && *name != STATION_FIELD)
    }

    /// The `date` field, if present as non-blank text.
    pub fn date(&self) -> Option<&str> {
        self.text_field(DATE_FIELD)
    }

    /// The `station` field, if present as non-blank text.
    pub fn station(&self) -> Option<&str> {
        self.text_field(STATION_FIELD)
    }

    /// The optional `datatype` tag carried by single-measurement records.
    pub fn datatype(&self) -> Option<&str> {
        self.text_field(DATATYPE_FIELD)
    }

    /// The `date` field parsed into a calendar date.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        self.date().and_then(parse_calendar_date)
    }

    /// True when both mandatory fields are present and non-blank.
    pub fn has_mandatory_fields(&self) -> bool {
        self.date().is_some() && self.station().is_some()
    }

    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    fn text_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(FieldValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Returns the calendar-date portion of an ISO-8601 date or timestamp,
/// e.g. `2025-04-01T00:00:00` or `2025-04-01 00:00:00` becomes `2025-04-01`.
pub fn date_portion(date: &str) -> &str {
    let date = date.trim();
    date.split(['T', ' ']).next().unwrap_or(date)
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.f]` or an RFC 3339 timestamp.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_preserves_order_and_values() -> Result<(), serde_json::Error> {
        let record = CanonicalRecord::new("2025-04-01", "GHCND:USW00023234")
            .with_field("TMAX", 70)
            .with_field("PRCP", 0.12)
            .with_field("NOTE", "estimated")
            .with_field("WT01", FieldValue::Null);

        let bytes = record.to_json_vec()?;
        let decoded = CanonicalRecord::from_json_slice(&bytes)?;

        assert_eq!(decoded, record);
        let names: Vec<_> = decoded.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["date", "station", "TMAX", "PRCP", "NOTE", "WT01"]);
        assert_eq!(decoded.get("TMAX"), Some(&FieldValue::Integer(70)));
        assert_eq!(decoded.get("PRCP"), Some(&FieldValue::Float(0.12)));
        Ok(())
    }

    #[test]
    fn test_whole_floats_stay_floats() -> Result<(), serde_json::Error> {
        let record = CanonicalRecord::new("2025-04-01", "S1").with_field("TAVG", 55.0);
        let decoded = CanonicalRecord::from_json_slice(&record.to_json_vec()?)?;
        assert_eq!(decoded.get("TAVG"), Some(&FieldValue::Float(55.0)));
        Ok(())
    }

    #[test]
    fn test_large_unsigned_integers_stay_exact() -> Result<(), serde_json::Error> {
        let body = br#"{"date":"2025-04-01","station":"S1","OBS_ID":18446744073709551615,"NEG":-5}"#;
        let record = CanonicalRecord::from_json_slice(body)?;
        assert_eq!(record.get("OBS_ID"), Some(&FieldValue::Unsigned(u64::MAX)));
        assert_eq!(record.get("NEG"), Some(&FieldValue::Integer(-5)));
        assert_eq!(record.to_json_vec()?, body.to_vec());
        assert_eq!(FieldValue::from(7u64), FieldValue::Integer(7));
        assert_eq!(FieldValue::Unsigned(u64::MAX).to_string(), "18446744073709551615");
        Ok(())
    }

    #[test]
    fn test_nested_values_are_rejected() {
        let nested = br#"{"date":"2025-04-01","station":"S1","attributes":{"flag":"H"}}"#;
        assert!(CanonicalRecord::from_json_slice(nested).is_err());

        let not_a_map = br#"["2025-04-01","S1"]"#;
        assert!(CanonicalRecord::from_json_slice(not_a_map).is_err());
    }

    #[test]
    fn test_mandatory_fields() {
        let complete = CanonicalRecord::new("2025-04-01", "S1");
        assert!(complete.has_mandatory_fields());

        let blank_station = CanonicalRecord::new("2025-04-01", "  ");
        assert!(!blank_station.has_mandatory_fields());

        let numeric_date = CanonicalRecord::default()
            .with_field("date", 20250401)
            .with_field("station", "S1");
        assert_eq!(numeric_date.date(), None);
        assert!(!numeric_date.has_mandatory_fields());
    }

    #[test]
    fn test_measurements_skip_mandatory_fields() {
        let record = CanonicalRecord::new("2025-04-01", "S1")
            .with_field("TMAX", 70)
            .with_field("TMIN", 50);
        let names: Vec<_> = record.measurements().map(|(name, _)| name).collect();
        assert_eq!(names, ["TMAX", "TMIN"]);
    }

    #[test]
    fn test_parse_calendar_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2025, 4, 1);
        assert_eq!(parse_calendar_date("2025-04-01"), expected);
        assert_eq!(parse_calendar_date("2025-04-01T00:00:00"), expected);
        assert_eq!(parse_calendar_date("2025-04-01T13:45:10.250"), expected);
        assert_eq!(parse_calendar_date("2025-04-01T23:00:00+00:00"), expected);
        assert_eq!(parse_calendar_date("2025-04-01 00:00:00"), expected);
        assert_eq!(parse_calendar_date("2025-04-01 23:59:59.5"), expected);
        assert_eq!(parse_calendar_date("01/04/2025"), None);
        assert_eq!(parse_calendar_date("2025-02-30"), None);
    }

    #[test]
    fn test_date_portion() {
        assert_eq!(date_portion("2025-04-01T00:00:00"), "2025-04-01");
        assert_eq!(date_portion("2025-04-01"), "2025-04-01");
        assert_eq!(date_portion(" 2025-04-01 06:00:00"), "2025-04-01");
    }

    #[test]
    fn test_display_renders_raw_values() {
        assert_eq!(FieldValue::Integer(70).to_string(), "70");
        assert_eq!(FieldValue::Float(0.5).to_string(), "0.5");
        assert_eq!(FieldValue::from("T").to_string(), "T");
        assert_eq!(FieldValue::Null.to_string(), "");
    }
}
