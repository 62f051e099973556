//! Apple Health export ingestion.
//!
//! The export is a single large XML document whose `<Record .../>` elements
//! carry everything as attributes. The reader streams the document instead of
//! building a tree, keeps only the attributes the analysis uses, and skips
//! malformed elements with a warning.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use polars::prelude::*;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

pub const SYSTOLIC_RECORD_TYPE: &str = "HKQuantityTypeIdentifierBloodPressureSystolic";
pub const DIASTOLIC_RECORD_TYPE: &str = "HKQuantityTypeIdentifierBloodPressureDiastolic";

/// One `<Record>` element of the export, attribute values kept verbatim.
#[derive(Debug, Clone, Default)]
pub struct HealthRecord {
    pub record_type: String,
    pub source_name: String,
    pub unit: String,
    pub value: String,
    pub creation_date: String,
    pub start_date: String,
    pub end_date: String,
}

pub fn read_export_file(path: &Path) -> Result<Vec<HealthRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open export file: {}", path.display()))?;
    read_export(Reader::from_reader(BufReader::new(file)))
}

fn read_export<R: BufRead>(mut reader: Reader<R>) -> Result<Vec<HealthRecord>> {
    let mut buf = Vec::new();
    let mut records = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .with_context(|| format!("Malformed XML at offset {}", reader.buffer_position()))?
        {
            Event::Empty(ref element) | Event::Start(ref element)
                if element.name().as_ref() == b"Record" =>
            {
                match parse_record(element) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping malformed Record element: {}", e),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn parse_record(element: &BytesStart) -> Result<HealthRecord> {
    let mut record = HealthRecord::default();
    for attribute in element.attributes() {
        let attribute = attribute?;
        let value = attribute.unescape_value()?.into_owned();
        match attribute.key.as_ref() {
            b"type" => record.record_type = value,
            b"sourceName" => record.source_name = value,
            b"unit" => record.unit = value,
            b"value" => record.value = value,
            b"creationDate" => record.creation_date = value,
            b"startDate" => record.start_date = value,
            b"endDate" => record.end_date = value,
            _ => {}
        }
    }
    Ok(record)
}

/// Histogram of record types, for exploring what an export contains.
pub fn record_type_counts(records: &[HealthRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.record_type.clone()).or_insert(0usize) += 1;
    }
    counts
}

pub fn records_by_type<'a>(
    records: &'a [HealthRecord],
    record_type: &str,
) -> Vec<&'a HealthRecord> {
    records
        .iter()
        .filter(|record| record.record_type == record_type)
        .collect()
}

/// Tabulates records of a single type into a flat observation table.
///
/// Timestamp columns stay as the export's strings here; see
/// [`crate::preprocessing::parse_time_columns`] for the datetime conversion.
/// Rows whose `value` is not numeric are dropped with a warning.
pub fn tabulate_records(records: &[&HealthRecord]) -> Result<DataFrame> {
    let mut creation_dates = Vec::with_capacity(records.len());
    let mut start_dates = Vec::with_capacity(records.len());
    let mut end_dates = Vec::with_capacity(records.len());
    let mut source_names = Vec::with_capacity(records.len());
    let mut units = Vec::with_capacity(records.len());
    let mut values = Vec::with_capacity(records.len());

    for record in records {
        let value: f64 = match record.value.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Skipping record with non-numeric value {:?} ({})",
                    record.value, record.record_type
                );
                continue;
            }
        };
        creation_dates.push(record.creation_date.clone());
        start_dates.push(record.start_date.clone());
        end_dates.push(record.end_date.clone());
        source_names.push(record.source_name.clone());
        units.push(record.unit.clone());
        values.push(value);
    }

    let table = DataFrame::new(vec![
        Series::new("creationDate".into(), creation_dates).into(),
        Series::new("startDate".into(), start_dates).into(),
        Series::new("endDate".into(), end_dates).into(),
        Series::new("sourceName".into(), source_names).into(),
        Series::new("unit".into(), units).into(),
        Series::new("value".into(), values).into(),
    ])?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
 <ExportDate value="2023-07-09 12:00:00 -0400"/>
 <Record type="HKQuantityTypeIdentifierBloodPressureSystolic" sourceName="Health" unit="mmHg" value="128" creationDate="2023-05-01 08:31:00 -0400" startDate="2023-05-01 08:30:00 -0400" endDate="2023-05-01 08:30:00 -0400"/>
 <Record type="HKQuantityTypeIdentifierBloodPressureDiastolic" sourceName="Health" unit="mmHg" value="82" creationDate="2023-05-01 08:31:00 -0400" startDate="2023-05-01 08:30:00 -0400" endDate="2023-05-01 08:30:00 -0400"/>
 <Record type="HKQuantityTypeIdentifierHeartRate" sourceName="Watch" unit="count/min" value="61" creationDate="2023-05-01 09:00:00 -0400" startDate="2023-05-01 09:00:00 -0400" endDate="2023-05-01 09:00:00 -0400"/>
 <Record type="HKQuantityTypeIdentifierBloodPressureSystolic" sourceName="Health" unit="mmHg" value="not-a-number" creationDate="2023-05-02 08:31:00 -0400" startDate="2023-05-02 08:30:00 -0400" endDate="2023-05-02 08:30:00 -0400"/>
</HealthData>"#;

    fn sample_records() -> Vec<HealthRecord> {
        read_export(Reader::from_reader(SAMPLE.as_bytes())).unwrap()
    }

    #[test]
    fn reads_record_elements_only() {
        let records = sample_records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].record_type, SYSTOLIC_RECORD_TYPE);
        assert_eq!(records[0].unit, "mmHg");
        assert_eq!(records[0].start_date, "2023-05-01 08:30:00 -0400");
    }

    #[test]
    fn counts_record_types() {
        let counts = record_type_counts(&sample_records());
        assert_eq!(counts[SYSTOLIC_RECORD_TYPE], 2);
        assert_eq!(counts[DIASTOLIC_RECORD_TYPE], 1);
        assert_eq!(counts["HKQuantityTypeIdentifierHeartRate"], 1);
    }

    #[test]
    fn filters_by_type() {
        let records = sample_records();
        let systolic = records_by_type(&records, SYSTOLIC_RECORD_TYPE);
        assert_eq!(systolic.len(), 2);
        assert!(systolic
            .iter()
            .all(|record| record.record_type == SYSTOLIC_RECORD_TYPE));
    }

    #[test]
    fn tabulate_drops_non_numeric_values() {
        let records = sample_records();
        let systolic = records_by_type(&records, SYSTOLIC_RECORD_TYPE);
        let table = tabulate_records(&systolic).unwrap();
        // The "not-a-number" record is dropped.
        assert_eq!(table.height(), 1);
        assert_eq!(table.width(), 6);
        let values: Vec<f64> = table
            .column("value")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect();
        assert_eq!(values, vec![128.0]);
    }
}
