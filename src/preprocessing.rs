//! Time-column normalization for tabulated export records.
//!
//! The export writes timestamps like `2023-04-26 15:04:00 -0400`. Labeling
//! works on the wall clock the measurement was taken at, so parsing resolves
//! the offset to local time and then drops it. Columns that are already
//! datetimes pass through unchanged; any other type fails fast rather than
//! being coerced.

use chrono::DateTime;
use polars::prelude::*;

use crate::labeling::LabelError;

pub const TIME_COLUMNS: [&str; 3] = ["creationDate", "startDate", "endDate"];

pub const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Converts the table's time columns from export strings to microsecond
/// datetime columns, in place. Idempotent.
pub fn parse_time_columns(table: &mut DataFrame) -> Result<(), LabelError> {
    for column in TIME_COLUMNS {
        let series = table.column(column)?.as_materialized_series().clone();
        match series.dtype() {
            DataType::Datetime(_, _) => {}
            DataType::String => {
                table.with_column(parse_datetime_series(&series)?)?;
            }
            dtype => {
                return Err(LabelError::UnsupportedType {
                    column: column.to_string(),
                    dtype: dtype.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn parse_datetime_series(series: &Series) -> Result<Series, LabelError> {
    let ca = series.str()?;
    let micros = ca
        .into_iter()
        .map(|value| value.and_then(parse_export_datetime));
    Ok(Int64Chunked::from_iter_options(series.name().clone(), micros)
        .into_datetime(TimeUnit::Microseconds, None)
        .into_series())
}

/// Parses one export timestamp into wall-clock microseconds since the epoch.
/// Unparseable values become null.
pub fn parse_export_datetime(value: &str) -> Option<i64> {
    DateTime::parse_from_str(value.trim(), EXPORT_DATETIME_FORMAT)
        .ok()
        .map(|dt| dt.naive_local().and_utc().timestamp_micros())
}
