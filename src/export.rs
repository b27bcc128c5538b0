//! CSV output and baseline setpoint input
//!
//! Schedules are written as a `Time` column followed by one column per end use,
//! one row per timestep of the simulated year.

use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

use crate::domain::{CalendarContext, ScheduleTable};
use crate::error::{Result, ScheduleError};
use crate::flexibility::SetpointSeries;

pub const TIME_COLUMN: &str = "Time";
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const HEATING_COLUMN: &str = "heating_setpoint";
pub const COOLING_COLUMN: &str = "cooling_setpoint";

fn check_rows(name: &str, ctx: &CalendarContext, rows: usize) -> Result<()> {
    if rows != ctx.total_steps() {
        return Err(ScheduleError::SeriesLengthMismatch {
            name: name.to_string(),
            expected: ctx.total_steps(),
            actual: rows,
        });
    }
    Ok(())
}

fn format_value(value: f64) -> String {
    format!("{:.6}", value)
}

pub fn write_schedules<W: Write>(table: &ScheduleTable, ctx: &CalendarContext, writer: W) -> Result<()> {
    check_rows(TIME_COLUMN, ctx, table.rows())?;
    let mut writer = WriterBuilder::new().from_writer(writer);

    let mut header = vec![TIME_COLUMN];
    header.extend(table.column_names());
    writer.write_record(&header)?;

    let mut record = Vec::with_capacity(header.len());
    for index in 0..table.rows() {
        record.clear();
        record.push(ctx.timestamp(index).format(TIME_FORMAT).to_string());
        record.extend(table.series().iter().map(|s| format_value(s.values[index])));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_schedules_file(table: &ScheduleTable, ctx: &CalendarContext, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_schedules(table, ctx, BufWriter::new(File::create(path)?))?;
    info!(path = %path.display(), rows = table.rows(), columns = table.series().len(), "wrote schedules");
    Ok(())
}

pub fn schedules_to_string(table: &ScheduleTable, ctx: &CalendarContext) -> Result<String> {
    let mut buffer = Vec::new();
    write_schedules(table, ctx, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ScheduleError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

pub fn write_setpoints<W: Write>(setpoints: &SetpointSeries, ctx: &CalendarContext, writer: W) -> Result<()> {
    check_rows(HEATING_COLUMN, ctx, setpoints.heating.len())?;
    check_rows(COOLING_COLUMN, ctx, setpoints.cooling.len())?;
    let mut writer = WriterBuilder::new().from_writer(writer);

    writer.write_record([TIME_COLUMN, HEATING_COLUMN, COOLING_COLUMN])?;
    for (index, (heating, cooling)) in setpoints.heating.iter().zip(&setpoints.cooling).enumerate() {
        writer.write_record([
            ctx.timestamp(index).format(TIME_FORMAT).to_string(),
            format_value(*heating),
            format_value(*cooling),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_setpoints_file(setpoints: &SetpointSeries, ctx: &CalendarContext, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_setpoints(setpoints, ctx, BufWriter::new(File::create(path)?))?;
    info!(path = %path.display(), rows = setpoints.len(), "wrote setpoints");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SetpointRow {
    heating_setpoint: f64,
    cooling_setpoint: f64,
}

/// Read a baseline with `heating_setpoint` and `cooling_setpoint` columns;
/// any other column (such as `Time`) is ignored
pub fn read_setpoints<R: Read>(reader: R) -> Result<SetpointSeries> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut series = SetpointSeries::default();
    for row in reader.deserialize() {
        let row: SetpointRow = row?;
        series.heating.push(row.heating_setpoint);
        series.cooling.push(row.cooling_setpoint);
    }
    Ok(series)
}

pub fn read_setpoints_file(path: impl AsRef<Path>) -> Result<SetpointSeries> {
    let path = path.as_ref();
    let series = read_setpoints(File::open(path)?)?;
    info!(path = %path.display(), rows = series.len(), "read baseline setpoints");
    Ok(series)
}
