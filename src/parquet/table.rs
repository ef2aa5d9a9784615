//! Snapshot of the climate table in long format, one row per day.

use std::{collections::BTreeMap, fs::File, path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{
        Array, Date32Array, Date32Builder, Float64Array, Float64Builder, Int32Array,
        Int32Builder, StringArray, StringBuilder, UInt32Array, UInt32Builder,
    },
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use tracing::info;

use crate::{
    cli::create_progress_bar,
    table::{ClimateTable, DailyValue, GridCell, TableKey, YearSlice},
    variable::CmipVariable,
};

const CHUNK_SIZE: usize = 100_000;
/// Days from 0001-01-01 to 1970-01-01, the Date32 epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("experiment", DataType::Utf8, false),
        Field::new("site", DataType::UInt32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("variable", DataType::Utf8, false),
        Field::new("unit", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("value", DataType::Float64, false),
        Field::new("cell_lat", DataType::Float64, false),
        Field::new("cell_lon", DataType::Float64, false),
    ]))
}

#[derive(Default)]
struct Columns {
    experiment: StringBuilder,
    site: UInt32Builder,
    year: Int32Builder,
    variable: StringBuilder,
    unit: StringBuilder,
    date: Date32Builder,
    value: Float64Builder,
    cell_lat: Float64Builder,
    cell_lon: Float64Builder,
    rows: usize,
}

impl Columns {
    fn push(&mut self, experiment: &str, key: &TableKey, slice: &YearSlice) {
        let cell = slice.cell();
        for day in slice.days() {
            self.experiment.append_value(experiment);
            // Sites are stored 1-based, as in the output directories.
            self.site.append_value(key.site as u32 + 1);
            self.year.append_value(key.year);
            self.variable.append_value(key.variable.source_name());
            self.unit.append_value(slice.unit());
            self.date
                .append_value(day.date.num_days_from_ce() - EPOCH_DAYS_FROM_CE);
            self.value.append_value(day.value);
            self.cell_lat.append_value(cell.lat);
            self.cell_lon.append_value(cell.lon);
        }
        self.rows += slice.len();
    }

    fn flush(&mut self, writer: &mut ArrowWriter<File>, schema: &SchemaRef) -> Result<()> {
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(self.experiment.finish()),
                Arc::new(self.site.finish()),
                Arc::new(self.year.finish()),
                Arc::new(self.variable.finish()),
                Arc::new(self.unit.finish()),
                Arc::new(self.date.finish()),
                Arc::new(self.value.finish()),
                Arc::new(self.cell_lat.finish()),
                Arc::new(self.cell_lon.finish()),
            ],
        )?;
        writer.write(&batch)?;
        self.rows = 0;
        Ok(())
    }
}

/// Saves `table` to `path`. `experiments` names the experiment indices of
/// the table keys.
pub fn save_table(table: &ClimateTable, experiments: &[String], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create table snapshot {:?}", path))?;
    let schema = schema();
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_dictionary_enabled(true)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let pb = create_progress_bar(table.len() as u64, "Writing table snapshot".to_string());
    let mut columns = Columns::default();

    for (key, slice) in table.iter() {
        let experiment = experiments
            .get(key.experiment)
            .ok_or_else(|| anyhow!("no experiment name for table slot {key}"))?;
        columns.push(experiment, key, slice);
        if columns.rows >= CHUNK_SIZE {
            columns.flush(&mut writer, &schema)?;
        }
        pb.inc(1);
    }
    if columns.rows > 0 {
        columns.flush(&mut writer, &schema)?;
    }

    pb.finish_with_message("Finished writing table snapshot");
    writer.close()?;
    info!(path = %path.display(), slots = table.len(), "saved table snapshot");

    Ok(())
}

struct PendingSlice {
    unit: String,
    cell: GridCell,
    days: Vec<DailyValue>,
}

/// Loads a snapshot written by [`save_table`]. Experiment names are mapped
/// back to positions in `experiments`; rows of other experiments are skipped.
pub fn load_table(path: &Path, experiments: &[String]) -> Result<ClimateTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open table snapshot {:?}", path))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut pending: BTreeMap<TableKey, PendingSlice> = BTreeMap::new();
    for batch in reader {
        let batch = batch?;
        let experiment = column::<StringArray>(&batch, "experiment")?;
        let site = column::<UInt32Array>(&batch, "site")?;
        let year = column::<Int32Array>(&batch, "year")?;
        let variable = column::<StringArray>(&batch, "variable")?;
        let unit = column::<StringArray>(&batch, "unit")?;
        let date = column::<Date32Array>(&batch, "date")?;
        let value = column::<Float64Array>(&batch, "value")?;
        let cell_lat = column::<Float64Array>(&batch, "cell_lat")?;
        let cell_lon = column::<Float64Array>(&batch, "cell_lon")?;

        for row in 0..batch.num_rows() {
            let Some(experiment_index) = experiments
                .iter()
                .position(|name| name == experiment.value(row))
            else {
                continue;
            };
            let site_number = site.value(row);
            if site_number == 0 {
                bail!("row {row} has site number 0; sites are 1-based");
            }
            let name = variable.value(row);
            let cmip_variable = CmipVariable::from_source_name(name)
                .ok_or_else(|| anyhow!("unknown variable `{name}`"))?;
            let key = TableKey::new(
                experiment_index,
                site_number as usize - 1,
                year.value(row),
                cmip_variable,
            );
            let day = NaiveDate::from_num_days_from_ce_opt(date.value(row) + EPOCH_DAYS_FROM_CE)
                .ok_or_else(|| anyhow!("date out of range in row {row}"))?;

            pending
                .entry(key)
                .or_insert_with(|| PendingSlice {
                    unit: unit.value(row).to_string(),
                    cell: GridCell {
                        lat: cell_lat.value(row),
                        lon: cell_lon.value(row),
                    },
                    days: Vec::new(),
                })
                .days
                .push(DailyValue::new(day, value.value(row)));
        }
    }

    let mut table = ClimateTable::new();
    for (key, mut slice) in pending {
        slice.days.sort_by_key(|d| d.date);
        let slice = YearSlice::new(key.year, key.variable, slice.unit, slice.cell, slice.days)
            .with_context(|| format!("Invalid table slot {key} in {:?}", path))?;
        table.insert(key, slice)?;
    }
    info!(path = %path.display(), slots = table.len(), "loaded table snapshot");

    Ok(table)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|array| array.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("table snapshot column `{name}` is missing or mistyped"))
}

// -- Tests -------------------------------------------------------------------
