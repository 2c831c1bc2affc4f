//! Table connectors
//!
//! Arrow schemas for the dataset, label and prediction tables, conversion
//! between records and `RecordBatch`, and CSV/JSON files on disk. Every
//! table is keyed by `event_id`; nothing is ever aligned by row position.

use anyhow::{Context, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use spoof_sentry_core::detector::DetectionReport;
use spoof_sentry_core::event::{EventRecord, LabeledRecord, LocationEvent};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const EVENT_ID: &str = "event_id";
pub const INSTALLATION_ID: &str = "installation_id";
pub const LABEL: &str = "spoofed";
pub const SPOOF_SCORE: &str = "spoof_score_rules";
pub const SPOOF_FLAG: &str = "spoof_flag_rules";

/// Columns of the dataset table, in file order. The label column is last.
pub fn labeled_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(EVENT_ID, DataType::Utf8, true),
        Field::new(INSTALLATION_ID, DataType::Utf8, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
        Field::new("timestamp_unix", DataType::Int64, true),
        Field::new("horizontal_accuracy", DataType::Float64, true),
        Field::new("altitude", DataType::Float64, true),
        Field::new("speed", DataType::Float64, true),
        Field::new("bearing", DataType::Float64, true),
        Field::new("pressure_hpa", DataType::Float64, true),
        Field::new("mock_location_enabled", DataType::Boolean, true),
        Field::new("device_is_charging", DataType::Boolean, true),
        Field::new("wifi_bssid", DataType::Utf8, true),
        Field::new("cell_tower_id", DataType::Utf8, true),
        Field::new("num_satellites", DataType::UInt32, true),
        Field::new("vertical_accuracy", DataType::Float64, true),
        Field::new("ambient_light_lux", DataType::Float64, true),
        Field::new(LABEL, DataType::Int32, true),
    ]))
}

/// The dataset table without its label column.
pub fn event_schema() -> SchemaRef {
    let labeled = labeled_schema();
    let fields: Vec<Field> = labeled
        .fields()
        .iter()
        .filter(|f| f.name() != LABEL)
        .map(|f| f.as_ref().clone())
        .collect();
    Arc::new(Schema::new(fields))
}

pub fn label_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(EVENT_ID, DataType::Utf8, true),
        Field::new(LABEL, DataType::Int32, true),
    ]))
}

pub fn prediction_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(EVENT_ID, DataType::Utf8, true),
        Field::new(SPOOF_SCORE, DataType::Float64, true),
        Field::new(SPOOF_FLAG, DataType::Int32, true),
    ]))
}

// Missing readings travel as NaN in memory and as nulls in Arrow.
fn present(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

fn float_column(records: &[EventRecord], f: impl Fn(&LocationEvent) -> f64) -> ArrayRef {
    Arc::new(
        records
            .iter()
            .map(|r| present(f(&r.event)))
            .collect::<Float64Array>(),
    )
}

fn event_columns(records: &[EventRecord]) -> Vec<ArrayRef> {
    vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.event_id.to_string()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.installation_id.to_string()),
        )),
        float_column(records, |e| e.latitude),
        float_column(records, |e| e.longitude),
        Arc::new(Int64Array::from_iter_values(
            records.iter().map(|r| r.event.timestamp_unix),
        )),
        float_column(records, |e| e.horizontal_accuracy),
        float_column(records, |e| e.altitude),
        float_column(records, |e| e.speed),
        float_column(records, |e| e.bearing),
        float_column(records, |e| e.pressure_hpa),
        Arc::new(
            records
                .iter()
                .map(|r| Some(r.event.mock_location_enabled))
                .collect::<BooleanArray>(),
        ),
        Arc::new(
            records
                .iter()
                .map(|r| Some(r.event.device_is_charging))
                .collect::<BooleanArray>(),
        ),
        Arc::new(
            records
                .iter()
                .map(|r| r.event.wifi_bssid.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(
            records
                .iter()
                .map(|r| r.event.cell_tower_id.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.event.num_satellites),
        )),
        float_column(records, |e| e.vertical_accuracy),
        float_column(records, |e| e.ambient_light_lux),
    ]
}

pub fn records_to_batch(records: &[EventRecord]) -> Result<RecordBatch> {
    RecordBatch::try_new(event_schema(), event_columns(records))
        .context("Failed to build event batch")
}

pub fn labeled_to_batch(records: &[LabeledRecord]) -> Result<RecordBatch> {
    let events: Vec<EventRecord> = records.iter().map(|r| r.record.clone()).collect();
    let mut columns = event_columns(&events);
    columns.push(Arc::new(Int32Array::from_iter_values(
        records.iter().map(|r| i32::from(r.spoofed)),
    )));
    RecordBatch::try_new(labeled_schema(), columns).context("Failed to build labeled batch")
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing column {}", name))?
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("Column {} has an unexpected type", name))
}

fn uuid_at(array: &StringArray, row: usize, name: &str) -> Result<Uuid> {
    if array.is_null(row) {
        anyhow::bail!("Row {}: {} is empty", row, name);
    }
    let raw = array.value(row);
    Uuid::parse_str(raw).with_context(|| format!("Row {}: invalid {} '{}'", row, name, raw))
}

fn float_at(array: &Float64Array, row: usize) -> f64 {
    if array.is_null(row) {
        f64::NAN
    } else {
        array.value(row)
    }
}

fn string_at(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

// Null flags read as false.
fn bool_at(array: &BooleanArray, row: usize) -> bool {
    !array.is_null(row) && array.value(row)
}

pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<EventRecord>> {
    let event_ids = column::<StringArray>(batch, EVENT_ID)?;
    let installation_ids = column::<StringArray>(batch, INSTALLATION_ID)?;
    let latitude = column::<Float64Array>(batch, "latitude")?;
    let longitude = column::<Float64Array>(batch, "longitude")?;
    let timestamps = column::<Int64Array>(batch, "timestamp_unix")?;
    let horizontal_accuracy = column::<Float64Array>(batch, "horizontal_accuracy")?;
    let altitude = column::<Float64Array>(batch, "altitude")?;
    let speed = column::<Float64Array>(batch, "speed")?;
    let bearing = column::<Float64Array>(batch, "bearing")?;
    let pressure = column::<Float64Array>(batch, "pressure_hpa")?;
    let mock = column::<BooleanArray>(batch, "mock_location_enabled")?;
    let charging = column::<BooleanArray>(batch, "device_is_charging")?;
    let wifi = column::<StringArray>(batch, "wifi_bssid")?;
    let cell = column::<StringArray>(batch, "cell_tower_id")?;
    let satellites = column::<UInt32Array>(batch, "num_satellites")?;
    let vertical_accuracy = column::<Float64Array>(batch, "vertical_accuracy")?;
    let light = column::<Float64Array>(batch, "ambient_light_lux")?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if timestamps.is_null(row) {
            anyhow::bail!("Row {}: timestamp_unix is empty", row);
        }
        records.push(EventRecord {
            event_id: uuid_at(event_ids, row, EVENT_ID)?,
            installation_id: uuid_at(installation_ids, row, INSTALLATION_ID)?,
            event: LocationEvent {
                timestamp_unix: timestamps.value(row),
                latitude: float_at(latitude, row),
                longitude: float_at(longitude, row),
                horizontal_accuracy: float_at(horizontal_accuracy, row),
                vertical_accuracy: float_at(vertical_accuracy, row),
                altitude: float_at(altitude, row),
                pressure_hpa: float_at(pressure, row),
                ambient_light_lux: float_at(light, row),
                num_satellites: if satellites.is_null(row) {
                    0
                } else {
                    satellites.value(row)
                },
                device_is_charging: bool_at(charging, row),
                mock_location_enabled: bool_at(mock, row),
                speed: float_at(speed, row),
                bearing: float_at(bearing, row),
                wifi_bssid: string_at(wifi, row),
                cell_tower_id: string_at(cell, row),
            },
        });
    }
    Ok(records)
}

pub fn batch_to_labeled(batch: &RecordBatch) -> Result<Vec<LabeledRecord>> {
    let labels = column::<Int32Array>(batch, LABEL)?;
    batch_to_records(batch)?
        .into_iter()
        .enumerate()
        .map(|(row, record)| {
            if labels.is_null(row) {
                anyhow::bail!("Row {}: {} is empty", row, LABEL);
            }
            Ok(LabeledRecord {
                record,
                spoofed: labels.value(row) != 0,
            })
        })
        .collect()
}

/// Attach ground truth to unlabeled rows by event id.
pub fn join_labels(
    records: Vec<EventRecord>,
    labels: &BTreeMap<Uuid, bool>,
) -> Result<Vec<LabeledRecord>> {
    records
        .into_iter()
        .map(|record| {
            let spoofed = *labels
                .get(&record.event_id)
                .with_context(|| format!("No label for event {}", record.event_id))?;
            Ok(LabeledRecord { record, spoofed })
        })
        .collect()
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .with_context(|| format!("Failed to read header of {}", path.display()))?;
    Ok(line
        .trim_end()
        .split(',')
        .map(|name| name.trim_matches('"').to_string())
        .collect())
}

fn column_names(schema: &Schema) -> Vec<String> {
    schema.fields().iter().map(|f| f.name().clone()).collect()
}

fn read_csv(path: &Path, schema: SchemaRef) -> Result<Vec<RecordBatch>> {
    let header = read_header(path)?;
    let expected = column_names(&schema);
    if header != expected {
        anyhow::bail!(
            "Schema mismatch in {}: expected columns [{}], found [{}]",
            path.display(),
            expected.join(", "),
            header.join(", ")
        );
    }

    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = arrow::csv::ReaderBuilder::new(schema)
        .with_header(true)
        .build(file)
        .with_context(|| format!("Failed to create CSV reader for {}", path.display()))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.with_context(|| format!("Failed to decode {}", path.display()))?);
    }
    debug!(path = %path.display(), batches = batches.len(), "Read CSV");
    Ok(batches)
}

fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = arrow::csv::Writer::new(BufWriter::new(file));
    writer
        .write(batch)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .into_inner()
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    info!(path = %path.display(), rows = batch.num_rows(), "Wrote CSV");
    Ok(())
}

pub fn write_labeled_csv<P: AsRef<Path>>(path: P, records: &[LabeledRecord]) -> Result<()> {
    write_csv(path.as_ref(), &labeled_to_batch(records)?)
}

pub fn read_labeled_csv<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledRecord>> {
    let path = path.as_ref();
    let mut records = Vec::new();
    for batch in read_csv(path, labeled_schema())? {
        records.extend(
            batch_to_labeled(&batch).with_context(|| format!("Invalid rows in {}", path.display()))?,
        );
    }
    Ok(records)
}

pub fn write_events_csv<P: AsRef<Path>>(path: P, records: &[EventRecord]) -> Result<()> {
    write_csv(path.as_ref(), &records_to_batch(records)?)
}

/// Read an event table. A labeled table is accepted too; its label column is
/// ignored.
pub fn read_events_csv<P: AsRef<Path>>(path: P) -> Result<Vec<EventRecord>> {
    let path = path.as_ref();
    let schema = if read_header(path)?.iter().any(|c| c == LABEL) {
        labeled_schema()
    } else {
        event_schema()
    };
    let mut records = Vec::new();
    for batch in read_csv(path, schema)? {
        records.extend(
            batch_to_records(&batch).with_context(|| format!("Invalid rows in {}", path.display()))?,
        );
    }
    Ok(records)
}

pub fn write_labels_csv<P: AsRef<Path>>(path: P, labels: &BTreeMap<Uuid, bool>) -> Result<()> {
    let batch = RecordBatch::try_new(
        label_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(
                labels.keys().map(|id| id.to_string()),
            )),
            Arc::new(Int32Array::from_iter_values(
                labels.values().map(|l| i32::from(*l)),
            )),
        ],
    )
    .context("Failed to build label batch")?;
    write_csv(path.as_ref(), &batch)
}

pub fn read_labels_csv<P: AsRef<Path>>(path: P) -> Result<BTreeMap<Uuid, bool>> {
    let path = path.as_ref();
    let mut labels = BTreeMap::new();
    for batch in read_csv(path, label_schema())? {
        let ids = column::<StringArray>(&batch, EVENT_ID)?;
        let values = column::<Int32Array>(&batch, LABEL)?;
        for row in 0..batch.num_rows() {
            let id = uuid_at(ids, row, EVENT_ID)?;
            if values.is_null(row) {
                anyhow::bail!("Row {}: {} is empty in {}", row, LABEL, path.display());
            }
            labels.insert(id, values.value(row) != 0);
        }
    }
    Ok(labels)
}

/// Prediction table `{event_id, spoof_score_rules, spoof_flag_rules}`,
/// ordered by event id.
pub fn predictions_to_batch(report: &DetectionReport) -> Result<RecordBatch> {
    let flags: Vec<i32> = report.predictions.values().map(|f| i32::from(*f)).collect();
    RecordBatch::try_new(
        prediction_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(
                report.predictions.keys().map(|id| id.to_string()),
            )),
            Arc::new(Float64Array::from_iter_values(
                flags.iter().map(|f| f64::from(*f)),
            )),
            Arc::new(Int32Array::from(flags)),
        ],
    )
    .context("Failed to build prediction batch")
}

pub fn write_predictions_csv<P: AsRef<Path>>(path: P, report: &DetectionReport) -> Result<()> {
    write_csv(path.as_ref(), &predictions_to_batch(report)?)
}

/// Flags from a prediction table, keyed by event id.
pub fn read_predictions_csv<P: AsRef<Path>>(path: P) -> Result<BTreeMap<Uuid, bool>> {
    let path = path.as_ref();
    let mut predictions = BTreeMap::new();
    for batch in read_csv(path, prediction_schema())? {
        let ids = column::<StringArray>(&batch, EVENT_ID)?;
        let flags = column::<Int32Array>(&batch, SPOOF_FLAG)?;
        for row in 0..batch.num_rows() {
            let id = uuid_at(ids, row, EVENT_ID)?;
            if flags.is_null(row) {
                anyhow::bail!("Row {}: {} is empty in {}", row, SPOOF_FLAG, path.display());
            }
            predictions.insert(id, flags.value(row) != 0);
        }
    }
    Ok(predictions)
}

pub fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    info!(path = %path.display(), "Wrote JSON");
    Ok(())
}
