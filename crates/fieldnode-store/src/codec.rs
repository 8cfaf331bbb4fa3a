//! Line codec for partition records.
//!
//! Each record is one CSV line:
//! `timestamp,sensor_type,value,unit,endpoint_id,synced` where `synced` is
//! `0` or `1`. String fields are quoted and escaped by the `csv` crate, so
//! commas and quotes survive; line breaks are rejected because a record must
//! occupy exactly one line for tail recovery to work.

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use fieldnode_types::StoredReading;

use crate::error::{Error, Result};

const FIELD_COUNT: usize = 6;

/// Reject readings that cannot be stored as a single line.
pub fn validate(reading: &StoredReading) -> Result<()> {
    for (name, value) in [("sensor_type", &reading.sensor_type), ("unit", &reading.unit)] {
        if value.contains(['\n', '\r']) {
            return Err(Error::InvalidRecord(format!("{name} contains a line break")));
        }
    }
    if reading.sensor_type.is_empty() {
        return Err(Error::InvalidRecord("sensor_type is empty".to_string()));
    }
    Ok(())
}

/// Encode a reading as a newline-terminated line.
pub fn encode(reading: &StoredReading) -> Result<Vec<u8>> {
    validate(reading)?;

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(64));

    writer.write_record([
        reading.timestamp.to_string().as_str(),
        reading.sensor_type.as_str(),
        reading.value.to_string().as_str(),
        reading.unit.as_str(),
        reading.endpoint_id.to_string().as_str(),
        if reading.synced { "1" } else { "0" },
    ])?;

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Decode one line (with or without its trailing newline).
pub fn decode(line: &str) -> Result<StoredReading> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Err(Error::InvalidRecord("empty line".to_string()));
    }
    if record.len() != FIELD_COUNT {
        return Err(Error::InvalidRecord(format!(
            "expected {FIELD_COUNT} fields, found {}",
            record.len()
        )));
    }

    let field = |i: usize| record.get(i).unwrap_or_default();
    let invalid = |name: &str| Error::InvalidRecord(format!("bad {name}: {line:?}"));

    let synced = match field(5) {
        "0" => false,
        "1" => true,
        _ => return Err(invalid("synced flag")),
    };

    Ok(StoredReading {
        timestamp: field(0).parse().map_err(|_| invalid("timestamp"))?,
        sensor_type: field(1).to_string(),
        value: field(2).parse().map_err(|_| invalid("value"))?,
        unit: field(3).to_string(),
        endpoint_id: field(4).parse().map_err(|_| invalid("endpoint_id"))?,
        synced,
    })
}
