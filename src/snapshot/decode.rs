//! CSV decoding into snapshots
//!
//! The whole payload is accepted or rejected as a unit. A single ragged row
//! or undecodable byte fails the parse; partially valid data is never
//! turned into a snapshot.

use crate::source::FetchError;

use super::record::{Snapshot, Value};

/// Parse a headed CSV document into a snapshot
pub fn parse_csv(input: &[u8]) -> Result<Snapshot, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(input);

    let headers = reader.headers().map_err(FetchError::Malformed)?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(FetchError::MissingHeader);
    }

    let mut snapshot = Snapshot::new(headers.iter());

    for row in reader.records() {
        let row = row.map_err(FetchError::Malformed)?;
        snapshot.push_row(row.iter().map(Value::infer).collect());
    }

    Ok(snapshot)
}
