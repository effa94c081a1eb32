//! Telemetry sources.
//!
//! Where records come from is outside the protocol: a simulator, a flight
//! controller, a file. The producer only needs [`TelemetrySource`].

use std::future::Future;

use skylink_proto::TelemetryRecord;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use crate::error::ClientError;

/// Supplies records to stream.
pub trait TelemetrySource: Send {
    /// Next record. `Ok(None)` once the source is exhausted.
    fn next_record(
        &mut self,
    ) -> impl Future<Output = Result<Option<TelemetryRecord>, ClientError>> + Send;
}

/// Source backed by an iterator.
#[derive(Debug)]
pub struct IterSource<I> {
    records: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = TelemetryRecord> + Send,
{
    /// Stream every record the iterator yields.
    pub fn new(records: I) -> Self {
        Self { records }
    }
}

impl<I> TelemetrySource for IterSource<I>
where
    I: Iterator<Item = TelemetryRecord> + Send,
{
    async fn next_record(&mut self) -> Result<Option<TelemetryRecord>, ClientError> {
        Ok(self.records.next())
    }
}

/// Source reading one JSON record per line.
///
/// Blank lines are skipped. Lines that do not parse as a record are logged
/// and skipped, so one bad sample does not end the stream.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    reader: R,
    line: String,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Read records from `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader, line: String::new() }
    }
}

impl<R> TelemetrySource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_record(&mut self) -> Result<Option<TelemetryRecord>, ClientError> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .await
                .map_err(|e| ClientError::Source(e.to_string()))?;
            if read == 0 {
                return Ok(None);
            }

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }

            match TelemetryRecord::from_json(text) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => warn!(error = %e, "skipping malformed telemetry line"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use skylink_proto::FlightStatus;
    use tokio::io::BufReader;

    use super::*;

    fn record(timestamp: f64) -> TelemetryRecord {
        TelemetryRecord {
            timestamp,
            latitude: 1.5,
            longitude: 2.5,
            altitude: 100.0,
            speed: 10.0,
            heading: 45.0,
            battery_level: 50.0,
            status: FlightStatus::Active,
        }
    }

    #[tokio::test]
    async fn iter_source_yields_then_ends() {
        let mut source = IterSource::new(vec![record(1.0), record(2.0)].into_iter());

        assert_eq!(source.next_record().await, Ok(Some(record(1.0))));
        assert_eq!(source.next_record().await, Ok(Some(record(2.0))));
        assert_eq!(source.next_record().await, Ok(None));
    }

    #[tokio::test]
    async fn json_lines_skip_blank_and_malformed() {
        let input = format!(
            "{}\n\nnot json\n{{\"timestamp\": 1}}\n{}\n",
            record(1.0).to_json().unwrap(),
            record(2.0).to_json().unwrap()
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()));

        assert_eq!(source.next_record().await, Ok(Some(record(1.0))));
        assert_eq!(source.next_record().await, Ok(Some(record(2.0))));
        assert_eq!(source.next_record().await, Ok(None));
    }

    #[tokio::test]
    async fn json_lines_accept_missing_trailing_newline() {
        let input = record(3.0).to_json().unwrap();
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()));

        assert_eq!(source.next_record().await, Ok(Some(record(3.0))));
        assert_eq!(source.next_record().await, Ok(None));
    }
}
