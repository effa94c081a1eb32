//! Telemetry records.
//!
//! A record is the plaintext payload a producer seals and the coordinator
//! fans out. Subscribers receive it as a JSON object with exactly these field
//! names.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Decimal places kept for latitude and longitude.
const COORDINATE_PRECISION: i32 = 6;

/// Decimal places kept for every other numeric field.
const MEASUREMENT_PRECISION: i32 = 2;

/// Operational state reported by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    /// Battery has charge left
    Active,
    /// Battery is empty
    BatteryDepleted,
}

impl FlightStatus {
    /// Status implied by a battery level in percent.
    pub fn from_battery(battery_level: f64) -> Self {
        if battery_level > 0.0 { Self::Active } else { Self::BatteryDepleted }
    }
}

/// One telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Sample time, seconds since the Unix epoch
    pub timestamp: f64,
    /// Decimal degrees
    pub latitude: f64,
    /// Decimal degrees
    pub longitude: f64,
    /// Meters
    pub altitude: f64,
    /// Meters per second
    pub speed: f64,
    /// Degrees clockwise from north, 0 to 360
    pub heading: f64,
    /// Percent, 0 to 100
    pub battery_level: f64,
    /// Operational state
    pub status: FlightStatus,
}

impl TelemetryRecord {
    /// Round every field to its wire precision.
    ///
    /// Coordinates keep six decimals, all other measurements two. The
    /// timestamp is left untouched. `status` is recomputed from the rounded
    /// battery level, whatever the source reported.
    #[must_use]
    pub fn normalized(self) -> Self {
        let battery_level = round_to(self.battery_level, MEASUREMENT_PRECISION);
        Self {
            latitude: round_to(self.latitude, COORDINATE_PRECISION),
            longitude: round_to(self.longitude, COORDINATE_PRECISION),
            altitude: round_to(self.altitude, MEASUREMENT_PRECISION),
            speed: round_to(self.speed, MEASUREMENT_PRECISION),
            heading: round_to(self.heading, MEASUREMENT_PRECISION),
            battery_level,
            status: FlightStatus::from_battery(battery_level),
            ..self
        }
    }

    /// Check that every field is finite and inside its documented range, and
    /// that `status` agrees with the battery level.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidRecord` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("timestamp", self.timestamp),
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("altitude", self.altitude),
            ("speed", self.speed),
            ("heading", self.heading),
            ("battery_level", self.battery_level),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ProtocolError::InvalidRecord { field, reason: "not a finite number" });
        }

        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;
        check_range("heading", self.heading, 0.0, 360.0)?;
        check_range("battery_level", self.battery_level, 0.0, 100.0)?;

        if self.speed < 0.0 {
            return Err(ProtocolError::InvalidRecord { field: "speed", reason: "negative" });
        }

        if self.status != FlightStatus::from_battery(self.battery_level) {
            return Err(ProtocolError::InvalidRecord {
                field: "status",
                reason: "disagrees with battery level",
            });
        }

        Ok(())
    }

    /// Subscriber-facing JSON encoding.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Encoding` if serialization fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encoding(e.to_string()))
    }

    /// Parse the subscriber-facing JSON encoding.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Encoding` if the text is not a valid record
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Encoding(e.to_string()))
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidRecord { field, reason: "out of range" })
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetryRecord {
        TelemetryRecord {
            timestamp: 1_700_000_000.25,
            latitude: 50.123_456_789,
            longitude: -118.243_700_4,
            altitude: 10.004,
            speed: 20.0,
            heading: 270.126,
            battery_level: 87.333,
            status: FlightStatus::Active,
        }
    }

    #[test]
    fn normalized_rounds_to_wire_precision() {
        let record = sample().normalized();

        assert_eq!(record.latitude, 50.123_457);
        assert_eq!(record.longitude, -118.2437);
        assert_eq!(record.altitude, 10.0);
        assert_eq!(record.heading, 270.13);
        assert_eq!(record.battery_level, 87.33);
        assert_eq!(record.timestamp, 1_700_000_000.25);
    }

    #[test]
    fn normalized_derives_status_from_battery() {
        let mut record = sample();
        record.battery_level = 0.0;
        record.status = FlightStatus::Active;
        assert_eq!(record.normalized().status, FlightStatus::BatteryDepleted);

        // Rounds to zero first, so the status follows the rounded value.
        let mut record = sample();
        record.battery_level = 0.004;
        assert_eq!(record.normalized().status, FlightStatus::BatteryDepleted);

        let mut record = sample();
        record.status = FlightStatus::BatteryDepleted;
        assert_eq!(record.normalized().status, FlightStatus::Active);
    }

    #[test]
    fn validate_rejects_status_contradicting_battery() {
        let mut record = sample();
        record.battery_level = 0.0;
        record.status = FlightStatus::Active;

        assert!(matches!(
            record.validate(),
            Err(ProtocolError::InvalidRecord { field: "status", .. })
        ));
        assert!(record.normalized().validate().is_ok());
    }

    #[test]
    fn json_uses_snake_case_fields_and_status() {
        let mut record = sample();
        record.status = FlightStatus::BatteryDepleted;
        let json = record.to_json().unwrap();

        assert!(json.contains("\"battery_level\":"));
        assert!(json.contains("\"status\":\"battery_depleted\""));
        assert_eq!(TelemetryRecord::from_json(&json).unwrap(), record);
    }

    #[test]
    fn validate_accepts_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let mut record = sample();
        record.heading = 361.0;
        assert!(matches!(
            record.validate(),
            Err(ProtocolError::InvalidRecord { field: "heading", .. })
        ));

        let mut record = sample();
        record.battery_level = -0.5;
        assert!(matches!(
            record.validate(),
            Err(ProtocolError::InvalidRecord { field: "battery_level", .. })
        ));

        let mut record = sample();
        record.altitude = f64::NAN;
        assert!(matches!(
            record.validate(),
            Err(ProtocolError::InvalidRecord { field: "altitude", .. })
        ));
    }

    #[test]
    fn status_follows_battery() {
        assert_eq!(FlightStatus::from_battery(0.05), FlightStatus::Active);
        assert_eq!(FlightStatus::from_battery(0.0), FlightStatus::BatteryDepleted);
    }
}
