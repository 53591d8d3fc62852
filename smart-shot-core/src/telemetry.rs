//! Telemetry records and their JSON wire form
//!
//! ```text
//! {"status":"sensor","distance":12.5,"aciertos":3}
//! {"status":"led","state":1}
//! ```
//! Fields that do not apply to a status are left out. Distances are rounded to
//! 0.01 cm before encoding so what the observer decodes is exactly what the
//! device recorded.

use serde::{Deserialize, Serialize};

/// Largest encoded record, with headroom
pub const PAYLOAD_CAPACITY: usize = 96;

/// Kind of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Distance and hit count
    Sensor,
    /// Status LED state
    Led,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<u8>,
    #[serde(rename = "aciertos", default, skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u32>,
}

impl TelemetryRecord {
    pub fn sensor(distance: f32, hit_count: u32) -> Self {
        Self {
            status: Status::Sensor,
            distance: Some(libm::roundf(distance * 100.0) / 100.0),
            state: None,
            hit_count: Some(hit_count),
        }
    }

    pub fn led(on: bool) -> Self {
        Self {
            status: Status::Led,
            distance: None,
            state: Some(u8::from(on)),
            hit_count: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    #[error("payload buffer too small")]
    BufferFull,
    #[error("record could not be serialized")]
    Serialize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    #[error("payload is not a telemetry record")]
    Malformed,
}

/// Turns a record into bytes for the transport
pub trait TelemetryEncoder {
    /// Writes the encoded record into `buf`, returning its length
    fn encode(&mut self, record: &TelemetryRecord, buf: &mut [u8]) -> Result<usize, EncodeError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl TelemetryEncoder for JsonEncoder {
    fn encode(&mut self, record: &TelemetryRecord, buf: &mut [u8]) -> Result<usize, EncodeError> {
        serde_json_core::to_slice(record, buf).map_err(|e| match e {
            serde_json_core::ser::Error::BufferFull => EncodeError::BufferFull,
            _ => EncodeError::Serialize,
        })
    }
}

/// Parses a payload produced by [`JsonEncoder`]
pub fn decode(bytes: &[u8]) -> Result<TelemetryRecord, DecodeError> {
    serde_json_core::from_slice::<TelemetryRecord>(bytes)
        .map(|(record, _)| record)
        .map_err(|_| DecodeError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(record: &TelemetryRecord) -> std::vec::Vec<u8> {
        let mut buf = [0u8; PAYLOAD_CAPACITY];
        let len = JsonEncoder.encode(record, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn sensor_record_wire_form() {
        let bytes = encode(&TelemetryRecord::sensor(12.5, 3));
        assert_eq!(
            core::str::from_utf8(&bytes).unwrap(),
            r#"{"status":"sensor","distance":12.5,"aciertos":3}"#
        );
    }

    #[test]
    fn led_record_wire_form() {
        let bytes = encode(&TelemetryRecord::led(true));
        assert_eq!(core::str::from_utf8(&bytes).unwrap(), r#"{"status":"led","state":1}"#);
    }

    #[test]
    fn sensor_record_round_trips() {
        let record = TelemetryRecord::sensor(12.5, 3);
        let decoded = decode(&encode(&record)).unwrap();
        assert_eq!(decoded.status, Status::Sensor);
        assert_eq!(decoded.distance, Some(12.5));
        assert_eq!(decoded.hit_count, Some(3));
        assert_eq!(decoded, record);
    }

    #[test]
    fn rounded_distances_round_trip_exactly() {
        for distance in [0.01, 3.456, 19.999, 123.45, 399.99] {
            let record = TelemetryRecord::sensor(distance, u32::MAX);
            assert_eq!(decode(&encode(&record)).unwrap(), record);
        }
    }

    #[test]
    fn distance_is_rounded_to_hundredths() {
        let record = TelemetryRecord::sensor(17.156, 0);
        assert_eq!(record.distance, Some(17.16));
    }

    #[test]
    fn short_buffer_is_an_encode_error() {
        let mut buf = [0u8; 8];
        assert_eq!(
            JsonEncoder.encode(&TelemetryRecord::sensor(12.5, 3), &mut buf),
            Err(EncodeError::BufferFull)
        );
    }

    #[test]
    fn largest_record_fits_the_payload_buffer() {
        let bytes = encode(&TelemetryRecord::sensor(399.99, u32::MAX));
        assert!(bytes.len() < PAYLOAD_CAPACITY);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert_eq!(decode(b"reset"), Err(DecodeError::Malformed));
        assert_eq!(decode(br#"{"status":"laser"}"#), Err(DecodeError::Malformed));
    }
}
