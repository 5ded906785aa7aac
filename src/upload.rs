//! Delivery of snapshots to the remote time-series store.
//!
//! Each snapshot is POSTed once to `{base}/{session}.json`, which appends a
//! new entry under the session. Failures are reported to the caller and
//! never retried.

use crate::session::SessionId;
use crate::snapshot::{round_to, Field, Snapshot};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use std::time::Duration;

/// Wire form of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    #[serde(rename = "PM25")]
    pub pm25: Field,
    #[serde(rename = "PM10")]
    pub pm10: Field,
    #[serde(rename = "MQ135_voltage")]
    pub mq135_voltage: f64,
    #[serde(rename = "Estimated_CO2_ppm")]
    pub estimated_co2_ppm: Field,
    #[serde(rename = "Temperature_C")]
    pub temperature_c: Field,
    #[serde(rename = "Humidity_percent")]
    pub humidity_percent: Field,
    /// Send time, ISO-8601 with offset.
    pub timestamp: String,
}

impl Payload {
    pub fn new(snapshot: &Snapshot, sent_at: &DateTime<Tz>) -> Self {
        Self {
            pm25: snapshot.pm25,
            pm10: snapshot.pm10,
            mq135_voltage: round_to(snapshot.mq135_voltage, 2),
            estimated_co2_ppm: snapshot.estimated_co2_ppm.rounded(2),
            temperature_c: snapshot.temperature_c.rounded(1),
            humidity_percent: snapshot.humidity_pct.rounded(1),
            timestamp: sent_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// An append-only write target keyed by session.
pub trait Uploader {
    fn upload(&mut self, session: &SessionId, payload: &Payload) -> Result<(), UploadError>;
}

/// Uploader for a Firebase-style REST store.
pub struct HttpUploader {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpUploader {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn session_url(&self, session: &SessionId) -> String {
        format!("{}/{}.json", self.base_url, session)
    }
}

impl Uploader for HttpUploader {
    fn upload(&mut self, session: &SessionId, payload: &Payload) -> Result<(), UploadError> {
        let response = self.client.post(self.session_url(session)).json(payload).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(UploadError::Status {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot;
    use serde_json::json;

    #[test]
    fn payload_field_names_and_rounding() {
        let snap = Snapshot {
            mq135_voltage: 0.7349,
            estimated_co2_ppm: Field::Present(415.678),
            temperature_c: Field::Present(21.04),
            ..snapshot()
        };
        let payload = Payload::new(&snap, &snap.timestamp);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "PM25": 12.0,
                "PM10": 424.1,
                "MQ135_voltage": 0.73,
                "Estimated_CO2_ppm": 415.68,
                "Temperature_C": 21.0,
                "Humidity_percent": 40.0,
                "timestamp": "2025-05-01T12:00:00+03:00",
            })
        );
    }

    #[test]
    fn absent_values_are_marked_not_zeroed() {
        let snap = Snapshot {
            estimated_co2_ppm: Field::Undefined,
            temperature_c: Field::Absent,
            humidity_pct: Field::Absent,
            ..snapshot()
        };
        let value = serde_json::to_value(Payload::new(&snap, &snap.timestamp)).unwrap();

        assert_eq!(value["Estimated_CO2_ppm"], "NaN");
        assert_eq!(value["Temperature_C"], "NaN");
        assert_eq!(value["Humidity_percent"], "NaN");
    }

    #[test]
    fn session_url_has_json_suffix() {
        let uploader = HttpUploader::new("https://store.example/air_quality_data/", Duration::from_secs(5)).unwrap();
        let session = SessionId::starting_at(&snapshot().timestamp);
        assert_eq!(
            uploader.session_url(&session),
            "https://store.example/air_quality_data/session_2025-05-01_12-00.json"
        );
    }
}
