//! One cycle's worth of readings.

use crate::classify::{self, GasLevel, PmCategory};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

/// Marker written in place of a missing number, so "no reading" never looks
/// like a zero.
pub const MISSING: &str = "NaN";

/// A numeric field that may not have a value this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    Present(f64),
    /// The sensor produced no data.
    Absent,
    /// The sensor answered but the value is outside the conversion domain.
    Undefined,
}

impl Field {
    pub fn value(self) -> Option<f64> {
        match self {
            Field::Present(v) => Some(v),
            Field::Absent | Field::Undefined => None,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Field::Present(_))
    }

    /// Rounded to `decimals` places; non-values pass through.
    pub fn rounded(self, decimals: i32) -> Self {
        match self {
            Field::Present(v) => Field::Present(round_to(v, decimals)),
            other => other,
        }
    }
}

impl From<Option<f64>> for Field {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Field::Absent, Field::Present)
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Present(v) => serializer.serialize_f64(*v),
            Field::Absent | Field::Undefined => serializer.serialize_str(MISSING),
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Every value the station derives in one cycle. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub pm25: Field,
    pub pm10: Field,
    pub mq135_voltage: f64,
    pub estimated_co2_ppm: Field,
    pub temperature_c: Field,
    pub humidity_pct: Field,
    pub timestamp: DateTime<Tz>,
}

/// Severity labels for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub pm25: Option<PmCategory>,
    pub pm10: Option<PmCategory>,
    pub gas: GasLevel,
}

impl Snapshot {
    /// Upload only happens when the particulate sensor delivered both values.
    pub fn has_particulates(&self) -> bool {
        self.pm25.is_present() && self.pm10.is_present()
    }

    pub fn classify(&self) -> Classification {
        Classification {
            pm25: self.pm25.value().map(classify::pm25),
            pm10: self.pm10.value().map(classify::pm10),
            gas: classify::mq135_voltage(self.mq135_voltage),
        }
    }

    /// Human-readable status, one line per pollutant.
    pub fn summary(&self) -> [String; 5] {
        let class = self.classify();
        let or_na = |field: Field, precision: usize| {
            field
                .value()
                .map_or_else(|| "N/A".to_string(), |v| format!("{v:.precision$}"))
        };
        let co2 = match self.estimated_co2_ppm.value() {
            Some(ppm) => format!("{ppm:.0} ppm"),
            None => "Calculation error".to_string(),
        };

        [
            format!(
                "PM2.5: {} ug/m3 - {}",
                or_na(self.pm25, 1),
                classify::pm_label(class.pm25)
            ),
            format!(
                "PM10: {} ug/m3 - {}",
                or_na(self.pm10, 1),
                classify::pm_label(class.pm10)
            ),
            format!("MQ135 Voltage: {:.2} V - {}", self.mq135_voltage, class.gas),
            format!("Estimated CO2: {co2}"),
            format!(
                "Temperature: {}'C, Humidity: {}%",
                or_na(self.temperature_c, 1),
                or_na(self.humidity_pct, 1)
            ),
        ]
    }
}
