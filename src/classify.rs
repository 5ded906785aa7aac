//! Severity bands for each pollutant.
//!
//! A value at a band's upper threshold belongs to that band. Every reading is
//! classified on its own; there is no smoothing between cycles.

use core::fmt;

/// Air quality index tiers shared by PM2.5 and PM10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PmCategory {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

/// Coarse MQ135 output level, judged from the raw divider voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GasLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

/// Label printed when the particulate sensor returned nothing usable.
pub const NO_VALID_DATA: &str = "No valid data";

const PM25_BANDS: [(f64, PmCategory); 5] = [
    (12.0, PmCategory::Good),
    (35.4, PmCategory::Moderate),
    (55.4, PmCategory::UnhealthyForSensitive),
    (150.4, PmCategory::Unhealthy),
    (250.4, PmCategory::VeryUnhealthy),
];

const PM10_BANDS: [(f64, PmCategory); 5] = [
    (54.0, PmCategory::Good),
    (154.0, PmCategory::Moderate),
    (254.0, PmCategory::UnhealthyForSensitive),
    (354.0, PmCategory::Unhealthy),
    (424.0, PmCategory::VeryUnhealthy),
];

const MQ135_BANDS: [(f64, GasLevel); 3] = [
    (0.4, GasLevel::Low),
    (1.0, GasLevel::Moderate),
    (1.5, GasLevel::High),
];

/// First band whose threshold is not below `value`; `top` otherwise (NaN
/// included).
fn band<T: Copy>(value: f64, bands: &[(f64, T)], top: T) -> T {
    bands
        .iter()
        .find(|(threshold, _)| value <= *threshold)
        .map_or(top, |(_, tier)| *tier)
}

pub fn pm25(value: f64) -> PmCategory {
    band(value, &PM25_BANDS, PmCategory::Hazardous)
}

pub fn pm10(value: f64) -> PmCategory {
    band(value, &PM10_BANDS, PmCategory::Hazardous)
}

pub fn mq135_voltage(voltage: f64) -> GasLevel {
    band(voltage, &MQ135_BANDS, GasLevel::Extreme)
}

/// Label for an optional particulate value.
pub fn pm_label(category: Option<PmCategory>) -> &'static str {
    category.map_or(NO_VALID_DATA, PmCategory::label)
}

impl PmCategory {
    pub fn label(self) -> &'static str {
        match self {
            PmCategory::Good => "Good",
            PmCategory::Moderate => "Moderate",
            PmCategory::UnhealthyForSensitive => "Unhealthy (for sensitive)",
            PmCategory::Unhealthy => "Unhealthy",
            PmCategory::VeryUnhealthy => "Very Unhealthy",
            PmCategory::Hazardous => "Hazardous",
        }
    }
}

impl GasLevel {
    pub fn label(self) -> &'static str {
        match self {
            GasLevel::Low => "Low gas concentration",
            GasLevel::Moderate => "Moderate gas concentration",
            GasLevel::High => "High gas concentration",
            GasLevel::Extreme => "Extreme gas concentration",
        }
    }
}

impl fmt::Display for PmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for GasLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pm25_boundaries_belong_to_lower_tier() {
        assert_eq!(pm25(0.0), PmCategory::Good);
        assert_eq!(pm25(12.0), PmCategory::Good);
        assert_eq!(pm25(12.1), PmCategory::Moderate);
        assert_eq!(pm25(35.4), PmCategory::Moderate);
        assert_eq!(pm25(55.4), PmCategory::UnhealthyForSensitive);
        assert_eq!(pm25(150.4), PmCategory::Unhealthy);
        assert_eq!(pm25(250.4), PmCategory::VeryUnhealthy);
        assert_eq!(pm25(250.5), PmCategory::Hazardous);
    }

    #[test]
    fn pm10_boundaries_belong_to_lower_tier() {
        assert_eq!(pm10(54.0), PmCategory::Good);
        assert_eq!(pm10(54.1), PmCategory::Moderate);
        assert_eq!(pm10(354.0), PmCategory::Unhealthy);
        assert_eq!(pm10(424.0), PmCategory::VeryUnhealthy);
        assert_eq!(pm10(424.1), PmCategory::Hazardous);
    }

    #[test]
    fn gas_voltage_tiers() {
        assert_eq!(mq135_voltage(0.0), GasLevel::Low);
        assert_eq!(mq135_voltage(0.4), GasLevel::Low);
        assert_eq!(mq135_voltage(0.41), GasLevel::Moderate);
        assert_eq!(mq135_voltage(1.5), GasLevel::High);
        assert_eq!(mq135_voltage(3.3), GasLevel::Extreme);
    }

    #[test]
    fn tiers_are_ordered() {
        let mut last = PmCategory::Good;
        for value in [0.0, 20.0, 40.0, 100.0, 200.0, 300.0, 1000.0] {
            let tier = pm25(value);
            assert!(tier >= last);
            last = tier;
        }
    }

    #[test]
    fn nan_lands_in_top_tier() {
        assert_eq!(pm25(f64::NAN), PmCategory::Hazardous);
        assert_eq!(mq135_voltage(f64::NAN), GasLevel::Extreme);
    }

    #[test]
    fn labels() {
        assert_eq!(pm_label(None), "No valid data");
        assert_eq!(pm_label(Some(pm10(424.0))), "Very Unhealthy");
        assert_eq!(PmCategory::UnhealthyForSensitive.to_string(), "Unhealthy (for sensitive)");
    }
}
