//! Raw sensor values to physical units.
//!
//! Everything here is pure and total: domain faults (zero voltage, a ratio
//! outside the logarithm's domain) come back as `INFINITY` or `None`, never
//! as a panic.

/// Highest code of the 10-bit MCP3008.
pub const ADC_MAX_CODE: u16 = 1023;

/// Minimum bytes of an SDS011 frame needed to decode PM2.5 and PM10.
pub const PM_PAIR_MIN_LEN: usize = 6;

/// Electrical and curve-fit constants for the MQ135 gas sensor.
///
/// The curve is the log-log fit `ppm = 10^(a * log10(Rs/R0) + b)`;
/// the defaults are the CO2 line of the MQ135 datasheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasCurve {
    /// ADC reference voltage.
    pub vref: f64,
    /// Sensor supply voltage.
    pub vcc: f64,
    /// Load resistor, ohms.
    pub load_resistance: f64,
    pub slope: f64,
    pub intercept: f64,
}

impl GasCurve {
    pub const MQ135_CO2: Self = Self {
        vref: 3.3,
        vcc: 5.0,
        load_resistance: 10_000.0,
        slope: -0.42,
        intercept: 1.92,
    };

    pub fn ppm(&self, rs: f64, r0: f64) -> Option<f64> {
        resistance_to_ppm(rs, r0, self.slope, self.intercept)
    }
}

impl Default for GasCurve {
    fn default() -> Self {
        Self::MQ135_CO2
    }
}

/// Proportional voltage of a 10-bit ADC code. Codes above 1023 are clamped.
pub fn adc_to_voltage(code: u16, vref: f64) -> f64 {
    f64::from(code.min(ADC_MAX_CODE)) / f64::from(ADC_MAX_CODE) * vref
}

/// Sensor resistance in a voltage divider with load `rl`.
///
/// Zero volts across the load means no current, so the sensor is an open
/// circuit: `INFINITY`.
pub fn voltage_to_resistance(voltage: f64, vcc: f64, rl: f64) -> f64 {
    if voltage == 0.0 {
        return f64::INFINITY;
    }
    (vcc - voltage) / voltage * rl
}

/// Gas concentration from the power-law fit, `None` outside the log domain.
pub fn resistance_to_ppm(rs: f64, r0: f64, a: f64, b: f64) -> Option<f64> {
    if !(rs > 0.0 && r0 > 0.0) || !rs.is_finite() || !r0.is_finite() {
        return None;
    }
    let ppm = libm::pow(10.0, a * libm::log10(rs / r0) + b);
    ppm.is_finite().then_some(ppm)
}

/// PM2.5 and PM10 in µg/m³ from bytes `[2..4]` and `[4..6]` (little-endian,
/// tenths).
pub fn decode_pm_pair(frame: &[u8]) -> Option<(f64, f64)> {
    if frame.len() < PM_PAIR_MIN_LEN {
        return None;
    }
    let pm25 = u16::from_le_bytes([frame[2], frame[3]]);
    let pm10 = u16::from_le_bytes([frame[4], frame[5]]);
    Some((f64::from(pm25) / 10.0, f64::from(pm10) / 10.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_is_monotonic_and_bounded() {
        let mut previous = 0.0;
        for code in 0..=ADC_MAX_CODE {
            let v = adc_to_voltage(code, 3.3);
            assert!(v >= previous, "code {code} went down");
            assert!((0.0..=3.3).contains(&v));
            previous = v;
        }
        assert_eq!(adc_to_voltage(0, 3.3), 0.0);
        assert_eq!(adc_to_voltage(ADC_MAX_CODE, 3.3), 3.3);
    }

    #[test]
    fn out_of_range_code_is_clamped() {
        assert_eq!(adc_to_voltage(4095, 3.3), adc_to_voltage(ADC_MAX_CODE, 3.3));
    }

    #[test]
    fn zero_voltage_is_open_circuit() {
        assert_eq!(voltage_to_resistance(0.0, 5.0, 10_000.0), f64::INFINITY);
    }

    #[test]
    fn divider_resistance() {
        // 2.5 V across the load at 5 V supply: sensor equals the load.
        let rs = voltage_to_resistance(2.5, 5.0, 10_000.0);
        assert!((rs - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn ppm_undefined_outside_log_domain() {
        assert_eq!(resistance_to_ppm(0.0, 144_020.0, -0.42, 1.92), None);
        assert_eq!(resistance_to_ppm(-5.0, 144_020.0, -0.42, 1.92), None);
        assert_eq!(resistance_to_ppm(72_010.0, 0.0, -0.42, 1.92), None);
        assert_eq!(resistance_to_ppm(72_010.0, -1.0, -0.42, 1.92), None);
        assert_eq!(resistance_to_ppm(f64::INFINITY, 144_020.0, -0.42, 1.92), None);
    }

    #[test]
    fn ppm_follows_power_law() {
        let ppm = resistance_to_ppm(72_010.0, 144_020.0, -0.42, 1.92).unwrap();
        let expected = 10f64.powf(-0.42 * 0.5f64.log10() + 1.92);
        assert!((ppm - expected).abs() < 1e-9);
        assert!((ppm - 111.3).abs() < 0.1);

        // Rs == R0 leaves only the intercept.
        let at_baseline = resistance_to_ppm(144_020.0, 144_020.0, -0.42, 1.92).unwrap();
        assert!((at_baseline - 10f64.powf(1.92)).abs() < 1e-9);
    }

    #[test]
    fn pm_pair_is_little_endian_tenths() {
        let frame = [0, 0, 100, 0, 200, 0, 0, 0, 0, 0];
        assert_eq!(decode_pm_pair(&frame), Some((10.0, 20.0)));

        let frame = [0xAA, 0xC0, 0x34, 0x12, 0x01, 0x01];
        assert_eq!(decode_pm_pair(&frame), Some((466.0, 25.7)));
    }

    #[test]
    fn short_frame_has_no_pm() {
        assert_eq!(decode_pm_pair(&[]), None);
        assert_eq!(decode_pm_pair(&[0xAA, 0xC0, 1, 2, 3]), None);
    }

    #[test]
    fn curve_chains_conversions() {
        let curve = GasCurve::default();
        let rs = voltage_to_resistance(adc_to_voltage(0, curve.vref), curve.vcc, curve.load_resistance);
        assert_eq!(rs, f64::INFINITY);
        assert_eq!(curve.ppm(rs, 144_020.0), None);
    }
}
