use super::mcp3008::Mcp3008;
use super::{Quality, Sensor, SensorData, SensorError, SensorInfo, SensorReading, SensorType};
use crate::calibration::{Baseline, ResistanceSampler};
use crate::convert::{adc_to_voltage, voltage_to_resistance, GasCurve};
use embassy_time::Duration;
use embedded_hal_async::spi::SpiDevice;

/// MQ135 air quality sensor, read as a voltage divider through an MCP3008
/// input.
pub struct Mq135Sensor<SPI> {
    adc: Option<Mcp3008<SPI>>,
    channel: u8,
    curve: GasCurve,
    baseline: Baseline,
    warm_up: Duration,
}

/// One conversion of the divider voltage, before any baseline is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasSample {
    pub code: u16,
    pub voltage: f64,
    pub resistance: f64,
}

impl GasSample {
    pub fn from_code(code: u16, curve: &GasCurve) -> Self {
        let voltage = adc_to_voltage(code, curve.vref);
        Self {
            code,
            voltage,
            resistance: voltage_to_resistance(voltage, curve.vcc, curve.load_resistance),
        }
    }
}

impl<SPI: SpiDevice> Mq135Sensor<SPI> {
    pub fn new(adc: Mcp3008<SPI>, channel: u8, curve: GasCurve, warm_up: Duration) -> Self {
        Self {
            adc: Some(adc),
            channel,
            curve,
            baseline: Baseline::default(),
            warm_up,
        }
    }

    pub fn set_baseline(&mut self, baseline: Baseline) {
        self.baseline = baseline;
    }

    pub fn curve(&self) -> &GasCurve {
        &self.curve
    }

    pub async fn sample(&mut self) -> Result<GasSample, SensorError> {
        let adc = self.adc.as_mut().ok_or(SensorError::NotInitialized)?;
        let code = adc.read_channel(self.channel).await?;
        Ok(GasSample::from_code(code, &self.curve))
    }

    /// Reading built from a sample, with the concentration against the
    /// current baseline.
    pub fn reading_from(&self, sample: GasSample) -> SensorReading {
        let co2_ppm = self.curve.ppm(sample.resistance, self.baseline.ohms());
        let data = SensorData::Gas {
            code: sample.code,
            voltage: sample.voltage,
            resistance: sample.resistance,
            co2_ppm,
        };
        let quality = if co2_ppm.is_some() {
            Quality::Good
        } else {
            Quality::Degraded
        };
        SensorReading::new(SensorType::MQ135, data, quality)
    }
}

impl<SPI: SpiDevice> Sensor for Mq135Sensor<SPI> {
    async fn init(&mut self) -> Result<(), SensorError> {
        // A throwaway conversion proves the bus and channel answer.
        self.sample().await.map(|_| ())
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let sample = self.sample().await?;
        Ok(self.reading_from(sample))
    }

    fn info(&self) -> SensorInfo {
        SensorInfo {
            name: "MQ135",
            interface: "SPI (MCP3008)",
            manufacturer: "Hanwei Electronics",
        }
    }

    fn release(&mut self) {
        self.adc = None;
    }

    fn warm_up_time(&self) -> Duration {
        self.warm_up
    }

    fn needs_calibration(&self) -> bool {
        true
    }
}

impl<SPI: SpiDevice> ResistanceSampler for Mq135Sensor<SPI> {
    async fn sample_resistance(&mut self) -> Result<f64, SensorError> {
        self.sample().await.map(|s| s.resistance)
    }
}
