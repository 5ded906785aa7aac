use crate::calibration::CalibrationPlan;
use crate::convert::GasCurve;
use crate::sensors::mcp3008::CHANNELS;
use crate::station::{StationConfig, StationError};
use chrono_tz::Tz;
use clap::Parser;
use embassy_time::Duration;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "airsense")]
#[command(about = "Read SDS011, MQ135 and DHT11 sensors and push readings to a remote store")]
pub struct Args {
    /// Warm up and calibrate the MQ135 baseline before measuring
    #[arg(long, env = "AIRSENSE_CALIBRATE")]
    pub calibrate: bool,

    /// Legacy calibration switch: `y` calibrates, anything else does not
    #[arg(value_name = "y|n", hide = true)]
    pub choice: Option<String>,

    /// SDS011 serial port
    #[arg(long, env = "AIRSENSE_SERIAL_PORT", default_value = "/dev/ttyUSB0")]
    pub serial_port: String,

    #[arg(long, env = "AIRSENSE_BAUD_RATE", default_value_t = 9600)]
    pub baud_rate: u32,

    /// Upper bound on one SDS011 frame read
    #[arg(long, env = "AIRSENSE_SERIAL_TIMEOUT_MS", default_value_t = 1000)]
    pub serial_timeout_ms: u64,

    /// spidev node of the MCP3008
    #[arg(long, env = "AIRSENSE_SPI_DEVICE", default_value = "/dev/spidev0.0")]
    pub spi_device: String,

    #[arg(long, env = "AIRSENSE_SPI_SPEED_HZ", default_value_t = 1_350_000)]
    pub spi_speed_hz: u32,

    /// MCP3008 input wired to the MQ135
    #[arg(long, env = "AIRSENSE_ADC_CHANNEL", default_value_t = 0)]
    pub adc_channel: u8,

    /// IIO directory of the kernel dht11 driver
    #[arg(long, env = "AIRSENSE_DHT_DEVICE", default_value = "/sys/bus/iio/devices/iio:device0")]
    pub dht_device: PathBuf,

    /// File holding the calibrated MQ135 baseline
    #[arg(long, env = "AIRSENSE_BASELINE_FILE", default_value = "r0_value.txt")]
    pub baseline_file: PathBuf,

    /// Base URL of the store; readings go to `<url>/<session>.json`
    #[arg(long, env = "AIRSENSE_STORE_URL")]
    pub store_url: String,

    #[arg(long, env = "AIRSENSE_UPLOAD_TIMEOUT_SECS", default_value_t = 10)]
    pub upload_timeout_secs: u64,

    /// IANA zone of the upload timestamps
    #[arg(long, env = "AIRSENSE_TIMEZONE", default_value = "Europe/Bucharest")]
    pub timezone: String,

    /// Pause between cycles
    #[arg(long, env = "AIRSENSE_INTERVAL_SECS", default_value_t = 1)]
    pub interval_secs: u64,

    #[arg(long, env = "AIRSENSE_WARM_UP_SECS", default_value_t = 20 * 60)]
    pub warm_up_secs: u64,

    #[arg(long, env = "AIRSENSE_CALIBRATION_SAMPLES", default_value_t = 240)]
    pub calibration_samples: usize,

    #[arg(long, env = "AIRSENSE_SAMPLE_INTERVAL_MS", default_value_t = 500)]
    pub sample_interval_ms: u64,
}

impl Args {
    pub fn wants_calibration(&self) -> bool {
        self.calibrate
            || self
                .choice
                .as_deref()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case("y"))
    }

    pub fn station_config(&self) -> Result<StationConfig, StationError> {
        if self.calibration_samples == 0 {
            return Err(StationError::Config("calibration needs at least one sample".into()));
        }
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| StationError::Config(format!("unknown timezone {:?}", self.timezone)))?;

        Ok(StationConfig {
            calibrate: self.wants_calibration(),
            calibration: CalibrationPlan {
                warm_up: Duration::from_secs(self.warm_up_secs),
                samples: self.calibration_samples,
                sample_interval: Duration::from_millis(self.sample_interval_ms),
            },
            cycle_interval: Duration::from_secs(self.interval_secs),
            timezone,
        })
    }

    pub fn adc_channel(&self) -> Result<u8, StationError> {
        if self.adc_channel >= CHANNELS {
            return Err(StationError::Config(format!(
                "ADC channel {} out of range 0..{}",
                self.adc_channel, CHANNELS
            )));
        }
        Ok(self.adc_channel)
    }

    pub fn gas_curve(&self) -> GasCurve {
        GasCurve::MQ135_CO2
    }
}
