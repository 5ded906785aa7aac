pub mod dht11;
pub mod manager;
pub mod mcp3008;
pub mod mq135;
pub mod sds011;

use embassy_time::{Duration, Instant};

/// Common lifecycle of every sensor the station drives.
///
/// Reads are sequential and bounded: each implementation either answers
/// within its own timeout or reports an error for this cycle only.
#[allow(async_fn_in_trait)]
pub trait Sensor {
    /// Bring the sensor into a readable state.
    /// Called once during bootstrap; a failure here is reported, not fatal.
    async fn init(&mut self) -> Result<(), SensorError>;

    /// Take one reading.
    async fn read(&mut self) -> Result<SensorReading, SensorError>;

    /// Static information about this sensor
    fn info(&self) -> SensorInfo;

    /// Close the underlying device handle. Reads fail with
    /// [`SensorError::NotInitialized`] afterwards.
    fn release(&mut self);

    /// How long the sensor needs to stabilise after power-on
    fn warm_up_time(&self) -> Duration {
        Duration::from_secs(0)
    }

    /// Whether the sensor needs a baseline before its readings mean anything
    fn needs_calibration(&self) -> bool {
        false
    }
}

/// One sensor's answer for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub sensor_type: SensorType,
    pub data: SensorData,
    pub taken_at: Instant,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorData {
    /// Particulate matter (SDS011), µg/m³.
    AirQuality {
        pm25: Option<f64>,
        pm10: Option<f64>,
    },

    /// Analog gas sensor (MQ135) behind the ADC.
    Gas {
        code: u16,
        voltage: f64,
        resistance: f64,
        co2_ppm: Option<f64>,
    },

    /// Temperature (°C) and relative humidity (%).
    Environmental {
        temperature: f64,
        humidity: f64,
    },
}

/// Data quality indicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quality {
    /// Sensor operating normally, data is reliable
    Good,
    /// Data was decoded but failed an integrity check
    Degraded,
    /// No usable data this cycle
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    SDS011,
    MQ135,
    DHT11,
}

#[derive(Debug, Clone)]
pub struct SensorInfo {
    pub name: &'static str,
    pub interface: &'static str,
    pub manufacturer: &'static str,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    /// Never initialized, or already released
    #[error("sensor not initialized")]
    NotInitialized,

    #[error("communication error: {0}")]
    Communication(String),

    #[error("invalid data received")]
    InvalidData,

    #[error("operation timed out")]
    Timeout,

    #[error("configuration error: {0}")]
    Config(&'static str),
}

impl SensorReading {
    pub fn new(sensor_type: SensorType, data: SensorData, quality: Quality) -> Self {
        Self {
            sensor_type,
            data,
            taken_at: Instant::now(),
            quality,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.quality != Quality::Bad
    }
}

impl SensorType {
    pub fn name(&self) -> &'static str {
        match self {
            SensorType::SDS011 => "SDS011",
            SensorType::MQ135 => "MQ135",
            SensorType::DHT11 => "DHT11",
        }
    }
}

impl core::fmt::Display for SensorType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => SensorError::Timeout,
            std::io::ErrorKind::InvalidData => SensorError::InvalidData,
            _ => SensorError::Communication(err.to_string()),
        }
    }
}
