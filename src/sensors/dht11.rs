use super::{Quality, Sensor, SensorData, SensorError, SensorInfo, SensorReading, SensorType};
use std::path::{Path, PathBuf};

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

/// DHT11 temperature/humidity sensor, read through the Linux IIO `dht11`
/// driver (`dtoverlay=dht11`).
///
/// The driver bit-bangs one 40-bit frame per read and fails with `EIO` or
/// `ETIMEDOUT` when the sensor misses its timing, which happens routinely.
/// Both values come from the same frame, so a failure loses both.
pub struct Dht11Sensor {
    device: Option<PathBuf>,
}

impl Dht11Sensor {
    /// `device` is the IIO device directory, e.g.
    /// `/sys/bus/iio/devices/iio:device0`.
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: Some(device.into()),
        }
    }

    fn device(&self) -> Result<&Path, SensorError> {
        self.device.as_deref().ok_or(SensorError::NotInitialized)
    }
}

/// IIO processed values are integers in thousandths.
pub fn parse_milli(raw: &str) -> Result<f64, SensorError> {
    raw.trim()
        .parse::<i64>()
        .map(|milli| milli as f64 / 1000.0)
        .map_err(|_| SensorError::InvalidData)
}

fn read_milli(device: &Path, file: &str) -> Result<f64, SensorError> {
    let raw = std::fs::read_to_string(device.join(file))?;
    parse_milli(&raw)
}

impl Sensor for Dht11Sensor {
    async fn init(&mut self) -> Result<(), SensorError> {
        let device = self.device()?;
        if !device.join(TEMPERATURE_FILE).exists() {
            return Err(SensorError::Communication(format!(
                "no dht11 channels under {}",
                device.display()
            )));
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let device = self.device()?;
        let temperature = read_milli(device, TEMPERATURE_FILE)?;
        let humidity = read_milli(device, HUMIDITY_FILE)?;

        Ok(SensorReading::new(
            SensorType::DHT11,
            SensorData::Environmental {
                temperature,
                humidity,
            },
            Quality::Good,
        ))
    }

    fn info(&self) -> SensorInfo {
        SensorInfo {
            name: "DHT11",
            interface: "GPIO (IIO)",
            manufacturer: "Aosong",
        }
    }

    fn release(&mut self) {
        self.device = None;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embassy_futures::block_on;
    use std::fs;

    pub(crate) fn fake_device(temperature: &str, humidity: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TEMPERATURE_FILE), temperature).unwrap();
        fs::write(dir.path().join(HUMIDITY_FILE), humidity).unwrap();
        dir
    }

    #[test]
    fn reads_both_channels() {
        let dir = fake_device("23000\n", "41000\n");
        let mut dht = Dht11Sensor::new(dir.path());

        block_on(dht.init()).unwrap();
        let reading = block_on(dht.read()).unwrap();
        assert_eq!(
            reading.data,
            SensorData::Environmental {
                temperature: 23.0,
                humidity: 41.0
            }
        );
    }

    #[test]
    fn missing_humidity_loses_the_whole_reading() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TEMPERATURE_FILE), "23000").unwrap();
        let mut dht = Dht11Sensor::new(dir.path());

        assert!(block_on(dht.read()).is_err());
    }

    #[test]
    fn garbage_is_invalid_data() {
        let dir = fake_device("", "41000");
        let mut dht = Dht11Sensor::new(dir.path());
        assert_eq!(block_on(dht.read()), Err(SensorError::InvalidData));
    }

    #[test]
    fn init_needs_driver_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut dht = Dht11Sensor::new(dir.path());
        assert!(block_on(dht.init()).is_err());
    }

    #[test]
    fn parses_thousandths() {
        assert_eq!(parse_milli("-1500"), Ok(-1.5));
        assert_eq!(parse_milli(" 22000 \n"), Ok(22.0));
        assert_eq!(parse_milli("22.0"), Err(SensorError::InvalidData));
    }
}
