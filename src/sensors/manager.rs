use super::dht11::Dht11Sensor;
use super::mq135::{GasSample, Mq135Sensor};
use super::sds011::Sds011Sensor;
use super::{Sensor, SensorData, SensorError, SensorReading, SensorType};
use crate::calibration::Baseline;
use crate::snapshot::{Field, Snapshot};
use chrono::DateTime;
use chrono_tz::Tz;
use core::fmt;
use embedded_hal_async::spi::SpiDevice;
use embedded_io_async::Read;

/// Consecutive failures of one sensor before the warning escalates.
const ERROR_ESCALATION: u32 = 3;

/// Read statistics for one sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SensorStats {
    pub sensor_type: SensorType,
    pub reads: u32,
    pub consecutive_errors: u32,
    pub error_count: u32,
    /// Failure runs that reached the escalation threshold.
    pub escalations: u32,
}

impl SensorStats {
    const fn new(sensor_type: SensorType) -> Self {
        Self {
            sensor_type,
            reads: 0,
            consecutive_errors: 0,
            error_count: 0,
            escalations: 0,
        }
    }

    /// A reading without usable data counts as a failure, same as an error.
    fn record(&mut self, result: &Result<SensorReading, SensorError>) {
        self.reads += 1;
        let cause: &dyn fmt::Display = match result {
            Ok(reading) if reading.is_valid() => {
                self.consecutive_errors = 0;
                return;
            }
            Ok(_) => &"no valid data",
            Err(e) => e,
        };

        self.error_count += 1;
        self.consecutive_errors += 1;
        // DHT11 misses its timing routinely; those stay at warn.
        if self.sensor_type != SensorType::DHT11 && self.consecutive_errors == ERROR_ESCALATION + 1 {
            self.escalations += 1;
            log::error!(
                "[{}] {} consecutive failures, last: {}",
                self.sensor_type,
                self.consecutive_errors,
                cause
            );
        }
    }
}

impl fmt::Display for SensorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} reads, {} failed",
            self.sensor_type, self.reads, self.error_count
        )
    }
}

/// The three sensors of the station, read together once per cycle.
///
/// Owns every device handle. Handles are released exactly once, either
/// explicitly or when the suite is dropped.
pub struct SensorSuite<S: Read, SPI: SpiDevice> {
    particulate: Sds011Sensor<S>,
    gas: Mq135Sensor<SPI>,
    climate: Dht11Sensor,
    stats: [SensorStats; 3],
    released: bool,
}

impl<S: Read, SPI: SpiDevice> SensorSuite<S, SPI> {
    pub fn new(particulate: Sds011Sensor<S>, gas: Mq135Sensor<SPI>, climate: Dht11Sensor) -> Self {
        Self {
            particulate,
            gas,
            climate,
            stats: [
                SensorStats::new(SensorType::SDS011),
                SensorStats::new(SensorType::MQ135),
                SensorStats::new(SensorType::DHT11),
            ],
            released: false,
        }
    }

    /// Initialize every sensor. Failures are logged; the cycle will report
    /// the affected fields as absent.
    pub async fn init(&mut self) {
        let results = [
            (self.particulate.info(), self.particulate.init().await),
            (self.gas.info(), self.gas.init().await),
            (self.climate.info(), self.climate.init().await),
        ];
        for (info, result) in results {
            match result {
                Ok(()) => log::info!(
                    "[{}] {} sensor initialized over {}",
                    info.name,
                    info.manufacturer,
                    info.interface
                ),
                Err(e) => log::warn!("[{}] init failed: {}", info.name, e),
            }
        }
        if self.gas.needs_calibration() {
            log::info!(
                "[{}] baseline calibration requires {}s of warm-up",
                SensorType::MQ135,
                self.gas.warm_up_time().as_secs()
            );
        }
    }

    pub fn gas_mut(&mut self) -> &mut Mq135Sensor<SPI> {
        &mut self.gas
    }

    pub fn set_baseline(&mut self, baseline: Baseline) {
        self.gas.set_baseline(baseline);
    }

    pub fn stats(&self) -> &[SensorStats] {
        &self.stats
    }

    /// One snapshot. No single sensor failure aborts the cycle.
    pub async fn read_snapshot(&mut self, timestamp: DateTime<Tz>) -> Snapshot {
        let particulate = self.particulate.read().await;
        self.stats[0].record(&particulate);
        let (pm25, pm10) = match particulate {
            Ok(SensorReading {
                data: SensorData::AirQuality { pm25, pm10 },
                ..
            }) => (Field::from(pm25), Field::from(pm10)),
            Ok(_) => (Field::Absent, Field::Absent),
            Err(e) => {
                log::warn!("[SDS011] read failed: {e}");
                (Field::Absent, Field::Absent)
            }
        };

        let gas = self.gas.read().await;
        self.stats[1].record(&gas);
        let gas = match gas {
            Ok(reading) => reading,
            Err(e) => {
                // The voltage field is never absent: a dead bus reads as 0 V.
                log::warn!("[MQ135] read failed: {e}");
                self.gas.reading_from(GasSample::from_code(0, self.gas.curve()))
            }
        };
        let (mq135_voltage, estimated_co2_ppm) = match gas.data {
            SensorData::Gas { voltage, co2_ppm, .. } => {
                (voltage, co2_ppm.map_or(Field::Undefined, Field::Present))
            }
            _ => (0.0, Field::Undefined),
        };

        let climate = self.climate.read().await;
        self.stats[2].record(&climate);
        let (temperature_c, humidity_pct) = match climate {
            Ok(SensorReading {
                data: SensorData::Environmental { temperature, humidity },
                ..
            }) => (Field::Present(temperature), Field::Present(humidity)),
            Ok(_) => (Field::Absent, Field::Absent),
            Err(e) => {
                log::warn!("[DHT11] read failed: {e}");
                (Field::Absent, Field::Absent)
            }
        };

        Snapshot {
            pm25,
            pm10,
            mq135_voltage,
            estimated_co2_ppm,
            temperature_c,
            humidity_pct,
            timestamp,
        }
    }

    /// Close every device handle. Returns `false` if already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.particulate.release();
        self.gas.release();
        self.climate.release();
        self.released = true;
        log::info!("sensor handles released");
        true
    }

    #[cfg(test)]
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<S: Read, SPI: SpiDevice> Drop for SensorSuite<S, SPI> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::convert::GasCurve;
    use crate::sensors::dht11::tests::fake_device;
    use crate::sensors::mcp3008::tests::FakeSpi;
    use crate::sensors::mcp3008::Mcp3008;
    use crate::sensors::sds011::tests::{FakeSerial, GOOD_FRAME};
    use chrono::Utc;
    use embassy_futures::block_on;
    use embassy_time::Duration;

    pub(crate) fn suite(
        serial: FakeSerial,
        spi: FakeSpi,
        climate_dir: &std::path::Path,
    ) -> SensorSuite<FakeSerial, FakeSpi> {
        SensorSuite::new(
            Sds011Sensor::new(serial, Duration::from_secs(1)),
            Mq135Sensor::new(Mcp3008::new(spi), 0, GasCurve::default(), Duration::from_secs(0)),
            Dht11Sensor::new(climate_dir),
        )
    }

    fn now() -> DateTime<Tz> {
        Utc::now().with_timezone(&chrono_tz::Europe::Bucharest)
    }

    #[test]
    fn complete_snapshot() {
        let dir = fake_device("24500", "38000");
        let mut sensors = suite(FakeSerial::new(&[&GOOD_FRAME]), FakeSpi::with_code(200), dir.path());

        let snap = block_on(sensors.read_snapshot(now()));
        assert_eq!(snap.pm25, Field::Present(10.0));
        assert_eq!(snap.pm10, Field::Present(20.0));
        assert!(snap.mq135_voltage > 0.0);
        assert!(snap.estimated_co2_ppm.is_present());
        assert_eq!(snap.temperature_c, Field::Present(24.5));
        assert_eq!(snap.humidity_pct, Field::Present(38.0));
        assert!(snap.has_particulates());
    }

    #[test]
    fn each_sensor_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut spi = FakeSpi::with_code(200);
        spi.fail = true;
        let mut sensors = suite(FakeSerial::new(&[&[0xAA, 0xC0, 1]]), spi, dir.path());

        let snap = block_on(sensors.read_snapshot(now()));
        assert_eq!(snap.pm25, Field::Absent);
        assert_eq!(snap.pm10, Field::Absent);
        assert_eq!(snap.mq135_voltage, 0.0);
        assert_eq!(snap.estimated_co2_ppm, Field::Undefined);
        assert_eq!(snap.temperature_c, Field::Absent);
        assert_eq!(snap.humidity_pct, Field::Absent);

        let errors: Vec<u32> = sensors.stats().iter().map(|s| s.error_count).collect();
        assert_eq!(errors, [1, 1, 1]);
    }

    #[test]
    fn consecutive_errors_reset_on_success() {
        let dir = fake_device("20000", "50000");
        let mut sensors = suite(FakeSerial::new(&[]), FakeSpi::with_code(200), dir.path());

        std::fs::remove_file(dir.path().join("in_humidityrelative_input")).unwrap();
        block_on(sensors.read_snapshot(now()));
        block_on(sensors.read_snapshot(now()));
        assert_eq!(sensors.stats()[2].consecutive_errors, 2);

        std::fs::write(dir.path().join("in_humidityrelative_input"), "50000").unwrap();
        block_on(sensors.read_snapshot(now()));
        assert_eq!(sensors.stats()[2].consecutive_errors, 0);
        assert_eq!(sensors.stats()[2].error_count, 2);
        assert_eq!(sensors.stats()[2].reads, 3);
    }

    #[test]
    fn silent_particulate_sensor_escalates_once() {
        let dir = fake_device("20000", "50000");
        let mut sensors = suite(FakeSerial::new(&[]), FakeSpi::with_code(200), dir.path());

        for _ in 0..6 {
            block_on(sensors.read_snapshot(now()));
        }
        let sds = &sensors.stats()[0];
        assert_eq!(sds.reads, 6);
        assert_eq!(sds.error_count, 6);
        assert_eq!(sds.consecutive_errors, 6);
        assert_eq!(sds.escalations, 1);
        assert_eq!(sensors.stats()[1].error_count, 0);
    }

    #[test]
    fn dead_bus_escalates_but_climate_failures_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let mut spi = FakeSpi::with_code(200);
        spi.fail = true;
        let mut sensors = suite(FakeSerial::new(&[]), spi, dir.path());

        for _ in 0..5 {
            block_on(sensors.read_snapshot(now()));
        }
        assert_eq!(sensors.stats()[1].consecutive_errors, 5);
        assert_eq!(sensors.stats()[1].escalations, 1);
        assert_eq!(sensors.stats()[2].consecutive_errors, 5);
        assert_eq!(sensors.stats()[2].escalations, 0);
    }

    #[test]
    fn frame_after_silence_resets_the_run() {
        let dir = fake_device("20000", "50000");
        let serial = FakeSerial::new(&[&[], &[], &GOOD_FRAME]);
        let mut sensors = suite(serial, FakeSpi::with_code(200), dir.path());

        for _ in 0..3 {
            block_on(sensors.read_snapshot(now()));
        }
        let sds = &sensors.stats()[0];
        assert_eq!(sds.consecutive_errors, 0);
        assert_eq!(sds.error_count, 2);
        assert_eq!(sds.escalations, 0);
        assert_eq!(sds.to_string(), "[SDS011] 3 reads, 2 failed");
    }

    #[test]
    fn release_happens_once() {
        let dir = fake_device("20000", "50000");
        let serial = FakeSerial::new(&[]);
        let spi = FakeSpi::with_code(1);
        let (serial_drops, spi_drops) = (serial.dropped.clone(), spi.dropped.clone());

        let mut sensors = suite(serial, spi, dir.path());
        assert!(sensors.release());
        assert!(!sensors.release());
        drop(sensors);

        assert_eq!(serial_drops.get(), 1);
        assert_eq!(spi_drops.get(), 1);
    }

    #[test]
    fn drop_releases_handles() {
        let dir = fake_device("20000", "50000");
        let serial = FakeSerial::new(&[]);
        let drops = serial.dropped.clone();

        drop(suite(serial, FakeSpi::with_code(1), dir.path()));
        assert_eq!(drops.get(), 1);
    }
}
