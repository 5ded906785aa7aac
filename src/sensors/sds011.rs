use super::{Quality, Sensor, SensorData, SensorError, SensorInfo, SensorReading, SensorType};
use crate::convert::decode_pm_pair;
use embassy_time::{Duration, Instant};
use embedded_io_async::{Error as _, Read};
use heapless::Vec;

/// Length of an SDS011 data frame: `AA C0 p25L p25H p10L p10H id id sum AB`.
pub const FRAME_LEN: usize = 10;

const HEAD: u8 = 0xAA;
const COMMAND: u8 = 0xC0;
const TAIL: u8 = 0xAB;

/// SDS011 Particulate Matter sensor
/// Communicates via UART at 9600 baud, pushing one frame per second
pub struct Sds011Sensor<S> {
    port: Option<S>,
    timeout: Duration,
}

impl<S: Read> Sds011Sensor<S> {
    /// `timeout` bounds the whole frame read, not each byte.
    ///
    /// The deadline is checked between port reads, so a port whose own read
    /// timeout is `t` can hold one frame read for up to `timeout + t`.
    pub fn new(port: S, timeout: Duration) -> Self {
        Self {
            port: Some(port),
            timeout,
        }
    }

    /// Collect up to [`FRAME_LEN`] bytes. A zero-length read (the serial
    /// timeout, not end of stream) or the deadline ends the frame early.
    async fn read_frame(&mut self) -> Result<Vec<u8, FRAME_LEN>, SensorError> {
        let port = self.port.as_mut().ok_or(SensorError::NotInitialized)?;
        let deadline = Instant::now() + self.timeout;
        let mut frame = Vec::new();
        let mut chunk = [0u8; FRAME_LEN];

        while frame.len() < FRAME_LEN && Instant::now() < deadline {
            let want = FRAME_LEN - frame.len();
            let n = port
                .read(&mut chunk[..want])
                .await
                .map_err(|e| SensorError::Communication(format!("{:?}", e.kind())))?;
            if n == 0 {
                break;
            }
            frame
                .extend_from_slice(&chunk[..n])
                .map_err(|_| SensorError::InvalidData)?;
        }

        Ok(frame)
    }
}

/// Header, tail and checksum of a complete frame.
pub fn frame_is_intact(frame: &[u8]) -> bool {
    if frame.len() != FRAME_LEN {
        return false;
    }
    let sum = frame[2..8].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    frame[0] == HEAD && frame[1] == COMMAND && frame[8] == sum && frame[9] == TAIL
}

impl<S: Read> Sensor for Sds011Sensor<S> {
    async fn init(&mut self) -> Result<(), SensorError> {
        if self.port.is_none() {
            return Err(SensorError::NotInitialized);
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let frame = self.read_frame().await?;

        let (data, quality) = match decode_pm_pair(&frame) {
            Some((pm25, pm10)) => {
                let quality = if frame_is_intact(&frame) {
                    Quality::Good
                } else {
                    log::warn!("[SDS011] frame failed integrity check: {:02X?}", frame.as_slice());
                    Quality::Degraded
                };
                (
                    SensorData::AirQuality {
                        pm25: Some(pm25),
                        pm10: Some(pm10),
                    },
                    quality,
                )
            }
            None => {
                log::warn!("[SDS011] short frame ({} bytes)", frame.len());
                (
                    SensorData::AirQuality {
                        pm25: None,
                        pm10: None,
                    },
                    Quality::Bad,
                )
            }
        };

        Ok(SensorReading::new(SensorType::SDS011, data, quality))
    }

    fn info(&self) -> SensorInfo {
        SensorInfo {
            name: "SDS011",
            interface: "UART",
            manufacturer: "Nova Fitness",
        }
    }

    fn release(&mut self) {
        self.port = None;
    }
}
