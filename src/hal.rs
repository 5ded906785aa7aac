//! Linux device handles behind the async embedded traits the drivers use.
//!
//! The station runs on a single-threaded executor with nothing to overlap,
//! so the adapters simply perform the blocking call inside the future.

use crate::station::StationError;
use embedded_hal::spi::SpiDevice as BlockingSpiDevice;
use embedded_hal_async::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};
use embedded_io_async::{ErrorType, Read};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::SpidevDevice;
use serialport::SerialPort;
use std::io;
use std::time::Duration;

/// A serial port whose read timeout surfaces as a zero-length read.
///
/// `embedded-io` reads `Ok(0)` as end of stream. The SDS011 driver relies on
/// exactly that: a port that went quiet for one timeout ends the frame. Any
/// other reader of this link must treat `Ok(0)` as "nothing yet", not EOF.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, StationError> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| StationError::Device {
                device: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { port })
    }
}

impl ErrorType for SerialLink {
    type Error = io::Error;
}

impl Read for SerialLink {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match io::Read::read(&mut self.port, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }
}

/// Async face of a blocking `embedded-hal` SPI device.
pub struct BlockingSpi<T>(pub T);

impl<T: BlockingSpiDevice> SpiErrorType for BlockingSpi<T> {
    type Error = T::Error;
}

impl<T: BlockingSpiDevice> SpiDevice for BlockingSpi<T> {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.0.transaction(operations)
    }
}

/// Open a spidev node in mode 0, 8-bit words.
pub fn open_spi(path: &str, max_speed_hz: u32) -> Result<BlockingSpi<SpidevDevice>, StationError> {
    let device_error = |reason: String| StationError::Device {
        device: path.to_string(),
        reason,
    };

    let mut spi = SpidevDevice::open(path).map_err(|e| device_error(format!("{e:?}")))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(max_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .map_err(|e| device_error(e.to_string()))?;
    Ok(BlockingSpi(spi))
}
