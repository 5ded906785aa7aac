use super::SensorError;
use embedded_hal_async::spi::{Error as _, SpiDevice};

/// Number of single-ended inputs.
pub const CHANNELS: u8 = 8;

/// MCP3008 8-channel 10-bit ADC on an SPI bus.
pub struct Mcp3008<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Mcp3008<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Single-ended conversion of `channel` (0..=7).
    ///
    /// Start bit, then `1ccc` (single-ended + channel) in the high nibble of
    /// the second byte; the 10-bit result straddles the last two bytes.
    pub async fn read_channel(&mut self, channel: u8) -> Result<u16, SensorError> {
        if channel >= CHANNELS {
            return Err(SensorError::Config("ADC channel out of range"));
        }
        let mut buf = [0x01, (0x08 | channel) << 4, 0x00];
        self.spi
            .transfer_in_place(&mut buf)
            .await
            .map_err(|e| SensorError::Communication(format!("{:?}", e.kind())))?;
        Ok((u16::from(buf[1] & 0x03) << 8) | u16::from(buf[2]))
    }
}
