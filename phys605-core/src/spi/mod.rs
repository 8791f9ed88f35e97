//! SPI transports
//!
//! A [`Transport`] moves bytes between the board and one SPI chip. Two
//! implementations exist:
//!
//! - [`BitBangTransport`]: software clocking over any four GPIO lines
//! - [`HardwareSpiTransport`]: the board's SPI controller
//!
//! Drivers are written against the trait so the same chip code runs on
//! either.

pub mod engine;
pub mod hardware;

pub use engine::BitBangTransport;
pub use hardware::HardwareSpiTransport;

use crate::config::BusConfig;
use crate::error::Result;

/// Size of the stack scratch buffers used when chunking transfers
pub const CHUNK_SIZE: usize = 32;

/// Chip select handling around one transfer
///
/// Splitting one transaction over several calls keeps the chip selected in
/// between: assert on the first call, deassert on the last.
///
/// Chips that want chip select toggled between every byte take one
/// `Framing::WHOLE` transfer per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Framing {
    /// Drive chip select active before the first bit
    pub assert_cs: bool,
    /// Release chip select after the last bit
    pub deassert_cs: bool,
}

impl Framing {
    /// Complete transaction
    pub const WHOLE: Self = Self {
        assert_cs: true,
        deassert_cs: true,
    };
    /// First part of a split transaction
    pub const BEGIN: Self = Self {
        assert_cs: true,
        deassert_cs: false,
    };
    /// Middle part of a split transaction
    pub const CONTINUE: Self = Self {
        assert_cs: false,
        deassert_cs: false,
    };
    /// Last part of a split transaction
    pub const END: Self = Self {
        assert_cs: false,
        deassert_cs: true,
    };
}

impl Default for Framing {
    fn default() -> Self {
        Self::WHOLE
    }
}

/// One transfer: bytes out, bytes in, and how to frame them
///
/// `write` and `read` may differ in length. The transfer clocks
/// `max(write.len(), read.len())` bytes; missing write bytes go out as the
/// bus fill byte and surplus received bytes are discarded. When both are
/// empty only the chip select framing happens.
#[derive(Debug)]
pub struct TransferRequest<'a> {
    /// Bytes to send
    pub write: &'a [u8],
    /// Buffer for received bytes
    pub read: &'a mut [u8],
    /// Chip select handling
    pub framing: Framing,
}

impl<'a> TransferRequest<'a> {
    /// Full-duplex transfer
    pub fn new(write: &'a [u8], read: &'a mut [u8]) -> Self {
        Self {
            write,
            read,
            framing: Framing::WHOLE,
        }
    }

    /// Send only
    pub fn write_only(write: &'a [u8]) -> Self {
        Self::new(write, &mut [])
    }

    /// Receive only
    pub fn read_only(read: &'a mut [u8]) -> Self {
        Self::new(&[], read)
    }

    /// Override the chip select framing
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Bytes clocked on the wire
    pub fn len(&self) -> usize {
        self.write.len().max(self.read.len())
    }

    /// Check if no bytes are clocked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte transport to one SPI chip
pub trait Transport {
    /// Apply new bus settings
    ///
    /// Takes effect from the next transfer. Invalid settings are rejected
    /// and the previous ones stay in force, as are any settings while chip
    /// select is held open between a BEGIN and an END transfer.
    fn configure(&mut self, config: BusConfig) -> Result<()>;

    /// Current bus settings
    fn config(&self) -> &BusConfig;

    /// Run one transfer
    fn transfer(&mut self, request: TransferRequest<'_>) -> Result<()>;

    /// Send bytes, discarding whatever comes back
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.transfer(TransferRequest::write_only(data))
    }

    /// Receive bytes, sending the fill byte
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.transfer(TransferRequest::read_only(buf))
    }

    /// Send `buf` and replace it with the received bytes
    fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut scratch = [0u8; CHUNK_SIZE];
        let chunks = buf.len().div_ceil(CHUNK_SIZE).max(1);
        for (i, chunk) in buf.chunks_mut(CHUNK_SIZE).enumerate() {
            let framing = Framing {
                assert_cs: i == 0,
                deassert_cs: i + 1 == chunks,
            };
            let out = &mut scratch[..chunk.len()];
            out.copy_from_slice(chunk);
            self.transfer(TransferRequest::new(out, chunk).with_framing(framing))?;
        }
        if buf.is_empty() {
            self.transfer(TransferRequest::new(&[], &mut []))?;
        }
        Ok(())
    }

    /// Release the underlying lines or controller
    ///
    /// Idempotent. Later transfers fail with `HardwareUnavailable`.
    fn close(&mut self);

    /// Check if the transport still holds its hardware
    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn configure(&mut self, config: BusConfig) -> Result<()> {
        T::configure(self, config)
    }

    fn config(&self) -> &BusConfig {
        T::config(self)
    }

    fn transfer(&mut self, request: TransferRequest<'_>) -> Result<()> {
        T::transfer(self, request)
    }

    fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        T::transfer_in_place(self, buf)
    }

    fn close(&mut self) {
        T::close(self)
    }

    fn is_open(&self) -> bool {
        T::is_open(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    /// Records transfers and echoes the written bytes back
    struct EchoTransport {
        config: BusConfig,
        frames: Vec<(usize, Framing), 8>,
    }

    impl Transport for EchoTransport {
        fn configure(&mut self, config: BusConfig) -> Result<()> {
            self.config = config;
            Ok(())
        }

        fn config(&self) -> &BusConfig {
            &self.config
        }

        fn transfer(&mut self, request: TransferRequest<'_>) -> Result<()> {
            self.frames.push((request.len(), request.framing)).unwrap();
            for (i, byte) in request.read.iter_mut().enumerate() {
                *byte = request.write.get(i).copied().unwrap_or(self.config.fill_byte);
            }
            Ok(())
        }

        fn close(&mut self) {}

        fn is_open(&self) -> bool {
            true
        }
    }

    fn echo() -> EchoTransport {
        EchoTransport {
            config: BusConfig::default(),
            frames: Vec::new(),
        }
    }

    #[test]
    fn test_request_lengths() {
        let mut buf = [0u8; 3];
        let req = TransferRequest::new(&[1, 2], &mut buf);
        assert_eq!(req.len(), 3);
        assert_eq!(req.framing, Framing::WHOLE);
        assert!(TransferRequest::write_only(&[]).is_empty());
    }

    #[test]
    fn test_transfer_in_place_chunks_keep_cs() {
        let mut t = echo();
        let mut buf = [0xA5u8; 70];
        t.transfer_in_place(&mut buf).unwrap();

        assert_eq!(buf, [0xA5u8; 70]);
        assert_eq!(
            t.frames.as_slice(),
            &[(32, Framing::BEGIN), (32, Framing::CONTINUE), (6, Framing::END)]
        );
    }

    #[test]
    fn test_transfer_in_place_empty_still_frames() {
        let mut t = echo();
        t.transfer_in_place(&mut []).unwrap();
        assert_eq!(t.frames.as_slice(), &[(0, Framing::WHOLE)]);
    }

    #[test]
    fn test_read_uses_fill_byte() {
        let mut t = echo();
        t.configure(BusConfig::default().with_fill_byte(0xFF)).unwrap();
        let mut buf = [0u8; 2];
        t.read(&mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);
    }
}
