//! Error taxonomy for bus operations
//!
//! Every error is detected before the first line toggles. Once bit clocking
//! has started a transfer always runs to completion, so there is no
//! partial-transfer error.

use phys605_hal::{GpioError, LineId, Mode};

/// Ways a request can be malformed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidArgument {
    /// Write requested but no DataOut line configured
    MissingDataOut,
    /// Read requested but no DataIn line configured
    MissingDataIn,
    /// Bit index outside the 0-7 range of a byte
    BitIndexOutOfRange(u8),
    /// Word width larger than the operation supports
    WidthOutOfRange(u8),
    /// Channel number outside the chip's declared maximum
    ChannelOutOfRange(u8),
    /// Requested clock rate above what the transport can produce
    RateTooHigh {
        /// Requested ceiling in Hz
        requested: u32,
        /// Transport maximum in Hz
        max: u32,
    },
    /// A rate ceiling of zero Hz
    ZeroRate,
    /// The same line assigned to two roles
    LineConflict(LineId),
    /// Bus settings changed while chip select is held between transfers
    TransactionOpen,
}

/// Bus operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Malformed request
    InvalidArgument(InvalidArgument),
    /// Requested SPI mode not implemented by the transport
    UnsupportedMode(Mode),
    /// Lines or controller cannot be acquired, or the transport is closed
    HardwareUnavailable(GpioError),
}

impl From<InvalidArgument> for Error {
    fn from(e: InvalidArgument) -> Self {
        Error::InvalidArgument(e)
    }
}

impl From<GpioError> for Error {
    fn from(e: GpioError) -> Self {
        Error::HardwareUnavailable(e)
    }
}

impl Error {
    /// Short name of the error kind, for reporting
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::UnsupportedMode(_) => "UnsupportedMode",
            Error::HardwareUnavailable(_) => "HardwareUnavailable",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidArgument(arg) => write!(f, "invalid argument: {:?}", arg),
            Error::UnsupportedMode(mode) => {
                write!(f, "SPI mode {} not supported by transport", mode.number())
            }
            Error::HardwareUnavailable(e) => write!(f, "hardware unavailable: {:?}", e),
        }
    }
}

/// Result alias for bus operations
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let e: Error = InvalidArgument::MissingDataOut.into();
        assert_eq!(e.kind(), "InvalidArgument");
        assert_eq!(Error::UnsupportedMode(Mode::Mode2).kind(), "UnsupportedMode");

        let e: Error = GpioError::AlreadyClaimed(LineId(4)).into();
        assert_eq!(e, Error::HardwareUnavailable(GpioError::AlreadyClaimed(LineId(4))));
        assert_eq!(e.kind(), "HardwareUnavailable");
    }
}
