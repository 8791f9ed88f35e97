//! Bit/byte serializer
//!
//! Pure bit-order arithmetic shared by every transfer path. A logical index
//! counts bits in transmission order: index 0 is the first bit on the wire.
//!
//! - `MsbFirst`: index 0 is bit 7 of a byte (`0x80`)
//! - `LsbFirst`: index 0 is bit 0 of a byte (`0x01`)

use phys605_hal::BitOrder;

use crate::error::{InvalidArgument, Result};

/// Bits in one byte on the wire
pub const BITS_PER_BYTE: u8 = 8;

/// Widest word the word helpers handle
pub const MAX_WORD_BITS: u8 = 64;

/// Mask of the byte bit at logical position `index`, for `index < 8`
#[inline]
pub(crate) const fn byte_mask(index: u8, order: BitOrder) -> u8 {
    match order {
        BitOrder::MsbFirst => 0x80 >> index,
        BitOrder::LsbFirst => 0x01 << index,
    }
}

/// Bit that occupies logical position `index` of `byte`
pub fn bit_at(byte: u8, index: u8, order: BitOrder) -> Result<bool> {
    check_index(index)?;
    Ok(byte & byte_mask(index, order) != 0)
}

/// Fold a received bit into position `index` of a byte being assembled
///
/// The target bit is overwritten, so accumulators need not start at zero.
pub fn set_bit_at(acc: u8, index: u8, bit: bool, order: BitOrder) -> Result<u8> {
    check_index(index)?;
    let mask = byte_mask(index, order);
    Ok(if bit { acc | mask } else { acc & !mask })
}

fn check_index(index: u8) -> Result<()> {
    if index >= BITS_PER_BYTE {
        return Err(InvalidArgument::BitIndexOutOfRange(index).into());
    }
    Ok(())
}

/// Bit stream of one byte in transmission order
pub fn bits(byte: u8, order: BitOrder) -> Bits {
    Bits {
        byte,
        order,
        next: 0,
    }
}

/// Iterator over the bits of a byte, see [`bits`]
#[derive(Debug, Clone)]
pub struct Bits {
    byte: u8,
    order: BitOrder,
    next: u8,
}

impl Iterator for Bits {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.next >= BITS_PER_BYTE {
            return None;
        }
        let bit = self.byte & byte_mask(self.next, self.order) != 0;
        self.next += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (BITS_PER_BYTE - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Bits {}

/// Reassemble a byte from a bit stream in transmission order
///
/// Bits beyond the eighth are ignored; missing bits read as zero.
pub fn from_bits<I: IntoIterator<Item = bool>>(stream: I, order: BitOrder) -> u8 {
    stream
        .into_iter()
        .take(BITS_PER_BYTE as usize)
        .enumerate()
        .fold(0u8, |acc, (i, bit)| {
            if bit {
                acc | byte_mask(i as u8, order)
            } else {
                acc
            }
        })
}

/// Mask covering the low `width` bits of a word
pub const fn word_mask(width: u8) -> u64 {
    if width >= MAX_WORD_BITS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Check a word width against [`MAX_WORD_BITS`]
pub fn check_width(width: u8, max: u8) -> Result<()> {
    if width > max {
        return Err(InvalidArgument::WidthOutOfRange(width).into());
    }
    Ok(())
}

/// Shift position of logical bit `index` in a `width`-bit word
#[inline]
const fn word_shift(index: u8, width: u8, order: BitOrder) -> u8 {
    match order {
        BitOrder::MsbFirst => width - 1 - index,
        BitOrder::LsbFirst => index,
    }
}

/// Bit at logical position `index` of a `width`-bit word
///
/// Requires `index < width <= 64`.
pub fn word_bit_at(value: u64, index: u8, width: u8, order: BitOrder) -> Result<bool> {
    check_word_index(index, width)?;
    Ok((value >> word_shift(index, width, order)) & 1 != 0)
}

/// Fold a received bit into logical position `index` of a `width`-bit word
pub fn set_word_bit_at(acc: u64, index: u8, width: u8, bit: bool, order: BitOrder) -> Result<u64> {
    check_word_index(index, width)?;
    let mask = 1u64 << word_shift(index, width, order);
    Ok(if bit { acc | mask } else { acc & !mask })
}

fn check_word_index(index: u8, width: u8) -> Result<()> {
    check_width(width, MAX_WORD_BITS)?;
    if index >= width {
        return Err(InvalidArgument::BitIndexOutOfRange(index).into());
    }
    Ok(())
}
